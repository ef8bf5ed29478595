//! web_search：按关键词检索网页，返回结果链接列表
//!
//! 向可配置的 HTML 搜索端点（默认 DuckDuckGo HTML 版）发送 GET 请求，带超时与浏览器 User-Agent；
//! 从结果页提取标题与链接；无法识别结果时退回 html2text 提取的可读文本，超过 max_result_chars 截断。

use std::sync::OnceLock;

use async_trait::async_trait;
use html2text::from_read;
use regex::Regex;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::tools::Tool;

pub const WEB_SEARCH_TOOL: &str = "web_search";
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// 单条检索结果
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// Web 检索工具：超时与最大字符数由配置决定
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    max_result_chars: usize,
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

static RESULT_LINK_RE: OnceLock<Regex> = OnceLock::new();

fn result_link_re() -> &'static Regex {
    RESULT_LINK_RE.get_or_init(|| {
        Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#).unwrap()
    })
}

/// 结果链接可能是跳转地址（//duckduckgo.com/l/?uddg=<真实地址>），取出真实 URL
fn resolve_result_url(href: &str) -> Option<String> {
    let href = decode_entities(href);
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href
    };
    let url = Url::parse(&absolute).ok()?;
    if let Some((_, target)) = url.query_pairs().find(|(k, _)| k == "uddg") {
        return Some(target.into_owned());
    }
    Some(url.to_string())
}

/// 从搜索结果页提取 (标题, 链接)
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    result_link_re()
        .captures_iter(html)
        .filter_map(|cap| {
            let url = resolve_result_url(cap.get(1)?.as_str())?;
            let title = decode_entities(&strip_html_tags(cap.get(2)?.as_str()));
            Some(SearchHit { title, url })
        })
        .take(limit)
        .collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect::<String>() + "\n...[truncated]"
    } else {
        s.to_string()
    }
}

impl WebSearchTool {
    pub fn new(endpoint: Option<&str>, timeout_secs: u64, max_result_chars: usize) -> Self {
        // 使用现代浏览器 UA，避免被站点识别为爬虫
        const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.unwrap_or(DEFAULT_SEARCH_ENDPOINT).to_string(),
            max_result_chars,
        }
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<String, String> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| format!("Read body: {}", e))?;

        let hits = parse_results(&body, num_results);
        if hits.is_empty() {
            // 端点不是已知的结果页格式，返回可读文本
            let text = match from_read(body.as_bytes(), 120) {
                Ok(text) if !text.trim().is_empty() => text,
                _ => strip_html_tags(&body),
            };
            return Ok(truncate_chars(&text, self.max_result_chars));
        }

        let listing = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("{}. {}\n   {}", i + 1, hit.title, hit.url))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(truncate_chars(&listing, self.max_result_chars))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Perform a web search and return a list of relevant links with titles. Use this tool when you need to find information on the web, get up-to-date data, or research specific topics."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "(required) The search query to submit."
                },
                "num_results": {
                    "type": "integer",
                    "description": "(optional) The number of search results to return. Default is 10.",
                    "default": 10
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if query.is_empty() {
            return Err("Missing query".to_string());
        }
        let num_results = args
            .get("num_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(10)
            .clamp(1, 50) as usize;
        tracing::info!(query = %query, num_results, "web search");
        self.search(query, num_results).await
    }
}
