//! browser_use：Headless Chrome 浏览器会话
//!
//! 需启用 feature "browser" 且系统已安装 Chrome/Chromium。
//! 会话（浏览器进程 + 当前标签页）在首次 navigate 时启动，之后各动作复用；
//! cleanup 关闭会话，可重复调用。headless_chrome 为同步 API，全部放进 spawn_blocking。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use headless_chrome::{Browser, Tab};
use serde_json::Value;

use crate::tools::Tool;

pub const BROWSER_USE_TOOL: &str = "browser_use";

/// 浏览器会话：持有 Browser 以保证进程存活
struct BrowserSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

pub struct BrowserTool {
    max_result_chars: usize,
    session: Arc<Mutex<Option<BrowserSession>>>,
}

fn truncate(text: String, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        text
    }
}

impl BrowserTool {
    pub fn new(max_result_chars: usize) -> Self {
        Self {
            max_result_chars,
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// 在已有会话的标签页上执行同步操作
    async fn with_tab<F>(&self, f: F) -> Result<String, String>
    where
        F: FnOnce(&Arc<Tab>) -> Result<String, String> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let guard = session.lock().map_err(|e| e.to_string())?;
            let session = guard
                .as_ref()
                .ok_or_else(|| "No active browser session. Use navigate first.".to_string())?;
            f(&session.tab)
        })
        .await
        .map_err(|e| format!("Task join: {}", e))?
    }
}

#[async_trait]
impl Tool for BrowserTool {
    fn name(&self) -> &str {
        BROWSER_USE_TOOL
    }

    fn description(&self) -> &str {
        r#"Interact with a headless web browser.
* navigate: go to a URL (starts the browser on first use)
* get_text: readable text of the current page
* scroll: scroll the page up or down
* execute_js: run JavaScript on the current page and return its value"#
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["navigate", "get_text", "scroll", "execute_js"],
                    "description": "The browser action to perform"
                },
                "url": {
                    "type": "string",
                    "description": "URL for 'navigate'"
                },
                "direction": {
                    "type": "string",
                    "enum": ["up", "down"],
                    "description": "Direction for 'scroll'"
                },
                "script": {
                    "type": "string",
                    "description": "JavaScript code for 'execute_js'"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let action = args
            .get("action")
            .and_then(|v| v.as_str())
            .ok_or("Missing action")?;
        let max_chars = self.max_result_chars;

        match action {
            "navigate" => {
                let url = args
                    .get("url")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .trim()
                    .to_string();
                if url.is_empty() {
                    return Err("Missing url".to_string());
                }
                tracing::info!(url = %url, "browser navigate");

                let session = Arc::clone(&self.session);
                tokio::task::spawn_blocking(move || {
                    let mut guard = session.lock().map_err(|e| e.to_string())?;
                    if guard.is_none() {
                        let browser = Browser::default()
                            .map_err(|e| format!("Chrome launch failed: {}. Install Chrome/Chromium.", e))?;
                        let tab = browser
                            .new_tab()
                            .map_err(|e| format!("Browser tab failed: {}", e))?;
                        *guard = Some(BrowserSession {
                            _browser: browser,
                            tab,
                        });
                    }
                    let session = guard
                        .as_ref()
                        .ok_or_else(|| "Browser session unavailable".to_string())?;
                    session
                        .tab
                        .navigate_to(&url)
                        .map_err(|e| format!("Navigate failed: {}", e))?;
                    session
                        .tab
                        .wait_for_element("body")
                        .map_err(|e| format!("Page load failed: {}", e))?;
                    Ok::<_, String>(format!("Navigated to {}", url))
                })
                .await
                .map_err(|e| format!("Task join: {}", e))?
            }
            "get_text" => {
                self.with_tab(move |tab| {
                    let content = tab
                        .get_content()
                        .map_err(|e| format!("Get content failed: {}", e))?;
                    let text = html2text::from_read(content.as_bytes(), 120).unwrap_or(content);
                    Ok(truncate(text, max_chars))
                })
                .await
            }
            "scroll" => {
                let direction = args
                    .get("direction")
                    .and_then(|v| v.as_str())
                    .unwrap_or("down")
                    .to_string();
                self.with_tab(move |tab| {
                    let amount = if direction == "up" { -500 } else { 500 };
                    tab.evaluate(&format!("window.scrollBy(0, {})", amount), false)
                        .map_err(|e| format!("Scroll failed: {}", e))?;
                    Ok(format!("Scrolled {}", direction))
                })
                .await
            }
            "execute_js" => {
                let script = args
                    .get("script")
                    .and_then(|v| v.as_str())
                    .ok_or("Missing script")?
                    .to_string();
                self.with_tab(move |tab| {
                    let result = tab
                        .evaluate(&script, true)
                        .map_err(|e| format!("Script failed: {}", e))?;
                    let value = result
                        .value
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "undefined".to_string());
                    Ok(truncate(value, max_chars))
                })
                .await
            }
            other => Err(format!("Unknown action: {}", other)),
        }
    }

    async fn cleanup(&self) {
        let session = Arc::clone(&self.session);
        let _ = tokio::task::spawn_blocking(move || {
            if let Ok(mut guard) = session.lock() {
                if guard.take().is_some() {
                    tracing::info!("browser session closed");
                }
            }
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_actions_without_session_fail_and_cleanup_is_idempotent() {
        let tool = BrowserTool::new(1000);
        let err = tool
            .execute(serde_json::json!({"action": "get_text"}))
            .await
            .unwrap_err();
        assert!(err.contains("No active browser session"));
        tool.cleanup().await;
        tool.cleanup().await;
    }
}
