//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient 的两种能力：
//! complete（自由文本）与 complete_with_tools（给定工具 schema，由模型决定是否调用工具）。
//! 工具参数以 JSON 字符串返回，解析失败不报错，而是成为 ToolArguments::Malformed。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::memory::Message;

/// LLM 调用错误
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no scripted response left")]
    Exhausted,
}

impl LlmError {
    /// 网络错误、限流与 5xx 视为可重试
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Request(_) | LlmError::RateLimited { .. } => true,
            LlmError::Status { status, .. } => *status >= 500 || *status == 408,
            LlmError::InvalidResponse(_) | LlmError::Exhausted => false,
        }
    }
}

/// 提供给模型的工具描述（name / description / JSON Schema 参数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 工具选择模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolChoice {
    None,
    /// 模型可调用也可不调用工具
    #[default]
    Auto,
    Required,
}

impl ToolChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolChoice::None => "none",
            ToolChoice::Auto => "auto",
            ToolChoice::Required => "required",
        }
    }
}

/// 工具参数：解析成功的 JSON 对象，或原始文本与解析错误
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArguments {
    Parsed(Value),
    Malformed { raw: String, error: String },
}

impl ToolArguments {
    /// 解析模型返回的参数字符串；空串视为 `{}`，非对象视为 Malformed
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return ToolArguments::Parsed(Value::Object(Default::default()));
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(v) if v.is_object() => ToolArguments::Parsed(v),
            Ok(_) => ToolArguments::Malformed {
                raw: raw.to_string(),
                error: "arguments must be a JSON object".to_string(),
            },
            Err(e) => ToolArguments::Malformed {
                raw: raw.to_string(),
                error: e.to_string(),
            },
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ToolArguments::Parsed(v) => Some(v),
            ToolArguments::Malformed { .. } => None,
        }
    }

    /// 取字符串字段；Malformed 或字段缺失时返回 None
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.as_value()?.get(key)?.as_str()
    }

    /// 重新编码为字符串（写回对话历史时使用）
    pub fn to_raw(&self) -> String {
        match self {
            ToolArguments::Parsed(v) => v.to_string(),
            ToolArguments::Malformed { raw, .. } => raw.clone(),
        }
    }
}

/// 模型发起的一次工具调用
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: ToolArguments,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, raw_arguments: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: ToolArguments::parse(raw_arguments),
        }
    }
}

/// 工具选择式补全的结果
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionResult {
    FreeText(String),
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCallRequest>,
    },
}

impl CompletionResult {
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            CompletionResult::FreeText(_) => &[],
            CompletionResult::ToolCalls { calls, .. } => calls,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            CompletionResult::FreeText(t) => Some(t.as_str()),
            CompletionResult::ToolCalls { content, .. } => content.as_deref(),
        }
    }
}

/// LLM 客户端 trait：自由文本补全与工具选择式补全
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 自由文本补全
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 工具选择式补全：模型可返回文本或若干工具调用
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        choice: ToolChoice,
    ) -> Result<CompletionResult, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 重试配置（指数退避）
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32, err: &LlmError) -> Duration {
        if let LlmError::RateLimited { retry_after_ms } = err {
            return Duration::from_millis(*retry_after_ms).min(self.max_delay);
        }
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// 带重试的 LLM 客户端包装：仅对 is_transient 的错误重试
pub struct RetryingLlmClient<C> {
    inner: C,
    config: RetryConfig,
}

impl<C: LlmClient> RetryingLlmClient<C> {
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<C: LlmClient> LlmClient for RetryingLlmClient<C> {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(messages).await {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.config.delay_for(attempt, &e);
                    tracing::warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "LLM call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        choice: ToolChoice,
    ) -> Result<CompletionResult, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete_with_tools(messages, tools, choice).await {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.config.delay_for(attempt, &e);
                    tracing::warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "LLM tool call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}
