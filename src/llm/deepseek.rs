//! DeepSeek API 客户端（OpenAI 兼容格式）
//!
//! - Base URL: https://api.deepseek.com
//! - 模型: deepseek-chat (常规对话), deepseek-reasoner (思考模式)
//!
//! deepseek-reasoner 不支持工具调用，执行器侧应使用 deepseek-chat。

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const DEEPSEEK_REASONER: &str = "deepseek-reasoner";

/// 创建 DeepSeek 客户端
///
/// - API key 依次取 `DEEPSEEK_API_KEY`、`OPENAI_API_KEY`
/// - 模型依次取参数、`DEEPSEEK_MODEL` 环境变量、`deepseek-chat`
pub fn create_deepseek_client(model: Option<&str>, request_timeout_secs: u64) -> OpenAiClient {
    let api_key = std::env::var("DEEPSEEK_API_KEY")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_else(|| "sk-placeholder".to_string());

    let model = model
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_MODEL").ok())
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string());

    OpenAiClient::with_timeout(
        Some(DEEPSEEK_BASE_URL),
        &model,
        Some(api_key.as_str()),
        request_timeout_secs,
    )
}
