//! create_chat_completion：结构化文本输出
//!
//! 模型直接给出 `response` 时原样返回；只给 `prompt` 时调用 LLM 生成文本，
//! 可选 `format` 说明期望的输出格式（表格、JSON、Markdown 等）。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::Tool;

pub const CREATE_CHAT_COMPLETION_TOOL: &str = "create_chat_completion";

const COMPLETION_SYSTEM_PROMPT: &str =
    "You produce the requested content directly, with no preamble. Follow the requested output format exactly.";

pub struct ChatCompletionTool {
    llm: Arc<dyn LlmClient>,
}

impl ChatCompletionTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

fn non_empty<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

#[async_trait]
impl Tool for ChatCompletionTool {
    fn name(&self) -> &str {
        CREATE_CHAT_COMPLETION_TOOL
    }

    fn description(&self) -> &str {
        "Creates a structured completion with specified output formatting. Put finished text in `response`, or describe what to generate in `prompt` (with an optional `format`)."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "response": {
                    "type": "string",
                    "description": "The finished text that should be delivered as-is."
                },
                "prompt": {
                    "type": "string",
                    "description": "What to generate when no response is given."
                },
                "format": {
                    "type": "string",
                    "description": "Desired output format, e.g. 'markdown table' or 'JSON object with keys a, b'."
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        if let Some(response) = non_empty(&args, "response") {
            return Ok(response.to_string());
        }
        let prompt = non_empty(&args, "prompt").ok_or("Missing response or prompt")?;
        let request = match non_empty(&args, "format") {
            Some(format) => format!("{}\n\nOutput format: {}", prompt, format),
            None => prompt.to_string(),
        };
        let messages = [Message::system(COMPLETION_SYSTEM_PROMPT), Message::user(request)];
        self.llm
            .complete(&messages)
            .await
            .map_err(|e| format!("Chat completion failed: {}", e))
    }
}
