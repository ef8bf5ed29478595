//! Mock LLM 客户端（用于测试，无需 API）
//!
//! - MockLlmClient：取最后一条 User 消息回显为纯文本，从不调用工具，便于本地跑通整条计划流程。
//! - ScriptedLlmClient：按顺序回放预设的文本 / 工具调用 / 错误，并记录每次请求，供单元与集成测试断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{CompletionResult, LlmClient, LlmError, ToolCallRequest, ToolChoice, ToolSchema};
use crate::memory::{Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

fn last_user(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| matches!(m.role, Role::User))
        .map(|m| m.content.as_str())
        .unwrap_or("(no input)")
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        Ok(format!("Echo from Mock: {}", last_user(messages)))
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        _tools: &[ToolSchema],
        _choice: ToolChoice,
    ) -> Result<CompletionResult, LlmError> {
        Ok(CompletionResult::FreeText(format!(
            "Echo from Mock: {}",
            last_user(messages)
        )))
    }
}

/// 预设回复
#[derive(Debug, Clone)]
enum Scripted {
    Reply(CompletionResult),
    Fail(LlmError),
}

/// 一次被记录的请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    /// 自由文本请求为 None
    pub tools: Option<Vec<String>>,
}

/// 脚本化客户端：两种能力共用一条队列，队列耗尽时返回 LlmError::Exhausted
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    queue: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push(Scripted::Reply(CompletionResult::FreeText(text.into())))
    }

    /// 追加一轮工具调用；每项为 (name, 参数 JSON 字符串)
    pub fn with_tool_calls(self, calls: &[(&str, &str)]) -> Self {
        let calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCallRequest::new(format!("call_{i}"), *name, args))
            .collect();
        self.push(Scripted::Reply(CompletionResult::ToolCalls {
            content: None,
            calls,
        }))
    }

    pub fn with_error(self, err: LlmError) -> Self {
        self.push(Scripted::Fail(err))
    }

    fn push(self, item: Scripted) -> Self {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(item);
        }
        self
    }

    /// 已收到的请求总数
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// 剩余未消费的预设回复数
    pub fn remaining(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn next(&self, messages: &[Message], tools: Option<&[ToolSchema]>) -> Result<CompletionResult, LlmError> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(RecordedRequest {
                messages: messages.to_vec(),
                tools: tools.map(|t| t.iter().map(|s| s.name.clone()).collect()),
            });
        }
        let item = self
            .queue
            .lock()
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?
            .pop_front();
        match item {
            Some(Scripted::Reply(r)) => Ok(r),
            Some(Scripted::Fail(e)) => Err(e),
            None => Err(LlmError::Exhausted),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let reply = self.next(messages, None)?;
        Ok(reply.text().unwrap_or_default().to_string())
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        _choice: ToolChoice,
    ) -> Result<CompletionResult, LlmError> {
        self.next(messages, Some(tools))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_never_calls_tools() {
        let out = MockLlmClient
            .complete_with_tools(&[Message::user("hello")], &[], ToolChoice::Auto)
            .await
            .unwrap();
        assert_eq!(out, CompletionResult::FreeText("Echo from Mock: hello".into()));
    }

    #[tokio::test]
    async fn test_scripted_replays_in_order() {
        let client = ScriptedLlmClient::new()
            .with_text("first")
            .with_tool_calls(&[("terminate", r#"{"status": "success"}"#)]);

        assert_eq!(client.complete(&[]).await.unwrap(), "first");
        let second = client
            .complete_with_tools(&[], &[], ToolChoice::Auto)
            .await
            .unwrap();
        assert_eq!(second.tool_calls()[0].name, "terminate");
        assert!(matches!(
            client.complete(&[]).await,
            Err(LlmError::Exhausted)
        ));
        assert_eq!(client.call_count(), 3);
    }
}
