//! 短期记忆：Agent 对话历史
//!
//! 保留最近 max_messages 条消息（user / assistant / tool），超出时剪枝；
//! 剪枝后不会以孤立的 tool 消息开头（其对应的 assistant 工具调用已被丢弃）。

use crate::llm::ToolCallRequest;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

/// 单条消息；assistant 消息可携带工具调用，tool 消息携带对应的 tool_call_id
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub tool_call_id: Option<String>,
    pub name: Option<String>,
}

impl Message {
    fn plain(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content.into())
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content.into())
    }

    /// 带工具调用的 assistant 消息
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::plain(Role::Assistant, content.unwrap_or_default())
        }
    }

    /// 工具执行结果
    pub fn tool(content: impl Into<String>, name: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::plain(Role::Tool, content.into())
        }
    }
}

/// Agent 对话历史
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_messages: usize,
}

impl ConversationMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages: max_messages.max(1),
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.prune();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// 超出上限时丢弃最旧的消息，并跳过开头的孤立 tool 消息
    fn prune(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
            let orphans = self
                .messages
                .iter()
                .take_while(|m| m.role == Role::Tool)
                .count();
            self.messages.drain(..orphans);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_recent() {
        let mut mem = ConversationMemory::new(2);
        mem.push(Message::user("a"));
        mem.push(Message::assistant("b"));
        mem.push(Message::user("c"));
        assert_eq!(mem.len(), 2);
        assert_eq!(mem.messages()[0].content, "b");
    }

    #[test]
    fn test_prune_drops_orphan_tool_results() {
        let mut mem = ConversationMemory::new(3);
        mem.push(Message::user("task"));
        mem.push(Message::assistant_tool_calls(
            None,
            vec![ToolCallRequest::new("c1", "bash", "{}")],
        ));
        mem.push(Message::tool("ok", "bash", "c1"));
        mem.push(Message::tool("ok", "bash", "c2"));
        mem.push(Message::user("next"));
        assert_eq!(mem.len(), 1);
        assert_eq!(mem.messages()[0].role, Role::User);
    }
}
