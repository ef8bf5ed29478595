//! 记忆层：Agent 短期对话历史

pub mod conversation;

pub use conversation::{ConversationMemory, Message, Role};
