//! 执行器层：Executor 抽象、有序执行器集合、通用工具调用循环与各执行器画像

pub mod executor;
pub mod profile;
pub mod prompts;
pub mod toolcall;

pub use executor::{Executor, ExecutorKind, ExecutorSet};
pub use profile::{AgentProfile, WebTracker};
pub use toolcall::ToolCallAgent;
