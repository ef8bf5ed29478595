//! 核心层：错误类型、Agent 状态、组件构建

pub mod builder;
pub mod error;
pub mod state;

pub use builder::{create_llm_from_config, ExecutorBuilder};
pub use error::{AgentError, PlanError, RunError};
pub use state::AgentState;
