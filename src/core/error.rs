//! 错误类型：Agent 运行错误、计划存储错误、整次运行错误
//!
//! 引擎是唯一的错误边界：AgentError / PlanError 在引擎内被转为文本，只有 RunError（超时 / 失败）交给调用方。

use std::time::Duration;

use thiserror::Error;

use crate::core::AgentState;

/// Agent 运行过程中可能出现的错误（LLM、工具、参数、状态）
#[derive(Error, Debug)]
pub enum AgentError {
    /// run() 只能从 Idle 进入
    #[error("Cannot run agent from state {0:?}")]
    InvalidState(AgentState),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// think/act 中非工具级的失败（如 LLM 不可用），本次 run 中止
    #[error("Run aborted: {0}")]
    RunAborted(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),
}

/// 计划存储错误：未知 plan、下标越界、参数缺失等
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("A plan with ID '{0}' already exists")]
    PlanExists(String),

    #[error("No plan found with ID: {0}")]
    PlanNotFound(String),

    #[error("Invalid step_index: {index}. Valid indices range from 0 to {max}", max = .len.saturating_sub(1))]
    StepIndexOutOfRange { index: usize, len: usize },

    #[error("Parameter `{0}` is required")]
    MissingParameter(&'static str),

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Unrecognized command: {0}")]
    UnknownCommand(String),
}

/// 整次运行的失败类型；超时与其他失败分开，便于调用方给出不同提示
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Request processing timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Execution failed: {0}")]
    Failed(String),
}
