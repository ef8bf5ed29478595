//! 状态定义：Agent 生命周期状态
//!
//! Idle -> Running -> (Idle | Finished | Error)。Finished 表示 Agent 调用了终止工具，
//! 引擎据此提前结束计划；Error 表示本次 run 被中止（如 LLM 不可用），需 reset 后才能再次运行。

use serde::Serialize;

/// Agent 状态
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    /// 终止工具触发后的终态
    Finished,
    /// run 中止后的降级终态
    Error,
}

impl AgentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentState::Finished | AgentState::Error)
    }
}
