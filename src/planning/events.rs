//! 计划执行过程事件：供 CLI / 前端展示计划创建、步骤开始与结束、运行结束

use serde::Serialize;

use crate::planning::StepStatus;

/// 计划流程事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// 计划已建立（含是否使用了默认计划）
    PlanCreated {
        plan_id: String,
        title: String,
        steps: Vec<String>,
        fallback: bool,
    },
    /// 步骤开始执行
    StepStarted {
        index: usize,
        text: String,
        executor: String,
    },
    /// 步骤执行结束
    StepFinished {
        index: usize,
        status: StepStatus,
        /// 结果预览
        preview: String,
    },
    /// 整次运行结束
    RunFinished { completed: usize, total: usize },
}
