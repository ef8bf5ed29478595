//! 规划层：计划存储、planning 工具协议、计划执行引擎与流程事件

pub mod engine;
pub mod events;
pub mod prompts;
pub mod status;
pub mod store;
pub mod tool;

pub use engine::{
    default_plan_steps, default_plan_title, match_executor_key, parse_step_type,
    PlanExecutionEngine, StepInfo,
};
pub use events::FlowEvent;
pub use status::StepStatus;
pub use store::{Plan, PlanStore, StatusCounts};
pub use tool::{planning_parameters, planning_tool_schema, PlanCommand, PlanningArgs, PLANNING_TOOL};
