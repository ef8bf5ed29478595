//! planning 工具：命令参数定义与 JSON Schema 生成
//!
//! 参数结构体同时用于反序列化模型给出的参数（PlanStore::execute）与生成提供给模型的 schema。

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::llm::ToolSchema;
use crate::planning::StepStatus;

pub const PLANNING_TOOL: &str = "planning";

const PLANNING_DESCRIPTION: &str = "A planning tool that allows the agent to create and manage plans for solving complex tasks. \
The tool provides functionality for creating plans, updating plan steps, and tracking progress.";

/// 计划命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanCommand {
    Create,
    MarkStep,
    Get,
    Delete,
    List,
}

impl PlanCommand {
    pub const NAMES: [&'static str; 5] = ["create", "mark_step", "get", "delete", "list"];
}

/// planning 工具参数
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PlanningArgs {
    /// The command to execute. Available commands: create, mark_step, get, delete, list.
    pub command: PlanCommand,
    /// Unique identifier for the plan. Required for create, mark_step, get and delete.
    #[serde(default)]
    pub plan_id: Option<String>,
    /// Title for the plan. Required for create command.
    #[serde(default)]
    pub title: Option<String>,
    /// List of plan steps. Required for create command.
    #[serde(default)]
    pub steps: Option<Vec<String>>,
    /// Index of the step to update (0-based). Required for mark_step command.
    #[serde(default)]
    pub step_index: Option<usize>,
    /// Status to set for a step. Used with mark_step command.
    #[serde(default)]
    pub step_status: Option<StepStatus>,
    /// Additional notes for a step. Optional for mark_step command.
    #[serde(default)]
    pub step_notes: Option<String>,
}

/// 生成 planning 工具的参数 schema（子 schema 内联，去掉 $schema / title 元信息）
pub fn planning_parameters() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|s| s.inline_subschemas = true)
        .into_generator();
    let root = generator.into_root_schema_for::<PlanningArgs>();
    let mut value = serde_json::to_value(root).unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("definitions");
    }
    value
}

/// 提供给模型的 planning 工具描述
pub fn planning_tool_schema() -> ToolSchema {
    ToolSchema {
        name: PLANNING_TOOL.to_string(),
        description: PLANNING_DESCRIPTION.to_string(),
        parameters: planning_parameters(),
    }
}
