//! 计划存储
//!
//! 内存中的计划记录：有序步骤 + 与之平行的状态 / 备注数组，只通过少量命令修改
//! （create / mark_step / get / delete / list）。外部修改可能让状态或备注数组短于步骤数，
//! 读取时把缺失项视为 NotStarted / 空备注，写入时补齐。

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::core::PlanError;
use crate::planning::{PlanCommand, PlanningArgs, StepStatus};

/// 单个计划
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub id: String,
    pub title: String,
    pub steps: Vec<String>,
    pub step_statuses: Vec<StepStatus>,
    pub step_notes: Vec<String>,
}

/// 各状态计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub not_started: usize,
    pub in_progress: usize,
    pub blocked: usize,
    pub completed: usize,
}

impl Plan {
    pub fn new(id: impl Into<String>, title: impl Into<String>, steps: Vec<String>) -> Self {
        let n = steps.len();
        Self {
            id: id.into(),
            title: title.into(),
            steps,
            step_statuses: vec![StepStatus::NotStarted; n],
            step_notes: vec![String::new(); n],
        }
    }

    /// 越界下标视为 NotStarted
    pub fn status_at(&self, index: usize) -> StepStatus {
        self.step_statuses.get(index).copied().unwrap_or_default()
    }

    pub fn note_at(&self, index: usize) -> &str {
        self.step_notes.get(index).map(String::as_str).unwrap_or("")
    }

    /// 补齐状态与备注数组到步骤数（只增不减）
    pub fn normalize(&mut self) {
        self.pad_to(self.steps.len());
    }

    fn pad_to(&mut self, len: usize) {
        if self.step_statuses.len() < len {
            self.step_statuses.resize(len, StepStatus::NotStarted);
        }
        if self.step_notes.len() < len {
            self.step_notes.resize(len, String::new());
        }
    }

    /// 直接写入状态（命令接口失败时的降级路径）
    pub fn force_status(&mut self, index: usize, status: StepStatus) {
        self.pad_to(self.steps.len().max(index + 1));
        self.step_statuses[index] = status;
    }

    /// 第一个处于活动状态的步骤下标
    pub fn first_active(&self) -> Option<usize> {
        (0..self.steps.len()).find(|&i| self.status_at(i).is_active())
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for i in 0..self.steps.len() {
            match self.status_at(i) {
                StepStatus::NotStarted => counts.not_started += 1,
                StepStatus::InProgress => counts.in_progress += 1,
                StepStatus::Blocked => counts.blocked += 1,
                StepStatus::Completed => counts.completed += 1,
            }
        }
        counts
    }

    /// 完成百分比；无步骤时为 0
    pub fn progress(&self) -> f64 {
        let total = self.steps.len();
        if total == 0 {
            return 0.0;
        }
        self.counts().completed as f64 / total as f64 * 100.0
    }

    /// 文本展示（纯函数，不修改计划）
    pub fn render(&self) -> String {
        let header = format!("Plan: {} (ID: {})", self.title, self.id);
        let counts = self.counts();
        // 下划线比标题行多一个字符（计入换行）
        let mut out = format!("{}\n{}\n\n", header, "=".repeat(header.chars().count() + 1));
        out.push_str(&format!(
            "Progress: {}/{} steps completed ({:.1}%)\n",
            counts.completed,
            self.steps.len(),
            self.progress()
        ));
        out.push_str(&format!(
            "Status: {} completed, {} in progress, {} blocked, {} not started\n\n",
            counts.completed, counts.in_progress, counts.blocked, counts.not_started
        ));
        out.push_str("Steps:\n");
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("{}. {} {}\n", i, self.status_at(i).glyph(), step));
            let note = self.note_at(i);
            if !note.is_empty() {
                out.push_str(&format!("   Notes: {}\n", note));
            }
        }
        out
    }
}

/// 计划存储：按 id 保存计划，引擎独占持有
#[derive(Debug, Default)]
pub struct PlanStore {
    plans: BTreeMap<String, Plan>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.plans.contains_key(id)
    }

    pub fn plan(&self, id: &str) -> Option<&Plan> {
        self.plans.get(id)
    }

    pub fn plan_mut(&mut self, id: &str) -> Option<&mut Plan> {
        self.plans.get_mut(id)
    }

    /// 直接插入计划（外部构造的计划，可能数组不齐）
    pub fn insert(&mut self, plan: Plan) {
        self.plans.insert(plan.id.clone(), plan);
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn create(&mut self, id: &str, title: &str, steps: Vec<String>) -> Result<String, PlanError> {
        if id.trim().is_empty() {
            return Err(PlanError::MissingParameter("plan_id"));
        }
        if self.plans.contains_key(id) {
            return Err(PlanError::PlanExists(id.to_string()));
        }
        let plan = Plan::new(id, title, steps);
        let rendered = plan.render();
        self.plans.insert(id.to_string(), plan);
        tracing::debug!(plan_id = %id, "plan created");
        Ok(format!("Plan created successfully with ID: {}\n\n{}", id, rendered))
    }

    /// 更新步骤状态 / 备注；status 或 note 为 None 时保留原值
    pub fn mark_step(
        &mut self,
        id: &str,
        index: usize,
        status: Option<StepStatus>,
        note: Option<String>,
    ) -> Result<String, PlanError> {
        let plan = self
            .plans
            .get_mut(id)
            .ok_or_else(|| PlanError::PlanNotFound(id.to_string()))?;
        if index >= plan.steps.len() {
            return Err(PlanError::StepIndexOutOfRange {
                index,
                len: plan.steps.len(),
            });
        }
        plan.normalize();
        if let Some(status) = status {
            plan.step_statuses[index] = status;
        }
        if let Some(note) = note {
            plan.step_notes[index] = note;
        }
        Ok(format!(
            "Step {} updated in plan '{}'.\n\n{}",
            index,
            id,
            plan.render()
        ))
    }

    pub fn get(&self, id: &str) -> Result<String, PlanError> {
        self.plans
            .get(id)
            .map(Plan::render)
            .ok_or_else(|| PlanError::PlanNotFound(id.to_string()))
    }

    pub fn delete(&mut self, id: &str) -> Result<String, PlanError> {
        self.plans
            .remove(id)
            .map(|_| format!("Plan '{}' has been deleted.", id))
            .ok_or_else(|| PlanError::PlanNotFound(id.to_string()))
    }

    pub fn list(&self) -> String {
        if self.plans.is_empty() {
            return "No plans available.".to_string();
        }
        let mut out = String::from("Available plans:\n");
        for plan in self.plans.values() {
            let counts = plan.counts();
            out.push_str(&format!(
                "• {}: {} - {}/{} steps completed\n",
                plan.id,
                plan.title,
                counts.completed,
                plan.steps.len()
            ));
        }
        out
    }

    /// 命令协议入口：参数为模型或引擎给出的 JSON 对象
    pub fn execute(&mut self, args: Value) -> Result<String, PlanError> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or(PlanError::MissingParameter("command"))?;
        if !PlanCommand::NAMES.contains(&command) {
            return Err(PlanError::UnknownCommand(command.to_string()));
        }
        let args: PlanningArgs =
            serde_json::from_value(args).map_err(|e| PlanError::InvalidParameter {
                name: "arguments",
                reason: e.to_string(),
            })?;

        let plan_id = || {
            args.plan_id
                .as_deref()
                .filter(|id| !id.trim().is_empty())
                .ok_or(PlanError::MissingParameter("plan_id"))
        };

        match args.command {
            PlanCommand::Create => {
                let title = args
                    .title
                    .as_deref()
                    .ok_or(PlanError::MissingParameter("title"))?;
                let steps = args
                    .steps
                    .clone()
                    .ok_or(PlanError::MissingParameter("steps"))?;
                self.create(plan_id()?, title, steps)
            }
            PlanCommand::MarkStep => {
                let index = args
                    .step_index
                    .ok_or(PlanError::MissingParameter("step_index"))?;
                self.mark_step(plan_id()?, index, args.step_status, args.step_notes.clone())
            }
            PlanCommand::Get => self.get(plan_id()?),
            PlanCommand::Delete => self.delete(plan_id()?),
            PlanCommand::List => Ok(self.list()),
        }
    }
}
