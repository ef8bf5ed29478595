//! 计划执行引擎
//!
//! 一次运行的流程：
//! 1. 建计划：只提供 planning 工具调用 LLM，plan_id 强制为本次运行的 id；无可用调用或 LLM 失败时建默认三步计划。
//!    输入为空时不建计划，续跑 active_plan_id 对应的已有计划
//! 2. 循环：取第一个活动步骤并标为 in_progress → 选执行器（显式标签 > LLM 推荐精确匹配 > 模糊匹配 > 按顺序默认）
//!    → 执行步骤 → 无条件标为 completed（失败文本写入备注）→ 执行器 Finished 时提前结束
//! 3. 无活动步骤时由 LLM 总结；失败时改由主执行器总结，再失败则返回固定文本
//!
//! 引擎是唯一的错误边界：execute 从不返回 Err，只有 execute_with_timeout 区分超时。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agent::ExecutorSet;
use crate::core::{AgentError, AgentState, RunError};
use crate::llm::{LlmClient, LlmError, ToolChoice};
use crate::memory::Message;
use crate::planning::prompts::{
    dispatcher_request, planning_request, step_prompt, summary_fallback_request, summary_request,
    DISPATCHER_SYSTEM_PROMPT, PLANNING_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT,
};
use crate::planning::{planning_tool_schema, FlowEvent, PlanStore, StepStatus, PLANNING_TOOL};

const TITLE_MAX_CHARS: usize = 50;
const PREVIEW_MAX_CHARS: usize = 200;
const SUMMARY_FAILED: &str = "Plan completed. Error generating summary.";

static STEP_TAG_RE: OnceLock<Regex> = OnceLock::new();

/// 选中的步骤
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    pub index: usize,
    pub text: String,
    /// 步骤文本开头的 `[Key]` 标签
    pub step_type: Option<String>,
}

impl StepInfo {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let step_type = parse_step_type(&text);
        Self {
            index,
            text,
            step_type,
        }
    }
}

/// 解析步骤文本开头的 `[Key]` 标签
pub fn parse_step_type(text: &str) -> Option<String> {
    let re = STEP_TAG_RE.get_or_init(|| Regex::new(r"^\s*\[([A-Za-z][\w-]*)\]").unwrap());
    re.captures(text).map(|c| c[1].to_string())
}

/// LLM 推荐结果与执行器 key 的匹配：精确匹配优先，否则按注册顺序取第一个双向包含（忽略大小写）的 key
pub fn match_executor_key(response: &str, keys: &[String]) -> Option<String> {
    let response = response.trim();
    if response.is_empty() {
        return None;
    }
    if let Some(key) = keys.iter().find(|k| k.as_str() == response) {
        return Some(key.clone());
    }
    let lower = response.to_lowercase();
    keys.iter()
        .find(|k| {
            let key = k.to_lowercase();
            key.contains(&lower) || lower.contains(&key)
        })
        .cloned()
}

/// 默认计划步骤，按请求语言本地化
pub fn default_plan_steps(request: &str) -> Vec<String> {
    let steps: [&str; 3] = if request.chars().any(|c| c as u32 > 0x3000) {
        ["分析需求", "执行任务", "验证结果"]
    } else if request.chars().any(|c| ('\u{0400}'..='\u{04FF}').contains(&c)) {
        ["Анализ запроса", "Выполнение задачи", "Проверка результатов"]
    } else {
        ["Analyze request", "Execute task", "Verify results"]
    };
    steps.iter().map(|s| s.to_string()).collect()
}

/// 默认计划标题：请求前 50 个字符，截断时加 "..."
pub fn default_plan_title(request: &str) -> String {
    let head: String = request.chars().take(TITLE_MAX_CHARS).collect();
    if request.chars().count() > TITLE_MAX_CHARS {
        format!("Plan for: {}...", head)
    } else {
        format!("Plan for: {}", head)
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
    if text.chars().count() > PREVIEW_MAX_CHARS {
        out.push_str("...");
    }
    out
}

fn new_plan_id() -> String {
    format!("plan_{}", uuid::Uuid::new_v4())
}

/// 计划执行引擎：独占计划存储与执行器集合
pub struct PlanExecutionEngine {
    llm: Arc<dyn LlmClient>,
    store: PlanStore,
    executors: ExecutorSet,
    executor_keys: Vec<String>,
    primary_key: String,
    active_plan_id: String,
    current_step_index: Option<usize>,
    /// 上一步使用的执行器，切换时清理其资源
    last_executor: Option<String>,
    event_tx: Option<mpsc::UnboundedSender<FlowEvent>>,
    cancel_token: CancellationToken,
}

impl PlanExecutionEngine {
    /// 主执行器默认取第一个注册的执行器
    pub fn new(llm: Arc<dyn LlmClient>, executors: ExecutorSet) -> Self {
        let executor_keys = executors.keys();
        let primary_key = executors.first_key().unwrap_or_default();
        Self {
            llm,
            store: PlanStore::new(),
            executors,
            executor_keys,
            primary_key,
            active_plan_id: new_plan_id(),
            current_step_index: None,
            last_executor: None,
            event_tx: None,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_primary(mut self, key: impl Into<String>) -> Self {
        self.primary_key = key.into();
        self
    }

    /// 默认选择的候选顺序（可与注册顺序不同）
    pub fn with_executor_keys(mut self, keys: Vec<String>) -> Self {
        self.executor_keys = keys;
        self
    }

    pub fn with_plan_id(mut self, plan_id: impl Into<String>) -> Self {
        self.active_plan_id = plan_id.into();
        self
    }

    pub fn with_store(mut self, store: PlanStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_event_tx(mut self, tx: mpsc::UnboundedSender<FlowEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn active_plan_id(&self) -> &str {
        &self.active_plan_id
    }

    pub fn current_step_index(&self) -> Option<usize> {
        self.current_step_index
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn store(&self) -> &PlanStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PlanStore {
        &mut self.store
    }

    pub fn executors(&self) -> &ExecutorSet {
        &self.executors
    }

    fn emit(&self, event: FlowEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// 执行一次完整运行；任何失败都转为 "Execution failed: ..." 文本
    pub async fn execute(&mut self, input: &str) -> String {
        match self.run(input).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(plan_id = %self.active_plan_id, error = %e, "plan execution failed");
                e.to_string()
            }
        }
    }

    /// 带整体超时的运行；超时后仍清理执行器资源
    pub async fn execute_with_timeout(&mut self, input: &str, limit: Duration) -> Result<String, RunError> {
        match tokio::time::timeout(limit, self.execute(input)).await {
            Ok(result) => Ok(result),
            Err(_) => {
                tracing::error!(plan_id = %self.active_plan_id, timeout_secs = limit.as_secs(), "plan execution timed out");
                self.cleanup_executors().await;
                Err(RunError::Timeout(limit))
            }
        }
    }

    async fn run(&mut self, input: &str) -> Result<String, RunError> {
        if !self.executors.contains(&self.primary_key) {
            return Err(RunError::Failed(format!(
                "Primary agent '{}' is not registered",
                self.primary_key
            )));
        }
        self.current_step_index = None;
        self.last_executor = None;

        if !input.trim().is_empty() {
            if self.store.contains(&self.active_plan_id) {
                self.active_plan_id = new_plan_id();
            }
            self.create_initial_plan(input).await;
            if !self.store.contains(&self.active_plan_id) {
                tracing::error!(plan_id = %self.active_plan_id, "plan not found after creation");
                return Err(RunError::Failed(format!("Failed to create plan for: {}", input)));
            }
        } else if !self.store.contains(&self.active_plan_id) {
            // 空输入只续跑已有计划
            tracing::error!(plan_id = %self.active_plan_id, "no plan to resume");
            return Err(RunError::Failed(format!("Plan with ID {} not found", self.active_plan_id)));
        } else {
            tracing::info!(plan_id = %self.active_plan_id, "Resuming existing plan");
        }

        let mut result = String::new();
        loop {
            if self.cancel_token.is_cancelled() {
                self.cleanup_executors().await;
                return Err(RunError::Failed("Cancelled by user".to_string()));
            }
            let Some(step) = self.get_current_step_info() else {
                result.push_str(&self.finalize_plan().await);
                break;
            };
            let key = self.get_executor(Some(&step)).await;
            let step_result = self.execute_step(&key, &step).await;
            result.push_str(&step_result);
            result.push('\n');

            if self.executors.get(&key).map(|e| e.state()) == Some(AgentState::Finished) {
                tracing::info!(plan_id = %self.active_plan_id, executor = %key, "executor finished, stopping plan early");
                break;
            }
        }

        self.cleanup_executors().await;
        if let Some(plan) = self.store.plan(&self.active_plan_id) {
            self.emit(FlowEvent::RunFinished {
                completed: plan.counts().completed,
                total: plan.steps.len(),
            });
        }
        Ok(result)
    }

    /// 让 LLM 通过 planning 工具建计划；失败时建默认计划
    async fn create_initial_plan(&mut self, request: &str) {
        tracing::info!(plan_id = %self.active_plan_id, "Creating initial plan");
        let messages = [
            Message::system(PLANNING_SYSTEM_PROMPT),
            Message::user(planning_request(request)),
        ];
        let tools = [planning_tool_schema()];

        match self.llm.complete_with_tools(&messages, &tools, ToolChoice::Auto).await {
            Ok(completion) => {
                for call in completion.tool_calls() {
                    if call.name != PLANNING_TOOL {
                        continue;
                    }
                    let Some(Value::Object(args)) = call.arguments.as_value() else {
                        tracing::warn!(tool = %call.name, raw = %call.arguments.to_raw(), "Failed to parse planning arguments, skipping");
                        continue;
                    };
                    let mut args = args.clone();
                    args.insert("plan_id".to_string(), Value::String(self.active_plan_id.clone()));
                    match self.store.execute(Value::Object(args)) {
                        Ok(output) => tracing::info!(plan_id = %self.active_plan_id, "Plan creation result: {}", output),
                        Err(e) => tracing::warn!(plan_id = %self.active_plan_id, error = %e, "planning call rejected"),
                    }
                    if self.store.contains(&self.active_plan_id) {
                        self.emit_plan_created(false);
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(plan_id = %self.active_plan_id, error = %e, "LLM plan creation failed");
            }
        }

        tracing::warn!(plan_id = %self.active_plan_id, "Creating default plan");
        let id = self.active_plan_id.clone();
        match self
            .store
            .create(&id, &default_plan_title(request), default_plan_steps(request))
        {
            Ok(_) => self.emit_plan_created(true),
            Err(e) => tracing::error!(plan_id = %id, error = %e, "default plan creation failed"),
        }
    }

    fn emit_plan_created(&self, fallback: bool) {
        if let Some(plan) = self.store.plan(&self.active_plan_id) {
            self.emit(FlowEvent::PlanCreated {
                plan_id: plan.id.clone(),
                title: plan.title.clone(),
                steps: plan.steps.clone(),
                fallback,
            });
        }
    }

    /// 第一个活动步骤：标为 in_progress 后返回；无活动步骤时返回 None
    pub fn get_current_step_info(&mut self) -> Option<StepInfo> {
        let Some(plan) = self.store.plan(&self.active_plan_id) else {
            tracing::error!(plan_id = %self.active_plan_id, "Plan not found");
            self.current_step_index = None;
            return None;
        };
        let Some(index) = plan.first_active() else {
            self.current_step_index = None;
            return None;
        };
        let mut info = StepInfo::new(index, plan.steps[index].clone());
        if info.text.trim().is_empty() {
            info.text = "Execute next task".to_string();
        }
        self.write_status(index, StepStatus::InProgress, None);
        self.current_step_index = Some(index);
        Some(info)
    }

    /// 两层写入：先走命令接口，失败时直接修改计划并记录
    fn write_status(&mut self, index: usize, status: StepStatus, note: Option<String>) {
        let id = self.active_plan_id.clone();
        if let Err(e) = self.store.mark_step(&id, index, Some(status), note.clone()) {
            tracing::warn!(plan_id = %id, step = index, error = %e, "mark_step failed, updating plan directly");
            if let Some(plan) = self.store.plan_mut(&id) {
                plan.force_status(index, status);
                if let Some(note) = note {
                    plan.step_notes[index] = note;
                }
            }
        }
    }

    /// 默认执行器：executor_keys 中第一个已注册的，否则主执行器
    fn default_executor_key(&self) -> String {
        self.executor_keys
            .iter()
            .find(|k| self.executors.contains(k))
            .cloned()
            .unwrap_or_else(|| self.primary_key.clone())
    }

    /// 选择执行器 key：显式标签 > LLM 推荐（精确 / 模糊）> 默认
    pub async fn get_executor(&self, step: Option<&StepInfo>) -> String {
        let Some(step) = step else {
            return self.default_executor_key();
        };
        if let Some(tag) = step.step_type.as_deref().filter(|t| self.executors.contains(t)) {
            tracing::info!(executor = %tag, "Using explicitly tagged agent for step");
            return tag.to_string();
        }
        match self.recommend_executor(&step.text).await {
            Ok(Some(key)) => {
                tracing::info!(executor = %key, step = step.index, "Automatically selecting agent for step");
                key
            }
            Ok(None) => {
                tracing::warn!(step = step.index, "Recommended unknown agent, falling back to default selection");
                self.default_executor_key()
            }
            Err(e) => {
                tracing::warn!(step = step.index, error = %e, "agent recommendation failed, falling back to default selection");
                self.default_executor_key()
            }
        }
    }

    async fn recommend_executor(&self, step_text: &str) -> Result<Option<String>, LlmError> {
        let messages = [
            Message::system(DISPATCHER_SYSTEM_PROMPT),
            Message::user(dispatcher_request(step_text, &self.executors.descriptions())),
        ];
        let response = self.llm.complete(&messages).await?;
        Ok(match_executor_key(&response, &self.executors.keys()))
    }

    /// 切换执行器时清理上一个执行器的资源
    async fn switch_executor(&mut self, key: &str) {
        if let Some(previous) = self.last_executor.take() {
            if previous != key {
                if let Some(executor) = self.executors.get_mut(&previous) {
                    executor.cleanup().await;
                }
            }
        }
        self.last_executor = Some(key.to_string());
    }

    async fn execute_step(&mut self, key: &str, step: &StepInfo) -> String {
        let plan_status = self.plan_text();
        let prompt = step_prompt(&plan_status, step.index, &step.text);
        self.emit(FlowEvent::StepStarted {
            index: step.index,
            text: step.text.clone(),
            executor: key.to_string(),
        });
        self.switch_executor(key).await;

        let cancel = self.cancel_token.clone();
        let outcome = match self.executors.get_mut(key) {
            Some(executor) => {
                if executor.state() != AgentState::Idle {
                    executor.reset();
                }
                tokio::select! {
                    r = executor.run(&prompt) => r,
                    _ = cancel.cancelled() => Err(AgentError::RunAborted("Cancelled by user".to_string())),
                }
            }
            None => Err(AgentError::ConfigError(format!("executor not registered: {}", key))),
        };

        let (text, note) = match outcome {
            Ok(text) => (text, None),
            Err(e) => {
                tracing::error!(plan_id = %self.active_plan_id, step = step.index, executor = %key, error = %e, "step execution failed");
                let text = format!("Error executing step {}: {}", step.index, e);
                (text.clone(), Some(text))
            }
        };
        self.write_status(step.index, StepStatus::Completed, note);
        tracing::info!(plan_id = %self.active_plan_id, step = step.index, executor = %key, "Marked step as completed");
        self.emit(FlowEvent::StepFinished {
            index: step.index,
            status: StepStatus::Completed,
            preview: preview(&text),
        });
        text
    }

    /// 当前计划文本；get 失败时从存储快照渲染
    fn plan_text(&self) -> String {
        match self.store.get(&self.active_plan_id) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(plan_id = %self.active_plan_id, error = %e, "Error getting plan");
                self.plan_text_from_storage()
            }
        }
    }

    fn plan_text_from_storage(&self) -> String {
        match self.store.plan(&self.active_plan_id) {
            Some(plan) => {
                let mut snapshot = plan.clone();
                snapshot.normalize();
                snapshot.render()
            }
            None => format!("Error: Plan with ID {} not found", self.active_plan_id),
        }
    }

    async fn finalize_plan(&mut self) -> String {
        let plan_text = self.plan_text();
        let messages = [
            Message::system(SUMMARY_SYSTEM_PROMPT),
            Message::user(summary_request(&plan_text)),
        ];
        match self.llm.complete(&messages).await {
            Ok(summary) => format!("Plan completed:\n\n{}", summary),
            Err(e) => {
                tracing::error!(plan_id = %self.active_plan_id, error = %e, "Error finalizing plan with LLM");
                let Some(primary) = self.executors.get_mut(&self.primary_key) else {
                    return SUMMARY_FAILED.to_string();
                };
                if primary.state() != AgentState::Idle {
                    primary.reset();
                }
                match primary.run(&summary_fallback_request(&plan_text)).await {
                    Ok(summary) => format!("Plan completed:\n\n{}", summary),
                    Err(e) => {
                        tracing::error!(plan_id = %self.active_plan_id, error = %e, "Error finalizing plan with agent");
                        SUMMARY_FAILED.to_string()
                    }
                }
            }
        }
    }

    /// 清理全部执行器的有状态工具（幂等）
    pub async fn cleanup_executors(&mut self) {
        for executor in self.executors.iter_mut() {
            executor.cleanup().await;
        }
        self.last_executor = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::agent::Executor;
    use crate::llm::ScriptedLlmClient;
    use crate::planning::Plan;

    #[derive(Clone, Copy, PartialEq)]
    enum Behavior {
        Ok,
        Fail,
        Finish,
    }

    struct StubExecutor {
        key: &'static str,
        behavior: Behavior,
        state: AgentState,
        prompts: Arc<Mutex<Vec<String>>>,
        cleanups: Arc<AtomicUsize>,
    }

    impl StubExecutor {
        fn new(key: &'static str, behavior: Behavior) -> Self {
            Self {
                key,
                behavior,
                state: AgentState::Idle,
                prompts: Arc::default(),
                cleanups: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl Executor for StubExecutor {
        fn key(&self) -> &str {
            self.key
        }
        fn description(&self) -> &str {
            "stub executor"
        }
        fn state(&self) -> AgentState {
            self.state
        }
        async fn run(&mut self, prompt: &str) -> Result<String, AgentError> {
            if self.state != AgentState::Idle {
                return Err(AgentError::InvalidState(self.state));
            }
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.behavior {
                Behavior::Ok => Ok(format!("{} done", self.key)),
                Behavior::Fail => {
                    self.state = AgentState::Error;
                    Err(AgentError::RunAborted("boom".into()))
                }
                Behavior::Finish => {
                    self.state = AgentState::Finished;
                    Ok(format!("{} finished", self.key))
                }
            }
        }
        fn reset(&mut self) {
            self.state = AgentState::Idle;
        }
        async fn cleanup(&mut self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn set(stubs: Vec<StubExecutor>) -> ExecutorSet {
        let mut set = ExecutorSet::new();
        for stub in stubs {
            set.register(Box::new(stub)).unwrap();
        }
        set
    }

    fn engine_with(llm: Arc<ScriptedLlmClient>, stubs: Vec<StubExecutor>) -> PlanExecutionEngine {
        PlanExecutionEngine::new(llm, set(stubs)).with_plan_id("plan_test")
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_plan_is_localized() {
        assert_eq!(default_plan_steps("hi"), keys(&["Analyze request", "Execute task", "Verify results"]));
        assert_eq!(default_plan_steps("写一个爬虫"), keys(&["分析需求", "执行任务", "验证结果"]));
        assert_eq!(
            default_plan_steps("привет"),
            keys(&["Анализ запроса", "Выполнение задачи", "Проверка результатов"])
        );
    }

    #[test]
    fn test_default_title_truncates_at_50_chars() {
        assert_eq!(default_plan_title("hi"), "Plan for: hi");
        let long = "x".repeat(60);
        assert_eq!(default_plan_title(&long), format!("Plan for: {}...", "x".repeat(50)));
        assert_eq!(default_plan_title(&"y".repeat(50)), format!("Plan for: {}", "y".repeat(50)));
    }

    #[test]
    fn test_step_type_tag() {
        assert_eq!(parse_step_type("[WebAgent] search docs").as_deref(), Some("WebAgent"));
        assert_eq!(parse_step_type("  [SWEAgent]write"), Some("SWEAgent".to_string()));
        assert_eq!(parse_step_type("search [WebAgent]"), None);
        assert_eq!(parse_step_type("plain step"), None);
    }

    #[test]
    fn test_match_executor_key_exact_then_fuzzy() {
        let agents = keys(&["WebAgent", "SWEAgent", "DataMiner"]);
        assert_eq!(match_executor_key(" SWEAgent \n", &agents).as_deref(), Some("SWEAgent"));
        assert_eq!(match_executor_key("webagent", &agents).as_deref(), Some("WebAgent"));
        assert_eq!(match_executor_key("Use the DataMiner agent", &agents).as_deref(), Some("DataMiner"));
        assert_eq!(match_executor_key("", &agents), None);
        assert_eq!(match_executor_key("Painter", &agents), None);
        // 多个 key 都能匹配时取注册顺序中的第一个
        let overlapping = keys(&["Agent", "WebAgent"]);
        assert_eq!(match_executor_key("webagent", &overlapping).as_deref(), Some("Agent"));
    }

    #[tokio::test]
    async fn test_step_selection_walks_lowest_active_index() {
        let llm = Arc::new(ScriptedLlmClient::new());
        let mut store = PlanStore::new();
        store
            .create("plan_test", "t", keys(&["Analyze request", "Execute task", "Verify results"]))
            .unwrap();
        let mut engine = engine_with(llm, vec![StubExecutor::new("WebAgent", Behavior::Ok)]).with_store(store);

        let first = engine.get_current_step_info().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(engine.current_step_index(), Some(0));
        assert_eq!(engine.store().plan("plan_test").unwrap().status_at(0), StepStatus::InProgress);

        // in_progress 仍是活动状态
        assert_eq!(engine.get_current_step_info().unwrap().index, 0);

        engine
            .store_mut()
            .mark_step("plan_test", 0, Some(StepStatus::Completed), None)
            .unwrap();
        assert_eq!(engine.get_current_step_info().unwrap().index, 1);

        for i in 1..3 {
            engine.store_mut().mark_step("plan_test", i, Some(StepStatus::Completed), None).unwrap();
        }
        assert_eq!(engine.get_current_step_info(), None);
        assert_eq!(engine.current_step_index(), None);
    }

    #[tokio::test]
    async fn test_step_selection_pads_short_status_arrays() {
        let llm = Arc::new(ScriptedLlmClient::new());
        let mut store = PlanStore::new();
        store.insert(Plan {
            id: "plan_test".into(),
            title: "t".into(),
            steps: keys(&["a", "b", "c"]),
            step_statuses: vec![StepStatus::Completed],
            step_notes: vec![],
        });
        let mut engine = engine_with(llm, vec![StubExecutor::new("WebAgent", Behavior::Ok)]).with_store(store);
        assert_eq!(engine.get_current_step_info().unwrap().index, 1);
        let plan = engine.store().plan("plan_test").unwrap();
        assert_eq!(plan.step_statuses.len(), 3);
        assert_eq!(plan.step_notes.len(), 3);
    }

    #[tokio::test]
    async fn test_explicit_tag_skips_oracle() {
        let llm = Arc::new(ScriptedLlmClient::new());
        let engine = engine_with(
            llm.clone(),
            vec![StubExecutor::new("SWEAgent", Behavior::Ok), StubExecutor::new("WebAgent", Behavior::Ok)],
        );
        let step = StepInfo::new(0, "[WebAgent] find the docs");
        assert_eq!(engine.get_executor(Some(&step)).await, "WebAgent");
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_oracle_recommendation_and_fallbacks() {
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_text("webagent")
                .with_text("Painter")
                .with_error(LlmError::Request("down".into())),
        );
        let engine = engine_with(
            llm.clone(),
            vec![StubExecutor::new("SWEAgent", Behavior::Ok), StubExecutor::new("WebAgent", Behavior::Ok)],
        )
        .with_executor_keys(keys(&["Missing", "SWEAgent"]));
        let step = StepInfo::new(0, "look something up");

        assert_eq!(engine.get_executor(Some(&step)).await, "WebAgent");
        assert_eq!(engine.get_executor(Some(&step)).await, "SWEAgent");
        assert_eq!(engine.get_executor(Some(&step)).await, "SWEAgent");
        assert_eq!(engine.get_executor(None).await, "SWEAgent");
        assert_eq!(llm.call_count(), 3);

        // 未知标签不短路，仍询问 LLM
        let tagged = StepInfo::new(1, "[Painter] draw");
        assert_eq!(engine.get_executor(Some(&tagged)).await, "SWEAgent");
        assert_eq!(llm.call_count(), 4);
    }

    #[tokio::test]
    async fn test_hi_without_tool_call_uses_default_plan() {
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_text("no plan from me")
                .with_text("WebAgent")
                .with_text("WebAgent")
                .with_text("WebAgent")
                .with_text("all good"),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = engine_with(llm.clone(), vec![StubExecutor::new("WebAgent", Behavior::Ok)]).with_event_tx(tx);

        let out = engine.execute("hi").await;
        let plan = engine.store().plan(engine.active_plan_id()).unwrap();
        assert_eq!(plan.steps, keys(&["Analyze request", "Execute task", "Verify results"]));
        assert_eq!(plan.title, "Plan for: hi");
        assert_eq!(plan.counts().completed, 3);
        assert_eq!(out, "WebAgent done\nWebAgent done\nWebAgent done\nPlan completed:\n\nall good");

        match rx.recv().await.unwrap() {
            FlowEvent::PlanCreated { fallback, steps, .. } => {
                assert!(fallback);
                assert_eq!(steps.len(), 3);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_planning_call_gets_forced_plan_id() {
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_tool_calls(&[
                    ("planning", "{not json"),
                    (
                        "planning",
                        r#"{"command":"create","plan_id":"model_id","title":"Docs","steps":["[WebAgent] read","[SWEAgent] write"]}"#,
                    ),
                ])
                .with_text("done"),
        );
        let web = StubExecutor::new("WebAgent", Behavior::Ok);
        let swe = StubExecutor::new("SWEAgent", Behavior::Ok);
        let swe_prompts = swe.prompts.clone();
        let web_cleanups = web.cleanups.clone();
        let mut engine = engine_with(llm.clone(), vec![web, swe]);

        let out = engine.execute("write docs").await;
        assert!(engine.store().plan("model_id").is_none());
        let plan = engine.store().plan("plan_test").unwrap();
        assert_eq!(plan.title, "Docs");
        assert_eq!(out, "WebAgent done\nSWEAgent done\nPlan completed:\n\ndone");
        // 只有建计划与总结两次 LLM 调用，标签步骤不询问
        assert_eq!(llm.call_count(), 2);

        let prompts = swe_prompts.lock().unwrap();
        assert!(prompts[0].contains("CURRENT PLAN STATUS:\nPlan: Docs (ID: plan_test)"));
        assert!(prompts[0].contains("You are now working on step 1: \"[SWEAgent] write\""));
        // 切换执行器时清理一次，运行结束再清理一次
        assert_eq!(web_cleanups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_step_failure_is_recorded_and_plan_continues() {
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_tool_calls(&[(
                    "planning",
                    r#"{"command":"create","title":"T","steps":["[SWEAgent] one","[WebAgent] two"]}"#,
                )])
                .with_text("summary"),
        );
        let mut engine = engine_with(
            llm,
            vec![StubExecutor::new("WebAgent", Behavior::Ok), StubExecutor::new("SWEAgent", Behavior::Fail)],
        );
        let out = engine.execute("task").await;
        assert!(out.starts_with("Error executing step 0: Run aborted: boom\nWebAgent done\n"));
        let plan = engine.store().plan("plan_test").unwrap();
        assert_eq!(plan.status_at(0), StepStatus::Completed);
        assert_eq!(plan.note_at(0), "Error executing step 0: Run aborted: boom");
        assert_eq!(plan.status_at(1), StepStatus::Completed);
    }

    #[tokio::test]
    async fn test_finished_executor_stops_plan_early() {
        let llm = Arc::new(ScriptedLlmClient::new().with_tool_calls(&[(
            "planning",
            r#"{"command":"create","title":"T","steps":["[WebAgent] one","[WebAgent] two"]}"#,
        )]));
        let mut engine = engine_with(llm.clone(), vec![StubExecutor::new("WebAgent", Behavior::Finish)]);
        let out = engine.execute("task").await;
        assert_eq!(out, "WebAgent finished\n");
        let plan = engine.store().plan("plan_test").unwrap();
        assert_eq!(plan.status_at(1), StepStatus::NotStarted);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_summary_falls_back_to_primary_then_fixed_text() {
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_text("no tools")
                .with_error(LlmError::Request("down".into()))
                .with_error(LlmError::Request("down".into()))
                .with_error(LlmError::Request("down".into()))
                .with_error(LlmError::Request("down".into())),
        );
        let mut engine = engine_with(llm, vec![StubExecutor::new("WebAgent", Behavior::Ok)]);
        let out = engine.execute("hi").await;
        assert!(out.ends_with("Plan completed:\n\nWebAgent done"));

        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_text("no tools")
                .with_error(LlmError::Request("down".into()))
                .with_error(LlmError::Request("down".into()))
                .with_error(LlmError::Request("down".into()))
                .with_error(LlmError::Request("down".into())),
        );
        let mut engine = engine_with(llm, vec![StubExecutor::new("WebAgent", Behavior::Fail)]);
        let out = engine.execute("hi").await;
        assert!(out.ends_with("Plan completed. Error generating summary."));
    }

    #[tokio::test]
    async fn test_empty_input_resumes_existing_plan() {
        let llm = Arc::new(ScriptedLlmClient::new().with_text("WebAgent").with_text("resumed"));
        let mut store = PlanStore::new();
        store.create("plan_test", "t", keys(&["a", "b"])).unwrap();
        store.mark_step("plan_test", 0, Some(StepStatus::Completed), None).unwrap();
        let mut engine = engine_with(llm.clone(), vec![StubExecutor::new("WebAgent", Behavior::Ok)]).with_store(store);

        let out = engine.execute("").await;
        assert_eq!(out, "WebAgent done\nPlan completed:\n\nresumed");
        assert_eq!(engine.active_plan_id(), "plan_test");
        assert_eq!(engine.store().len(), 1);
        assert_eq!(engine.store().plan("plan_test").unwrap().counts().completed, 2);
        // 不调用建计划，只有一次推荐与一次总结
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_new_input_with_taken_id_gets_fresh_plan() {
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_tool_calls(&[("planning", r#"{"command":"create","title":"New","steps":["[WebAgent] go"]}"#)])
                .with_text("ok"),
        );
        let mut store = PlanStore::new();
        store.create("plan_test", "Old", keys(&["x"])).unwrap();
        let mut engine = engine_with(llm, vec![StubExecutor::new("WebAgent", Behavior::Ok)]).with_store(store);

        engine.execute("new task").await;
        assert_ne!(engine.active_plan_id(), "plan_test");
        assert_eq!(engine.store().plan(engine.active_plan_id()).unwrap().title, "New");
        assert_eq!(engine.store().plan("plan_test").unwrap().status_at(0), StepStatus::NotStarted);
    }

    #[test]
    fn test_write_status_falls_back_to_direct_update() {
        let llm = Arc::new(ScriptedLlmClient::new());
        let mut store = PlanStore::new();
        store.insert(Plan {
            id: "plan_test".into(),
            title: "t".into(),
            steps: keys(&["a", "b"]),
            step_statuses: vec![StepStatus::Completed],
            step_notes: vec![],
        });
        let mut engine = engine_with(llm, vec![StubExecutor::new("WebAgent", Behavior::Ok)]).with_store(store);

        // 下标越界，mark_step 拒绝后直接写入并补齐
        engine.write_status(3, StepStatus::Blocked, Some("stuck".into()));
        let plan = engine.store().plan("plan_test").unwrap();
        assert_eq!(plan.step_statuses.len(), 4);
        assert_eq!(plan.step_notes.len(), 4);
        assert_eq!(plan.status_at(3), StepStatus::Blocked);
        assert_eq!(plan.note_at(3), "stuck");
        assert_eq!(plan.status_at(1), StepStatus::NotStarted);
        assert_eq!(plan.steps.len(), 2);

        // 计划不存在时两层都失败，不 panic
        let mut missing = engine_with(Arc::new(ScriptedLlmClient::new()), vec![StubExecutor::new("WebAgent", Behavior::Ok)]);
        missing.write_status(0, StepStatus::Completed, None);
        assert!(missing.store().is_empty());
    }

    #[test]
    fn test_plan_text_from_storage_pads_snapshot_only() {
        let llm = Arc::new(ScriptedLlmClient::new());
        let mut store = PlanStore::new();
        store.insert(Plan {
            id: "plan_test".into(),
            title: "Short".into(),
            steps: keys(&["a", "b", "c"]),
            step_statuses: vec![StepStatus::Completed],
            step_notes: vec!["done".into()],
        });
        let engine = engine_with(llm, vec![StubExecutor::new("WebAgent", Behavior::Ok)]).with_store(store);

        let text = engine.plan_text_from_storage();
        assert!(text.starts_with("Plan: Short (ID: plan_test)\n"));
        assert!(text.contains("0. [✓] a\n   Notes: done\n1. [ ] b\n2. [ ] c\n"));
        assert!(text.contains("Progress: 1/3 steps completed (33.3%)"));
        // 存储中的计划不被修改
        assert_eq!(engine.store().plan("plan_test").unwrap().step_statuses.len(), 1);

        let missing = engine_with(Arc::new(ScriptedLlmClient::new()), vec![StubExecutor::new("WebAgent", Behavior::Ok)]);
        assert_eq!(missing.plan_text_from_storage(), "Error: Plan with ID plan_test not found");
    }

    #[tokio::test]
    async fn test_empty_input_and_missing_primary_fail_as_text() {
        let llm = Arc::new(ScriptedLlmClient::new());
        let mut engine = engine_with(llm.clone(), vec![StubExecutor::new("WebAgent", Behavior::Ok)]);
        let out = engine.execute("   ").await;
        assert_eq!(out, "Execution failed: Plan with ID plan_test not found");
        assert_eq!(llm.call_count(), 0);

        let mut engine = engine_with(llm, vec![StubExecutor::new("WebAgent", Behavior::Ok)]).with_primary("Ghost");
        assert_eq!(engine.execute("hi").await, "Execution failed: Primary agent 'Ghost' is not registered");
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_failure() {
        let llm = Arc::new(ScriptedLlmClient::new().with_text("no tools"));
        let token = CancellationToken::new();
        token.cancel();
        let mut engine = engine_with(llm, vec![StubExecutor::new("WebAgent", Behavior::Ok)]).with_cancel_token(token);
        assert_eq!(engine.execute("hi").await, "Execution failed: Cancelled by user");
    }
}
