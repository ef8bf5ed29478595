//! 工具调用 Agent：有界 think → act 循环
//!
//! 流程：
//! 1. run(prompt) 仅允许从 Idle 进入，写入历史后置为 Running，步数归零
//! 2. think：渲染 next-step prompt 写入历史，携带 system prompt 与全部工具 schema 调用 LLM（ToolChoice::Auto）
//! 3. act：按顺序执行工具调用，每个调用写回一条 tool 消息（可截断），由画像记录调用
//! 4. 特殊工具（至少包含 terminate）：清理工具资源、置为 Finished，本轮剩余调用跳过
//! 5. 结束条件：特殊工具（Finished）、步数耗尽（追加提示后回到 Idle）、模型未调用工具（回到 Idle）
//!
//! 工具级失败成为该调用的观察文本；LLM 失败中止本次 run（Error 状态，清理资源）。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::{AgentProfile, Executor};
use crate::core::{AgentError, AgentState};
use crate::llm::{CompletionResult, LlmClient, ToolArguments, ToolCallRequest, ToolChoice};
use crate::memory::{ConversationMemory, Message};
use crate::tools::{ToolExecutor, TERMINATE_TOOL};

const DEFAULT_MAX_STEPS: usize = 30;
const DEFAULT_MEMORY_LIMIT: usize = 200;

/// 一轮思考的结果
enum Thought {
    Text(String),
    Calls(Vec<ToolCallRequest>),
}

pub struct ToolCallAgent {
    key: String,
    description: String,
    system_prompt: String,
    next_step_prompt: String,
    llm: Arc<dyn LlmClient>,
    tools: ToolExecutor,
    special_tools: Vec<String>,
    tool_choice: ToolChoice,
    memory: ConversationMemory,
    profile: AgentProfile,
    state: AgentState,
    max_steps: usize,
    current_step: usize,
    max_observe: Option<usize>,
}

impl ToolCallAgent {
    pub fn new(
        key: impl Into<String>,
        description: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        tools: ToolExecutor,
    ) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            system_prompt: String::new(),
            next_step_prompt: String::new(),
            llm,
            tools,
            special_tools: vec![TERMINATE_TOOL.to_string()],
            tool_choice: ToolChoice::Auto,
            memory: ConversationMemory::new(DEFAULT_MEMORY_LIMIT),
            profile: AgentProfile::Plain,
            state: AgentState::Idle,
            max_steps: DEFAULT_MAX_STEPS,
            current_step: 0,
            max_observe: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_next_step_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.next_step_prompt = prompt.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// 观察文本最大字符数
    pub fn with_max_observe(mut self, max_observe: Option<usize>) -> Self {
        self.max_observe = max_observe.filter(|n| *n > 0);
        self
    }

    /// 追加特殊工具名（terminate 总在其中）
    pub fn with_special_tools(mut self, names: &[&str]) -> Self {
        for name in names {
            if !self.special_tools.iter().any(|n| n == name) {
                self.special_tools.push(name.to_string());
            }
        }
        self
    }

    pub fn with_profile(mut self, profile: AgentProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn max_observe(&self) -> Option<usize> {
        self.max_observe
    }

    pub fn messages(&self) -> &[Message] {
        self.memory.messages()
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.tool_names()
    }

    fn is_special(&self, name: &str) -> bool {
        self.special_tools.iter().any(|n| n == name)
    }

    fn truncate_observation(&self, text: String) -> String {
        match self.max_observe {
            Some(max) if text.chars().count() > max => text.chars().take(max).collect(),
            _ => text,
        }
    }

    async fn think(&mut self) -> Result<Thought, AgentError> {
        let next = self.profile.render_next_step(&self.next_step_prompt);
        if !next.trim().is_empty() {
            self.memory.push(Message::user(next));
        }

        let mut messages = Vec::with_capacity(self.memory.len() + 1);
        if !self.system_prompt.is_empty() {
            messages.push(Message::system(self.system_prompt.clone()));
        }
        messages.extend(self.memory.messages().iter().cloned());

        let result = self
            .llm
            .complete_with_tools(&messages, &self.tools.schemas(), self.tool_choice)
            .await
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        match result {
            CompletionResult::ToolCalls { content, calls } if !calls.is_empty() => {
                let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                tracing::info!(agent = %self.key, step = self.current_step, tools = ?names, "selected tools");
                self.memory
                    .push(Message::assistant_tool_calls(content, calls.clone()));
                Ok(Thought::Calls(calls))
            }
            other => {
                let text = other.text().unwrap_or_default().to_string();
                tracing::info!(agent = %self.key, step = self.current_step, "no tool call, finishing run");
                self.memory.push(Message::assistant(text.clone()));
                Ok(Thought::Text(text))
            }
        }
    }

    async fn act(&mut self, calls: Vec<ToolCallRequest>) -> String {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let observation = match &call.arguments {
                ToolArguments::Malformed { error, .. } => {
                    tracing::warn!(agent = %self.key, tool = %call.name, error = %error, "malformed tool arguments");
                    format!("Error: Invalid arguments for {}: {}", call.name, error)
                }
                ToolArguments::Parsed(args) => match self.tools.execute(&call.name, args.clone()).await {
                    Ok(out) if out.trim().is_empty() => {
                        format!("Cmd `{}` completed with no output", call.name)
                    }
                    Ok(out) => format!("Observed output of cmd `{}` executed:\n{}", call.name, out),
                    Err(e) => {
                        tracing::warn!(agent = %self.key, tool = %call.name, error = %e, "tool failed");
                        format!("Error: {}", e)
                    }
                },
            };
            let observation = self.truncate_observation(observation);
            self.memory
                .push(Message::tool(observation.clone(), call.name.clone(), call.id.clone()));
            self.profile.observe(&call);
            results.push(observation);

            if self.is_special(&call.name) {
                tracing::info!(agent = %self.key, tool = %call.name, "special tool finished the task");
                self.tools.cleanup().await;
                self.state = AgentState::Finished;
                break;
            }
        }
        results.join("\n\n")
    }

    /// 单步：think，若有工具调用则 act；模型未调用工具时回到 Idle
    async fn step(&mut self) -> Result<String, AgentError> {
        match self.think().await? {
            Thought::Calls(calls) => Ok(self.act(calls).await),
            Thought::Text(text) => {
                self.state = AgentState::Idle;
                Ok(text)
            }
        }
    }
}

#[async_trait]
impl Executor for ToolCallAgent {
    fn key(&self) -> &str {
        &self.key
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn state(&self) -> AgentState {
        self.state
    }

    async fn run(&mut self, prompt: &str) -> Result<String, AgentError> {
        if self.state != AgentState::Idle {
            return Err(AgentError::InvalidState(self.state));
        }
        if !prompt.trim().is_empty() {
            self.memory.push(Message::user(prompt));
        }
        self.state = AgentState::Running;
        self.current_step = 0;

        let mut trace = Vec::new();
        while self.current_step < self.max_steps && self.state == AgentState::Running {
            self.current_step += 1;
            tracing::debug!(agent = %self.key, step = self.current_step, max_steps = self.max_steps, "agent step");
            match self.step().await {
                Ok(result) => trace.push(format!("Step {}: {}", self.current_step, result)),
                Err(e) => {
                    tracing::error!(agent = %self.key, step = self.current_step, error = %e, "run aborted");
                    self.state = AgentState::Error;
                    self.tools.cleanup().await;
                    return Err(AgentError::RunAborted(e.to_string()));
                }
            }
        }

        if self.state == AgentState::Running {
            tracing::warn!(agent = %self.key, max_steps = self.max_steps, "reached max steps");
            trace.push(format!("Terminated: Reached max steps ({})", self.max_steps));
            self.state = AgentState::Idle;
        }

        Ok(trace.join("\n"))
    }

    fn reset(&mut self) {
        self.state = AgentState::Idle;
        self.current_step = 0;
        self.memory.clear();
        self.profile.reset();
    }

    async fn cleanup(&mut self) {
        self.tools.cleanup().await;
    }
}
