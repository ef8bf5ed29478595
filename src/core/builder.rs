//! 构建器：由配置创建 LLM 客户端与执行器集合
//!
//! 三类执行器共享同一个 LLM 客户端与工作区，各自持有独立的工具注册表
//! （有状态工具如浏览器会话只属于打开它的执行器）。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::prompts::{
    DATAMINER_NEXT_STEP_PROMPT, DATAMINER_SYSTEM_PROMPT, SWE_NEXT_STEP_TEMPLATE,
    SWE_SYSTEM_PROMPT, WEB_NEXT_STEP_PROMPT, WEB_SYSTEM_PROMPT,
};
use crate::agent::{AgentProfile, ExecutorKind, ExecutorSet, ToolCallAgent};
use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{
    create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient, RetryConfig, RetryingLlmClient,
};
#[cfg(feature = "browser")]
use crate::tools::BrowserTool;
use crate::tools::{
    ChatCompletionTool, FileSaverTool, PythonExecuteTool, ShellTool, StrReplaceEditorTool,
    TerminateTool, ToolExecutor, ToolRegistry, WebSearchTool,
};

/// 按 API Key 与 provider 选择后端，无 Key 时使用 Mock；真实后端包一层重试
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    // 有 DeepSeek Key 或（配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点）
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    let retry = RetryConfig {
        max_retries: cfg.llm.retry.max_retries,
        base_delay: Duration::from_millis(cfg.llm.retry.base_delay_ms),
        ..RetryConfig::default()
    };
    let timeout = cfg.llm.timeouts.request;

    if use_deepseek {
        let model = cfg
            .llm
            .deepseek
            .model
            .clone()
            .unwrap_or_else(|| cfg.llm.model.clone());
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(RetryingLlmClient::new(
            create_deepseek_client(Some(&model), timeout),
            retry,
        ))
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(RetryingLlmClient::new(
            OpenAiClient::with_timeout(
                cfg.llm.base_url.as_deref(),
                &model,
                std::env::var("OPENAI_API_KEY").ok().as_deref(),
                timeout,
            ),
            retry,
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient)
    }
}

/// 执行器构建器：统一配置并创建 WebAgent / SWEAgent / DataMiner
pub struct ExecutorBuilder {
    config: AppConfig,
    workspace: PathBuf,
    llm: Arc<dyn LlmClient>,
}

impl ExecutorBuilder {
    pub fn new(config: AppConfig, workspace: PathBuf, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            config,
            workspace,
            llm,
        }
    }

    fn executor(&self, registry: ToolRegistry) -> ToolExecutor {
        ToolExecutor::new(registry, self.config.tools.tool_timeout_secs)
    }

    /// 执行器自己的观察截断优先，否则取 [tools].max_observe；0 表示不截断
    fn max_observe(&self, kind: ExecutorKind) -> Option<usize> {
        let planner = &self.config.planner;
        let own = match kind {
            ExecutorKind::Web => planner.web_max_observe,
            ExecutorKind::Swe => planner.swe_max_observe,
            ExecutorKind::DataMiner => planner.dataminer_max_observe,
        };
        Some(own.unwrap_or(self.config.tools.max_observe)).filter(|n| *n > 0)
    }

    /// WebAgent 工具：web_search、file_saver、terminate（browser feature 下另有 browser_use）
    pub fn web_registry(&self) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(WebSearchTool::new(
            self.config.tools.search.endpoint.as_deref(),
            self.config.tools.search.timeout_secs,
            self.config.tools.search.max_result_chars,
        ));
        #[cfg(feature = "browser")]
        tools.register(BrowserTool::new(self.config.tools.search.max_result_chars));
        tools.register(FileSaverTool::new(&self.workspace));
        tools.register(TerminateTool);
        tools
    }

    /// SWEAgent 工具：bash、str_replace_editor、terminate
    pub fn swe_registry(&self) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(ShellTool::new(
            self.config.tools.shell.allowed_commands.clone(),
            &self.workspace,
            self.config.tools.tool_timeout_secs,
        ));
        tools.register(StrReplaceEditorTool::new(&self.workspace));
        tools.register(TerminateTool);
        tools
    }

    /// DataMiner 工具：python_execute、create_chat_completion、file_saver、terminate
    pub fn dataminer_registry(&self) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(PythonExecuteTool::new(
            self.config.tools.python.interpreter.clone(),
            &self.workspace,
            self.config.tools.python.timeout_secs,
        ));
        tools.register(ChatCompletionTool::new(self.llm.clone()));
        tools.register(FileSaverTool::new(&self.workspace));
        tools.register(TerminateTool);
        tools
    }

    pub fn build(&self, kind: ExecutorKind) -> ToolCallAgent {
        let planner = &self.config.planner;
        let base = |registry: ToolRegistry| {
            ToolCallAgent::new(kind.key(), kind.description(), self.llm.clone(), self.executor(registry))
                .with_max_observe(self.max_observe(kind))
        };
        match kind {
            ExecutorKind::Web => base(self.web_registry())
                .with_system_prompt(WEB_SYSTEM_PROMPT)
                .with_next_step_prompt(WEB_NEXT_STEP_PROMPT)
                .with_max_steps(planner.web_max_steps)
                .with_profile(AgentProfile::web()),
            ExecutorKind::Swe => base(self.swe_registry())
                .with_system_prompt(SWE_SYSTEM_PROMPT)
                .with_next_step_prompt(SWE_NEXT_STEP_TEMPLATE)
                .with_max_steps(planner.swe_max_steps)
                .with_profile(AgentProfile::Swe {
                    current_dir: self.workspace.clone(),
                }),
            ExecutorKind::DataMiner => base(self.dataminer_registry())
                .with_system_prompt(DATAMINER_SYSTEM_PROMPT)
                .with_next_step_prompt(DATAMINER_NEXT_STEP_PROMPT)
                .with_max_steps(planner.dataminer_max_steps)
                .with_profile(AgentProfile::DataMiner {
                    working_dir: self.workspace.clone(),
                }),
        }
    }

    /// 按 [planner].executors 顺序创建执行器集合；未知 key 报错
    pub fn build_set(&self) -> Result<ExecutorSet, AgentError> {
        let mut set = ExecutorSet::new();
        for key in &self.config.planner.executors {
            let kind = ExecutorKind::from_key(key)
                .ok_or_else(|| AgentError::ConfigError(format!("unknown executor: {key}")))?;
            set.register(Box::new(self.build(kind)))?;
        }
        Ok(set)
    }

    /// 主执行器 key：配置优先，否则取第一个执行器
    pub fn primary_key(&self) -> Option<String> {
        self.config
            .planner
            .primary
            .clone()
            .or_else(|| self.config.planner.executors.first().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Executor;

    fn builder(executors: &[&str]) -> ExecutorBuilder {
        let mut cfg = AppConfig::default();
        cfg.planner.executors = executors.iter().map(|s| s.to_string()).collect();
        ExecutorBuilder::new(cfg, PathBuf::from("/tmp/ws"), Arc::new(MockLlmClient))
    }

    #[test]
    fn test_tool_sets_per_executor() {
        let b = builder(&["WebAgent"]);
        let web = b.build(ExecutorKind::Web);
        assert!(web.tool_names().contains(&"web_search".to_string()));
        assert!(web.tool_names().contains(&"terminate".to_string()));
        assert_eq!(web.max_steps(), 30);

        let swe = b.build(ExecutorKind::Swe);
        assert_eq!(swe.tool_names(), vec!["bash", "str_replace_editor", "terminate"]);

        let dm = b.build(ExecutorKind::DataMiner);
        assert_eq!(
            dm.tool_names(),
            vec!["python_execute", "create_chat_completion", "file_saver", "terminate"]
        );
        assert_eq!(dm.max_steps(), 20);
        assert_eq!(dm.key(), "DataMiner");
    }

    #[test]
    fn test_observe_limit_per_executor() {
        let mut b = builder(&["WebAgent"]);
        assert_eq!(b.build(ExecutorKind::DataMiner).max_observe(), Some(2000));
        assert_eq!(b.build(ExecutorKind::Web).max_observe(), Some(10_000));

        b.config.tools.max_observe = 0;
        b.config.planner.swe_max_observe = Some(300);
        assert_eq!(b.build(ExecutorKind::Web).max_observe(), None);
        assert_eq!(b.build(ExecutorKind::Swe).max_observe(), Some(300));
        b.config.planner.dataminer_max_observe = Some(0);
        assert_eq!(b.build(ExecutorKind::DataMiner).max_observe(), None);
    }

    #[test]
    fn test_build_set_follows_config_order() {
        let set = builder(&["SWEAgent", "WebAgent"]).build_set().unwrap();
        assert_eq!(set.keys(), vec!["SWEAgent", "WebAgent"]);
        assert!(builder(&["Nope"]).build_set().is_err());
        assert!(builder(&["SWEAgent", "SWEAgent"]).build_set().is_err());
        assert_eq!(builder(&["SWEAgent"]).primary_key().as_deref(), Some("SWEAgent"));
    }
}
