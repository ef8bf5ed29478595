//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CONDUCTOR__*` 覆盖
//! （双下划线表示嵌套，如 `CONDUCTOR__LLM__PROVIDER=openai`）。
//! 每个字段都有默认值，缺少配置文件时也能得到可用配置。

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub planner: PlannerSection,
}

/// [app] 段：应用名、工作目录
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 沙箱根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
}

impl AppConfig {
    /// 工作目录：配置 > 当前目录下的 workspace
    pub fn workspace_root(&self) -> PathBuf {
        self.app.workspace_root.clone().unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("workspace")
        })
    }
}

/// [llm] 段：后端选择、超时与重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai；实际选择由 API Key 与 provider 共同决定
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub deepseek: LlmDeepSeekSection,
    pub openai: LlmOpenAiSection,
    pub timeouts: LlmTimeoutsSection,
    pub retry: LlmRetrySection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            // 执行器依赖工具调用，deepseek-reasoner 不支持
            model: "deepseek-chat".to_string(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            openai: LlmOpenAiSection::default(),
            timeouts: LlmTimeoutsSection::default(),
            retry: LlmRetrySection::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 120 }
    }
}

/// [llm.retry] 段：可重试错误的指数退避
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmRetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for LlmRetrySection {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
        }
    }
}

/// [tools] 段：工具超时、观察截断、Shell 白名单、检索与 Python
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 写回历史的工具输出最大字符数，0 表示不截断
    pub max_observe: usize,
    pub shell: ShellSection,
    pub search: SearchSection,
    pub python: PythonSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 60,
            max_observe: 10_000,
            shell: ShellSection::default(),
            search: SearchSection::default(),
            python: PythonSection::default(),
        }
    }
}

/// [tools.shell] 段：允许执行的命令名（仅首词，如 ls、grep、cargo）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    pub allowed_commands: Vec<String>,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            allowed_commands: [
                "ls", "pwd", "cat", "head", "tail", "wc", "grep", "find", "echo", "mkdir", "touch",
                "cp", "mv", "diff", "sort", "git", "cargo", "rustc", "python3", "pip",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// [tools.search] 段：检索端点、超时、结果最大字符数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub max_result_chars: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 15,
            max_result_chars: 8000,
        }
    }
}

/// [tools.python] 段：解释器与默认超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PythonSection {
    pub interpreter: String,
    pub timeout_secs: u64,
}

impl Default for PythonSection {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_secs: 5,
        }
    }
}

/// [planner] 段：执行器顺序、主执行器、整次运行超时与各执行器步数上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerSection {
    /// 执行器 key 顺序（决定默认选择与模糊匹配优先级）
    pub executors: Vec<String>,
    /// 主执行器 key，未设置时取第一个执行器
    pub primary: Option<String>,
    pub run_timeout_secs: u64,
    pub web_max_steps: usize,
    pub swe_max_steps: usize,
    pub dataminer_max_steps: usize,
    /// 各执行器的观察截断；未设置时用 [tools].max_observe，0 表示不截断
    pub web_max_observe: Option<usize>,
    pub swe_max_observe: Option<usize>,
    pub dataminer_max_observe: Option<usize>,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            executors: vec!["WebAgent".into(), "SWEAgent".into(), "DataMiner".into()],
            primary: None,
            run_timeout_secs: 3600,
            web_max_steps: 30,
            swe_max_steps: 30,
            dataminer_max_steps: 20,
            web_max_observe: None,
            swe_max_observe: None,
            dataminer_max_observe: Some(2000),
        }
    }
}

/// 从 config 目录加载配置，环境变量 CONDUCTOR__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CONDUCTOR__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CONDUCTOR")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
