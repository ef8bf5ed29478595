//! Conductor - 计划驱动的多执行器任务系统
//!
//! 模块划分：
//! - **agent**: Executor 抽象与通用 think → act 工具调用循环（WebAgent / SWEAgent / DataMiner）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、Agent 状态、LLM 与执行器构建
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: Agent 对话历史
//! - **planning**: 计划存储、planning 工具与计划执行引擎
//! - **tools**: 工具箱（检索、文件、Shell、Python、编辑器、终止）与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod planning;
pub mod tools;
