//! 执行器抽象与有序执行器集合
//!
//! 引擎只通过 Executor trait 驱动执行器；ExecutorSet 按注册顺序保存，
//! 注册时校验 key 非空且唯一（顺序决定模糊匹配与默认选择的结果）。

use async_trait::async_trait;

use crate::core::{AgentError, AgentState};

/// 可执行计划步骤的 Agent
#[async_trait]
pub trait Executor: Send + Sync {
    /// 唯一 key（如 "WebAgent"）
    fn key(&self) -> &str;

    /// 能力描述（用于执行器推荐）
    fn description(&self) -> &str;

    fn state(&self) -> AgentState;

    /// 运行一次完整的 think/act 循环，返回步骤轨迹文本
    async fn run(&mut self, prompt: &str) -> Result<String, AgentError>;

    /// 回到 Idle 并清空历史
    fn reset(&mut self);

    /// 释放有状态工具持有的资源（幂等）
    async fn cleanup(&mut self);
}

/// 内置执行器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorKind {
    Web,
    Swe,
    DataMiner,
}

impl ExecutorKind {
    pub const ALL: [ExecutorKind; 3] = [ExecutorKind::Web, ExecutorKind::Swe, ExecutorKind::DataMiner];

    pub fn key(self) -> &'static str {
        match self {
            ExecutorKind::Web => "WebAgent",
            ExecutorKind::Swe => "SWEAgent",
            ExecutorKind::DataMiner => "DataMiner",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ExecutorKind::Web => "An agent that can browse the web, search for information, and interact with web pages.",
            ExecutorKind::Swe => "An autonomous AI programmer that interacts directly with the computer to solve tasks.",
            ExecutorKind::DataMiner => "A specialized execution agent focused on data processing, analysis, and visualization, working alongside the SWE and Web agents",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }
}

/// 有序执行器集合
#[derive(Default)]
pub struct ExecutorSet {
    executors: Vec<Box<dyn Executor>>,
}

impl ExecutorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, executor: Box<dyn Executor>) -> Result<(), AgentError> {
        let key = executor.key().trim();
        if key.is_empty() {
            return Err(AgentError::ConfigError("executor key must not be empty".to_string()));
        }
        if self.contains(key) {
            return Err(AgentError::ConfigError(format!("duplicate executor key: {key}")));
        }
        self.executors.push(executor);
        Ok(())
    }

    /// 链式注册
    pub fn with(mut self, executor: Box<dyn Executor>) -> Result<Self, AgentError> {
        self.register(executor)?;
        Ok(self)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.executors.iter().any(|e| e.key() == key)
    }

    pub fn get(&self, key: &str) -> Option<&dyn Executor> {
        self.executors.iter().find(|e| e.key() == key).map(|e| e.as_ref())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Box<dyn Executor>> {
        self.executors.iter_mut().find(|e| e.key() == key)
    }

    /// 注册顺序的 key 列表
    pub fn keys(&self) -> Vec<String> {
        self.executors.iter().map(|e| e.key().to_string()).collect()
    }

    /// (key, description) 列表，注册顺序
    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.executors
            .iter()
            .map(|e| (e.key().to_string(), e.description().to_string()))
            .collect()
    }

    pub fn first_key(&self) -> Option<String> {
        self.executors.first().map(|e| e.key().to_string())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Executor>> {
        self.executors.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
