//! Conductor - 计划驱动的多执行器任务系统
//!
//! 入口：初始化日志、加载配置、构建 LLM 与执行器，从标准输入读取任务并运行计划引擎。

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::Context;
use conductor::config::load_config;
use conductor::core::{create_llm_from_config, ExecutorBuilder, RunError};
use conductor::planning::PlanExecutionEngine;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).context("Failed to load config")?;
    let workspace = cfg.workspace_root();
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("Failed to create workspace {}", workspace.display()))?;

    let llm = create_llm_from_config(&cfg);
    let builder = ExecutorBuilder::new(cfg.clone(), workspace, llm.clone());
    let executors = builder.build_set().context("Failed to build executors")?;
    let primary = builder
        .primary_key()
        .context("No executors configured in [planner].executors")?;

    let cancel_token = CancellationToken::new();
    let mut engine = PlanExecutionEngine::new(llm.clone(), executors)
        .with_primary(primary)
        .with_cancel_token(cancel_token.clone());

    print!("Enter your prompt: ");
    std::io::stdout().flush().ok();
    let mut line = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read prompt")?;
    let prompt = line.trim();
    if prompt.is_empty() {
        tracing::warn!("Empty prompt provided.");
        return Ok(());
    }

    tokio::spawn({
        let token = cancel_token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling run");
                token.cancel();
            }
        }
    });

    tracing::info!("Processing your request...");
    let started = Instant::now();
    let limit = Duration::from_secs(cfg.planner.run_timeout_secs);
    match engine.execute_with_timeout(prompt, limit).await {
        Ok(result) => {
            tracing::info!("Request processed in {:.2} seconds", started.elapsed().as_secs_f64());
            tracing::info!("{}", result);
        }
        Err(e @ RunError::Timeout(_)) => {
            tracing::error!("{}", e);
            tracing::info!("Operation terminated due to timeout. Please try a simpler request.");
        }
        Err(e) => tracing::error!("{}", e),
    }

    let (prompt_tokens, completion_tokens, total) = llm.token_usage();
    tracing::info!(prompt_tokens, completion_tokens, total, "token usage");
    Ok(())
}
