//! 计划执行集成测试：真实执行器 + 脚本化 LLM 跑完整条计划流程

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use conductor::agent::Executor;
    use conductor::config::AppConfig;
    use conductor::core::{AgentState, ExecutorBuilder};
    use conductor::llm::ScriptedLlmClient;
    use conductor::planning::{FlowEvent, PlanExecutionEngine, StepStatus};
    use tokio::sync::mpsc;

    fn engine(llm: Arc<ScriptedLlmClient>, workspace: &std::path::Path) -> PlanExecutionEngine {
        let builder = ExecutorBuilder::new(AppConfig::default(), workspace.to_path_buf(), llm.clone());
        let executors = builder.build_set().unwrap();
        PlanExecutionEngine::new(llm, executors)
    }

    #[tokio::test]
    async fn test_tagged_plan_runs_real_tools_and_stops_on_terminate() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_tool_calls(&[(
                    "planning",
                    r#"{"command":"create","title":"Greeting file","steps":["[SWEAgent] create hello.txt","[DataMiner] confirm it","[WebAgent] never reached"]}"#,
                )])
                // SWEAgent：创建文件，然后给出文本结束本步
                .with_tool_calls(&[(
                    "str_replace_editor",
                    r#"{"command":"create","path":"hello.txt","file_text":"hello\n"}"#,
                )])
                .with_text("hello.txt created")
                // DataMiner：直接终止
                .with_tool_calls(&[("terminate", r#"{"status":"success"}"#)]),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = engine(llm.clone(), dir.path()).with_event_tx(tx);

        let out = engine
            .execute_with_timeout("write a greeting file", Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("hello.txt")).unwrap(), "hello\n");
        assert!(out.contains("Step 1: Observed output of cmd `str_replace_editor` executed:"));
        assert!(out.contains("Step 2: hello.txt created"));
        assert!(out.contains("The interaction has been completed with status: success"));
        assert!(!out.contains("Plan completed"));
        assert_eq!(llm.remaining(), 0);

        let plan = engine.store().plan(engine.active_plan_id()).unwrap();
        assert_eq!(plan.status_at(0), StepStatus::Completed);
        assert_eq!(plan.status_at(1), StepStatus::Completed);
        assert_eq!(plan.status_at(2), StepStatus::NotStarted);
        assert_eq!(
            engine.executors().get("DataMiner").map(|e| e.state()),
            Some(AgentState::Finished)
        );

        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        assert!(matches!(events.first(), Some(FlowEvent::PlanCreated { fallback: false, .. })));
        let started: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                FlowEvent::StepStarted { executor, .. } => Some(executor.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec!["SWEAgent", "DataMiner"]);
        assert!(matches!(events.last(), Some(FlowEvent::RunFinished { completed: 2, total: 3 })));
    }

    #[tokio::test]
    async fn test_untagged_default_plan_uses_recommendations_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_text("I would rather just answer")
                .with_text("webagent")
                .with_text("done analyzing")
                .with_text("SWEAgent")
                .with_text("done executing")
                .with_text("nobody")
                .with_text("done verifying")
                .with_text("Everything went fine."),
        );
        let mut engine = engine(llm.clone(), dir.path());

        let out = engine.execute("hi").await;
        let plan = engine.store().plan(engine.active_plan_id()).unwrap();
        assert_eq!(plan.steps, vec!["Analyze request", "Execute task", "Verify results"]);
        assert_eq!(plan.counts().completed, 3);
        assert_eq!(
            out,
            "Step 1: done analyzing\nStep 1: done executing\nStep 1: done verifying\nPlan completed:\n\nEverything went fine."
        );

        // 第三步推荐无法匹配，回落到第一个执行器 WebAgent
        let requests = llm.requests();
        let web_step = &requests[6];
        assert!(web_step.tools.as_ref().unwrap().contains(&"web_search".to_string()));
    }
}
