//! Agent 循环集成测试：通过公开 API 驱动 ToolCallAgent 与真实文件工具

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use conductor::agent::{AgentProfile, Executor, ToolCallAgent};
    use conductor::core::{AgentError, AgentState};
    use conductor::llm::ScriptedLlmClient;
    use conductor::tools::{FileSaverTool, TerminateTool, ToolExecutor, ToolRegistry};

    fn web_like_agent(llm: Arc<ScriptedLlmClient>, root: &std::path::Path, max_steps: usize) -> ToolCallAgent {
        let mut tools = ToolRegistry::new();
        tools.register(FileSaverTool::new(root));
        tools.register(TerminateTool);
        ToolCallAgent::new("WebAgent", "saves notes", llm, ToolExecutor::new(tools, 10))
            .with_system_prompt("You save notes.")
            .with_next_step_prompt("What next?")
            .with_max_steps(max_steps)
            .with_profile(AgentProfile::web())
    }

    #[tokio::test]
    async fn test_file_saver_then_terminate_skips_remaining_calls() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_tool_calls(&[
                    ("file_saver", r#"{"content":"line one\n","file_path":"notes/a.md"}"#),
                    ("file_saver", r#"{"content":"line two\n","file_path":"notes/a.md","mode":"a"}"#),
                ])
                .with_tool_calls(&[
                    ("terminate", r#"{"status":"success"}"#),
                    ("file_saver", r#"{"content":"never","file_path":"late.md"}"#),
                ]),
        );
        let mut agent = web_like_agent(llm.clone(), dir.path(), 10);

        let trace = agent.run("save two lines").await.unwrap();
        assert_eq!(agent.state(), AgentState::Finished);
        assert_eq!(agent.current_step(), 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes/a.md")).unwrap(),
            "line one\nline two\n"
        );
        assert!(!dir.path().join("late.md").exists());
        assert!(trace.starts_with("Step 1: Observed output of cmd `file_saver` executed:\nContent successfully saved to"));

        let tracker = agent.profile().web_tracker().unwrap();
        assert_eq!(tracker.saved_files, vec!["notes/a.md", "notes/a.md"]);

        // Finished 之后必须 reset 才能再次运行
        assert!(matches!(agent.run("again").await, Err(AgentError::InvalidState(AgentState::Finished))));
        agent.reset();
        assert_eq!(agent.state(), AgentState::Idle);
        assert!(agent.messages().is_empty());
    }

    #[tokio::test]
    async fn test_step_budget_and_escape_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_tool_calls(&[("file_saver", r#"{"content":"x","file_path":"../outside.md"}"#)])
                .with_tool_calls(&[("file_saver", r#"{"content":"x"}"#)]),
        );
        let mut agent = web_like_agent(llm, dir.path(), 2);

        let trace = agent.run("try to escape").await.unwrap();
        let lines: Vec<&str> = trace.lines().filter(|l| l.starts_with("Step ") || l.starts_with("Terminated")).collect();
        assert!(lines[0].starts_with("Step 1: Error:"));
        assert!(lines[1].starts_with("Step 2: Error:"));
        assert_eq!(lines[2], "Terminated: Reached max steps (2)");
        assert_eq!(agent.state(), AgentState::Idle);
        assert!(!dir.path().parent().unwrap().join("outside.md").exists());
    }
}
