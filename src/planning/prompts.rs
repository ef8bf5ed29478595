//! 规划引擎使用的提示词：建计划、选择执行器、执行步骤、总结

pub const PLANNING_SYSTEM_PROMPT: &str = "You are an expert Planning Assistant tasked with solving problems efficiently through structured plans.
Your job is:
1. Analyze requests to understand the task scope
2. Create a clear, actionable plan that makes meaningful progress with the `planning` tool
3. Execute steps using available tools as needed
4. Track progress and adapt plans when necessary
5. Use `finish` to conclude immediately when the task is complete

Available tools will vary by task but may include:
- `planning`: Create, update, and track plans (commands: create, update, mark_step, etc.)
- `finish`: End the task when complete

Break tasks into logical steps with clear outcomes. Avoid excessive detail or sub-steps.
Think about dependencies and verification methods.
Know when to conclude - don't continue thinking once objectives are met.

Consider the complexity of the task when planning:
- Simple tasks (e.g. answering a factual question) need only 1-2 steps
- Moderate tasks (e.g. writing a small script) need 3-5 steps
- Complex tasks (e.g. researching and building a report) may need more, but keep each step meaningful

IMPORTANT: Your response MUST be in the same language as the user's request.";

pub const DISPATCHER_SYSTEM_PROMPT: &str = "You are an agent dispatcher. Your task is to analyze a step description and determine which specialized agent would be best suited to execute it. Choose the most appropriate agent based on the step's requirements and each agent's capabilities.";

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a planning assistant. Your task is to summarize the completed plan.";

pub fn planning_request(request: &str) -> String {
    format!("Analyze this task and create an appropriately sized plan: {}", request)
}

/// agents 为 (key, description)，按注册顺序
pub fn dispatcher_request(step_text: &str, agents: &[(String, String)]) -> String {
    let listing: Vec<String> = agents
        .iter()
        .map(|(key, desc)| format!("- {}: {}", key, desc))
        .collect();
    format!(
        "Based on the following step description, which agent should execute it?\n\nStep: {}\n\nAvailable agents:\n{}\n\nRespond with just the agent key (e.g., 'WebAgent', 'DataMiner', 'SWEAgent') that should handle this step.",
        step_text,
        listing.join("\n")
    )
}

pub fn step_prompt(plan_status: &str, index: usize, step_text: &str) -> String {
    format!(
        "CURRENT PLAN STATUS:\n{}\n\nYOUR CURRENT TASK:\nYou are now working on step {}: \"{}\"\n\nPlease execute this step using the appropriate tools. When you're done, provide a summary of what you accomplished.",
        plan_status, index, step_text
    )
}

pub fn summary_request(plan_status: &str) -> String {
    format!(
        "The plan has been completed. Here is the final plan status:\n\n{}\n\nPlease provide a summary of what was accomplished and any final thoughts.",
        plan_status
    )
}

/// 交给主执行器的总结请求（oracle 总结失败时使用）
pub fn summary_fallback_request(plan_status: &str) -> String {
    format!(
        "The plan has been completed. Here is the final plan status:\n\n{}\n\nPlease provide a summary of what was accomplished.",
        plan_status
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_request_lists_agents_in_order() {
        let agents = vec![
            ("WebAgent".to_string(), "browses".to_string()),
            ("SWEAgent".to_string(), "codes".to_string()),
        ];
        let text = dispatcher_request("Search docs", &agents);
        assert!(text.contains("Step: Search docs"));
        assert!(text.contains("- WebAgent: browses\n- SWEAgent: codes"));
    }
}
