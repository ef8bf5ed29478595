//! terminate：执行器宣告任务结束的特殊工具
//!
//! 调用本身只返回状态文本；循环终止与资源清理由 Agent 循环的特殊工具拦截完成。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

pub const TERMINATE_TOOL: &str = "terminate";

pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        TERMINATE_TOOL
    }

    fn description(&self) -> &str {
        "Terminate the interaction when the request is met OR if the assistant cannot proceed further with the task. When you have finished all the tasks, call this tool to end the work."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "The finish status of the interaction.",
                    "enum": ["success", "failure"]
                }
            },
            "required": ["status"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let status = args
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("success");
        Ok(format!(
            "The interaction has been completed with status: {}",
            status
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminate_reports_status() {
        let out = TerminateTool
            .execute(serde_json::json!({"status": "failure"}))
            .await
            .unwrap();
        assert_eq!(out, "The interaction has been completed with status: failure");
    }
}
