//! python_execute：以子进程运行 Python 代码
//!
//! 代码经 stdin 交给解释器（`python3 -`），工作目录为工作区；超时后杀掉子进程。
//! 只有 print 输出可见，返回值不会被捕获。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::process::ProcessRunner;
use crate::tools::Tool;

pub const PYTHON_EXECUTE_TOOL: &str = "python_execute";

pub struct PythonExecuteTool {
    interpreter: String,
    runner: ProcessRunner,
    default_timeout_secs: u64,
}

impl PythonExecuteTool {
    pub fn new(interpreter: impl Into<String>, working_dir: impl AsRef<Path>, default_timeout_secs: u64) -> Self {
        Self {
            interpreter: interpreter.into(),
            runner: ProcessRunner::new(working_dir),
            default_timeout_secs,
        }
    }
}

#[async_trait]
impl Tool for PythonExecuteTool {
    fn name(&self) -> &str {
        PYTHON_EXECUTE_TOOL
    }

    fn description(&self) -> &str {
        "Executes Python code string. Note: Only print outputs are visible, function return values are not captured. Use print statements to see results."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The Python code to execute."
                },
                "timeout": {
                    "type": "integer",
                    "description": "Execution timeout in seconds."
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let code = args
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or("Missing code")?;
        let timeout_secs = args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.default_timeout_secs)
            .clamp(1, self.default_timeout_secs.max(1));

        let output = self
            .runner
            .run(&self.interpreter, &["-"], Some(code), Duration::from_secs(timeout_secs))
            .await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(format!("{}{}", output.stdout, output.stderr.trim_end()))
        }
    }
}
