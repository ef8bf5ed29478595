//! bash：SWEAgent 在工作区内执行 shell 命令
//!
//! 一行命令按 `&&`、`||`、`;`、`|` 拆成若干段，每段的首词都必须在配置白名单内
//! （`cd` 总是允许）；整行再过一遍危险片段检查。通过后以工作区为当前目录交给 sh -c 执行。

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::tools::process::ProcessRunner;
use crate::tools::Tool;

pub const BASH_TOOL: &str = "bash";

const ALWAYS_ALLOWED: &[&str] = &["cd"];

const DANGEROUS_FRAGMENTS: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "rm -r",
    "wget ",
    "| sh",
    "| bash",
    "chmod 777",
    "chmod +s",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    ":(){",
    "sudo ",
];

static SEGMENT_SPLIT_RE: OnceLock<Regex> = OnceLock::new();

/// 命令策略：白名单 + 危险片段
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    allowed: HashSet<String>,
}

impl CommandPolicy {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// 拆出每段命令的程序名（跳过 `VAR=value` 前缀）
    pub fn programs(line: &str) -> Vec<String> {
        let re = SEGMENT_SPLIT_RE.get_or_init(|| Regex::new(r"&&|\|\||;|\|").unwrap());
        re.split(line)
            .filter_map(|segment| {
                segment
                    .split_whitespace()
                    .find(|word| !word.contains('='))
                    .map(|word| word.to_lowercase())
            })
            .collect()
    }

    pub fn check(&self, line: &str) -> Result<(), String> {
        let lower = line.to_lowercase();
        if let Some(fragment) = DANGEROUS_FRAGMENTS.iter().find(|f| lower.contains(*f)) {
            return Err(format!("Command rejected: contains '{}'", fragment.trim()));
        }
        let programs = Self::programs(line);
        if programs.is_empty() {
            return Err("Empty command".to_string());
        }
        for program in &programs {
            if !ALWAYS_ALLOWED.contains(&program.as_str()) && !self.allowed.contains(program) {
                return Err(format!("Command '{}' not in allowlist", program));
            }
        }
        Ok(())
    }
}

pub struct ShellTool {
    policy: CommandPolicy,
    runner: ProcessRunner,
    timeout_secs: u64,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>, working_dir: impl AsRef<Path>, timeout_secs: u64) -> Self {
        Self {
            policy: CommandPolicy::new(allowed_commands),
            runner: ProcessRunner::new(working_dir),
            timeout_secs,
        }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        BASH_TOOL
    }

    fn description(&self) -> &str {
        "Execute a bash command in the workspace directory. Every command in a chain or pipeline must be allow-listed (e.g. ls, cat, grep, find, cargo, python3, git). Long-running commands are killed after the timeout."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute."
                },
                "timeout": {
                    "type": "integer",
                    "description": "Optional timeout in seconds, capped by the configured limit."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or("");
        self.policy.check(command)?;
        let limit = args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.timeout_secs)
            .clamp(1, self.timeout_secs.max(1));

        tracing::info!(command = %command, timeout_secs = limit, "bash tool execute");
        let output = self.runner.run_shell(command, Duration::from_secs(limit)).await?;
        if output.success() {
            Ok(output.combined())
        } else {
            Err(format!(
                "Exit code {}\n{}",
                output.code.map_or_else(|| "none".to_string(), |c| c.to_string()),
                output.combined().trim_end()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn policy() -> CommandPolicy {
        CommandPolicy::new(["echo", "ls", "grep", "rm"].map(String::from))
    }

    #[test]
    fn test_every_segment_must_be_allowed() {
        let p = policy();
        assert!(p.check("ls -la").is_ok());
        assert!(p.check("LS").is_ok());
        assert!(p.check("ls | grep foo && echo ok").is_ok());
        assert!(p.check("cd src; ls").is_ok());
        assert!(p.check("LANG=C ls").is_ok());
        assert_eq!(p.check("ls; cat /etc/passwd"), Err("Command 'cat' not in allowlist".to_string()));
        assert_eq!(p.check("echo hi || python3 x.py"), Err("Command 'python3' not in allowlist".to_string()));
        assert!(p.check("   ").is_err());
    }

    #[test]
    fn test_dangerous_fragments_win_over_allowlist() {
        let p = policy();
        assert_eq!(p.check("rm -rf /"), Err("Command rejected: contains 'rm -rf'".to_string()));
        assert!(p.check("echo x | sh").is_err());
        assert!(p.check("rm notes.txt").is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_in_workspace_and_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let tool = ShellTool::new(vec!["ls".into(), "grep".into()], dir.path(), 5);

        let out = tool.execute(json!({"command": "ls | grep marker"})).await.unwrap();
        assert_eq!(out.trim(), "marker.txt");

        let err = tool
            .execute(json!({"command": "grep nothing marker.txt"}))
            .await
            .unwrap_err();
        assert!(err.starts_with("Exit code 1"));

        let err = tool.execute(json!({"command": "cat marker.txt"})).await.unwrap_err();
        assert_eq!(err, "Command 'cat' not in allowlist");
    }
}
