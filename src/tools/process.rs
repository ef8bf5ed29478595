//! 子进程执行：bash 与 python_execute 共用
//!
//! 在工作区内启动子进程，可选地经 stdin 写入输入，收集 stdout / stderr；
//! 超时或执行器被丢弃时子进程随之被杀掉（kill_on_drop）。

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// 子进程结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout 在前，stderr 非空时追加在后
    pub fn combined(&self) -> String {
        let stderr = self.stderr.trim_end();
        if stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.trim().is_empty() {
            stderr.to_string()
        } else {
            format!("{}\n{}", self.stdout.trim_end(), stderr)
        }
    }
}

/// 固定工作目录的子进程启动器
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    working_dir: PathBuf,
}

impl ProcessRunner {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }

    /// 运行 program args...；stdin 为 Some 时写入后关闭
    pub async fn run(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
        limit: Duration,
    ) -> Result<ProcessOutput, String> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.working_dir.is_dir() {
            cmd.current_dir(&self.working_dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| format!("Failed to start {}: {}", program, e))?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .await
                .map_err(|e| format!("Failed to write stdin: {}", e))?;
        }

        let output = tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| format!("Execution timeout after {} seconds", limit.as_secs()))?
            .map_err(|e| format!("Execution failed: {}", e))?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// 交给系统 shell 执行一整行命令
    pub async fn run_shell(&self, line: &str, limit: Duration) -> Result<ProcessOutput, String> {
        if cfg!(target_os = "windows") {
            self.run("cmd", &["/C", line], None, limit).await
        } else {
            self.run("sh", &["-c", line], None, limit).await
        }
    }
}
