//! 沙箱文件系统
//!
//! SafeFs 绑定工作区根目录，所有路径经 resolve 校验必须在根下（禁止 ../ 逃逸）；
//! 目标文件可以尚不存在（file_saver / str_replace_editor create），因此先做词法规整再比较前缀，
//! 已存在的路径额外 canonicalize 以识别符号链接逃逸。

use std::path::{Component, Path, PathBuf};

use crate::core::AgentError;

/// 沙箱文件系统：绑定根目录，resolve 校验路径在根下
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// 解析路径（相对路径基于根目录）；越界返回 PathEscape
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AgentError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(AgentError::InvalidArguments {
                tool: "filesystem".to_string(),
                reason: "empty path".to_string(),
            });
        }
        let raw = Path::new(trimmed);
        let joined = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.root_dir.join(raw)
        };

        let mut normalized = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(AgentError::PathEscape(trimmed.to_string()));
                    }
                }
                other => normalized.push(other.as_os_str()),
            }
        }
        if !normalized.starts_with(&self.root_dir) {
            return Err(AgentError::PathEscape(trimmed.to_string())); // 如 ../../etc/passwd
        }
        if let Ok(canonical) = normalized.canonicalize() {
            if !canonical.starts_with(&self.root_dir) {
                return Err(AgentError::PathEscape(trimmed.to_string()));
            }
            return Ok(canonical);
        }
        Ok(normalized)
    }

    pub fn read_file(&self, path: &str) -> Result<String, AgentError> {
        let resolved = self.resolve(path)?;
        std::fs::read_to_string(&resolved)
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Read failed: {}", e)))
    }

    /// 写入文件（自动创建父目录）；append 为 true 时追加
    pub async fn write_file(&self, path: &str, content: &str, append: bool) -> Result<PathBuf, AgentError> {
        use tokio::io::AsyncWriteExt;

        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AgentError::ToolExecutionFailed(format!("Failed to create parent directory: {}", e)))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&resolved)
            .await
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Open failed: {}", e)))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Write failed: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Write failed: {}", e)))?;
        Ok(resolved)
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<String>, AgentError> {
        let base = if path.is_empty() || path == "." {
            self.root_dir.clone()
        } else {
            self.resolve(path)?
        };
        let mut entries = Vec::new();
        for e in std::fs::read_dir(&base)
            .map_err(|e| AgentError::ToolExecutionFailed(format!("List failed: {}", e)))?
        {
            let e = e.map_err(|e| AgentError::ToolExecutionFailed(e.to_string()))?;
            let name = e.file_name().to_string_lossy().to_string();
            if !name.starts_with('.') {
                let ty = if e.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    "/"
                } else {
                    ""
                };
                entries.push(format!("{}{}", name, ty));
            }
        }
        entries.sort();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let fs = SafeFs::new(dir.path());
        assert!(matches!(fs.resolve("../../etc/passwd"), Err(AgentError::PathEscape(_))));
        assert!(matches!(fs.resolve("/etc/passwd"), Err(AgentError::PathEscape(_))));
        assert!(fs.resolve("a/../b.txt").unwrap().ends_with("b.txt"));
    }

    #[tokio::test]
    async fn test_write_then_read_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let fs = SafeFs::new(dir.path());
        fs.write_file("notes/a.txt", "hello", false).await.unwrap();
        fs.write_file("notes/a.txt", " world", true).await.unwrap();
        assert_eq!(fs.read_file("notes/a.txt").unwrap(), "hello world");
        assert_eq!(fs.list_dir(".").unwrap(), vec!["notes/"]);
        assert_eq!(fs.list_dir("notes").unwrap(), vec!["a.txt"]);
    }
}
