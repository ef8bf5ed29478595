//! str_replace_editor：工作区内查看、创建与编辑文件
//!
//! 命令：view / create / str_replace / insert / undo_edit。
//! str_replace 要求 old_str 在文件中恰好出现一次；每次修改前保存旧内容，undo_edit 逐次回退。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::tools::{SafeFs, Tool};

pub const STR_REPLACE_EDITOR_TOOL: &str = "str_replace_editor";

/// 片段展示时在修改处上下保留的行数
const SNIPPET_LINES: usize = 4;
const MAX_FILE_SIZE: usize = 10 * 1024 * 1024; // 10MB

pub struct StrReplaceEditorTool {
    fs: SafeFs,
    history: Mutex<HashMap<PathBuf, Vec<String>>>,
}

/// 带行号输出（cat -n 风格），init_line 为首行行号
fn numbered(content: &str, init_line: usize) -> String {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>6}\t{}", i + init_line, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

impl StrReplaceEditorTool {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            fs: SafeFs::new(root_dir),
            history: Mutex::new(HashMap::new()),
        }
    }

    fn read(&self, path: &Path) -> Result<String, String> {
        let meta = std::fs::metadata(path).map_err(|e| format!("Failed to read file: {}", e))?;
        if meta.len() as usize > MAX_FILE_SIZE {
            return Err(format!("File too large: {} bytes (max: {})", meta.len(), MAX_FILE_SIZE));
        }
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read file: {}", e))
    }

    async fn write_with_history(&self, path: &Path, old: String, new: &str) -> Result<(), String> {
        tokio::fs::write(path, new)
            .await
            .map_err(|e| format!("Failed to write file: {}", e))?;
        self.history
            .lock()
            .await
            .entry(path.to_path_buf())
            .or_default()
            .push(old);
        Ok(())
    }

    fn view(&self, display: &str, path: &Path, view_range: Option<&Value>) -> Result<String, String> {
        if path.is_dir() {
            let rel = path.strip_prefix(self.fs.root()).unwrap_or(path);
            let entries = self
                .fs
                .list_dir(&rel.to_string_lossy())
                .map_err(|e| e.to_string())?;
            return Ok(format!(
                "Here's the files and directories in {}:\n{}",
                display,
                entries.join("\n")
            ));
        }

        let content = self.read(path)?;
        let (init_line, slice) = match view_range.and_then(|v| v.as_array()) {
            Some(range) => {
                let nums: Vec<i64> = range.iter().filter_map(|v| v.as_i64()).collect();
                if nums.len() != 2 {
                    return Err("Invalid `view_range`. It should be a list of two integers.".into());
                }
                let lines: Vec<&str> = content.lines().collect();
                let (start, end) = (nums[0], nums[1]);
                if start < 1 || start as usize > lines.len().max(1) {
                    return Err(format!(
                        "Invalid `view_range`: first element `{}` should be within [1, {}]",
                        start,
                        lines.len()
                    ));
                }
                let end = if end == -1 { lines.len() } else { end.max(start) as usize };
                if end > lines.len() {
                    return Err(format!(
                        "Invalid `view_range`: second element `{}` should be at most {}",
                        end,
                        lines.len()
                    ));
                }
                (start as usize, lines[start as usize - 1..end].join("\n"))
            }
            None => (1, content),
        };
        Ok(format!(
            "Here's the result of running `cat -n` on {}:\n{}",
            display,
            numbered(&slice, init_line)
        ))
    }

    async fn create(&self, display: &str, path: &Path, file_text: &str) -> Result<String, String> {
        if path.exists() {
            return Err(format!(
                "File already exists at: {}. Cannot overwrite files using command `create`.",
                display
            ));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Failed to create parent directory: {}", e))?;
        }
        tokio::fs::write(path, file_text)
            .await
            .map_err(|e| format!("Failed to write file: {}", e))?;
        self.history
            .lock()
            .await
            .entry(path.to_path_buf())
            .or_default()
            .push(String::new());
        Ok(format!("File created successfully at: {}", display))
    }

    async fn str_replace(&self, display: &str, path: &Path, old_str: &str, new_str: &str) -> Result<String, String> {
        if old_str.is_empty() {
            return Err("Parameter `old_str` must not be empty".into());
        }
        let content = self.read(path)?;
        let occurrences = content.matches(old_str).count();
        if occurrences == 0 {
            return Err(format!(
                "No replacement was performed, old_str `{}` did not appear verbatim in {}.",
                old_str, display
            ));
        }
        if occurrences > 1 {
            let lines: Vec<usize> = content
                .match_indices(old_str)
                .map(|(pos, _)| content[..pos].matches('\n').count() + 1)
                .collect();
            return Err(format!(
                "No replacement was performed. Multiple occurrences of old_str `{}` in lines {:?}. Please ensure it is unique",
                old_str, lines
            ));
        }

        let new_content = content.replacen(old_str, new_str, 1);
        let replacement_line = content
            .find(old_str)
            .map(|pos| content[..pos].matches('\n').count())
            .unwrap_or(0);
        self.write_with_history(path, content, &new_content).await?;

        let start = replacement_line.saturating_sub(SNIPPET_LINES);
        let end = replacement_line + SNIPPET_LINES + new_str.matches('\n').count() + 1;
        let snippet: Vec<&str> = new_content.lines().skip(start).take(end - start).collect();
        Ok(format!(
            "The file {} has been edited. Here's the result of running `cat -n` on a snippet of {}:\n{}\nReview the changes and make sure they are as expected. Edit the file again if necessary.",
            display,
            display,
            numbered(&snippet.join("\n"), start + 1)
        ))
    }

    async fn insert(&self, display: &str, path: &Path, insert_line: usize, new_str: &str) -> Result<String, String> {
        let content = self.read(path)?;
        let mut lines: Vec<&str> = content.lines().collect();
        if insert_line > lines.len() {
            return Err(format!(
                "Invalid `insert_line` parameter: {}. It should be within the range of lines of the file: [0, {}]",
                insert_line,
                lines.len()
            ));
        }
        let new_lines: Vec<&str> = new_str.lines().collect();
        let inserted = new_lines.len();
        lines.splice(insert_line..insert_line, new_lines);
        let mut new_content = lines.join("\n");
        if content.ends_with('\n') {
            new_content.push('\n');
        }
        self.write_with_history(path, content, &new_content).await?;

        let start = insert_line.saturating_sub(SNIPPET_LINES);
        let snippet: Vec<&str> = new_content
            .lines()
            .skip(start)
            .take(insert_line - start + inserted + SNIPPET_LINES)
            .collect();
        Ok(format!(
            "The file {} has been edited. Here's the result of running `cat -n` on a snippet of the edited file:\n{}\nReview the changes and make sure they are as expected (correct indentation, no duplicate lines, etc). Edit the file again if necessary.",
            display,
            numbered(&snippet.join("\n"), start + 1)
        ))
    }

    async fn undo_edit(&self, display: &str, path: &Path) -> Result<String, String> {
        let previous = self
            .history
            .lock()
            .await
            .get_mut(path)
            .and_then(|stack| stack.pop())
            .ok_or_else(|| format!("No edit history found for {}.", display))?;
        tokio::fs::write(path, &previous)
            .await
            .map_err(|e| format!("Failed to write file: {}", e))?;
        Ok(format!(
            "Last edit to {} undone successfully. Here's the result of running `cat -n` on {}:\n{}",
            display,
            display,
            numbered(&previous, 1)
        ))
    }
}

#[async_trait]
impl Tool for StrReplaceEditorTool {
    fn name(&self) -> &str {
        STR_REPLACE_EDITOR_TOOL
    }

    fn description(&self) -> &str {
        r#"Custom editing tool for viewing, creating and editing files inside the workspace.
* `view` on a file prints it with line numbers (like `cat -n`); on a directory lists its entries
* `create` cannot be used if the specified path already exists as a file
* `str_replace`: `old_str` must match EXACTLY one or more consecutive lines of the original file and must be unique
* `insert` inserts `new_str` AFTER line `insert_line` (0 inserts at the top)
* `undo_edit` reverts the last edit made to the file at `path`"#
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The commands to run.",
                    "enum": ["view", "create", "str_replace", "insert", "undo_edit"]
                },
                "path": {
                    "type": "string",
                    "description": "File or directory path, relative to the workspace."
                },
                "file_text": {
                    "type": "string",
                    "description": "Required parameter of `create` command, with the content of the file to be created."
                },
                "old_str": {
                    "type": "string",
                    "description": "Required parameter of `str_replace` command containing the string in `path` to replace."
                },
                "new_str": {
                    "type": "string",
                    "description": "Optional parameter of `str_replace` command containing the new string. Required parameter of `insert` command."
                },
                "insert_line": {
                    "type": "integer",
                    "description": "Required parameter of `insert` command. `new_str` is inserted AFTER this line."
                },
                "view_range": {
                    "type": "array",
                    "items": { "type": "integer" },
                    "description": "Optional parameter of `view` command, e.g. [11, 12]; [start, -1] shows all lines from start."
                }
            },
            "required": ["command", "path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let command = str_arg(&args, "command").ok_or("Missing command")?;
        let display = str_arg(&args, "path").ok_or("Missing path")?;
        let path = self.fs.resolve(display).map_err(|e| e.to_string())?;

        match command {
            "view" => self.view(display, &path, args.get("view_range")),
            "create" => {
                let file_text = str_arg(&args, "file_text")
                    .ok_or("Parameter `file_text` is required for command: create")?;
                self.create(display, &path, file_text).await
            }
            "str_replace" => {
                let old_str = str_arg(&args, "old_str")
                    .ok_or("Parameter `old_str` is required for command: str_replace")?;
                let new_str = str_arg(&args, "new_str").unwrap_or("");
                self.str_replace(display, &path, old_str, new_str).await
            }
            "insert" => {
                let insert_line = args
                    .get("insert_line")
                    .and_then(|v| v.as_u64())
                    .ok_or("Parameter `insert_line` is required for command: insert")?;
                let new_str = str_arg(&args, "new_str")
                    .ok_or("Parameter `new_str` is required for command: insert")?;
                self.insert(display, &path, insert_line as usize, new_str).await
            }
            "undo_edit" => self.undo_edit(display, &path).await,
            other => Err(format!(
                "Unrecognized command {}. The allowed commands are: view, create, str_replace, insert, undo_edit",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_create_replace_and_undo() {
        let dir = tempfile::tempdir().unwrap();
        let tool = StrReplaceEditorTool::new(dir.path());

        tool.execute(json!({"command": "create", "path": "src/lib.rs", "file_text": "fn old() {}\n"}))
            .await
            .unwrap();
        assert!(tool
            .execute(json!({"command": "create", "path": "src/lib.rs", "file_text": "x"}))
            .await
            .is_err());

        let out = tool
            .execute(json!({"command": "str_replace", "path": "src/lib.rs", "old_str": "old", "new_str": "new"}))
            .await
            .unwrap();
        assert!(out.contains("fn new() {}"));
        assert_eq!(std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap(), "fn new() {}\n");

        tool.execute(json!({"command": "undo_edit", "path": "src/lib.rs"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap(), "fn old() {}\n");
    }

    #[tokio::test]
    async fn test_str_replace_requires_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x\nx\n").unwrap();
        let tool = StrReplaceEditorTool::new(dir.path());
        let err = tool
            .execute(json!({"command": "str_replace", "path": "a.txt", "old_str": "x", "new_str": "y"}))
            .await
            .unwrap_err();
        assert!(err.contains("Multiple occurrences"));
        let err = tool
            .execute(json!({"command": "str_replace", "path": "a.txt", "old_str": "z", "new_str": "y"}))
            .await
            .unwrap_err();
        assert!(err.contains("did not appear verbatim"));
    }

    #[tokio::test]
    async fn test_insert_and_view_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\nthree\n").unwrap();
        let tool = StrReplaceEditorTool::new(dir.path());
        tool.execute(json!({"command": "insert", "path": "a.txt", "insert_line": 1, "new_str": "two"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "one\ntwo\nthree\n");

        let out = tool
            .execute(json!({"command": "view", "path": "a.txt", "view_range": [2, -1]}))
            .await
            .unwrap();
        assert!(out.contains("     2\ttwo"));
        assert!(out.contains("     3\tthree"));
        assert!(!out.contains("one"));
    }

    #[tokio::test]
    async fn test_rejects_path_escape() {
        let dir = tempfile::tempdir().unwrap();
        let tool = StrReplaceEditorTool::new(dir.path());
        assert!(tool
            .execute(json!({"command": "view", "path": "../../etc/passwd"}))
            .await
            .is_err());
    }
}
