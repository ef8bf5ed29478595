//! file_saver：将内容写入工作区内的文件
//!
//! 路径经 SafeFs 校验，不得逃出工作区；mode 为 "w"（覆盖，默认）或 "a"（追加）。

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{SafeFs, Tool};

pub const FILE_SAVER_TOOL: &str = "file_saver";

pub struct FileSaverTool {
    fs: SafeFs,
}

impl FileSaverTool {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            fs: SafeFs::new(root_dir),
        }
    }
}

#[async_trait]
impl Tool for FileSaverTool {
    fn name(&self) -> &str {
        FILE_SAVER_TOOL
    }

    fn description(&self) -> &str {
        "Save content to a local file inside the workspace. Use this tool when you need to save text, code, or generated content to a file. The tool accepts content and a file path, and saves the content to that location."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "(required) The content to save to the file."
                },
                "file_path": {
                    "type": "string",
                    "description": "(required) The path where the file should be saved, relative to the workspace."
                },
                "mode": {
                    "type": "string",
                    "description": "(optional) The file opening mode. Default is 'w' for write. Use 'a' for append.",
                    "enum": ["w", "a"],
                    "default": "w"
                }
            },
            "required": ["content", "file_path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let file_path = args
            .get("file_path")
            .and_then(|v| v.as_str())
            .ok_or("Missing file_path")?;
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or("Missing content")?;
        let append = match args.get("mode").and_then(|v| v.as_str()).unwrap_or("w") {
            "w" => false,
            "a" => true,
            other => return Err(format!("Invalid mode: {} (expected 'w' or 'a')", other)),
        };

        let saved = self
            .fs
            .write_file(file_path, content, append)
            .await
            .map_err(|e| e.to_string())?;
        tracing::debug!(path = %saved.display(), append, "file saved");
        Ok(format!("Content successfully saved to {}", file_path))
    }
}
