//! 工具层：Tool trait、注册表、带超时与审计的执行器，以及各执行器使用的具体工具

pub mod chat_completion;
pub mod executor;
pub mod file_saver;
pub mod filesystem;
pub mod process;
pub mod python_execute;
pub mod registry;
pub mod shell;
pub mod str_replace_editor;
pub mod terminate;
pub mod web_search;

#[cfg(feature = "browser")]
pub mod browser;

pub use chat_completion::{ChatCompletionTool, CREATE_CHAT_COMPLETION_TOOL};
pub use executor::ToolExecutor;
pub use file_saver::{FileSaverTool, FILE_SAVER_TOOL};
pub use filesystem::SafeFs;
pub use process::{ProcessOutput, ProcessRunner};
pub use python_execute::{PythonExecuteTool, PYTHON_EXECUTE_TOOL};
pub use registry::{Tool, ToolRegistry};
pub use shell::{CommandPolicy, ShellTool, BASH_TOOL};
pub use str_replace_editor::{StrReplaceEditorTool, STR_REPLACE_EDITOR_TOOL};
pub use terminate::{TerminateTool, TERMINATE_TOOL};
pub use web_search::{WebSearchTool, DEFAULT_SEARCH_ENDPOINT, WEB_SEARCH_TOOL};

#[cfg(feature = "browser")]
pub use browser::{BrowserTool, BROWSER_USE_TOOL};
