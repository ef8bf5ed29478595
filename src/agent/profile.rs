//! 执行器画像：每类执行器在通用循环之上的差异
//!
//! 负责渲染每轮的 next-step prompt（工作区替换、当前 URL 前缀），
//! 以及在工具调用后记录执行器关心的状态（浏览 URL、检索历史、保存的文件）。

use std::path::PathBuf;

use crate::llm::ToolCallRequest;

/// WebAgent 的浏览状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebTracker {
    pub current_url: Option<String>,
    pub search_history: Vec<String>,
    pub saved_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentProfile {
    /// 无额外行为
    Plain,
    Web(WebTracker),
    /// `{current_dir}` 替换为工作目录
    Swe { current_dir: PathBuf },
    /// `{working_dir}` 替换为工作目录
    DataMiner { working_dir: PathBuf },
}

impl AgentProfile {
    pub fn web() -> Self {
        AgentProfile::Web(WebTracker::default())
    }

    /// 渲染本轮 next-step prompt
    pub fn render_next_step(&self, template: &str) -> String {
        match self {
            AgentProfile::Plain => template.to_string(),
            AgentProfile::Web(tracker) => match &tracker.current_url {
                Some(url) => format!("Current URL: {}\n{}", url, template),
                None => template.to_string(),
            },
            AgentProfile::Swe { current_dir } => {
                template.replace("{current_dir}", &current_dir.display().to_string())
            }
            AgentProfile::DataMiner { working_dir } => {
                template.replace("{working_dir}", &working_dir.display().to_string())
            }
        }
    }

    /// 记录一次已执行的工具调用；参数无法解析时忽略
    pub fn observe(&mut self, call: &ToolCallRequest) {
        let AgentProfile::Web(tracker) = self else {
            return;
        };
        match call.name.as_str() {
            "browser_use" => {
                if call.arguments.str_field("action") == Some("navigate") {
                    if let Some(url) = call.arguments.str_field("url").filter(|u| !u.is_empty()) {
                        tracker.current_url = Some(url.to_string());
                    }
                }
            }
            "web_search" => {
                if let Some(query) = call.arguments.str_field("query").filter(|q| !q.is_empty()) {
                    tracker.search_history.push(query.to_string());
                }
            }
            "file_saver" => {
                if let Some(path) = call.arguments.str_field("file_path").filter(|p| !p.is_empty()) {
                    tracker.saved_files.push(path.to_string());
                }
            }
            _ => {}
        }
    }

    pub fn web_tracker(&self) -> Option<&WebTracker> {
        match self {
            AgentProfile::Web(tracker) => Some(tracker),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        if let AgentProfile::Web(tracker) = self {
            *tracker = WebTracker::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_profile_tracks_calls_and_prefixes_url() {
        let mut profile = AgentProfile::web();
        assert_eq!(profile.render_next_step("next"), "next");

        profile.observe(&ToolCallRequest::new("1", "browser_use", r#"{"action":"navigate","url":"https://a.dev"}"#));
        profile.observe(&ToolCallRequest::new("2", "web_search", r#"{"query":"rust async"}"#));
        profile.observe(&ToolCallRequest::new("3", "file_saver", r#"{"file_path":"notes.md","content":"x"}"#));
        profile.observe(&ToolCallRequest::new("4", "web_search", "{broken"));

        let tracker = profile.web_tracker().unwrap();
        assert_eq!(tracker.current_url.as_deref(), Some("https://a.dev"));
        assert_eq!(tracker.search_history, vec!["rust async"]);
        assert_eq!(tracker.saved_files, vec!["notes.md"]);
        assert_eq!(profile.render_next_step("next"), "Current URL: https://a.dev\nnext");

        profile.reset();
        assert_eq!(profile.web_tracker(), Some(&WebTracker::default()));
    }

    #[test]
    fn test_directory_substitution() {
        let swe = AgentProfile::Swe { current_dir: PathBuf::from("/ws") };
        assert_eq!(swe.render_next_step("in {current_dir}"), "in /ws");
        let dm = AgentProfile::DataMiner { working_dir: PathBuf::from("/ws") };
        assert_eq!(dm.render_next_step("in {working_dir}"), "in /ws");
    }
}
