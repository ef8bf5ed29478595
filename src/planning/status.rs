//! 步骤状态与展示符号

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 计划步骤状态；Completed 为终态，其余均可被选中执行
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    NotStarted,
    InProgress,
    Blocked,
    Completed,
}

impl StepStatus {
    pub const ALL: [StepStatus; 4] = [
        StepStatus::NotStarted,
        StepStatus::InProgress,
        StepStatus::Blocked,
        StepStatus::Completed,
    ];

    pub fn is_active(self) -> bool {
        !matches!(self, StepStatus::Completed)
    }

    pub fn glyph(self) -> &'static str {
        match self {
            StepStatus::NotStarted => "[ ]",
            StepStatus::InProgress => "[→]",
            StepStatus::Blocked => "[!]",
            StepStatus::Completed => "[✓]",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::NotStarted => "not_started",
            StepStatus::InProgress => "in_progress",
            StepStatus::Blocked => "blocked",
            StepStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s.trim())
            .ok_or_else(|| format!("unknown step status: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_active_set() {
        let active: Vec<_> = StepStatus::ALL.into_iter().filter(|s| s.is_active()).collect();
        assert_eq!(
            active,
            vec![StepStatus::NotStarted, StepStatus::InProgress, StepStatus::Blocked]
        );
    }

    #[test]
    fn test_glyphs_are_distinct() {
        let glyphs: HashSet<_> = StepStatus::ALL.into_iter().map(|s| s.glyph()).collect();
        assert_eq!(glyphs.len(), 4);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!("in_progress".parse::<StepStatus>().unwrap(), StepStatus::InProgress);
        assert_eq!(
            serde_json::to_value(StepStatus::NotStarted).unwrap(),
            serde_json::json!("not_started")
        );
        assert!("done".parse::<StepStatus>().is_err());
    }
}
