use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Add,
    Move,
    Delete,
}

impl ChangeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Some(ChangeKind::Add),
            "move" => Some(ChangeKind::Move),
            "delete" => Some(ChangeKind::Delete),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Move => "move",
            ChangeKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Add => write!(f, "+"),
            ChangeKind::Move => write!(f, "~"),
            ChangeKind::Delete => write!(f, "-"),
        }
    }
}
