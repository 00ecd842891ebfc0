//! Batch reschedule proposals and their review.

mod change;
mod change_kind;
mod normalize;
mod reviewer;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use change::{AddPayload, ChangeDetail, ChangeEdits, RescheduleChange, ResolvedSpan};
pub use change_kind::ChangeKind;
pub use normalize::{RawChange, RawProposal, normalize_proposal};
pub use reviewer::{PlanReviewer, PlanSubmission, PlanTab};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReschedulePlan {
    /// Required to submit; a plan without one can be reviewed but not applied.
    pub id: Option<String>,
    pub changes: Vec<RescheduleChange>,
    pub summary: PlanSummary,
}

impl ReschedulePlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn change(&self, id: &str) -> Option<&RescheduleChange> {
        self.changes.iter().find(|c| c.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    #[serde(default)]
    pub adds: usize,
    #[serde(default)]
    pub moves: usize,
    #[serde(default)]
    pub deletes: usize,
    #[serde(default, alias = "minutesShifted")]
    pub minutes_shifted: i64,
}

impl PlanSummary {
    pub fn from_changes(changes: &[RescheduleChange]) -> Self {
        let counts = ChangeCounts::from_changes(changes.iter());
        PlanSummary {
            adds: counts.adds,
            moves: counts.moves,
            deletes: counts.deletes,
            minutes_shifted: changes.iter().map(|c| c.minutes()).sum(),
        }
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} adds, {} moves, {} deletes ({} min)",
            self.adds, self.moves, self.deletes, self.minutes_shifted
        )
    }
}

/// Per-kind change counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    #[serde(default)]
    pub adds: usize,
    #[serde(default)]
    pub moves: usize,
    #[serde(default)]
    pub deletes: usize,
}

impl ChangeCounts {
    pub fn from_changes<'a>(changes: impl Iterator<Item = &'a RescheduleChange>) -> Self {
        let mut counts = ChangeCounts::default();
        for change in changes {
            match change.kind() {
                ChangeKind::Add => counts.adds += 1,
                ChangeKind::Move => counts.moves += 1,
                ChangeKind::Delete => counts.deletes += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.adds + self.moves + self.deletes
    }
}

/// One approved change as sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub change_id: String,
    pub approved: bool,
    /// Fully resolved span when the reviewer edited the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edits: Option<ChangeEdits>,
}

/// Result of a successful apply.
///
/// The backend may apply fewer changes than were approved; that is
/// reported as a mismatch, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub applied: ChangeCounts,
    pub requested: ChangeCounts,
    pub total: usize,
}

impl ApplyOutcome {
    pub fn is_mismatch(&self) -> bool {
        self.applied != self.requested
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Applied {} adds, {} moves, {} deletes",
            self.applied.adds, self.applied.moves, self.applied.deletes
        )
    }
}
