use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, PlannerResult};
use crate::plan::ChangeKind;

/// A new block the plan wants to schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddPayload {
    #[serde(alias = "child")]
    pub child_id: String,
    #[serde(default, alias = "subject")]
    pub subject_id: Option<String>,
    #[serde(default, alias = "subjectName")]
    pub subject_name: Option<String>,
    #[serde(default)]
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub is_flexible: bool,
    #[serde(default)]
    pub minutes: Option<i64>,
}

/// What a change does. Each variant carries exactly the references its
/// kind needs: moves know where the event was, deletes know which event,
/// adds have no existing event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change_type", rename_all = "snake_case")]
pub enum ChangeDetail {
    Add(AddPayload),
    Move {
        event_id: String,
        from_start: DateTime<Utc>,
        #[serde(default)]
        from_end: Option<DateTime<Utc>>,
        to_start: DateTime<Utc>,
        to_end: DateTime<Utc>,
    },
    Delete {
        event_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleChange {
    pub id: String,
    /// Human label for the affected block
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub detail: ChangeDetail,
}

impl RescheduleChange {
    pub fn kind(&self) -> ChangeKind {
        match self.detail {
            ChangeDetail::Add(_) => ChangeKind::Add,
            ChangeDetail::Move { .. } => ChangeKind::Move,
            ChangeDetail::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// Existing event the change targets. Adds never have one.
    pub fn event_id(&self) -> Option<&str> {
        match &self.detail {
            ChangeDetail::Add(_) => None,
            ChangeDetail::Move { event_id, .. } | ChangeDetail::Delete { event_id, .. } => {
                Some(event_id)
            }
        }
    }

    /// Proposed time span, for kinds that place a block.
    pub fn proposed_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match &self.detail {
            ChangeDetail::Add(payload) => Some((payload.start, payload.end)),
            ChangeDetail::Move { to_start, to_end, .. } => Some((*to_start, *to_end)),
            ChangeDetail::Delete { .. } => None,
        }
    }

    /// Minutes this change contributes to the plan's shifted total.
    pub fn minutes(&self) -> i64 {
        match &self.detail {
            ChangeDetail::Add(payload) => payload
                .minutes
                .unwrap_or_else(|| (payload.end - payload.start).num_minutes()),
            _ => 0,
        }
    }

    /// Apply `edits` over the proposed span.
    ///
    /// An explicit end wins; otherwise the end is the (possibly edited)
    /// start plus the edited minutes or the original duration.
    pub fn resolve(&self, edits: &ChangeEdits) -> PlannerResult<ResolvedSpan> {
        let (start, end) = self.proposed_span().ok_or_else(|| {
            PlannerError::Validation(format!("Change {} has no time to edit", self.id))
        })?;

        let new_start = edits.start.unwrap_or(start);
        let new_end = match (edits.end, edits.minutes) {
            (Some(end), _) => end,
            (None, Some(minutes)) => new_start + Duration::minutes(minutes),
            (None, None) => new_start + (end - start),
        };

        if new_end <= new_start {
            return Err(PlannerError::Validation(format!(
                "Change {} would end before it starts",
                self.id
            )));
        }

        Ok(ResolvedSpan {
            start: new_start,
            end: new_end,
        })
    }
}

impl fmt::Display for RescheduleChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match (&self.title, &self.detail) {
            (Some(title), _) => title.as_str(),
            (None, ChangeDetail::Add(payload)) => payload.title.as_str(),
            (None, ChangeDetail::Move { event_id, .. } | ChangeDetail::Delete { event_id, .. }) => {
                event_id.as_str()
            }
        };
        write!(f, "{} {}", self.kind(), label)
    }
}

/// Reviewer overrides for one change, stored apart from the plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeEdits {
    #[serde(default, rename = "startTs", skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, rename = "endTs", skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<i64>,
}

impl ChangeEdits {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.minutes.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ResolvedSpan {
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl From<ResolvedSpan> for ChangeEdits {
    fn from(span: ResolvedSpan) -> Self {
        ChangeEdits {
            start: Some(span.start),
            end: Some(span.end),
            minutes: Some(span.minutes()),
        }
    }
}
