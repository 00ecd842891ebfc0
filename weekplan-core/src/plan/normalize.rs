//! Turning a backend proposal into a reviewable plan.
//!
//! Proposals are loosely shaped: change ids may be missing, the kind is a
//! free string and the payload an untyped object. Changes that cannot be
//! made structurally valid are dropped with a warning.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::{AddPayload, ChangeDetail, ChangeKind, PlanSummary, ReschedulePlan, RescheduleChange};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProposal {
    #[serde(default, alias = "plan_id", alias = "planId")]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<RawChange>,
    #[serde(default)]
    pub summary: Option<PlanSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawChange {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "type")]
    pub change_type: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Deserialize)]
struct MovePayload {
    #[serde(default)]
    event_id: Option<String>,
    from_start: DateTime<Utc>,
    #[serde(default)]
    from_end: Option<DateTime<Utc>>,
    to_start: DateTime<Utc>,
    to_end: DateTime<Utc>,
}

#[derive(Deserialize, Default)]
struct DeletePayload {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

pub fn normalize_proposal(raw: RawProposal) -> ReschedulePlan {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut changes = Vec::with_capacity(raw.changes.len());

    for raw_change in raw.changes {
        let Some(detail) = normalize_detail(&raw_change) else {
            continue;
        };

        let id = match raw_change.id.filter(|id| !id.is_empty()) {
            Some(id) if !seen.contains(&id) => id,
            _ => Uuid::new_v4().to_string(),
        };
        seen.insert(id.clone());

        changes.push(RescheduleChange {
            id,
            title: raw_change.title,
            detail,
        });
    }

    let summary = raw
        .summary
        .unwrap_or_else(|| PlanSummary::from_changes(&changes));

    ReschedulePlan {
        id: raw.id.filter(|id| !id.is_empty()),
        changes,
        summary,
    }
}

fn normalize_detail(raw: &RawChange) -> Option<ChangeDetail> {
    let Some(kind) = ChangeKind::parse(&raw.change_type) else {
        tracing::warn!("Skipping change with unknown type '{}'", raw.change_type);
        return None;
    };

    let detail = match kind {
        ChangeKind::Add => {
            let payload: AddPayload = parse_payload(raw)?;
            if payload.end <= payload.start {
                tracing::warn!("Skipping add '{}' that ends before it starts", payload.title);
                return None;
            }
            ChangeDetail::Add(payload)
        }
        ChangeKind::Move => {
            let payload: MovePayload = parse_payload(raw)?;
            let event_id = target_id(raw, payload.event_id)?;
            if payload.to_end <= payload.to_start {
                tracing::warn!("Skipping move of '{}' that ends before it starts", event_id);
                return None;
            }
            ChangeDetail::Move {
                event_id,
                from_start: payload.from_start,
                from_end: payload.from_end,
                to_start: payload.to_start,
                to_end: payload.to_end,
            }
        }
        ChangeKind::Delete => {
            let payload: DeletePayload = if raw.payload.is_null() {
                DeletePayload::default()
            } else {
                parse_payload(raw)?
            };
            let event_id = target_id(raw, payload.event_id)?;
            ChangeDetail::Delete {
                event_id,
                reason: payload.reason,
            }
        }
    };
    Some(detail)
}

fn parse_payload<T: serde::de::DeserializeOwned>(raw: &RawChange) -> Option<T> {
    serde_json::from_value(raw.payload.clone())
        .map_err(|e| {
            tracing::warn!("Skipping malformed {} change: {}", raw.change_type, e);
        })
        .ok()
}

fn target_id(raw: &RawChange, from_payload: Option<String>) -> Option<String> {
    let id = raw
        .event_id
        .clone()
        .or(from_payload)
        .filter(|id| !id.is_empty());
    if id.is_none() {
        tracing::warn!("Skipping {} change without a target event", raw.change_type);
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn proposal(value: serde_json::Value) -> RawProposal {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn synthesizes_unique_ids() {
        let raw = proposal(json!({
            "plan_id": "plan-1",
            "changes": [
                {"change_type": "delete", "event_id": "e1"},
                {"change_type": "delete", "event_id": "e2"},
                {"id": "c3", "change_type": "delete", "event_id": "e3"},
                {"id": "c3", "change_type": "delete", "event_id": "e4"}
            ]
        }));

        let plan = normalize_proposal(raw);
        let ids: BTreeSet<_> = plan.changes.iter().map(|c| c.id.clone()).collect();

        assert_eq!(plan.id.as_deref(), Some("plan-1"));
        assert_eq!(plan.changes.len(), 4);
        assert_eq!(ids.len(), 4);
        assert_eq!(plan.changes[2].id, "c3");
    }

    #[test]
    fn parses_each_kind() {
        let raw = proposal(json!({
            "id": "p",
            "changes": [
                {"change_type": "add", "payload": {
                    "child": "kid-a", "subject": "math", "title": "Math catch-up",
                    "start": "2025-03-18T14:00:00Z", "end": "2025-03-18T14:45:00Z",
                    "minutes": 45
                }},
                {"change_type": "move", "event_id": "e1", "payload": {
                    "from_start": "2025-03-17T09:00:00Z",
                    "to_start": "2025-03-19T09:00:00Z",
                    "to_end": "2025-03-19T09:30:00Z"
                }},
                {"change_type": "Delete", "payload": {"event_id": "e2", "reason": "blackout"}}
            ]
        }));

        let plan = normalize_proposal(raw);
        let kinds: Vec<_> = plan.changes.iter().map(|c| c.kind()).collect();

        assert_eq!(kinds, vec![ChangeKind::Add, ChangeKind::Move, ChangeKind::Delete]);
        assert_eq!(plan.changes[0].event_id(), None);
        assert_eq!(plan.changes[1].event_id(), Some("e1"));
        assert_eq!(plan.changes[2].event_id(), Some("e2"));
    }

    #[test]
    fn drops_structurally_invalid_changes() {
        let raw = proposal(json!({
            "changes": [
                {"change_type": "move", "payload": {
                    "from_start": "2025-03-17T09:00:00Z",
                    "to_start": "2025-03-19T09:00:00Z",
                    "to_end": "2025-03-19T09:30:00Z"
                }},
                {"change_type": "delete"},
                {"change_type": "swap", "event_id": "e9"},
                {"change_type": "add", "payload": {"child": "kid-a"}}
            ]
        }));

        let plan = normalize_proposal(raw);
        assert!(plan.changes.is_empty());
        assert!(plan.id.is_none());
        assert_eq!(plan.summary, PlanSummary::default());
    }

    #[test]
    fn drops_inverted_moves() {
        let raw = proposal(json!({
            "changes": [
                {"change_type": "move", "event_id": "e1", "payload": {
                    "from_start": "2025-03-17T09:00:00Z",
                    "to_start": "2025-03-19T09:30:00Z",
                    "to_end": "2025-03-19T09:00:00Z"
                }},
                {"change_type": "move", "event_id": "e2", "payload": {
                    "from_start": "2025-03-17T09:00:00Z",
                    "to_start": "2025-03-19T09:00:00Z",
                    "to_end": "2025-03-19T09:30:00Z"
                }}
            ]
        }));

        let plan = normalize_proposal(raw);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].event_id(), Some("e2"));
    }

    #[test]
    fn computes_missing_summary() {
        let raw = proposal(json!({
            "changes": [
                {"change_type": "add", "payload": {
                    "child": "kid-a", "title": "Reading",
                    "start": "2025-03-18T14:00:00Z", "end": "2025-03-18T14:30:00Z"
                }},
                {"change_type": "delete", "event_id": "e2"}
            ]
        }));

        let plan = normalize_proposal(raw);
        assert_eq!(plan.summary.adds, 1);
        assert_eq!(plan.summary.deletes, 1);
        assert_eq!(plan.summary.minutes_shifted, 30);
    }

    #[test]
    fn keeps_backend_summary() {
        let raw = proposal(json!({
            "changes": [],
            "summary": {"adds": 2, "moves": 0, "deletes": 1, "minutesShifted": 90}
        }));

        let plan = normalize_proposal(raw);
        assert_eq!(plan.summary.adds, 2);
        assert_eq!(plan.summary.minutes_shifted, 90);
    }
}
