use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PlannerError, PlannerResult};
use crate::plan::{
    ApplyOutcome, Approval, ChangeCounts, ChangeEdits, ChangeKind, ReschedulePlan,
    RescheduleChange,
};
use crate::remote::protocol::ApplyPlan;

/// Which changes a review list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanTab {
    #[default]
    All,
    Adds,
    Moves,
    Deletes,
}

impl PlanTab {
    pub fn shows(&self, kind: ChangeKind) -> bool {
        match self {
            PlanTab::All => true,
            PlanTab::Adds => kind == ChangeKind::Add,
            PlanTab::Moves => kind == ChangeKind::Move,
            PlanTab::Deletes => kind == ChangeKind::Delete,
        }
    }
}

impl fmt::Display for PlanTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlanTab::All => "all",
            PlanTab::Adds => "adds",
            PlanTab::Moves => "moves",
            PlanTab::Deletes => "deletes",
        };
        write!(f, "{label}")
    }
}

/// Approval state over one proposed plan.
///
/// Nothing here talks to the backend; [`PlanReviewer::build_submission`]
/// produces the single batch request and [`PlanReviewer::record_outcome`]
/// takes its result.
#[derive(Debug, Clone)]
pub struct PlanReviewer {
    plan: ReschedulePlan,
    // Keys are always ids of `plan.changes`
    approvals: BTreeMap<String, bool>,
    edits: BTreeMap<String, ChangeEdits>,
    outcome: Option<ApplyOutcome>,
}

/// A batch request plus the per-kind counts it asked for.
#[derive(Debug, Clone)]
pub struct PlanSubmission {
    pub request: ApplyPlan,
    pub requested: ChangeCounts,
    pub total: usize,
}

impl PlanReviewer {
    /// Every change starts approved.
    pub fn new(plan: ReschedulePlan) -> Self {
        let approvals = plan.changes.iter().map(|c| (c.id.clone(), true)).collect();
        PlanReviewer {
            plan,
            approvals,
            edits: BTreeMap::new(),
            outcome: None,
        }
    }

    pub fn plan(&self) -> &ReschedulePlan {
        &self.plan
    }

    pub fn outcome(&self) -> Option<&ApplyOutcome> {
        self.outcome.as_ref()
    }

    fn ensure_known(&self, change_id: &str) -> PlannerResult<&RescheduleChange> {
        self.plan.change(change_id).ok_or_else(|| {
            PlannerError::Validation(format!("Unknown change '{}'", change_id))
        })
    }

    pub fn is_approved(&self, change_id: &str) -> bool {
        self.approvals.get(change_id).copied().unwrap_or(false)
    }

    /// Flip a change's approval and return the new state.
    pub fn toggle(&mut self, change_id: &str) -> PlannerResult<bool> {
        self.ensure_known(change_id)?;
        let approved = !self.is_approved(change_id);
        self.approvals.insert(change_id.to_string(), approved);
        Ok(approved)
    }

    pub fn set_approved(&mut self, change_id: &str, approved: bool) -> PlannerResult<()> {
        self.ensure_known(change_id)?;
        self.approvals.insert(change_id.to_string(), approved);
        Ok(())
    }

    pub fn set_all(&mut self, approved: bool) {
        for value in self.approvals.values_mut() {
            *value = approved;
        }
    }

    /// Store an override for a change. Rejected if it does not resolve to a
    /// valid span.
    pub fn edit(&mut self, change_id: &str, edits: ChangeEdits) -> PlannerResult<()> {
        let change = self.ensure_known(change_id)?;
        if edits.is_empty() {
            self.edits.remove(change_id);
            return Ok(());
        }
        change.resolve(&edits)?;
        self.edits.insert(change_id.to_string(), edits);
        Ok(())
    }

    pub fn edits_for(&self, change_id: &str) -> Option<&ChangeEdits> {
        self.edits.get(change_id)
    }

    pub fn approved_count(&self) -> usize {
        self.approvals.values().filter(|a| **a).count()
    }

    pub fn total(&self) -> usize {
        self.plan.changes.len()
    }

    pub fn filtered(&self, tab: PlanTab) -> Vec<&RescheduleChange> {
        self.plan
            .changes
            .iter()
            .filter(|c| tab.shows(c.kind()))
            .collect()
    }

    /// Build the batch request for every approved change.
    pub fn build_submission(&self) -> PlannerResult<PlanSubmission> {
        let plan_id = self
            .plan
            .id
            .clone()
            .ok_or_else(|| PlannerError::Validation("Plan has no id".into()))?;

        let approved: Vec<&RescheduleChange> = self
            .plan
            .changes
            .iter()
            .filter(|c| self.is_approved(&c.id))
            .collect();
        if approved.is_empty() {
            return Err(PlannerError::Validation("No changes selected".into()));
        }

        let approvals = approved
            .iter()
            .map(|change| -> PlannerResult<Approval> {
                let edits = match self.edits.get(&change.id) {
                    Some(edits) => Some(ChangeEdits::from(change.resolve(edits)?)),
                    None => None,
                };
                Ok(Approval {
                    change_id: change.id.clone(),
                    approved: true,
                    edits,
                })
            })
            .collect::<PlannerResult<Vec<_>>>()?;

        Ok(PlanSubmission {
            request: ApplyPlan { plan_id, approvals },
            requested: ChangeCounts::from_changes(approved.into_iter()),
            total: self.total(),
        })
    }

    pub fn record_outcome(
        &mut self,
        submission: &PlanSubmission,
        applied: ChangeCounts,
    ) -> ApplyOutcome {
        let outcome = ApplyOutcome {
            applied,
            requested: submission.requested,
            total: submission.total,
        };
        if outcome.is_mismatch() {
            tracing::warn!(
                "Plan applied partially: requested {:?}, applied {:?}",
                outcome.requested,
                outcome.applied
            );
        }
        self.outcome = Some(outcome);
        outcome
    }

    /// e.g. `5 of 6 approved` or `5 of 6 approved, 4 applied`.
    pub fn status_line(&self) -> String {
        let mut line = format!("{} of {} approved", self.approved_count(), self.total());
        if let Some(outcome) = &self.outcome {
            line.push_str(&format!(", {} applied", outcome.applied.total()));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{AddPayload, ChangeDetail, PlanSummary};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap()
    }

    fn add(id: &str) -> RescheduleChange {
        RescheduleChange {
            id: id.to_string(),
            title: None,
            detail: ChangeDetail::Add(AddPayload {
                child_id: "kid-a".into(),
                subject_id: Some("math".into()),
                subject_name: None,
                title: "Math".into(),
                start: at(18, 14, 0),
                end: at(18, 14, 45),
                is_flexible: false,
                minutes: Some(45),
            }),
        }
    }

    fn moved(id: &str) -> RescheduleChange {
        RescheduleChange {
            id: id.to_string(),
            title: Some("Reading".into()),
            detail: ChangeDetail::Move {
                event_id: format!("ev-{id}"),
                from_start: at(17, 9, 0),
                from_end: Some(at(17, 9, 30)),
                to_start: at(19, 9, 0),
                to_end: at(19, 9, 30),
            },
        }
    }

    fn delete(id: &str) -> RescheduleChange {
        RescheduleChange {
            id: id.to_string(),
            title: None,
            detail: ChangeDetail::Delete {
                event_id: format!("ev-{id}"),
                reason: Some("blackout".into()),
            },
        }
    }

    fn plan(changes: Vec<RescheduleChange>) -> ReschedulePlan {
        let summary = PlanSummary::from_changes(&changes);
        ReschedulePlan {
            id: Some("plan-1".into()),
            changes,
            summary,
        }
    }

    #[test]
    fn changes_start_approved() {
        let reviewer = PlanReviewer::new(plan(vec![add("a1"), moved("m1")]));
        assert_eq!(reviewer.approved_count(), 2);
        assert_eq!(reviewer.status_line(), "2 of 2 approved");
    }

    #[test]
    fn toggle_rejects_unknown_ids() {
        let mut reviewer = PlanReviewer::new(plan(vec![add("a1")]));
        assert!(!reviewer.toggle("a1").unwrap());
        assert!(reviewer.toggle("a1").unwrap());
        assert!(matches!(reviewer.toggle("nope"), Err(PlannerError::Validation(_))));
    }

    #[test]
    fn submission_with_nothing_approved_is_rejected() {
        let mut reviewer = PlanReviewer::new(plan(vec![add("a1"), delete("d1")]));
        reviewer.set_all(false);

        let err = reviewer.build_submission().unwrap_err();
        assert!(matches!(err, PlannerError::Validation(_)));
    }

    #[test]
    fn submission_without_plan_id_is_rejected() {
        let mut p = plan(vec![add("a1")]);
        p.id = None;
        let reviewer = PlanReviewer::new(p);

        assert!(matches!(
            reviewer.build_submission(),
            Err(PlannerError::Validation(_))
        ));
    }

    #[test]
    fn submission_carries_only_approved_changes() {
        let changes = vec![add("a1"), moved("m1"), moved("m2"), delete("d1")];
        let mut reviewer = PlanReviewer::new(plan(changes));
        reviewer.toggle("m2").unwrap();

        let submission = reviewer.build_submission().unwrap();
        let ids: Vec<_> = submission
            .request
            .approvals
            .iter()
            .map(|a| a.change_id.as_str())
            .collect();

        assert_eq!(submission.request.plan_id, "plan-1");
        assert_eq!(ids, vec!["a1", "m1", "d1"]);
        assert_eq!(
            submission.requested,
            ChangeCounts {
                adds: 1,
                moves: 1,
                deletes: 1
            }
        );
    }

    #[test]
    fn edits_take_precedence_over_payload() {
        let mut reviewer = PlanReviewer::new(plan(vec![moved("m1")]));
        reviewer
            .edit(
                "m1",
                ChangeEdits {
                    start: Some(at(19, 10, 0)),
                    ..Default::default()
                },
            )
            .unwrap();

        let submission = reviewer.build_submission().unwrap();
        let edits = submission.request.approvals[0].edits.clone().unwrap();

        // Original 30 minute duration is kept from the new start
        assert_eq!(edits.start, Some(at(19, 10, 0)));
        assert_eq!(edits.end, Some(at(19, 10, 30)));
        assert_eq!(edits.minutes, Some(30));
    }

    #[test]
    fn edited_minutes_set_the_end() {
        let change = add("a1");
        let span = change
            .resolve(&ChangeEdits {
                minutes: Some(20),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(span.end - span.start, Duration::minutes(20));
    }

    #[test]
    fn invalid_edits_are_refused() {
        let mut reviewer = PlanReviewer::new(plan(vec![add("a1"), delete("d1")]));

        let backwards = ChangeEdits {
            end: Some(at(18, 13, 0)),
            ..Default::default()
        };
        assert!(reviewer.edit("a1", backwards).is_err());
        assert!(reviewer.edits_for("a1").is_none());

        let on_delete = ChangeEdits {
            minutes: Some(10),
            ..Default::default()
        };
        assert!(reviewer.edit("d1", on_delete).is_err());
    }

    #[test]
    fn partial_apply_is_a_mismatch_not_an_error() {
        let changes = vec![add("a1"), moved("m1"), moved("m2"), delete("d1")];
        let mut reviewer = PlanReviewer::new(plan(changes));

        let submission = reviewer.build_submission().unwrap();
        let outcome = reviewer.record_outcome(
            &submission,
            ChangeCounts {
                adds: 1,
                moves: 1,
                deletes: 1,
            },
        );

        assert!(outcome.is_mismatch());
        assert_eq!(outcome.to_string(), "Applied 1 adds, 1 moves, 1 deletes");
        assert_eq!(reviewer.status_line(), "4 of 4 approved, 3 applied");
    }

    #[test]
    fn tabs_filter_by_kind() {
        let reviewer = PlanReviewer::new(plan(vec![add("a1"), moved("m1"), delete("d1")]));

        assert_eq!(reviewer.filtered(PlanTab::All).len(), 3);
        let moves = reviewer.filtered(PlanTab::Moves);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].id, "m1");
    }
}
