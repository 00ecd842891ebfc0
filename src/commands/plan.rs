use anyhow::{Result, anyhow};
use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use weekplan_core::plan::{ChangeEdits, ReschedulePlan};
use weekplan_core::time_input::parse_time_of_day;
use weekplan_core::week::Week;

use super::{Context, print_notices};
use crate::render::{Render, render_plan};
use crate::utils::tui::with_spinner;

pub struct PlanArgs {
    pub week: Week,
    pub children: Vec<String>,
    pub reason: Option<String>,
    pub skip: Vec<String>,
    pub edits: Vec<String>,
    pub dry_run: bool,
}

pub async fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let tz = ctx.settings.tz;
    let session = ctx.open(args.week, &args.children).await?;

    let plan = with_spinner(
        "Requesting a plan",
        session.propose_reschedule(None, args.reason.as_deref()),
    )
    .await?;

    if plan.is_empty() {
        print_notices(&session).await;
        return Ok(());
    }

    for change_id in &args.skip {
        session
            .review(|r| r.set_approved(change_id, false))
            .await?;
    }
    for edit in &args.edits {
        let (change_id, edits) = parse_edit(edit, &plan, tz)?;
        session.review(|r| r.edit(&change_id, edits)).await?;
    }

    println!("{}", session.review(|r| Ok(render_plan(r, tz))).await?);
    if args.dry_run {
        return Ok(());
    }

    println!();
    let result = with_spinner("Applying approved changes", session.submit_plan()).await;

    match result {
        Ok(outcome) => {
            println!("{}", outcome.render());
            println!("{}", session.review(|r| Ok(r.status_line())).await?);
        }
        Err(e) => {
            print_notices(&session).await;
            return Err(e.into());
        }
    }
    Ok(())
}

/// Parse `<change-id>=<time>[/<duration>]`.
///
/// The time lands on the day the change was proposed for. Either part may
/// be left out, so `c2=/30m` only shortens the block.
fn parse_edit(input: &str, plan: &ReschedulePlan, tz: Tz) -> Result<(String, ChangeEdits)> {
    let (change_id, value) = input.split_once('=').ok_or_else(|| {
        anyhow!(
            "Invalid edit '{}'. Use <change-id>=<time>[/<duration>]",
            input
        )
    })?;
    let change = plan
        .change(change_id)
        .ok_or_else(|| anyhow!("No change '{}' in this plan", change_id))?;
    let (start, _) = change
        .proposed_span()
        .ok_or_else(|| anyhow!("Change '{}' has no time to edit", change_id))?;

    let (time, duration) = match value.split_once('/') {
        Some((time, duration)) => (time.trim(), Some(duration.trim())),
        None => (value.trim(), None),
    };

    let mut edits = ChangeEdits::default();
    if !time.is_empty() {
        let time = parse_time_of_day(time)?;
        let day = start.with_timezone(&tz).date_naive();
        let local = tz
            .from_local_datetime(&day.and_time(time))
            .earliest()
            .ok_or_else(|| anyhow!("{} {} does not exist in {}", day, time, tz.name()))?;
        edits.start = Some(local.with_timezone(&Utc));
    }
    if let Some(duration) = duration {
        let duration = humantime::parse_duration(duration)?;
        edits.minutes = Some((duration.as_secs() / 60) as i64);
    }

    if edits.is_empty() {
        anyhow::bail!("Edit '{}' changes nothing", input);
    }
    Ok((change_id.to_string(), edits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weekplan_core::plan::{RawProposal, normalize_proposal};

    fn plan() -> ReschedulePlan {
        let raw: RawProposal = serde_json::from_value(serde_json::json!({
            "plan_id": "p1",
            "changes": [
                {"id": "c1", "change_type": "add", "payload": {
                    "child": "kid-a", "title": "Reading",
                    "start": "2025-03-18T14:00:00Z", "end": "2025-03-18T14:30:00Z"
                }},
                {"id": "c2", "change_type": "delete", "event_id": "e9"}
            ]
        }))
        .unwrap();
        normalize_proposal(raw)
    }

    #[test]
    fn edit_time_and_duration() {
        let (id, edits) = parse_edit("c1=9:30 am/45m", &plan(), chrono_tz::UTC).unwrap();

        assert_eq!(id, "c1");
        assert_eq!(
            edits.start,
            Some(Utc.with_ymd_and_hms(2025, 3, 18, 9, 30, 0).unwrap())
        );
        assert_eq!(edits.minutes, Some(45));
    }

    #[test]
    fn edit_duration_only() {
        let (_, edits) = parse_edit("c1=/20m", &plan(), chrono_tz::UTC).unwrap();
        assert_eq!(edits.start, None);
        assert_eq!(edits.minutes, Some(20));
    }

    #[test]
    fn rejects_bad_edits() {
        let tz = chrono_tz::UTC;
        assert!(parse_edit("c1", &plan(), tz).is_err());
        assert!(parse_edit("nope=9:00", &plan(), tz).is_err());
        assert!(parse_edit("c2=9:00", &plan(), tz).is_err());
        assert!(parse_edit("c1=25:00", &plan(), tz).is_err());
        assert!(parse_edit("c1=", &plan(), tz).is_err());
    }
}
