use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use weekplan_core::session::BlackoutRequest;
use weekplan_core::week::Week;

use super::{Context, print_notices};
use crate::utils::tui::with_spinner;

pub async fn run(
    ctx: &Context,
    starts_on: NaiveDate,
    ends_on: NaiveDate,
    child: Option<String>,
    reason: Option<String>,
) -> Result<()> {
    let request = BlackoutRequest {
        child_id: child,
        starts_on,
        ends_on,
        reason,
    };
    request.validate()?;

    let session = ctx.open(Week::containing(starts_on), &[]).await?;
    let result = with_spinner("Saving blackout", session.create_blackout(request)).await;
    print_notices(&session).await;

    let outcome = result?;
    println!("{} {} - {}", "Blacked out".red(), starts_on, ends_on);

    if let Some(plan) = outcome.proposal {
        if plan.is_empty() {
            println!("{}", "Nothing needs to move.".dimmed());
        } else {
            println!("Suggested: {}", plan.summary);
            println!("{}", "Run `weekplan plan` to review and apply it.".dimmed());
        }
    }
    Ok(())
}
