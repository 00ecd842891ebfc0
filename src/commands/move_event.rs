use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use weekplan_core::time_input::format_time_of_day;
use weekplan_core::week::Week;

use super::{Context, print_notices};
use crate::utils::tui::with_spinner;

pub async fn run(ctx: &Context, event_id: &str, date: NaiveDate) -> Result<()> {
    let session = ctx.open(Week::containing(date), &[]).await?;

    let result = with_spinner(
        format!("Moving {} to {}", event_id, date),
        session.move_to_day(event_id, date),
    )
    .await;

    match result {
        Ok(Some(event)) => {
            let start = event.local_start(ctx.settings.tz);
            println!(
                "{} {} moved to {} at {}",
                "~".yellow(),
                event.display_name(),
                start.format("%A %d %B"),
                format_time_of_day(start.time())
            );
        }
        Ok(None) => println!("{}", format!("{} is already on {}", event_id, date).dimmed()),
        Err(e) => {
            print_notices(&session).await;
            return Err(e.into());
        }
    }
    Ok(())
}
