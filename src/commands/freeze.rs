use anyhow::Result;
use owo_colors::OwoColorize;
use weekplan_core::week::Week;

use super::{Context, print_notices};

pub async fn run(ctx: &Context, week: Week, frozen: bool) -> Result<()> {
    let session = ctx.open(week, &[]).await?;
    let state = if frozen { "frozen" } else { "unfrozen" };

    match session.toggle_freeze(frozen).await {
        Ok(Some(days)) => println!(
            "Week of {} is now {} {}",
            week,
            state.cyan(),
            format!("({} days updated)", days).dimmed()
        ),
        Ok(None) => println!("{}", format!("Week of {} is already {}", week, state).dimmed()),
        Err(e) => {
            print_notices(&session).await;
            return Err(e.into());
        }
    }
    Ok(())
}
