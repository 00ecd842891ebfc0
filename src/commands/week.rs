use anyhow::Result;
use weekplan_core::week::Week;

use super::{Context, print_notices};
use crate::render::render_week;

pub async fn run(ctx: &Context, week: Week, children: Vec<String>) -> Result<()> {
    let session = ctx.open(week, &children).await?;

    let Some(view) = session.rendered_week().await else {
        anyhow::bail!("Nothing was loaded for the week of {}", week);
    };
    let family = session.children().await;

    println!("{}", render_week(&view, ctx.settings.tz, &family));
    print_notices(&session).await;
    Ok(())
}
