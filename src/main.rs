mod commands;
mod render;
mod utils;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::plan::PlanArgs;

#[derive(Parser)]
#[command(name = "weekplan")]
#[command(about = "Plan your family's school week and keep it balanced")]
struct Cli {
    /// Log what the planner is doing (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show one week, day by day
    Week {
        /// this, next, prev or any date inside the week (YYYY-MM-DD)
        #[arg(short, long)]
        week: Option<String>,

        /// Only show these children (repeatable)
        #[arg(short, long = "child")]
        children: Vec<String>,
    },
    /// Move an event to another day of its week, keeping its time
    Move {
        event_id: String,

        /// Target day (YYYY-MM-DD)
        date: String,
    },
    /// Freeze a week so nothing in it can be moved
    Freeze {
        #[arg(short, long)]
        week: Option<String>,

        /// Unfreeze instead
        #[arg(long)]
        off: bool,
    },
    /// Ask for a reschedule plan, review it and apply the approved changes
    Plan {
        #[arg(short, long)]
        week: Option<String>,

        /// Only plan for these children (repeatable)
        #[arg(short, long = "child")]
        children: Vec<String>,

        /// Why the plan is requested
        #[arg(short, long)]
        reason: Option<String>,

        /// Leave this change out (repeatable)
        #[arg(long)]
        skip: Vec<String>,

        /// Adjust a change: <change-id>=<time>[/<duration>], e.g. c2=9:30am/45m
        #[arg(long = "edit")]
        edits: Vec<String>,

        /// Show the plan without applying it
        #[arg(long)]
        dry_run: bool,
    },
    /// Black out one or more days
    Blackout {
        /// First day (YYYY-MM-DD)
        from: String,

        /// Last day, defaults to the first
        to: Option<String>,

        /// Only this child; everyone when omitted
        #[arg(short, long)]
        child: Option<String>,

        #[arg(short, long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let ctx = commands::Context::load()?;

    match cli.command {
        Commands::Week { week, children } => {
            let week = ctx.week(week.as_deref())?;
            commands::week::run(&ctx, week, children).await
        }
        Commands::Move { event_id, date } => {
            let date = parse_date(&date)?;
            commands::move_event::run(&ctx, &event_id, date).await
        }
        Commands::Freeze { week, off } => {
            let week = ctx.week(week.as_deref())?;
            commands::freeze::run(&ctx, week, !off).await
        }
        Commands::Plan {
            week,
            children,
            reason,
            skip,
            edits,
            dry_run,
        } => {
            let week = ctx.week(week.as_deref())?;
            commands::plan::run(&ctx, PlanArgs {
                week,
                children,
                reason,
                skip,
                edits,
                dry_run,
            })
            .await
        }
        Commands::Blackout {
            from,
            to,
            child,
            reason,
        } => {
            let starts_on = parse_date(&from)?;
            let ends_on = match to {
                Some(to) => parse_date(&to)?,
                None => starts_on,
            };
            commands::blackout::run(&ctx, starts_on, ends_on, child, reason).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid date '{}'. Use YYYY-MM-DD", value))
}
