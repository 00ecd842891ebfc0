//! Colored terminal output for planner types.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use owo_colors::OwoColorize;
use weekplan_core::availability::DayStatus;
use weekplan_core::event::{Child, EventStatus};
use weekplan_core::plan::{ApplyOutcome, ChangeKind, PlanReviewer, PlanTab, RescheduleChange};
use weekplan_core::session::{Notice, NoticeLevel};
use weekplan_core::time_input::format_time_of_day;
use weekplan_core::view::{DayColumn, EventBlock, WeekView};

pub trait Render {
    fn render(&self) -> String;
}

impl Render for ChangeKind {
    fn render(&self) -> String {
        let symbol = self.to_string();
        match self {
            ChangeKind::Add => symbol.green().to_string(),
            ChangeKind::Move => symbol.yellow().to_string(),
            ChangeKind::Delete => symbol.red().to_string(),
        }
    }
}

impl Render for DayStatus {
    fn render(&self) -> String {
        match self {
            DayStatus::None => String::new(),
            DayStatus::Partial => "partly off".yellow().to_string(),
            DayStatus::Full => "blacked out".red().to_string(),
        }
    }
}

impl Render for Notice {
    fn render(&self) -> String {
        match self.level {
            NoticeLevel::Info => self.message.dimmed().to_string(),
            NoticeLevel::Warning => self.message.yellow().to_string(),
            NoticeLevel::Error => self.message.red().to_string(),
        }
    }
}

impl Render for ApplyOutcome {
    fn render(&self) -> String {
        let line = self.to_string();
        if self.is_mismatch() {
            format!(
                "{} {}",
                line.yellow(),
                format!("(approved {})", self.requested.total()).dimmed()
            )
        } else {
            line.green().to_string()
        }
    }
}

fn clock(at: DateTime<Utc>, tz: Tz) -> String {
    format_time_of_day(at.with_timezone(&tz).time())
}

fn span(start: DateTime<Utc>, end: DateTime<Utc>, tz: Tz) -> String {
    let local = start.with_timezone(&tz);
    format!(
        "{} {} - {}",
        local.format("%a %d %b"),
        clock(start, tz),
        clock(end, tz)
    )
}

pub fn render_week(view: &WeekView, tz: Tz, children: &[Child]) -> String {
    let mut header = format!("Week of {}", view.week);
    if view.frozen {
        header = format!("{} {}", header, "(frozen)".cyan());
    }

    let mut lines = vec![header.bold().to_string()];
    for day in &view.days {
        lines.push(String::new());
        lines.extend(render_day(day, tz, children));
    }
    lines.join("\n")
}

fn render_day(day: &DayColumn, tz: Tz, children: &[Child]) -> Vec<String> {
    let mut title = day.date.format("%A %d %B").to_string();
    let status = day.status.render();
    if !status.is_empty() {
        title = format!("{}  {}", title, status);
    }

    let mut lines = vec![title];
    if day.status == DayStatus::Partial && !day.windows.is_empty() {
        let windows: Vec<String> = day.windows.iter().map(|w| w.to_string()).collect();
        lines.push(format!("   available {}", windows.join(", ")).dimmed().to_string());
    }

    if day.blocks.is_empty() && day.hidden == 0 {
        lines.push("   Nothing scheduled".dimmed().to_string());
    }
    for block in &day.blocks {
        lines.push(format!("   {}", render_block(block, tz, children)));
    }
    if day.hidden > 0 {
        lines.push(
            format!("   {} more outside visible hours", day.hidden)
                .dimmed()
                .to_string(),
        );
    }
    lines
}

fn render_block(block: &EventBlock, tz: Tz, children: &[Child]) -> String {
    let event = &block.event;
    let time = format!("{} - {}", clock(event.start, tz), clock(event.end, tz));
    let child = children
        .iter()
        .find(|c| c.id == event.child_id)
        .map(|c| c.name.as_str())
        .unwrap_or(event.child_id.as_str());

    let mut line = format!(
        "{:<19} {} {}",
        time,
        event.display_name(),
        format!("({})", child).dimmed()
    );
    match event.status {
        EventStatus::Done => line = format!("{} {}", line, "done".green()),
        EventStatus::Skipped | EventStatus::Canceled | EventStatus::Unknown => {
            line = format!("{} {}", line, event.status.to_string().dimmed())
        }
        EventStatus::InProgress => line = format!("{} {}", line, "in progress".cyan()),
        EventStatus::Scheduled => {}
    }
    if block.needs_reschedule {
        line = format!("{} {}", line, "needs a new slot".red());
    }
    line = format!("{} {}", line, format!("[{}]", event.id).dimmed());
    line
}

fn render_change(change: &RescheduleChange, reviewer: &PlanReviewer, tz: Tz) -> String {
    let approved = reviewer.is_approved(&change.id);
    let edited = reviewer
        .edits_for(&change.id)
        .and_then(|edits| change.resolve(edits).ok());

    let label = change
        .title
        .clone()
        .or_else(|| change.event_id().map(str::to_string))
        .unwrap_or_else(|| change.id.clone());
    let when = match (edited, change.proposed_span()) {
        (Some(resolved), _) => format!("{} {}", span(resolved.start, resolved.end, tz), "(edited)".cyan()),
        (None, Some((start, end))) => span(start, end, tz),
        (None, None) => String::new(),
    };

    let line = format!(
        "{} {} {} {}",
        change.kind().render(),
        label,
        when.dimmed(),
        format!("[{}]", change.id).dimmed()
    );
    if approved {
        line
    } else {
        format!("{} {}", line.strikethrough(), "skipped".dimmed())
    }
}

pub fn render_plan(reviewer: &PlanReviewer, tz: Tz) -> String {
    let plan = reviewer.plan();
    let mut lines = vec![format!("Proposed: {}", plan.summary).bold().to_string()];

    for tab in [PlanTab::Adds, PlanTab::Moves, PlanTab::Deletes] {
        let changes = reviewer.filtered(tab);
        if changes.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("   {}:", tab).dimmed().to_string());
        for change in changes {
            lines.push(format!("   {}", render_change(change, reviewer, tz)));
        }
    }
    lines.push(String::new());
    lines.push(reviewer.status_line().dimmed().to_string());
    lines.join("\n")
}
