//! Wall-clock time to grid coordinates.
//!
//! Positions are percentages of the visible day column, so the same layout
//! works for any rendered column height.

use chrono::{NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DAY_END_MINUTES, DEFAULT_DAY_START_MINUTES, DEFAULT_HOUR_STEP_MINUTES,
    MIN_BLOCK_MINUTES, MINUTES_PER_DAY,
};
use crate::error::{PlannerError, PlannerResult};
use crate::event::Event;

/// Minutes since midnight for an `HH:MM` or `HH:MM:SS` string.
///
/// Malformed input yields 0 and a warning; this never fails.
pub fn minutes_since_midnight(time: &str) -> u32 {
    match parse_clock_time(time) {
        Some(minutes) => minutes,
        None => {
            tracing::warn!("Malformed time of day '{}', treating as 00:00", time);
            0
        }
    }
}

/// Strict form of [`minutes_since_midnight`]: `None` on malformed input.
pub fn parse_clock_time(time: &str) -> Option<u32> {
    let mut parts = time.trim().split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = parts.next()?.parse().ok()?;
    if let Some(seconds) = parts.next() {
        let seconds: u32 = seconds.parse().ok()?;
        if seconds > 59 {
            return None;
        }
    }
    if parts.next().is_some() || hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

pub fn minutes_of(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Format minutes since midnight as `H:MM`.
pub fn format_minutes(minutes: u32) -> String {
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

/// The slice of the day the grid shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleHours {
    start: u32,
    end: u32,
    step: u32,
}

impl Default for VisibleHours {
    fn default() -> Self {
        VisibleHours {
            start: DEFAULT_DAY_START_MINUTES,
            end: DEFAULT_DAY_END_MINUTES,
            step: DEFAULT_HOUR_STEP_MINUTES,
        }
    }
}

impl VisibleHours {
    pub fn new(start: u32, end: u32, step: u32) -> PlannerResult<Self> {
        if start >= end || end > MINUTES_PER_DAY {
            return Err(PlannerError::Config(format!(
                "Visible hours must satisfy start < end <= 24:00 (got {} - {})",
                format_minutes(start),
                format_minutes(end)
            )));
        }
        if step == 0 {
            return Err(PlannerError::Config("Hour step must be positive".into()));
        }
        Ok(VisibleHours { start, end, step })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn span(&self) -> u32 {
        self.end - self.start
    }

    pub fn labels(&self) -> Vec<String> {
        hour_labels(self.start, self.end, self.step)
    }
}

/// Ruler labels from `start` to `end` every `step` minutes.
pub fn hour_labels(start: u32, end: u32, step: u32) -> Vec<String> {
    if step == 0 || end < start {
        return Vec::new();
    }
    (0..=(end - start) / step)
        .map(|i| format_minutes(start + i * step))
        .collect()
}

/// Vertical placement of a block, in percent of the column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridPosition {
    pub top: f64,
    pub height: f64,
}

/// Place a block that starts `start_minute` minutes after midnight.
///
/// Returns `None` when the block starts at or below the bottom edge.
pub fn position_for(
    start_minute: i64,
    duration_minutes: i64,
    hours: &VisibleHours,
) -> Option<GridPosition> {
    let span = hours.span() as f64;
    let duration = duration_minutes.max(MIN_BLOCK_MINUTES) as f64;

    let mut top = (start_minute - hours.start as i64) as f64 / span * 100.0;
    if top >= 100.0 {
        return None;
    }
    if top < 0.0 {
        top = 0.0;
    }

    let height = (duration / span * 100.0).min(100.0);
    // Keep the whole block inside the column without shrinking it
    if top + height > 100.0 {
        top = 100.0 - height;
    }

    Some(GridPosition { top, height })
}

/// Place an event using its wall-clock start in the family timezone.
pub fn position_for_event(event: &Event, tz: Tz, hours: &VisibleHours) -> Option<GridPosition> {
    let start = event.local_start(tz);
    let start_minute = minutes_of(start.time()) as i64;
    position_for(start_minute, event.duration().num_minutes(), hours)
}

/// Start and length of a block, in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub start: i64,
    pub duration: i64,
}

impl BlockSpan {
    pub fn new(start: i64, duration: i64) -> Self {
        BlockSpan {
            start,
            duration: duration.max(MIN_BLOCK_MINUTES),
        }
    }

    pub fn end(&self) -> i64 {
        self.start + self.duration
    }

    fn overlaps(&self, other: &BlockSpan) -> bool {
        self.start < other.end() && self.end() > other.start
    }

    fn is_active_at(&self, minute: i64) -> bool {
        self.start <= minute && self.end() > minute
    }
}

/// Horizontal placement of a block among overlapping neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaneSlot {
    pub lane: usize,
    pub lanes: usize,
}

impl LaneSlot {
    pub fn width_percent(&self) -> f64 {
        100.0 / self.lanes as f64
    }

    pub fn left_percent(&self) -> f64 {
        self.lane as f64 * self.width_percent()
    }
}

/// Assign overlapping blocks to side-by-side lanes.
///
/// Blocks are packed greedily (earliest first, shorter first on ties) into
/// the first lane with room. A block's lane count is the largest number of
/// lanes busy at any moment of its own span. Output order matches input.
pub fn layout_lanes(blocks: &[BlockSpan]) -> Vec<LaneSlot> {
    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by_key(|&i| (blocks[i].start, blocks[i].duration));

    let mut lanes: Vec<Vec<usize>> = Vec::new();
    let mut lane_of = vec![0; blocks.len()];

    for &i in &order {
        let block = &blocks[i];
        let free = lanes
            .iter()
            .position(|lane| lane.iter().all(|&j| !block.overlaps(&blocks[j])));
        let lane = match free {
            Some(lane) => lane,
            None => {
                lanes.push(Vec::new());
                lanes.len() - 1
            }
        };
        lanes[lane].push(i);
        lane_of[i] = lane;
    }

    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| {
            let check_points = std::iter::once(block.start).chain(
                blocks
                    .iter()
                    .map(|other| other.start)
                    .filter(|&t| t > block.start && t < block.end()),
            );
            let busiest = check_points
                .map(|t| {
                    lanes
                        .iter()
                        .filter(|lane| lane.iter().any(|&j| blocks[j].is_active_at(t)))
                        .count()
                })
                .max()
                .unwrap_or(1);

            LaneSlot {
                lane: lane_of[i],
                lanes: busiest.max(lane_of[i] + 1),
            }
        })
        .collect()
}
