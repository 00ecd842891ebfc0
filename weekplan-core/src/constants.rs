/// Minutes in a wall-clock day.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Shortest block the grid will draw, so zero-length events stay clickable.
pub const MIN_BLOCK_MINUTES: i64 = 5;

/// Default visible window of the week grid (08:00 to 17:00, hourly ruler).
pub const DEFAULT_DAY_START_MINUTES: u32 = 8 * 60;
pub const DEFAULT_DAY_END_MINUTES: u32 = 17 * 60;
pub const DEFAULT_HOUR_STEP_MINUTES: u32 = 60;

/// How many weeks ahead a reschedule proposal may touch.
pub const DEFAULT_HORIZON_WEEKS: u32 = 2;

/// Opacity and scale of the source block while it is being dragged.
pub const DRAG_GHOST_OPACITY: f64 = 0.5;
pub const DRAG_GHOST_SCALE: f64 = 0.95;

/// Reason attached to reschedule requests that come from the grid.
pub const DRAG_REASON: &str = "manual move";
pub const DRAG_ORIGIN: &str = "drag_drop";

/// Reasons sent with reschedule proposals.
pub const DEFAULT_PROPOSAL_REASON: &str = "rebalance";
pub const BLACKOUT_REASON: &str = "blackout";
