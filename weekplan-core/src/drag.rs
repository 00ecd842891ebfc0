//! Drag-to-reschedule gesture.
//!
//! `Idle -> Dragging -> (Dropped | Canceled) -> Idle`. Only one drag can be
//! active. The dragged block stays in its original slot, drawn as a ghost,
//! until the drop resolves to a day column.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;

use crate::availability::DayStatus;
use crate::constants::{DRAG_GHOST_OPACITY, DRAG_GHOST_SCALE, DRAG_ORIGIN, DRAG_REASON};
use crate::error::{PlannerError, PlannerResult};
use crate::event::{Event, EventPatch, EventStatus};
use crate::remote::protocol::RescheduleEvent;
use crate::week::{DAYS_PER_WEEK, Week};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// How the source block is drawn while dragged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GhostStyle {
    pub opacity: f64,
    pub scale: f64,
}

impl Default for GhostStyle {
    fn default() -> Self {
        GhostStyle {
            opacity: DRAG_GHOST_OPACITY,
            scale: DRAG_GHOST_SCALE,
        }
    }
}

/// Maps a pointer position to the day column under it.
pub trait DropTargetResolver {
    fn resolve(&self, pointer: Point) -> Option<NaiveDate>;
}

/// Seven equal-width columns laid out left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBounds {
    week: Week,
    left: f64,
    column_width: f64,
    top: f64,
    bottom: f64,
}

impl ColumnBounds {
    pub fn new(week: Week, left: f64, column_width: f64, top: f64, height: f64) -> Self {
        ColumnBounds {
            week,
            left,
            column_width,
            top,
            bottom: top + height,
        }
    }
}

impl DropTargetResolver for ColumnBounds {
    fn resolve(&self, pointer: Point) -> Option<NaiveDate> {
        if self.column_width <= 0.0 || pointer.y < self.top || pointer.y > self.bottom {
            return None;
        }
        let offset = pointer.x - self.left;
        if offset < 0.0 {
            return None;
        }
        let index = (offset / self.column_width).floor() as usize;
        if index >= DAYS_PER_WEEK {
            return None;
        }
        self.week.days().nth(index)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DragRejected {
    #[error("A {0} event cannot be moved")]
    TerminalStatus(EventStatus),

    #[error("{0} is blacked out")]
    DayBlackedOut(NaiveDate),

    #[error("Week of {0} is frozen")]
    WeekFrozen(NaiveDate),

    #[error("Another event is already being dragged")]
    AlreadyDragging,
}

impl From<DragRejected> for PlannerError {
    fn from(err: DragRejected) -> Self {
        match err {
            DragRejected::WeekFrozen(start) => PlannerError::WeekFrozen(start),
            other => PlannerError::Validation(other.to_string()),
        }
    }
}

/// Facts about the source event's day the entry guard needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragContext {
    pub week: Week,
    pub day_status: DayStatus,
    pub week_frozen: bool,
}

/// Whether `event` may be moved at all.
pub fn check_movable(event: &Event, tz: Tz, context: &DragContext) -> Result<(), DragRejected> {
    if event.status.is_terminal() {
        return Err(DragRejected::TerminalStatus(event.status));
    }
    if context.week_frozen {
        return Err(DragRejected::WeekFrozen(context.week.start()));
    }
    if context.day_status == DayStatus::Full {
        return Err(DragRejected::DayBlackedOut(event.local_date(tz)));
    }
    Ok(())
}

/// A move ready to be applied and sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RescheduleRequest {
    pub event_id: String,
    pub target_date: NaiveDate,
    pub new_start: DateTime<Utc>,
    pub new_end: DateTime<Utc>,
}

impl RescheduleRequest {
    /// Same wall-clock time and duration on `target_date`.
    pub fn to_date(event: &Event, target_date: NaiveDate, tz: Tz) -> PlannerResult<Self> {
        let local_time = event.local_start(tz).time();
        let naive = target_date.and_time(local_time);
        let new_start = tz
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| {
                PlannerError::Validation(format!(
                    "{} does not exist in {} (clock change)",
                    naive,
                    tz.name()
                ))
            })?
            .with_timezone(&Utc);

        Ok(RescheduleRequest {
            event_id: event.id.clone(),
            target_date,
            new_start,
            new_end: new_start + event.duration(),
        })
    }

    pub fn patch(&self) -> EventPatch {
        EventPatch::reschedule(self.new_start, self.new_end)
    }

    pub fn command(&self) -> RescheduleEvent {
        RescheduleEvent {
            event_id: self.event_id.clone(),
            new_start_at: self.new_start,
            new_end_at: self.new_end,
            origin: DRAG_ORIGIN.to_string(),
            reason: DRAG_REASON.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    NotDragging,
    /// Released outside every day column
    NoColumn,
    SameDay,
    TargetBlackedOut(NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    Canceled(CancelReason),
    Dropped(RescheduleRequest),
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveDrag {
    event: Event,
    source_date: NaiveDate,
    origin: Point,
    pointer: Point,
}

#[derive(Debug, Clone, PartialEq, Default)]
enum DragState {
    #[default]
    Idle,
    Dragging(Box<ActiveDrag>),
}

#[derive(Debug, Clone)]
pub struct DragRescheduler {
    tz: Tz,
    state: DragState,
}

impl DragRescheduler {
    pub fn new(tz: Tz) -> Self {
        DragRescheduler {
            tz,
            state: DragState::Idle,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn active_event_id(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging(drag) => Some(&drag.event.id),
            DragState::Idle => None,
        }
    }

    /// Pointer travel since the drag started.
    pub fn offset(&self) -> Option<Point> {
        match &self.state {
            DragState::Dragging(drag) => Some(Point::new(
                drag.pointer.x - drag.origin.x,
                drag.pointer.y - drag.origin.y,
            )),
            DragState::Idle => None,
        }
    }

    pub fn ghost_for(&self, event_id: &str) -> Option<GhostStyle> {
        (self.active_event_id() == Some(event_id)).then(GhostStyle::default)
    }

    pub fn begin(
        &mut self,
        event: &Event,
        context: &DragContext,
        pointer: Point,
    ) -> Result<(), DragRejected> {
        if self.is_dragging() {
            return Err(DragRejected::AlreadyDragging);
        }
        check_movable(event, self.tz, context)?;

        tracing::debug!("Drag started for {}", event.id);
        self.state = DragState::Dragging(Box::new(ActiveDrag {
            event: event.clone(),
            source_date: event.local_date(self.tz),
            origin: pointer,
            pointer,
        }));
        Ok(())
    }

    pub fn pointer_moved(&mut self, pointer: Point) {
        if let DragState::Dragging(drag) = &mut self.state {
            drag.pointer = pointer;
        }
    }

    /// Abandon the drag without a mutation.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }

    /// Finish the gesture. Always returns to `Idle`.
    pub fn release(
        &mut self,
        pointer: Point,
        resolver: &dyn DropTargetResolver,
        target_status: impl Fn(NaiveDate) -> DayStatus,
    ) -> PlannerResult<DropOutcome> {
        let DragState::Dragging(drag) = std::mem::take(&mut self.state) else {
            return Ok(DropOutcome::Canceled(CancelReason::NotDragging));
        };

        let Some(target) = resolver.resolve(pointer) else {
            tracing::debug!("Drag of {} released outside the grid", drag.event.id);
            return Ok(DropOutcome::Canceled(CancelReason::NoColumn));
        };
        if target == drag.source_date {
            return Ok(DropOutcome::Canceled(CancelReason::SameDay));
        }
        if target_status(target) == DayStatus::Full {
            return Ok(DropOutcome::Canceled(CancelReason::TargetBlackedOut(target)));
        }

        let request = RescheduleRequest::to_date(&drag.event, target, self.tz)?;
        tracing::debug!("Drag of {} dropped on {}", drag.event.id, target);
        Ok(DropOutcome::Dropped(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Timelike};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn event() -> Event {
        Event {
            id: "ev-1".into(),
            child_id: "kid-a".into(),
            title: "Math".into(),
            start: Utc.with_ymd_and_hms(2025, 3, 17, 9, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 3, 17, 9, 30, 0).unwrap(),
            status: EventStatus::Scheduled,
            subject_id: None,
            subject_name: None,
            is_flexible: false,
            description: None,
        }
    }

    fn context() -> DragContext {
        DragContext {
            week: Week::containing(date(17)),
            day_status: DayStatus::None,
            week_frozen: false,
        }
    }

    // Columns 100px wide starting at x=0, 900px tall
    fn columns() -> ColumnBounds {
        ColumnBounds::new(Week::containing(date(17)), 0.0, 100.0, 0.0, 900.0)
    }

    fn open_day(_: NaiveDate) -> DayStatus {
        DayStatus::None
    }

    #[test]
    fn column_bounds_resolve_days() {
        let cols = columns();
        assert_eq!(cols.resolve(Point::new(5.0, 10.0)), Some(date(17)));
        assert_eq!(cols.resolve(Point::new(250.0, 10.0)), Some(date(19)));
        assert_eq!(cols.resolve(Point::new(699.0, 10.0)), Some(date(23)));
        assert_eq!(cols.resolve(Point::new(700.0, 10.0)), None);
        assert_eq!(cols.resolve(Point::new(-1.0, 10.0)), None);
        assert_eq!(cols.resolve(Point::new(50.0, 901.0)), None);
    }

    #[test]
    fn drop_keeps_time_of_day_and_duration() {
        let mut drag = DragRescheduler::new(chrono_tz::UTC);
        drag.begin(&event(), &context(), Point::new(10.0, 100.0)).unwrap();
        assert_eq!(drag.ghost_for("ev-1"), Some(GhostStyle::default()));

        let outcome = drag
            .release(Point::new(250.0, 100.0), &columns(), open_day)
            .unwrap();

        let DropOutcome::Dropped(request) = outcome else {
            panic!("expected a drop, got {outcome:?}");
        };
        assert_eq!(request.target_date, date(19));
        assert_eq!(request.new_start, Utc.with_ymd_and_hms(2025, 3, 19, 9, 0, 0).unwrap());
        assert_eq!(request.new_end - request.new_start, Duration::minutes(30));
        assert!(!drag.is_dragging());
    }

    #[test]
    fn drop_outside_columns_cancels() {
        let mut drag = DragRescheduler::new(chrono_tz::UTC);
        drag.begin(&event(), &context(), Point::default()).unwrap();

        let outcome = drag
            .release(Point::new(5000.0, 100.0), &columns(), open_day)
            .unwrap();
        assert_eq!(outcome, DropOutcome::Canceled(CancelReason::NoColumn));
        assert!(!drag.is_dragging());
    }

    #[test]
    fn drop_on_blacked_out_day_cancels() {
        let mut drag = DragRescheduler::new(chrono_tz::UTC);
        drag.begin(&event(), &context(), Point::default()).unwrap();

        let outcome = drag
            .release(Point::new(150.0, 10.0), &columns(), |_| DayStatus::Full)
            .unwrap();
        assert_eq!(
            outcome,
            DropOutcome::Canceled(CancelReason::TargetBlackedOut(date(18)))
        );
    }

    #[test]
    fn entry_guards() {
        let mut drag = DragRescheduler::new(chrono_tz::UTC);

        let mut done = event();
        done.status = EventStatus::Done;
        assert_eq!(
            drag.begin(&done, &context(), Point::default()),
            Err(DragRejected::TerminalStatus(EventStatus::Done))
        );

        let frozen = DragContext {
            week_frozen: true,
            ..context()
        };
        assert_eq!(
            drag.begin(&event(), &frozen, Point::default()),
            Err(DragRejected::WeekFrozen(date(17)))
        );

        let blacked_out = DragContext {
            day_status: DayStatus::Full,
            ..context()
        };
        assert!(drag.begin(&event(), &blacked_out, Point::default()).is_err());

        // Partial blackout does not block
        let partial = DragContext {
            day_status: DayStatus::Partial,
            ..context()
        };
        drag.begin(&event(), &partial, Point::default()).unwrap();
        assert_eq!(
            drag.begin(&event(), &context(), Point::default()),
            Err(DragRejected::AlreadyDragging)
        );
    }

    #[test]
    fn pointer_moves_do_not_change_the_event() {
        let mut drag = DragRescheduler::new(chrono_tz::UTC);
        drag.begin(&event(), &context(), Point::new(10.0, 10.0)).unwrap();
        drag.pointer_moved(Point::new(60.0, 30.0));

        assert_eq!(drag.offset(), Some(Point::new(50.0, 20.0)));
        drag.cancel();
        assert_eq!(drag.offset(), None);
    }

    #[test]
    fn wall_clock_is_kept_across_dst() {
        // 09:00 in New York before the March 9 2025 change
        let tz = chrono_tz::America::New_York;
        let mut ev = event();
        ev.start = Utc.with_ymd_and_hms(2025, 3, 7, 14, 0, 0).unwrap();
        ev.end = Utc.with_ymd_and_hms(2025, 3, 7, 15, 0, 0).unwrap();

        let request =
            RescheduleRequest::to_date(&ev, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), tz)
                .unwrap();
        assert_eq!(request.new_start.with_timezone(&tz).hour(), 9);
        assert_eq!(request.new_start.hour(), 13);
    }
}
