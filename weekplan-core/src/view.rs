//! Render-ready model of one week.
//!
//! Everything here is derived: the same inputs always give the same view,
//! and nothing is written back to the session.

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;

use crate::availability::{AvailabilityIndex, ChildFilter, DayStatus, Window};
use crate::drag::{DragRescheduler, GhostStyle};
use crate::event::Event;
use crate::freeze::WeekFreezeGuard;
use crate::store::events_by_date;
use crate::time_grid::{
    BlockSpan, GridPosition, LaneSlot, VisibleHours, layout_lanes, minutes_of, position_for,
};
use crate::week::Week;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventBlock {
    pub event: Event,
    pub position: GridPosition,
    pub lane: LaneSlot,
    /// Set while this block is the drag source
    pub ghost: Option<GhostStyle>,
    /// The event sits on a fully blacked-out day
    pub needs_reschedule: bool,
    pub movable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayColumn {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub windows: Vec<Window>,
    pub frozen: bool,
    pub blocks: Vec<EventBlock>,
    /// Events that start below the visible window
    pub hidden: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekView {
    pub week: Week,
    pub frozen: bool,
    pub hour_labels: Vec<String>,
    pub days: Vec<DayColumn>,
}

/// Inputs to [`WeekView::derive`].
pub struct ViewInputs<'a> {
    pub week: Week,
    pub tz: Tz,
    pub hours: &'a VisibleHours,
    /// Events after optimistic overrides
    pub events: &'a [Event],
    pub availability: &'a AvailabilityIndex,
    pub filter: &'a ChildFilter,
    pub freeze: &'a WeekFreezeGuard,
    pub drag: &'a DragRescheduler,
}

impl WeekView {
    pub fn derive(inputs: &ViewInputs<'_>) -> Self {
        let visible: Vec<Event> = inputs
            .events
            .iter()
            .filter(|e| inputs.filter.includes(&e.child_id))
            .cloned()
            .collect();
        let mut by_date = events_by_date(&visible, inputs.tz);
        let week_frozen = inputs.freeze.is_week_frozen(inputs.week);

        let days = inputs
            .week
            .days()
            .map(|date| {
                let day = inputs.availability.day(date);
                let events = by_date.remove(&date).unwrap_or_default();
                let (blocks, hidden) = layout_day(inputs, day.status, week_frozen, events);
                DayColumn {
                    date,
                    status: day.status,
                    windows: day.windows,
                    frozen: inputs.freeze.is_date_frozen(date),
                    blocks,
                    hidden,
                }
            })
            .collect();

        WeekView {
            week: inputs.week,
            frozen: week_frozen,
            hour_labels: inputs.hours.labels(),
            days,
        }
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayColumn> {
        self.days.iter().find(|d| d.date == date)
    }

    pub fn block(&self, event_id: &str) -> Option<(&DayColumn, &EventBlock)> {
        self.days.iter().find_map(|day| {
            day.blocks
                .iter()
                .find(|b| b.event.id == event_id)
                .map(|b| (day, b))
        })
    }
}

fn layout_day(
    inputs: &ViewInputs<'_>,
    status: DayStatus,
    week_frozen: bool,
    events: Vec<Event>,
) -> (Vec<EventBlock>, usize) {
    let mut placed: Vec<(Event, GridPosition, BlockSpan)> = Vec::with_capacity(events.len());
    let mut hidden = 0;

    for event in events {
        let start_minute = minutes_of(event.local_start(inputs.tz).time()) as i64;
        let duration = event.duration().num_minutes();
        match position_for(start_minute, duration, inputs.hours) {
            Some(position) => placed.push((event, position, BlockSpan::new(start_minute, duration))),
            None => hidden += 1,
        }
    }

    let spans: Vec<BlockSpan> = placed.iter().map(|(_, _, span)| *span).collect();
    let lanes = layout_lanes(&spans);

    let blocks = placed
        .into_iter()
        .zip(lanes)
        .map(|((event, position, _), lane)| EventBlock {
            ghost: inputs.drag.ghost_for(&event.id),
            needs_reschedule: status == DayStatus::Full,
            movable: !event.status.is_terminal() && !week_frozen && status != DayStatus::Full,
            event,
            position,
            lane,
        })
        .collect();

    (blocks, hidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::{AvailabilityRow, AvailabilityStatus};
    use crate::drag::{DragContext, Point};
    use crate::event::EventStatus;
    use chrono::{TimeZone, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn event(id: &str, child: &str, day: u32, hour: u32, minute: u32, len: i64) -> Event {
        let start = Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap();
        Event {
            id: id.into(),
            child_id: child.into(),
            title: id.into(),
            start,
            end: start + chrono::Duration::minutes(len),
            status: EventStatus::Scheduled,
            subject_id: None,
            subject_name: None,
            is_flexible: false,
            description: None,
        }
    }

    struct Fixture {
        hours: VisibleHours,
        availability: AvailabilityIndex,
        filter: ChildFilter,
        freeze: WeekFreezeGuard,
        drag: DragRescheduler,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                hours: VisibleHours::default(),
                availability: AvailabilityIndex::default(),
                filter: ChildFilter::All,
                freeze: WeekFreezeGuard::default(),
                drag: DragRescheduler::new(chrono_tz::UTC),
            }
        }

        fn view(&self, events: &[Event]) -> WeekView {
            WeekView::derive(&ViewInputs {
                week: Week::containing(date(17)),
                tz: chrono_tz::UTC,
                hours: &self.hours,
                events,
                availability: &self.availability,
                filter: &self.filter,
                freeze: &self.freeze,
                drag: &self.drag,
            })
        }
    }

    #[test]
    fn seven_columns_with_ruler() {
        let view = Fixture::new().view(&[]);
        assert_eq!(view.days.len(), 7);
        assert_eq!(view.days[0].date, date(17));
        assert_eq!(view.hour_labels.first().map(String::as_str), Some("8:00"));
        assert_eq!(view.hour_labels.last().map(String::as_str), Some("17:00"));
    }

    #[test]
    fn overlapping_events_share_the_column() {
        let events = vec![
            event("a", "kid-a", 17, 9, 0, 60),
            event("b", "kid-b", 17, 9, 30, 60),
        ];
        let view = Fixture::new().view(&events);

        let (_, a) = view.block("a").unwrap();
        let (_, b) = view.block("b").unwrap();
        assert_eq!(a.lane.lanes, 2);
        assert_ne!(a.lane.lane, b.lane.lane);
    }

    #[test]
    fn filter_hides_other_children() {
        let mut fixture = Fixture::new();
        fixture.filter = ChildFilter::from_ids(["kid-a"]);
        let events = vec![
            event("a", "kid-a", 17, 9, 0, 60),
            event("b", "kid-b", 17, 9, 30, 60),
        ];

        let view = fixture.view(&events);
        assert!(view.block("a").is_some());
        assert!(view.block("b").is_none());
    }

    #[test]
    fn evening_events_are_counted_as_hidden() {
        let view = Fixture::new().view(&[event("late", "kid-a", 18, 19, 0, 30)]);
        let day = view.day(date(18)).unwrap();
        assert!(day.blocks.is_empty());
        assert_eq!(day.hidden, 1);
    }

    #[test]
    fn blacked_out_day_flags_its_events() {
        let mut fixture = Fixture::new();
        fixture.availability = AvailabilityIndex::build(
            &[AvailabilityRow {
                child_id: "kid-a".into(),
                date: date(19),
                day_status: Some(AvailabilityStatus::Off),
                windows: vec![],
            }],
            &ChildFilter::All,
        );

        let view = fixture.view(&[event("e", "kid-a", 19, 10, 0, 45)]);
        let (day, block) = view.block("e").unwrap();
        assert_eq!(day.status, DayStatus::Full);
        assert!(block.needs_reschedule);
        assert!(!block.movable);
    }

    #[test]
    fn drag_source_renders_as_ghost() {
        let mut fixture = Fixture::new();
        let events = vec![event("e", "kid-a", 17, 10, 0, 30)];
        let context = DragContext {
            week: Week::containing(date(17)),
            day_status: DayStatus::None,
            week_frozen: false,
        };
        fixture
            .drag
            .begin(&events[0], &context, Point::default())
            .unwrap();

        let view = fixture.view(&events);
        let (day, block) = view.block("e").unwrap();
        assert_eq!(day.date, date(17));
        assert_eq!(block.ghost, Some(GhostStyle::default()));
    }

    #[test]
    fn frozen_week_blocks_are_not_movable() {
        let mut fixture = Fixture::new();
        fixture.freeze = WeekFreezeGuard::new([date(21)]);

        let view = fixture.view(&[event("e", "kid-a", 17, 10, 0, 30)]);
        assert!(view.frozen);
        assert!(view.day(date(21)).unwrap().frozen);
        assert!(!view.block("e").unwrap().1.movable);
    }
}
