//! Planner event types.
//!
//! Events arrive from the backend as UTC instants. Everything the grid does
//! with them (day bucketing, time-of-day, drag arithmetic) happens in the
//! family's timezone, so the helpers here take a `Tz`.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A scheduled block for one child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub child_id: String,
    pub title: String,
    #[serde(alias = "start_ts")]
    pub start: DateTime<Utc>,
    #[serde(alias = "end_ts")]
    pub end: DateTime<Utc>,
    pub status: EventStatus,

    // Subject reference
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub subject_name: Option<String>,

    /// No fixed time; eligible for auto-placement
    #[serde(default)]
    pub is_flexible: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    InProgress,
    Done,
    Skipped,
    #[serde(alias = "cancelled")]
    Canceled,
    /// A status this client does not know. Treated as movable.
    #[serde(other)]
    Unknown,
}

impl EventStatus {
    /// Done and canceled events can no longer be moved.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Done | EventStatus::Canceled)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::InProgress => "in progress",
            EventStatus::Done => "done",
            EventStatus::Skipped => "skipped",
            EventStatus::Canceled => "canceled",
            EventStatus::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

impl Event {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn local_start(&self, tz: Tz) -> DateTime<Tz> {
        self.start.with_timezone(&tz)
    }

    /// Calendar date the event belongs to on the grid.
    pub fn local_date(&self, tz: Tz) -> NaiveDate {
        self.local_start(tz).date_naive()
    }

    pub fn has_valid_span(&self) -> bool {
        self.end > self.start
    }

    /// Label shown on the block: subject name when known, else the title.
    pub fn display_name(&self) -> &str {
        self.subject_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.title)
    }

    /// Copy of this event with the patch fields laid over it.
    pub fn patched(&self, patch: &EventPatch) -> Event {
        let mut event = self.clone();
        if let Some(start) = patch.start {
            event.start = start;
        }
        if let Some(end) = patch.end {
            event.end = end;
        }
        if let Some(status) = patch.status {
            event.status = status;
        }
        if let Some(title) = &patch.title {
            event.title = title.clone();
        }
        event
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Field-wise local override of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    pub title: Option<String>,
}

impl EventPatch {
    pub fn reschedule(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        EventPatch {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.status.is_none() && self.title.is_none()
    }
}

/// A child in the family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub id: String,
    #[serde(alias = "first_name")]
    pub name: String,
    /// Visual identity token (avatar key such as `prof3`)
    #[serde(default)]
    pub avatar: Option<String>,
}

impl fmt::Display for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> Event {
        Event {
            id: "ev-1".to_string(),
            child_id: "kid-a".to_string(),
            title: "Fractions".to_string(),
            start: Utc.with_ymd_and_hms(2025, 3, 17, 9, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 3, 17, 9, 30, 0).unwrap(),
            status: EventStatus::Scheduled,
            subject_id: Some("math".to_string()),
            subject_name: Some("Math".to_string()),
            is_flexible: false,
            description: None,
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(EventStatus::Done.is_terminal());
        assert!(EventStatus::Canceled.is_terminal());
        assert!(!EventStatus::Scheduled.is_terminal());
        assert!(!EventStatus::InProgress.is_terminal());
        assert!(!EventStatus::Skipped.is_terminal());
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let event = sample_event();
        let new_start = Utc.with_ymd_and_hms(2025, 3, 19, 9, 0, 0).unwrap();
        let new_end = Utc.with_ymd_and_hms(2025, 3, 19, 9, 30, 0).unwrap();

        let patched = event.patched(&EventPatch::reschedule(new_start, new_end));

        assert_eq!(patched.start, new_start);
        assert_eq!(patched.end, new_end);
        assert_eq!(patched.title, event.title);
        assert_eq!(patched.status, EventStatus::Scheduled);
    }

    #[test]
    fn local_date_follows_family_timezone() {
        let mut event = sample_event();
        // 02:00 UTC Tuesday is still Monday evening in New York
        event.start = Utc.with_ymd_and_hms(2025, 3, 18, 2, 0, 0).unwrap();
        event.end = Utc.with_ymd_and_hms(2025, 3, 18, 3, 0, 0).unwrap();

        let date = event.local_date(chrono_tz::America::New_York);
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 17).unwrap());
    }

    #[test]
    fn deserializes_backend_row_aliases() {
        let json = r#"{
            "id": "e1",
            "child_id": "c1",
            "title": "Reading",
            "start_ts": "2025-03-17T09:00:00Z",
            "end_ts": "2025-03-17T09:45:00Z",
            "status": "cancelled"
        }"#;

        let event: Event = serde_json::from_str(json).expect("should parse");
        assert_eq!(event.status, EventStatus::Canceled);
        assert_eq!(event.duration(), Duration::minutes(45));
        assert!(!event.is_flexible);
    }

    #[test]
    fn unknown_status_does_not_fail_the_row() {
        let json = r#"{
            "id": "e1",
            "child_id": "c1",
            "title": "Reading",
            "start_ts": "2025-03-17T09:00:00Z",
            "end_ts": "2025-03-17T09:45:00Z",
            "status": "rescheduled"
        }"#;

        let event: Event = serde_json::from_str(json).expect("should parse");
        assert_eq!(event.status, EventStatus::Unknown);
        assert!(!event.status.is_terminal());
    }
}
