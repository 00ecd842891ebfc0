//! JSON protocol spoken with planner backends over stdin/stdout.
//!
//! Each operation is a typed command whose response type is fixed at
//! compile time, so one transport serves all of them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::availability::AvailabilityRow;
use crate::event::{Child, Event};
use crate::plan::{Approval, ChangeCounts, RawProposal};

pub trait BackendCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    FetchWeek,
    RescheduleEvent,
    ProposeReschedule,
    ApplyPlan,
    FreezeWeek,
    CreateBlackout,
}

impl Command {
    /// Whether the command changes server state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Command::FetchWeek | Command::ProposeReschedule)
    }
}

/// Request sent to the backend.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent back by the backend.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: String },
}

// ============================================================================
// Week data
// ============================================================================

/// Load one week for a family, optionally limited to some children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchWeek {
    pub family_id: String,
    pub week_start: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekData {
    #[serde(default)]
    pub children: Vec<Child>,
    #[serde(default, alias = "avail")]
    pub availability: Vec<AvailabilityRow>,
    #[serde(default)]
    pub events: Vec<Event>,
    /// Dates of the week carrying a frozen flag
    #[serde(default)]
    pub frozen_dates: Vec<NaiveDate>,
}

impl BackendCommand for FetchWeek {
    type Response = WeekData;
    fn command() -> Command {
        Command::FetchWeek
    }
}

// ============================================================================
// Mutations
// ============================================================================

/// Move one event to a new span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleEvent {
    pub event_id: String,
    pub new_start_at: DateTime<Utc>,
    pub new_end_at: DateTime<Utc>,
    pub origin: String,
    pub reason: String,
}

impl BackendCommand for RescheduleEvent {
    /// The authoritative record after the move.
    type Response = Event;
    fn command() -> Command {
        Command::RescheduleEvent
    }
}

/// Ask the backend for a batch reschedule plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeReschedule {
    pub family_id: String,
    pub week_start: NaiveDate,
    #[serde(default)]
    pub child_ids: Vec<String>,
    pub horizon_weeks: u32,
    pub reason: String,
}

impl BackendCommand for ProposeReschedule {
    type Response = RawProposal;
    fn command() -> Command {
        Command::ProposeReschedule
    }
}

/// Apply the approved subset of a plan in one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyPlan {
    pub plan_id: String,
    pub approvals: Vec<Approval>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyPlanResponse {
    #[serde(default)]
    pub counts: ChangeCounts,
}

impl BackendCommand for ApplyPlan {
    type Response = ApplyPlanResponse;
    fn command() -> Command {
        Command::ApplyPlan
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeWeek {
    pub family_id: String,
    pub week_start: NaiveDate,
    pub frozen: bool,
}

/// How many days of the week had their frozen flag changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeWeekResponse {
    #[serde(default, alias = "affected_days")]
    pub updated_days: u32,
}

impl BackendCommand for FreezeWeek {
    type Response = FreezeWeekResponse;
    fn command() -> Command {
        Command::FreezeWeek
    }
}

/// Mark a date range unavailable for one child or the whole family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBlackout {
    pub family_id: String,
    /// `None` blacks out every child
    #[serde(default)]
    pub child_id: Option<String>,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutCreated {
    #[serde(default, alias = "overridesCreated")]
    pub overrides_created: u32,
}

impl BackendCommand for CreateBlackout {
    type Response = BlackoutCreated;
    fn command() -> Command {
        Command::CreateBlackout
    }
}
