//! Scheduling engine for the weekly family planner.
//!
//! This crate holds everything the planner front end needs below the
//! presentation layer:
//! - `time_grid` and `time_input` for wall-clock arithmetic and parsing
//! - `availability` for per-day blackout classification
//! - `store`, `ledger`, `drag`, `plan` and `freeze` for the mutation protocol
//! - `session` which owns all of the above for one family
//! - `remote` for the backend operations the engine consumes

pub mod availability;
pub mod config;
pub mod constants;
pub mod drag;
pub mod error;
pub mod event;
pub mod freeze;
pub mod ledger;
pub mod plan;
pub mod remote;
pub mod session;
pub mod store;
pub mod time_grid;
pub mod time_input;
pub mod view;
pub mod week;

pub use error::{PlannerError, PlannerResult};
pub use event::*;
