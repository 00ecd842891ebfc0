//! The planner's view of its backend.

pub mod process;
pub mod protocol;

use async_trait::async_trait;

use crate::error::PlannerResult;
use crate::event::Event;
use crate::plan::RawProposal;
use crate::remote::protocol::{
    ApplyPlan, ApplyPlanResponse, BlackoutCreated, CreateBlackout, FetchWeek, FreezeWeek,
    FreezeWeekResponse, ProposeReschedule, RescheduleEvent, WeekData,
};

pub use process::ProcessBackend;

/// Everything the planner asks of the server.
///
/// Failures of `fetch_week` surface as `TransientFetch`; failures of the
/// mutating calls as `MutationRejected`.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_week(&self, request: FetchWeek) -> PlannerResult<WeekData>;

    async fn reschedule_event(&self, request: RescheduleEvent) -> PlannerResult<Event>;

    async fn propose_reschedule(&self, request: ProposeReschedule) -> PlannerResult<RawProposal>;

    async fn apply_plan(&self, request: ApplyPlan) -> PlannerResult<ApplyPlanResponse>;

    async fn freeze_week(&self, request: FreezeWeek) -> PlannerResult<FreezeWeekResponse>;

    async fn create_blackout(&self, request: CreateBlackout) -> PlannerResult<BlackoutCreated>;
}
