//! One family's planner session.
//!
//! The session owns the store, the optimistic ledger, the drag state, the
//! freeze guard and the open plan review. Each piece sits behind its own
//! lock and no lock is held while a backend call is in flight.

use std::fmt;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::availability::{AvailabilityIndex, ChildFilter, DayStatus};
use crate::config::SessionSettings;
use crate::constants::{BLACKOUT_REASON, DEFAULT_PROPOSAL_REASON};
use crate::drag::{
    CancelReason, DragContext, DragRescheduler, DropOutcome, DropTargetResolver, Point,
    RescheduleRequest, check_movable,
};
use crate::error::{PlannerError, PlannerResult};
use crate::event::{Child, Event};
use crate::freeze::WeekFreezeGuard;
use crate::ledger::OptimisticMutationLedger;
use crate::plan::{ApplyOutcome, PlanReviewer, ReschedulePlan, normalize_proposal};
use crate::remote::Backend;
use crate::remote::protocol::{BlackoutCreated, CreateBlackout, ProposeReschedule};
use crate::store::{LoadOutcome, WeekDataStore, WeekSnapshot};
use crate::view::{ViewInputs, WeekView};
use crate::week::Week;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message for the user, queued until the front end takes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Days to black out, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlackoutRequest {
    /// `None` blacks out every child
    pub child_id: Option<String>,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub reason: Option<String>,
}

impl BlackoutRequest {
    pub fn validate(&self) -> PlannerResult<()> {
        if self.ends_on < self.starts_on {
            return Err(PlannerError::Validation(format!(
                "Blackout ends ({}) before it starts ({})",
                self.ends_on, self.starts_on
            )));
        }
        Ok(())
    }

    fn command(&self, family_id: &str) -> CreateBlackout {
        CreateBlackout {
            family_id: family_id.to_string(),
            child_id: self.child_id.clone(),
            starts_on: self.starts_on,
            ends_on: self.ends_on,
            reason: self
                .reason
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| BLACKOUT_REASON.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlackoutOutcome {
    pub overrides_created: u32,
    /// Set when a follow-up proposal was requested and succeeded
    pub proposal: Option<ReschedulePlan>,
}

#[derive(Debug, Clone)]
struct ViewState {
    week: Week,
    filter: ChildFilter,
}

pub struct PlannerSession<B> {
    backend: B,
    settings: SessionSettings,
    store: WeekDataStore,
    view: Mutex<ViewState>,
    ledger: Mutex<OptimisticMutationLedger>,
    drag: Mutex<DragRescheduler>,
    freeze: Mutex<WeekFreezeGuard>,
    reviewer: Mutex<Option<PlanReviewer>>,
    notices: Mutex<Vec<Notice>>,
}

impl<B: Backend> PlannerSession<B> {
    /// A session positioned on the current week. Nothing is fetched yet.
    pub fn new(backend: B, settings: SessionSettings) -> Self {
        let week = Week::current(settings.tz);
        PlannerSession {
            store: WeekDataStore::new(settings.family_id.clone()),
            view: Mutex::new(ViewState {
                week,
                filter: ChildFilter::All,
            }),
            ledger: Mutex::new(OptimisticMutationLedger::new()),
            drag: Mutex::new(DragRescheduler::new(settings.tz)),
            freeze: Mutex::new(WeekFreezeGuard::default()),
            reviewer: Mutex::new(None),
            notices: Mutex::new(Vec::new()),
            backend,
            settings,
        }
    }

    /// Start with a child filter instead of the whole family.
    pub fn with_child_filter(mut self, filter: ChildFilter) -> Self {
        self.view.get_mut().filter = filter;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub async fn week(&self) -> Week {
        self.view.lock().await.week
    }

    pub async fn filter(&self) -> ChildFilter {
        self.view.lock().await.filter.clone()
    }

    /// Children of the loaded week, whatever the filter.
    pub async fn children(&self) -> Vec<Child> {
        self.store
            .snapshot()
            .await
            .map(|s| s.children.clone())
            .unwrap_or_default()
    }

    pub async fn is_loading(&self) -> bool {
        self.store.is_loading().await
    }

    pub async fn is_dragging(&self) -> bool {
        self.drag.lock().await.is_dragging()
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Show `week`. A response that arrives after a newer load started is
    /// dropped and reported as [`LoadOutcome::Stale`].
    pub async fn load_week(&self, week: Week) -> PlannerResult<LoadOutcome> {
        let filter = {
            let mut view = self.view.lock().await;
            if view.week != week {
                self.drag.lock().await.cancel();
            }
            view.week = week;
            view.filter.clone()
        };
        self.reload(week, &filter).await
    }

    pub async fn set_child_filter(&self, filter: ChildFilter) -> PlannerResult<LoadOutcome> {
        let week = {
            let mut view = self.view.lock().await;
            view.filter = filter.clone();
            view.week
        };
        self.reload(week, &filter).await
    }

    /// Flip one child in the filter. Emptying or completing the selection
    /// goes back to showing everyone.
    pub async fn toggle_child(&self, child_id: &str) -> PlannerResult<LoadOutcome> {
        let children = self.children().await;
        let filter = self.view.lock().await.filter.toggle(child_id, &children);
        self.set_child_filter(filter).await
    }

    async fn reload(&self, week: Week, filter: &ChildFilter) -> PlannerResult<LoadOutcome> {
        match self.store.load(&self.backend, week, filter).await {
            Ok(LoadOutcome::Applied) => {
                if let Some(snapshot) = self.store.snapshot().await {
                    self.freeze
                        .lock()
                        .await
                        .replace(snapshot.week, &snapshot.frozen_dates);
                    self.ledger
                        .lock()
                        .await
                        .settle(&snapshot.events, snapshot.generation);
                }
                Ok(LoadOutcome::Applied)
            }
            Ok(LoadOutcome::Stale) => Ok(LoadOutcome::Stale),
            Err(e) => {
                self.notify(
                    NoticeLevel::Error,
                    format!("Could not load week of {}: {}", week, e.user_message()),
                )
                .await;
                Err(e)
            }
        }
    }

    /// Refetch the current week after a mutation, bypassing the cache.
    async fn refetch(&self) {
        self.store.invalidate().await;
        let (week, filter) = {
            let view = self.view.lock().await;
            (view.week, view.filter.clone())
        };
        if let Err(e) = self.reload(week, &filter).await {
            tracing::debug!("Refetch of {} failed: {}", week, e);
        }
    }

    async fn require_snapshot(&self) -> PlannerResult<std::sync::Arc<WeekSnapshot>> {
        self.store
            .snapshot()
            .await
            .ok_or_else(|| PlannerError::Validation("No week has been loaded".into()))
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Derive the view from the current state. `None` before the first load.
    pub async fn rendered_week(&self) -> Option<WeekView> {
        let snapshot = self.store.snapshot().await?;
        let filter = self.view.lock().await.filter.clone();
        let events = self.ledger.lock().await.derive(&snapshot.events);
        let freeze = self.freeze.lock().await.clone();
        let drag = self.drag.lock().await.clone();
        let availability = AvailabilityIndex::build(&snapshot.availability, &filter);

        Some(WeekView::derive(&ViewInputs {
            week: snapshot.week,
            tz: self.settings.tz,
            hours: &self.settings.hours,
            events: &events,
            availability: &availability,
            filter: &filter,
            freeze: &freeze,
            drag: &drag,
        }))
    }

    async fn availability(&self, snapshot: &WeekSnapshot) -> AvailabilityIndex {
        let filter = self.view.lock().await.filter.clone();
        AvailabilityIndex::build(&snapshot.availability, &filter)
    }

    async fn find_event(&self, snapshot: &WeekSnapshot, event_id: &str) -> PlannerResult<Event> {
        self.ledger
            .lock()
            .await
            .derive(&snapshot.events)
            .into_iter()
            .find(|e| e.id == event_id)
            .ok_or_else(|| {
                PlannerError::Validation(format!("Event '{}' is not in the week of {}", event_id, snapshot.week))
            })
    }

    async fn drag_context(&self, snapshot: &WeekSnapshot, event: &Event) -> DragContext {
        let availability = self.availability(snapshot).await;
        DragContext {
            week: snapshot.week,
            day_status: availability.status(event.local_date(self.settings.tz)),
            week_frozen: self.freeze.lock().await.is_week_frozen(snapshot.week),
        }
    }

    // ------------------------------------------------------------------
    // Moving events
    // ------------------------------------------------------------------

    pub async fn begin_drag(&self, event_id: &str, pointer: Point) -> PlannerResult<()> {
        let snapshot = self.require_snapshot().await?;
        let event = self.find_event(&snapshot, event_id).await?;
        let context = self.drag_context(&snapshot, &event).await;
        self.drag.lock().await.begin(&event, &context, pointer)?;
        Ok(())
    }

    pub async fn pointer_moved(&self, pointer: Point) {
        self.drag.lock().await.pointer_moved(pointer);
    }

    pub async fn cancel_drag(&self) {
        self.drag.lock().await.cancel();
    }

    /// Finish the drag. A drop on another open day is applied at once and
    /// sent; if the backend refuses, the move is undone and the week
    /// refetched.
    pub async fn release_drag(
        &self,
        pointer: Point,
        resolver: &dyn DropTargetResolver,
    ) -> PlannerResult<DropOutcome> {
        let availability = match self.store.snapshot().await {
            Some(snapshot) => self.availability(&snapshot).await,
            None => AvailabilityIndex::default(),
        };
        let outcome = self
            .drag
            .lock()
            .await
            .release(pointer, resolver, |date| availability.status(date))?;

        match &outcome {
            DropOutcome::Canceled(CancelReason::TargetBlackedOut(date)) => {
                self.notify(
                    NoticeLevel::Warning,
                    format!("{date} is blacked out, nothing was moved"),
                )
                .await;
            }
            DropOutcome::Canceled(_) => {}
            DropOutcome::Dropped(request) => {
                self.commit_reschedule(request).await?;
            }
        }
        Ok(outcome)
    }

    /// Move an event to another day of the shown week, keeping its time
    /// and duration. Returns `None` when it is already on that day.
    pub async fn move_to_day(&self, event_id: &str, date: NaiveDate) -> PlannerResult<Option<Event>> {
        let snapshot = self.require_snapshot().await?;
        if !snapshot.week.contains(date) {
            return Err(PlannerError::Validation(format!(
                "{} is not in the week of {}",
                date, snapshot.week
            )));
        }

        let event = self.find_event(&snapshot, event_id).await?;
        let context = self.drag_context(&snapshot, &event).await;
        check_movable(&event, self.settings.tz, &context)?;

        if event.local_date(self.settings.tz) == date {
            return Ok(None);
        }
        if self.availability(&snapshot).await.status(date) == DayStatus::Full {
            return Err(PlannerError::Validation(format!("{date} is blacked out")));
        }

        let request = RescheduleRequest::to_date(&event, date, self.settings.tz)?;
        self.commit_reschedule(&request).await.map(Some)
    }

    async fn commit_reschedule(&self, request: &RescheduleRequest) -> PlannerResult<Event> {
        let snapshot = self.require_snapshot().await?;
        self.freeze.lock().await.ensure_mutable(snapshot.week)?;
        self.ledger
            .lock()
            .await
            .apply(&snapshot.events, &request.event_id, request.patch())?;

        match self.backend.reschedule_event(request.command()).await {
            Ok(record) => {
                tracing::info!("Moved {} to {}", record.id, request.target_date);
                let generation = self.store.generation().await;
                self.ledger.lock().await.confirm(record.clone(), generation);
                Ok(record)
            }
            Err(e) => {
                tracing::error!("Reschedule of {} failed: {}", request.event_id, e);
                self.ledger.lock().await.revert(&request.event_id);
                self.notify(
                    NoticeLevel::Error,
                    format!("Could not move event: {}", e.user_message()),
                )
                .await;
                self.refetch().await;
                Err(rejected(e))
            }
        }
    }

    // ------------------------------------------------------------------
    // Plans
    // ------------------------------------------------------------------

    /// Ask the backend for a plan and open it for review. Without explicit
    /// children the filtered ones are used, or every known child.
    pub async fn propose_reschedule(
        &self,
        child_ids: Option<Vec<String>>,
        reason: Option<&str>,
    ) -> PlannerResult<ReschedulePlan> {
        let (week, filter) = {
            let view = self.view.lock().await;
            (view.week, view.filter.clone())
        };
        let child_ids = match child_ids.or_else(|| filter.ids()) {
            Some(ids) => ids,
            None => self
                .store
                .snapshot()
                .await
                .map(|s| s.children.iter().map(|c| c.id.clone()).collect())
                .unwrap_or_default(),
        };

        let raw = self
            .backend
            .propose_reschedule(ProposeReschedule {
                family_id: self.settings.family_id.clone(),
                week_start: week.start(),
                child_ids,
                horizon_weeks: self.settings.horizon_weeks,
                reason: reason.unwrap_or(DEFAULT_PROPOSAL_REASON).to_string(),
            })
            .await
            .inspect_err(|e| tracing::error!("Proposal for {} failed: {}", week, e))?;

        let plan = normalize_proposal(raw);
        tracing::info!("Received plan: {}", plan.summary);
        if plan.is_empty() {
            self.notify(NoticeLevel::Info, "No changes proposed".to_string())
                .await;
        }
        *self.reviewer.lock().await = Some(PlanReviewer::new(plan.clone()));
        Ok(plan)
    }

    /// Run `f` against the open plan review.
    pub async fn review<R>(
        &self,
        f: impl FnOnce(&mut PlanReviewer) -> PlannerResult<R>,
    ) -> PlannerResult<R> {
        let mut guard = self.reviewer.lock().await;
        let reviewer = guard
            .as_mut()
            .ok_or_else(|| PlannerError::Validation("No reschedule plan is open".into()))?;
        f(reviewer)
    }

    pub async fn discard_plan(&self) {
        *self.reviewer.lock().await = None;
    }

    /// Send the approved changes. On failure the review keeps its
    /// approvals and edits so it can be retried.
    pub async fn submit_plan(&self) -> PlannerResult<ApplyOutcome> {
        let week = self.week().await;
        self.freeze.lock().await.ensure_mutable(week)?;
        let submission = self.review(|r| r.build_submission()).await?;

        match self.backend.apply_plan(submission.request.clone()).await {
            Ok(response) => {
                let outcome = self
                    .review(|r| Ok(r.record_outcome(&submission, response.counts)))
                    .await?;
                self.notify(NoticeLevel::Info, outcome.to_string()).await;
                if outcome.is_mismatch() {
                    self.notify(
                        NoticeLevel::Warning,
                        format!(
                            "Only {} of {} approved changes were applied",
                            outcome.applied.total(),
                            outcome.requested.total()
                        ),
                    )
                    .await;
                }
                self.ledger.lock().await.clear();
                self.refetch().await;
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("Applying plan failed: {}", e);
                self.notify(
                    NoticeLevel::Error,
                    format!("Could not apply plan: {}", e.user_message()),
                )
                .await;
                Err(rejected(e))
            }
        }
    }

    // ------------------------------------------------------------------
    // Freeze and blackouts
    // ------------------------------------------------------------------

    /// Set the shown week's frozen state. Returns how many days the server
    /// updated, or `None` when the week was already in that state and
    /// nothing was sent.
    pub async fn toggle_freeze(&self, frozen: bool) -> PlannerResult<Option<u32>> {
        let week = self.week().await;
        let Some(request) =
            self.freeze
                .lock()
                .await
                .request_toggle(&self.settings.family_id, week, frozen)
        else {
            return Ok(None);
        };

        match self.backend.freeze_week(request).await {
            Ok(response) => {
                self.freeze.lock().await.record(week, frozen);
                if frozen {
                    self.drag.lock().await.cancel();
                }
                tracing::info!(
                    "Week {} {} ({} days updated)",
                    week,
                    if frozen { "frozen" } else { "unfrozen" },
                    response.updated_days
                );
                Ok(Some(response.updated_days))
            }
            Err(e) => {
                self.notify(
                    NoticeLevel::Error,
                    format!("Could not update freeze: {}", e.user_message()),
                )
                .await;
                Err(rejected(e))
            }
        }
    }

    pub async fn create_blackout(&self, request: BlackoutRequest) -> PlannerResult<BlackoutOutcome> {
        request.validate()?;
        let created = match self
            .backend
            .create_blackout(request.command(&self.settings.family_id))
            .await
        {
            Ok(created) => created,
            Err(e) => {
                self.notify(
                    NoticeLevel::Error,
                    format!("Could not create blackout: {}", e.user_message()),
                )
                .await;
                return Err(rejected(e));
            }
        };
        self.blackout_created(&request, created).await
    }

    /// Refresh after a blackout and, when configured, ask for a plan that
    /// moves the displaced blocks.
    pub async fn blackout_created(
        &self,
        request: &BlackoutRequest,
        created: BlackoutCreated,
    ) -> PlannerResult<BlackoutOutcome> {
        self.notify(
            NoticeLevel::Info,
            format!(
                "Blackout saved ({} day overrides created)",
                created.overrides_created
            ),
        )
        .await;
        self.ledger.lock().await.clear();
        self.refetch().await;

        let proposal = if self.settings.auto_propose_after_blackout {
            let child_ids = request.child_id.clone().map(|id| vec![id]);
            match self.propose_reschedule(child_ids, Some(BLACKOUT_REASON)).await {
                Ok(plan) => Some(plan),
                Err(e) => {
                    self.notify(
                        NoticeLevel::Warning,
                        format!("Could not propose a reschedule: {}", e.user_message()),
                    )
                    .await;
                    None
                }
            }
        } else {
            None
        };

        Ok(BlackoutOutcome {
            overrides_created: created.overrides_created,
            proposal,
        })
    }

    // ------------------------------------------------------------------
    // Notices
    // ------------------------------------------------------------------

    pub async fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().await)
    }

    async fn notify(&self, level: NoticeLevel, message: String) {
        match level {
            NoticeLevel::Info => tracing::info!("{}", message),
            NoticeLevel::Warning => tracing::warn!("{}", message),
            NoticeLevel::Error => tracing::error!("{}", message),
        }
        self.notices.lock().await.push(Notice { level, message });
    }
}

fn rejected(err: PlannerError) -> PlannerError {
    match err {
        PlannerError::MutationRejected(msg) => PlannerError::MutationRejected(msg),
        PlannerError::WeekFrozen(start) => PlannerError::WeekFrozen(start),
        other => PlannerError::MutationRejected(other.user_message()),
    }
}
