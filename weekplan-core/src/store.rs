//! Fetched week data with last-request-wins semantics.
//!
//! Every load takes a new generation. A response is applied only if its
//! generation is still the latest when it arrives, so a slow fetch for an
//! old week can never overwrite a newer one.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tokio::sync::RwLock;

use crate::availability::{AvailabilityRow, ChildFilter};
use crate::error::{PlannerError, PlannerResult};
use crate::event::{Child, Event};
use crate::remote::Backend;
use crate::remote::protocol::{FetchWeek, WeekData};
use crate::week::Week;

/// One applied fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekSnapshot {
    /// Generation of the load that produced it.
    pub generation: u64,
    pub week: Week,
    pub filter: ChildFilter,
    pub children: Vec<Child>,
    pub availability: Vec<AvailabilityRow>,
    pub events: Vec<Event>,
    pub frozen_dates: Vec<NaiveDate>,
}

impl WeekSnapshot {
    fn from_data(ticket: &LoadTicket, data: WeekData) -> Self {
        let (events, invalid): (Vec<Event>, Vec<Event>) =
            data.events.into_iter().partition(Event::has_valid_span);
        for event in &invalid {
            tracing::warn!("Ignoring event {} that ends before it starts", event.id);
        }
        WeekSnapshot {
            generation: ticket.generation,
            week: ticket.week,
            filter: ticket.filter.clone(),
            children: data.children,
            availability: data.availability,
            events,
            frozen_dates: data.frozen_dates,
        }
    }
}

/// Group events by their calendar date in `tz`, each day sorted by start.
pub fn events_by_date(events: &[Event], tz: Tz) -> BTreeMap<NaiveDate, Vec<Event>> {
    let mut by_date: BTreeMap<NaiveDate, Vec<Event>> = BTreeMap::new();
    for event in events {
        by_date
            .entry(event.local_date(tz))
            .or_default()
            .push(event.clone());
    }
    for day in by_date.values_mut() {
        day.sort_by_key(|e| e.start);
    }
    by_date
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was started before this one finished.
    Stale,
}

/// Handle for one in-flight load.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    pub generation: u64,
    pub week: Week,
    pub filter: ChildFilter,
    /// Whether this load raised the loading flag
    pub raised_loading: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    generation: u64,
    snapshot: Option<Arc<WeekSnapshot>>,
    loading: bool,
    invalidated: bool,
}

#[derive(Debug)]
pub struct WeekDataStore {
    family_id: String,
    state: RwLock<StoreState>,
}

impl WeekDataStore {
    pub fn new(family_id: impl Into<String>) -> Self {
        WeekDataStore {
            family_id: family_id.into(),
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn family_id(&self) -> &str {
        &self.family_id
    }

    pub async fn snapshot(&self) -> Option<Arc<WeekSnapshot>> {
        self.state.read().await.snapshot.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Generation of the most recently started load.
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Treat the next load as a cache miss.
    pub async fn invalidate(&self) {
        self.state.write().await.invalidated = true;
    }

    /// Fetch `week` and apply it if no newer load has started meanwhile.
    pub async fn load<B: Backend + ?Sized>(
        &self,
        backend: &B,
        week: Week,
        filter: &ChildFilter,
    ) -> PlannerResult<LoadOutcome> {
        let ticket = self.begin_load(week, filter).await;
        let result = backend
            .fetch_week(FetchWeek {
                family_id: self.family_id.clone(),
                week_start: week.start(),
                child_ids: filter.ids(),
            })
            .await;
        self.finish_load(&ticket, result).await
    }

    /// Take the next generation. The loading flag goes up only when the
    /// week changes or there is nothing cached to show.
    pub async fn begin_load(&self, week: Week, filter: &ChildFilter) -> LoadTicket {
        let mut state = self.state.write().await;
        state.generation += 1;

        let cache_miss = state.invalidated
            || state
                .snapshot
                .as_ref()
                .map(|s| s.week != week)
                .unwrap_or(true);
        state.invalidated = false;
        if cache_miss {
            state.loading = true;
        }

        tracing::debug!(
            "Loading week {} (generation {}, cache miss: {})",
            week,
            state.generation,
            cache_miss
        );

        LoadTicket {
            generation: state.generation,
            week,
            filter: filter.clone(),
            raised_loading: cache_miss,
        }
    }

    pub async fn finish_load(
        &self,
        ticket: &LoadTicket,
        result: PlannerResult<WeekData>,
    ) -> PlannerResult<LoadOutcome> {
        let mut state = self.state.write().await;
        if ticket.generation != state.generation {
            tracing::debug!(
                "Discarding stale response for week {} (generation {}, latest {})",
                ticket.week,
                ticket.generation,
                state.generation
            );
            return Ok(LoadOutcome::Stale);
        }

        state.loading = false;
        match result {
            Ok(data) => {
                let snapshot = WeekSnapshot::from_data(ticket, data);
                state.snapshot = Some(Arc::new(snapshot));
                Ok(LoadOutcome::Applied)
            }
            Err(e) => {
                tracing::error!("Failed to load week {}: {}", ticket.week, e);
                Err(match e {
                    PlannerError::TransientFetch(msg) => PlannerError::TransientFetch(msg),
                    other => PlannerError::TransientFetch(other.to_string()),
                })
            }
        }
    }
}
