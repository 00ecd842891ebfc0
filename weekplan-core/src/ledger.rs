//! Optimistic local overrides layered over the fetched week.
//!
//! A mutation is shown as soon as it is applied, then either confirmed with
//! the server's record or reverted. A confirmed record is never undone by a
//! late revert. It holds until a snapshot whose load started after the
//! confirm is applied; from then on the server's data wins.

use std::collections::BTreeMap;

use crate::error::{PlannerError, PlannerResult};
use crate::event::{Event, EventPatch};

#[derive(Debug, Clone, PartialEq)]
struct Confirmed {
    record: Event,
    /// Latest store generation when the record was confirmed.
    generation: u64,
    /// Created here, so a snapshot may not carry it yet.
    added: bool,
}

impl Confirmed {
    /// Whether a snapshot of `generation` supersedes this record.
    fn superseded_by(&self, generation: u64, in_snapshot: bool) -> bool {
        generation > self.generation && (in_snapshot || !self.added)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    /// Awaiting the server. `base` is the confirmed record it was applied
    /// over, if any.
    Pending {
        patch: EventPatch,
        base: Option<Confirmed>,
    },
    Confirmed(Confirmed),
}

#[derive(Debug, Clone, Default)]
pub struct OptimisticMutationLedger {
    entries: BTreeMap<String, Entry>,
}

impl OptimisticMutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `patch` over event `id` until confirmed or reverted.
    pub fn apply(&mut self, snapshot: &[Event], id: &str, patch: EventPatch) -> PlannerResult<()> {
        let base = match self.entries.get(id) {
            Some(Entry::Confirmed(confirmed)) => Some(confirmed.clone()),
            Some(Entry::Pending { base, .. }) => base.clone(),
            None => {
                if !snapshot.iter().any(|e| e.id == id) {
                    return Err(PlannerError::Validation(format!(
                        "Event '{}' is not in the current week",
                        id
                    )));
                }
                None
            }
        };
        self.entries
            .insert(id.to_string(), Entry::Pending { patch, base });
        Ok(())
    }

    /// Replace whatever is held for `record.id` with the server's record.
    /// `generation` is the store's latest load generation.
    pub fn confirm(&mut self, record: Event, generation: u64) {
        self.insert_confirmed(record, generation, false);
    }

    /// Add a record the snapshot has never seen, such as a created event.
    pub fn confirm_added(&mut self, record: Event, generation: u64) {
        self.insert_confirmed(record, generation, true);
    }

    fn insert_confirmed(&mut self, record: Event, generation: u64, added: bool) {
        self.entries.insert(
            record.id.clone(),
            Entry::Confirmed(Confirmed {
                record,
                generation,
                added,
            }),
        );
    }

    /// Drop a pending patch. No-op when nothing is pending.
    pub fn revert(&mut self, id: &str) {
        let Some(Entry::Pending { base, .. }) = self.entries.get(id) else {
            return;
        };
        match base.clone() {
            Some(confirmed) => {
                self.entries.insert(id.to_string(), Entry::Confirmed(confirmed));
            }
            None => {
                self.entries.remove(id);
            }
        }
    }

    /// Forget everything, pending patches included. Used before a forced
    /// refetch.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_pending(&self, id: &str) -> bool {
        matches!(self.entries.get(id), Some(Entry::Pending { .. }))
    }

    pub fn has_pending(&self) -> bool {
        self.entries
            .values()
            .any(|e| matches!(e, Entry::Pending { .. }))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a fresh snapshot of `generation`. Confirmed records from before
    /// that load started give way to it, except added records the snapshot
    /// does not carry yet. Pending patches stay.
    pub fn settle(&mut self, snapshot: &[Event], generation: u64) {
        self.entries.retain(|id, entry| {
            let in_snapshot = snapshot.iter().any(|e| &e.id == id);
            match entry {
                Entry::Pending { base, .. } => {
                    if base
                        .as_ref()
                        .is_some_and(|b| b.superseded_by(generation, in_snapshot))
                    {
                        *base = None;
                    }
                    true
                }
                Entry::Confirmed(confirmed) => !confirmed.superseded_by(generation, in_snapshot),
            }
        });
    }

    /// The list to render: snapshot order, overrides applied, then any
    /// confirmed records the snapshot lacks.
    pub fn derive(&self, snapshot: &[Event]) -> Vec<Event> {
        let mut events: Vec<Event> = snapshot
            .iter()
            .map(|event| match self.entries.get(&event.id) {
                Some(entry) => self.resolve(entry, event),
                None => event.clone(),
            })
            .collect();

        for (id, entry) in &self.entries {
            if snapshot.iter().any(|e| &e.id == id) {
                continue;
            }
            match entry {
                Entry::Confirmed(confirmed) => events.push(confirmed.record.clone()),
                Entry::Pending {
                    patch,
                    base: Some(base),
                } => events.push(base.record.patched(patch)),
                Entry::Pending { base: None, .. } => {}
            }
        }
        events
    }

    fn resolve(&self, entry: &Entry, snapshot_event: &Event) -> Event {
        match entry {
            Entry::Confirmed(confirmed) => confirmed.record.clone(),
            Entry::Pending { patch, base } => base
                .as_ref()
                .map(|b| &b.record)
                .unwrap_or(snapshot_event)
                .patched(patch),
        }
    }
}
