//! Per-date availability and blackout classification.
//!
//! The backend returns one row per (child, date) with that child's teaching
//! windows. The grid needs the opposite view: for each date, the merged
//! windows of the children being shown and whether the day is blacked out.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::event::Child;
use crate::time_grid::{format_minutes, minutes_since_midnight};

/// One child's availability on one date, as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRow {
    pub child_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub day_status: Option<AvailabilityStatus>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub windows: Vec<RawWindow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Teach,
    Partial,
    Off,
    #[serde(other)]
    Unknown,
}

/// A window as it comes off the wire (`"09:00"` / `"12:00:00"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawWindow {
    pub start: String,
    pub end: String,
}

// Some rows carry a single window object instead of a list
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<RawWindow>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<RawWindow>),
        One(RawWindow),
        Null(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(windows) => windows,
        OneOrMany::One(window) => vec![window],
        OneOrMany::Null(()) => Vec::new(),
    })
}

impl AvailabilityRow {
    /// Empty windows and an explicit `off` both mean the child is unavailable.
    pub fn is_off(&self) -> bool {
        self.day_status == Some(AvailabilityStatus::Off) || self.windows.is_empty()
    }
}

/// A time-of-day interval in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Window {
    pub start: u32,
    pub end: u32,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_minutes(self.start), format_minutes(self.end))
    }
}

/// Sort and merge windows so they are ordered and non-overlapping.
///
/// Windows that end at or before their start are dropped.
pub fn normalize_windows(raw: &[RawWindow]) -> Vec<Window> {
    let mut windows: Vec<Window> = raw
        .iter()
        .filter_map(|w| {
            let window = Window {
                start: minutes_since_midnight(&w.start),
                end: minutes_since_midnight(&w.end),
            };
            if window.end <= window.start {
                tracing::warn!("Dropping empty availability window {}-{}", w.start, w.end);
                return None;
            }
            Some(window)
        })
        .collect();
    windows.sort();
    merge_windows(windows)
}

fn merge_windows(sorted: Vec<Window>) -> Vec<Window> {
    let mut merged: Vec<Window> = Vec::with_capacity(sorted.len());
    for window in sorted {
        if let Some(last) = merged.last_mut() {
            if window.start <= last.end {
                last.end = last.end.max(window.end);
                continue;
            }
        }
        merged.push(window);
    }
    merged
}

/// Blackout classification of a date for the shown children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    #[default]
    None,
    Partial,
    Full,
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DayStatus::None => "available",
            DayStatus::Partial => "partial blackout",
            DayStatus::Full => "blacked out",
        };
        write!(f, "{label}")
    }
}

/// Which children the grid shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChildFilter {
    #[default]
    All,
    /// Never empty; an empty selection is `All`.
    Only(BTreeSet<String>),
}

impl ChildFilter {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            ChildFilter::All
        } else {
            ChildFilter::Only(ids)
        }
    }

    pub fn includes(&self, child_id: &str) -> bool {
        match self {
            ChildFilter::All => true,
            ChildFilter::Only(ids) => ids.contains(child_id),
        }
    }

    /// Flip one child's selection.
    ///
    /// Deselecting from `All` keeps every other child. Deselecting the last
    /// selected child, or selecting the whole family, gives `All`.
    pub fn toggle(&self, child_id: &str, children: &[Child]) -> ChildFilter {
        let mut ids: BTreeSet<String> = match self {
            ChildFilter::All => children
                .iter()
                .filter(|c| c.id != child_id)
                .map(|c| c.id.clone())
                .collect(),
            ChildFilter::Only(ids) => {
                let mut ids = ids.clone();
                if !ids.remove(child_id) {
                    ids.insert(child_id.to_string());
                }
                ids
            }
        };

        if children.iter().all(|c| ids.contains(&c.id)) {
            ids.clear();
        }
        Self::from_ids(ids)
    }

    /// Explicit ids for a backend request; `None` means every child.
    pub fn ids(&self) -> Option<Vec<String>> {
        match self {
            ChildFilter::All => None,
            ChildFilter::Only(ids) => Some(ids.iter().cloned().collect()),
        }
    }
}

impl fmt::Display for ChildFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildFilter::All => write!(f, "All children"),
            ChildFilter::Only(ids) => write!(f, "{} selected", ids.len()),
        }
    }
}

/// What one grid column needs from availability.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DayAvailability {
    pub status: DayStatus,
    pub windows: Vec<Window>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityIndex {
    days: BTreeMap<NaiveDate, DayAvailability>,
}

impl AvailabilityIndex {
    /// Build the per-date view over the children selected by `filter`.
    ///
    /// Only children that have a row for a date take part in its
    /// classification; a date without rows is not blacked out.
    pub fn build(rows: &[AvailabilityRow], filter: &ChildFilter) -> Self {
        // date -> child -> (all rows off, windows)
        let mut grouped: BTreeMap<NaiveDate, BTreeMap<&str, (bool, Vec<RawWindow>)>> =
            BTreeMap::new();

        for row in rows.iter().filter(|r| filter.includes(&r.child_id)) {
            let entry = grouped
                .entry(row.date)
                .or_default()
                .entry(row.child_id.as_str())
                .or_insert((true, Vec::new()));
            if !row.is_off() {
                entry.0 = false;
                entry.1.extend(row.windows.iter().cloned());
            }
        }

        let days = grouped
            .into_iter()
            .map(|(date, children)| {
                let off = children.values().filter(|(off, _)| *off).count();
                let status = if off == 0 {
                    DayStatus::None
                } else if off == children.len() {
                    DayStatus::Full
                } else {
                    DayStatus::Partial
                };
                let raw: Vec<RawWindow> = children
                    .into_values()
                    .flat_map(|(_, windows)| windows)
                    .collect();
                let day = DayAvailability {
                    status,
                    windows: normalize_windows(&raw),
                };
                (date, day)
            })
            .collect();

        AvailabilityIndex { days }
    }

    pub fn day(&self, date: NaiveDate) -> DayAvailability {
        self.days.get(&date).cloned().unwrap_or_default()
    }

    pub fn status(&self, date: NaiveDate) -> DayStatus {
        self.days
            .get(&date)
            .map(|d| d.status)
            .unwrap_or_default()
    }

    pub fn is_blacked_out(&self, date: NaiveDate) -> bool {
        self.status(date) == DayStatus::Full
    }
}
