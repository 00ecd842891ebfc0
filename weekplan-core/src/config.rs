//! Planner configuration at ~/.config/weekplan/config.toml

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DAY_END_MINUTES, DEFAULT_DAY_START_MINUTES, DEFAULT_HORIZON_WEEKS,
    DEFAULT_HOUR_STEP_MINUTES,
};
use crate::error::{PlannerError, PlannerResult};
use crate::time_grid::{VisibleHours, format_minutes, parse_clock_time};

static DEFAULT_BACKEND: &str = "http";
static DEFAULT_TIMEZONE: &str = "UTC";
static ENV_PREFIX: &str = "WEEKPLAN";

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_day_start() -> String {
    format!("{:02}:00", DEFAULT_DAY_START_MINUTES / 60)
}

fn default_day_end() -> String {
    format!("{:02}:00", DEFAULT_DAY_END_MINUTES / 60)
}

fn default_hour_step() -> u32 {
    DEFAULT_HOUR_STEP_MINUTES
}

fn default_horizon_weeks() -> u32 {
    DEFAULT_HORIZON_WEEKS
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlannerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,

    /// IANA name of the family's timezone
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Suffix of the `weekplan-backend-<name>` binary
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default = "default_day_start")]
    pub day_start: String,

    #[serde(default = "default_day_end")]
    pub day_end: String,

    #[serde(default = "default_hour_step")]
    pub hour_step_minutes: u32,

    #[serde(default = "default_horizon_weeks")]
    pub horizon_weeks: u32,

    /// Ask for a reschedule plan right after a blackout is created
    #[serde(default)]
    pub auto_propose_after_blackout: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            family_id: None,
            timezone: default_timezone(),
            backend: default_backend(),
            day_start: default_day_start(),
            day_end: default_day_end(),
            hour_step_minutes: default_hour_step(),
            horizon_weeks: default_horizon_weeks(),
            auto_propose_after_blackout: false,
        }
    }
}

/// Validated settings a session runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub family_id: String,
    pub tz: Tz,
    pub hours: VisibleHours,
    pub horizon_weeks: u32,
    pub auto_propose_after_blackout: bool,
}

impl SessionSettings {
    pub fn new(family_id: impl Into<String>, tz: Tz) -> Self {
        SessionSettings {
            family_id: family_id.into(),
            tz,
            hours: VisibleHours::default(),
            horizon_weeks: DEFAULT_HORIZON_WEEKS,
            auto_propose_after_blackout: false,
        }
    }
}

impl PlannerConfig {
    pub fn config_path() -> PlannerResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| PlannerError::Config("Could not determine config directory".into()))?
            .join("weekplan");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the user's config, creating a commented default on first run.
    pub fn load() -> PlannerResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load from `path` with `WEEKPLAN_*` environment overrides.
    pub fn load_from(path: &Path) -> PlannerResult<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| PlannerError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| PlannerError::Config(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> PlannerResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PlannerError::Config(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| PlannerError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> PlannerResult<()> {
        let contents = format!(
            "\
# weekplan configuration

# Family whose week is shown (required):
# family_id = \"your-family-id\"

# IANA timezone used to place events on the grid:
# timezone = \"{tz}\"

# Backend binary suffix (runs weekplan-backend-<name>):
# backend = \"{backend}\"

# Visible part of the day:
# day_start = \"{start}\"
# day_end = \"{end}\"
# hour_step_minutes = {step}

# How many weeks a reschedule proposal may reach:
# horizon_weeks = {horizon}

# Request a reschedule plan right after creating a blackout:
# auto_propose_after_blackout = false
",
            tz = DEFAULT_TIMEZONE,
            backend = DEFAULT_BACKEND,
            start = default_day_start(),
            end = default_day_end(),
            step = DEFAULT_HOUR_STEP_MINUTES,
            horizon = DEFAULT_HORIZON_WEEKS,
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PlannerError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| PlannerError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    pub fn timezone(&self) -> PlannerResult<Tz> {
        self.timezone.parse::<Tz>().map_err(|e| {
            PlannerError::Config(format!("Unknown timezone '{}': {}", self.timezone, e))
        })
    }

    pub fn visible_hours(&self) -> PlannerResult<VisibleHours> {
        let parse = |key: &str, value: &str| {
            parse_clock_time(value).ok_or_else(|| {
                PlannerError::Config(format!("{key} must be HH:MM (got '{value}')"))
            })
        };
        let start = parse("day_start", &self.day_start)?;
        let end = parse("day_end", &self.day_end)?;
        VisibleHours::new(start, end, self.hour_step_minutes)
    }

    pub fn settings(&self) -> PlannerResult<SessionSettings> {
        let family_id = self
            .family_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                PlannerError::Config(
                    "family_id is not set. Add it to ~/.config/weekplan/config.toml".into(),
                )
            })?;

        if self.horizon_weeks == 0 {
            return Err(PlannerError::Config("horizon_weeks must be at least 1".into()));
        }

        let hours = self.visible_hours()?;
        tracing::debug!(
            "Visible hours {} - {}",
            format_minutes(hours.start()),
            format_minutes(hours.end())
        );

        Ok(SessionSettings {
            family_id,
            tz: self.timezone()?,
            hours,
            horizon_weeks: self.horizon_weeks,
            auto_propose_after_blackout: self.auto_propose_after_blackout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("weekplan-test-{}", uuid::Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn default_file_is_fully_commented() {
        let path = temp_path();
        PlannerConfig::create_default_config(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.lines().all(|l| l.is_empty() || l.starts_with('#')));

        let config = PlannerConfig::load_from(&path).unwrap();
        assert_eq!(config.day_start, "08:00");
        assert_eq!(config.horizon_weeks, 2);
        assert!(config.family_id.is_none());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn save_then_load() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let config = PlannerConfig {
            family_id: Some("fam-1".into()),
            timezone: "America/Chicago".into(),
            day_start: "07:30".into(),
            auto_propose_after_blackout: true,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = PlannerConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn settings_require_family_and_valid_values() {
        let config = PlannerConfig::default();
        assert!(matches!(config.settings(), Err(PlannerError::Config(_))));

        let config = PlannerConfig {
            family_id: Some("fam-1".into()),
            timezone: "Mars/Olympus".into(),
            ..Default::default()
        };
        assert!(config.settings().is_err());

        let config = PlannerConfig {
            family_id: Some("fam-1".into()),
            day_start: "18:00".into(),
            ..Default::default()
        };
        assert!(config.settings().is_err());

        let config = PlannerConfig {
            family_id: Some("fam-1".into()),
            timezone: "Europe/Berlin".into(),
            ..Default::default()
        };
        let settings = config.settings().unwrap();
        assert_eq!(settings.tz, chrono_tz::Europe::Berlin);
        assert_eq!(settings.hours, VisibleHours::default());
    }
}
