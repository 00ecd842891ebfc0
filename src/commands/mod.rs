pub mod blackout;
pub mod freeze;
pub mod move_event;
pub mod plan;
pub mod week;

use anyhow::Result;
use weekplan_core::availability::ChildFilter;
use weekplan_core::config::{PlannerConfig, SessionSettings};
use weekplan_core::remote::ProcessBackend;
use weekplan_core::session::PlannerSession;
use weekplan_core::week::Week;

use crate::render::Render;
use crate::utils::tui::with_spinner;

/// Settings every command runs with.
pub struct Context {
    pub settings: SessionSettings,
    backend: String,
}

impl Context {
    pub fn load() -> Result<Self> {
        let config = PlannerConfig::load()?;
        tracing::debug!(
            "Family {} in {} via backend '{}'",
            config.family_id.as_deref().unwrap_or("-"),
            config.timezone,
            config.backend
        );
        Ok(Context {
            settings: config.settings()?,
            backend: config.backend,
        })
    }

    pub fn week(&self, arg: Option<&str>) -> Result<Week> {
        Ok(Week::from_arg(arg, self.settings.tz)?)
    }

    /// Open a session on `week` and fetch it.
    pub async fn open(
        &self,
        week: Week,
        children: &[String],
    ) -> Result<PlannerSession<ProcessBackend>> {
        let backend = ProcessBackend::from_name(&self.backend);
        let session = PlannerSession::new(backend, self.settings.clone())
            .with_child_filter(ChildFilter::from_ids(children.iter().cloned()));

        with_spinner(format!("Loading week of {}", week), session.load_week(week)).await?;

        Ok(session)
    }
}

/// Print and drain whatever the session queued for the user.
pub async fn print_notices(session: &PlannerSession<ProcessBackend>) {
    for notice in session.take_notices().await {
        println!("{}", notice.render());
    }
}
