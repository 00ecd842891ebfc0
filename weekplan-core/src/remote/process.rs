//! Backend subprocess transport.
//!
//! A backend is any executable named `weekplan-backend-<name>` on `PATH`
//! that reads one JSON request from stdin and writes one JSON response to
//! stdout. The backend owns its credentials; the planner only passes
//! command parameters.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use crate::error::{PlannerError, PlannerResult};
use crate::event::Event;
use crate::plan::RawProposal;
use crate::remote::Backend;
use crate::remote::protocol::{
    ApplyPlan, ApplyPlanResponse, BackendCommand, BlackoutCreated, Command, CreateBlackout,
    FetchWeek, FreezeWeek, FreezeWeekResponse, ProposeReschedule, Request, RescheduleEvent,
    Response, WeekData,
};

const BACKEND_TIMEOUT: Duration = Duration::from_secs(10);
/// Proposal generation can be slow on the server side.
const PROPOSAL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ProcessBackend {
    name: String,
    timeout: Duration,
}

impl ProcessBackend {
    pub fn from_name(name: &str) -> Self {
        ProcessBackend {
            name: name.to_string(),
            timeout: BACKEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binary_name(&self) -> String {
        format!("weekplan-backend-{}", self.name)
    }

    fn binary_path(&self) -> PlannerResult<PathBuf> {
        let binary_name = self.binary_name();
        which::which(&binary_name).map_err(|_| {
            PlannerError::BackendNotInstalled(format!(
                "Backend '{}' not found. Install a `{}` executable on your PATH",
                self.name, binary_name
            ))
        })
    }

    /// Call a typed command with the default timeout.
    pub async fn call<C: BackendCommand>(&self, cmd: C) -> PlannerResult<C::Response> {
        self.call_within(self.timeout, cmd).await
    }

    async fn call_within<C: BackendCommand>(
        &self,
        limit: Duration,
        cmd: C,
    ) -> PlannerResult<C::Response> {
        let command = C::command();
        timeout(limit, self.call_raw(command, cmd))
            .await
            .map_err(|_| PlannerError::BackendTimeout(limit.as_secs()))?
            .map_err(|e| classify(command, e))
    }

    async fn call_raw<P: Serialize, R: DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> PlannerResult<R> {
        let params = serde_json::to_value(params)
            .map_err(|e| PlannerError::Serialization(e.to_string()))?;
        let request = Request { command, params };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| PlannerError::Serialization(e.to_string()))?;

        let binary_path = self.binary_path()?;
        tracing::debug!("Calling {} with {:?}", binary_path.display(), command);

        let mut child = TokioCommand::new(&binary_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PlannerError::Backend(format!("Failed to spawn {}: {}", binary_path.display(), e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PlannerError::Backend("Backend stdin unavailable".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await?;
        drop(stdin);

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(PlannerError::Backend(format!(
                "Backend exited with status: {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let response_str = String::from_utf8_lossy(&output.stdout);
        if response_str.trim().is_empty() {
            return Err(PlannerError::Backend("Backend returned no response".into()));
        }

        let response: Response<R> = serde_json::from_str(&response_str)
            .map_err(|e| PlannerError::Backend(format!("Failed to parse response: {}", e)))?;

        match response {
            Response::Success { data } => Ok(data),
            Response::Error { error } => Err(PlannerError::Backend(error)),
        }
    }
}

/// Backend-reported failures become load or mutation errors; transport
/// problems (missing binary, timeout, IO) keep their own kind.
fn classify(command: Command, err: PlannerError) -> PlannerError {
    match err {
        PlannerError::Backend(msg) if command == Command::FetchWeek => {
            PlannerError::TransientFetch(msg)
        }
        PlannerError::Backend(msg) if command.is_mutation() => PlannerError::MutationRejected(msg),
        other => other,
    }
}

#[async_trait]
impl Backend for ProcessBackend {
    async fn fetch_week(&self, request: FetchWeek) -> PlannerResult<WeekData> {
        self.call(request).await
    }

    async fn reschedule_event(&self, request: RescheduleEvent) -> PlannerResult<Event> {
        self.call(request).await
    }

    async fn propose_reschedule(&self, request: ProposeReschedule) -> PlannerResult<RawProposal> {
        self.call_within(PROPOSAL_TIMEOUT.max(self.timeout), request)
            .await
    }

    async fn apply_plan(&self, request: ApplyPlan) -> PlannerResult<ApplyPlanResponse> {
        self.call(request).await
    }

    async fn freeze_week(&self, request: FreezeWeek) -> PlannerResult<FreezeWeekResponse> {
        self.call(request).await
    }

    async fn create_blackout(&self, request: CreateBlackout) -> PlannerResult<BlackoutCreated> {
        self.call(request).await
    }
}
