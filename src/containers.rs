use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::time;
use utoipa::ToSchema;

use crate::docker::ContainerRuntime;
use crate::error::AppError;
use crate::filter::MembershipFilter;
use crate::Result;

/// A container as reported by the runtime at the moment of the request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ContainerRecord {
    #[schema(example = "a1f4c9e2b7d0")]
    pub id: String,
    #[schema(example = "web")]
    pub name: String,
    #[schema(value_type = String, example = "running")]
    pub status: ContainerStatus,
    #[schema(example = "nginx:1.27")]
    pub image: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Other(String),
}

impl ContainerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ContainerStatus::Created => "created",
            ContainerStatus::Running => "running",
            ContainerStatus::Paused => "paused",
            ContainerStatus::Restarting => "restarting",
            ContainerStatus::Removing => "removing",
            ContainerStatus::Exited => "exited",
            ContainerStatus::Dead => "dead",
            ContainerStatus::Other(status) => status,
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }
}

impl From<&str> for ContainerStatus {
    fn from(s: &str) -> Self {
        match s {
            "created" => ContainerStatus::Created,
            "running" => ContainerStatus::Running,
            "paused" => ContainerStatus::Paused,
            "restarting" => ContainerStatus::Restarting,
            "removing" => ContainerStatus::Removing,
            "exited" => ContainerStatus::Exited,
            "dead" => ContainerStatus::Dead,
            other => ContainerStatus::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ContainerStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
}

impl Action {
    pub fn past_tense(self) -> &'static str {
        match self {
            Action::Start => "started",
            Action::Stop => "stopped",
            Action::Restart => "restarted",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
        })
    }
}

#[derive(Clone, Debug)]
pub struct ActionRequest {
    pub target: String,
    pub action: Action,
    pub caller: SocketAddr,
}

/// Runs `fut` against the runtime, giving up after `after`.
pub async fn timed<T>(
    operation: &'static str,
    after: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    time::timeout(after, fut).await.map_err(|_| AppError::RuntimeTimeout {
        operation,
        after,
    })?
}

/// Lists every container the runtime knows about, stopped ones included, and
/// keeps those the filter lets through. Runtime order is preserved.
#[tracing::instrument(skip_all, fields(filter = ?filter.mode()))]
pub async fn list_containers(
    runtime: &dyn ContainerRuntime,
    filter: &MembershipFilter,
    after: Duration,
) -> Result<Vec<ContainerRecord>> {
    let containers = timed("list", after, runtime.list()).await?;

    Ok(containers.into_iter().filter(|container| filter.is_allowed(container)).collect())
}

/// Applies `request.action` to its target and reads the status back once.
///
/// The read happens right after the runtime acknowledges the call and is not
/// repeated, so a container that is still settling reports whatever state the
/// runtime sees at that instant. Targets hidden by `filter` are reported as
/// missing and left untouched.
#[tracing::instrument(skip_all, fields(container = %request.target, action = %request.action))]
pub async fn perform(
    runtime: &dyn ContainerRuntime,
    filter: &MembershipFilter,
    request: &ActionRequest,
    after: Duration,
) -> Result<ContainerRecord> {
    let target = request.target.as_str();
    let current = timed("inspect", after, runtime.inspect(target)).await?;

    if !filter.is_allowed(&current) {
        return Err(AppError::NotFound {
            target: target.to_owned(),
        });
    }

    match request.action {
        Action::Start => timed("start", after, runtime.start(&current.id)).await?,
        Action::Stop => timed("stop", after, runtime.stop(&current.id)).await?,
        Action::Restart => timed("restart", after, runtime.restart(&current.id)).await?,
    }

    timed("inspect", after, runtime.inspect(&current.id)).await
}
