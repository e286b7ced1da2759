use anyhow::anyhow;
use async_trait::async_trait;
use bollard::container::{
    InspectContainerOptions, ListContainersOptions, RestartContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::Docker;
use tracing::debug;

use crate::config::Runtime;
use crate::containers::{ContainerRecord, ContainerStatus};
use crate::error::AppError;
use crate::Result;

/// The container engine as seen by the handlers.
///
/// Every call either succeeds, fails with [`AppError::NotFound`] for an unknown
/// target, or fails with a runtime error. Targets may be ids or names.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Every container, including stopped ones, in the order the runtime
    /// reports them.
    async fn list(&self) -> Result<Vec<ContainerRecord>>;

    async fn inspect(&self, target: &str) -> Result<ContainerRecord>;

    async fn start(&self, target: &str) -> Result<()>;

    async fn stop(&self, target: &str) -> Result<()>;

    async fn restart(&self, target: &str) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

pub struct DockerRuntime {
    docker: Docker,
    stop_grace: Option<i64>,
}

impl DockerRuntime {
    /// Connects to the daemon socket from `config`, or to the local defaults.
    ///
    /// # Errors
    ///
    /// - When the socket address can't be used. Nothing is sent to the daemon
    ///   until the first call.
    pub fn connect(config: &Runtime) -> Result<Self> {
        let timeout = config.timeout();
        let timeout = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        let docker = match &config.socket {
            Some(socket) => {
                Docker::connect_with_socket(socket, timeout, bollard::API_DEFAULT_VERSION)
            },
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|err| AppError::RuntimeUnavailable(err.into()))?;

        Ok(DockerRuntime {
            docker,
            stop_grace: config.stop_grace,
        })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    #[tracing::instrument(skip(self))]
    async fn list(&self) -> Result<Vec<ContainerRecord>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let summaries =
            self.docker.list_containers(Some(options)).await.map_err(|err| classify(err, ""))?;

        Ok(summaries
            .into_iter()
            .map(|summary| ContainerRecord {
                id: summary.id.unwrap_or_default(),
                name: summary
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|name| name.trim_start_matches('/').to_owned())
                    .unwrap_or_default(),
                status: ContainerStatus::from(summary.state.as_deref().unwrap_or_default()),
                image: summary.image.unwrap_or_default(),
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn inspect(&self, target: &str) -> Result<ContainerRecord> {
        let container = self
            .docker
            .inspect_container(target, None::<InspectContainerOptions>)
            .await
            .map_err(|err| classify(err, target))?;

        let status = container
            .state
            .and_then(|state| state.status)
            .map(|status| status.to_string())
            .unwrap_or_default();

        Ok(ContainerRecord {
            id: container.id.ok_or_else(|| {
                AppError::Runtime(anyhow!("inspect response for {} has no id", target))
            })?,
            name: container.name.unwrap_or_default().trim_start_matches('/').to_owned(),
            status: ContainerStatus::from(status.as_str()),
            image: container.config.and_then(|config| config.image).unwrap_or_default(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn start(&self, target: &str) -> Result<()> {
        let result =
            self.docker.start_container(target, None::<StartContainerOptions<String>>).await;

        settle(result, target)
    }

    #[tracing::instrument(skip(self))]
    async fn stop(&self, target: &str) -> Result<()> {
        let options = self.stop_grace.map(|t| StopContainerOptions {
            t,
        });

        settle(self.docker.stop_container(target, options).await, target)
    }

    #[tracing::instrument(skip(self))]
    async fn restart(&self, target: &str) -> Result<()> {
        let options = self.stop_grace.map(|t| RestartContainerOptions {
            t: t as isize,
        });

        settle(self.docker.restart_container(target, options).await, target)
    }

    #[tracing::instrument(skip(self))]
    async fn ping(&self) -> Result<()> {
        self.docker.ping().await.map_err(|err| classify(err, ""))?;

        Ok(())
    }
}

/// Treats "already in the requested state" as success.
fn settle(result: std::result::Result<(), BollardError>, target: &str) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(BollardError::DockerResponseServerError {
            status_code: 304,
            ..
        }) => {
            debug!("Container {} was already in the requested state.", target);
            Ok(())
        },
        Err(err) => Err(classify(err, target)),
    }
}

/// Sorts a bollard failure into the not-found / daemon error / unreachable
/// trichotomy the handlers report.
fn classify(err: BollardError, target: &str) -> AppError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        } => AppError::NotFound {
            target: target.to_owned(),
        },
        BollardError::DockerResponseServerError {
            ..
        }
        | BollardError::JsonDataError {
            ..
        }
        | BollardError::JsonSerdeError {
            ..
        } => AppError::Runtime(err.into()),
        other => AppError::RuntimeUnavailable(other.into()),
    }
}
