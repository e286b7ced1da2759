//! In-memory stand-ins for the daemon and the log sink.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::containers::{ContainerRecord, ContainerStatus};
use crate::docker::ContainerRuntime;
use crate::error::AppError;
use crate::Result;

#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<Vec<ContainerRecord>>,
    unreachable: bool,
    delay: Option<Duration>,
}

impl FakeRuntime {
    pub fn new(
        containers: impl IntoIterator<Item = (&'static str, &'static str, &'static str)>,
    ) -> Self {
        let containers = containers
            .into_iter()
            .map(|(id, name, status)| ContainerRecord {
                id: id.to_owned(),
                name: name.to_owned(),
                status: ContainerStatus::from(status),
                image: format!("{}:latest", name),
            })
            .collect();

        FakeRuntime {
            containers: Mutex::new(containers),
            ..Default::default()
        }
    }

    pub fn web_and_db() -> Self {
        FakeRuntime::new([("a1", "web", "running"), ("b2", "db", "exited")])
    }

    pub fn unreachable() -> Self {
        FakeRuntime {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn status_of(&self, target: &str) -> Option<ContainerStatus> {
        let containers = self.containers.lock().unwrap();

        containers.iter().find(|c| c.id == target || c.name == target).map(|c| c.status.clone())
    }

    async fn reach(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.unreachable {
            return Err(AppError::RuntimeUnavailable(anyhow!(
                "error trying to connect: No such file or directory"
            )));
        }

        Ok(())
    }

    fn set_status(&self, target: &str, status: ContainerStatus) -> Result<()> {
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .iter_mut()
            .find(|c| c.id == target || c.name == target)
            .ok_or_else(|| AppError::NotFound {
                target: target.to_owned(),
            })?;

        container.status = status;
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list(&self) -> Result<Vec<ContainerRecord>> {
        self.reach().await?;

        Ok(self.containers.lock().unwrap().clone())
    }

    async fn inspect(&self, target: &str) -> Result<ContainerRecord> {
        self.reach().await?;

        let containers = self.containers.lock().unwrap();
        containers.iter().find(|c| c.id == target || c.name == target).cloned().ok_or_else(|| {
            AppError::NotFound {
                target: target.to_owned(),
            }
        })
    }

    async fn start(&self, target: &str) -> Result<()> {
        self.reach().await?;
        self.set_status(target, ContainerStatus::Running)
    }

    async fn stop(&self, target: &str) -> Result<()> {
        self.reach().await?;
        self.set_status(target, ContainerStatus::Exited)
    }

    async fn restart(&self, target: &str) -> Result<()> {
        self.reach().await?;
        self.set_status(target, ContainerStatus::Running)
    }

    async fn ping(&self) -> Result<()> {
        self.reach().await
    }
}

/// Log output captured on the current thread.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Routes every event on this thread into the returned buffer until the
    /// guard is dropped. Pair with a current-thread tokio test.
    pub fn install() -> (Self, DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(move || writer.clone()));

        (logs, tracing::subscriber::set_default(subscriber))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
