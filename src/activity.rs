//! The append-only activity log.
//!
//! Events logged with `target: ACTIVITY` (action requests with the caller's
//! address, their outcome, filter replacements) are written to their own file
//! on top of the regular console output.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

pub const ACTIVITY: &str = "activity";

/// Builds the layer writing activity events to `path`, appending to what is
/// already there. The guard must outlive the subscriber or buffered lines are
/// lost.
pub fn layer<S>(path: &Path) -> Result<(impl Layer<S>, WorkerGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file = path
        .file_name()
        .ok_or_else(|| anyhow!("activity log path {} has no file name", path.display()))?;

    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file.to_string_lossy())
        .build(dir)
        .with_context(|| format!("failed to open activity log {}", path.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(filter_fn(|metadata| metadata.target() == ACTIVITY));

    Ok((layer, guard))
}
