#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(
    clippy::too_many_lines,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;

use axum::extract::MatchedPath;
use axum::http::Request;
use axum::Router;
use docker::{ContainerRuntime, DockerRuntime};
use docs::Docs;
use filter::{FilterStore, MembershipFilter};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{debug, info, info_span, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter, Layer};
use utoipa_swagger_ui::SwaggerUi;

mod activity;
mod config;
pub mod containers;
pub mod docker;
mod docs;
pub mod error;
pub mod filter;
mod render;
pub mod routes;
#[cfg(test)]
mod testing;
mod util;

pub type Result<T> = anyhow::Result<T, error::AppError>;

pub struct AppState {
    pub config: config::Config,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub filter: FilterStore,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match config::Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {:#}", err);
            process::exit(libc::EXIT_FAILURE);
        },
    };

    let (activity, _activity_guard) =
        activity::layer(&config.activity_log).expect("Couldn't open the activity log");

    tracing_subscriber::registry()
        .with(console(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("DOCKHAND_LOG")
                .from_env_lossy(),
        ))
        .with(activity)
        .init();

    info!("Starting with PID {}.", process::id());

    if let Ok(config) = config.stringify() {
        debug!("Using config {}", config);
    }

    let runtime = DockerRuntime::connect(&config.runtime)?;

    if !config.skip_runtime_check {
        util::ensure_runtime(&runtime, config.runtime.timeout()).await;
    }

    let filter = config
        .filter
        .csv
        .as_deref()
        .map(|path| MembershipFilter::load_file(path, config.filter.column.as_deref()))
        .unwrap_or_default();

    let state = Arc::new(AppState {
        config,
        runtime: Arc::new(runtime),
        filter: FilterStore::new(filter),
    });

    if let Err(err) = util::print_intro(&state) {
        debug!("Skipping intro: {:#}", err);
    }

    #[cfg(unix)]
    tokio::spawn(reload_on_hangup(Arc::clone(&state)));

    let listener = TcpListener::bind(state.config.address()).await?;

    info!("Listening on {}.", listener.local_addr()?);

    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", Docs::document()))
        .merge(routes::router(state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let matched_path =
                        request.extensions().get::<MatchedPath>().map(MatchedPath::as_str);

                    info_span!(
                        "http_request",
                        method = ?request.method(),
                        matched_path
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Micros),
                ),
        )
}

/// Console output. `filter` only applies here, the activity layer keeps its
/// own filter so a quiet console never drops activity lines.
fn console<S>(filter: EnvFilter) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer().with_filter(filter)
}

/// Re-reads the filter file on every `SIGHUP`.
#[cfg(unix)]
async fn reload_on_hangup(state: Arc<AppState>) {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::warn;

    let Some(path) = state.config.filter.csv.clone() else {
        return;
    };

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(err) => {
            warn!("Couldn't listen for SIGHUP, filter reloads are disabled: {}", err);
            return;
        },
    };

    while hangup.recv().await.is_some() {
        info!("Reloading filter from {}.", path.display());

        let previous = state.filter.reload(&path, state.config.filter.column.as_deref());

        info!(
            target: activity::ACTIVITY,
            previous = previous.len(),
            current = state.filter.current().len(),
            "Reloaded the container filter."
        );
    }
}
