use std::convert::Infallible;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::containers::ContainerRecord;
use crate::AppState;

pub mod containers;
pub mod index;
pub mod upload;

#[derive(OpenApi)]
#[openapi(
    paths(
        index::index,
        containers::list,
        containers::start,
        containers::stop,
        containers::restart,
        upload::upload_csv
    ),
    components(schemas(
        Message,
        ContainerRecord,
        containers::ContainerList,
        containers::ActionOutcome,
        upload::UploadOutcome
    ))
)]
pub struct Routes;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index::index))
        .route("/containers", get(containers::list))
        .route("/containers/:target/start", post(containers::start))
        .route("/containers/:target/stop", post(containers::stop))
        .route("/containers/:target/restart", post(containers::restart))
        .route("/upload-csv", post(upload::upload_csv))
        .with_state(state)
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Message {
    #[schema(example = "Dockhand is running.")]
    pub message: String,
}

/// How a response should be rendered, decided from the request headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    /// A full HTML page for a browser navigation.
    Page,
    /// An HTML fragment for an htmx swap.
    Fragment,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Format {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        if parts.headers.contains_key("hx-request") {
            return Ok(Format::Fragment);
        }

        let wants_html = parts
            .headers
            .get(header::ACCEPT)
            .and_then(|accept| accept.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"));

        Ok(if wants_html {
            Format::Page
        } else {
            Format::Json
        })
    }
}
