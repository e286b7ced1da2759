use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::{containers, Format, Message};
use crate::{AppState, Result};

/// # Landing page
///
/// Browsers get the dashboard, everything else a fixed liveness message.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, body = Message),
        (status = 500, description = "Container runtime error, HTML only.")
    )
)]
pub async fn index(state: State<Arc<AppState>>, format: Format) -> Result<Response> {
    match format {
        Format::Json => Ok(Json(Message {
            message: String::from("Dockhand is running."),
        })
        .into_response()),
        Format::Page | Format::Fragment => containers::list(state, Format::Page).await,
    }
}
