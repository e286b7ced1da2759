use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Multipart, State};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::Format;
use crate::activity::ACTIVITY;
use crate::containers::list_containers;
use crate::error::AppError;
use crate::filter::{Column, MembershipFilter};
use crate::{render, AppState, Result};

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct UploadOutcome {
    /// Distinct identifiers in the new filter.
    #[schema(example = 3)]
    pub accepted_count: usize,
}

/// # Replace the container filter
///
/// Takes the configured id column (`container_id` by default) of the CSV sent
/// in the `file` field and makes it the active filter. Rows without a value
/// in that column are skipped. Identifiers are not checked against the
/// runtime; unknown ones never match.
///
/// Ids are compared with the full 64 character id. The 12 character form
/// `docker ps` prints matches nothing, use `docker ps --no-trunc`.
#[utoipa::path(
    post,
    path = "/upload-csv",
    request_body(content = String, content_type = "multipart/form-data", description = "CSV file in the `file` field."),
    responses(
        (status = 200, body = UploadOutcome),
        (status = 400, description = "No file, or the CSV lacks the id column.")
    )
)]
pub async fn upload_csv(
    State(state): State<Arc<AppState>>,
    ConnectInfo(caller): ConnectInfo<SocketAddr>,
    format: Format,
    multipart: Multipart,
) -> Result<Response> {
    info!(target: ACTIVITY, caller = %caller, "Received filter upload.");

    let column = state.config.filter.upload_column.as_str();
    let filter = match read_upload(multipart, column).await {
        Ok(filter) => filter,
        Err(err) => {
            warn!(target: ACTIVITY, caller = %caller, error = %err, "Rejected filter upload.");
            return Err(err);
        },
    };

    let accepted_count = filter.len();
    state.filter.replace(filter);

    info!(
        target: ACTIVITY,
        caller = %caller,
        accepted = accepted_count,
        "Replaced the container filter."
    );

    match format {
        Format::Json => Ok(Json(UploadOutcome {
            accepted_count,
        })
        .into_response()),
        Format::Page | Format::Fragment => {
            let filter = state.filter.current();
            let containers =
                list_containers(state.runtime.as_ref(), &filter, state.config.runtime.timeout())
                    .await?;

            Ok(Html(render::list(&containers, &filter)).into_response())
        },
    }
}

async fn read_upload(mut multipart: Multipart, column: &str) -> Result<MembershipFilter> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::MalformedFilterSource(err.to_string()))?
    {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }

        let payload =
            field.bytes().await.map_err(|err| AppError::MalformedFilterSource(err.to_string()))?;

        return MembershipFilter::load(payload.as_ref(), Column::Named(column));
    }

    Err(AppError::MalformedFilterSource(String::from("no file field in upload")))
}
