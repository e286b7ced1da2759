use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use nanoid::nanoid;
use serde::Serialize;
use tracing::{error, info};
use utoipa::ToSchema;

use super::Format;
use crate::activity::ACTIVITY;
use crate::containers::{list_containers, perform, Action, ActionRequest, ContainerRecord};
use crate::{render, AppState, Result};

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ContainerList {
    pub containers: Vec<ContainerRecord>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ActionOutcome {
    #[schema(example = "Container web stopped.")]
    pub message: String,
    /// State read back right after the action returned.
    pub container: ContainerRecord,
}

/// # List containers
///
/// Every container the runtime knows about, stopped ones included, narrowed
/// by the active filter.
#[utoipa::path(
    get,
    path = "/containers",
    responses(
        (status = 200, body = ContainerList),
        (status = 500, description = "Container runtime error."),
        (status = 504, description = "Container runtime timed out.")
    )
)]
pub async fn list(State(state): State<Arc<AppState>>, format: Format) -> Result<Response> {
    let filter = state.filter.current();
    let containers =
        match list_containers(state.runtime.as_ref(), &filter, state.config.runtime.timeout()).await
        {
            Ok(containers) => containers,
            Err(err) => {
                error!(target: ACTIVITY, error = %err, "Listing containers failed.");
                return Err(err);
            },
        };

    info!("Listing {} containers.", containers.len());

    Ok(match format {
        Format::Json => Json(ContainerList {
            containers,
        })
        .into_response(),
        Format::Fragment => Html(render::list(&containers, &filter)).into_response(),
        Format::Page => Html(render::dashboard(&containers, &filter)).into_response(),
    })
}

/// # Start a container
#[utoipa::path(
    post,
    path = "/containers/{target}/start",
    params(("target" = String, Path, description = "Container id or name.")),
    responses(
        (status = 200, body = ActionOutcome),
        (status = 303, description = "Plain browser posts are sent back to the dashboard."),
        (status = 404, description = "Container not found."),
        (status = 500, description = "Container runtime error."),
        (status = 504, description = "Container runtime timed out.")
    )
)]
pub async fn start(
    State(state): State<Arc<AppState>>,
    ConnectInfo(caller): ConnectInfo<SocketAddr>,
    Path(target): Path<String>,
    format: Format,
) -> Result<Response> {
    let request = ActionRequest {
        target,
        action: Action::Start,
        caller,
    };

    act(&state, request, format).await
}

/// # Stop a container
///
/// Stopping a container that is not running succeeds and reports its
/// current state.
#[utoipa::path(
    post,
    path = "/containers/{target}/stop",
    params(("target" = String, Path, description = "Container id or name.")),
    responses(
        (status = 200, body = ActionOutcome),
        (status = 303, description = "Plain browser posts are sent back to the dashboard."),
        (status = 404, description = "Container not found."),
        (status = 500, description = "Container runtime error."),
        (status = 504, description = "Container runtime timed out.")
    )
)]
pub async fn stop(
    State(state): State<Arc<AppState>>,
    ConnectInfo(caller): ConnectInfo<SocketAddr>,
    Path(target): Path<String>,
    format: Format,
) -> Result<Response> {
    let request = ActionRequest {
        target,
        action: Action::Stop,
        caller,
    };

    act(&state, request, format).await
}

/// # Restart a container
#[utoipa::path(
    post,
    path = "/containers/{target}/restart",
    params(("target" = String, Path, description = "Container id or name.")),
    responses(
        (status = 200, body = ActionOutcome),
        (status = 303, description = "Plain browser posts are sent back to the dashboard."),
        (status = 404, description = "Container not found."),
        (status = 500, description = "Container runtime error."),
        (status = 504, description = "Container runtime timed out.")
    )
)]
pub async fn restart(
    State(state): State<Arc<AppState>>,
    ConnectInfo(caller): ConnectInfo<SocketAddr>,
    Path(target): Path<String>,
    format: Format,
) -> Result<Response> {
    let request = ActionRequest {
        target,
        action: Action::Restart,
        caller,
    };

    act(&state, request, format).await
}

async fn act(state: &AppState, request: ActionRequest, format: Format) -> Result<Response> {
    let id = nanoid!(10);

    info!(
        target: ACTIVITY,
        request = %id,
        caller = %request.caller,
        container = %request.target,
        action = %request.action,
        "Received action request."
    );

    let filter = state.filter.current();
    let record =
        match perform(state.runtime.as_ref(), &filter, &request, state.config.runtime.timeout())
            .await
        {
            Ok(record) => record,
            Err(err) => {
                error!(
                    target: ACTIVITY,
                    request = %id,
                    caller = %request.caller,
                    container = %request.target,
                    action = %request.action,
                    error = %err,
                    "Action failed."
                );
                return Err(err);
            },
        };

    info!(
        target: ACTIVITY,
        request = %id,
        caller = %request.caller,
        container = %request.target,
        action = %request.action,
        status = %record.status,
        "Action succeeded."
    );

    Ok(match format {
        Format::Json => Json(ActionOutcome {
            message: format!("Container {} {}.", record.name, request.action.past_tense()),
            container: record,
        })
        .into_response(),
        Format::Fragment => Html(render::row(&record)).into_response(),
        // A plain form post lands back on the dashboard.
        Format::Page => Redirect::to("/").into_response(),
    })
}

#[cfg(test)]
mod test {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use paste::paste;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::containers::ContainerStatus;
    use crate::filter::{FilterMode, FilterStore, MembershipFilter};
    use crate::testing::{CapturedLogs, FakeRuntime};
    use crate::{app, AppState};

    fn state_with(runtime: FakeRuntime, filter: MembershipFilter) -> Arc<AppState> {
        Arc::new(AppState {
            config: Config::default(),
            runtime: Arc::new(runtime),
            filter: FilterStore::new(filter),
        })
    }

    fn router(state: Arc<AppState>) -> Router {
        app(state).layer(MockConnectInfo(SocketAddr::from(([203, 0, 113, 9], 51000))))
    }

    async fn send(router: Router, method: Method, uri: &str, htmx: bool) -> (StatusCode, String) {
        let mut request = Request::builder().method(method).uri(uri);
        if htmx {
            request = request.header("HX-Request", "true");
        }

        let response = router.oneshot(request.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn lists_everything_without_a_filter() {
        let state = state_with(FakeRuntime::web_and_db(), MembershipFilter::default());
        let (status, body) = send(router(state), Method::GET, "/containers", false).await;

        assert_eq!(status, StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        let containers = body["containers"].as_array().unwrap();

        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0]["id"], "a1");
        assert_eq!(containers[0]["status"], "running");
        assert_eq!(containers[1]["name"], "db");
        assert_eq!(containers[1]["status"], "exited");
    }

    #[tokio::test]
    async fn lists_only_filter_members() {
        let filter = MembershipFilter::new(FilterMode::ByName, ["web"]);
        let state = state_with(FakeRuntime::web_and_db(), filter);
        let (_, body) = send(router(state), Method::GET, "/containers", false).await;

        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        let containers = body["containers"].as_array().unwrap();

        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0]["id"], "a1");
    }

    #[tokio::test]
    async fn browsers_get_the_dashboard() {
        let filter = MembershipFilter::new(FilterMode::ByName, ["web", "ghost"]);
        let state = state_with(FakeRuntime::web_and_db(), filter);

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/containers")
                    .header(header::ACCEPT, mime::TEXT_HTML.as_ref())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();

        assert!(body.contains(r#"<li id="container-a1">"#));
        assert!(!body.contains(r#"<li id="container-b2">"#));
        assert!(body.contains("ghost - not found"));
    }

    #[tokio::test]
    async fn unreachable_runtime_is_a_generic_500() {
        let state = state_with(FakeRuntime::unreachable(), MembershipFilter::default());
        let (status, body) = send(router(state), Method::GET, "/containers", false).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("No such file"));
    }

    #[tokio::test]
    async fn stop_responds_with_the_fresh_status() {
        let state = state_with(FakeRuntime::web_and_db(), MembershipFilter::default());
        let (status, body) = send(router(state), Method::POST, "/containers/a1/stop", false).await;

        assert_eq!(status, StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(body["container"]["status"], "exited");
        assert_eq!(body["message"], "Container web stopped.");
    }

    #[tokio::test]
    async fn htmx_gets_the_updated_row() {
        let state = state_with(FakeRuntime::web_and_db(), MembershipFilter::default());
        let (status, body) = send(router(state), Method::POST, "/containers/b2/start", true).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with(r#"<li id="container-b2">"#));
        assert!(body.contains(r#"<span class="status">running</span>"#));
    }

    #[tokio::test]
    async fn browser_form_posts_are_sent_back_to_the_dashboard() {
        let runtime = FakeRuntime::web_and_db();
        let state = state_with(runtime, MembershipFilter::default());

        let response = router(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/containers/a1/stop")
                    .header(header::ACCEPT, mime::TEXT_HTML.as_ref())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let (_, body) = send(router(state), Method::GET, "/containers", false).await;
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(body["containers"][0]["status"], "exited");
    }

    #[tokio::test]
    async fn missing_target_is_404_and_logged_with_the_caller() {
        let (logs, _guard) = CapturedLogs::install();
        let state = state_with(FakeRuntime::web_and_db(), MembershipFilter::default());

        let (status, body) =
            send(router(state), Method::POST, "/containers/zz9/restart", false).await;

        assert_eq!(status, StatusCode::NOT_FOUND);

        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["message"], "Container not found.");

        let logs = logs.contents();
        let failure = logs.lines().find(|line| line.contains("Action failed.")).unwrap();

        assert!(failure.contains("ERROR"));
        assert!(failure.contains("caller=203.0.113.9:51000"));
        assert!(failure.contains("container zz9 not found"));
    }

    #[tokio::test]
    async fn stopping_twice_reports_the_same_status() {
        let state = state_with(FakeRuntime::web_and_db(), MembershipFilter::default());

        let (first_status, first) =
            send(router(Arc::clone(&state)), Method::POST, "/containers/web/stop", false).await;
        let (second_status, second) =
            send(router(state), Method::POST, "/containers/web/stop", false).await;

        assert_eq!(first_status, StatusCode::OK);
        assert_eq!(second_status, StatusCode::OK);
        assert_eq!(first, second);
    }

    macro_rules! action_tests {
        ($($action:ident => $expected:expr;)+) => {
            $(
                paste! {
                    #[tokio::test]
                    async fn [<$action _updates_the_container>]() {
                        let runtime = FakeRuntime::web_and_db();
                        let state = state_with(runtime, MembershipFilter::default());
                        let uri = format!("/containers/db/{}", stringify!($action));

                        let (status, body) =
                            send(router(Arc::clone(&state)), Method::POST, &uri, false).await;

                        assert_eq!(status, StatusCode::OK);

                        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
                        assert_eq!(body["container"]["status"], $expected.as_str());
                    }

                    #[tokio::test]
                    async fn [<$action _respects_the_filter>]() {
                        let filter = MembershipFilter::new(FilterMode::ById, ["a1"]);
                        let state = state_with(FakeRuntime::web_and_db(), filter);
                        let uri = format!("/containers/b2/{}", stringify!($action));

                        let (status, _) = send(router(state), Method::POST, &uri, false).await;

                        assert_eq!(status, StatusCode::NOT_FOUND);
                    }

                    #[tokio::test]
                    async fn [<$action _with_runtime_down_is_500>]() {
                        let runtime = FakeRuntime::unreachable();
                        let state = state_with(runtime, MembershipFilter::default());
                        let uri = format!("/containers/a1/{}", stringify!($action));

                        let (status, body) = send(router(state), Method::POST, &uri, false).await;

                        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                        assert!(body.contains("Internal server error."));
                    }
                }
            )+
        };
    }

    action_tests! {
        start => ContainerStatus::Running;
        stop => ContainerStatus::Exited;
        restart => ContainerStatus::Running;
    }
}
