use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, sync::Arc};
use time::OffsetDateTime;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::classify::StatusCategory;
use crate::export::{self, ExportFormat};
use crate::refresh::{RefreshConfig, Refresher};
use crate::task::Task;
use crate::view::{exportable, SortKey, ViewState};

#[derive(Clone)]
pub struct AppState {
    pub refresher: Arc<Refresher>,
}

#[derive(Serialize)]
struct OkResponse<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

#[derive(Serialize)]
struct ErrResponse {
    ok: bool,
    error: &'static str,
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(OkResponse {
        ok: true,
        data: Some(data),
    })
    .into_response()
}

fn err(status: StatusCode, error: &'static str) -> Response {
    (status, Json(ErrResponse { ok: false, error })).into_response()
}

/// Query string shared by `/tasks` and `/export/*`.
///
/// `categories` is a comma separated list. Leaving it out selects every
/// category; passing it empty selects none.
#[derive(Deserialize, Default)]
struct ViewQuery {
    #[serde(default)]
    categories: Option<String>,
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    sort: Option<String>,
}

impl ViewQuery {
    fn into_view_state(self) -> Result<ViewState, &'static str> {
        let categories: BTreeSet<StatusCategory> = match self.categories {
            None => StatusCategory::ALL.into_iter().collect(),
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<StatusCategory>())
                .collect::<Result<_, _>>()
                .map_err(|_| "invalid_category")?,
        };
        let sort = match self.sort {
            None => SortKey::default(),
            Some(s) => s.parse::<SortKey>().map_err(|_| "invalid_sort")?,
        };
        Ok(ViewState {
            categories,
            search: self.q.unwrap_or_default(),
            sort,
        })
    }
}

#[derive(Serialize)]
struct TaskRow<'a> {
    #[serde(flatten)]
    task: &'a Task,
    status_label: &'a str,
    badge: &'static str,
    css_class: &'static str,
}

impl<'a> From<&'a Task> for TaskRow<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            task,
            status_label: task.status_label(),
            badge: task.status_category.badge(),
            css_class: task.status_category.css_class(),
        }
    }
}

#[derive(Serialize)]
struct TaskList<'a> {
    count: usize,
    tasks: Vec<TaskRow<'a>>,
}

#[derive(Serialize)]
struct Settings {
    auto_refresh: bool,
    #[serde(flatten)]
    refresh: RefreshConfig,
}

#[derive(Deserialize)]
struct SettingsUpdate {
    #[serde(default)]
    auto_refresh: Option<bool>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/snapshot", get(get_snapshot))
        .route("/tasks", get(get_tasks))
        .route("/refresh", post(post_refresh).options(options_ok))
        .route(
            "/settings",
            get(get_settings).post(post_settings).options(options_ok),
        )
        .route("/export/csv", get(get_export_csv))
        .route("/export/json", get(get_export_json))
        .route("/export/html", get(get_export_html))
        .with_state(state)
        .layer(cors)
}

async fn options_ok() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Serialize)]
struct HealthInfo {
    service: &'static str,
    version: &'static str,
}

async fn health() -> Response {
    ok(HealthInfo {
        service: "dashboard_core",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_snapshot(State(state): State<AppState>) -> Response {
    ok(state.refresher.status().await)
}

async fn get_tasks(State(state): State<AppState>, Query(q): Query<ViewQuery>) -> Response {
    let view_state = match q.into_view_state() {
        Ok(v) => v,
        Err(code) => return err(StatusCode::BAD_REQUEST, code),
    };
    let tasks = state.refresher.view(&view_state).await;
    ok(TaskList {
        count: tasks.len(),
        tasks: tasks.iter().map(TaskRow::from).collect(),
    })
}

async fn post_refresh(State(state): State<AppState>) -> Response {
    ok(state.refresher.trigger_manual_refresh().await)
}

async fn get_settings(State(state): State<AppState>) -> Response {
    ok(Settings {
        auto_refresh: state.refresher.auto_refresh(),
        refresh: state.refresher.config(),
    })
}

async fn post_settings(State(state): State<AppState>, Json(req): Json<SettingsUpdate>) -> Response {
    if let Some(v) = req.auto_refresh {
        state.refresher.set_auto_refresh(v);
    }
    ok(Settings {
        auto_refresh: state.refresher.auto_refresh(),
        refresh: state.refresher.config(),
    })
}

async fn get_export_csv(State(state): State<AppState>, Query(q): Query<ViewQuery>) -> Response {
    export_view(&state, q, ExportFormat::Csv).await
}

async fn get_export_json(State(state): State<AppState>, Query(q): Query<ViewQuery>) -> Response {
    export_view(&state, q, ExportFormat::Json).await
}

async fn get_export_html(State(state): State<AppState>, Query(q): Query<ViewQuery>) -> Response {
    export_view(&state, q, ExportFormat::Html).await
}

async fn export_view(state: &AppState, q: ViewQuery, format: ExportFormat) -> Response {
    let view_state = match q.into_view_state() {
        Ok(v) => v,
        Err(code) => return err(StatusCode::BAD_REQUEST, code),
    };
    let rows = exportable(&state.refresher.view(&view_state).await);
    let body = match export::render(format, &rows) {
        Ok(b) => b,
        Err(e) => {
            error!("export {} failed: {e}", format.extension());
            return err(StatusCode::INTERNAL_SERVER_ERROR, "export_error");
        }
    };
    let file_name = export::export_file_name(format, OffsetDateTime::now_utc());
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response()
}
