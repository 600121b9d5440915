use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::Query;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::config::{Config, DEFAULT_SESSION_TTL_MINS, DashboardOptions};
use crate::dashboard::Dashboard;
use crate::downloader;
use crate::loader::{InputSet, UploadedCsv};
use crate::metric::Metric;
use crate::view::{DashboardQuery, PageContext, PageRenderer, UPLOAD_PROMPT, build_page};

pub const SESSION_COOKIE: &str = "kr_dashboard_session";

/// Uploads of one browser session.
#[derive(Clone, Debug)]
struct Session {
    inputs: InputSet,
    expires_at: SystemTime,
}

/// Shared server state: per-session uploads, held in memory only.
pub struct AppState {
    sessions: RwLock<HashMap<Uuid, Session>>,
    session_ttl: Duration,
    options: DashboardOptions,
    renderer: PageRenderer,
}

impl AppState {
    pub fn new(options: DashboardOptions) -> Result<Self, handlebars::TemplateError> {
        Ok(AppState {
            sessions: RwLock::new(HashMap::new()),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_MINS * 60),
            options,
            renderer: PageRenderer::new()?,
        })
    }

    /// How long a session's uploads are kept after its last upload.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Copy of the uploads belonging to a session (empty if unknown or expired).
    fn inputs(&self, session: Option<Uuid>) -> InputSet {
        let now = SystemTime::now();
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        session
            .and_then(|id| sessions.get(&id))
            .filter(|s| s.expires_at > now)
            .map(|s| s.inputs.clone())
            .unwrap_or_default()
    }

    /// Store accepted uploads under `session` (a new id if `None`), restart
    /// its expiry and drop every expired session.
    fn store_uploads(&self, session: Option<Uuid>, accepted: Vec<(Metric, UploadedCsv)>) -> Uuid {
        let now = SystemTime::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        if sessions.len() < before {
            info!("expired {} idle session(s)", before - sessions.len());
        }

        let id = session.unwrap_or_else(Uuid::new_v4);
        let entry = sessions.entry(id).or_insert_with(|| Session {
            inputs: InputSet::default(),
            expires_at: now,
        });
        entry.expires_at = now + self.session_ttl;
        for (metric, upload) in accepted {
            entry.inputs.set(metric, upload);
        }
        if entry.inputs.is_complete() {
            debug!("session {} has all three uploads", id);
        }
        id
    }
}

#[derive(Serialize)]
struct ApiResponse {
    status: &'static str,
    message: Option<String>,
    missing: Vec<Metric>,
    dashboard: Option<Dashboard>,
}

/// Build the router with all dashboard routes.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(serve_dashboard))
        .route("/upload", post(upload_files))
        .route("/reset", post(reset_session))
        .route("/export.csv", get(export_csv))
        .route("/export.xlsx", get(export_xlsx))
        .route("/api/dashboard", get(get_dashboard_data))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = Arc::new(AppState::new(config.options())?.with_session_ttl(config.session_ttl()));
    let app = router(app_state, config.max_upload_bytes());

    let listener = TcpListener::bind(config.bind).await?;
    info!(
        "listening on http://{} (region '{}')",
        config.bind, config.region
    );
    axum::serve(listener, app).await?;

    Ok(())
}

fn session_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

fn render(state: &AppState, status: StatusCode, page: &PageContext) -> Response {
    match state.renderer.render(page) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            warn!("template rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn serve_dashboard(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let inputs = state.inputs(session_id(&jar));
    let page = build_page(&inputs, &state.options, &query);
    let status = if page.error.is_some() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    render(&state, status, &page)
}

async fn upload_files(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Response {
    let session = session_id(&jar);
    let mut accepted = Vec::new();

    let rejection = loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break None,
            Err(e) => break Some(e.body_text()),
        };

        let Some(metric) = field.name().and_then(Metric::from_key) else {
            continue;
        };
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => break Some(e.body_text()),
        };
        // Browsers send an empty part for a file input left blank
        if filename.is_empty() && bytes.is_empty() {
            continue;
        }

        match UploadedCsv::new(filename, bytes.to_vec()) {
            Ok(upload) => {
                info!(
                    "received {} upload '{}' ({} bytes)",
                    metric.key(),
                    upload.filename,
                    upload.bytes.len()
                );
                accepted.push((metric, upload));
            }
            Err(e) => break Some(e.to_string()),
        }
    };

    if let Some(message) = rejection {
        warn!("upload rejected: {}", message);
        let page = PageContext::with_error(&state.inputs(session), &state.options, message);
        return render(&state, StatusCode::BAD_REQUEST, &page);
    }

    if accepted.is_empty() {
        return Redirect::to("/").into_response();
    }
    let id = state.store_uploads(session, accepted);

    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true);
    (jar.add(cookie), Redirect::to("/")).into_response()
}

async fn reset_session(State(state): State<Arc<AppState>>, jar: CookieJar) -> Redirect {
    if let Some(id) = session_id(&jar) {
        let mut sessions = state.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(&id);
        info!("cleared uploads of session {}", id);
    }
    Redirect::to("/")
}

/// Load the session's dashboard, or the response explaining why there is none.
fn session_dashboard(state: &AppState, jar: &CookieJar) -> Result<Dashboard, Response> {
    let inputs = state.inputs(session_id(jar));
    match Dashboard::from_inputs(&inputs, &state.options) {
        Ok(Some(dashboard)) => Ok(dashboard),
        Ok(None) => Err((StatusCode::BAD_REQUEST, UPLOAD_PROMPT).into_response()),
        Err(e) => Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response()),
    }
}

async fn export_csv(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let dashboard = match session_dashboard(&state, &jar) {
        Ok(dashboard) => dashboard,
        Err(response) => return response,
    };

    match downloader::to_csv(&dashboard.merged.records) {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"korea_covid19.csv\"",
                ),
            ],
            csv,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn export_xlsx(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let dashboard = match session_dashboard(&state, &jar) {
        Ok(dashboard) => dashboard,
        Err(response) => return response,
    };

    match downloader::to_xlsx(&dashboard.merged.records) {
        Ok(buffer) => (
            [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                ),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"korea_covid19.xlsx\"",
                ),
            ],
            Bytes::from(buffer),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn get_dashboard_data(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let inputs = state.inputs(session_id(&jar));
    match Dashboard::from_inputs(&inputs, &state.options) {
        Ok(Some(dashboard)) => Json(ApiResponse {
            status: "ok",
            message: None,
            missing: Vec::new(),
            dashboard: Some(dashboard),
        })
        .into_response(),
        Ok(None) => Json(ApiResponse {
            status: "incomplete",
            message: Some(UPLOAD_PROMPT.to_string()),
            missing: inputs.missing(),
            dashboard: None,
        })
        .into_response(),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse {
                status: "error",
                message: Some(e.to_string()),
                missing: Vec::new(),
                dashboard: None,
            }),
        )
            .into_response(),
    }
}
