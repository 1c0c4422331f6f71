use crate::dashboard::{ self, DashboardEvent, DashboardState, DashboardView };
use crate::data::{ DataService, DataUnavailable, Dataset };
use crate::models::chart::{ ChartRequest, Figure };

use std::collections::HashMap;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{ Duration, Instant };
use tokio::sync::Mutex;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ Path, State },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error, warn };
use uuid::Uuid;

struct DashboardSession {
    state: DashboardState,
    last_seen: Instant,
}

type Sessions = HashMap<Uuid, DashboardSession>;

#[derive(Clone)]
pub struct AppState {
    data: Arc<DataService>,
    sessions: Arc<Mutex<Sessions>>,
    default_country: String,
    idle_timeout: Duration,
}

impl AppState {
    pub fn new(data: Arc<DataService>, default_country: String, idle_timeout: Duration) -> Self {
        Self {
            data,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            default_country,
            idle_timeout,
        }
    }

    async fn dataset(&self) -> Result<Arc<Dataset>, ApiError> {
        self.data.load_today().await.map_err(ApiError::from)
    }
}

/// Drops sessions nobody has touched for `idle_timeout`.
fn expire_idle(sessions: &mut Sessions, idle_timeout: Duration) {
    let before = sessions.len();
    sessions.retain(|_, session| session.last_seen.elapsed() < idle_timeout);
    let expired = before - sessions.len();
    if expired > 0 {
        info!("Expired {} idle dashboard sessions", expired);
    }
}

#[derive(Debug)]
pub enum ApiError {
    DataUnavailable(DataUnavailable),
    SessionNotFound(Uuid),
}

impl From<DataUnavailable> for ApiError {
    fn from(err: DataUnavailable) -> Self {
        ApiError::DataUnavailable(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            ApiError::DataUnavailable(e) => {
                error!("Dataset unavailable: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, format!("Data unavailable: {}", e))
            }
            ApiError::SessionNotFound(id) => {
                warn!("Unknown dashboard session {}", id);
                (StatusCode::NOT_FOUND, format!("Unknown dashboard session {}", id))
            }
        };
        (code, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct OptionsResponse {
    countries: Vec<String>,
    dates: Vec<String>,
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>,
    defaults: DashboardState,
}

#[derive(Serialize)]
struct SessionResponse {
    session_id: Uuid,
    #[serde(flatten)]
    view: DashboardView,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/dashboard/options", get(options_handler))
        .route("/api/dashboard/chart", post(chart_handler))
        .route("/api/dashboard/sessions", post(create_session_handler))
        .route("/api/dashboard/sessions/{id}", axum::routing::delete(end_session_handler))
        .route("/api/dashboard/sessions/{id}/events", post(session_event_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    http_port: u16,
    state: AppState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await
        .map_err(|e| format!("Failed to bind HTTP server to {}: {}", addr, e))?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!("HTTP server started");
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn options_handler(State(state): State<AppState>) -> Result<Json<OptionsResponse>, ApiError> {
    let dataset = state.dataset().await?;
    Ok(Json(OptionsResponse {
        countries: dataset.countries().to_vec(),
        dates: dataset.dates().to_vec(),
        min_date: dataset.first_date(),
        max_date: dataset.last_date(),
        defaults: DashboardState::initial(&dataset, &state.default_country),
    }))
}

async fn chart_handler(
    State(state): State<AppState>,
    Json(request): Json<ChartRequest>,
) -> Result<Json<Figure>, ApiError> {
    let dataset = state.dataset().await?;
    Ok(Json(dataset.figure(&request).as_ref().clone()))
}

async fn create_session_handler(State(state): State<AppState>) -> Result<Json<SessionResponse>, ApiError> {
    let dataset = state.dataset().await?;
    let session_id = Uuid::new_v4();
    let initial = DashboardState::initial(&dataset, &state.default_country);
    let view = initial.render(&dataset);

    let mut sessions = state.sessions.lock().await;
    expire_idle(&mut sessions, state.idle_timeout);
    sessions.insert(session_id, DashboardSession { state: initial, last_seen: Instant::now() });
    info!("Dashboard session {} started", session_id);
    Ok(Json(SessionResponse { session_id, view }))
}

async fn session_event_handler(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(event): Json<DashboardEvent>,
) -> Result<Json<SessionResponse>, ApiError> {
    let dataset = state.dataset().await?;

    // Applied under the map lock so concurrent events on one session compose.
    let mut sessions = state.sessions.lock().await;
    expire_idle(&mut sessions, state.idle_timeout);
    let session = sessions
        .get_mut(&session_id)
        .ok_or(ApiError::SessionNotFound(session_id))?;

    let view = dashboard::handle(&dataset, session.state.clone(), event);
    session.state = view.state.clone();
    session.last_seen = Instant::now();
    Ok(Json(SessionResponse { session_id, view }))
}

async fn end_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    match state.sessions.lock().await.remove(&session_id) {
        Some(_) => {
            info!("Dashboard session {} ended", session_id);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::SessionNotFound(session_id)),
    }
}
