use crate::collectors::{HostProbe, KillError};
use crate::metrics::Metrics;
use crate::state::{AnalyzeReport, State as AnalysisState};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub const DASHBOARD_MISSING: &str = "<h1>Error: dashboard.html not found</h1>";

pub type SharedProbe = Arc<Mutex<Box<dyn HostProbe>>>;

#[derive(Clone)]
pub struct HttpAppState {
    pub metrics: Arc<Metrics>,
    pub analysis: Arc<Mutex<AnalysisState>>,
    pub probe: SharedProbe,
    pub dashboard_path: Arc<PathBuf>,
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("анализ прерван: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        error!(error = %self, "ошибка обработки /analyze");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct KillRequest {
    #[serde(default)]
    pub pid: Option<PidField>,
}

/// The dashboard may send the pid as a number or as a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PidField {
    Number(i64),
    Text(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KillResponse {
    pub success: bool,
    pub message: String,
}

pub fn build_router(state: HttpAppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/analyze", get(analyze_handler))
        .route("/kill_process", post(kill_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn index_handler(State(state): State<HttpAppState>) -> Html<String> {
    match tokio::fs::read_to_string(state.dashboard_path.as_ref()).await {
        Ok(page) => Html(page),
        Err(err) => {
            warn!(
                path = %state.dashboard_path.display(),
                error = %err,
                "страница дашборда недоступна"
            );
            Html(DASHBOARD_MISSING.to_string())
        }
    }
}

async fn analyze_handler(
    State(state): State<HttpAppState>,
) -> Result<Json<AnalyzeReport>, AnalyzeError> {
    let analysis = state.analysis.clone();
    let probe = state.probe.clone();
    // sysinfo refreshes block; the analysis lock is held for the whole poll
    let report = tokio::task::spawn_blocking(move || {
        let mut analysis = analysis.blocking_lock();
        let mut probe = probe.blocking_lock();
        analysis.analyze(&mut **probe)
    })
    .await?;

    state.metrics.update_from_report(&report);
    Ok(Json(report))
}

async fn kill_handler(
    State(state): State<HttpAppState>,
    payload: Result<Json<KillRequest>, JsonRejection>,
) -> Json<KillResponse> {
    let outcome = match payload {
        Ok(Json(req)) => resolve_pid(req.pid),
        Err(rejection) => Err(KillError::InvalidPid(rejection.body_text())),
    };
    let outcome = match outcome {
        Ok(pid) => state.probe.lock().await.kill(pid).map(|_| pid),
        Err(err) => Err(err),
    };

    match outcome {
        Ok(pid) => {
            info!(pid, "процесс принудительно завершен");
            state.metrics.inc_kill_request("success");
            Json(KillResponse {
                success: true,
                message: format!("Terminated PID {pid}"),
            })
        }
        Err(err) => {
            warn!(error = %err, "не удалось завершить процесс");
            state.metrics.inc_kill_request("failure");
            Json(KillResponse {
                success: false,
                message: err.to_string(),
            })
        }
    }
}

fn resolve_pid(field: Option<PidField>) -> Result<u32, KillError> {
    let raw = match field {
        None => return Err(KillError::InvalidPid("missing \"pid\"".to_string())),
        Some(PidField::Number(n)) => n,
        Some(PidField::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| KillError::InvalidPid(text.clone()))?,
    };
    let pid = u32::try_from(raw)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| KillError::InvalidPid(raw.to_string()))?;
    if pid == std::process::id() {
        return Err(KillError::SelfTermination(pid));
    }
    Ok(pid)
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("ошибка кодирования метрик: {err}"),
        )
            .into_response(),
    }
}
