//! HTTP API routes.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use capex_common::config::Config;
use capex_common::logging::{RequestContext, RunMetrics};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{debug, Instrument};

use crate::artifacts::Artifacts;
use crate::error::ApiError;
use crate::pipeline::{load_source, Pipeline, PipelineError};
use crate::report::{group_rows, DashboardReport, FilterOptions, GroupRow, ReportFormat, Totals};
use crate::session::SessionManager;

/// Service name used in logs and trace context.
pub const SERVICE_NAME: &str = "capex-dashboard";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Pipeline,
    pub sessions: SessionManager,
    pub metrics: RunMetrics,
}

impl AppState {
    pub fn new(config: Config, artifacts: Artifacts) -> Self {
        Self {
            sessions: SessionManager::new(config.auth.clone()),
            config: Arc::new(config),
            pipeline: Pipeline::new(artifacts),
            metrics: RunMetrics::new(),
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Login
        .route("/api/v1/login", post(login))
        .route("/api/v1/logout", post(logout))
        // Dashboard
        .route("/api/v1/filters", get(filters))
        .route("/api/v1/runs", post(create_run))
        .route("/api/v1/groups", get(list_groups))
        .route("/api/v1/groups/spend", put(update_spend))
        .route("/api/v1/simulate", post(simulate))
        .route("/api/v1/report", get(report))
        // Service status
        .route("/api/v1/status", get(status))
        .layer(middleware::from_fn(trace_context))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Attach a trace id to every request span and echo it back.
async fn trace_context(request: Request, next: Next) -> Response {
    let ctx = RequestContext::from_headers(request.headers(), SERVICE_NAME);
    let span = tracing::info_span!(
        "request",
        service = %ctx.service,
        trace_id = %ctx.trace_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let mut response = next.run(request).instrument(span).await;
    ctx.to_headers(response.headers_mut());
    response
}

fn ok<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "data": data
    }))
}

/// Resolve the bearer token to a live session; returns the token and username.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<(String, String), ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    let username = state.sessions.authenticate(token).await?;
    debug!(%username, "Request authenticated");
    Ok((token.to_string(), username))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ============ Health Check ============

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ============ Login ============

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    username: String,
    idle_timeout_secs: i64,
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .sessions
        .login(&request.username, &request.password)
        .await?;

    Ok(ok(LoginResponse {
        token: session.token,
        username: session.username,
        idle_timeout_secs: state.sessions.timeout_secs(),
    }))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::Unauthorized)?;
    state.sessions.logout(token).await?;
    Ok(Json(serde_json::json!({
        "success": true
    })))
}

// ============ Dashboard ============

async fn filters(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authenticate(&state, &headers).await?;
    let data = state.config.data.clone();
    let records = tokio::task::spawn_blocking(move || load_source(&data))
        .await?
        .map_err(PipelineError::from)?;
    Ok(ok(FilterOptions::from_records(&records)))
}

#[derive(Debug, Serialize)]
struct RunResponse {
    run_id: String,
    duration_ms: u64,
    defaulted_features: Vec<&'static str>,
    totals: Totals,
    groups: Vec<GroupRow>,
}

async fn create_run(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let (token, username) = authenticate(&state, &headers).await?;

    // CSV reading and scoring block, so they run off the async workers.
    let pipeline = state.pipeline.clone();
    let data = state.config.data.clone();
    let span = tracing::Span::current();
    let start = Instant::now();
    let result =
        tokio::task::spawn_blocking(move || span.in_scope(|| pipeline.run_from_source(&data)))
            .await?;
    state
        .metrics
        .record_run(start.elapsed().as_millis() as u64, result.is_ok())
        .await;
    let run = result?;

    let response = RunResponse {
        run_id: run.run_id.clone(),
        duration_ms: run.duration_ms,
        defaulted_features: run.defaulted_features.clone(),
        totals: Totals::from_groups(&run.groups),
        groups: group_rows(&run.groups),
    };

    state
        .sessions
        .update(&token, move |s| s.workbench = Some(run))
        .await?;
    debug!(%username, "Workbench replaced");

    Ok((StatusCode::CREATED, ok(response)))
}

async fn list_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let (token, _) = authenticate(&state, &headers).await?;
    let rows = state
        .sessions
        .update(&token, |s| s.workbench.as_ref().map(|run| group_rows(&run.groups)))
        .await?
        .ok_or(ApiError::NoRun)?;
    Ok(ok(rows))
}

#[derive(Debug, Deserialize)]
struct SpendEdit {
    market: String,
    capex_type: String,
    user_input_spend: f64,
}

async fn update_spend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(edit): Json<SpendEdit>,
) -> Result<impl IntoResponse, ApiError> {
    let (token, _) = authenticate(&state, &headers).await?;

    let row = state
        .sessions
        .update(&token, |s| -> Result<GroupRow, ApiError> {
            let run = s.workbench.as_mut().ok_or(ApiError::NoRun)?;
            let group =
                run.set_user_input_spend(&edit.market, &edit.capex_type, edit.user_input_spend)?;
            Ok(GroupRow::from(group))
        })
        .await??;

    Ok(ok(row))
}

#[derive(Debug, Serialize)]
struct SimulationResponse {
    run_id: String,
    totals: Totals,
    groups: Vec<GroupRow>,
}

async fn simulate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let (token, _) = authenticate(&state, &headers).await?;
    let simulation = state
        .sessions
        .update(&token, |s| {
            s.workbench.as_ref().map(|run| SimulationResponse {
                run_id: run.run_id.clone(),
                totals: Totals::from_groups(&run.groups),
                groups: group_rows(&run.groups),
            })
        })
        .await?
        .ok_or(ApiError::NoRun)?;

    Ok(ok(simulation))
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    format: Option<String>,
    market: Option<String>,
}

async fn report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let (token, _) = authenticate(&state, &headers).await?;
    let format: ReportFormat = query
        .format
        .as_deref()
        .map(str::parse::<ReportFormat>)
        .transpose()
        .map_err(capex_common::Error::InvalidInput)?
        .unwrap_or_default();
    let scorer = state.pipeline.artifacts().scorer.clone();
    let report = state
        .sessions
        .update(&token, |s| {
            s.workbench
                .as_ref()
                .map(|run| DashboardReport::build(run, scorer.as_ref(), query.market.as_deref()))
        })
        .await?
        .ok_or(ApiError::NoRun)?;

    Ok(match format {
        ReportFormat::Json => ok(report).into_response(),
        ReportFormat::Markdown => (
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            report.to_markdown(),
        )
            .into_response(),
    })
}

// ============ Status ============

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let artifacts = state.pipeline.artifacts();
    ok(serde_json::json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "runs": state.metrics.summary().await,
        "active_sessions": state.sessions.count().await,
        "markets": artifacts.encoder.classes().len(),
        "scorer": artifacts.scorer.describe(),
    }))
}
