//! HTTP surface: routing and shared application state.
//!
//! Three endpoints (`/metrics/find`, `/render`, `/health`), grounded on
//! the teacher's `api::create_router` shape — `TraceLayer` plus a
//! request-id pair, state carried through `with_state` — with the
//! auth/rate-limit/CORS layers this crate has no use for dropped (this
//! gateway sits behind an internal edge, per spec.md's Non-goals).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::GatewayError;
use crate::render::{self, FindRequest, Format, RenderRequest};
use crate::rollup::RollupRules;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client: reqwest::Client,
    pub rollup_rules: Arc<RollupRules>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, rollup_rules: RollupRules) -> Self {
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
            rollup_rules: Arc::new(rollup_rules),
        }
    }
}

/// Builds the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics/find/", get(metrics_find))
        .route("/metrics/find", get(metrics_find))
        .route("/render/", get(render_series))
        .route("/render", get(render_series))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Deserialize)]
struct FindParams {
    query: String,
    #[serde(default)]
    from: i64,
    #[serde(default)]
    until: i64,
    format: String,
}

async fn metrics_find(
    State(state): State<AppState>,
    Query(params): Query<FindParams>,
) -> Result<Response, GatewayError> {
    let format = Format::parse(&params.format)?;
    let req = FindRequest {
        query: params.query,
        from: params.from,
        until: params.until,
        format,
    };
    let body = render::find(&state.config, &state.client, &req).await?;
    Ok(wire_response(format, body))
}

#[derive(Debug, Deserialize)]
struct RenderParams {
    target: String,
    from: i64,
    until: i64,
    format: String,
}

async fn render_series(
    State(state): State<AppState>,
    Query(params): Query<RenderParams>,
) -> Result<Response, GatewayError> {
    let format = Format::parse(&params.format)?;
    let req = RenderRequest {
        target: params.target,
        from: params.from,
        until: params.until,
        format,
    };
    let now = now_unix();
    let body = render::render(&state.config, &state.client, &state.rollup_rules, now, &req).await?;
    Ok(wire_response(format, body))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn wire_response(format: Format, body: Vec<u8>) -> Response {
    let content_type = match format {
        Format::Pickle => "application/pickle",
        Format::Protobuf => "application/x-protobuf",
    };
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        body,
    )
        .into_response()
}
