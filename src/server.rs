//! HTTP server for the profile aggregation API
//!
//! # Routes
//!
//! - `GET /api/profile?github=<username>&bitbucket=<username>` - Consolidated profile
//! - `GET /health` - Liveness check
//! - `GET /metrics` - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use profile_aggregator::config::ServiceConfig;
//! use profile_aggregator::server::ProfileServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = ProfileServer::new(ServiceConfig::default());
//!     server.run("127.0.0.1:5000").await.expect("Server failed");
//! }
//! ```

use crate::config::ServiceConfig;
use crate::metrics;
use crate::profile::ConsolidatedProfile;
use crate::providers::Provider;
use crate::service::ProfileService;
use crate::{AggregatorError, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Shared server state
struct AppState {
    service: ProfileService,
}

/// HTTP server exposing the consolidated profile endpoint
pub struct ProfileServer {
    state: Arc<AppState>,
}

impl ProfileServer {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            state: Arc::new(AppState {
                service: ProfileService::new(config),
            }),
        }
    }

    /// Build the application router
    pub fn router(&self) -> Router {
        Self::build_router(self.state.clone())
    }

    fn build_router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/api/profile", get(get_profile))
            .route("/health", get(health))
            .route("/metrics", get(metrics_endpoint))
            .with_state(state)
    }

    /// Run the server on the given address
    pub async fn run(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;

        let config = self.state.service.config();
        info!(
            addr = addr,
            github_api = %config.github.base_url(),
            bitbucket_api = %config.bitbucket.base_url(),
            request_deadline_secs = config.server.request_deadline_secs,
            "Profile server listening"
        );

        axum::serve(listener, Self::build_router(self.state)).await?;
        Ok(())
    }
}

/// Error response
///
/// `provider` is present only when an upstream provider caused the failure.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
}

/// Map an error to its HTTP status and JSON body
pub fn error_response(err: &AggregatorError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        AggregatorError::MissingParameter(_) => StatusCode::BAD_REQUEST,
        AggregatorError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        _ if err.provider().is_some() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            provider: err.provider(),
        }),
    )
}

/// Read a required, non-blank query parameter exactly as supplied
fn required_param<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .filter(|value| !value.trim().is_empty())
        .map(String::as_str)
        .ok_or_else(|| AggregatorError::MissingParameter(name.to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics_endpoint() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> std::result::Result<Json<ConsolidatedProfile>, (StatusCode, Json<ErrorResponse>)> {
    let result = consolidated_profile(&state, &params).await;

    match result {
        Ok(profile) => {
            metrics::record_profile_request(StatusCode::OK.as_u16());
            Ok(Json(profile))
        }
        Err(e) => {
            let (status, body) = error_response(&e);
            if status.is_server_error() {
                error!(status = status.as_u16(), error = %e, "Profile request failed");
            } else {
                warn!(status = status.as_u16(), error = %e, "Rejected profile request");
            }
            metrics::record_profile_request(status.as_u16());
            Err((status, body))
        }
    }
}

async fn consolidated_profile(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<ConsolidatedProfile> {
    let github = required_param(params, "github")?;
    let bitbucket = required_param(params, "bitbucket")?;

    info!(github = github, bitbucket = bitbucket, "Profile request");
    state.service.consolidated_profile(github, bitbucket).await
}
