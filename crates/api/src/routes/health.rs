//! Health check endpoint handlers.
//!
//! The full check probes the work queue rather than running a bare
//! `SELECT 1`: a reachable database with a missing or wedged queue table
//! is not a healthy dispatch service.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use persistence::repositories::WorkQueueRepository;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
    pub queue: QueueHealth,
}

/// Database health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: u64,
}

/// Work queue backlog.
///
/// `due` counts items that are claimable right now; a value that stays
/// high while workers run means delivery is falling behind.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueHealth {
    pub depth: i64,
    pub due: i64,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Full health check endpoint.
///
/// Reports queue backlog next to database latency. The backlog queries
/// double as the connectivity probe.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let queue = WorkQueueRepository::new(state.pool.clone());

    let start = std::time::Instant::now();
    let backlog = match (queue.depth().await, queue.due_count().await) {
        (Ok(depth), Ok(due)) => Some((depth, due)),
        _ => None,
    };
    let latency_ms = start.elapsed().as_millis() as u64;

    match backlog {
        Some((depth, due)) => Ok(Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: DatabaseHealth {
                connected: true,
                latency_ms,
            },
            queue: QueueHealth { depth, due },
        })),
        None => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

/// Liveness probe endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Ready means the queue table is reachable, which also catches a pool
/// pointed at an unmigrated database.
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    let queue = WorkQueueRepository::new(state.pool.clone());

    match queue.depth().await {
        Ok(_) => Ok(Json(StatusResponse {
            status: "ready".to_string(),
        })),
        Err(_) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}
