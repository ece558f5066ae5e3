//! HTTP request handlers
//!
//! Every response carries a `status` field: `"success"`, or a message
//! describing what went wrong.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use b3_common::{PlaybackState, PlayerParams};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::AppContext;
use crate::action::ActionRequest;
use crate::error::Error;
use crate::library;

const SUCCESS: &str = "success";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionBatch {
    #[serde(default)]
    actions: Vec<ActionRequest>,
}

#[derive(Debug, Serialize)]
pub struct ActionResult {
    action: String,
    status: String,
    state: PlaybackState,
}

#[derive(Debug, Serialize)]
pub struct ActionsResponse {
    status: String,
    results: Vec<ActionResult>,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    status: String,
    config: PlayerParams,
    state: PlaybackState,
    activesong: String,
}

#[derive(Debug, Serialize)]
pub struct RejectedKey {
    key: String,
    error: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigUpdateResponse {
    status: String,
    applied: Vec<String>,
    rejected: Vec<RejectedKey>,
}

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    status: String,
    files: Vec<String>,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "b3-web".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Playback Control
// ============================================================================

/// POST /api/actions - Perform actions in order, one status per action
///
/// Answers 400 when the body is malformed or every action was rejected
/// without reaching the supervisor.
pub async fn perform_actions(
    State(ctx): State<AppContext>,
    payload: Result<Json<ActionBatch>, JsonRejection>,
) -> crate::Result<Response> {
    let Json(batch) = payload?;
    if batch.actions.is_empty() {
        return Err(Error::MalformedRequest("no actions provided".to_string()));
    }

    let mut results = Vec::with_capacity(batch.actions.len());
    let mut rejected = 0;

    for request in &batch.actions {
        debug!("Action request: {:?}", request);

        let outcome = match request.parse() {
            Ok(action) => ctx.supervisor.perform_action(action).await,
            Err(e) => Err(e),
        };

        let result = match outcome {
            Ok(transition) => ActionResult {
                action: transition.action.to_string(),
                status: if transition.is_ok() {
                    SUCCESS.to_string()
                } else {
                    join_errors(&transition.errors)
                },
                state: transition.to,
            },
            Err(e) => {
                warn!("Rejected action {}: {}", request.action, e);
                if e.is_validation() {
                    rejected += 1;
                }
                ActionResult {
                    action: request.action.clone(),
                    status: e.to_string(),
                    state: ctx.supervisor.state().await,
                }
            }
        };

        results.push(result);
    }

    let status = results
        .iter()
        .find(|r| r.status != SUCCESS)
        .map(|r| r.status.clone())
        .unwrap_or_else(|| SUCCESS.to_string());

    let code = if rejected == results.len() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    Ok((code, Json(ActionsResponse { status, results })).into_response())
}

// ============================================================================
// Configuration
// ============================================================================

/// GET /api/config - Parameters, playback state and active file
///
/// Runs the player liveness check first so a finished song reads as stopped.
pub async fn get_config(State(ctx): State<AppContext>) -> Json<ConfigResponse> {
    ctx.supervisor.check_health().await;
    let snapshot = ctx.supervisor.snapshot().await;

    Json(ConfigResponse {
        status: SUCCESS.to_string(),
        config: snapshot.params,
        state: snapshot.state,
        activesong: snapshot.active_file,
    })
}

/// POST /api/config - Partial parameter update
///
/// Keys are validated one by one; valid keys are applied even when others
/// are rejected.
pub async fn update_config(
    State(ctx): State<AppContext>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> crate::Result<Response> {
    let Json(updates) = payload?;
    if updates.is_empty() {
        return Err(Error::MalformedRequest("no config data".to_string()));
    }

    let outcome = ctx.supervisor.update_params(&updates).await;
    let clean = outcome.update.is_clean();

    let applied: Vec<String> = outcome
        .update
        .applied
        .iter()
        .map(|k| k.to_string())
        .collect();
    let rejected: Vec<RejectedKey> = outcome
        .update
        .rejected
        .into_iter()
        .map(|(key, e)| RejectedKey {
            key,
            error: Error::from(e).to_string(),
        })
        .collect();

    if !applied.is_empty() {
        info!("Config update applied {} keys", applied.len());
    }

    let code = if outcome.persist_error.is_some() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else if applied.is_empty() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    let status = match (&outcome.persist_error, clean) {
        (None, true) => SUCCESS.to_string(),
        (persist_error, _) => rejected
            .iter()
            .map(|r| r.error.clone())
            .chain(persist_error.iter().map(|e| e.to_string()))
            .collect::<Vec<_>>()
            .join("; "),
    };

    Ok((
        code,
        Json(ConfigUpdateResponse {
            status,
            applied,
            rejected,
        }),
    )
        .into_response())
}

// ============================================================================
// File Listing
// ============================================================================

/// GET /api/audiofiles - Playable files, sorted case-insensitively
pub async fn list_files(State(ctx): State<AppContext>) -> impl IntoResponse {
    match library::list_audio_files(&ctx.audio_dir, &ctx.audio_extension).await {
        Ok(files) => (
            StatusCode::OK,
            Json(FilesResponse {
                status: SUCCESS.to_string(),
                files,
            }),
        ),
        Err(e) => {
            warn!("File listing failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(FilesResponse {
                    status: e.to_string(),
                    files: Vec::new(),
                }),
            )
        }
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
