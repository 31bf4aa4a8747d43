use std::collections::HashMap;

use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use ferry_core::AdapterHealthStatus;
use ferry_integration::ReloadSummary;
use tracing::info;

use crate::error::AppError;
use crate::middleware::{admin_auth_middleware, AdminClaims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/v1/operators/health/check", post(run_health_check))
        .route("/v1/admin/operators/reload", post(reload_operators))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    Router::new()
        .route("/v1/operators/health", get(operator_health))
        .merge(admin)
}

// ============================================================================
// Health
// ============================================================================

/// Status of every registered operator, including ones not yet observed.
async fn operator_health(State(state): State<AppState>) -> Json<Vec<AdapterHealthStatus>> {
    let snapshot = state.health().snapshot();
    let statuses = state
        .registry()
        .operator_codes()
        .await
        .into_iter()
        .map(|code| {
            snapshot
                .get(&code)
                .cloned()
                .unwrap_or_else(|| AdapterHealthStatus::unknown(&code))
        })
        .collect();

    Json(statuses)
}

async fn run_health_check(State(state): State<AppState>) -> Json<HashMap<String, bool>> {
    let adapters = state.registry().all().await;
    Json(state.health().check_all(&adapters).await)
}

// ============================================================================
// Admin
// ============================================================================

async fn reload_operators(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
) -> Result<Json<ReloadSummary>, AppError> {
    let configs = state.operator_source.load_operators().await?;
    let summary = state.registry().apply(&configs).await;

    for code in summary.removed.iter().chain(summary.failed.iter()).chain(summary.updated.iter()) {
        state.health().forget(code);
    }

    info!(
        admin = %claims.sub,
        added = ?summary.added,
        updated = ?summary.updated,
        removed = ?summary.removed,
        failed = ?summary.failed,
        "Operator registry reloaded"
    );
    Ok(Json(summary))
}
