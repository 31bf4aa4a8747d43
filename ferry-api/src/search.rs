use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use ferry_core::{AggregatedSearchResponse, SearchRequest};
use ferry_store::StoreResult;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/search", post(search_sailings))
}

async fn search_sailings(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<AggregatedSearchResponse>, AppError> {
    request
        .validate(Utc::now().date_naive())
        .map_err(AppError::from_core)?;

    let cache_key = request.cache_key();

    if let Some(redis) = &state.redis {
        if let Some(cached) = cached_response(&cache_key, redis.get_json(&cache_key).await) {
            return Ok(Json(cached));
        }
    }

    let response = state.orchestrator.search_all(&request).await;

    if let Some(redis) = &state.redis {
        if should_cache(&response) {
            if let Err(e) = redis
                .set_json(&cache_key, &response, state.settings.cache_ttl_seconds)
                .await
            {
                warn!(error = %e, "Failed to cache search response");
            }
        }
    }

    Ok(Json(response))
}

/// Cache lookup result. A Redis error is logged and treated as a miss.
fn cached_response(
    cache_key: &str,
    lookup: StoreResult<Option<AggregatedSearchResponse>>,
) -> Option<AggregatedSearchResponse> {
    match lookup {
        Ok(Some(cached)) => {
            debug!(key = %cache_key, "Search cache hit");
            Some(cached)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Search cache unavailable");
            None
        }
    }
}

/// Partial aggregates are never cached, otherwise a failed or skipped
/// operator would stay out of identical searches until the entry expires.
fn should_cache(response: &AggregatedSearchResponse) -> bool {
    response.total_results > 0 && response.is_complete()
}
