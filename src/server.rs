// src/server.rs

use crate::error::{AppError, Result};
use crate::pool::{KeyStatusView, UsageStats};
use crate::state::AppState;
use axum::{
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Instrument};
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub providers: BTreeMap<String, UsageStats>,
    /// Providers with no key that could be handed out right now.
    pub exhausted: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProviderReport {
    pub usage: UsageStats,
    pub keys: Vec<KeyStatusView>,
}

/// Creates the router serving the health report and pool statistics.
pub fn create_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/health", get(health_report))
        .route("/stats", get(all_stats))
        .route("/stats/:provider", get(provider_stats));

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics", get(crate::metrics::metrics_handler));

    router
        .layer(middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Tags every request with an id, exposed as `X-Request-ID`.
async fn request_id(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "request",
        request_id = %request_id,
        http.method = %req.method(),
        url.path = %req.uri().path(),
    );
    req.extensions_mut().insert(request_id);

    async move {
        let mut response = next.run(req).await;
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert("X-Request-ID", value);
        }
        response
    }
    .instrument(span)
    .await
}

/// 200 while every provider can hand out a key, 503 otherwise.
async fn health_report(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let providers = state.registry.all_pool_stats();
    let exhausted: Vec<String> = providers
        .values()
        .filter(|stats| stats.active_keys == 0)
        .map(|stats| stats.provider.clone())
        .collect();

    let (code, status) = if exhausted.is_empty() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthReport {
            status,
            providers,
            exhausted,
        }),
    )
}

async fn all_stats(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, UsageStats>> {
    Json(state.registry.all_pool_stats())
}

async fn provider_stats(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Json<ProviderReport>> {
    let pool = state
        .registry
        .get(&provider)
        .ok_or(AppError::UnknownProvider { provider })?;

    Ok(Json(ProviderReport {
        usage: pool.get_usage_stats(),
        keys: pool.get_key_statuses(),
    }))
}
