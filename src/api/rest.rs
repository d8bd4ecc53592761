// =============================================================================
// REST API Endpoints: Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  Data endpoints never fail on data
// errors: they answer with whatever the service returned, which is an empty
// array for a symbol that could not be produced.
//
// Service calls are CPU-bound and may wait on another request's generation
// for the same symbol, so they run on the blocking pool.
//
// CORS is configured permissively; the surface carries no credentials.
// =============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::market_data::CacheStatsSnapshot;
use crate::runtime_config::parse_symbol_list;
use crate::types::{Series, SymbolSeriesMap};

// =============================================================================
// Router construction
// =============================================================================

/// Build the REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/market-data", get(multi_symbol_data))
        .route("/api/v1/market-data/:symbol", get(symbol_data))
        .route("/api/v1/cache", delete(clear_cache))
        .layer(cors)
        .with_state(state)
}

fn deadline_from(timeout_ms: Option<u64>) -> Option<Instant> {
    timeout_ms.and_then(|ms| Instant::now().checked_add(Duration::from_millis(ms)))
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    environment: String,
    uptime_secs: u64,
    cache: CacheStatsSnapshot,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        environment: state.market_data.environment().to_string(),
        uptime_secs: state.uptime_secs(),
        cache: state.market_data.cache_stats(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Market data
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct SymbolQuery {
    #[serde(default)]
    days: Option<i64>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

async fn symbol_data(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<SymbolQuery>,
) -> impl IntoResponse {
    let days = query.days.unwrap_or(state.config.default_days);
    let deadline = deadline_from(query.timeout_ms);

    let worker = state.clone();
    let series = tokio::task::spawn_blocking(move || {
        worker
            .market_data
            .get_symbol_data_with_deadline(&symbol, days, deadline)
    })
    .await
    .unwrap_or_else(|e| {
        error!(error = %e, "market data worker failed");
        Series::new()
    });

    Json(series)
}

#[derive(Debug, Default, Deserialize)]
struct MultiSymbolQuery {
    #[serde(default)]
    symbols: String,
    #[serde(default)]
    days: Option<i64>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

async fn multi_symbol_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MultiSymbolQuery>,
) -> impl IntoResponse {
    let symbols = parse_symbol_list(&query.symbols);
    let days = query.days.unwrap_or(state.config.default_days);
    let deadline = deadline_from(query.timeout_ms);

    let worker = state.clone();
    let data = tokio::task::spawn_blocking(move || {
        worker
            .market_data
            .get_multi_symbol_data_with_deadline(&symbols, days, deadline)
    })
    .await
    .unwrap_or_else(|e| {
        error!(error = %e, "market data worker failed");
        SymbolSeriesMap::new()
    });

    Json(data)
}

// =============================================================================
// Administration
// =============================================================================

async fn clear_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = match tokio::task::spawn_blocking(move || state.market_data.clear_cache()).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "cache clear worker failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "cache clear failed" })),
            );
        }
    };

    match result {
        Ok(cleared) => {
            info!(cleared, "cache cleared via API");
            (StatusCode::OK, Json(serde_json::json!({ "cleared": cleared })))
        }
        Err(e) => {
            warn!(error = %e, "cache clear refused");
            (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::MarketDataService;
    use crate::runtime_config::RuntimeConfig;
    use crate::types::Environment;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(environment: Environment) -> (Router, Arc<AppState>) {
        let config = RuntimeConfig {
            environment,
            ..RuntimeConfig::default()
        };
        let svc = MarketDataService::synthetic(environment, config.max_days).unwrap();
        let state = Arc::new(AppState::new(config, svc));
        (router(state.clone()), state)
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_reports_environment() {
        let (app, _) = app(Environment::Development);
        let (status, body) = call(app, "GET", "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["environment"], "development");
        assert_eq!(v["cache"]["hits"], 0);
    }

    #[tokio::test]
    async fn symbol_endpoint_returns_records() {
        let (app, _) = app(Environment::Development);
        let (status, body) = call(app, "GET", "/api/v1/market-data/AAPL?days=60").await;
        assert_eq!(status, StatusCode::OK);

        let records: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
        assert!(!records.is_empty());
        let first = &records[0];
        for field in ["date", "symbol", "open", "high", "low", "close", "volume"] {
            assert!(!first[field].is_null(), "missing {field}");
        }
        assert_eq!(first["symbol"], "AAPL");
        assert!(first["sma_20"].is_null());
        assert!(first["rsi"].is_null());
        assert!(!records.last().unwrap()["sma_20"].is_null());
    }

    #[tokio::test]
    async fn zero_days_is_empty_array() {
        let (app, _) = app(Environment::Development);
        let (status, body) = call(app, "GET", "/api/v1/market-data/AAPL?days=0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[]");
    }

    #[tokio::test]
    async fn multi_endpoint_preserves_request_order() {
        let (app, _) = app(Environment::Development);
        let (status, body) =
            call(app, "GET", "/api/v1/market-data?symbols=MSFT,AAPL&days=30").await;
        assert_eq!(status, StatusCode::OK);

        let msft = body.find("\"MSFT\":").unwrap();
        let aapl = body.find("\"AAPL\":").unwrap();
        assert!(msft < aapl);

        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v.as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn clear_cache_allowed_in_development() {
        let (app, state) = app(Environment::Development);
        state.market_data.get_symbol_data("AAPL", 30);

        let (status, body) = call(app, "DELETE", "/api/v1/cache").await;
        assert_eq!(status, StatusCode::OK);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["cleared"], 1);
        assert!(state.market_data.cache().is_empty());
    }

    #[tokio::test]
    async fn clear_cache_forbidden_in_production() {
        let (app, state) = app(Environment::Production);
        state.market_data.get_symbol_data("AAPL", 30);

        let (status, _) = call(app, "DELETE", "/api/v1/cache").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(state.market_data.cache().len(), 1);
    }
}
