use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use upside_core::domain::quote::StockQuote;
use upside_core::screen::{self, ScreenOptions, ScreenParams};
use upside_core::storage::cache::{ttl_from_secs, SnapshotCache, DEFAULT_TTL_SECS};

mod dashboard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = upside_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let ttl = match std::env::var("CACHE_TTL_SECS") {
        Ok(raw) => ttl_from_secs(&raw).context("invalid CACHE_TTL_SECS")?,
        Err(_) => chrono::Duration::seconds(DEFAULT_TTL_SECS),
    };

    let cache = SnapshotCache::new(settings.stock_data_path.clone(), ttl);
    tracing::info!(
        path = %cache.path().display(),
        ttl_secs = ttl.num_seconds(),
        "serving snapshot"
    );

    let state = AppState {
        cache: Arc::new(cache),
    };

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "dashboard listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/refresh", post(refresh))
        .route("/api/stocks", get(get_stocks))
        .route("/api/options", get(get_options))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    cache: Arc<SnapshotCache>,
}

#[derive(Debug, Serialize)]
struct ApiStocks {
    count: usize,
    params: ScreenParams,
    rows: Vec<StockQuote>,
}

/// Loads the cached snapshot, mapping the "no file yet" case to 503.
async fn load_rows(state: &AppState) -> Result<Arc<Vec<StockQuote>>, StatusCode> {
    match state.cache.get().await {
        Ok(Some(rows)) => Ok(rows),
        Ok(None) => {
            tracing::warn!(path = %state.cache.path().display(), "snapshot file not found");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %format!("{e:#}"), "snapshot load failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn parse_params(pairs: &[(String, String)]) -> Result<ScreenParams, StatusCode> {
    ScreenParams::from_pairs(pairs).map_err(|e| {
        tracing::debug!(error = %e, "rejected screen params");
        StatusCode::BAD_REQUEST
    })
}

async fn get_stocks(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ApiStocks>, StatusCode> {
    let params = parse_params(&pairs)?;
    let rows = load_rows(&state).await?;
    let rows = screen::apply(&rows, &params);

    Ok(Json(ApiStocks {
        count: rows.len(),
        params,
        rows,
    }))
}

async fn get_options(State(state): State<AppState>) -> Result<Json<ScreenOptions>, StatusCode> {
    let rows = load_rows(&state).await?;
    Ok(Json(ScreenOptions::from_rows(&rows)))
}

async fn dashboard_page(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let params = match ScreenParams::from_pairs(&pairs) {
        Ok(p) => p,
        Err(e) => {
            let body = dashboard::render_error(&format!("Invalid filter: {e}"));
            return (StatusCode::BAD_REQUEST, Html(body)).into_response();
        }
    };

    match load_rows(&state).await {
        Ok(rows) => {
            let options = ScreenOptions::from_rows(&rows);
            let filtered = screen::apply(&rows, &params);
            let loaded_at = state.cache.loaded_at().await;
            Html(dashboard::render_page(&options, &params, &filtered, loaded_at)).into_response()
        }
        Err(StatusCode::SERVICE_UNAVAILABLE) => {
            let body = dashboard::render_error(
                "Data file not found. Run upside_worker first, then press Refresh Data.",
            );
            (StatusCode::SERVICE_UNAVAILABLE, Html(body)).into_response()
        }
        Err(status) => {
            let body = dashboard::render_error("Could not load the data file; see server logs.");
            (status, Html(body)).into_response()
        }
    }
}

async fn refresh(State(state): State<AppState>) -> Redirect {
    state.cache.clear().await;
    Redirect::to("/")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &upside_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
