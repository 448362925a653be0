pub mod config;
pub mod version;
pub mod workers;

use axum::extract::State;
use axum::routing::get;
use axum::{Router, middleware};
use capacity_common::metrics::MetricsLayer;
use capacity_common::{access_log, middleware as request_context_middleware, response};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::app::App;

/// Builds the full router: a health router that's always served, merged with the
/// `/api/v1` surface, the latter gated behind `require_ready`.
pub fn router(app: App) -> Router {
    let health = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
        .route("/version", get(version::get_version));

    let config_routes = Router::new()
        .route("/config", get(config::get_config).post(config::post_config).patch(config::patch_config));

    let gated_routes = Router::new()
        .route("/machinetypes", get(workers::list_machine_types))
        .route("/workers", get(workers::list_workers).post(workers::create_worker))
        .route(
            "/workers/{machineID}",
            get(workers::get_worker).patch(workers::patch_worker).delete(workers::delete_worker),
        )
        .layer(middleware::from_fn_with_state(app.clone(), require_ready));

    let api = Router::new().nest("/api/v1", config_routes.merge(gated_routes));

    health
        .merge(api)
        .with_state(app)
        .layer(middleware::from_fn(access_log::internal))
        .layer(middleware::from_fn(request_context_middleware::create_context))
        .layer(MetricsLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

/// Returns `404` for any gated route until the engine has a usable config.
async fn require_ready(
    State(app): State<App>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    if !app.engine.is_ready().await {
        return response::not_found(anyhow::anyhow!(
            "capacity server is not configured yet; POST /api/v1/config first"
        ));
    }
    next.run(req).await
}
