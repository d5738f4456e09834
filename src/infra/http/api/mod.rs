pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::AdminState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_admin_router(state: AdminState) -> Router {
    let auth_state = state.clone();

    let admin = Router::new()
        .route("/api/admin/schedule/forecast", get(handlers::get_forecast))
        .route("/api/admin/schedule/forecast/refill", post(handlers::refill))
        .route(
            "/api/admin/schedule/forecast/reconcile",
            post(handlers::reconcile),
        )
        .route(
            "/api/admin/schedule/slots/{id}/outcome",
            post(handlers::record_slot_outcome),
        )
        .route("/api/admin/content/pool", get(handlers::pool_overview))
        .route("/api/admin/content/tiers", post(handlers::set_platform_tier))
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::admin_auth,
        ));

    Router::new()
        .route("/api/health", get(handlers::health))
        .merge(admin)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
