use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::require_admin_token;
use crate::state::AppState;

pub fn build_router(app_state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/admin/principals/restricted",
            get(handlers::list_restricted_principals_handler),
        )
        .route(
            "/admin/principals/{kind}/{key}",
            get(handlers::inspect_principal_handler),
        )
        .route(
            "/admin/principals/{kind}/{key}/suspend",
            post(handlers::suspend_principal_handler),
        )
        .route(
            "/admin/principals/{kind}/{key}/unsuspend",
            post(handlers::unsuspend_principal_handler),
        )
        .route(
            "/admin/principals/{kind}/{key}/ban",
            post(handlers::ban_principal_handler),
        )
        .route(
            "/admin/principals/{kind}/{key}/unban",
            post(handlers::unban_principal_handler),
        )
        .route_layer(from_fn_with_state(app_state.clone(), require_admin_token));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/guard/check", post(handlers::check_handler))
        .route("/guard/outcome", post(handlers::outcome_handler))
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
