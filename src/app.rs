use crate::state;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;

mod auth;
mod push;

pub fn app(state: state::AppState) -> Router {
    Router::new()
        .route("/api/notify", post(push::notify))
        .route("/api/push/public-key", get(push::push_public_key))
        .route("/health", get(health))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}

pub(crate) async fn health() -> &'static str {
    "ok"
}
