pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/imports", post(routes::import_catalog))
        .route("/reports", post(routes::submit_report))
        .route("/reports/{id}", get(routes::get_report))
        .with_state(state)
}
