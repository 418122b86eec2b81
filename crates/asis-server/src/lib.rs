//! HTTP API over the session lifecycle manager (Axum).

pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use state::AppState;

/// Build the application router with a custom state.
pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::session_routes())
        .with_state(state)
}

#[cfg(test)]
mod tests;
