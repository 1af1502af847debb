/// API routes and handlers
pub mod chains;
pub mod health;
pub mod identity;

use crate::{cache::QueryState, context::AppContext};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(chains::routes())
        .merge(identity::routes())
}

/// Respond with a query envelope; error states carry their error status
pub fn envelope<V: Serialize>(state: QueryState<V>) -> Response {
    let status = match &state {
        QueryState::Pending => StatusCode::ACCEPTED,
        QueryState::Success { .. } => StatusCode::OK,
        QueryState::Error { error } => error.status_code(),
    };

    (status, Json(state)).into_response()
}
