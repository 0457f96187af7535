//! Liveness endpoint

use super::error::reply;
use crate::OrderServer;
use axum::extract::State;
use axum::response::Response;
use std::sync::Arc;

/// GET /ping
pub async fn ping(State(server): State<Arc<OrderServer>>) -> Response {
    reply(Ok(server.replica.ping()))
}
