//! REST API handlers

pub mod error;
pub mod health;
pub mod orders;
pub mod paxos;
pub mod replication;

use crate::OrderServer;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the replica router with every RPC route
pub fn router(server: Arc<OrderServer>) -> Router {
    Router::new()
        .route("/ping", get(health::ping))
        .route("/set_leader", post(replication::set_leader))
        .route("/orders", post(orders::place_order))
        .route("/orders/{transaction_number}", get(orders::get_order))
        .route("/replicate_order", post(replication::replicate_order))
        .route(
            "/get_missing_orders/{watermark}",
            get(replication::get_missing_orders),
        )
        .route("/max_transaction", get(replication::max_transaction))
        .route("/paxos/prepare", post(paxos::prepare))
        .route("/paxos/accept", post(paxos::accept))
        .with_state(server)
        // Request/response tracing
        .layer(TraceLayer::new_for_http())
}
