//! Paxos acceptor endpoints

use super::error::{decode, reply};
use crate::OrderServer;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use ordex_protocol::wire::{AcceptRequest, PrepareRequest};
use std::sync::Arc;

/// POST /paxos/prepare
pub async fn prepare(State(server): State<Arc<OrderServer>>, body: Bytes) -> Response {
    reply(
        decode::<PrepareRequest>(&body)
            .map(|request| server.replica.prepare(request.proposal_number)),
    )
}

/// POST /paxos/accept
pub async fn accept(State(server): State<Arc<OrderServer>>, body: Bytes) -> Response {
    reply(decode::<AcceptRequest>(&body).map(|request| {
        server
            .replica
            .accept(request.proposal_number, &request.value)
    }))
}
