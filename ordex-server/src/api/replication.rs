//! Replica-to-replica endpoints: leader notification, order push and
//! anti-entropy pulls

use super::error::{decode, parse_path, reply};
use crate::OrderServer;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::Response;
use ordex_core::OrderRecord;
use ordex_protocol::wire::{
    MaxTransactionResponse, ReplicateResponse, SetLeaderRequest, watermark_from_wire,
    watermark_to_wire,
};
use std::sync::Arc;

/// POST /set_leader
pub async fn set_leader(State(server): State<Arc<OrderServer>>, body: Bytes) -> Response {
    reply(decode::<SetLeaderRequest>(&body).and_then(|request| {
        server.replica.set_leader(request.leader_id)?;
        Ok(request)
    }))
}

/// POST /replicate_order
pub async fn replicate_order(State(server): State<Arc<OrderServer>>, body: Bytes) -> Response {
    reply(
        decode::<OrderRecord>(&body)
            .and_then(OrderRecord::into_order)
            .and_then(|order| server.replica.replicate_order(order))
            .map(|outcome| ReplicateResponse { outcome }),
    )
}

/// GET /get_missing_orders/{watermark}; `-1` means from the beginning
pub async fn get_missing_orders(
    State(server): State<Arc<OrderServer>>,
    Path(watermark): Path<String>,
) -> Response {
    reply(
        parse_path::<i64>(&watermark, "watermark")
            .map(|w| server.replica.missing_orders_after(watermark_from_wire(w))),
    )
}

/// GET /max_transaction
pub async fn max_transaction(State(server): State<Arc<OrderServer>>) -> Response {
    reply(Ok(MaxTransactionResponse {
        max_transaction: watermark_to_wire(server.replica.max_transaction()),
    }))
}
