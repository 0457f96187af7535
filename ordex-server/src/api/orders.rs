//! Client order endpoints

use super::error::{parse_path, reply};
use crate::OrderServer;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::Response;
use ordex_core::{OrderRequest, Result};
use ordex_protocol::wire::PlaceOrderResponse;
use std::sync::Arc;

/// POST /orders
///
/// The body is decoded by hand so that malformed JSON still gets an
/// `invalid_request` envelope.
pub async fn place_order(State(server): State<Arc<OrderServer>>, body: Bytes) -> Response {
    reply(place(&server, &body).await)
}

async fn place(server: &OrderServer, body: &[u8]) -> Result<PlaceOrderResponse> {
    let request = OrderRequest::from_json(body)?;
    let order = server.replica.place_order(&request).await?;
    Ok(PlaceOrderResponse {
        transaction_number: order.transaction_number,
    })
}

/// GET /orders/{transaction_number}
pub async fn get_order(
    State(server): State<Arc<OrderServer>>,
    Path(transaction_number): Path<String>,
) -> Response {
    reply(
        parse_path::<u64>(&transaction_number, "transaction number")
            .and_then(|n| server.replica.get_order(n)),
    )
}
