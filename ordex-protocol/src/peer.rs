//! HTTP implementation of the replica RPC surface

use crate::rest::RestClient;
use crate::wire::{
    AcceptRequest, MaxTransactionResponse, PlaceOrderResponse, PrepareRequest, ReplicateResponse,
    SetLeaderRequest, watermark_from_wire, watermark_to_wire,
};
use async_trait::async_trait;
use ordex_core::cluster::{AcceptReply, Endpoint, Health, PeerClient, Promise, ReplicateOutcome};
use ordex_core::{Error, Order, OrderRecord, OrderRequest, Result, Trade};
use reqwest::Client;
use std::time::Duration;

/// Peer client talking JSON over HTTP; one pool for every peer
#[derive(Clone)]
pub struct HttpPeerClient {
    client: Client,
}

impl HttpPeerClient {
    /// Create a client whose every request is bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn rest(&self, peer: &Endpoint) -> RestClient {
        RestClient::with_client(self.client.clone(), peer.as_str())
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn ping(&self, peer: &Endpoint) -> Result<Health> {
        self.rest(peer).get("/ping").await
    }

    async fn set_leader(&self, peer: &Endpoint, leader_id: u16) -> Result<()> {
        let _: SetLeaderRequest = self
            .rest(peer)
            .post("/set_leader", &SetLeaderRequest { leader_id })
            .await?;
        Ok(())
    }

    async fn place_order(&self, peer: &Endpoint, request: &OrderRequest) -> Result<u64> {
        let reply: PlaceOrderResponse = self.rest(peer).post("/orders", request).await?;
        Ok(reply.transaction_number)
    }

    async fn get_order(&self, peer: &Endpoint, transaction_number: u64) -> Result<Order> {
        let record: OrderRecord = self
            .rest(peer)
            .get(&format!("/orders/{}", transaction_number))
            .await?;
        record.into_order()
    }

    async fn replicate_order(&self, peer: &Endpoint, order: &Order) -> Result<ReplicateOutcome> {
        let reply: ReplicateResponse = self.rest(peer).post("/replicate_order", order).await?;
        Ok(reply.outcome)
    }

    async fn missing_orders_after(
        &self,
        peer: &Endpoint,
        watermark: Option<u64>,
    ) -> Result<Vec<OrderRecord>> {
        self.rest(peer)
            .get(&format!("/get_missing_orders/{}", watermark_to_wire(watermark)))
            .await
    }

    async fn max_transaction(&self, peer: &Endpoint) -> Result<Option<u64>> {
        let reply: MaxTransactionResponse = self.rest(peer).get("/max_transaction").await?;
        Ok(watermark_from_wire(reply.max_transaction))
    }

    async fn prepare(&self, peer: &Endpoint, proposal_id: u64) -> Result<Promise> {
        self.rest(peer)
            .post(
                "/paxos/prepare",
                &PrepareRequest {
                    proposal_number: proposal_id,
                },
            )
            .await
    }

    async fn accept(&self, peer: &Endpoint, proposal_id: u64, value: &Trade) -> Result<AcceptReply> {
        self.rest(peer)
            .post(
                "/paxos/accept",
                &AcceptRequest {
                    proposal_number: proposal_id,
                    value: value.clone(),
                },
            )
            .await
    }
}
