//! JSON wire types
//!
//! Every replica endpoint answers with a tagged envelope: `{"data": ..}` on
//! success, `{"error": {"code": "..", "message": ".."}}` on failure. The
//! error code round-trips into the same [`Error`] variant on the caller.

use ordex_core::cluster::ReplicateOutcome;
use ordex_core::{Error, ErrorCode, Result, Trade, TradeType};
use serde::{Deserialize, Serialize};

/// Response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply<T> {
    Data(T),
    Error(ErrorBody),
}

impl<T> Reply<T> {
    /// Unwrap the envelope into a core result
    pub fn into_result(self) -> Result<T> {
        match self {
            Reply::Data(data) => Ok(data),
            Reply::Error(body) => Err(body.into_error()),
        }
    }
}

impl<T> From<Result<T>> for Reply<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Reply::Data(data),
            Err(e) => Reply::Error(ErrorBody::from(&e)),
        }
    }
}

/// Error half of the envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    /// Rebuild the core error
    pub fn into_error(self) -> Error {
        Error::from_code(self.code, self.message)
    }
}

impl From<&Error> for ErrorBody {
    fn from(error: &Error) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// HTTP status carried with each error code
pub fn status_for(code: ErrorCode) -> u16 {
    match code {
        ErrorCode::InvalidRequest | ErrorCode::InsufficientStock => 400,
        ErrorCode::NotLeader => 403,
        ErrorCode::NotFound => 404,
        ErrorCode::ReplicationConflict => 409,
        ErrorCode::CollaboratorUnavailable | ErrorCode::PeerUnavailable => 502,
        ErrorCode::LeaderInitializing | ErrorCode::LeaderUnavailable => 503,
        ErrorCode::ConsensusFailed | ErrorCode::Internal => 500,
    }
}

/// Encode a watermark; "nothing yet" is -1
pub fn watermark_to_wire(watermark: Option<u64>) -> i64 {
    watermark.map_or(-1, |w| w.min(i64::MAX as u64) as i64)
}

/// Decode a watermark; any negative value means "from the beginning"
pub fn watermark_from_wire(watermark: i64) -> Option<u64> {
    u64::try_from(watermark).ok()
}

/// `POST /set_leader`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLeaderRequest {
    pub leader_id: u16,
}

/// `POST /orders` reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderResponse {
    pub transaction_number: u64,
}

/// `POST /replicate_order` reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicateResponse {
    pub outcome: ReplicateOutcome,
}

/// `GET /max_transaction` reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxTransactionResponse {
    /// -1 when the replica holds no order
    pub max_transaction: i64,
}

/// `POST /paxos/prepare`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub proposal_number: u64,
}

/// `POST /paxos/accept`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptRequest {
    pub proposal_number: u64,
    pub value: Trade,
}

/// Catalog `POST /stocks/{name}` body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTrade {
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub quantity: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shapes() {
        let ok: Reply<PlaceOrderResponse> = Reply::Data(PlaceOrderResponse {
            transaction_number: 4,
        });
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"data": {"transaction_number": 4}})
        );

        let err: Reply<PlaceOrderResponse> = Err(Error::not_leader("replica 1")).into();
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"error": {"code": "not_leader", "message": "Not leader: replica 1"}})
        );
    }

    #[test]
    fn test_error_envelope_rebuilds_variant() {
        let body = json!({"error": {"code": "leader_initializing", "message": "recovering"}});
        let reply: Reply<PlaceOrderResponse> = serde_json::from_value(body).unwrap();
        assert!(matches!(
            reply.into_result(),
            Err(Error::LeaderInitializing(_))
        ));
    }

    #[test]
    fn test_watermark_encoding() {
        assert_eq!(watermark_to_wire(None), -1);
        assert_eq!(watermark_to_wire(Some(12)), 12);
        assert_eq!(watermark_from_wire(-1), None);
        assert_eq!(watermark_from_wire(-40), None);
        assert_eq!(watermark_from_wire(3), Some(3));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorCode::InvalidRequest), 400);
        assert_eq!(status_for(ErrorCode::NotLeader), 403);
        assert_eq!(status_for(ErrorCode::ReplicationConflict), 409);
        assert_eq!(status_for(ErrorCode::LeaderInitializing), 503);
        assert_eq!(status_for(ErrorCode::ConsensusFailed), 500);
    }

    #[test]
    fn test_accept_request_shape() {
        let request = AcceptRequest {
            proposal_number: 99,
            value: Trade::sell("IBM", 2).unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"proposal_number": 99, "value": {"stock_name": "IBM", "type": "sell", "quantity": 2}})
        );
    }
}
