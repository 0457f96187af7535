//! Envelope responses
//!
//! Every handler answers with [`Reply`]: `{"data": ..}` and 200, or
//! `{"error": {code, message}}` with the status of the error code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use ordex_core::{Error, Result};
use ordex_protocol::wire::{Reply, status_for};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Turn a core result into an enveloped response
pub fn reply<T: Serialize>(result: Result<T>) -> Response {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            StatusCode::from_u16(status_for(e.code())).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };
    if let Err(e) = &result {
        tracing::debug!("Request failed with {}: {}", status, e);
    }
    (status, Json(Reply::from(result))).into_response()
}

/// Decode a JSON body; malformed input is an invalid request
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| Error::invalid_request(format!("malformed request body: {}", e)))
}

/// Parse a path segment as an integer
pub fn parse_path<T: std::str::FromStr>(segment: &str, what: &str) -> Result<T> {
    segment
        .parse()
        .map_err(|_| Error::invalid_request(format!("{} must be an integer, got '{}'", what, segment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_status() {
        let ok = reply(Ok(1u64));
        assert_eq!(ok.status(), StatusCode::OK);

        let err = reply::<u64>(Err(Error::not_leader("replica 2")));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = reply::<u64>(Err(Error::leader_initializing("recovering")));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_decode_and_parse() {
        assert!(matches!(
            decode::<serde_json::Value>(b"{not json"),
            Err(Error::InvalidRequest(_))
        ));
        assert_eq!(parse_path::<i64>("-1", "watermark").unwrap(), -1);
        assert!(matches!(
            parse_path::<u64>("abc", "transaction number"),
            Err(Error::InvalidRequest(_))
        ));
    }
}
