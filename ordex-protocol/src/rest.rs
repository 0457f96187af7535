//! REST/HTTP client over the reply envelope

use crate::wire::{ErrorBody, Reply};
use ordex_core::{Error, ErrorCode, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// REST client bound to one base URL
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    /// Create a new REST client with its own connection pool
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client sharing an existing connection pool
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build full URL for a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.build_url(path))
    }

    /// Send a GET request and unwrap the envelope
    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let response = self.send(self.request(Method::GET, path)).await?;
        decode_reply(response).await
    }

    /// Send a POST request and unwrap the envelope
    pub async fn post<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R> {
        let response = self
            .send(self.request(Method::POST, path).json(body))
            .await?;
        decode_reply(response).await
    }

    /// Send a GET request expecting a bare JSON body (no envelope)
    pub async fn get_raw<R: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, Option<R>)> {
        let response = self.send(self.request(Method::GET, path)).await?;
        let status = response.status();
        if !status.is_success() {
            return Ok((status, None));
        }
        let body = response
            .json::<R>()
            .await
            .map_err(|e| Error::peer(format!("undecodable body from {}: {}", self.base_url, e)))?;
        Ok((status, Some(body)))
    }

    /// Send a POST request, returning only the status
    pub async fn post_raw<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<StatusCode> {
        let response = self
            .send(self.request(Method::POST, path).json(body))
            .await?;
        Ok(response.status())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| {
            tracing::debug!("Request to {} failed: {}", self.base_url, e);
            Error::peer(format!("{} unreachable: {}", self.base_url, e))
        })
    }
}

/// Decode an enveloped body. A body that is not an envelope is judged by
/// its status alone.
async fn decode_reply<R: DeserializeOwned>(response: Response) -> Result<R> {
    let status = response.status();
    let url = response.url().to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::peer(format!("{} closed mid-body: {}", url, e)))?;

    match serde_json::from_slice::<Reply<R>>(&bytes) {
        Ok(reply) => reply.into_result(),
        Err(e) if status.is_success() => Err(Error::peer(format!(
            "undecodable reply from {}: {}",
            url, e
        ))),
        Err(_) => Err(ErrorBody {
            code: code_for_status(status),
            message: format!("{} answered {}", url, status),
        }
        .into_error()),
    }
}

/// Best guess at an error code for a bare HTTP status
pub fn code_for_status(status: StatusCode) -> ErrorCode {
    match status.as_u16() {
        400 | 422 => ErrorCode::InvalidRequest,
        403 => ErrorCode::NotLeader,
        404 => ErrorCode::NotFound,
        409 => ErrorCode::ReplicationConflict,
        503 => ErrorCode::LeaderInitializing,
        502 | 504 => ErrorCode::PeerUnavailable,
        _ => ErrorCode::Internal,
    }
}
