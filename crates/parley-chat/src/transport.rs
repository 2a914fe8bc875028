//! Request issuing: the seam between the session engine and the network.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use serde::Serialize;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use parley_core::config::BackendConfig;

use crate::error::TransportError;

/// Response body as a stream of raw chunks with arbitrary boundaries.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Issues a query and hands back the streaming response body.
///
/// The cancellation token belongs to the session; implementations should
/// abandon connection setup when it fires. Dropping the returned stream
/// aborts the underlying request.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn open(&self, query: &str, cancel: CancellationToken)
        -> Result<ByteStream, TransportError>;
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &BackendConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn open(
        &self,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<ByteStream, TransportError> {
        let request = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(&QueryRequest { query });

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            sent = request.send() => sent.map_err(|e| TransportError::Connect(e.to_string()))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        debug!(endpoint = %self.endpoint, status = status.as_u16(), "Response stream opened");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Body(e.to_string())));
        Ok(Box::pin(body))
    }
}
