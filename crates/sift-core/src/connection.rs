//! Stream connection management
//!
//! A [`Connector`] opens one long-lived HTTP GET against the stream endpoint
//! and hands back the response headers plus the body as a byte stream. The
//! consumer never sees reqwest types, so tests can swap in a scripted
//! connector.

use std::{collections::HashMap, pin::Pin, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use siftstream_domain::{Credentials, StreamHashes};
use tracing::{debug, instrument};

use crate::{
    Error, Result,
    config::ClientConfig,
    error::{ConnectError, ReadError},
};

/// Number of body bytes kept from a rejected handshake
const ERROR_BODY_LIMIT: usize = 512;

/// Header carrying `username:api_key`
pub const AUTH_HEADER: &str = "Auth";

/// Body of an open stream
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, ReadError>> + Send>>;

/// Everything needed to open one stream connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Full stream URL
    pub url: String,
    /// `Auth` header value
    pub auth: String,
    /// `User-Agent` header value
    pub user_agent: String,
    /// Handshake deadline
    pub connect_timeout: Duration,
}

impl StreamRequest {
    /// Build the request for `hashes` using `config` and `credentials`
    pub fn new(config: &ClientConfig, hashes: &StreamHashes, credentials: &Credentials) -> Self {
        Self {
            url: config.stream_url(hashes),
            auth: credentials.auth_header(),
            user_agent: credentials.user_agent().to_string(),
            connect_timeout: config.connect_timeout,
        }
    }
}

/// An established stream
///
/// Owned exclusively by the consumer loop; dropping it closes the socket.
pub struct Connection {
    headers: HashMap<String, String>,
    body: ByteStream,
}

impl Connection {
    /// Wrap response headers and a body stream
    pub fn new(headers: HashMap<String, String>, body: ByteStream) -> Self {
        Self { headers, body }
    }

    /// Response headers, names lower-cased
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Body stream, read by the frame reader
    pub fn body_mut(&mut self) -> &mut ByteStream {
        &mut self.body
    }

    /// Close the connection
    pub fn close(self) {
        debug!(headers = self.headers.len(), "closing stream connection");
        drop(self.body);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Opens stream connections
#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform the handshake
    ///
    /// Resolves to an open connection only after a 2xx status; any other
    /// outcome is a [`ConnectError`] with nothing left open.
    async fn open(&self, request: &StreamRequest) -> std::result::Result<Connection, ConnectError>;
}

/// [`Connector`] backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    /// Build a connector with connect timeout taken from `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn open(&self, request: &StreamRequest) -> std::result::Result<Connection, ConnectError> {
        let send = self
            .client
            .get(&request.url)
            .header(AUTH_HEADER, &request.auth)
            .header(reqwest::header::USER_AGENT, &request.user_agent)
            .send();

        let response = tokio::time::timeout(request.connect_timeout, send)
            .await
            .map_err(|_| ConnectError::Timeout(request.connect_timeout))?
            .map_err(|e| {
                if e.is_builder() {
                    ConnectError::InvalidRequest(e.to_string())
                } else if e.is_timeout() {
                    ConnectError::Timeout(request.connect_timeout)
                } else {
                    ConnectError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = rejection_body(response, request.connect_timeout).await;
            debug!(status = status.as_u16(), "stream handshake rejected");
            return Err(ConnectError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        // a peer dropping the socket mid-body surfaces here as a body error
        let body = response
            .bytes_stream()
            .map_err(|e| ReadError::io(e.to_string()))
            .boxed();

        debug!(status = status.as_u16(), "stream connected");
        Ok(Connection::new(headers, body))
    }
}

/// Read at most [`ERROR_BODY_LIMIT`] bytes of a rejected handshake's body
///
/// Gives up after `deadline` and keeps whatever arrived by then.
async fn rejection_body(mut response: reqwest::Response, deadline: Duration) -> String {
    let mut body = Vec::new();
    let read = async {
        while body.len() < ERROR_BODY_LIMIT {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) | Err(_) => break,
            }
        }
    };
    if tokio::time::timeout(deadline, read).await.is_err() {
        debug!(bytes = body.len(), "rejected handshake body still open, keeping partial text");
    }

    body.truncate(ERROR_BODY_LIMIT);
    String::from_utf8_lossy(&body).into_owned()
}
