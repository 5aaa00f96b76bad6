//! REST API collaborator
//!
//! The stream itself needs no REST calls, but filter definitions must be
//! compiled to a hash before they can be streamed. [`User`] wraps an
//! [`ApiClient`] with the status-code mapping and exposes `compile` plus
//! consumer constructors.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use siftstream_domain::{Credentials, StreamHashes, StreamTarget, message::is_truthy};
use tracing::{debug, instrument};

use crate::{
    Error, Result, USER_AGENT,
    config::ClientConfig,
    connection::AUTH_HEADER,
    consumer::{ConsumerType, EventHandler, StreamConsumer},
};

/// Deadline for a whole REST request
const API_TIMEOUT: Duration = Duration::from_secs(10);

/// Timestamp format of `created_at` fields
const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw outcome of one REST call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code
    pub response_code: u16,
    /// Decoded body; `{}` when the body was empty
    pub data: Value,
    /// `X-RateLimit-Limit` header
    pub rate_limit: Option<u64>,
    /// `X-RateLimit-Remaining` header
    pub rate_limit_remaining: Option<u64>,
}

impl ApiResponse {
    /// True for 2xx responses
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.response_code)
    }

    fn data_text(&self, field: &str) -> Option<String> {
        self.data.get(field).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Performs REST calls
///
/// Implementations return non-2xx responses as `Ok`; [`User::call_api`]
/// turns them into errors.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// POST `params` to `endpoint`
    async fn call(
        &self,
        credentials: &Credentials,
        endpoint: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<ApiResponse>;
}

/// [`ApiClient`] posting form-encoded parameters with reqwest
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpApiClient {
    /// Build a client for the API host in `config`
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    #[instrument(skip(self, credentials, params))]
    async fn call(
        &self,
        credentials: &Credentials,
        endpoint: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<ApiResponse> {
        let url = self.config.api_url(endpoint);
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();

        let response = self
            .client
            .post(&url)
            .header(AUTH_HEADER, credentials.auth_header())
            .header(reqwest::header::USER_AGENT, credentials.user_agent())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .map_err(|e| Error::api(503, format!("Request failed: {e}")))?;

        let response_code = response.status().as_u16();
        let rate_limit = header_u64(response.headers(), "x-ratelimit-limit");
        let rate_limit_remaining = header_u64(response.headers(), "x-ratelimit-remaining");
        let content = response
            .bytes()
            .await
            .map_err(|e| Error::api(503, format!("Request failed: {e}")))?;

        debug!(response_code, bytes = content.len(), "api response");
        Ok(ApiResponse {
            response_code,
            data: decode_body(&content, response_code)?,
            rate_limit,
            rate_limit_remaining,
        })
    }
}

fn header_u64(headers: &reqwest::header::HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Decode a response body; an empty body is `{}`
pub fn decode_body(content: &[u8], response_code: u16) -> Result<Value> {
    if content.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    match serde_json::from_slice::<Value>(content) {
        Ok(data) if is_truthy(&data) => Ok(data),
        _ => Err(Error::api(response_code, "Failed to decode the response")),
    }
}

/// Result of compiling a filter definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledDefinition {
    /// Stream hash addressing the definition
    pub hash: String,
    /// When the definition was first compiled
    pub created_at: NaiveDateTime,
    /// Processing cost of the definition
    pub dpu: f64,
}

impl CompiledDefinition {
    fn from_data(data: &Value) -> Result<Self> {
        let hash = data
            .get("hash")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("hash"))?
            .to_string();

        let created_at = data
            .get("created_at")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("created_at"))?;
        let created_at = NaiveDateTime::parse_from_str(created_at, CREATED_AT_FORMAT).map_err(|e| {
            Error::CompileFailed(format!("Compiled successfully but created_at is invalid: {e}"))
        })?;

        let dpu = match data.get("dpu") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| missing("DPU"))?;

        Ok(Self {
            hash,
            created_at,
            dpu,
        })
    }
}

fn missing(field: &str) -> Error {
    Error::CompileFailed(format!(
        "Compiled successfully but no {field} in the response"
    ))
}

/// An account on the filtering service
#[derive(Clone)]
pub struct User {
    credentials: Credentials,
    config: ClientConfig,
    api: Arc<dyn ApiClient>,
}

impl User {
    /// Create a user with default configuration and the library user agent
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let credentials = Credentials::new(username, api_key, USER_AGENT);
        Self::with_config(credentials, ClientConfig::default())
    }

    /// Create a user talking to the hosts in `config`
    pub fn with_config(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let api = Arc::new(HttpApiClient::new(config.clone())?);
        Ok(Self::with_api_client(credentials, config, api))
    }

    /// Create a user with a custom API client
    pub fn with_api_client(
        credentials: Credentials,
        config: ClientConfig,
        api: Arc<dyn ApiClient>,
    ) -> Self {
        Self {
            credentials,
            config,
            api,
        }
    }

    /// Account credentials
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Call a REST endpoint, turning non-2xx responses into errors
    pub async fn call_api(
        &self,
        endpoint: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<ApiResponse> {
        let response = self.api.call(&self.credentials, endpoint, params).await?;
        debug!(
            endpoint,
            code = response.response_code,
            rate_limit = response.rate_limit,
            rate_limit_remaining = response.rate_limit_remaining,
            "api call"
        );

        if response.is_success() {
            return Ok(response);
        }

        let code = response.response_code;
        if code == 401 {
            let message = response
                .data_text("error")
                .unwrap_or_else(|| "Authentication failed".to_string());
            return Err(Error::AccessDenied(message));
        }
        if code == 403 && response.rate_limit_remaining == Some(0) {
            return Err(Error::RateLimitExceeded(
                response.data_text("comment").unwrap_or_default(),
            ));
        }

        let message = response
            .data_text("error")
            .unwrap_or_else(|| format!("Unknown error ({code})"));
        Err(Error::api(code, message))
    }

    /// Compile a filter definition to a stream hash
    pub async fn compile(&self, csdl: &str) -> Result<CompiledDefinition> {
        if csdl.trim().is_empty() {
            return Err(Error::invalid_usage("Cannot compile an empty definition"));
        }

        let params = BTreeMap::from([("csdl".to_string(), csdl.to_string())]);
        let response = match self.call_api("compile", &params).await {
            Ok(response) => response,
            Err(Error::Api { code: 400, message }) => return Err(Error::CompileFailed(message)),
            Err(Error::Api { code, message }) => {
                return Err(Error::CompileFailed(format!(
                    "Unexpected APIError code: {code} [{message}]"
                )));
            }
            Err(other) => return Err(other),
        };

        CompiledDefinition::from_data(&response.data)
    }

    /// Turn a stream target into hashes, compiling CSDL when needed
    pub async fn resolve(&self, target: &StreamTarget) -> Result<StreamHashes> {
        if let Some(hashes) = target.resolve_local()? {
            return Ok(hashes);
        }
        match target {
            StreamTarget::Csdl(csdl) => {
                let compiled = self.compile(csdl).await?;
                Ok(StreamHashes::single(compiled.hash)?)
            }
            _ => Err(Error::invalid_usage("stream target did not resolve")),
        }
    }

    /// Consumer for a single hash
    pub fn get_consumer<H>(
        &self,
        hash: &str,
        handler: H,
        consumer_type: &str,
    ) -> Result<StreamConsumer>
    where
        H: EventHandler,
    {
        self.consumer(StreamHashes::single(hash)?, handler, consumer_type)
    }

    /// Consumer for several hashes over one connection
    pub fn get_multi_consumer<I, S, H>(
        &self,
        hashes: I,
        handler: H,
        consumer_type: &str,
    ) -> Result<StreamConsumer>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        H: EventHandler,
    {
        self.consumer(StreamHashes::new(hashes)?, handler, consumer_type)
    }

    /// Consumer for any target, compiling CSDL first
    pub async fn consumer_for<H>(
        &self,
        target: &StreamTarget,
        handler: H,
        consumer_type: ConsumerType,
    ) -> Result<StreamConsumer>
    where
        H: EventHandler,
    {
        let hashes = self.resolve(target).await?;
        StreamConsumer::of_type(
            consumer_type,
            self.config.clone(),
            self.credentials.clone(),
            hashes,
            handler,
        )
    }

    fn consumer<H>(
        &self,
        hashes: StreamHashes,
        handler: H,
        consumer_type: &str,
    ) -> Result<StreamConsumer>
    where
        H: EventHandler,
    {
        StreamConsumer::factory(
            consumer_type,
            self.config.clone(),
            self.credentials.clone(),
            hashes,
            handler,
        )
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
