//! Common test utilities and mock implementations
//!
//! Provides a scripted in-memory connector and a recording event handler
//! shared by the consumer integration tests.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use serde_json::{Map, Value};
use siftstream::{
    ClientConfig, ConnectError, Connection, Connector, ConsumerHandle, Credentials, EventHandler,
    HandlerResult, ReadError, ReconnectConfig, StreamConsumer, StreamHashes, StreamRequest,
    connection::ByteStream,
};

/// One scripted outcome of `Connector::open`
pub enum Script {
    /// The handshake fails
    Fail(ConnectError),
    /// The handshake succeeds and the body yields `chunks`
    Stream {
        headers: Vec<(String, String)>,
        chunks: Vec<Result<Bytes, ReadError>>,
        /// Keep the body open after the last chunk instead of ending it
        hang: bool,
    },
}

impl Script {
    /// Body made of one chunk per line, each newline terminated, then EOF
    pub fn lines(lines: &[&str]) -> Self {
        Script::Stream {
            headers: vec![("content-type".into(), "application/json".into())],
            chunks: lines
                .iter()
                .map(|l| Ok(Bytes::from(format!("{l}\r\n"))))
                .collect(),
            hang: false,
        }
    }

    /// Raw chunks, then EOF
    pub fn chunks(chunks: &[&str]) -> Self {
        Script::Stream {
            headers: Vec::new(),
            chunks: chunks
                .iter()
                .map(|c| Ok(Bytes::from(c.to_string())))
                .collect(),
            hang: false,
        }
    }

    /// Keep the connection open after the scripted chunks
    pub fn hanging(mut self) -> Self {
        if let Script::Stream { hang, .. } = &mut self {
            *hang = true;
        }
        self
    }

    /// Append a mid-stream connection drop
    pub fn then_io_error(mut self, message: &str) -> Self {
        if let Script::Stream { chunks, .. } = &mut self {
            chunks.push(Err(ReadError::io(message)));
        }
        self
    }
}

/// Connector replaying scripts in order; hangs once they run out
#[derive(Default)]
pub struct ScriptedConnector {
    scripts: parking_lot::Mutex<VecDeque<Script>>,
    requests: parking_lot::Mutex<Vec<StreamRequest>>,
    opens: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: parking_lot::Mutex::new(scripts.into()),
            ..Self::default()
        })
    }

    /// Connector whose every `open` blocks forever
    pub fn hanging() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, request: &StreamRequest) -> Result<Connection, ConnectError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let script = self.scripts.lock().pop_front();
        match script {
            None => std::future::pending().await,
            Some(Script::Fail(err)) => Err(err),
            Some(Script::Stream {
                headers,
                chunks,
                hang,
            }) => {
                let body = stream::iter(chunks);
                let body: ByteStream = if hang {
                    body.chain(stream::pending()).boxed()
                } else {
                    body.boxed()
                };
                Ok(Connection::new(headers.into_iter().collect(), body))
            }
        }
    }
}

/// Connector that stops the consumer just before its handshake succeeds
#[derive(Default)]
pub struct StopOnOpenConnector {
    handle: parking_lot::Mutex<Option<ConsumerHandle>>,
    opens: AtomicUsize,
}

impl StopOnOpenConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Consumer to stop from inside `open`
    pub fn attach(&self, handle: ConsumerHandle) {
        *self.handle.lock() = Some(handle);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for StopOnOpenConnector {
    async fn open(&self, _request: &StreamRequest) -> Result<Connection, ConnectError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let handle = self.handle.lock().clone();
        if let Some(handle) = handle {
            handle
                .stop()
                .map_err(|e| ConnectError::Transport(e.to_string()))?;
        }

        let body: ByteStream = stream::iter(vec![Ok(Bytes::from_static(
            b"{\"hash\":\"aaa\",\"data\":{\"interaction\":{\"id\":\"1\"}}}\n",
        ))])
        .chain(stream::pending())
        .boxed();
        Ok(Connection::new(HashMap::new(), body))
    }
}

/// Callback invocation as seen by [`RecordingHandler`]
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect,
    Header(HashMap<String, String>),
    Interaction(Value, String),
    Deleted(Value, String),
    Warning(String),
    Error(String),
    Status(String, Value),
    Disconnect,
}

/// Handler recording every callback; clones share the same log
#[derive(Clone, Default)]
pub struct RecordingHandler {
    events: Arc<parking_lot::Mutex<Vec<Event>>>,
    fail_on: Option<&'static str>,
    panic_on: Option<&'static str>,
    stop_on_interaction: bool,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an error from the callback named `kind`
    pub fn failing_on(mut self, kind: &'static str) -> Self {
        self.fail_on = Some(kind);
        self
    }

    /// Panic inside the callback named `kind`
    pub fn panicking_on(mut self, kind: &'static str) -> Self {
        self.panic_on = Some(kind);
        self
    }

    /// Stop the consumer from inside the first `on_interaction`
    pub fn stopping_on_interaction(mut self) -> Self {
        self.stop_on_interaction = true;
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    fn record(&self, kind: &'static str, event: Event) -> HandlerResult {
        self.events.lock().push(event);
        if self.panic_on == Some(kind) {
            panic!("handler panicked on {kind}");
        }
        if self.fail_on == Some(kind) {
            return Err(format!("handler failed on {kind}").into());
        }
        Ok(())
    }
}

impl EventHandler for RecordingHandler {
    fn on_connect(&mut self, _consumer: &ConsumerHandle) -> HandlerResult {
        self.record("connect", Event::Connect)
    }

    fn on_header(
        &mut self,
        _consumer: &ConsumerHandle,
        headers: &HashMap<String, String>,
    ) -> HandlerResult {
        self.record("header", Event::Header(headers.clone()))
    }

    fn on_interaction(
        &mut self,
        consumer: &ConsumerHandle,
        interaction: Value,
        hash: &str,
    ) -> HandlerResult {
        if self.stop_on_interaction && consumer.is_running() {
            consumer.stop().map_err(|e| e.to_string())?;
        }
        self.record("interaction", Event::Interaction(interaction, hash.to_string()))
    }

    fn on_deleted(
        &mut self,
        _consumer: &ConsumerHandle,
        interaction: Value,
        hash: &str,
    ) -> HandlerResult {
        self.record("deleted", Event::Deleted(interaction, hash.to_string()))
    }

    fn on_warning(&mut self, _consumer: &ConsumerHandle, message: &str) -> HandlerResult {
        self.record("warning", Event::Warning(message.to_string()))
    }

    fn on_error(&mut self, _consumer: &ConsumerHandle, message: &str) -> HandlerResult {
        self.record("error", Event::Error(message.to_string()))
    }

    fn on_status(
        &mut self,
        _consumer: &ConsumerHandle,
        status: &str,
        data: Map<String, Value>,
    ) -> HandlerResult {
        self.record("status", Event::Status(status.to_string(), Value::Object(data)))
    }

    fn on_disconnect(&mut self, _consumer: &ConsumerHandle) -> HandlerResult {
        self.record("disconnect", Event::Disconnect)
    }
}

/// Configuration with short ticks and near-instant backoff
pub fn test_config() -> ClientConfig {
    ClientConfig {
        read_poll_interval: Duration::from_millis(10),
        stall_timeout: Duration::from_secs(60),
        reconnect: ReconnectConfig {
            transport_step: Duration::from_millis(1),
            transport_max: Duration::from_millis(5),
            http_initial: Duration::from_millis(1),
            http_max: Duration::from_millis(5),
            max_attempts: None,
        },
        ..ClientConfig::default()
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("testuser", "testkey", "siftstream-tests/1.0")
}

pub fn consumer_with(
    config: ClientConfig,
    hashes: &[&str],
    handler: RecordingHandler,
    connector: Arc<ScriptedConnector>,
) -> StreamConsumer {
    StreamConsumer::with_connector(
        config,
        credentials(),
        StreamHashes::new(hashes.iter().copied()).unwrap(),
        handler,
        connector,
    )
    .unwrap()
}

pub fn consumer(
    hashes: &[&str],
    handler: RecordingHandler,
    connector: Arc<ScriptedConnector>,
) -> StreamConsumer {
    consumer_with(test_config(), hashes, handler, connector)
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
