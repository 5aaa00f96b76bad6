//! Stream consumer
//!
//! A [`StreamConsumer`] owns one subscription. `consume` spawns a tokio task
//! that connects, cuts the body into frames, classifies them and dispatches
//! each to the [`EventHandler`], reconnecting on dropped connections when
//! asked to. The caller keeps control: `stop` may be called at any time
//! from any task, and `wait` returns the loop's outcome.

mod factory;
mod handler;
mod reconnect;
mod runner;
mod state;

use std::sync::Arc;

use parking_lot::Mutex;
use siftstream_domain::{ConsumerState, Credentials, StreamHashes};
use tokio::task::JoinHandle;
use tracing::debug;

pub use factory::ConsumerType;
pub use handler::{EventHandler, HandlerResult, LoggingHandler};
pub use reconnect::{Backoff, FailureKind};
pub use state::ConsumerHandle;

use crate::{
    Error, Result,
    config::ClientConfig,
    connection::{Connector, HttpConnector},
};

/// Shared by the consumer and its loop task
pub(crate) struct ConsumerInner {
    pub(crate) config: ClientConfig,
    pub(crate) credentials: Credentials,
    pub(crate) connector: Arc<dyn Connector>,
    /// Empty while a loop task holds the handler
    pub(crate) handler: Mutex<Option<Box<dyn EventHandler>>>,
}

/// Consumer for one set of stream hashes
pub struct StreamConsumer {
    handle: ConsumerHandle,
    inner: Arc<ConsumerInner>,
    task: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl StreamConsumer {
    /// Create an HTTP consumer
    pub fn new<H>(
        config: ClientConfig,
        credentials: Credentials,
        hashes: StreamHashes,
        handler: H,
    ) -> Result<Self>
    where
        H: EventHandler,
    {
        let connector = Arc::new(HttpConnector::new(&config)?);
        Self::with_connector(config, credentials, hashes, handler, connector)
    }

    /// Create a consumer that opens connections through `connector`
    pub fn with_connector<H>(
        config: ClientConfig,
        credentials: Credentials,
        hashes: StreamHashes,
        handler: H,
        connector: Arc<dyn Connector>,
    ) -> Result<Self>
    where
        H: EventHandler,
    {
        config.validate()?;
        let handler: Box<dyn EventHandler> = Box::new(handler);
        Ok(Self {
            handle: ConsumerHandle::new(hashes),
            inner: Arc::new(ConsumerInner {
                config,
                credentials,
                connector,
                handler: Mutex::new(Some(handler)),
            }),
            task: Mutex::new(None),
        })
    }

    /// Start consuming on the current tokio runtime
    ///
    /// Only valid while stopped. Returns as soon as the loop task is
    /// spawned; use [`wait`](Self::wait) for its outcome.
    pub fn consume(&self, auto_reconnect: bool) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(format!("consume requires a tokio runtime: {e}")))?;

        self.handle
            .cell()
            .compare_and_set(&[ConsumerState::Stopped], ConsumerState::Starting)
            .map_err(|actual| {
                Error::invalid_usage(format!(
                    "Consumer state must be STOPPED before it can start consuming (currently {actual})"
                ))
            })?;

        let handler = self.inner.handler.lock().take();
        let Some(handler) = handler else {
            self.handle.cell().force(ConsumerState::Stopped);
            return Err(Error::invalid_usage(
                "the previous consumption loop has not released its event handler",
            ));
        };

        debug!(url = %self.url(), auto_reconnect, "starting consumer");
        let task = runtime.spawn(runner::run(
            Arc::clone(&self.inner),
            self.handle.clone(),
            handler,
            auto_reconnect,
        ));
        *self.task.lock() = Some(task);
        Ok(())
    }

    /// Ask the loop to stop
    ///
    /// Only valid while starting or running.
    pub fn stop(&self) -> Result<()> {
        self.handle.stop()
    }

    /// Wait for the loop to finish
    ///
    /// Returns the first callback error, if any. Returns immediately when
    /// nothing is running.
    ///
    /// # Panics
    ///
    /// Resumes the panic of a callback that panicked. The state is already
    /// `Stopped` by then and `on_disconnect` is not called for that session.
    pub async fn wait(&self) -> Result<()> {
        let task = self.task.lock().take();
        let Some(task) = task else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(Error::Runtime(format!("consumer task failed: {err}"))),
        }
    }

    /// `consume` then `wait`
    pub async fn run(&self, auto_reconnect: bool) -> Result<()> {
        self.consume(auto_reconnect)?;
        self.wait().await
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConsumerState {
        self.handle.state()
    }

    /// A cloneable handle for stopping the consumer from elsewhere
    pub fn handle(&self) -> ConsumerHandle {
        self.handle.clone()
    }

    /// Subscribed hashes
    pub fn hashes(&self) -> &StreamHashes {
        self.handle.hashes()
    }

    /// URL the consumer connects to
    pub fn url(&self) -> String {
        self.inner.config.stream_url(self.handle.hashes())
    }
}

impl Drop for StreamConsumer {
    fn drop(&mut self) {
        if self.handle.stop().is_ok() {
            debug!("consumer dropped while active, stop requested");
        }
    }
}

impl std::fmt::Debug for StreamConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConsumer")
            .field("hashes", self.handle.hashes())
            .field("state", &self.handle.state())
            .field("username", &self.inner.credentials.username())
            .finish_non_exhaustive()
    }
}
