//! Consumption loop
//!
//! Runs on its own task. All callbacks are invoked from here, one at a time.

use std::{sync::Arc, time::Duration};

use siftstream_domain::{ClassifiedMessage, ConsumerState, Frame, classify};
use tracing::{debug, error, info, warn};

use super::{
    ConsumerInner, EventHandler, HandlerResult,
    reconnect::{Backoff, FailureKind},
    state::ConsumerHandle,
};
use crate::{
    Error, Result,
    connection::{Connection, StreamRequest},
    framing::FrameReader,
};

/// How a connected session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Stop requested, a fatal message or an unreadable frame
    Stopped,
    /// End of stream, dropped connection or stall; eligible for reconnect
    Disconnected,
}

/// Settles the state in `Stopped` on every exit path, panics included
struct SettleOnDrop(ConsumerHandle);

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        let prev = self.0.cell().force(ConsumerState::Stopped);
        debug!(from = %prev, "consumer settled");
    }
}

/// Placeholder left in the lease while the real handler is being returned
struct Released;

impl EventHandler for Released {}

/// Holds the caller's handler for the duration of the loop and puts it
/// back in the consumer's slot when dropped
struct HandlerLease {
    inner: Arc<ConsumerInner>,
    handler: Box<dyn EventHandler>,
}

impl HandlerLease {
    fn get_mut(&mut self) -> &mut dyn EventHandler {
        self.handler.as_mut()
    }
}

impl Drop for HandlerLease {
    fn drop(&mut self) {
        let handler = std::mem::replace(&mut self.handler, Box::new(Released));
        *self.inner.handler.lock() = Some(handler);
    }
}

/// Entry point of the consumer task
pub(crate) async fn run(
    inner: Arc<ConsumerInner>,
    handle: ConsumerHandle,
    handler: Box<dyn EventHandler>,
    auto_reconnect: bool,
) -> Result<()> {
    // declared first so it drops last, after the handler is back in its slot
    let _settle = SettleOnDrop(handle.clone());

    let request = StreamRequest::new(&inner.config, handle.hashes(), &inner.credentials);
    let backoff = Backoff::new(inner.config.reconnect.clone());
    let mut runner = Runner {
        handler: HandlerLease {
            inner: Arc::clone(&inner),
            handler,
        },
        inner,
        handle,
        request,
        backoff,
        auto_reconnect,
    };

    let result = runner.run_loop().await;
    if let Err(err) = &result {
        error!(error = %err, url = %runner.request.url, "consumer stopped with error");
    }
    result
}

struct Runner {
    inner: Arc<ConsumerInner>,
    handle: ConsumerHandle,
    handler: HandlerLease,
    request: StreamRequest,
    backoff: Backoff,
    auto_reconnect: bool,
}

impl Runner {
    async fn run_loop(&mut self) -> Result<()> {
        loop {
            let opened = tokio::select! {
                biased;
                _ = self.handle.cell().stop_requested() => {
                    debug!("stop requested while connecting");
                    return Ok(());
                }
                opened = self.inner.connector.open(&self.request) => opened,
            };

            let connection = match opened {
                Ok(connection) => connection,
                Err(err) => {
                    warn!(error = %err, url = %self.request.url, "stream connection failed");
                    let message = err.to_string();
                    self.call(|h, c| h.on_error(c, &message))?;

                    if !self.auto_reconnect || self.handle.state() != ConsumerState::Starting {
                        return Ok(());
                    }
                    let Some(delay) = self.backoff.next_delay(FailureKind::from(&err)) else {
                        warn!(attempts = self.backoff.attempts(), "giving up reconnecting");
                        return Ok(());
                    };
                    info!(delay_ms = delay.as_millis() as u64, "retrying connection");
                    if sleep_unless_stopped(&self.handle, delay).await {
                        return Ok(());
                    }
                    continue;
                }
            };

            self.backoff.reset();
            match self.session(connection).await? {
                SessionEnd::Stopped => return Ok(()),
                SessionEnd::Disconnected => {
                    if !self.auto_reconnect {
                        return Ok(());
                    }
                    if self
                        .handle
                        .cell()
                        .compare_and_set(&[ConsumerState::Running], ConsumerState::Starting)
                        .is_err()
                    {
                        return Ok(());
                    }
                    let Some(delay) = self.backoff.next_delay(FailureKind::Transport) else {
                        return Ok(());
                    };
                    info!(delay_ms = delay.as_millis() as u64, "reconnecting");
                    if sleep_unless_stopped(&self.handle, delay).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Drive one connected session, then close it and report the disconnect
    async fn session(&mut self, mut connection: Connection) -> Result<SessionEnd> {
        let _ = self
            .handle
            .cell()
            .compare_and_set(&[ConsumerState::Starting], ConsumerState::Running);
        info!(url = %self.request.url, "stream connected");

        let result = self.read_loop(&mut connection).await;

        connection.close();
        let disconnected = self.call(|h, c| h.on_disconnect(c));

        match (result, disconnected) {
            (Err(err), Err(also)) => {
                warn!(error = %also, "on_disconnect failed after an earlier error");
                Err(err)
            }
            (Err(err), Ok(())) | (Ok(_), Err(err)) => Err(err),
            (Ok(end), Ok(())) => Ok(end),
        }
    }

    async fn read_loop(&mut self, connection: &mut Connection) -> Result<SessionEnd> {
        self.call(|h, c| h.on_connect(c))?;
        self.call(|h, c| h.on_header(c, connection.headers()))?;

        let poll = self.inner.config.read_poll_interval;
        let stall = self.inner.config.stall_timeout;
        let mut reader = FrameReader::new(self.inner.config.max_frame_size);

        loop {
            if !self.handle.is_running() {
                return Ok(SessionEnd::Stopped);
            }

            let next = tokio::select! {
                biased;
                _ = self.handle.cell().stop_requested() => return Ok(SessionEnd::Stopped),
                next = tokio::time::timeout(poll, reader.next_frame(connection.body_mut())) => next,
            };

            match next {
                Err(_tick) => {
                    let idle = reader.idle_for();
                    if idle >= stall {
                        warn!(idle_ms = idle.as_millis() as u64, "stream stalled");
                        return Ok(SessionEnd::Disconnected);
                    }
                }
                Ok(Ok(Some(frame))) => self.dispatch(frame)?,
                Ok(Ok(None)) => {
                    let stats = reader.stats();
                    info!(
                        frames = stats.frames,
                        heartbeats = stats.heartbeats,
                        bytes = stats.bytes,
                        "stream ended"
                    );
                    return Ok(SessionEnd::Disconnected);
                }
                Ok(Err(err)) if err.is_disconnect() => {
                    warn!(error = %err, "stream connection dropped");
                    return Ok(SessionEnd::Disconnected);
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "stream read failed");
                    self.fail(&err.to_string())?;
                    return Ok(SessionEnd::Stopped);
                }
            }
        }
    }

    fn dispatch(&mut self, frame: Frame) -> Result<()> {
        let value = match frame {
            Frame::Message { value, .. } => value,
            Frame::Malformed { raw, reason } => {
                debug!(%reason, "malformed frame");
                return self.fail(&format!("Failed to decode JSON: {raw}"));
            }
        };

        let message = classify(value, self.handle.hashes());
        debug!(kind = message.kind(), "dispatching message");

        match message {
            ClassifiedMessage::Interaction { payload, hash } => {
                self.call(|h, c| h.on_interaction(c, payload, &hash))
            }
            ClassifiedMessage::Deletion { payload, hash } => {
                self.call(|h, c| h.on_deleted(c, payload, &hash))
            }
            ClassifiedMessage::Warning { text } => self.call(|h, c| h.on_warning(c, &text)),
            ClassifiedMessage::Status { name, data } => {
                self.call(|h, c| h.on_status(c, &name, data))
            }
            fatal => {
                let text = fatal.error_text().unwrap_or_default();
                self.fail(&text)
            }
        }
    }

    /// Stop (if running) then report `message` through `on_error`
    fn fail(&mut self, message: &str) -> Result<()> {
        self.handle.request_stop();
        self.call(|h, c| h.on_error(c, message))
    }

    fn call<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn EventHandler, &ConsumerHandle) -> HandlerResult,
    {
        let handle = &self.handle;
        f(self.handler.get_mut(), handle).map_err(|err| {
            let _ = handle.cell().compare_and_set(
                &[ConsumerState::Starting, ConsumerState::Running],
                ConsumerState::Stopping,
            );
            Error::Handler(err)
        })
    }
}

/// Sleep for `delay`; true when a stop arrived first
async fn sleep_unless_stopped(handle: &ConsumerHandle, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = handle.cell().stop_requested() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}
