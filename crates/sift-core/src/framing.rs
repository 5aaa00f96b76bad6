//! Newline-delimited frame reader
//!
//! The stream body is a sequence of JSON documents separated by `\n`
//! (optionally `\r\n`). Blank lines are keep-alive heartbeats and never
//! surface as frames.

use bytes::BytesMut;
use futures::{Stream, StreamExt};
use siftstream_domain::Frame;
use tokio::time::Instant;

use crate::error::ReadError;

const DELIMITER: u8 = b'\n';

/// Counters kept by a [`FrameReader`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames returned, malformed ones included
    pub frames: u64,
    /// Blank keep-alive lines skipped
    pub heartbeats: u64,
    /// Body bytes received
    pub bytes: u64,
}

/// Cuts a byte stream into [`Frame`]s
///
/// Partial lines stay buffered in the reader between calls, so a
/// `next_frame` future may be dropped at its await point (for example by a
/// timeout) without losing data.
#[derive(Debug)]
pub struct FrameReader {
    buffer: BytesMut,
    /// Leading bytes of `buffer` already known to hold no delimiter
    scanned: usize,
    max_frame_size: usize,
    stats: FrameStats,
    finished: bool,
    last_activity: Instant,
}

impl FrameReader {
    /// Create a reader rejecting lines longer than `max_frame_size`
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            scanned: 0,
            max_frame_size,
            stats: FrameStats::default(),
            finished: false,
            last_activity: Instant::now(),
        }
    }

    /// Read the next frame from `body`
    ///
    /// Returns `Ok(None)` once the body has ended and every buffered frame
    /// has been returned. Unterminated trailing data is decoded as a final
    /// frame.
    pub async fn next_frame<S>(&mut self, body: &mut S) -> Result<Option<Frame>, ReadError>
    where
        S: Stream<Item = Result<bytes::Bytes, ReadError>> + Unpin + ?Sized,
    {
        loop {
            if let Some(frame) = self.take_buffered()? {
                return Ok(Some(frame));
            }
            if self.finished {
                return Ok(self.take_trailing());
            }

            match body.next().await {
                Some(Ok(chunk)) => {
                    self.last_activity = Instant::now();
                    self.stats.bytes += chunk.len() as u64;
                    self.buffer.extend_from_slice(&chunk);
                }
                Some(Err(err)) => return Err(err),
                None => self.finished = true,
            }
        }
    }

    /// Time since the last chunk arrived (heartbeats included)
    pub fn idle_for(&self) -> std::time::Duration {
        self.last_activity.elapsed()
    }

    /// Counters since the reader was created
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// True once the body has reported end of stream
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn take_buffered(&mut self) -> Result<Option<Frame>, ReadError> {
        while let Some(offset) = self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == DELIMITER)
        {
            let pos = self.scanned + offset;
            self.scanned = 0;
            let line = self.buffer.split_to(pos + 1);
            let line = line[..pos].trim_ascii();

            if line.is_empty() {
                self.stats.heartbeats += 1;
                continue;
            }
            if line.len() > self.max_frame_size {
                return Err(ReadError::FrameTooLarge {
                    size: line.len(),
                    limit: self.max_frame_size,
                });
            }

            self.stats.frames += 1;
            return Ok(Some(Frame::decode(line)));
        }

        self.scanned = self.buffer.len();
        if self.buffer.len() > self.max_frame_size {
            return Err(ReadError::FrameTooLarge {
                size: self.buffer.len(),
                limit: self.max_frame_size,
            });
        }
        Ok(None)
    }

    fn take_trailing(&mut self) -> Option<Frame> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = self.buffer.split();
        self.scanned = 0;
        let line = rest[..].trim_ascii();
        if line.is_empty() {
            return None;
        }
        self.stats.frames += 1;
        Some(Frame::decode(line))
    }
}
