//! Consumer factory
//!
//! Maps a protocol name to the consumer implementation serving it.

use std::{fmt, str::FromStr, sync::Arc};

use siftstream_domain::{Credentials, StreamHashes};

use super::{EventHandler, StreamConsumer};
use crate::{Error, Result, config::ClientConfig, connection::HttpConnector};

/// Transport a consumer streams over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConsumerType {
    /// Long-lived chunked HTTP GET
    #[default]
    Http,
}

impl ConsumerType {
    /// Protocol name as accepted by [`FromStr`]
    pub fn as_str(self) -> &'static str {
        match self {
            ConsumerType::Http => "http",
        }
    }
}

impl FromStr for ConsumerType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(ConsumerType::Http),
            _ => Err(Error::UnsupportedProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for ConsumerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StreamConsumer {
    /// Create a consumer for the protocol named `consumer_type`
    ///
    /// Unknown protocol names fail with [`Error::UnsupportedProtocol`].
    pub fn factory<H>(
        consumer_type: &str,
        config: ClientConfig,
        credentials: Credentials,
        hashes: StreamHashes,
        handler: H,
    ) -> Result<Self>
    where
        H: EventHandler,
    {
        Self::of_type(
            consumer_type.parse()?,
            config,
            credentials,
            hashes,
            handler,
        )
    }

    /// Create a consumer for a known protocol
    pub fn of_type<H>(
        consumer_type: ConsumerType,
        config: ClientConfig,
        credentials: Credentials,
        hashes: StreamHashes,
        handler: H,
    ) -> Result<Self>
    where
        H: EventHandler,
    {
        match consumer_type {
            ConsumerType::Http => {
                let connector = Arc::new(HttpConnector::new(&config)?);
                Self::with_connector(config, credentials, hashes, handler, connector)
            }
        }
    }
}
