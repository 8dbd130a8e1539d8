/// AstroTracker geolocation extraction library.
///
/// Messages are pulled from the Astrocast cloud API through a [`transport::MessageSource`],
/// their payloads are decoded by [`protocol`] into [`record::LocationRecord`]s (resolving raw
/// GNSS measurements over CloudLocate through a [`transport::PositionResolver`] when needed),
/// gathered by the [`collector`] into a time-ordered table and written out by [`export`].
use std::{sync::Once, time::Duration};

use thiserror::Error;

pub mod collector;
pub mod config;
pub mod coord;
pub mod export;
pub mod pipeline;
pub mod protocol;
pub mod record;
pub mod transport;

/// Result type for this library
pub type AGResult<T> = std::result::Result<T, Error>;

/// Error type for this library
#[derive(Debug, Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("No messages returned for this device and start date")]
    EmptyResult,
    #[error("Unsupported payload length: {len} bytes")]
    UnsupportedPayload { len: usize },
    #[error("Request envelope is {size} bytes, broker limit is {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid coordinate: {0}")]
    InvalidCoord(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to the message API or the MQTT broker. All of them end the run.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("MQTT: {0}")]
    Mqtt(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl From<nom::error::Error<&[u8]>> for Error {
    fn from(err: nom::error::Error<&[u8]>) -> Self {
        Error::Parse(format!("{:?}", err))
    }
}

/// Test binary helper to init tracing. This is usually the responsibility of the consumer of the
/// library crate.
pub fn lazy_init_tracing() {
    {
        static INIT: Once = Once::new();
        &INIT
    }
    .call_once(|| {
        tracing_subscriber::fmt::init();
    });
}
