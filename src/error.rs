use thiserror::Error;

use crate::channel::EventChannel;

/// Error types for the event-hub library
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Event stream error: {0}")]
    SseError(#[from] eventsource_client::Error),
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("No async runtime: {0}")]
    RuntimeError(#[from] tokio::runtime::TryCurrentError),
    #[error("Invalid {channel} payload: {source}")]
    PayloadError {
        channel: EventChannel,
        #[source]
        source: serde_json::Error,
    },
}
