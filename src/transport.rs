use async_trait::async_trait;
use eventsource_client::{self as es, Client};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::HubConfig;
use crate::error::HubError;
use crate::message::Frame;

pub const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Frames read from an open transport. The stream ending means the server
/// closed the connection; dropping it closes the transport.
pub type FrameStream = BoxStream<'static, Result<Frame, HubError>>;

/// A server-push connection the hub can open
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection, resolving once the server has accepted it
    async fn open(&self) -> Result<FrameStream, HubError>;
}

/// Server-sent events over HTTP.
///
/// The stream counts as open once the server sends its first event or
/// keep-alive comment within the connect timeout. Built-in reconnection is
/// turned off; retrying is up to whoever observes the hub.
pub struct SseTransport {
    endpoint: Url,
    open_timeout: Duration,
    client: Box<dyn Client + Send + Sync>,
}

impl SseTransport {
    pub fn new(config: &HubConfig) -> Result<Self, HubError> {
        let endpoint = config.endpoint()?;

        let mut builder = es::ClientBuilder::for_url(endpoint.as_str())?
            .header("Accept", EVENT_STREAM_MIME)?
            .header("Cache-Control", "no-cache")?;
        for (name, value) in &config.headers {
            builder = builder
                .header(name, value)
                .map_err(|e| HubError::ConfigError(format!("invalid header {}: {}", name, e)))?;
        }

        let client = builder
            .reconnect(es::ReconnectOptions::reconnect(false).build())
            .build();

        Ok(Self {
            endpoint,
            open_timeout: config.connect_timeout(),
            client: Box::new(client),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(&self) -> Result<FrameStream, HubError> {
        info!("Opening event stream at {}", self.endpoint);

        let mut events = self.client.stream();

        let first = match tokio::time::timeout(self.open_timeout, events.next()).await {
            Ok(Some(Ok(first))) => first,
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(None) => {
                return Err(HubError::ConnectionError(
                    "event stream ended before opening".to_string(),
                ));
            }
            Err(_) => {
                return Err(HubError::ConnectionError(format!(
                    "no response from event stream within {:?}",
                    self.open_timeout
                )));
            }
        };

        debug!("Event stream open at {}", self.endpoint);

        let frames = stream::once(async move { Ok::<_, es::Error>(first) })
            .chain(events)
            .filter_map(|item| async move {
                match item {
                    Ok(es::SSE::Event(event)) => Some(Ok(Frame::from(event))),
                    // keep-alive
                    Ok(es::SSE::Comment(_)) => None,
                    Err(e) => Some(Err(HubError::from(e))),
                }
            });

        Ok(frames.boxed())
    }
}
