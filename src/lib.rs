//! Client-side hub for a server-sent event stream.
//!
//! [`EventHub`] keeps at most one connection to the server's `/events`
//! endpoint, reports its health as a [`ConnectionState`] to observers, and
//! routes each typed message to the callbacks subscribed to its channel.
//!
//! ```no_run
//! use event_hub::{EventChannel, EventHub, HubConfig, HubEvent};
//!
//! # async fn run() -> Result<(), event_hub::HubError> {
//! let hub = EventHub::new(HubConfig::new("http://localhost:8080"))?;
//!
//! hub.on_connection_state_change(|state| println!("stream is {}", state));
//! hub.subscribe(EventChannel::Alert, |event| {
//!     if let HubEvent::Alert(alert) = event {
//!         println!("alert: {:?}", alert.severity);
//!     }
//! });
//!
//! hub.connect();
//! # Ok(())
//! # }
//! ```

mod channel;
mod config;
mod connection;
mod error;
mod event;
mod hub;
mod message;
mod registry;
mod transport;

pub use channel::EventChannel;
pub use config::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_EVENTS_PATH, HubConfig};
pub use connection::ConnectionState;
pub use error::HubError;
pub use event::{Alert, ConnectedEvent, HubEvent, OptimizationResult, Severity, UsageUpdate};
pub use hub::{EventHub, ObserverId, SubscriptionId};
pub use message::Frame;
pub use transport::{EVENT_STREAM_MIME, FrameStream, SseTransport, Transport};
