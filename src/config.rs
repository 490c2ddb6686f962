use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::HubError;

pub const DEFAULT_EVENTS_PATH: &str = "/events";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Settings for the default server-sent events transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    pub base_url: String,
    #[serde(default = "default_events_path")]
    pub events_path: String,
    /// Static headers sent with every stream request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// How long to wait for the first bytes of the stream
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_events_path() -> String {
    DEFAULT_EVENTS_PATH.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl HubConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            events_path: default_events_path(),
            headers: BTreeMap::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Set the path of the event stream, relative to the base URL
    pub fn with_events_path(mut self, path: &str) -> Self {
        self.events_path = path.to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs();
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Full URL of the event stream
    pub fn endpoint(&self) -> Result<Url, HubError> {
        let base = Url::parse(&self.base_url)?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(HubError::ConfigError(format!(
                "unsupported scheme for event stream: {}",
                base.scheme()
            )));
        }

        Ok(base.join(&self.events_path)?)
    }
}
