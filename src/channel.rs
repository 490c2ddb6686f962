use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// Channels the hub routes. Any other tag on the wire is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventChannel {
    Connected,
    UsageUpdate,
    OptimizationResult,
    Alert,
}

impl EventChannel {
    pub const ALL: [EventChannel; 4] = [
        EventChannel::Connected,
        EventChannel::UsageUpdate,
        EventChannel::OptimizationResult,
        EventChannel::Alert,
    ];

    /// Wire tag of the channel
    pub fn name(&self) -> &'static str {
        match self {
            EventChannel::Connected => "connected",
            EventChannel::UsageUpdate => "usage_update",
            EventChannel::OptimizationResult => "optimization_result",
            EventChannel::Alert => "alert",
        }
    }

    /// Look up a wire tag, `None` for tags this hub does not route
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|channel| channel.name() == tag)
    }
}

impl fmt::Display for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventChannel {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| HubError::ConfigError(format!("unknown channel: {}", s)))
    }
}
