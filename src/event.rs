use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::channel::EventChannel;
use crate::error::HubError;

/// A decoded server-pushed message, one variant per routed channel.
///
/// Any JSON object decodes. Modelled fields are read leniently: a field that
/// is missing or holds an unexpected type reads as `None`, and field-level
/// validation is left to subscribers. Unmodelled fields stay in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HubEvent {
    Connected(ConnectedEvent),
    UsageUpdate(UsageUpdate),
    OptimizationResult(OptimizationResult),
    Alert(Alert),
}

/// Greeting sent by the server once the stream is live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedEvent {
    #[serde(default, deserialize_with = "lenient_text")]
    pub client_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Usage counters for a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageUpdate {
    #[serde(default, deserialize_with = "lenient_text")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub cost: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub original_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub optimized_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub savings: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub recommendation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default, deserialize_with = "lenient_severity")]
    pub severity: Option<Severity>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Alert level. Levels the hub does not know are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    Other(String),
}

impl Severity {
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Other(label.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Other(label) => label,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    })
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|value| *value >= 0.0 && value.fract() == 0.0)
                .map(|value| value as u64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_severity<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Severity>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(label) => Some(Severity::from_label(&label)),
        _ => None,
    })
}

impl HubEvent {
    /// Parse the raw payload of a message on `channel`. Fails only when the
    /// payload is not a JSON object.
    pub fn decode(channel: EventChannel, data: &str) -> Result<Self, HubError> {
        let invalid = |source| HubError::PayloadError { channel, source };

        let event = match channel {
            EventChannel::Connected => {
                HubEvent::Connected(serde_json::from_str(data).map_err(invalid)?)
            }
            EventChannel::UsageUpdate => {
                HubEvent::UsageUpdate(serde_json::from_str(data).map_err(invalid)?)
            }
            EventChannel::OptimizationResult => {
                HubEvent::OptimizationResult(serde_json::from_str(data).map_err(invalid)?)
            }
            EventChannel::Alert => HubEvent::Alert(serde_json::from_str(data).map_err(invalid)?),
        };

        Ok(event)
    }

    pub fn channel(&self) -> EventChannel {
        match self {
            HubEvent::Connected(_) => EventChannel::Connected,
            HubEvent::UsageUpdate(_) => EventChannel::UsageUpdate,
            HubEvent::OptimizationResult(_) => EventChannel::OptimizationResult,
            HubEvent::Alert(_) => EventChannel::Alert,
        }
    }
}
