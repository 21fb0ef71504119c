use serde::Deserialize;

use crate::models::IndicatorReading;

/// Typed event produced by the analysis channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Indicator {
        reading: IndicatorReading,
        frame: Option<String>,
    },
    Completed,
    Error(String),
    /// Transport closed without the service saying why.
    Closed,
    /// A payload that did not match the inbound schema.
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    indicators: Option<serde_json::Value>,
    #[serde(default)]
    frame: Option<String>,
}

const STATUS_COMPLETED: &str = "completed";

/// Parses one text frame. `error` wins over `status`, which wins over `indicators`.
pub fn parse_message(text: &str) -> ChannelEvent {
    let message: InboundMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => return ChannelEvent::Malformed(format!("invalid JSON payload: {err}")),
    };

    if let Some(error) = message.error {
        return ChannelEvent::Error(error);
    }

    if message.status.as_deref() == Some(STATUS_COMPLETED) {
        return ChannelEvent::Completed;
    }

    let Some(indicators) = message.indicators else {
        return ChannelEvent::Malformed("payload carries no indicators".into());
    };

    let reading: IndicatorReading = match serde_json::from_value(indicators) {
        Ok(reading) => reading,
        Err(err) => return ChannelEvent::Malformed(format!("invalid indicators: {err}")),
    };

    if let Err(reason) = reading.validate() {
        return ChannelEvent::Malformed(reason);
    }

    ChannelEvent::Indicator {
        reading,
        frame: message.frame.filter(|frame| !frame.is_empty()),
    }
}
