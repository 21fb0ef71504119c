pub mod connection;
pub mod endpoint;
pub mod messages;

pub use connection::{ChannelConnector, ChannelHandle, WebSocketConnector};
pub use endpoint::AnalysisEndpoint;
pub use messages::{parse_message, ChannelEvent};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid analysis endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("could not connect to the analysis server at {url}: {reason}")]
    Connect { url: String, reason: String },
}
