pub mod indicators;
pub mod session;
pub mod user;

pub use indicators::{IndicatorReading, IndicatorSnapshot};
pub use session::{ChannelState, SessionInfo, SessionMode};
pub use user::{Report, User, UserRole, UserStatus};
