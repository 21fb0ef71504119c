//! Session orchestration: one analysis stream at a time, its counters, its
//! sentinel and the alarm, published to whoever is watching.

pub mod controller;
pub mod events;
mod session;
pub mod state;

pub use controller::MonitorController;
pub use events::{CloseReason, EventEmitter, MonitorEvent, Notice, NoticeKind};
pub use state::SessionView;
