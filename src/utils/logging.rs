//! Logging macros gated on a per-module `ENABLE_LOGS` switch.
//!
//! Hot paths (the channel reader, the frame painter) log on every message. The
//! macros let a module mute itself without touching the global `RUST_LOG` filter:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = false;
//!
//! use crate::{log_debug, log_info};
//!
//! log_info!("only printed when ENABLE_LOGS is true");
//! ```

/// `log::debug!` when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// `log::info!` when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// `log::warn!` when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}
