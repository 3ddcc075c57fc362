//! Logging macros gated by a per-module `ENABLE_LOGS` flag.
//!
//! State machines log every transition; modules flip their flag off when
//! that gets too chatty without touching `RUST_LOG` for the whole crate.
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! crate::log_info!("offer accepted for {}", kind.as_str());
//! ```

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Requires `const ENABLE_LOGS: bool` in the calling module.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
