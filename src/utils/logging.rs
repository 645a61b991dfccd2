//! Logging macros for hot loops that can be silenced per module.
//!
//! A module opts in by declaring the switch next to its imports:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_error, log_info, log_warn};
//! ```
//!
//! Flipping the constant to `false` compiles the calls away without touching the
//! global `RUST_LOG` filter.

#[doc(hidden)]
#[macro_export]
macro_rules! __log_gated {
    ($level:ident, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::$level!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::__log_gated!(info, $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::__log_gated!(warn, $($arg)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::__log_gated!(error, $($arg)*) };
}
