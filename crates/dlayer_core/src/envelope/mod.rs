//! Result envelope carried across the repository stream boundary.
//!
//! # Responsibility
//! - Give every emission one uniform shape: a value or an error plus
//!   optional metadata.
//! - Render envelopes and errors as JSON for logs and callers.
//!
//! # Invariants
//! - An envelope with an error is never a success, even if a value is set.
//! - Unset timestamps compare equal only to unset timestamps.

use chrono::{DateTime, FixedOffset, Local};

pub mod error;
pub mod op_result;

pub use error::{AccessError, StatusError, NOT_FOUND_CODE, NOT_FOUND_MESSAGE};
pub use op_result::OpResult;

/// Current local time with its UTC offset.
pub fn now() -> DateTime<FixedOffset> {
    Local::now().into()
}
