//! Records persisted through the driver layer.
//!
//! # Responsibility
//! - Define the `Record` contract every repository entity satisfies.
//! - Hold the concrete entity types (currently log entries).
//!
//! # Invariants
//! - A record identifier is either unset or a well-formed `RecordId`.
//! - Documents store the identifier under `_id`, never under `id`.

pub mod log_entry;
pub mod record;
