//! Asynchronous repositories over the driver traits.
//!
//! # Responsibility
//! - Translate entity operations (find many, find by id, save) into driver
//!   calls on a blocking task.
//! - Stream outcomes back through a bounded `ResultStream`.
//!
//! # Invariants
//! - One spawned task per operation; no state shared between invocations
//!   other than the database handle.
//! - Stream closure is the only completion signal; an error result is always
//!   the last emission.
//! - Every cursor is closed exactly once, on every exit path.
//! - Dropping the stream stops the producer at its next send.

pub mod log_repo;
pub mod record_repo;
pub mod stream;
