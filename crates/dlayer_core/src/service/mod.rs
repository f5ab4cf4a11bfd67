//! Use-case services on top of repositories.
//!
//! # Responsibility
//! - Offer caller-level entry points (record, recent, search) without
//!   exposing driver details.
//! - Describe the running service.

pub mod info;
pub mod log_service;
