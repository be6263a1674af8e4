//! Fastly Fiddle API contract types
//!
//! This crate defines the request and response bodies exchanged with the
//! Fiddle service. These types are shared between the HTTP client, the mock
//! service and any consumer that wants to build inputs without pulling in
//! the transport.

pub mod types;

pub use types::*;

/// Event type carried by the stream event that holds the finished execution result.
///
/// The service may decorate the name, so consumers match it as a substring.
pub const TERMINAL_EVENT: &str = "updateResult";
