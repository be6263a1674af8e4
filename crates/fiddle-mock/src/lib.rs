//! Test doubles for the Fiddle service
//!
//! [`MockStore`] holds fiddles and execution sessions in memory.
//! [`MockServer`] exposes it over the real HTTP and SSE endpoints, while
//! [`MockClient`] implements the client trait directly on top of it.

pub mod client;
pub mod server;
pub mod store;

pub use client::MockClient;
pub use server::MockServer;
pub use store::{MockScenario, MockStore, StoreError};
