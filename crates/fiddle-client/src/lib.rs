//! HTTP client for the Fastly Fiddle service
//!
//! This crate creates, updates, executes and "deletes" fiddles over the
//! service's JSON API, and follows the per-execution event stream until the
//! finished result is pushed.

pub mod client;
pub mod config;
pub mod error;
pub mod sse;
pub mod stream;

pub use client::*;
pub use config::*;
pub use error::*;
pub use sse::{EventSource, SseEventSource, StreamEvent};
pub use stream::{consume_result, StreamOutcome};

use async_trait::async_trait;
use fiddle_api_contract::*;
use fiddle_client_api::{FiddleApi, FiddleApiResult};

#[async_trait]
impl FiddleApi for client::FiddleClient {
    async fn create_fiddle(&self, input: &CreateFiddleInput) -> FiddleApiResult<Fiddle> {
        self.create_fiddle(input).await.map_err(Into::into)
    }

    async fn update_fiddle(&self, input: &UpdateFiddleInput) -> FiddleApiResult<Fiddle> {
        self.update_fiddle(input).await.map_err(Into::into)
    }

    async fn execute_fiddle(
        &self,
        input: &ExecuteFiddleInput,
    ) -> FiddleApiResult<ExecutionResult> {
        self.execute_fiddle(input).await.map_err(Into::into)
    }

    async fn delete_fiddle(&self, id: &str) -> bool {
        self.delete_fiddle(id).await
    }
}
