//! Client API trait for the Fiddle service
//!
//! Consumers program against [`FiddleApi`] so the HTTP client and the
//! in-memory mock are interchangeable.

use async_trait::async_trait;
use fiddle_api_contract::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FiddleApiError {
    #[error("Fiddle not valid! {0}")]
    Invalid(serde_json::Value),
    #[error("server error: {0}")]
    Server(String),
    #[error("unexpected: {0}")]
    Unexpected(String),
}

pub type FiddleApiResult<T> = Result<T, FiddleApiError>;

#[async_trait]
pub trait FiddleApi: Send + Sync {
    async fn create_fiddle(&self, input: &CreateFiddleInput) -> FiddleApiResult<Fiddle>;

    async fn update_fiddle(&self, input: &UpdateFiddleInput) -> FiddleApiResult<Fiddle>;

    /// Run the fiddle and wait for its result.
    ///
    /// A zero-valued result means no terminal event arrived in time.
    async fn execute_fiddle(&self, input: &ExecuteFiddleInput)
        -> FiddleApiResult<ExecutionResult>;

    /// Best-effort removal; `false` when the underlying update failed.
    async fn delete_fiddle(&self, id: &str) -> bool;
}
