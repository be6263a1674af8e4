//! Mock Fiddle client backed by an in-memory store

use async_trait::async_trait;
use fiddle_api_contract::*;
use fiddle_client_api::{FiddleApi, FiddleApiError, FiddleApiResult};
use std::sync::Arc;

use crate::store::{MockScenario, MockStore, StoreError};

pub struct MockClient {
    store: Arc<MockStore>,
}

impl MockClient {
    pub fn new(scenario: MockScenario) -> Self {
        Self::from_store(Arc::new(MockStore::new(scenario)))
    }

    /// Share a store with a [`crate::MockServer`] or another client
    pub fn from_store(store: Arc<MockStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MockStore> {
        &self.store
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new(MockScenario::default())
    }
}

impl From<StoreError> for FiddleApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Invalid(errors) => FiddleApiError::Invalid(errors),
            StoreError::NotFound(id) => FiddleApiError::Server(format!("fiddle {id} not found")),
        }
    }
}

#[async_trait]
impl FiddleApi for MockClient {
    async fn create_fiddle(&self, input: &CreateFiddleInput) -> FiddleApiResult<Fiddle> {
        Ok(self.store.create(input).await?)
    }

    async fn update_fiddle(&self, input: &UpdateFiddleInput) -> FiddleApiResult<Fiddle> {
        Ok(self.store.update(input).await?)
    }

    async fn execute_fiddle(
        &self,
        input: &ExecuteFiddleInput,
    ) -> FiddleApiResult<ExecutionResult> {
        let session = self.store.execute(&input.id).await?;
        Ok(self
            .store
            .result(&session.fiddle_id, &session.session_id)
            .await?)
    }

    async fn delete_fiddle(&self, id: &str) -> bool {
        self.store.update(&UpdateFiddleInput::cleared(id)).await.is_ok()
    }
}
