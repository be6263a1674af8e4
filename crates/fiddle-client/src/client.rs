//! Main Fiddle client implementation

use fiddle_api_contract::*;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client as HttpClient, Method, Response};

use crate::config::ClientConfig;
use crate::error::{FiddleError, FiddleResult};
use crate::sse::SseEventSource;
use crate::stream::{consume_result, StreamOutcome};

/// A single request to the Fiddle service. No defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct RequestInput {
    /// Path appended to the client address, including any query string
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl RequestInput {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// Client for the Fastly Fiddle service
#[derive(Debug, Clone)]
pub struct FiddleClient {
    http_client: HttpClient,
    config: ClientConfig,
}

impl FiddleClient {
    /// Create a new client with its own HTTP client
    pub fn new(config: ClientConfig) -> FiddleResult<Self> {
        let http_client = HttpClient::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(FiddleError::HttpClient)?;

        Ok(Self::with_http_client(http_client, config))
    }

    /// Create a client against the production Fiddle address
    pub fn default_client() -> FiddleResult<Self> {
        Self::new(ClientConfig::default())
    }

    /// Create a client around a caller-configured HTTP client
    pub fn with_http_client(http_client: HttpClient, config: ClientConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Create a client from an address string, keeping other defaults
    pub fn from_url(address: &str) -> FiddleResult<Self> {
        let address = url::Url::parse(address)?;
        Self::new(ClientConfig::default().with_address(address))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the base address
    pub fn address(&self) -> &url::Url {
        &self.config.address
    }

    /// Create a new fiddle
    pub async fn create_fiddle(&self, input: &CreateFiddleInput) -> FiddleResult<Fiddle> {
        let body = serde_json::to_vec(input)?;
        let request = RequestInput::new("/fiddle")
            .with_headers(json_headers())
            .with_body(body);

        let response = self.post(request).await?;
        let fiddle = read_fiddle(response).await?;
        tracing::debug!(fiddle_id = %fiddle.id, "created fiddle");
        Ok(fiddle)
    }

    /// Replace the definition of an existing fiddle
    pub async fn update_fiddle(&self, input: &UpdateFiddleInput) -> FiddleResult<Fiddle> {
        let body = serde_json::to_vec(input)?;
        let request = RequestInput::new(format!("/fiddle/{}", input.id))
            .with_headers(json_headers())
            .with_body(body);

        let response = self.put(request).await?;
        let fiddle = read_fiddle(response).await?;
        tracing::debug!(fiddle_id = %fiddle.id, "updated fiddle");
        Ok(fiddle)
    }

    /// Run a fiddle and wait for its result
    ///
    /// A zero-valued result means the stream ran out of attempts.
    pub async fn execute_fiddle(
        &self,
        input: &ExecuteFiddleInput,
    ) -> FiddleResult<ExecutionResult> {
        let session = self.start_execution(input).await?;
        self.stream_result(&session).await
    }

    /// Start an execution and return its session without waiting for the result
    pub async fn start_execution(
        &self,
        input: &ExecuteFiddleInput,
    ) -> FiddleResult<ExecutionSession> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let request = RequestInput::new(format!("/fiddle/{}/execute?cacheID=1", input.id))
            .with_headers(headers);

        let response = self.post(request).await?;
        let status = response.status();
        let text = response.text().await.map_err(FiddleError::Body)?;

        if !status.is_success() {
            return Err(FiddleError::ServerError { status, body: text });
        }

        let mut session: ExecutionSession = serde_json::from_str(&text)?;
        if session.session_id.is_empty() {
            return Err(FiddleError::MissingSession);
        }
        session.fiddle_id = input.id.clone();

        tracing::debug!(
            fiddle_id = %session.fiddle_id,
            session_id = %session.session_id,
            "started fiddle execution"
        );
        Ok(session)
    }

    /// Consume the result stream of an execution session
    pub async fn stream_result(&self, session: &ExecutionSession) -> FiddleResult<ExecutionResult> {
        self.stream_outcome(session)
            .await
            .map(StreamOutcome::into_result)
    }

    /// Like [`Self::stream_result`], but reports whether the budget ran out
    pub async fn stream_outcome(&self, session: &ExecutionSession) -> FiddleResult<StreamOutcome> {
        let url = self.config.endpoint(&format!(
            "/fiddle/{}/result-stream/{}",
            session.fiddle_id, session.session_id
        ));
        let mut source = SseEventSource::subscribe(&url)?;
        consume_result(&mut source, &self.config.stream).await
    }

    /// "Delete" a fiddle by clearing its content and forcing cache purges
    ///
    /// Best effort: returns `false` if the clearing update failed.
    pub async fn delete_fiddle(&self, id: &str) -> bool {
        match self.update_fiddle(&UpdateFiddleInput::cleared(id)).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(fiddle_id = id, error = %e, "failed to delete fiddle");
                false
            }
        }
    }

    /// Send a POST request
    pub async fn post(&self, input: RequestInput) -> FiddleResult<Response> {
        self.request(Method::POST, input).await
    }

    /// Send a PUT request
    pub async fn put(&self, input: RequestInput) -> FiddleResult<Response> {
        self.request(Method::PUT, input).await
    }

    /// Send one request and return the raw response
    pub async fn request(&self, method: Method, input: RequestInput) -> FiddleResult<Response> {
        let url = self.config.endpoint(&input.path);
        tracing::debug!(%method, %url, "sending fiddle request");

        let mut request = self.http_client.request(method, &url).headers(input.headers);
        if let Some(body) = input.body {
            request = request.body(body);
        }

        Ok(request.send().await?)
    }
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Interpret a create/update response envelope
async fn read_fiddle(response: Response) -> FiddleResult<Fiddle> {
    let status = response.status();
    let text = response.text().await.map_err(FiddleError::Body)?;

    let envelope = match serde_json::from_str::<FiddleEnvelope>(&text) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(FiddleError::ServerError { status, body: text });
        }
        Err(e) => return Err(e.into()),
    };

    if !envelope.valid {
        return Err(FiddleError::Invalid {
            errors: envelope.errors,
        });
    }
    if !status.is_success() {
        return Err(FiddleError::ServerError { status, body: text });
    }

    Ok(envelope.fiddle)
}
