//! In-memory fiddle and session store

use fiddle_api_contract::*;
use serde_json::json;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Shape of the event stream the mock pushes for each execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockScenario {
    /// Progress events sent before the result
    pub progress_events: usize,
    /// Send an undecodable `updateResult` event before the real one
    pub malformed_result_first: bool,
}

impl Default for MockScenario {
    fn default() -> Self {
        Self {
            progress_events: 3,
            malformed_result_first: false,
        }
    }
}

impl MockScenario {
    pub fn with_progress_events(mut self, progress_events: usize) -> Self {
        self.progress_events = progress_events;
        self
    }

    pub fn with_malformed_result_first(mut self, malformed: bool) -> Self {
        self.malformed_result_first = malformed;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    NotFound(String),
    Invalid(serde_json::Value),
}

impl StoreError {
    /// Response envelope the service answers with for this error
    pub fn envelope(&self) -> FiddleEnvelope {
        match self {
            StoreError::NotFound(id) => {
                FiddleEnvelope::invalid(json!({ "id": format!("Fiddle {id} not found") }))
            }
            StoreError::Invalid(errors) => FiddleEnvelope::invalid(errors.clone()),
        }
    }
}

#[derive(Default)]
struct State {
    fiddles: HashMap<String, UpdateFiddleInput>,
    // session id -> fiddle id
    sessions: HashMap<String, String>,
}

pub struct MockStore {
    scenario: MockScenario,
    state: Mutex<State>,
}

impl MockStore {
    pub fn new(scenario: MockScenario) -> Self {
        Self {
            scenario,
            state: Mutex::new(State::default()),
        }
    }

    pub fn scenario(&self) -> &MockScenario {
        &self.scenario
    }

    pub async fn create(&self, input: &CreateFiddleInput) -> Result<Fiddle, StoreError> {
        validate_origins(&input.origins)?;

        let id = uuid::Uuid::new_v4().simple().to_string();
        let definition = UpdateFiddleInput::from_create(id.clone(), input.clone());
        self.state.lock().await.fiddles.insert(id.clone(), definition);

        tracing::debug!(fiddle_id = %id, "mock created fiddle");
        Ok(Fiddle {
            id,
            ..Fiddle::default()
        })
    }

    pub async fn update(&self, input: &UpdateFiddleInput) -> Result<Fiddle, StoreError> {
        let mut state = self.state.lock().await;
        let stored = state
            .fiddles
            .get_mut(&input.id)
            .ok_or_else(|| StoreError::NotFound(input.id.clone()))?;
        validate_origins(&input.origins)?;
        *stored = input.clone();

        Ok(Fiddle {
            id: input.id.clone(),
            ..Fiddle::default()
        })
    }

    pub async fn execute(&self, id: &str) -> Result<ExecutionSession, StoreError> {
        let mut state = self.state.lock().await;
        if !state.fiddles.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        state.sessions.insert(session_id.clone(), id.to_string());
        Ok(ExecutionSession::new(id, session_id))
    }

    /// Result of a started execution
    pub async fn result(
        &self,
        fiddle_id: &str,
        session_id: &str,
    ) -> Result<ExecutionResult, StoreError> {
        let state = self.state.lock().await;
        match state.sessions.get(session_id) {
            Some(owner) if owner == fiddle_id => {}
            _ => return Err(StoreError::NotFound(session_id.to_string())),
        }
        let definition = state
            .fiddles
            .get(fiddle_id)
            .ok_or_else(|| StoreError::NotFound(fiddle_id.to_string()))?;

        Ok(simulate(definition))
    }

    /// Current definition of a fiddle
    pub async fn definition(&self, id: &str) -> Option<UpdateFiddleInput> {
        self.state.lock().await.fiddles.get(id).cloned()
    }
}

fn validate_origins(origins: &[String]) -> Result<(), StoreError> {
    let problems: Vec<String> = origins
        .iter()
        .filter(|origin| match url::Url::parse(origin) {
            Ok(url) => !matches!(url.scheme(), "http" | "https"),
            Err(_) => true,
        })
        .map(|origin| format!("{origin} is not an http(s) URL"))
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Invalid(json!({ "origins": problems })))
    }
}

/// Trace of a single request through one edge node
fn simulate(definition: &UpdateFiddleInput) -> ExecutionResult {
    let path = if definition.req_url.is_empty() {
        "/"
    } else {
        definition.req_url.as_str()
    };
    let method = if definition.req_method.is_empty() {
        "GET"
    } else {
        definition.req_method.as_str()
    };
    let origin = definition.origins.first();
    let (status, preview) = match origin {
        Some(origin) => (200, format!("<html>response from {origin}</html>")),
        None => (503, "No origin configured".to_string()),
    };

    let server = EdgeServer {
        datacenter: "LCY".into(),
        node_id: "cache-lcy19120".into(),
    };
    let reqkey = uuid::Uuid::new_v4().simple().to_string();
    let started = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();

    let mut events = vec![TraceEvent {
        name: "recv".into(),
        reqkey: reqkey.clone(),
        time: started.to_string(),
        server: server.clone(),
        restarts: Some(0),
        url: Some(path.to_string()),
        is_esi: Some(false),
        return_value: Some("lookup".into()),
        ..TraceEvent::default()
    }];
    let mut origin_fetches = HashMap::new();
    if let Some(origin) = origin {
        events.push(TraceEvent {
            name: "fetch".into(),
            reqkey: reqkey.clone(),
            time: started.to_string(),
            server: server.clone(),
            url: Some(format!("{}{}", origin.trim_end_matches('/'), path)),
            status: Some(status),
            state: Some("MISS".into()),
            ..TraceEvent::default()
        });
        origin_fetches.insert(reqkey.clone(), json!({ "origin": origin, "status": status }));
    }
    events.push(TraceEvent {
        name: "deliver".into(),
        reqkey,
        time: started.to_string(),
        server,
        status: Some(status),
        hits: Some(0),
        edge_dc: Some("LCY".into()),
        ..TraceEvent::default()
    });

    ExecutionResult {
        id: definition.id.clone(),
        start_time: started.to_string(),
        status,
        client_fetch: ClientFetch {
            req: format!("{method} {path} HTTP/1.1"),
            resp: format!("HTTP/1.1 {status}"),
        },
        origin_fetches,
        resp_body_is_text: true,
        resp_body_type: "text/html".into(),
        resp_body_bytes_received: preview.len() as u64,
        resp_body_chunk_count: 1,
        resp_body_preview: preview,
        resp_complete: true,
        events,
    }
}
