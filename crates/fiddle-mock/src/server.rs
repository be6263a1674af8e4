//! HTTP mock of the Fiddle service

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use fiddle_api_contract::*;
use futures::stream::{self, StreamExt};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::store::{MockScenario, MockStore, StoreError};

/// Mock service bound to an ephemeral loopback port
///
/// The server stops when this handle is dropped.
pub struct MockServer {
    addr: SocketAddr,
    store: Arc<MockStore>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(scenario: MockScenario) -> std::io::Result<Self> {
        let store = Arc::new(MockStore::new(scenario));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let router = router(store.clone());
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "mock fiddle server error");
            }
        });

        tracing::info!(%addr, "mock fiddle server started");
        Ok(Self {
            addr,
            store,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base address to configure a client with
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn store(&self) -> &Arc<MockStore> {
        &self.store
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        // open SSE responses never finish on their own
        self.handle.abort();
    }
}

/// Routes of the Fiddle API backed by `store`
pub fn router(store: Arc<MockStore>) -> Router {
    Router::new()
        .route("/fiddle", post(create_fiddle))
        .route("/fiddle/{id}", put(update_fiddle))
        .route("/fiddle/{id}/execute", post(execute_fiddle))
        .route("/fiddle/{id}/result-stream/{session_id}", get(result_stream))
        .with_state(store)
}

async fn create_fiddle(
    State(store): State<Arc<MockStore>>,
    Json(input): Json<CreateFiddleInput>,
) -> Response {
    envelope_response(store.create(&input).await)
}

async fn update_fiddle(
    State(store): State<Arc<MockStore>>,
    Path(id): Path<String>,
    Json(mut input): Json<UpdateFiddleInput>,
) -> Response {
    input.id = id;
    envelope_response(store.update(&input).await)
}

async fn execute_fiddle(
    State(store): State<Arc<MockStore>>,
    Path(id): Path<String>,
) -> Response {
    match store.execute(&id).await {
        Ok(session) => Json(session).into_response(),
        Err(e) => (StatusCode::NOT_FOUND, Json(e.envelope())).into_response(),
    }
}

async fn result_stream(
    State(store): State<Arc<MockStore>>,
    Path((id, session_id)): Path<(String, String)>,
) -> Response {
    let result = match store.result(&id, &session_id).await {
        Ok(result) => result,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };
    let scenario = store.scenario();

    let mut events: Vec<Event> = (0..scenario.progress_events)
        .map(|seq| {
            Event::default()
                .event("updateProgress")
                .data(serde_json::json!({ "seq": seq }).to_string())
        })
        .collect();
    if scenario.malformed_result_first {
        events.push(Event::default().event(TERMINAL_EVENT).data("{\"id\": "));
    }
    events.push(
        Event::default()
            .event(TERMINAL_EVENT)
            .data(serde_json::to_string(&result).unwrap_or_default()),
    );

    // the real service keeps the stream open after the result
    let stream =
        stream::iter(events.into_iter().map(Ok::<_, Infallible>)).chain(stream::pending());

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn envelope_response(outcome: Result<Fiddle, StoreError>) -> Response {
    match outcome {
        Ok(fiddle) => Json(FiddleEnvelope::valid(fiddle)).into_response(),
        Err(e @ StoreError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(e.envelope())).into_response()
        }
        Err(e) => Json(e.envelope()).into_response(),
    }
}
