//! Server-Sent Events (SSE) subscription support

use async_trait::async_trait;
use eventsource_client as es;
use eventsource_client::Client as _;
use futures::stream::BoxStream;
use futures::TryStreamExt;

use crate::error::{FiddleError, FiddleResult};

/// A single pushed event: its type tag and raw payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub event_type: String,
    pub data: String,
}

impl StreamEvent {
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }
}

/// Source of pushed events for one execution session
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event. Fails when the subscription breaks or ends.
    async fn next_event(&mut self) -> FiddleResult<StreamEvent>;

    /// Release the underlying connection. Further reads fail.
    async fn close(&mut self);
}

type SseStream = BoxStream<'static, Result<es::SSE, es::Error>>;

/// [`EventSource`] backed by an HTTP event stream
///
/// Reconnection is disabled: a dropped connection ends the subscription.
/// The connection is released on [`EventSource::close`] or on drop.
pub struct SseEventSource {
    url: String,
    stream: Option<SseStream>,
}

impl SseEventSource {
    /// Subscribe to the event stream at `url`
    pub fn subscribe(url: &str) -> FiddleResult<Self> {
        let parsed = url::Url::parse(url)?;

        let builder = es::ClientBuilder::for_url(url)
            .map_err(sse_error)?
            .header("Accept", "text/event-stream")
            .map_err(sse_error)?
            .reconnect(es::ReconnectOptions::reconnect(false).build());

        let stream: SseStream = if parsed.scheme() == "https" {
            builder.build().stream()
        } else {
            builder.build_http().stream()
        };

        tracing::debug!(url, "subscribed to result stream");

        Ok(Self {
            url: url.to_string(),
            stream: Some(stream),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventSource for SseEventSource {
    async fn next_event(&mut self) -> FiddleResult<StreamEvent> {
        let stream = self.stream.as_mut().ok_or(FiddleError::StreamClosed)?;

        loop {
            match stream.try_next().await {
                Ok(Some(es::SSE::Event(event))) => {
                    return Ok(StreamEvent {
                        event_type: event.event_type,
                        data: event.data,
                    });
                }
                // comments and connection notices carry no payload
                Ok(Some(_)) => continue,
                Ok(None) | Err(es::Error::Eof | es::Error::StreamClosed) => {
                    return Err(FiddleError::StreamClosed);
                }
                Err(e) => return Err(sse_error(e)),
            }
        }
    }

    async fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(url = %self.url, "closed result stream");
        }
    }
}

fn sse_error(error: es::Error) -> FiddleError {
    FiddleError::Sse(format!("{error:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::sse::{Event, Sse};
    use axum::routing::get;
    use axum::Router;
    use std::convert::Infallible;

    #[test]
    fn test_subscribe_rejects_malformed_url() {
        let result = SseEventSource::subscribe("not a url");
        assert!(matches!(result, Err(FiddleError::Url(_))));
    }

    #[tokio::test]
    async fn test_closed_source_fails_reads() {
        let mut source = SseEventSource::subscribe("http://127.0.0.1:9/stream").unwrap();
        assert_eq!(source.url(), "http://127.0.0.1:9/stream");

        source.close().await;
        assert!(matches!(
            source.next_event().await,
            Err(FiddleError::StreamClosed)
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_reported() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = format!("http://127.0.0.1:{port}/stream");
        let mut source = SseEventSource::subscribe(&url).unwrap();
        assert!(matches!(source.next_event().await, Err(FiddleError::Sse(_))));
    }

    #[tokio::test]
    async fn test_server_ending_the_stream_is_stream_closed() {
        let app = Router::new().route(
            "/stream",
            get(|| async {
                let events = vec![Ok::<_, Infallible>(
                    Event::default().event("updateProgress").data("{}"),
                )];
                Sse::new(futures::stream::iter(events))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let mut source = SseEventSource::subscribe(&format!("http://{addr}/stream")).unwrap();

        let event = source.next_event().await.unwrap();
        assert_eq!(event, StreamEvent::new("updateProgress", "{}"));
        assert!(matches!(
            source.next_event().await,
            Err(FiddleError::StreamClosed)
        ));
    }
}
