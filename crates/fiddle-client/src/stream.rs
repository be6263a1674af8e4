//! Consumption of the execution result stream
//!
//! The service pushes many progress events before the one event that carries
//! the finished result. [`consume_result`] reads events one at a time until a
//! terminal event decodes or the attempt budget runs out.

use fiddle_api_contract::{ExecutionResult, TERMINAL_EVENT};

use crate::config::StreamConfig;
use crate::error::FiddleResult;
use crate::sse::{EventSource, StreamEvent};

/// How the stream loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// A terminal event was decoded after `attempts` events
    Matched {
        result: ExecutionResult,
        attempts: u32,
    },
    /// The attempt budget was spent without a decodable terminal event
    Exhausted { attempts: u32 },
}

impl StreamOutcome {
    /// The decoded result, or the zero-valued result when exhausted
    pub fn into_result(self) -> ExecutionResult {
        match self {
            StreamOutcome::Matched { result, .. } => result,
            StreamOutcome::Exhausted { .. } => ExecutionResult::default(),
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            StreamOutcome::Matched { attempts, .. } | StreamOutcome::Exhausted { attempts } => {
                *attempts
            }
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, StreamOutcome::Matched { .. })
    }
}

/// Returns true when `event` is the terminal result event
pub fn is_terminal(event: &StreamEvent) -> bool {
    event.event_type.contains(TERMINAL_EVENT)
}

/// Read events from `source` until the execution result arrives
///
/// The source is closed before returning, whatever the outcome.
pub async fn consume_result<S>(
    source: &mut S,
    config: &StreamConfig,
) -> FiddleResult<StreamOutcome>
where
    S: EventSource + ?Sized,
{
    let outcome = listen(source, config).await;
    source.close().await;
    outcome
}

async fn listen<S>(source: &mut S, config: &StreamConfig) -> FiddleResult<StreamOutcome>
where
    S: EventSource + ?Sized,
{
    for attempt in 1..=config.max_attempts {
        let event = source.next_event().await?;

        if is_terminal(&event) {
            match serde_json::from_str::<ExecutionResult>(&event.data) {
                Ok(result) => {
                    tracing::info!(attempt, fiddle_id = %result.id, "received execution result");
                    return Ok(StreamOutcome::Matched {
                        result,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "ignoring undecodable result payload");
                }
            }
        } else {
            tracing::debug!(attempt, event_type = %event.event_type, "skipping progress event");
        }

        if attempt < config.max_attempts {
            tokio::time::sleep(config.poll_delay).await;
        }
    }

    tracing::warn!(
        attempts = config.max_attempts,
        "result stream exhausted without a result"
    );
    Ok(StreamOutcome::Exhausted {
        attempts: config.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FiddleError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Scripted source: replays `events`, then repeats `fallback` forever
    /// (or fails with `StreamClosed` when there is none).
    struct FakeSource {
        events: VecDeque<StreamEvent>,
        fallback: Option<StreamEvent>,
        reads: u32,
        closed: bool,
    }

    impl FakeSource {
        fn new(events: Vec<StreamEvent>) -> Self {
            Self {
                events: events.into(),
                fallback: None,
                reads: 0,
                closed: false,
            }
        }

        fn endless(event: StreamEvent) -> Self {
            Self {
                fallback: Some(event),
                ..Self::new(Vec::new())
            }
        }
    }

    #[async_trait]
    impl EventSource for FakeSource {
        async fn next_event(&mut self) -> FiddleResult<StreamEvent> {
            assert!(!self.closed, "read after close");
            self.reads += 1;
            match self.events.pop_front().or_else(|| self.fallback.clone()) {
                Some(event) => Ok(event),
                None => Err(FiddleError::StreamClosed),
            }
        }

        async fn close(&mut self) {
            self.closed = true;
        }
    }

    fn progress(seq: usize) -> StreamEvent {
        StreamEvent::new("updateProgress", format!(r#"{{"seq": {seq}}}"#))
    }

    fn result_event(id: &str) -> StreamEvent {
        StreamEvent::new(
            "updateResult",
            format!(r#"{{"id": "{id}", "status": 200, "respComplete": true}}"#),
        )
    }

    fn fast() -> StreamConfig {
        StreamConfig::default().with_poll_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_returns_result_after_progress_events() {
        for n in [0usize, 1, 7, 99] {
            let mut events: Vec<_> = (0..n).map(progress).collect();
            events.push(result_event("f1"));
            events.push(result_event("ignored"));
            let mut source = FakeSource::new(events);

            let outcome = consume_result(&mut source, &fast()).await.unwrap();

            assert_eq!(outcome.attempts(), n as u32 + 1);
            let result = outcome.into_result();
            assert_eq!(result.id, "f1");
            assert_eq!(result.status, 200);
            assert!(result.resp_complete);
            assert_eq!(source.reads, n as u32 + 1);
            assert!(source.closed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_exactly_max_attempts() {
        let mut source = FakeSource::endless(progress(0));
        let started = tokio::time::Instant::now();

        let outcome = consume_result(&mut source, &StreamConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome, StreamOutcome::Exhausted { attempts: 100 });
        assert_eq!(source.reads, 100);
        assert!(source.closed);
        // delay sits between attempts only
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(99 * 5));
        assert!(elapsed < Duration::from_secs(100 * 5));
        assert_eq!(outcome.into_result(), ExecutionResult::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_applies_between_progress_events() {
        let mut source = FakeSource::new(vec![progress(0), progress(1), result_event("f1")]);
        let started = tokio::time::Instant::now();

        let outcome = consume_result(&mut source, &StreamConfig::default())
            .await
            .unwrap();

        assert!(outcome.is_matched());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_malformed_result_payload_does_not_stop_the_loop() {
        let mut source = FakeSource::new(vec![
            progress(0),
            StreamEvent::new("updateResult", "{not json"),
            result_event("f2"),
        ]);

        let outcome = consume_result(&mut source, &fast()).await.unwrap();

        assert_eq!(outcome.attempts(), 3);
        assert_eq!(outcome.into_result().id, "f2");
    }

    #[tokio::test]
    async fn test_only_malformed_results_exhaust_to_zero_value() {
        let mut source = FakeSource::endless(StreamEvent::new("updateResult", "[1, 2"));
        let config = fast().with_max_attempts(5);

        let outcome = consume_result(&mut source, &config).await.unwrap();

        assert_eq!(outcome, StreamOutcome::Exhausted { attempts: 5 });
        assert_eq!(source.reads, 5);
        assert_eq!(outcome.into_result(), ExecutionResult::default());
    }

    #[tokio::test]
    async fn test_result_with_null_fields_is_matched() {
        let mut source = FakeSource::new(vec![
            progress(0),
            StreamEvent::new(
                "updateResult",
                r#"{"id": "f4", "respComplete": true, "respBodyPreview": null, "originFetches": null, "events": null}"#,
            ),
        ]);

        let outcome = consume_result(&mut source, &fast()).await.unwrap();

        assert_eq!(outcome.attempts(), 2);
        let result = outcome.into_result();
        assert_eq!(result.id, "f4");
        assert!(result.resp_complete);
        assert!(result.events.is_empty());
    }

    #[tokio::test]
    async fn test_terminal_marker_is_a_substring_match() {
        let mut source = FakeSource::new(vec![StreamEvent::new(
            "fiddle.updateResult.v2",
            r#"{"id": "f3"}"#,
        )]);

        let result = consume_result(&mut source, &fast())
            .await
            .unwrap()
            .into_result();
        assert_eq!(result.id, "f3");
    }

    #[tokio::test]
    async fn test_source_failure_propagates_and_closes() {
        let mut source = FakeSource::new(vec![progress(0), progress(1)]);

        let err = consume_result(&mut source, &fast()).await.unwrap_err();

        assert!(matches!(err, FiddleError::StreamClosed));
        assert_eq!(source.reads, 3);
        assert!(source.closed);
    }

    #[tokio::test]
    async fn test_zero_budget_reads_nothing() {
        let mut source = FakeSource::new(vec![result_event("f1")]);
        let config = fast().with_max_attempts(0);

        let outcome = consume_result(&mut source, &config).await.unwrap();

        assert_eq!(outcome, StreamOutcome::Exhausted { attempts: 0 });
        assert_eq!(source.reads, 0);
        assert!(source.closed);
    }

    #[test]
    fn test_is_terminal() {
        assert!(is_terminal(&result_event("x")));
        assert!(!is_terminal(&progress(0)));
        assert!(!is_terminal(&StreamEvent::new("message", "{}")));
    }
}
