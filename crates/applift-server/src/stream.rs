//! Heartbeat-wrapped operation streams
//!
//! Build and deploy operations can run for minutes, so their results are
//! delivered over server-sent events with periodic keep-alive comments.
//! The operation future is shared between the heartbeat cutoff and the
//! final emission, so it runs at most once no matter how the stream is
//! polled.

use std::future::Future;
use std::time::Duration;

use axum::response::sse::Event;
use futures::{FutureExt, Stream, StreamExt, future, stream};
use serde::Serialize;
use tokio::time::{Instant, interval_at};

/// One element of an operation's event stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// Keep-alive, sent while the operation is still running
    Heartbeat,
    /// Successful result payload
    Result(serde_json::Value),
    /// Terminal failure
    Error { message: String },
}

impl Frame {
    /// Wrap a successful payload; a serialization failure turns into an
    /// error frame instead of poisoning the stream.
    pub fn result<T: Serialize>(data: T) -> Frame {
        match serde_json::to_value(data) {
            Ok(value) => Frame::Result(value),
            Err(error) => Frame::Error {
                message: error.to_string(),
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Frame {
        Frame::Error {
            message: message.into(),
        }
    }

    /// Render the frame as a server-sent event.
    pub fn into_event(self) -> Event {
        match self {
            Frame::Heartbeat => Event::default().comment("heartbeat"),
            Frame::Result(value) => Event::default().event("result").data(value.to_string()),
            Frame::Error { message } => Event::default()
                .event("error")
                .data(serde_json::json!({ "message": message }).to_string()),
        }
    }
}

/// Run `operation` while emitting heartbeats every `period`.
///
/// The stream opens with an immediate heartbeat, keeps ticking until the
/// operation resolves, and ends with the operation's frame.
pub fn with_heartbeats<F>(period: Duration, operation: F) -> impl Stream<Item = Frame>
where
    F: Future<Output = Frame> + Send + 'static,
{
    let shared = operation.boxed().shared();

    let ticks = stream::unfold(
        interval_at(Instant::now() + period, period),
        |mut interval| async move {
            interval.tick().await;
            Some((Frame::Heartbeat, interval))
        },
    );

    stream::once(future::ready(Frame::Heartbeat))
        .chain(ticks.take_until(shared.clone()))
        .chain(stream::once(shared))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn heartbeats_tick_until_the_operation_resolves() {
        let frames: Vec<Frame> = with_heartbeats(Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Frame::error("late failure")
        })
        .collect()
        .await;

        assert_eq!(
            frames,
            vec![
                Frame::Heartbeat,
                Frame::Heartbeat,
                Frame::Heartbeat,
                Frame::error("late failure"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_result_still_gets_one_heartbeat() {
        let frames: Vec<Frame> = with_heartbeats(Duration::from_secs(10), async {
            Frame::Result(serde_json::json!({ "image": "registry/app:latest" }))
        })
        .collect()
        .await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], Frame::Heartbeat);
        assert!(matches!(frames[1], Frame::Result(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn operation_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();

        let frames: Vec<Frame> = with_heartbeats(Duration::from_secs(1), async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Frame::error("done")
        })
        .collect()
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(frames.last(), Some(&Frame::error("done")));
    }

    #[test]
    fn serialization_failure_becomes_an_error_frame() {
        let mut broken = std::collections::HashMap::new();
        broken.insert(vec![1u8], "non-string key");

        assert!(matches!(Frame::result(broken), Frame::Error { .. }));
    }
}
