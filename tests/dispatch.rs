#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crossnotify::backend::{
    Backend, BackendKind, BusBackend, BusEvent, BusTransport, MultiBackend, NotifyRequest,
    NullBackend, Selector,
};
use crossnotify::error::{Error, TransportError};
use crossnotify::message::{Message, Outcome, Reference, Response};
use tokio::sync::Mutex;

/// Recording backend: appends its name to a shared log on every send.
struct RecordingBackend {
    name: &'static str,
    supported: bool,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Backend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Proc
    }

    fn supported(&self) -> bool {
        self.supported
    }

    async fn send(&self, _msg: &Message, _wait: bool) -> crossnotify::Result<Response> {
        self.log.lock().await.push(self.name);
        Ok(Response {
            backend: self.kind(),
            reference: Reference::fresh_token(),
            outcome: None,
        })
    }
}

struct IdentityTransport;

#[async_trait]
impl BusTransport for IdentityTransport {
    async fn notify(&self, _req: NotifyRequest<'_>) -> Result<u32, TransportError> {
        Ok(42)
    }

    async fn dismiss(&self, _id: u32) -> Result<(), TransportError> {
        Ok(())
    }
}

#[tokio::test]
async fn fan_out_hits_supported_backends_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let multi = MultiBackend::new(vec![
        Box::new(RecordingBackend {
            name: "first",
            supported: true,
            log: Arc::clone(&log),
        }),
        Box::new(NullBackend::new()),
        Box::new(RecordingBackend {
            name: "second",
            supported: true,
            log: Arc::clone(&log),
        }),
    ]);

    let msg = Message::builder("Hello").build().unwrap();
    let results = multi.send_all(&msg, false).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(*log.lock().await, vec!["first", "second"]);
}

#[tokio::test]
async fn fan_out_skips_unsupported_members_entirely() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let multi = MultiBackend::new(vec![
        Box::new(RecordingBackend {
            name: "hidden",
            supported: false,
            log: Arc::clone(&log),
        }),
        Box::new(RecordingBackend {
            name: "visible",
            supported: true,
            log: Arc::clone(&log),
        }),
    ]);

    let msg = Message::builder("Hello").build().unwrap();
    let response = multi.send(&msg, false).await.unwrap();

    assert_eq!(*log.lock().await, vec!["visible"]);
    assert!(response.outcome.is_none());
}

#[tokio::test]
async fn selector_with_no_candidates_aggregates_reasons() {
    let err = Selector::new().candidates(vec![]).select().await.unwrap_err();
    assert!(matches!(err, Error::Unavailable { .. }));

    let err = Selector::new()
        .candidates(vec![BackendKind::Multi])
        .select()
        .await
        .unwrap_err();
    match err {
        Error::Unavailable { reasons } => {
            assert_eq!(reasons.len(), 1);
            assert_eq!(reasons[0].0, "multi");
        }
        other => panic!("expected Unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn selector_null_fallback_always_wins() {
    let backend = Selector::new().allow_null(true).select().await.unwrap();
    assert!(!backend.supported());

    let msg = Message::builder("Hello").build().unwrap();
    let response = backend.send(&msg, true).await.unwrap();
    assert_eq!(response.backend, BackendKind::Null);
    assert!(response.outcome.is_none());
}

#[tokio::test]
async fn null_backend_dismiss_is_a_no_op() {
    let backend = NullBackend::new();
    backend.dismiss(&Reference::fresh_token()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn bus_wait_times_out_within_the_requested_window() {
    let (_tx, rx) = async_channel::bounded(8);
    let backend = BusBackend::with_transport(Arc::new(IdentityTransport), rx, "test-app");

    let msg = Message::builder("Hello")
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();

    let started = tokio::time::Instant::now();
    let response = backend.send(&msg, true).await.unwrap();
    assert_eq!(response.outcome, Some(Outcome::Timeout));
    assert_eq!(started.elapsed(), Duration::from_millis(500));
}

#[tokio::test]
async fn bus_event_arriving_before_the_wait_resolves_immediately() {
    let (tx, rx) = async_channel::bounded(8);
    let backend = BusBackend::with_transport(Arc::new(IdentityTransport), rx, "test-app");

    tx.send(BusEvent::Closed { id: 42 }).await.unwrap();
    // Let the dispatcher file the event before the wait starts.
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    let msg = Message::builder("Q").action("yes", "Yes!").build().unwrap();
    let response = backend.send(&msg, true).await.unwrap();
    assert_eq!(response.reference, Reference::Id(42));
    assert_eq!(response.outcome, Some(Outcome::Closed));
}
