use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use lru::LruCache;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zbus::proxy;
use zbus::zvariant::Value;

use super::{Backend, BackendKind, DEFAULT_TIMEOUT};
use crate::Result;
use crate::error::{Error, TransportError};
use crate::message::{Message, Outcome, Reference, Response};
use crate::util;

const EVENT_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(n) => n,
    None => panic!("cache size must be non-zero"),
};

/// Asynchronous event delivered by the transport, out of band with respect
/// to any in-flight `send`.
#[derive(Clone, Debug)]
pub enum BusEvent {
    Closed { id: u32 },
    Action { id: u32, key: String },
}

/// Positional arguments of the remote show-notification call.
#[derive(Clone, Debug)]
pub struct NotifyRequest<'a> {
    pub app_name: &'a str,
    pub replaces_id: u32,
    /// `file://` URI of the icon, or empty.
    pub icon: String,
    pub summary: &'a str,
    pub body: &'a str,
    /// Flattened `(id, label, id, label, …)` form.
    pub actions: Vec<String>,
    /// Milliseconds; `0` disables expiry.
    pub timeout_ms: i32,
}

/// Remote call surface of the bus backend. Events travel the other way on
/// the channel handed to [`BusBackend::with_transport`].
#[async_trait]
pub trait BusTransport: Send + Sync {
    async fn notify(&self, req: NotifyRequest<'_>) -> std::result::Result<u32, TransportError>;
    async fn dismiss(&self, id: u32) -> std::result::Result<(), TransportError>;
}

/// Bounded reference-to-outcome buffer for events that arrive before or
/// without a waiter. Oldest entries go first when full.
struct EventCache {
    entries: LruCache<Reference, Outcome>,
}

impl EventCache {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    fn insert(&mut self, reference: Reference, outcome: Outcome) {
        self.entries.put(reference, outcome);
    }

    fn take(&mut self, reference: &Reference) -> Option<Outcome> {
        self.entries.pop(reference)
    }

    #[cfg(test)]
    fn contains(&self, reference: &Reference) -> bool {
        self.entries.contains(reference)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Wait state shared between the dispatcher task and waiters. The cache is
/// the single source of truth; insertion and consumption are serialized
/// through its lock.
struct Shared {
    cache: Mutex<EventCache>,
    wakeup: Notify,
    disconnected: AtomicBool,
}

/// Backend speaking to a `org.freedesktop.Notifications` service over a
/// session bus, correlating asynchronous close/action signals back to the
/// references returned by `Notify`.
pub struct BusBackend {
    app_name: String,
    transport: Arc<dyn BusTransport>,
    shared: Arc<Shared>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl BusBackend {
    /// Connect to the session bus.
    ///
    /// # Errors
    ///
    /// Fails with a [`TransportError`] when the bus is unreachable, which
    /// the selector surfaces as this backend's unavailability reason.
    pub async fn session(
        app_name: impl Into<String>,
    ) -> std::result::Result<Self, TransportError> {
        let (tx, rx) = async_channel::bounded(64);
        let transport = ZbusTransport::connect(tx).await?;
        Ok(Self::with_transport(Arc::new(transport), rx, app_name))
    }

    /// Build the backend over an injected transport and its event channel.
    pub fn with_transport(
        transport: Arc<dyn BusTransport>,
        events: async_channel::Receiver<BusEvent>,
        app_name: impl Into<String>,
    ) -> Self {
        let shared = Arc::new(Shared {
            cache: Mutex::new(EventCache::new(EVENT_CACHE_SIZE)),
            wakeup: Notify::new(),
            disconnected: AtomicBool::new(false),
        });
        let dispatcher = tokio::spawn(dispatch(events, Arc::clone(&shared)));
        Self {
            app_name: app_name.into(),
            transport,
            shared,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Block until an outcome for `reference` is available, the deadline
    /// passes, or the transport goes away (`None`).
    async fn wait_for(&self, reference: &Reference, timeout: Option<Duration>) -> Option<Outcome> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            // Arm the wakeup before checking the cache, so an event landing
            // in between cannot be missed.
            let notified = self.shared.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.shared.cache.lock().await.take(reference) {
                return Some(outcome);
            }
            if self.shared.disconnected.load(Ordering::SeqCst) {
                return None;
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Some(Outcome::Timeout);
                    }
                }
                None => notified.await,
            }
        }
    }
}

async fn dispatch(events: async_channel::Receiver<BusEvent>, shared: Arc<Shared>) {
    while let Ok(event) = events.recv().await {
        let (reference, outcome) = match event {
            BusEvent::Closed { id } => (Reference::Id(id), Outcome::Closed),
            BusEvent::Action { id, key } => (Reference::Id(id), Outcome::Action(key)),
        };
        debug!(%reference, ?outcome, "bus event received");
        shared.cache.lock().await.insert(reference, outcome);
        shared.wakeup.notify_waiters();
    }
    // Transport gone. Wake pending waiters so they resolve as unresolved
    // instead of hanging.
    shared.disconnected.store(true, Ordering::SeqCst);
    shared.wakeup.notify_waiters();
}

#[async_trait]
impl Backend for BusBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Bus
    }

    async fn send(&self, msg: &Message, wait: bool) -> Result<Response> {
        // Actions imply an indefinite wait for the user's choice, which
        // disables expiry both locally and on the wire.
        let timeout = if msg.actions().is_empty() {
            Some(msg.timeout().unwrap_or(DEFAULT_TIMEOUT))
        } else {
            None
        };
        let timeout_ms = timeout.map_or(0, |t| i32::try_from(t.as_millis()).unwrap_or(i32::MAX));

        let actions = msg
            .actions()
            .iter()
            .flat_map(|a| [a.id.clone(), a.label.clone()])
            .collect();
        let icon = msg.icon().map(util::file_uri).unwrap_or_default();

        let id = self
            .transport
            .notify(NotifyRequest {
                app_name: &self.app_name,
                replaces_id: 0,
                icon,
                summary: msg.title(),
                body: msg.text().unwrap_or_default(),
                actions,
                timeout_ms,
            })
            .await
            .map_err(Error::from)?;

        let reference = Reference::Id(id);
        debug!(%reference, title = msg.title(), "notification dispatched");

        let outcome = if wait {
            self.wait_for(&reference, timeout).await
        } else {
            None
        };
        Ok(Response {
            backend: BackendKind::Bus,
            reference,
            outcome,
        })
    }

    async fn dismiss(&self, reference: &Reference) -> Result<()> {
        match reference {
            Reference::Id(id) => Ok(self.transport.dismiss(*id).await?),
            Reference::Token(_) => Err(Error::Unsupported {
                backend: BackendKind::Bus.as_str(),
                operation: "dismiss by token",
            }),
        }
    }

    async fn close(&self) -> Result<()> {
        if let Some(handle) = self.dispatcher.lock().await.take() {
            handle.abort();
        }
        self.shared.disconnected.store(true, Ordering::SeqCst);
        self.shared.wakeup.notify_waiters();
        Ok(())
    }
}

#[proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications",
    gen_blocking = false
)]
trait Notifications {
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: &HashMap<&str, &Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn close_notification(&self, id: u32) -> zbus::Result<()>;

    #[zbus(signal)]
    fn notification_closed(&self, id: u32, reason: u32) -> zbus::Result<()>;

    #[zbus(signal)]
    fn action_invoked(&self, id: u32, action_key: &str) -> zbus::Result<()>;
}

/// [`BusTransport`] over a real session bus via zbus. Forwarder tasks drain
/// the two signal streams into the event channel.
pub struct ZbusTransport {
    proxy: NotificationsProxy<'static>,
    forwarders: Vec<JoinHandle<()>>,
}

impl ZbusTransport {
    pub async fn connect(
        events: async_channel::Sender<BusEvent>,
    ) -> std::result::Result<Self, TransportError> {
        let connection = zbus::Connection::session()
            .await
            .map_err(|source| TransportError::BusConnect { source })?;
        let proxy = NotificationsProxy::new(&connection)
            .await
            .map_err(|source| TransportError::BusConnect { source })?;

        let mut closed = proxy
            .receive_notification_closed()
            .await
            .map_err(|source| TransportError::BusCall {
                method: "NotificationClosed",
                source,
            })?;
        let closed_tx = events.clone();
        let closed_task = tokio::spawn(async move {
            while let Some(signal) = closed.next().await {
                if let Ok(args) = signal.args() {
                    let event = BusEvent::Closed { id: args.id };
                    if closed_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            warn!("NotificationClosed signal stream ended");
        });

        let mut invoked = proxy
            .receive_action_invoked()
            .await
            .map_err(|source| TransportError::BusCall {
                method: "ActionInvoked",
                source,
            })?;
        let invoked_task = tokio::spawn(async move {
            while let Some(signal) = invoked.next().await {
                if let Ok(args) = signal.args() {
                    let event = BusEvent::Action {
                        id: args.id,
                        key: args.action_key.to_string(),
                    };
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
            }
            warn!("ActionInvoked signal stream ended");
        });

        Ok(Self {
            proxy,
            forwarders: vec![closed_task, invoked_task],
        })
    }
}

impl Drop for ZbusTransport {
    fn drop(&mut self) {
        for task in &self.forwarders {
            task.abort();
        }
    }
}

#[async_trait]
impl BusTransport for ZbusTransport {
    async fn notify(&self, req: NotifyRequest<'_>) -> std::result::Result<u32, TransportError> {
        let actions: Vec<&str> = req.actions.iter().map(String::as_str).collect();
        self.proxy
            .notify(
                req.app_name,
                req.replaces_id,
                &req.icon,
                req.summary,
                req.body,
                &actions,
                &HashMap::new(),
                req.timeout_ms,
            )
            .await
            .map_err(|source| TransportError::BusCall {
                method: "Notify",
                source,
            })
    }

    async fn dismiss(&self, id: u32) -> std::result::Result<(), TransportError> {
        self.proxy
            .close_notification(id)
            .await
            .map_err(|source| TransportError::BusCall {
                method: "CloseNotification",
                source,
            })
    }
}
