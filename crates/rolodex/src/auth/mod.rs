//! Authentication session monitor
//!
//! Holds the current identity and fans every sign-in/sign-out transition out
//! to subscribers. Each subscriber owns an unbounded channel, so transitions
//! are delivered in publish order and never coalesced.
//!
//! Subscribing replays the current state first (if any state has been
//! published yet), then forwards every later transition.

use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use rolodex_api::Identity;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

/// An authentication transition: `Some` on sign-in, `None` on sign-out.
pub type IdentityEvent = Option<Identity>;

type SubscriberId = u64;

struct MonitorState {
    /// `None` until the first publish; then the last published event
    current: Option<IdentityEvent>,
    subscribers: Vec<(SubscriberId, mpsc::UnboundedSender<IdentityEvent>)>,
    next_id: SubscriberId,
}

struct MonitorInner {
    state: Mutex<MonitorState>,
}

impl MonitorInner {
    fn unregister(&self, id: SubscriberId) -> bool {
        let mut state = lock(&self.state);
        let before = state.subscribers.len();
        state.subscribers.retain(|(sid, _)| *sid != id);
        before != state.subscribers.len()
    }
}

/// Observes authentication state and exposes the current identity.
///
/// Cloning yields another handle to the same monitor.
#[derive(Clone)]
pub struct AuthSessionMonitor {
    inner: Arc<MonitorInner>,
}

impl Default for AuthSessionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSessionMonitor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                state: Mutex::new(MonitorState {
                    current: None,
                    subscribers: Vec::new(),
                    next_id: 0,
                }),
            }),
        }
    }

    /// Record a transition and deliver it to every live subscriber.
    pub fn publish(&self, event: IdentityEvent) {
        let mut state = lock(&self.inner.state);
        match &event {
            Some(identity) => info!("[AuthSessionMonitor] Signed in as '{}'", identity.uid()),
            None => info!("[AuthSessionMonitor] Signed out"),
        }
        state.current = Some(event.clone());
        // Receivers that were dropped are pruned here
        state
            .subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
        debug!(
            "[AuthSessionMonitor] Delivered transition to {} subscribers",
            state.subscribers.len()
        );
    }

    /// The identity of the signed-in user, if any.
    pub fn current(&self) -> Option<Identity> {
        lock(&self.inner.state).current.clone().flatten()
    }

    /// Whether any transition has been published yet.
    pub fn has_state(&self) -> bool {
        lock(&self.inner.state).current.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.state).subscribers.len()
    }

    /// Subscribe to transitions as a stream.
    ///
    /// The first item is the current state if one has been published;
    /// afterwards every transition is yielded in order.
    pub fn subscribe(&self) -> IdentityStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = lock(&self.inner.state);
        let id = state.next_id;
        state.next_id += 1;

        // Replay under the same lock as registration so no publish can
        // slip in between
        if let Some(current) = &state.current {
            let _ = tx.send(current.clone());
        }
        state.subscribers.push((id, tx));

        IdentityStream {
            id,
            monitor: Arc::downgrade(&self.inner),
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    /// Register a callback invoked for every transition, starting with the
    /// replayed current state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn observe<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(IdentityEvent) + Send + 'static,
    {
        let mut stream = self.subscribe();
        let id = stream.id;
        let handle = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                callback(event);
            }
        });
        Subscription::new(id, Arc::downgrade(&self.inner), handle)
    }

    pub(crate) fn subscription_for(
        &self,
        stream_id: u64,
        handle: JoinHandle<()>,
    ) -> Subscription {
        Subscription::new(stream_id, Arc::downgrade(&self.inner), handle)
    }
}

/// Stream of identity transitions for one subscriber.
pub struct IdentityStream {
    id: SubscriberId,
    monitor: Weak<MonitorInner>,
    inner: UnboundedReceiverStream<IdentityEvent>,
}

impl IdentityStream {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Stream for IdentityStream {
    type Item = IdentityEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for IdentityStream {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.upgrade() {
            monitor.unregister(self.id);
        }
    }
}

/// Cancellation handle returned by [`AuthSessionMonitor::observe`] and
/// `ContactSyncController::attach`.
///
/// Cancelling stops the forwarding task and unregisters the subscriber.
/// Dropping the handle cancels it.
pub struct Subscription {
    id: SubscriberId,
    monitor: Weak<MonitorInner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    fn new(id: SubscriberId, monitor: Weak<MonitorInner>, handle: JoinHandle<()>) -> Self {
        Self {
            id,
            monitor,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Returns `true` the first time, `false` on every later call.
    pub fn cancel(&self) -> bool {
        let Some(handle) = lock(&self.handle).take() else {
            return false;
        };
        handle.abort();
        if let Some(monitor) = self.monitor.upgrade() {
            monitor.unregister(self.id);
        }
        debug!("[AuthSessionMonitor] Subscription {} cancelled", self.id);
        true
    }

    pub fn is_active(&self) -> bool {
        lock(&self.handle)
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Lock a std mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
