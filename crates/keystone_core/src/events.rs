//! # KEYSTONE Event Bus
//!
//! Publish/subscribe between the runtime and the subsystems built on it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   emit_async("sprite", id)   ┌─────────────┐
//! │   Entity    │─────────────────────────────>│   Channel   │
//! │   Manager   │                              │  "sprite"   │
//! └─────────────┘                              └──────┬──────┘
//!                                    ┌────────────────┼────────────────┐
//!                                    v                v                v
//!                              subscriber 1     subscriber 2     subscriber 3
//!                                 (sync)           (async)          (sync)
//! ```
//!
//! Two dispatch modes share one subscriber list per channel:
//!
//! - [`EventBus::emit`] calls every subscriber and does not wait for the
//!   asynchronous work they start.
//! - [`EventBus::emit_async`] starts every subscriber first, then waits for
//!   all of them to settle. A failing subscriber never stops its siblings.
//!
//! A subscriber that panics, while being called or while its operation is
//! polled, counts as a failed subscriber in both modes.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use parking_lot::RwLock;

use crate::error::{BoxError, EventError, IntoOutcome};
use crate::ident::Channel;

type Handler<P> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Handle identifying one subscription, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

struct Subscriber<P> {
    id: SubscriptionId,
    handler: Handler<P>,
}

impl<P> Clone for Subscriber<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// One subscriber's failed operation within an await-all dispatch.
#[derive(Debug)]
pub struct DispatchFailure {
    /// The failing subscription.
    pub subscription: SubscriptionId,
    /// The subscriber's error.
    pub error: BoxError,
}

/// Result of an await-all dispatch.
#[derive(Debug)]
pub struct DispatchReport {
    /// The dispatched channel.
    pub channel: Channel,
    /// Number of subscribers that were invoked.
    pub delivered: usize,
    /// Subscribers whose operation failed, in subscription order.
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    /// Returns `true` if every subscriber succeeded.
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the first failure, if any.
    #[must_use]
    pub fn first_failure(&self) -> Option<&DispatchFailure> {
        self.failures.first()
    }

    /// Converts into the number of delivered subscribers, or the first
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SubscriberFailed`] for the first failing
    /// subscriber.
    pub fn into_result(self) -> Result<usize, EventError> {
        match self.failures.into_iter().next() {
            None => Ok(self.delivered),
            Some(failure) => Err(EventError::SubscriberFailed {
                channel: self.channel,
                subscription: failure.subscription,
                source: failure.error,
            }),
        }
    }
}

/// Channel-keyed publish/subscribe bus carrying payloads of type `P`.
pub struct EventBus<P> {
    channels: RwLock<HashMap<Channel, Vec<Subscriber<P>>>>,
    next_id: AtomicU64,
}

impl<P> EventBus<P>
where
    P: Clone + Send + Sync + 'static,
{
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribes an asynchronous handler to `channel`.
    ///
    /// The handler is called when the event is dispatched; the future it
    /// returns may resolve to `()` or `Result<(), E>`.
    pub fn on<F, Fut>(&self, channel: impl Into<Channel>, handler: F) -> SubscriptionId
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        let handler: Handler<P> = Arc::new(move |payload: P| {
            let pending = handler(payload);
            async move { pending.await.into_outcome() }.boxed()
        });
        self.subscribe(channel.into(), handler)
    }

    /// Subscribes a synchronous handler to `channel`.
    ///
    /// The handler runs to completion during dispatch; its outcome is an
    /// already settled operation.
    pub fn on_sync<F, O>(&self, channel: impl Into<Channel>, handler: F) -> SubscriptionId
    where
        F: Fn(P) -> O + Send + Sync + 'static,
        O: IntoOutcome,
    {
        let handler: Handler<P> = Arc::new(move |payload: P| {
            future::ready(handler(payload).into_outcome()).boxed()
        });
        self.subscribe(channel.into(), handler)
    }

    fn subscribe(&self, channel: Channel, handler: Handler<P>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::trace!(%channel, subscription = %id, "subscribed");
        self.channels
            .write()
            .entry(channel)
            .or_default()
            .push(Subscriber { id, handler });
        id
    }

    /// Unsubscribes `id` from `channel`.
    ///
    /// Unsubscribing something that is not subscribed is a no-op. Returns
    /// `true` if a subscription was removed.
    pub fn off(&self, channel: impl Into<Channel>, id: SubscriptionId) -> bool {
        let mut channels = self.channels.write();
        let Some(subscribers) = channels.get_mut(&channel.into()) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        before != subscribers.len()
    }

    /// Removes every subscriber from `channel`.
    pub fn off_all(&self, channel: impl Into<Channel>) {
        if let Some(subscribers) = self.channels.write().get_mut(&channel.into()) {
            subscribers.clear();
        }
    }

    /// Removes every subscriber from every channel.
    pub fn clear(&self) {
        self.channels.write().clear();
    }

    /// Returns the number of subscribers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: impl Into<Channel>) -> usize {
        self.channels
            .read()
            .get(&channel.into())
            .map_or(0, Vec::len)
    }

    /// Snapshot of the subscriber list, so handlers may (un)subscribe while
    /// being dispatched.
    fn snapshot(&self, channel: &Channel) -> Vec<Subscriber<P>> {
        self.channels
            .read()
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Fire-and-forget dispatch.
    ///
    /// Every subscriber is called in subscription order and its operation
    /// polled once. Work a subscriber leaves pending is spawned on the
    /// ambient tokio runtime, or dropped with a warning when there is none.
    /// Failures and panics are logged and never stop other subscribers.
    /// Returns the number of subscribers called.
    pub fn emit(&self, channel: impl Into<Channel>, payload: P) -> usize {
        let channel = channel.into();
        let subscribers = self.snapshot(&channel);
        let runtime = tokio::runtime::Handle::try_current().ok();

        for subscriber in &subscribers {
            let mut pending = invoke(&subscriber.handler, payload.clone());
            match (&mut pending).now_or_never() {
                Some(Ok(())) => {}
                Some(Err(error)) => {
                    tracing::warn!(%channel, subscription = %subscriber.id, %error, "subscriber failed");
                }
                None => spawn_detached(runtime.as_ref(), channel.clone(), subscriber.id, pending),
            }
        }

        subscribers.len()
    }

    /// Await-all dispatch.
    ///
    /// All subscribers are started before any is awaited; the returned
    /// future resolves once every subscriber's operation has settled. With no
    /// subscribers it resolves immediately with an empty report.
    pub async fn emit_async(&self, channel: impl Into<Channel>, payload: P) -> DispatchReport {
        let channel = channel.into();
        let subscribers = self.snapshot(&channel);

        let pending: Vec<_> = subscribers
            .iter()
            .map(|subscriber| invoke(&subscriber.handler, payload.clone()))
            .collect();
        let outcomes = future::join_all(pending).await;

        let failures = subscribers
            .iter()
            .zip(outcomes)
            .filter_map(|(subscriber, outcome)| {
                outcome.err().map(|error| DispatchFailure {
                    subscription: subscriber.id,
                    error,
                })
            })
            .collect::<Vec<_>>();

        for failure in &failures {
            tracing::warn!(
                %channel,
                subscription = %failure.subscription,
                error = %failure.error,
                "subscriber failed during await-all dispatch"
            );
        }

        DispatchReport {
            channel,
            delivered: subscribers.len(),
            failures,
        }
    }
}

/// Calls `handler`, turning a panic in the call or in any later poll of its
/// operation into that subscriber's failure.
fn invoke<P>(handler: &Handler<P>, payload: P) -> BoxFuture<'static, Result<(), BoxError>> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(payload))) {
        Ok(pending) => AssertUnwindSafe(pending)
            .catch_unwind()
            .map(|settled| settled.unwrap_or_else(|panic| Err(panic_error(panic.as_ref()))))
            .boxed(),
        Err(panic) => future::ready(Err(panic_error(panic.as_ref()))).boxed(),
    }
}

fn panic_error(panic: &(dyn Any + Send)) -> BoxError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string payload".to_owned());
    format!("subscriber panicked: {message}").into()
}

fn spawn_detached(
    runtime: Option<&tokio::runtime::Handle>,
    channel: Channel,
    subscription: SubscriptionId,
    pending: BoxFuture<'static, Result<(), BoxError>>,
) {
    match runtime {
        Some(runtime) => {
            runtime.spawn(async move {
                if let Err(error) = pending.await {
                    tracing::warn!(%channel, %subscription, %error, "detached subscriber failed");
                }
            });
        }
        None => {
            tracing::warn!(%channel, %subscription, "no async runtime, dropping pending subscriber work");
        }
    }
}

impl<P> Default for EventBus<P>
where
    P: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.channels.read();
        let mut counts: Vec<_> = channels
            .iter()
            .map(|(channel, subscribers)| (channel.clone(), subscribers.len()))
            .collect();
        counts.sort();
        f.debug_struct("EventBus").field("channels", &counts).finish()
    }
}
