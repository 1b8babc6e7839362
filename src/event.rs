//! In-process multicast events.
//!
//! [`Event`] is the notification primitive shared by host objects and
//! handles. Host objects expose events that handles subscribe to (update
//! events, show-if toggles, monitored events); handles expose their own
//! `value_updated`, `active_state_changed` and `disposing` events to UI
//! layers.
//!
//! Listeners are invoked outside the internal lock, so a listener may
//! subscribe, unsubscribe or re-invoke the same event.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::value::{MonitorValue, Value, ValueType};

/// Identifies one subscription on one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

type Listener<A> = Arc<dyn Fn(&A) + Send + Sync>;

struct Listeners<A> {
    next: u64,
    entries: Vec<(SubscriptionToken, Listener<A>)>,
}

/// A multicast event carrying arguments of type `A`.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
/// use livemon::Event;
///
/// let changed: Event<i32> = Event::new();
/// let seen = Arc::new(AtomicU32::new(0));
/// let seen_in = Arc::clone(&seen);
/// let token = changed.subscribe(move |_| {
///     seen_in.fetch_add(1, Ordering::Relaxed);
/// });
///
/// changed.invoke(&5);
/// changed.unsubscribe(token);
/// changed.invoke(&6);
/// assert_eq!(seen.load(Ordering::Relaxed), 1);
/// ```
pub struct Event<A> {
    listeners: Mutex<Listeners<A>>,
}

impl<A: 'static> Event<A> {
    /// Creates an event without listeners.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            listeners: Mutex::new(Listeners {
                next: 0,
                entries: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Listeners<A>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a listener and returns the token that removes it.
    pub fn subscribe(&self, listener: impl Fn(&A) + Send + Sync + 'static) -> SubscriptionToken {
        let mut guard = self.lock();
        let token = SubscriptionToken(guard.next);
        guard.next += 1;
        guard.entries.push((token, Arc::new(listener)));
        token
    }

    /// Removes a listener. Returns false if the token was not subscribed.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut guard = self.lock();
        let before = guard.entries.len();
        guard.entries.retain(|(t, _)| *t != token);
        guard.entries.len() != before
    }

    /// Invokes every listener in subscription order.
    pub fn invoke(&self, args: &A) {
        let snapshot: Vec<Listener<A>> = {
            let guard = self.lock();
            if guard.entries.is_empty() {
                return;
            }
            guard.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in snapshot {
            listener(args);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().entries.len()
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }
}

impl<A: 'static> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Argument shapes an [`Event`] can carry when it is monitored or bound as a hook.
pub trait EventArgs: 'static {
    /// Invoke signature, one entry per argument.
    fn signature() -> Vec<ValueType>;

    /// Snapshot of the arguments.
    fn to_values(&self) -> Vec<Value>;
}

impl EventArgs for () {
    fn signature() -> Vec<ValueType> {
        Vec::new()
    }

    fn to_values(&self) -> Vec<Value> {
        Vec::new()
    }
}

macro_rules! impl_single_arg {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl EventArgs for $ty {
                fn signature() -> Vec<ValueType> {
                    vec![<$ty as MonitorValue>::value_type()]
                }

                fn to_values(&self) -> Vec<Value> {
                    vec![self.to_value()]
                }
            }
        )+
    };
}

impl_single_arg!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    crate::value::Color,
    glam::Vec2,
    glam::Vec3,
    glam::Vec4,
    glam::Quat,
);

impl<A: MonitorValue, B: MonitorValue> EventArgs for (A, B) {
    fn signature() -> Vec<ValueType> {
        vec![A::value_type(), B::value_type()]
    }

    fn to_values(&self) -> Vec<Value> {
        vec![self.0.to_value(), self.1.to_value()]
    }
}

impl<A: MonitorValue, B: MonitorValue, C: MonitorValue> EventArgs for (A, B, C) {
    fn signature() -> Vec<ValueType> {
        vec![A::value_type(), B::value_type(), C::value_type()]
    }

    fn to_values(&self) -> Vec<Value> {
        vec![self.0.to_value(), self.1.to_value(), self.2.to_value()]
    }
}

/// Type-erased view of an event, used by handles and hooks that only know
/// the event's declared signature.
pub trait EventSource: Send + Sync {
    /// Invoke signature of the event.
    fn signature(&self) -> Vec<ValueType>;

    /// Subscribes a listener receiving argument snapshots.
    fn subscribe_values(&self, listener: Arc<dyn Fn(&[Value]) + Send + Sync>) -> SubscriptionToken;

    /// Removes a listener added through [`EventSource::subscribe_values`].
    fn unsubscribe_token(&self, token: SubscriptionToken) -> bool;

    fn listener_count(&self) -> usize;
}

impl<A: EventArgs> EventSource for Event<A> {
    fn signature(&self) -> Vec<ValueType> {
        A::signature()
    }

    fn subscribe_values(&self, listener: Arc<dyn Fn(&[Value]) + Send + Sync>) -> SubscriptionToken {
        self.subscribe(move |args: &A| {
            let values = args.to_values();
            listener(&values);
        })
    }

    fn unsubscribe_token(&self, token: SubscriptionToken) -> bool {
        self.unsubscribe(token)
    }

    fn listener_count(&self) -> usize {
        self.subscriber_count()
    }
}
