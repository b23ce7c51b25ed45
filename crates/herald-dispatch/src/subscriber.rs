//! Event subscribers.
//!
//! A subscriber bundles several listener bindings behind one object. It
//! describes which events it wants and through which of its methods; the
//! registry turns each `(event, method, priority)` triple into a bound
//! [`Listener`].

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::{DispatchError, DispatchResult, ListenerResult};
use crate::event::Event;
use crate::listener::{Listener, ListenerContext, ListenerFn};

/// An object listening to several events through named methods.
///
/// # Example
///
/// ```
/// use herald_dispatch::{Event, EventSubscriber, ListenerContext, ListenerResult, Subscription};
///
/// struct AuditLog;
///
/// impl EventSubscriber for AuditLog {
///     fn subscribed_events(&self) -> Vec<Subscription> {
///         vec![
///             Subscription::method("user.created", "record"),
///             Subscription::new("user.deleted")
///                 .with_method("record", 10)
///                 .with_method("purge", -10),
///         ]
///     }
///
///     fn handle(
///         &self,
///         method: &str,
///         _event: &mut dyn Event,
///         _ctx: &ListenerContext<'_>,
///     ) -> ListenerResult {
///         match method {
///             "record" | "purge" => Ok(()),
///             other => Err(format!("unknown method {other}").into()),
///         }
///     }
/// }
/// ```
pub trait EventSubscriber: Send + Sync + 'static {
    /// Describe the events this subscriber listens to.
    fn subscribed_events(&self) -> Vec<Subscription>;

    /// Invoke the subscriber method bound to an event.
    fn handle(&self, method: &str, event: &mut dyn Event, ctx: &ListenerContext<'_>)
    -> ListenerResult;

    /// Type name used when describing the subscriber's listeners.
    fn subscriber_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// One event entry in a subscriber's description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    event: String,
    methods: Vec<(Cow<'static, str>, i32)>,
}

impl Subscription {
    /// Start an entry for `event` with no methods yet.
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            methods: Vec::new(),
        }
    }

    /// Entry mapping `event` to a single method at the default priority.
    pub fn method(event: impl Into<String>, method: impl Into<Cow<'static, str>>) -> Self {
        Self::new(event).with_method(method, 0)
    }

    /// Add a method with a priority.
    pub fn with_method(mut self, method: impl Into<Cow<'static, str>>, priority: i32) -> Self {
        self.methods.push((method.into(), priority));
        self
    }

    /// The event name.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// The `(method, priority)` pairs, in declaration order.
    pub fn methods(&self) -> &[(Cow<'static, str>, i32)] {
        &self.methods
    }
}

/// A listener binding derived from a subscriber description.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub event: String,
    pub listener: Listener,
    pub priority: i32,
}

/// Translate a subscriber's description into listener bindings.
///
/// Fails without producing anything if any entry has no method.
pub(crate) fn bindings(subscriber: &Arc<dyn EventSubscriber>) -> DispatchResult<Vec<Binding>> {
    let subscriptions = subscriber.subscribed_events();

    if let Some(empty) = subscriptions.iter().find(|s| s.methods.is_empty()) {
        return Err(DispatchError::InvalidSubscription {
            subscriber: subscriber.subscriber_name().to_string(),
            event: empty.event.clone(),
        });
    }

    let mut bindings = Vec::new();
    for subscription in subscriptions {
        for (method, priority) in subscription.methods {
            bindings.push(Binding {
                event: subscription.event.clone(),
                listener: bound_listener(subscriber, method),
                priority,
            });
        }
    }
    Ok(bindings)
}

/// Build the listener calling `method` on `subscriber`.
pub(crate) fn bound_listener(
    subscriber: &Arc<dyn EventSubscriber>,
    method: Cow<'static, str>,
) -> Listener {
    let owner_addr = Arc::as_ptr(subscriber) as *const () as usize;
    let target = Arc::clone(subscriber);
    let name = method.clone();
    let callback: Arc<ListenerFn> =
        Arc::new(move |event: &mut dyn Event, ctx: &ListenerContext<'_>| {
            target.handle(&name, event, ctx)
        });

    Listener::bound(owner_addr, subscriber.subscriber_name(), method, callback)
}
