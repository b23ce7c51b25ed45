//! The dispatcher contract and the plain listener registry.
//!
//! [`EventDispatcher`] is the seam decorators plug into: they forward
//! registration calls verbatim and substitute their own listeners through
//! [`EventDispatcher::dispatch_listeners`], which keeps ordering and
//! stop-propagation semantics in one place.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{DispatchError, DispatchResult};
use crate::event::{BaseEvent, Event};
use crate::listener::{Listener, ListenerContext};
use crate::subscriber::{self, EventSubscriber};

/// Priority used when none is given. Higher priorities run first.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Publish/subscribe dispatcher contract.
///
/// All methods take `&self`; implementations use interior mutability so that
/// listeners can register, remove and dispatch while a dispatch is running.
pub trait EventDispatcher: Send + Sync {
    /// Register `listener` for `event_name`.
    fn add_listener(&self, event_name: &str, listener: Listener, priority: i32);

    /// Remove every binding of `listener` for `event_name`.
    fn remove_listener(&self, event_name: &str, listener: &Listener);

    /// Register all listeners described by `subscriber`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidSubscription`] if the description maps
    /// an event to no method. Nothing is registered in that case.
    fn add_subscriber(&self, subscriber: Arc<dyn EventSubscriber>) -> DispatchResult<()>;

    /// Remove all listeners bound to `subscriber`.
    fn remove_subscriber(&self, subscriber: &Arc<dyn EventSubscriber>);

    /// Listeners for `event_name`, in invocation order.
    fn listeners(&self, event_name: &str) -> Vec<Listener>;

    /// Listeners for every event that has at least one, keyed by event name.
    fn all_listeners(&self) -> Vec<(String, Vec<Listener>)>;

    /// Whether `event_name` (or, with `None`, any event) has listeners.
    fn has_listeners(&self, event_name: Option<&str>) -> bool;

    /// Dispatch `event` to the listeners of `event_name`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ListenerFailed`] when a listener fails; the
    /// remaining listeners are not called.
    fn dispatch(&self, event_name: &str, event: &mut dyn Event) -> DispatchResult<()>;

    /// Invoke `listeners` in order, stopping once propagation is stopped.
    ///
    /// `origin` is the dispatcher handed to listeners through their context.
    fn dispatch_listeners(
        &self,
        listeners: &[Listener],
        event_name: &str,
        event: &mut dyn Event,
        origin: &dyn EventDispatcher,
    ) -> DispatchResult<()> {
        let ctx = ListenerContext::new(event_name, origin);

        for listener in listeners {
            listener
                .call(event, &ctx)
                .map_err(|source| DispatchError::ListenerFailed {
                    event: event_name.to_string(),
                    listener: listener.to_string(),
                    source,
                })?;

            if event.is_propagation_stopped() {
                trace!(event = event_name, listener = %listener, "Propagation stopped");
                break;
            }
        }

        Ok(())
    }

    /// Dispatch a fresh [`BaseEvent`] and return it.
    fn dispatch_default(&self, event_name: &str) -> DispatchResult<BaseEvent> {
        let mut event = BaseEvent::new();
        self.dispatch(event_name, &mut event)?;
        Ok(event)
    }
}

#[derive(Debug, Clone)]
struct Registration {
    listener: Listener,
    priority: i32,
}

/// The plain dispatcher: a priority-ordered listener table.
///
/// Within one priority, listeners run in registration order.
///
/// # Example
///
/// ```
/// use herald_dispatch::{EventDispatcher, Listener, ListenerRegistry};
///
/// let registry = ListenerRegistry::new();
/// registry.add_listener("app.boot", Listener::closure(|_, _| Ok(())), 0);
///
/// assert!(registry.has_listeners(Some("app.boot")));
/// registry.dispatch_default("app.boot").unwrap();
/// ```
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<BTreeMap<String, Vec<Registration>>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the registry in an [`Arc`].
    pub fn into_shared(self) -> Arc<dyn EventDispatcher> {
        Arc::new(self)
    }

    /// Number of bindings across all events.
    pub fn len(&self) -> usize {
        self.listeners.read().values().map(Vec::len).sum()
    }

    /// Check whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl EventDispatcher for ListenerRegistry {
    fn add_listener(&self, event_name: &str, listener: Listener, priority: i32) {
        debug!(event = event_name, listener = %listener, priority, "Listener added");

        let mut table = self.listeners.write();
        let registrations = table.entry(event_name.to_string()).or_default();
        let position = registrations.partition_point(|r| r.priority >= priority);
        registrations.insert(position, Registration { listener, priority });
    }

    fn remove_listener(&self, event_name: &str, listener: &Listener) {
        let mut table = self.listeners.write();
        let Some(registrations) = table.get_mut(event_name) else {
            return;
        };

        let before = registrations.len();
        registrations.retain(|r| r.listener != *listener);
        if before != registrations.len() {
            debug!(event = event_name, listener = %listener, "Listener removed");
        }
        if registrations.is_empty() {
            table.remove(event_name);
        }
    }

    fn add_subscriber(&self, subscriber: Arc<dyn EventSubscriber>) -> DispatchResult<()> {
        let bindings = subscriber::bindings(&subscriber)?;
        debug!(
            subscriber = subscriber.subscriber_name(),
            bindings = bindings.len(),
            "Subscriber added"
        );

        for binding in bindings {
            self.add_listener(&binding.event, binding.listener, binding.priority);
        }
        Ok(())
    }

    fn remove_subscriber(&self, subscriber: &Arc<dyn EventSubscriber>) {
        let owner_addr = Arc::as_ptr(subscriber) as *const () as usize;

        for subscription in subscriber.subscribed_events() {
            for (method, _) in subscription.methods() {
                let listener = subscriber::bound_listener(subscriber, method.clone());
                debug_assert_eq!(listener.bound_address(), Some(owner_addr));
                self.remove_listener(subscription.event(), &listener);
            }
        }
        debug!(subscriber = subscriber.subscriber_name(), "Subscriber removed");
    }

    fn listeners(&self, event_name: &str) -> Vec<Listener> {
        self.listeners
            .read()
            .get(event_name)
            .map(|registrations| registrations.iter().map(|r| r.listener.clone()).collect())
            .unwrap_or_default()
    }

    fn all_listeners(&self) -> Vec<(String, Vec<Listener>)> {
        self.listeners
            .read()
            .iter()
            .filter(|(_, registrations)| !registrations.is_empty())
            .map(|(name, registrations)| {
                (
                    name.clone(),
                    registrations.iter().map(|r| r.listener.clone()).collect(),
                )
            })
            .collect()
    }

    fn has_listeners(&self, event_name: Option<&str>) -> bool {
        let table = self.listeners.read();
        match event_name {
            Some(name) => table.get(name).is_some_and(|r| !r.is_empty()),
            None => table.values().any(|r| !r.is_empty()),
        }
    }

    fn dispatch(&self, event_name: &str, event: &mut dyn Event) -> DispatchResult<()> {
        // Snapshot under the lock; listeners may mutate the table.
        let listeners = self.listeners(event_name);
        trace!(event = event_name, listeners = listeners.len(), "Dispatching event");

        if listeners.is_empty() {
            return Ok(());
        }
        self.dispatch_listeners(&listeners, event_name, event, self)
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("events", &self.listeners.read().len())
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ListenerResult;
    use parking_lot::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Listener {
        let log = Arc::clone(log);
        Listener::closure(move |_, _| {
            log.lock().push(label);
            Ok(())
        })
    }

    struct Search {
        hits: Mutex<Vec<String>>,
    }

    impl EventSubscriber for Search {
        fn subscribed_events(&self) -> Vec<crate::Subscription> {
            vec![
                crate::Subscription::method("foo", "call"),
                crate::Subscription::new("bar").with_method("index", 10),
            ]
        }

        fn handle(&self, method: &str, _: &mut dyn Event, ctx: &ListenerContext<'_>) -> ListenerResult {
            self.hits
                .lock()
                .push(format!("{}:{}", ctx.event_name(), method));
            Ok(())
        }
    }

    #[test]
    fn test_add_remove_listener() {
        let registry = ListenerRegistry::new();
        let listener = Listener::closure(|_, _| Ok(()));

        registry.add_listener("foo", listener.clone(), DEFAULT_PRIORITY);
        let listeners = registry.listeners("foo");
        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0], listener);

        registry.remove_listener("foo", &listener);
        assert!(registry.listeners("foo").is_empty());
        assert!(!registry.has_listeners(Some("foo")));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_has_listeners() {
        let registry = ListenerRegistry::new();
        assert!(!registry.has_listeners(None));
        assert!(!registry.has_listeners(Some("foo")));

        registry.add_listener("foo", Listener::closure(|_, _| Ok(())), 0);
        assert!(registry.has_listeners(None));
        assert!(registry.has_listeners(Some("foo")));
        assert!(!registry.has_listeners(Some("bar")));
    }

    #[test]
    fn test_priority_ordering() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();

        registry.add_listener("foo", recorder(&log, "low"), -10);
        registry.add_listener("foo", recorder(&log, "first"), 0);
        registry.add_listener("foo", recorder(&log, "high"), 10);
        registry.add_listener("foo", recorder(&log, "second"), 0);

        registry.dispatch_default("foo").unwrap();
        assert_eq!(*log.lock(), vec!["high", "first", "second", "low"]);
    }

    #[test]
    fn test_stop_propagation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();

        let stop_log = Arc::clone(&log);
        registry.add_listener(
            "foo",
            Listener::closure(move |event, _| {
                stop_log.lock().push("stopper");
                event.stop_propagation();
                Ok(())
            }),
            0,
        );
        registry.add_listener("foo", recorder(&log, "skipped"), 0);

        let event = registry.dispatch_default("foo").unwrap();
        assert!(event.is_propagation_stopped());
        assert_eq!(*log.lock(), vec!["stopper"]);
    }

    #[test]
    fn test_listener_failure_stops_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();

        registry.add_listener("foo", Listener::function("explode", |_, _| Err("boom".into())), 0);
        registry.add_listener("foo", recorder(&log, "after"), 0);

        let err = registry.dispatch_default("foo").unwrap_err();
        match err {
            DispatchError::ListenerFailed { event, listener, source } => {
                assert_eq!(event, "foo");
                assert_eq!(listener, "explode");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_unknown_event_is_not_an_error() {
        let registry = ListenerRegistry::new();
        let event = registry.dispatch_default("nothing.here").unwrap();
        assert!(!event.is_propagation_stopped());
    }

    #[test]
    fn test_add_remove_subscriber() {
        let registry = ListenerRegistry::new();
        let search = Arc::new(Search {
            hits: Mutex::new(Vec::new()),
        });
        let subscriber: Arc<dyn EventSubscriber> = search.clone();

        registry.add_subscriber(Arc::clone(&subscriber)).unwrap();
        let listeners = registry.listeners("foo");
        assert_eq!(listeners.len(), 1);
        assert!(listeners[0].is_bound_to(&subscriber, "call"));
        assert_eq!(registry.len(), 2);

        registry.dispatch_default("foo").unwrap();
        registry.dispatch_default("bar").unwrap();
        assert_eq!(*search.hits.lock(), vec!["foo:call", "bar:index"]);

        registry.remove_subscriber(&subscriber);
        assert!(registry.listeners("foo").is_empty());
        assert!(!registry.has_listeners(None));
    }

    #[test]
    fn test_all_listeners_sorted_by_event() {
        let registry = ListenerRegistry::new();
        registry.add_listener("zeta", Listener::closure(|_, _| Ok(())), 0);
        registry.add_listener("alpha", Listener::closure(|_, _| Ok(())), 0);

        let names: Vec<String> = registry
            .all_listeners()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_listener_registers_during_dispatch() {
        let registry = Arc::new(ListenerRegistry::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let late = recorder(&log, "late");
        registry.add_listener(
            "foo",
            Listener::closure(move |_, ctx| {
                ctx.dispatcher().add_listener("foo", late.clone(), 0);
                Ok(())
            }),
            0,
        );

        registry.dispatch_default("foo").unwrap();
        assert!(log.lock().is_empty());
        assert_eq!(registry.listeners("foo").len(), 2);
    }

    #[test]
    fn test_nested_dispatch_uses_context() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.add_listener(
            "outer",
            Listener::closure(|_, ctx| {
                ctx.dispatcher().dispatch_default("inner")?;
                Ok(())
            }),
            0,
        );
        registry.add_listener("inner", recorder(&log, "inner"), 0);

        registry.dispatch_default("outer").unwrap();
        assert_eq!(*log.lock(), vec!["inner"]);
    }
}
