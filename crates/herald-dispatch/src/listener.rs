//! Listener handles.
//!
//! A [`Listener`] is a cheaply clonable handle around a callback plus the
//! metadata describing what kind of callable it is. Rust cannot introspect
//! closures, so the shape of the callable (closure, named function, bound
//! method, static method) is declared when the handle is built, and the
//! registration site is captured with `#[track_caller]`.

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::dispatcher::EventDispatcher;
use crate::error::ListenerResult;
use crate::event::Event;

/// Closure type stored inside a [`Listener`].
pub type ListenerFn = dyn Fn(&mut dyn Event, &ListenerContext<'_>) -> ListenerResult + Send + Sync;

/// Context handed to a listener alongside the event.
///
/// The dispatcher is the one driving the current dispatch, which is the
/// outermost decorator when dispatchers are stacked. Listeners that dispatch
/// nested events should go through it.
pub struct ListenerContext<'a> {
    event_name: &'a str,
    dispatcher: &'a dyn EventDispatcher,
}

impl<'a> ListenerContext<'a> {
    /// Create a new listener context.
    pub fn new(event_name: &'a str, dispatcher: &'a dyn EventDispatcher) -> Self {
        Self {
            event_name,
            dispatcher,
        }
    }

    /// Name of the event being dispatched.
    pub fn event_name(&self) -> &'a str {
        self.event_name
    }

    /// The dispatcher driving this dispatch.
    pub fn dispatcher(&self) -> &'a dyn EventDispatcher {
        self.dispatcher
    }
}

impl fmt::Debug for ListenerContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerContext")
            .field("event_name", &self.event_name)
            .finish()
    }
}

/// The declared shape of a listener's callable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Callable {
    /// A named free function.
    Function {
        /// The function name.
        name: Cow<'static, str>,
    },
    /// An anonymous closure.
    Closure,
    /// A method bound to an instance.
    Method {
        /// Fully qualified type name of the instance.
        owner: &'static str,
        /// The method name.
        method: Cow<'static, str>,
    },
    /// A method referenced through its type, without an instance.
    StaticMethod {
        /// Fully qualified type name.
        owner: &'static str,
        /// The method name.
        method: Cow<'static, str>,
    },
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function { name } => write!(f, "{}", name),
            Callable::Closure => write!(f, "closure"),
            Callable::Method { owner, method } | Callable::StaticMethod { owner, method } => {
                write!(f, "{}::{}", owner, method)
            }
        }
    }
}

/// A handle to a listener callback.
///
/// Handles compare by identity:
///
/// - closures are equal when they share the same callback allocation
///   (i.e. one is a clone of the other);
/// - named functions are equal when their names match;
/// - bound methods are equal when bound to the same instance with the same
///   method name;
/// - static methods are equal when owner type and method name match.
#[derive(Clone)]
pub struct Listener {
    callback: Arc<ListenerFn>,
    callable: Callable,
    bound_to: Option<usize>,
    location: Option<&'static Location<'static>>,
}

impl Listener {
    /// Create a listener from an anonymous closure.
    #[track_caller]
    pub fn closure<F>(callback: F) -> Self
    where
        F: Fn(&mut dyn Event, &ListenerContext<'_>) -> ListenerResult + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            callable: Callable::Closure,
            bound_to: None,
            location: Some(Location::caller()),
        }
    }

    /// Create a listener from a named function.
    #[track_caller]
    pub fn function<F>(name: impl Into<Cow<'static, str>>, callback: F) -> Self
    where
        F: Fn(&mut dyn Event, &ListenerContext<'_>) -> ListenerResult + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            callable: Callable::Function { name: name.into() },
            bound_to: None,
            location: Some(Location::caller()),
        }
    }

    /// Create a listener bound to a method of `owner`.
    ///
    /// The handle keeps `owner` alive for as long as it is registered.
    #[track_caller]
    pub fn method<T, F>(owner: &Arc<T>, method: impl Into<Cow<'static, str>>, callback: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &mut dyn Event, &ListenerContext<'_>) -> ListenerResult + Send + Sync + 'static,
    {
        let instance = Arc::clone(owner);
        Self {
            callback: Arc::new(move |event: &mut dyn Event, ctx: &ListenerContext<'_>| {
                callback(&instance, event, ctx)
            }),
            callable: Callable::Method {
                owner: std::any::type_name::<T>(),
                method: method.into(),
            },
            bound_to: Some(Arc::as_ptr(owner) as *const () as usize),
            location: Some(Location::caller()),
        }
    }

    /// Create a listener referring to a type-level method of `T`.
    #[track_caller]
    pub fn static_method<T, F>(method: impl Into<Cow<'static, str>>, callback: F) -> Self
    where
        T: ?Sized + 'static,
        F: Fn(&mut dyn Event, &ListenerContext<'_>) -> ListenerResult + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            callable: Callable::StaticMethod {
                owner: std::any::type_name::<T>(),
                method: method.into(),
            },
            bound_to: None,
            location: Some(Location::caller()),
        }
    }

    /// Build a bound-method listener from raw parts.
    ///
    /// Used when the owner is only known as a trait object.
    pub(crate) fn bound(
        owner_addr: usize,
        owner: &'static str,
        method: Cow<'static, str>,
        callback: Arc<ListenerFn>,
    ) -> Self {
        Self {
            callback,
            callable: Callable::Method { owner, method },
            bound_to: Some(owner_addr),
            location: None,
        }
    }

    /// Create a listener with the same identity metadata but a new callback.
    ///
    /// Decorators use this to substitute instrumented callbacks while keeping
    /// the original's description.
    pub fn wrap<F>(&self, callback: F) -> Self
    where
        F: Fn(&mut dyn Event, &ListenerContext<'_>) -> ListenerResult + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            callable: self.callable.clone(),
            bound_to: self.bound_to,
            location: self.location,
        }
    }

    /// Invoke the listener.
    pub fn call(&self, event: &mut dyn Event, ctx: &ListenerContext<'_>) -> ListenerResult {
        (self.callback)(event, ctx)
    }

    /// The declared callable shape.
    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    /// Where the listener was built, when known.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        self.location
    }

    /// Check whether this listener is bound to `owner` through `method`.
    pub fn is_bound_to<T: ?Sized>(&self, owner: &Arc<T>, method: &str) -> bool {
        let addr = Arc::as_ptr(owner) as *const () as usize;
        match &self.callable {
            Callable::Method { method: m, .. } => self.bound_to == Some(addr) && m == method,
            _ => false,
        }
    }

    /// Check whether this listener is bound to the instance at `owner_addr`.
    pub(crate) fn bound_address(&self) -> Option<usize> {
        self.bound_to
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        match (&self.callable, &other.callable) {
            (Callable::Closure, Callable::Closure) => {
                Arc::as_ptr(&self.callback) as *const () == Arc::as_ptr(&other.callback) as *const ()
            }
            (Callable::Method { method: a, .. }, Callable::Method { method: b, .. }) => {
                self.bound_to == other.bound_to && a == b
            }
            (Callable::Function { .. }, Callable::Function { .. })
            | (Callable::StaticMethod { .. }, Callable::StaticMethod { .. }) => {
                self.callable == other.callable
            }
            _ => false,
        }
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Listener");
        s.field("callable", &self.callable);
        if let Some(location) = self.location {
            s.field("location", &format_args!("{}:{}", location.file(), location.line()));
        }
        s.finish()
    }
}

impl fmt::Display for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.callable.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mailer;

    fn noop() -> Listener {
        Listener::closure(|_, _| Ok(()))
    }

    #[test]
    fn test_closure_identity() {
        let a = noop();
        let b = noop();

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.callable(), &Callable::Closure);
    }

    #[test]
    fn test_function_identity() {
        let a = Listener::function("on_boot", |_, _| Ok(()));
        let b = Listener::function("on_boot", |_, _| Ok(()));
        let c = Listener::function("on_halt", |_, _| Ok(()));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "on_boot");
    }

    #[test]
    fn test_method_identity() {
        let first = Arc::new(Mailer);
        let second = Arc::new(Mailer);

        let a = Listener::method(&first, "send", |_: &Mailer, _, _| Ok(()));
        let b = Listener::method(&first, "send", |_: &Mailer, _, _| Ok(()));
        let c = Listener::method(&second, "send", |_: &Mailer, _, _| Ok(()));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_bound_to(&first, "send"));
        assert!(!a.is_bound_to(&first, "queue"));
        assert!(!a.is_bound_to(&second, "send"));
    }

    #[test]
    fn test_static_method_identity() {
        let a = Listener::static_method::<Mailer, _>("flush", |_, _| Ok(()));
        let b = Listener::static_method::<Mailer, _>("flush", |_, _| Ok(()));

        assert_eq!(a, b);
        assert!(a.to_string().ends_with("Mailer::flush"));
    }

    #[test]
    fn test_location_is_captured() {
        let listener = noop();
        let location = listener.location().unwrap();
        assert!(location.file().ends_with("listener.rs"));
    }

    #[test]
    fn test_wrap_keeps_metadata() {
        let owner = Arc::new(Mailer);
        let original = Listener::method(&owner, "send", |_: &Mailer, _, _| Ok(()));
        let wrapped = original.wrap(|_, _| Ok(()));

        assert_eq!(wrapped.callable(), original.callable());
        assert_eq!(wrapped.location(), original.location());
    }
}
