//! Event objects passed to listeners.
//!
//! An event is a mutable object handed to each listener in turn. It carries
//! the cooperative stop-propagation flag that the dispatcher checks between
//! listener invocations.

use std::any::Any;

/// An event that can be dispatched to listeners.
///
/// Implementors own the propagation flag. Once [`Event::stop_propagation`]
/// has been called, no further listeners are invoked for the current
/// dispatch.
///
/// # Example
///
/// ```
/// use std::any::Any;
/// use herald_dispatch::Event;
///
/// #[derive(Default)]
/// struct OrderPlaced {
///     order_id: u64,
///     stopped: bool,
/// }
///
/// impl Event for OrderPlaced {
///     fn is_propagation_stopped(&self) -> bool {
///         self.stopped
///     }
///
///     fn stop_propagation(&mut self) {
///         self.stopped = true;
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
///
///     fn as_any_mut(&mut self) -> &mut dyn Any {
///         self
///     }
/// }
/// ```
pub trait Event: Any + Send {
    /// Whether a listener has stopped propagation.
    fn is_propagation_stopped(&self) -> bool;

    /// Stop further listeners from being called.
    fn stop_propagation(&mut self);

    /// Token identifying the profiling section this event belongs to.
    ///
    /// Lifecycle events (e.g. a response event) use this to name the timing
    /// section they close. Most events have none.
    fn section_token(&self) -> Option<&str> {
        None
    }

    /// Access the event as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Access the event mutably as [`Any`] for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Event {
    /// Downcast to a concrete event type.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    /// Downcast mutably to a concrete event type.
    pub fn downcast_mut<E: Event>(&mut self) -> Option<&mut E> {
        self.as_any_mut().downcast_mut::<E>()
    }
}

/// The default event, used when a dispatch carries no payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseEvent {
    propagation_stopped: bool,
    section_token: Option<String>,
}

impl BaseEvent {
    /// Create a new event with propagation running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a section token to the event.
    pub fn with_section_token(mut self, token: impl Into<String>) -> Self {
        self.section_token = Some(token.into());
        self
    }

    /// Set or replace the section token.
    pub fn set_section_token(&mut self, token: impl Into<String>) {
        self.section_token = Some(token.into());
    }
}

impl Event for BaseEvent {
    fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    fn section_token(&self) -> Option<&str> {
        self.section_token.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
