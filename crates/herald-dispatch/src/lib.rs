//! Herald Dispatch - Listener Registry
//!
//! This crate provides the plain publish/subscribe dispatcher that Herald's
//! instrumentation decorates. It includes:
//!
//! - [`EventDispatcher`]: The dispatcher contract decorators implement
//! - [`ListenerRegistry`]: Priority-ordered listener table
//! - [`Listener`]: Listener handles with declared callable metadata
//! - [`EventSubscriber`]: Bundles of listener bindings
//! - [`Event`]: Event objects carrying the stop-propagation flag
//!
//! # Quick Start
//!
//! ```
//! use herald_dispatch::prelude::*;
//!
//! let registry = ListenerRegistry::new();
//!
//! registry.add_listener(
//!     "order.placed",
//!     Listener::function("notify_warehouse", |_event, _ctx| Ok(())),
//!     DEFAULT_PRIORITY,
//! );
//! registry.add_listener(
//!     "order.placed",
//!     Listener::closure(|event, _ctx| {
//!         event.stop_propagation();
//!         Ok(())
//!     }),
//!     10,
//! );
//!
//! let event = registry.dispatch_default("order.placed")?;
//! assert!(event.is_propagation_stopped());
//! # Ok::<(), herald_dispatch::DispatchError>(())
//! ```
//!
//! # Dispatch Model
//!
//! 1. **Ordering**: Higher priority first, registration order within a priority
//! 2. **Propagation**: A listener may stop propagation; later listeners are skipped
//! 3. **Failures**: A failing listener aborts the dispatch and its error is returned
//! 4. **Re-entrancy**: Listeners may register listeners or dispatch nested events

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod listener;
pub mod subscriber;

// Re-export main types at crate root
pub use dispatcher::{DEFAULT_PRIORITY, EventDispatcher, ListenerRegistry};
pub use error::{DispatchError, DispatchResult, ListenerError, ListenerResult};
pub use event::{BaseEvent, Event};
pub use listener::{Callable, Listener, ListenerContext, ListenerFn};
pub use subscriber::{EventSubscriber, Subscription};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use herald_dispatch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::dispatcher::{DEFAULT_PRIORITY, EventDispatcher, ListenerRegistry};
    pub use crate::error::{DispatchError, DispatchResult, ListenerResult};
    pub use crate::event::{BaseEvent, Event};
    pub use crate::listener::{Listener, ListenerContext};
    pub use crate::subscriber::{EventSubscriber, Subscription};
}
