//! Herald Trace
//!
//! This crate provides [`TraceableDispatcher`], a decorator around any
//! [`EventDispatcher`](herald_dispatch::EventDispatcher) that instruments
//! dispatch without changing its semantics:
//!
//! - [`Stopwatch`](herald_stopwatch::Stopwatch) periods per event and per
//!   listener invocation
//! - Called / not-called bookkeeping keyed `event.pretty`
//! - Debug messages for each notification, stop and skip via [`DebugLogger`]
//! - Stopwatch sections driven by request-like lifecycle events
//!
//! # Call Tracking
//!
//! ```
//! use std::sync::Arc;
//! use herald_dispatch::{EventDispatcher, Listener, ListenerRegistry};
//! use herald_trace::{CollectingLogger, DebugLogger, TraceableDispatcher};
//!
//! let logger = Arc::new(CollectingLogger::default());
//! let dispatcher = TraceableDispatcher::new(ListenerRegistry::new().into_shared())
//!     .with_logger(logger.clone() as Arc<dyn DebugLogger>);
//!
//! dispatcher.add_listener("foo", Listener::closure(|event, _| {
//!     event.stop_propagation();
//!     Ok(())
//! }), 0);
//! dispatcher.add_listener("foo", Listener::function("audit", |_, _| Ok(())), 0);
//! dispatcher.dispatch_default("foo")?;
//!
//! assert_eq!(logger.messages(), vec![
//!     "Notified event \"foo\" to listener \"closure\".",
//!     "Listener \"closure\" stopped propagation of the event \"foo\".",
//!     "Listener \"audit\" was not called for event \"foo\".",
//! ]);
//! assert!(dispatcher.not_called_listeners().contains_key("foo.audit"));
//! # Ok::<(), herald_dispatch::DispatchError>(())
//! ```
//!
//! # Configuration
//!
//! ```
//! use herald_trace::TraceConfig;
//!
//! let config = TraceConfig::from_toml_str(r#"
//!     time_listeners = false
//!
//!     [lifecycle]
//!     request = "app.request"
//! "#)?;
//! assert!(!config.time_listeners);
//! # Ok::<(), herald_trace::TraceError>(())
//! ```

pub mod calls;
pub mod config;
pub mod error;
pub mod identity;
pub mod logger;
pub mod report;
pub mod traceable;

// Re-export main types
pub use calls::{CallCollector, CallRecord, CallRecords};
pub use config::{LifecycleEvents, LifecyclePhase, TraceConfig};
pub use error::{TraceError, TraceResult};
pub use identity::{ListenerIdentity, ListenerType, short_type_name};
pub use logger::{CollectingLogger, DebugLogger, LOG_TARGET, TracingLogger};
pub use report::{EventReport, TimingEntry};
pub use traceable::{CONTROLLER_PERIOD, LISTENER_CATEGORY, LOADING_CATEGORY, TraceableDispatcher};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::calls::{CallRecord, CallRecords};
    pub use crate::config::{LifecycleEvents, TraceConfig};
    pub use crate::error::{TraceError, TraceResult};
    pub use crate::logger::{CollectingLogger, DebugLogger, TracingLogger};
    pub use crate::report::EventReport;
    pub use crate::traceable::TraceableDispatcher;
}
