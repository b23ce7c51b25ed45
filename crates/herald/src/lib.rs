//! # Herald - Instrumented Event Dispatch
//!
//! Herald wraps a publish/subscribe event dispatcher with instrumentation:
//! every listener invocation is timed, recorded as called or not called, and
//! reported to a debug logger, without changing dispatch order or
//! stop-propagation semantics.
//!
//! ## Features
//!
//! - **Listener Registry**: Priority-ordered listeners and subscribers
//! - **Timing**: Per-event and per-listener stopwatch periods, grouped in sections
//! - **Call Tracking**: Called / not-called listeners keyed `event.pretty`
//! - **Debug Logging**: One message per notification, stop and skip
//!
//! ## Quick Start
//!
//! ```
//! use herald::prelude::*;
//!
//! let dispatcher = Herald::builder().build()?;
//!
//! dispatcher.add_listener("user.created", Listener::function("send_welcome", |_, _| Ok(())), 0);
//! dispatcher.add_listener("user.deleted", Listener::closure(|_, _| Ok(())), 0);
//!
//! dispatcher.dispatch_default("user.created")?;
//!
//! assert!(dispatcher.called_listeners().contains_key("user.created.send_welcome"));
//! assert!(dispatcher.not_called_listeners().contains_key("user.deleted.closure"));
//! # Ok::<(), herald::HeraldError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Your Application                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                     herald (facade)                     │
//! │                    ┌─────────────────┐                  │
//! │                    │ Herald Builder  │                  │
//! │                    └────────┬────────┘                  │
//! │                             │                           │
//! │  ┌────────────────┬─────────┴────────┬───────────────┐  │
//! │  │ herald-trace   │ herald-dispatch  │ herald-       │  │
//! │  │ (traceable     │ (registry,       │ stopwatch     │  │
//! │  │  dispatcher)   │  subscribers)    │ (sections)    │  │
//! │  └────────────────┴──────────────────┴───────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use herald_dispatch::{DispatchError, EventDispatcher, EventSubscriber, ListenerRegistry};
use herald_stopwatch::Stopwatch;
use herald_trace::{DebugLogger, TraceConfig, TraceError, TraceableDispatcher, TracingLogger};
use tracing::debug;
use tracing_subscriber::EnvFilter;

// Re-export from sub-crates
pub use herald_dispatch;
pub use herald_stopwatch;
pub use herald_trace;

/// Main entry point for Herald.
pub struct Herald;

impl Herald {
    /// Create a new dispatcher builder.
    pub fn builder() -> HeraldBuilder {
        HeraldBuilder::new()
    }

    /// Create a dispatcher with default configuration.
    pub fn with_defaults() -> Result<TraceableDispatcher, HeraldError> {
        HeraldBuilder::new().build()
    }
}

/// Builder wiring a registry, a stopwatch and a logger into a
/// [`TraceableDispatcher`].
///
/// By default a fresh [`ListenerRegistry`] and [`Stopwatch`] are created and
/// no logger is attached.
pub struct HeraldBuilder {
    registry: Option<Arc<dyn EventDispatcher>>,
    stopwatch: Option<Arc<Stopwatch>>,
    timing: bool,
    logger: Option<Arc<dyn DebugLogger>>,
    config: TraceConfig,
    config_file: Option<PathBuf>,
    subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl HeraldBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            registry: None,
            stopwatch: None,
            timing: true,
            logger: None,
            config: TraceConfig::default(),
            config_file: None,
            subscribers: Vec::new(),
        }
    }

    // Collaborators

    /// Decorate an existing dispatcher instead of a fresh registry.
    pub fn with_registry(mut self, registry: Arc<dyn EventDispatcher>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Record periods on a shared stopwatch.
    pub fn with_stopwatch(mut self, stopwatch: Arc<Stopwatch>) -> Self {
        self.stopwatch = Some(stopwatch);
        self.timing = true;
        self
    }

    /// Disable timing entirely.
    pub fn without_stopwatch(mut self) -> Self {
        self.stopwatch = None;
        self.timing = false;
        self
    }

    /// Report dispatch decisions to `logger`.
    pub fn with_logger(mut self, logger: Arc<dyn DebugLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Report dispatch decisions through `tracing`.
    pub fn with_tracing_logger(self) -> Self {
        self.with_logger(Arc::new(TracingLogger::new()))
    }

    // Configuration

    /// Set the tracing configuration.
    pub fn with_config(mut self, config: TraceConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the tracing configuration from a TOML file at build time.
    pub fn with_config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    // Listeners

    /// Register a subscriber at build time.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Build the dispatcher.
    ///
    /// # Errors
    ///
    /// Fails if the configuration file cannot be read or parsed, or if a
    /// subscriber's description is invalid.
    pub fn build(self) -> Result<TraceableDispatcher, HeraldError> {
        let config = match &self.config_file {
            Some(path) => load_config(path)?,
            None => self.config,
        };

        let registry = self
            .registry
            .unwrap_or_else(|| ListenerRegistry::new().into_shared());
        let mut dispatcher = TraceableDispatcher::new(registry).with_config(config);

        if self.timing {
            let stopwatch = self
                .stopwatch
                .unwrap_or_else(|| Stopwatch::new().into_shared());
            dispatcher = dispatcher.with_stopwatch(stopwatch);
        }
        if let Some(logger) = self.logger {
            dispatcher = dispatcher.with_logger(logger);
        }

        for subscriber in self.subscribers {
            dispatcher.add_subscriber(subscriber)?;
        }

        debug!(dispatcher = ?dispatcher, "Herald dispatcher built");
        Ok(dispatcher)
    }
}

impl Default for HeraldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn load_config(path: &Path) -> Result<TraceConfig, HeraldError> {
    let source = std::fs::read_to_string(path).map_err(|source| HeraldError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(TraceConfig::from_toml_str(&source)?)
}

/// Install a `tracing` subscriber printing Herald's logs.
///
/// `RUST_LOG` takes precedence over `default_level`.
///
/// # Errors
///
/// Returns [`HeraldError::Logging`] if a global subscriber is already set.
pub fn init_logging(default_level: &str) -> Result<(), HeraldError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("herald={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| HeraldError::Logging(err.to_string()))
}

/// Errors from building or using a Herald dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum HeraldError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {}: {source}", .path.display())]
    ConfigRead {
        /// Path of the configuration file.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Tracing layer error.
    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    /// Dispatch error.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Logging could not be initialized.
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{Herald, HeraldBuilder, HeraldError};

    // Dispatch types
    pub use herald_dispatch::{
        BaseEvent, DEFAULT_PRIORITY, DispatchError, Event, EventDispatcher, EventSubscriber,
        Listener, ListenerContext, ListenerRegistry, ListenerResult, Subscription,
    };

    // Timing types
    pub use herald_stopwatch::{ROOT_SECTION, Stopwatch};

    // Tracing types
    pub use herald_trace::{
        CallRecord, CollectingLogger, DebugLogger, EventReport, LifecycleEvents, TraceConfig,
        TraceableDispatcher, TracingLogger,
    };

    // Common std types
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use parking_lot::Mutex;
    use tracing_subscriber::util::SubscriberInitExt;

    /// Minimal request cycle firing the lifecycle events the way a kernel
    /// handling one request would.
    fn handle_request(dispatcher: &TraceableDispatcher, token: &str) -> Result<(), DispatchError> {
        dispatcher.dispatch_default("kernel.request")?;
        dispatcher.dispatch_default("kernel.controller")?;

        let mut response = BaseEvent::new().with_section_token(token);
        dispatcher.dispatch("kernel.response", &mut response)?;
        dispatcher.dispatch("kernel.terminate", &mut response)?;
        Ok(())
    }

    fn names(events: &[(String, herald_stopwatch::EventSnapshot)]) -> Vec<&str> {
        events.iter().map(|(name, _)| name.as_str()).collect()
    }

    struct Mailer {
        sent: Mutex<Vec<String>>,
    }

    impl EventSubscriber for Mailer {
        fn subscribed_events(&self) -> Vec<Subscription> {
            vec![
                Subscription::method("kernel.response", "on_response"),
                Subscription::new("kernel.terminate").with_method("flush", -10),
            ]
        }

        fn handle(
            &self,
            method: &str,
            _: &mut dyn Event,
            ctx: &ListenerContext<'_>,
        ) -> ListenerResult {
            self.sent
                .lock()
                .push(format!("{}:{}", ctx.event_name(), method));
            Ok(())
        }
    }

    #[test]
    fn test_builder_defaults() {
        let dispatcher = Herald::builder().build().unwrap();
        assert!(dispatcher.stopwatch().is_some());
        assert_eq!(dispatcher.config(), &TraceConfig::default());

        let dispatcher = Herald::builder().without_stopwatch().build().unwrap();
        assert!(dispatcher.stopwatch().is_none());
    }

    #[test]
    fn test_request_lifecycle_sections() {
        let stopwatch = Stopwatch::new().into_shared();
        let dispatcher = Herald::builder()
            .with_stopwatch(Arc::clone(&stopwatch))
            .build()
            .unwrap();

        handle_request(&dispatcher, "a1b2c3").unwrap();

        assert_eq!(
            names(&stopwatch.section_events("a1b2c3")),
            vec![
                "__section__",
                "kernel.request",
                "kernel.request.loading",
                "kernel.controller",
                "kernel.controller.loading",
                "controller",
                "kernel.response",
                "kernel.response.loading",
                "kernel.terminate",
                "kernel.terminate.loading",
            ]
        );
        assert_eq!(stopwatch.depth(), 0);
    }

    #[test]
    fn test_request_lifecycle_with_subscriber() {
        let mailer = Arc::new(Mailer {
            sent: Mutex::new(Vec::new()),
        });
        let stopwatch = Stopwatch::new().into_shared();
        let dispatcher = Herald::builder()
            .with_stopwatch(Arc::clone(&stopwatch))
            .with_subscriber(mailer.clone())
            .build()
            .unwrap();

        handle_request(&dispatcher, "req-1").unwrap();

        assert_eq!(
            *mailer.sent.lock(),
            vec!["kernel.response:on_response", "kernel.terminate:flush"]
        );

        let called = dispatcher.called_listeners();
        let owner = herald_trace::short_type_name(std::any::type_name::<Mailer>());
        let key = format!("kernel.response.{}::on_response", owner);
        assert_eq!(called[&key].kind, herald_trace::ListenerType::Method);
        assert!(dispatcher.not_called_listeners().is_empty());

        let events = names(&stopwatch.section_events("req-1"))
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        assert!(events.contains(&key));
        assert!(events.contains(&format!("kernel.terminate.{}::flush", owner)));
    }

    #[test]
    fn test_reset_between_requests() {
        let dispatcher = Herald::builder().build().unwrap();
        dispatcher.add_listener("kernel.request", Listener::function("route", |_, _| Ok(())), 0);

        handle_request(&dispatcher, "first").unwrap();
        assert!(dispatcher.called_listeners().contains_key("kernel.request.route"));

        dispatcher.reset();
        assert!(dispatcher.called_listeners().is_empty());
        assert!(
            dispatcher
                .not_called_listeners()
                .contains_key("kernel.request.route")
        );

        handle_request(&dispatcher, "second").unwrap();
        assert!(dispatcher.called_listeners().contains_key("kernel.request.route"));
        assert_eq!(dispatcher.last_section_token().as_deref(), Some("second"));
    }

    #[test]
    fn test_nested_dispatch_inside_section() {
        let stopwatch = Stopwatch::new().into_shared();
        let logger = Arc::new(CollectingLogger::default());
        let dispatcher = Herald::builder()
            .with_stopwatch(Arc::clone(&stopwatch))
            .with_logger(logger.clone())
            .build()
            .unwrap();

        dispatcher.add_listener(
            "kernel.controller",
            Listener::function("resolve", |_, ctx| {
                ctx.dispatcher().dispatch_default("controller.resolved")?;
                Ok(())
            }),
            0,
        );
        dispatcher.add_listener("controller.resolved", Listener::closure(|_, _| Ok(())), 0);

        handle_request(&dispatcher, "nested").unwrap();

        let events = stopwatch.section_events("nested");
        let listing = names(&events);
        let resolve = listing.iter().position(|n| *n == "kernel.controller.resolve").unwrap();
        let nested = listing.iter().position(|n| *n == "controller.resolved").unwrap();
        assert!(resolve < nested);
        assert!(events.iter().all(|(_, e)| !e.running));

        assert_eq!(
            logger.messages(),
            vec![
                "Notified event \"controller.resolved\" to listener \"closure\".",
                "Notified event \"kernel.controller\" to listener \"resolve\".",
            ]
        );
    }

    #[test]
    fn test_report() {
        let dispatcher = Herald::builder().build().unwrap();
        dispatcher.add_listener("kernel.request", Listener::function("route", |_, _| Ok(())), 0);
        dispatcher.add_listener("app.idle", Listener::closure(|_, _| Ok(())), 0);

        handle_request(&dispatcher, "report").unwrap();

        let report = dispatcher.report();
        assert_eq!(report.token.as_deref(), Some("report"));
        assert!(report.called.contains_key("kernel.request.route"));
        assert!(report.not_called.contains_key("app.idle.closure"));

        let text = report.to_text();
        assert!(text.contains("Event Report: report"));
        assert!(text.contains("kernel.request.route [Function]"));

        let json = report.to_json();
        assert_eq!(json["not_called"]["app.idle.closure"]["event"], "app.idle");
        assert_eq!(json["timings"][0]["name"], "__section__");
    }

    #[test]
    fn test_config_file() {
        let path = std::env::temp_dir().join(format!("herald-config-{}.toml", std::process::id()));
        std::fs::write(&path, "time_listeners = false\nlifecycle = false\n").unwrap();

        let dispatcher = Herald::builder().with_config_file(&path).build().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(!dispatcher.config().time_listeners);
        assert!(dispatcher.config().lifecycle.is_none());
    }

    #[test]
    fn test_config_file_errors() {
        let missing = std::env::temp_dir().join("herald-missing-config.toml");
        let err = Herald::builder().with_config_file(&missing).build().unwrap_err();
        assert!(matches!(err, HeraldError::ConfigRead { .. }));

        let path = std::env::temp_dir().join(format!("herald-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "time_events = 3").unwrap();
        let err = Herald::builder().with_config_file(&path).build().unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, HeraldError::Trace(TraceError::Config(_))));
    }

    #[test]
    fn test_invalid_subscriber() {
        struct Empty;

        impl EventSubscriber for Empty {
            fn subscribed_events(&self) -> Vec<Subscription> {
                vec![Subscription::new("foo")]
            }

            fn handle(&self, _: &str, _: &mut dyn Event, _: &ListenerContext<'_>) -> ListenerResult {
                Ok(())
            }
        }

        let err = Herald::builder()
            .with_subscriber(Arc::new(Empty))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            HeraldError::Dispatch(DispatchError::InvalidSubscription { .. })
        ));
    }

    #[test]
    fn test_tracing_logger() {
        let _guard = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .set_default();

        let dispatcher = Herald::builder().with_tracing_logger().build().unwrap();
        dispatcher.add_listener("foo", Listener::closure(|_, _| Ok(())), 0);
        dispatcher.dispatch_default("foo").unwrap();
        assert!(dispatcher.called_listeners().contains_key("foo.closure"));
    }

    #[test]
    fn test_init_logging_once() {
        assert!(init_logging("debug").is_ok());
        assert!(matches!(init_logging("debug"), Err(HeraldError::Logging(_))));
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _dispatcher: TraceableDispatcher = Herald::with_defaults().unwrap();
    }
}
