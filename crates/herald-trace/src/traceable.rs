//! The instrumented dispatcher.
//!
//! [`TraceableDispatcher`] decorates any [`EventDispatcher`]. Registration
//! calls are forwarded unchanged. Each dispatch substitutes wrapped copies
//! of the listeners into the inner dispatcher's
//! [`dispatch_listeners`](EventDispatcher::dispatch_listeners), so ordering
//! and stop semantics stay the inner dispatcher's while every invocation is
//! timed, logged and recorded.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use herald_dispatch::{
    DispatchResult, Event, EventDispatcher, EventSubscriber, Listener, ListenerContext,
    ListenerResult,
};
use herald_stopwatch::{EventSnapshot, PeriodGuard, ROOT_SECTION, SECTION_CATEGORY, Stopwatch};

use crate::calls::{CallCollector, CallRecord, CallRecords};
use crate::config::{LifecyclePhase, TraceConfig};
use crate::error::{TraceError, TraceResult};
use crate::identity::ListenerIdentity;
use crate::logger::DebugLogger;
use crate::report::EventReport;

/// Category of per-listener periods.
pub const LISTENER_CATEGORY: &str = "event_listener";

/// Category of the `.loading` periods.
pub const LOADING_CATEGORY: &str = "event_listener_loading";

/// Period started after the controller event and stopped on response.
pub const CONTROLLER_PERIOD: &str = "controller";

/// An [`EventDispatcher`] decorator recording what each dispatch did.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use herald_dispatch::{EventDispatcher, Listener, ListenerRegistry};
/// use herald_stopwatch::Stopwatch;
/// use herald_trace::TraceableDispatcher;
///
/// let dispatcher = TraceableDispatcher::new(ListenerRegistry::new().into_shared())
///     .with_stopwatch(Stopwatch::new().into_shared());
///
/// dispatcher.add_listener("foo", Listener::closure(|_, _| Ok(())), 0);
/// assert!(dispatcher.called_listeners().is_empty());
/// assert!(dispatcher.not_called_listeners().contains_key("foo.closure"));
///
/// dispatcher.dispatch_default("foo").unwrap();
/// assert!(dispatcher.called_listeners().contains_key("foo.closure"));
/// assert!(dispatcher.not_called_listeners().is_empty());
/// ```
pub struct TraceableDispatcher {
    inner: Arc<dyn EventDispatcher>,
    stopwatch: Option<Arc<Stopwatch>>,
    logger: Option<Arc<dyn DebugLogger>>,
    config: TraceConfig,
    calls: Arc<CallCollector>,
    last_section_token: Mutex<Option<String>>,
}

impl TraceableDispatcher {
    /// Decorate `inner` with no stopwatch and no logger attached.
    pub fn new(inner: Arc<dyn EventDispatcher>) -> Self {
        Self {
            inner,
            stopwatch: None,
            logger: None,
            config: TraceConfig::default(),
            calls: Arc::new(CallCollector::new()),
            last_section_token: Mutex::new(None),
        }
    }

    /// Attach the stopwatch periods are recorded on.
    pub fn with_stopwatch(mut self, stopwatch: Arc<Stopwatch>) -> Self {
        self.stopwatch = Some(stopwatch);
        self
    }

    /// Attach the logger dispatch decisions are reported to.
    pub fn with_logger(mut self, logger: Arc<dyn DebugLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: TraceConfig) -> Self {
        self.config = config;
        self
    }

    /// Wrap the dispatcher in an [`Arc`].
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// The decorated dispatcher.
    pub fn inner(&self) -> &Arc<dyn EventDispatcher> {
        &self.inner
    }

    /// The attached stopwatch, if any.
    pub fn stopwatch(&self) -> Option<&Arc<Stopwatch>> {
        self.stopwatch.as_ref()
    }

    /// The active configuration.
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Listeners invoked since the last reset, keyed `event.pretty`.
    pub fn called_listeners(&self) -> CallRecords {
        self.calls.called()
    }

    /// Registered listeners with no call record.
    ///
    /// Computed from the inner dispatcher's current listeners, so it includes
    /// listeners of events never dispatched and listeners added after the
    /// last dispatch.
    pub fn not_called_listeners(&self) -> CallRecords {
        let called = self.calls.called();
        let mut not_called = CallRecords::new();

        for (event_name, listeners) in self.inner.all_listeners() {
            for listener in &listeners {
                let identity = ListenerIdentity::of(listener);
                let key = identity.key(&event_name);
                if !called.contains_key(&key) {
                    not_called.insert(key, CallRecord::new(event_name.as_str(), &identity));
                }
            }
        }
        not_called
    }

    /// Listeners skipped because an earlier listener stopped propagation.
    pub fn skipped_listeners(&self) -> CallRecords {
        self.calls.skipped()
    }

    /// Forget every call record. Registrations are untouched.
    pub fn reset(&self) {
        self.calls.reset();
        debug!("Call records reset");
    }

    /// Token of the section closed by the last response event.
    pub fn last_section_token(&self) -> Option<String> {
        self.last_section_token.lock().clone()
    }

    /// Timing data of the section closed under `token`.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::NoStopwatch`] if no stopwatch is attached.
    pub fn section_events(&self, token: &str) -> TraceResult<Vec<(String, EventSnapshot)>> {
        self.stopwatch
            .as_ref()
            .map(|stopwatch| stopwatch.section_events(token))
            .ok_or(TraceError::NoStopwatch)
    }

    /// Snapshot the call records and the timings of the last section.
    ///
    /// Without a closed section, the root section's timings are used.
    pub fn report(&self) -> EventReport {
        let report = EventReport::new(
            self.called_listeners(),
            self.not_called_listeners(),
            self.skipped_listeners(),
        );

        match &self.stopwatch {
            Some(stopwatch) => {
                let token = self
                    .last_section_token()
                    .unwrap_or_else(|| ROOT_SECTION.to_string());
                let events = stopwatch.section_events(&token);
                report.with_timings(token, events)
            }
            None => report,
        }
    }

    fn event_period(&self, name: &str, category: &str) -> Option<PeriodGuard<'_>> {
        if !self.config.time_events {
            return None;
        }
        self.stopwatch
            .as_deref()
            .map(|stopwatch| stopwatch.start(name, category))
    }

    fn dispatch_traced(&self, event_name: &str, event: &mut dyn Event) -> DispatchResult<()> {
        let wrapped = {
            let _loading = self.event_period(&format!("{}.loading", event_name), LOADING_CATEGORY);
            let listeners = self.inner.listeners(event_name);
            if listeners.is_empty() {
                None
            } else {
                Some(self.wrap_listeners(event_name, &listeners))
            }
        };

        match wrapped {
            Some(wrapped) => {
                trace!(event = event_name, listeners = wrapped.len(), "Dispatching traced event");
                self.inner.dispatch_listeners(&wrapped, event_name, event, self)
            }
            None => {
                trace!(event = event_name, "No listeners, passing through");
                self.inner.dispatch(event_name, event)
            }
        }
    }

    fn wrap_listeners(&self, event_name: &str, listeners: &[Listener]) -> Vec<Listener> {
        let tracer = Arc::new(DispatchTracer {
            event_name: event_name.to_string(),
            identities: listeners.iter().map(ListenerIdentity::of).collect(),
            stopwatch: if self.config.time_listeners {
                self.stopwatch.clone()
            } else {
                None
            },
            logger: self.logger.clone(),
            calls: Arc::clone(&self.calls),
            progress: Mutex::new(Progress {
                stopped_at: None,
                skipped: vec![false; listeners.len()],
            }),
        });

        listeners
            .iter()
            .enumerate()
            .map(|(index, listener)| {
                let tracer = Arc::clone(&tracer);
                let original = listener.clone();
                listener.wrap(move |event, ctx| tracer.invoke(index, &original, event, ctx))
            })
            .collect()
    }

    /// Section handling before a lifecycle event is dispatched.
    ///
    /// Returns the token of the section reopened for a terminate event.
    fn before_phase(&self, phase: LifecyclePhase, event: &dyn Event) -> Option<String> {
        let stopwatch = self.stopwatch.as_deref()?;

        match phase {
            LifecyclePhase::Request => {
                if let Err(err) = stopwatch.open_section(None) {
                    warn!(error = %err, "Failed to open section");
                }
                None
            }
            LifecyclePhase::Controller => None,
            LifecyclePhase::Response => {
                if stopwatch.is_started(CONTROLLER_PERIOD) {
                    if let Err(err) = stopwatch.stop(CONTROLLER_PERIOD) {
                        warn!(error = %err, "Failed to stop controller period");
                    }
                }
                None
            }
            LifecyclePhase::Terminate => {
                let token = event
                    .section_token()
                    .map(str::to_string)
                    .or_else(|| self.last_section_token())?;

                match stopwatch.open_section(Some(&token)) {
                    Ok(()) => Some(token),
                    Err(err) => {
                        warn!(token = %token, error = %err, "Failed to reopen section");
                        None
                    }
                }
            }
        }
    }

    /// Section handling after a lifecycle event was dispatched.
    fn after_phase(&self, phase: LifecyclePhase, event: &dyn Event, reopened: Option<String>) {
        let Some(stopwatch) = self.stopwatch.as_deref() else {
            return;
        };

        match phase {
            LifecyclePhase::Request => {}
            LifecyclePhase::Controller => {
                stopwatch.start(CONTROLLER_PERIOD, SECTION_CATEGORY).detach();
            }
            LifecyclePhase::Response => {
                let token = event
                    .section_token()
                    .map(str::to_string)
                    .unwrap_or_else(Stopwatch::generate_token);

                match stopwatch.stop_section(&token) {
                    Ok(()) => {
                        debug!(token = %token, "Section closed on response");
                        *self.last_section_token.lock() = Some(token);
                    }
                    Err(err) => warn!(token = %token, error = %err, "Failed to close section"),
                }
            }
            LifecyclePhase::Terminate => {
                if let Some(token) = reopened {
                    if let Err(err) = stopwatch.stop_section(&token) {
                        warn!(token = %token, error = %err, "Failed to close section");
                    }
                }
            }
        }
    }
}

impl EventDispatcher for TraceableDispatcher {
    fn add_listener(&self, event_name: &str, listener: Listener, priority: i32) {
        self.inner.add_listener(event_name, listener, priority);
    }

    fn remove_listener(&self, event_name: &str, listener: &Listener) {
        self.inner.remove_listener(event_name, listener);
    }

    fn add_subscriber(&self, subscriber: Arc<dyn EventSubscriber>) -> DispatchResult<()> {
        self.inner.add_subscriber(subscriber)
    }

    fn remove_subscriber(&self, subscriber: &Arc<dyn EventSubscriber>) {
        self.inner.remove_subscriber(subscriber);
    }

    fn listeners(&self, event_name: &str) -> Vec<Listener> {
        self.inner.listeners(event_name)
    }

    fn all_listeners(&self) -> Vec<(String, Vec<Listener>)> {
        self.inner.all_listeners()
    }

    fn has_listeners(&self, event_name: Option<&str>) -> bool {
        self.inner.has_listeners(event_name)
    }

    fn dispatch(&self, event_name: &str, event: &mut dyn Event) -> DispatchResult<()> {
        let phase = self.config.phase(event_name);
        let reopened = phase.and_then(|phase| self.before_phase(phase, &*event));

        let result = {
            let _period = self.event_period(event_name, SECTION_CATEGORY);
            self.dispatch_traced(event_name, event)
        };

        if let Some(phase) = phase {
            self.after_phase(phase, &*event, reopened);
        }
        result
    }
}

impl std::fmt::Debug for TraceableDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceableDispatcher")
            .field("stopwatch", &self.stopwatch.is_some())
            .field("logger", &self.logger.is_some())
            .field("config", &self.config)
            .field("calls", &self.calls)
            .finish()
    }
}

struct Progress {
    /// Index of the wrapped listener after which propagation was stopped.
    stopped_at: Option<usize>,
    skipped: Vec<bool>,
}

/// Shared state of the wrapped listeners of one dispatch.
struct DispatchTracer {
    event_name: String,
    identities: Vec<ListenerIdentity>,
    stopwatch: Option<Arc<Stopwatch>>,
    logger: Option<Arc<dyn DebugLogger>>,
    calls: Arc<CallCollector>,
    progress: Mutex<Progress>,
}

impl DispatchTracer {
    fn invoke(
        &self,
        index: usize,
        listener: &Listener,
        event: &mut dyn Event,
        ctx: &ListenerContext<'_>,
    ) -> ListenerResult {
        if self.progress.lock().stopped_at.is_some() {
            self.skip_from(index);
            return Ok(());
        }

        let identity = &self.identities[index];
        let key = identity.key(&self.event_name);
        {
            let _period = self
                .stopwatch
                .as_deref()
                .map(|stopwatch| stopwatch.start(&key, LISTENER_CATEGORY));
            listener.call(event, ctx)?;
        }

        self.log(format!(
            "Notified event \"{}\" to listener \"{}\".",
            self.event_name, identity.pretty
        ));
        self.calls
            .record_called(key, CallRecord::new(self.event_name.as_str(), identity));

        if event.is_propagation_stopped() {
            let first_stop = {
                let mut progress = self.progress.lock();
                let first = progress.stopped_at.is_none();
                if first {
                    progress.stopped_at = Some(index);
                }
                first
            };
            if first_stop && index + 1 < self.identities.len() {
                self.log(format!(
                    "Listener \"{}\" stopped propagation of the event \"{}\".",
                    identity.pretty, self.event_name
                ));
                self.skip_from(index + 1);
            }
        }
        Ok(())
    }

    /// Record listeners `start..` as not called, once each.
    fn skip_from(&self, start: usize) {
        let pending: Vec<usize> = {
            let mut progress = self.progress.lock();
            (start..progress.skipped.len())
                .filter(|&index| !std::mem::replace(&mut progress.skipped[index], true))
                .collect()
        };

        for index in pending {
            let identity = &self.identities[index];
            self.log(format!(
                "Listener \"{}\" was not called for event \"{}\".",
                identity.pretty, self.event_name
            ));
            self.calls.record_skipped(
                identity.key(&self.event_name),
                CallRecord::new(self.event_name.as_str(), identity),
            );
        }
    }

    fn log(&self, message: String) {
        trace!(event = %self.event_name, "{}", message);
        if let Some(logger) = &self.logger {
            logger.debug(&message);
        }
    }
}
