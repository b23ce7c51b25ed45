//! Herald Stopwatch
//!
//! This crate provides the timing facility used by Herald's instrumented
//! dispatcher:
//!
//! - Named periods via [`Stopwatch::start`] and [`PeriodGuard`]
//! - Sections grouping the periods of one unit of work
//! - Snapshots of per-event timing data via [`Stopwatch::section_events`]
//!
//! # Timing Model
//!
//! 1. **Events**: A named series of periods with a category
//! 2. **Nesting**: Starting a running event again nests a period inside it
//! 3. **Sections**: Events live in the innermost open section
//! 4. **Tokens**: A closed section is stored under a token and can be reopened
//!
//! ## Periods
//!
//! [`PeriodGuard`] stops its period on drop, so a period is closed on every
//! exit path, including errors and panics in the measured code.
//!
//! ```
//! use herald_stopwatch::{Stopwatch, ROOT_SECTION};
//!
//! let stopwatch = Stopwatch::new();
//! {
//!     let _outer = stopwatch.start("kernel.request", "section");
//!     let _inner = stopwatch.start("kernel.request.loading", "event_listener_loading");
//! }
//!
//! let events = stopwatch.section_events(ROOT_SECTION);
//! assert_eq!(events.len(), 2);
//! assert!(events.iter().all(|(_, e)| !e.running));
//! ```
//!
//! ## Sections
//!
//! ```
//! use herald_stopwatch::Stopwatch;
//!
//! let stopwatch = Stopwatch::new();
//! let token = Stopwatch::generate_token();
//!
//! stopwatch.open_section(None)?;
//! stopwatch.stop_section(&token)?;
//!
//! // Reopen later to append more events to the same section.
//! stopwatch.open_section(Some(&token))?;
//! stopwatch.stop_section(&token)?;
//! # Ok::<(), herald_stopwatch::StopwatchError>(())
//! ```

pub mod error;
pub mod event;
pub mod section;
pub mod stopwatch;

// Re-export main types
pub use error::{StopwatchError, StopwatchResult};
pub use event::{EventSnapshot, Period, StopwatchEvent};
pub use section::Section;
pub use stopwatch::{
    CHILD_SECTION_EVENT, PeriodGuard, ROOT_SECTION, SECTION_CATEGORY, SECTION_EVENT, Stopwatch,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{StopwatchError, StopwatchResult};
    pub use crate::event::EventSnapshot;
    pub use crate::stopwatch::{PeriodGuard, ROOT_SECTION, Stopwatch};
}
