//! Utility primitives shared by the engines.
//!
//! - **Debounce**: last-write-wins deferred values driven by explicit instants
//! - **Scroll geometry**: bottom-proximity test and minimal scroll-into-view
//!
//! Both are pure: callers pass the current time or layout in, so the engines
//! stay testable without a runtime or a rendering surface.

mod debounce;
mod scroll;

pub use debounce::Debounced;
pub use scroll::{close_to_bottom, scroll_into_view, Direction, ScrollMetrics, TargetBox};
