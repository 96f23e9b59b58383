#![forbid(unsafe_code)]

//! Host model for pwire.
//!
//! `pwire-core` is the deterministic stand-in for a browser page that the
//! runtime crates are written against: an arena [`Document`](dom::Document)
//! with markup parsing, events with bubbling dispatch, attribute watches,
//! intersection and resize observers, and a [`Window`](window::Window) that
//! owns a virtual clock. The host drives everything; nothing here spawns
//! threads or blocks.

pub mod dom;
pub mod event;
pub mod logging;
pub mod markup;
pub mod observer;
pub mod timer;
pub mod window;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

pub use dom::{Document, MutationRecord, NodeId, NodeKind, WatchId};
pub use event::{Event, EventDetail, KeyModifiers, ListenerId};
pub use markup::MarkupError;
pub use observer::{IntersectionEntry, IntersectionObserver, ResizeEntry, ResizeObserver};
pub use timer::TimerId;
pub use window::{Download, Window};
