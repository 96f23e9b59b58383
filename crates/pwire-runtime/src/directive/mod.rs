#![forbid(unsafe_code)]

//! Namespaced markup directives.
//!
//! Elements opt in with the marker class (`data` by default) and carry
//! attributes under the runtime namespace (`p:` by default):
//!
//! ```text
//! <div class="data"
//!      p:init="setup"
//!      p:init-vis="draw"
//!      p:tooltip="#help"
//!      p:on-click,resize="refresh"
//!      p:on-objchange(p.config.grid)="redraw">
//! ```
//!
//! [`grammar`] parses the attributes; [`process_subtree`] applies them.

pub mod grammar;
mod processor;

pub use grammar::{Binding, DirectiveSet, EventSpec, ObjectPath, TooltipSource};
pub use processor::{HAS_TOOLTIP_CLASS, PROCESSED_CLASS, ProcessReport, process_subtree};
