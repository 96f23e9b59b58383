#![forbid(unsafe_code)]

//! Runtime for pwire: observable data and markup directives.
//!
//! # Role in pwire
//! `pwire-runtime` connects page markup to application code. It owns:
//!
//! - [`reactive`]: observable object/array nodes whose writes notify
//!   subscribers on the written node and every ancestor.
//! - [`directive`]: the scan that turns `p:`-namespaced attributes into
//!   handler calls, event bindings, observer hooks, and stored templates.
//! - [`Registry`]: the named handlers, data fields, templates, and observer
//!   singletons the directives resolve against.
//!
//! # How it fits in the system
//! The host builds a [`pwire_core::Window`] over a parsed document, creates a
//! [`Registry`], registers handlers and fields, and calls
//! [`Registry::init`]. Widgets (`pwire-widgets`) are plain handlers
//! registered on the same registry.

pub mod config;
pub mod directive;
pub mod error;
pub mod namespace;
pub mod numeric_input;
pub mod reactive;
pub mod registry;
pub mod template;

pub use config::{ResizeBinding, RuntimeConfig};
pub use directive::{ProcessReport, process_subtree};
pub use error::{ConfigError, DirectiveError, RegistryError, WrapError};
pub use namespace::Subscription;
pub use reactive::{Callable, Change, NodeKey, ObservableNode, Value};
pub use registry::{ChangeRecord, Handler, Registry, Trigger, WeakRegistry};
pub use template::TemplateStore;
