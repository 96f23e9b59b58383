#![forbid(unsafe_code)]

//! Error types for the runtime.
//!
//! Resolution failures are values, not panics: lookups return these types
//! and the directive processor reports them through the window's alert
//! channel, then skips only the failing directive.

use std::fmt;

use pwire_core::MarkupError;

/// Wrapping a value that is not an object or array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrapError {
    NotComposite { kind: &'static str },
}

impl fmt::Display for WrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotComposite { kind } => {
                write!(f, "cannot make a {kind} observable: expected object or array")
            }
        }
    }
}

impl std::error::Error for WrapError {}

/// Registry lookups by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No handler registered under this name.
    UnknownHandler(String),
    /// No template stored under this name (or not stored yet).
    UnknownTemplate(String),
    /// No data field under this name.
    UnknownField(String),
    /// The field exists but is not an observable node.
    FieldNotObservable(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownHandler(name) => write!(f, "event function not found: {name}"),
            Self::UnknownTemplate(name) => write!(f, "template not found: {name}"),
            Self::UnknownField(name) => write!(f, "field not found: {name}"),
            Self::FieldNotObservable(name) => write!(f, "field is not observable: {name}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Failures while parsing or applying a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    /// A handler named by a directive is not registered.
    Registry(RegistryError),
    /// Malformed event name in an `on-` attribute.
    InvalidEventSpec { raw: String },
    /// `objchange` path with an empty segment.
    InvalidObjectPath { raw: String },
    /// First path segment names neither the namespace nor a global root.
    RootNotFound { path: String, root: String },
    /// A path segment (other than an allowed missing leaf) did not resolve.
    SegmentNotFound { path: String, segment: String },
    /// Neither the value nor its parent is observable.
    ObjectNotObservable { path: String },
    /// `#id` tooltip source with no matching element.
    TooltipSourceMissing { id: String },
    /// Tooltip body markup could not be parsed.
    Markup(MarkupError),
}

impl fmt::Display for DirectiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(err) => write!(f, "{err}"),
            Self::InvalidEventSpec { raw } => write!(f, "invalid event name: '{raw}'"),
            Self::InvalidObjectPath { raw } => write!(f, "objchange: invalid path: '{raw}'"),
            Self::RootNotFound { root, .. } => {
                write!(f, "objchange: root object not found: '{root}'")
            }
            Self::SegmentNotFound { segment, .. } => {
                write!(f, "objchange: object not found: '{segment}'")
            }
            Self::ObjectNotObservable { path } => {
                write!(f, "objchange: object not observable: '{path}'")
            }
            Self::TooltipSourceMissing { id } => {
                write!(f, "tooltip: source element not found: '#{id}'")
            }
            Self::Markup(err) => write!(f, "tooltip: {err}"),
        }
    }
}

impl std::error::Error for DirectiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Registry(err) => Some(err),
            Self::Markup(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RegistryError> for DirectiveError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl From<MarkupError> for DirectiveError {
    fn from(err: MarkupError) -> Self {
        Self::Markup(err)
    }
}

/// Loading or validating a [`RuntimeConfig`](crate::config::RuntimeConfig).
#[derive(Debug)]
pub enum ConfigError {
    Parse(toml::de::Error),
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "config parse error: {err}"),
            Self::Invalid { field, reason } => write!(f, "invalid config `{field}`: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err)
    }
}
