#![forbid(unsafe_code)]

//! Widget error type.

use std::fmt;

use pwire_core::MarkupError;
use pwire_runtime::RegistryError;

/// Failures raised by widget handlers and configuration loading.
#[derive(Debug)]
pub enum WidgetError {
    /// A template, handler, or field lookup failed.
    Registry(RegistryError),
    /// A stored template fragment has no element to clone.
    EmptyTemplate { name: String },
    /// Tooltip or label markup could not be parsed.
    Markup(MarkupError),
    /// Config export could not serialize the snapshot.
    Serialize(serde_json::Error),
    /// TOML configuration could not be parsed.
    Config(toml::de::Error),
    /// A configuration value is out of range.
    InvalidConfig { field: &'static str, reason: String },
}

impl fmt::Display for WidgetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(err) => write!(f, "{err}"),
            Self::EmptyTemplate { name } => write!(f, "template '{name}' has no element"),
            Self::Markup(err) => write!(f, "markup error: {err}"),
            Self::Serialize(err) => write!(f, "serialization failed: {err}"),
            Self::Config(err) => write!(f, "widget config parse error: {err}"),
            Self::InvalidConfig { field, reason } => {
                write!(f, "invalid widget config `{field}`: {reason}")
            }
        }
    }
}

impl std::error::Error for WidgetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Registry(err) => Some(err),
            Self::Markup(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::EmptyTemplate { .. } | Self::InvalidConfig { .. } => None,
        }
    }
}

impl From<RegistryError> for WidgetError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl From<MarkupError> for WidgetError {
    fn from(err: MarkupError) -> Self {
        Self::Markup(err)
    }
}

impl From<serde_json::Error> for WidgetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err)
    }
}

impl From<toml::de::Error> for WidgetError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err)
    }
}
