#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! Defaults reproduce the stock attribute vocabulary (`p:` prefix, `data`
//! marker class). Hosts can override fields in code with the `with_*`
//! builders or load a TOML table:
//!
//! ```toml
//! namespace = "p"
//! marker_class = "data"
//! first_draw_threshold = 0.01
//! resize_binding = "element"
//! ```

use serde::Deserialize;

use crate::error::ConfigError;

/// How `on-resize` bindings are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeBinding {
    /// Window resize listener; the handler gets the bound element.
    #[default]
    Window,
    /// Per-element resize observer.
    Element,
}

/// Configuration for a [`Registry`](crate::registry::Registry).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Attribute namespace and the root name for `objchange` paths.
    pub namespace: String,
    /// Opt-in class that makes an element eligible for directives.
    pub marker_class: String,
    /// Visible fraction at which `init-vis` hooks fire.
    pub first_draw_threshold: f64,
    pub resize_binding: ResizeBinding,
    /// Wheel adjustment for numeric inputs without a `wheel-adjust` attribute.
    pub wheel_adjust_default: bool,
    /// Handler invoked on `mouseenter` of a tooltip anchor.
    pub tooltip_begin_handler: String,
    /// Handler invoked on `mouseleave` of a tooltip anchor.
    pub tooltip_end_handler: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            namespace: "p".to_owned(),
            marker_class: "data".to_owned(),
            first_draw_threshold: 0.01,
            resize_binding: ResizeBinding::Window,
            wheel_adjust_default: true,
            tooltip_begin_handler: "tooltip_begin".to_owned(),
            tooltip_end_handler: "tooltip_end".to_owned(),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() || self.namespace.contains([':', '.', '&', ',']) {
            return Err(ConfigError::Invalid {
                field: "namespace",
                reason: format!("'{}' is not a plain identifier", self.namespace),
            });
        }
        if self.marker_class.is_empty() || self.marker_class.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "marker_class",
                reason: format!("'{}' is not a single class name", self.marker_class),
            });
        }
        if !(0.0..=1.0).contains(&self.first_draw_threshold) {
            return Err(ConfigError::Invalid {
                field: "first_draw_threshold",
                reason: format!("{} is outside [0, 1]", self.first_draw_threshold),
            });
        }
        Ok(())
    }

    /// Attribute prefix, e.g. `p:`.
    #[must_use]
    pub fn directive_prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_marker_class(mut self, class: impl Into<String>) -> Self {
        self.marker_class = class.into();
        self
    }

    #[must_use]
    pub fn with_first_draw_threshold(mut self, threshold: f64) -> Self {
        self.first_draw_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_resize_binding(mut self, binding: ResizeBinding) -> Self {
        self.resize_binding = binding;
        self
    }

    #[must_use]
    pub fn with_wheel_adjust_default(mut self, enabled: bool) -> Self {
        self.wheel_adjust_default = enabled;
        self
    }

    #[must_use]
    pub fn with_tooltip_handlers(
        mut self,
        begin: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        self.tooltip_begin_handler = begin.into();
        self.tooltip_end_handler = end.into();
        self
    }
}
