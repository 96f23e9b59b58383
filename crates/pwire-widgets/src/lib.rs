#![forbid(unsafe_code)]

//! Page widgets built on the pwire runtime.
//!
//! # Role in pwire
//! Everything here is an ordinary consumer of [`pwire_runtime::Registry`]:
//! handlers registered by name, listeners installed on the document, and
//! observers created on the window.
//!
//! - [`tooltip`]: hover-intent tooltips behind the `p:tooltip` directive.
//! - [`tabs`]: `.tab-container` header bars.
//! - [`dynamic_image`]: pan/zoom `.dynamic-image-display` viewers.
//! - [`dropdown`]: `<select>` population with optgroups.
//! - [`config_export`]: Ctrl/Cmd+S download of the `config` field.
//!
//! # Usage
//! Call [`install`] after registering application handlers and before
//! [`Registry::init`], so the tooltip handlers resolve during the scan.

pub mod config_export;
pub mod dropdown;
pub mod dynamic_image;
pub mod error;
pub mod tabs;
pub mod tooltip;

use pwire_runtime::Registry;
use serde::Deserialize;
use tracing::debug;

pub use dropdown::{DropdownEntry, create_dropdown};
pub use dynamic_image::DynamicImage;
pub use error::WidgetError;
pub use tabs::TabContainer;
pub use tooltip::{HoverState, TooltipConfig, TooltipController};

/// Which widgets [`install`] sets up.
///
/// ```toml
/// config_field = "config"
/// save_shortcut = true
///
/// [tooltip]
/// show_delay_ms = 300
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WidgetsConfig {
    pub tooltip: TooltipConfig,
    /// Initialise `.tab-container` elements.
    pub tabs: bool,
    /// Initialise `.dynamic-image-display` elements.
    pub dynamic_images: bool,
    /// Bind Ctrl/Cmd+S on the document node.
    pub save_shortcut: bool,
    /// Field exported by the save handler.
    pub config_field: String,
}

impl Default for WidgetsConfig {
    fn default() -> Self {
        Self {
            tooltip: TooltipConfig::default(),
            tabs: true,
            dynamic_images: true,
            save_shortcut: true,
            config_field: "config".to_owned(),
        }
    }
}

impl WidgetsConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, WidgetError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WidgetError> {
        if self.config_field.is_empty() {
            return Err(WidgetError::InvalidConfig {
                field: "config_field",
                reason: "must not be empty".to_owned(),
            });
        }
        if self.tooltip.template.is_empty() {
            return Err(WidgetError::InvalidConfig {
                field: "tooltip.template",
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn with_tooltip(mut self, tooltip: TooltipConfig) -> Self {
        self.tooltip = tooltip;
        self
    }

    #[must_use]
    pub fn with_tabs(mut self, enabled: bool) -> Self {
        self.tabs = enabled;
        self
    }

    #[must_use]
    pub fn with_dynamic_images(mut self, enabled: bool) -> Self {
        self.dynamic_images = enabled;
        self
    }

    #[must_use]
    pub fn with_save_shortcut(mut self, enabled: bool) -> Self {
        self.save_shortcut = enabled;
        self
    }

    #[must_use]
    pub fn with_config_field(mut self, field: impl Into<String>) -> Self {
        self.config_field = field.into();
        self
    }
}

/// Handles to everything [`install`] set up.
#[derive(Debug, Clone)]
pub struct Widgets {
    pub tooltips: TooltipController,
    pub tabs: Vec<TabContainer>,
    pub images: Vec<DynamicImage>,
}

/// Register widget handlers on `registry` and initialise the static widgets
/// already present in its document.
pub fn install(registry: &Registry, config: WidgetsConfig) -> Result<Widgets, WidgetError> {
    config.validate()?;

    let tooltips = TooltipController::new(config.tooltip.clone());
    tooltips.install(registry);

    config_export::install(registry, config.config_field.clone());
    if config.save_shortcut {
        config_export::bind_document_shortcut(registry);
    }

    let tabs = if config.tabs {
        tabs::init_tab_containers(registry)
    } else {
        Vec::new()
    };
    let images = if config.dynamic_images {
        dynamic_image::init_dynamic_images(registry)
    } else {
        Vec::new()
    };
    debug!(tabs = tabs.len(), images = images.len(), "widgets installed");

    Ok(Widgets {
        tooltips,
        tabs,
        images,
    })
}
