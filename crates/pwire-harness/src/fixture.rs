#![forbid(unsafe_code)]

//! A parsed page with its window and registry.

use std::time::Duration;

use pwire_core::{Document, Event, MarkupError, NodeId, Window};
use pwire_runtime::{ConfigError, ProcessReport, Registry, RuntimeConfig};

/// Failure to build a [`PageFixture`].
#[derive(Debug)]
pub enum FixtureError {
    Markup(MarkupError),
    Config(ConfigError),
}

impl std::fmt::Display for FixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markup(err) => write!(f, "fixture markup: {err}"),
            Self::Config(err) => write!(f, "fixture config: {err}"),
        }
    }
}

impl std::error::Error for FixtureError {}

impl From<MarkupError> for FixtureError {
    fn from(err: MarkupError) -> Self {
        Self::Markup(err)
    }
}

impl From<ConfigError> for FixtureError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Window + registry over a document parsed from markup.
#[derive(Debug, Clone)]
pub struct PageFixture {
    pub window: Window,
    pub registry: Registry,
}

impl PageFixture {
    /// Page with the default runtime configuration.
    pub fn new(markup: &str) -> Result<Self, FixtureError> {
        Self::with_config(markup, RuntimeConfig::default())
    }

    pub fn with_config(markup: &str, config: RuntimeConfig) -> Result<Self, FixtureError> {
        let window = Window::new(Document::from_markup(markup)?);
        let registry = Registry::new(window.clone(), config)?;
        Ok(Self { window, registry })
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        self.window.document()
    }

    /// Run the directive scan over the whole page.
    pub fn init(&self) -> ProcessReport {
        self.registry.init()
    }

    /// Element by `id` attribute.
    #[must_use]
    pub fn element(&self, id: &str) -> Option<NodeId> {
        self.document().element_by_id(id)
    }

    /// Dispatch through the window (flushes afterwards).
    pub fn dispatch(&self, target: NodeId, event: &Event) -> bool {
        self.window.dispatch_event(target, event)
    }

    /// Click the element with `id`. Returns `false` if there is none.
    pub fn click(&self, id: &str) -> bool {
        match self.element(id) {
            Some(node) => {
                self.dispatch(node, &Event::click());
                true
            }
            None => false,
        }
    }

    /// Advance the virtual clock.
    pub fn advance_ms(&self, ms: u64) -> usize {
        self.window.advance(Duration::from_millis(ms))
    }

    /// Alerts raised so far, draining them.
    pub fn take_alerts(&self) -> Vec<String> {
        self.window.take_alerts()
    }
}
