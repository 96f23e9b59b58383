#![forbid(unsafe_code)]

//! Ctrl/Cmd+S export of the page configuration.
//!
//! The `save_config_on_ctrlcmd_s` handler snapshots the `config` field
//! (observable bookkeeping stripped) and offers it to the host as
//! `config.json`. It can be bound per element
//! (`p:on-keydown="save_config_on_ctrlcmd_s"`) or document-wide with
//! [`bind_document_shortcut`].

use pwire_core::{Event, EventDetail};
use pwire_runtime::{Registry, RegistryError, Trigger, Value};
use tracing::{debug, error};

use crate::error::WidgetError;

pub const SAVE_HANDLER: &str = "save_config_on_ctrlcmd_s";
pub const EXPORT_FILE_NAME: &str = "config.json";
pub const EXPORT_MIME_TYPE: &str = "application/json";

/// Ctrl+S or Cmd+S.
#[must_use]
pub fn is_save_shortcut(event: &Event) -> bool {
    match event.detail() {
        EventDetail::Key { key, modifiers } => {
            (modifiers.ctrl || modifiers.meta) && key.eq_ignore_ascii_case("s")
        }
        _ => false,
    }
}

/// JSON bytes of the field's plain-data snapshot.
pub fn export_field(registry: &Registry, field: &str) -> Result<Vec<u8>, WidgetError> {
    let snapshot = match registry.field(field) {
        Some(Value::Node(node)) => node.copy_raw(),
        Some(other) => other.to_json(),
        None => return Err(RegistryError::UnknownField(field.to_owned()).into()),
    };
    Ok(serde_json::to_vec(&snapshot)?)
}

/// Export `field` and hand it to the window's download sink.
pub fn save_field(registry: &Registry, field: &str) -> Result<(), WidgetError> {
    let bytes = export_field(registry, field)?;
    debug!(field, bytes = bytes.len(), "config exported");
    registry
        .window()
        .download(EXPORT_FILE_NAME, EXPORT_MIME_TYPE, bytes);
    Ok(())
}

/// Register [`SAVE_HANDLER`] exporting `field`.
pub fn install(registry: &Registry, field: impl Into<String>) {
    let field = field.into();
    registry.register_handler(SAVE_HANDLER, move |registry, trigger| {
        let Some(event) = trigger.event() else {
            return;
        };
        if !is_save_shortcut(event) {
            return;
        }
        event.prevent_default();
        if let Err(err) = save_field(registry, &field) {
            error!(error = %err, "config export failed");
            registry.window().alert(err.to_string());
        }
    });
}

/// Route every `keydown` reaching the document node to [`SAVE_HANDLER`].
pub fn bind_document_shortcut(registry: &Registry) {
    let doc = registry.document();
    let weak = registry.downgrade();
    doc.add_event_listener(doc.root(), "keydown", move |event| {
        if let Some(registry) = weak.upgrade() {
            if let Err(err) = registry.call(SAVE_HANDLER, Trigger::Event(event)) {
                error!(error = %err, "save shortcut unbound");
            }
        }
    });
}
