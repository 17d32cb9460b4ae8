use serde::{Deserialize, Serialize};

/// Opaque per-instance state as seen by the store and the wire.
///
/// Dialogs work with their own typed record; the engine only converts to
/// and from this representation at the storage boundary.
pub type DialogData = serde_json::Value;

/// One running occurrence of a named dialog.
///
/// `instance` is only unique within `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogInstance {
    pub name: String,
    pub instance: String,
}

impl DialogInstance {
    #[must_use]
    pub fn new(name: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: instance.into(),
        }
    }
}

impl std::fmt::Display for DialogInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.instance)
    }
}
