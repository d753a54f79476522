/// Model used for requests when nothing has been listed or selected yet.
pub const FALLBACK_MODEL: &str = "llama2";

/// One model served by the Ollama instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub name: String,
    /// Server-formatted timestamp, kept opaque.
    pub modified_at: String,
    pub size: u64,
}

impl Model {
    pub fn new(name: impl Into<String>, modified_at: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            modified_at: modified_at.into(),
            size,
        }
    }
}

/// Read-only snapshot of the model list and selection.
///
/// Snapshots are never patched in place: every refresh or selection produces
/// a new value that replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelCatalog {
    pub models: Vec<Model>,
    pub selected: Option<String>,
    pub connected: bool,
}

impl ModelCatalog {
    /// Replaces the model list after a successful fetch.
    ///
    /// An existing selection is kept even if the new list no longer contains it;
    /// the first listed model is only picked when nothing was selected.
    pub fn with_refreshed(&self, models: Vec<Model>) -> Self {
        let selected = self
            .selected
            .clone()
            .or_else(|| models.first().map(|model| model.name.clone()));

        Self {
            models,
            selected,
            connected: true,
        }
    }

    /// Marks the server unreachable while keeping the last known list.
    pub fn disconnected(&self) -> Self {
        Self {
            models: self.models.clone(),
            selected: self.selected.clone(),
            connected: false,
        }
    }

    pub fn with_selected(&self, name: impl Into<String>) -> Self {
        let name = name.into().trim().to_string();
        Self {
            models: self.models.clone(),
            selected: (!name.is_empty()).then_some(name),
            connected: self.connected,
        }
    }

    pub fn find(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|model| model.name == name)
    }

    pub fn active_model(&self) -> String {
        self.selected
            .clone()
            .or_else(|| self.models.first().map(|model| model.name.clone()))
            .unwrap_or_else(|| FALLBACK_MODEL.to_string())
    }
}
