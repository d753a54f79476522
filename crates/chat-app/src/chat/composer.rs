use super::message::MessageId;

/// Pending input: the text box, selected images and the search toggle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Composer {
    text: String,
    images: Vec<Vec<u8>>,
    search_enabled: bool,
    editing: Option<MessageId>,
}

/// Input captured at the moment of submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Draft {
    pub text: String,
    pub images: Vec<Vec<u8>>,
    pub search_enabled: bool,
    pub editing: Option<MessageId>,
}

impl Composer {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn images(&self) -> &[Vec<u8>] {
        &self.images
    }

    pub fn add_image(&mut self, image: Vec<u8>) {
        self.images.push(image);
    }

    pub fn remove_image(&mut self, index: usize) -> Option<Vec<u8>> {
        (index < self.images.len()).then(|| self.images.remove(index))
    }

    pub fn search_enabled(&self) -> bool {
        self.search_enabled
    }

    pub fn set_search_enabled(&mut self, enabled: bool) {
        self.search_enabled = enabled;
    }

    pub fn toggle_search(&mut self) -> bool {
        self.search_enabled = !self.search_enabled;
        self.search_enabled
    }

    pub fn editing(&self) -> Option<MessageId> {
        self.editing
    }

    pub(crate) fn set_editing(&mut self, target: Option<MessageId>) {
        self.editing = target;
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.images.is_empty()
    }

    /// Takes the pending input, leaving the text box and images empty.
    /// The search toggle stays as it was.
    pub fn take_draft(&mut self) -> Draft {
        Draft {
            text: std::mem::take(&mut self.text),
            images: std::mem::take(&mut self.images),
            search_enabled: self.search_enabled,
            editing: self.editing.take(),
        }
    }
}
