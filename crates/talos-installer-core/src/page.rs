//! Titled groups of field items

use crate::error::InstallerError;
use crate::item::FieldItem;

/// Items shown together, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    title: String,
    items: Vec<FieldItem>,
}

impl Page {
    pub fn new(title: impl Into<String>, items: Vec<FieldItem>) -> Result<Self, InstallerError> {
        let title = title.into();
        if items.is_empty() {
            return Err(InstallerError::EmptyPage(title));
        }
        Ok(Self { title, items })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn items(&self) -> &[FieldItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&FieldItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
