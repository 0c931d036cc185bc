//! Page index to text mapping

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Extracted or edited text per page index.
///
/// Serialized as a JSON object keyed by decimal page index strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageTextMap(BTreeMap<u32, String>);

impl PageTextMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, page: u32) -> Option<&str> {
        self.0.get(&page).map(String::as_str)
    }

    /// Store text for a page, overwriting any previous value
    pub fn set(&mut self, page: u32, text: impl Into<String>) {
        self.0.insert(page, text.into());
    }

    pub fn contains(&self, page: u32) -> bool {
        self.0.contains_key(&page)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in ascending page order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.0.iter().map(|(page, text)| (*page, text.as_str()))
    }

    /// Drop entries for pages outside `0..page_count`, returning the dropped indices
    pub fn retain_valid(&mut self, page_count: u32) -> Vec<u32> {
        let dropped: Vec<u32> = self.0.range(page_count..).map(|(page, _)| *page).collect();
        self.0.retain(|page, _| *page < page_count);
        dropped
    }

    /// Concatenate all texts in ascending page order, each followed by one space
    pub fn joined(&self) -> String {
        let mut out = String::new();
        for text in self.0.values() {
            out.push_str(text);
            out.push(' ');
        }
        out
    }
}
