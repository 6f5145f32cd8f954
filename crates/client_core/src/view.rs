//! Filter, search, sort and pagination inputs to the list derivation.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use shared::domain::FileCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
    SizeDesc,
    SizeAsc,
}

impl SortOrder {
    pub const ALL: [SortOrder; 6] = [
        SortOrder::Newest,
        SortOrder::Oldest,
        SortOrder::NameAsc,
        SortOrder::NameDesc,
        SortOrder::SizeDesc,
        SortOrder::SizeAsc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
            SortOrder::NameAsc => "name-asc",
            SortOrder::NameDesc => "name-desc",
            SortOrder::SizeDesc => "size-desc",
            SortOrder::SizeAsc => "size-asc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SortOrder::ALL
            .into_iter()
            .find(|order| order.as_str() == value.trim())
            .ok_or_else(|| format!("unknown sort order '{value}'"))
    }
}

/// Client-owned view inputs. Every setter that changes the visible set sends
/// the user back to page 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    filter_types: BTreeSet<FileCategory>,
    tag_filter: Option<String>,
    search_query: String,
    sort_order: SortOrder,
    current_page: u32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            filter_types: BTreeSet::new(),
            tag_filter: None,
            search_query: String::new(),
            sort_order: SortOrder::default(),
            current_page: 1,
        }
    }
}

impl ViewState {
    pub fn with_sort_order(sort_order: SortOrder) -> Self {
        Self {
            sort_order,
            ..Self::default()
        }
    }

    pub fn filter_types(&self) -> &BTreeSet<FileCategory> {
        &self.filter_types
    }

    pub fn tag_filter(&self) -> Option<&str> {
        self.tag_filter.as_deref()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn set_filter_types(&mut self, types: impl IntoIterator<Item = FileCategory>) {
        self.filter_types = types.into_iter().collect();
        self.current_page = 1;
    }

    pub fn toggle_filter_type(&mut self, category: FileCategory) {
        if !self.filter_types.remove(&category) {
            self.filter_types.insert(category);
        }
        self.current_page = 1;
    }

    pub fn set_tag_filter(&mut self, tag: Option<String>) {
        self.tag_filter = tag.filter(|t| !t.trim().is_empty());
        self.current_page = 1;
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.current_page = 1;
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.sort_order = order;
        self.current_page = 1;
    }

    /// Jumps to `page`, clamped to the pages the server reported.
    pub fn set_page(&mut self, page: u32, total_pages: u32) {
        self.current_page = page.clamp(1, total_pages.max(1));
    }

    pub fn next_page(&mut self, total_pages: u32) {
        self.set_page(self.current_page.saturating_add(1), total_pages);
    }

    pub fn prev_page(&mut self) {
        self.current_page = self.current_page.saturating_sub(1).max(1);
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
