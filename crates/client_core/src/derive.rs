//! Turns one server page into the ordered list the user actually sees.

use std::{cmp::Ordering, collections::BTreeSet};

use serde::Serialize;
use sha2::{Digest, Sha256};
use shared::{domain::FileCategory, protocol::AssetRecord};

use crate::view::{SortOrder, ViewState};

pub fn matches_category(asset: &AssetRecord, filter_types: &BTreeSet<FileCategory>) -> bool {
    filter_types.is_empty() || filter_types.contains(&asset.file_type)
}

pub fn matches_tag(asset: &AssetRecord, tag_filter: Option<&str>) -> bool {
    tag_filter.map_or(true, |tag| asset.has_tag(tag))
}

pub fn matches_search(asset: &AssetRecord, query: &str) -> bool {
    query.is_empty()
        || asset
            .original_filename
            .to_lowercase()
            .contains(&query.to_lowercase())
}

/// Case-folded ordering with an exact tie-break, so "apple" and "Apple" sit
/// together rather than split by code point.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare_by(order: SortOrder, a: &AssetRecord, b: &AssetRecord) -> Ordering {
    match order {
        SortOrder::Newest => b.created_at.cmp(&a.created_at),
        SortOrder::Oldest => a.created_at.cmp(&b.created_at),
        SortOrder::NameAsc => compare_names(&a.original_filename, &b.original_filename),
        SortOrder::NameDesc => compare_names(&b.original_filename, &a.original_filename),
        SortOrder::SizeDesc => b.file_size_bytes.cmp(&a.file_size_bytes),
        SortOrder::SizeAsc => a.file_size_bytes.cmp(&b.file_size_bytes),
    }
}

/// Category, tag and search filters in that order, then a stable sort.
/// Records with equal keys keep the server's relative order.
pub fn derive_visible(page: Option<&[AssetRecord]>, view: &ViewState) -> Vec<AssetRecord> {
    let Some(page) = page else {
        return Vec::new();
    };

    let mut visible: Vec<AssetRecord> = page
        .iter()
        .filter(|asset| matches_category(asset, view.filter_types()))
        .filter(|asset| matches_tag(asset, view.tag_filter()))
        .filter(|asset| matches_search(asset, view.search_query()))
        .cloned()
        .collect();

    let order = view.sort_order();
    visible.sort_by(|a, b| compare_by(order, a, b));
    visible
}

#[derive(Serialize)]
struct ViewInputs<'a> {
    filter_types: &'a BTreeSet<FileCategory>,
    tag_filter: Option<&'a str>,
    search_query: &'a str,
    sort_order: SortOrder,
}

/// Digest of the view fields `derive_visible` reads. The page number is
/// excluded; page content is tracked by [`DerivationCache::invalidate`].
pub fn derivation_key(view: &ViewState) -> [u8; 32] {
    let inputs = ViewInputs {
        filter_types: view.filter_types(),
        tag_filter: view.tag_filter(),
        search_query: view.search_query(),
        sort_order: view.sort_order(),
    };
    let mut hasher = Sha256::new();
    match serde_json::to_vec(&inputs) {
        Ok(bytes) => hasher.update(&bytes),
        Err(_) => hasher.update(format!("{view:?}").as_bytes()),
    }
    hasher.finalize().into()
}

/// Memoizes the last derivation for one fetched page. Whoever replaces the
/// page must call [`DerivationCache::invalidate`].
#[derive(Debug, Default)]
pub struct DerivationCache {
    key: Option<[u8; 32]>,
    value: Vec<AssetRecord>,
    hits: u64,
    misses: u64,
}

impl DerivationCache {
    pub fn get_or_derive(
        &mut self,
        page: Option<&[AssetRecord]>,
        view: &ViewState,
    ) -> &[AssetRecord] {
        let key = derivation_key(view);
        if self.key == Some(key) {
            self.hits += 1;
        } else {
            self.misses += 1;
            self.value = derive_visible(page, view);
            self.key = Some(key);
        }
        &self.value
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.value.clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
#[path = "tests/derive_tests.rs"]
mod tests;
