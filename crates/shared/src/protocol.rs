use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AssetId, FileCategory, TagId};

pub const DEFAULT_TAG_COLOR: &str = "#3B82F6";

/// Colors offered when creating a tag. Index 6 (blue) is the default pick.
pub const TAG_PALETTE: [&str; 11] = [
    "#ef4444", "#f97316", "#f59e0b", "#84cc16", "#22c55e", "#06b6d4", "#3b82f6", "#6366f1",
    "#a855f7", "#ec4899", "#64748b",
];

pub const DEFAULT_PALETTE_INDEX: usize = 6;

/// Canonical palette entry for `color`, compared case-insensitively.
pub fn palette_color(color: &str) -> Option<&'static str> {
    TAG_PALETTE
        .into_iter()
        .find(|entry| entry.eq_ignore_ascii_case(color.trim()))
}

pub fn default_palette_color() -> &'static str {
    TAG_PALETTE[DEFAULT_PALETTE_INDEX]
}

fn default_tag_color() -> String {
    DEFAULT_TAG_COLOR.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: TagId,
    pub name: String,
    #[serde(default = "default_tag_color")]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: AssetId,
    pub original_filename: String,
    pub file_type: FileCategory,
    #[serde(default)]
    pub extension: String,
    pub file_size_bytes: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_compressed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
}

impl AssetRecord {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.id.as_str() == tag || t.name == tag)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetPage {
    #[serde(default)]
    pub assets: Vec<AssetRecord>,
    pub total_count: u64,
    pub page: u32,
    pub limit: u32,
}

impl AssetPage {
    pub fn total_pages(&self) -> u32 {
        if self.limit == 0 {
            return 0;
        }
        u32::try_from(self.total_count.div_ceil(u64::from(self.limit))).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<AssetId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRequest {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTagRequest {
    pub asset_ids: Vec<AssetId>,
    pub tag_ids: Vec<TagId>,
}
