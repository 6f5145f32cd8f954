//! Per-file upload progress. Entries advance independently; one failing
//! upload never touches its siblings.

use std::collections::HashMap;

use serde::Serialize;
use shared::domain::UploadId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Success,
    Error,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Success | UploadStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadEntry {
    pub id: UploadId,
    pub file_name: String,
    pub status: UploadStatus,
    /// Percent, 0..=100.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadQueue {
    entries: HashMap<UploadId, UploadEntry>,
    order: Vec<UploadId>,
}

impl UploadQueue {
    pub fn enqueue<I, S>(&mut self, file_names: I) -> Vec<UploadId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        file_names
            .into_iter()
            .map(|name| {
                let id = UploadId::generate();
                self.entries.insert(
                    id,
                    UploadEntry {
                        id,
                        file_name: name.into(),
                        status: UploadStatus::Pending,
                        progress: 0,
                        error: None,
                    },
                );
                self.order.push(id);
                id
            })
            .collect()
    }

    pub fn mark_uploading(&mut self, id: UploadId) -> bool {
        self.advance(id, UploadStatus::Uploading, 50, None)
    }

    pub fn mark_success(&mut self, id: UploadId) -> bool {
        self.advance(id, UploadStatus::Success, 100, None)
    }

    pub fn mark_error(&mut self, id: UploadId, reason: impl Into<String>) -> bool {
        self.advance(id, UploadStatus::Error, 0, Some(reason.into()))
    }

    fn advance(
        &mut self,
        id: UploadId,
        status: UploadStatus,
        progress: u8,
        error: Option<String>,
    ) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) if !entry.status.is_terminal() => {
                entry.status = status;
                entry.progress = progress;
                entry.error = error;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: UploadId) -> Option<&UploadEntry> {
        self.entries.get(&id)
    }

    /// Entries in the order they were enqueued.
    pub fn entries(&self) -> Vec<UploadEntry> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn all_finished(&self) -> bool {
        self.entries.values().all(|entry| entry.status.is_terminal())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
