use std::{collections::BTreeSet, sync::Arc};

use futures::future::{join_all, try_join};
use shared::{
    domain::{AssetId, FileCategory, TagId, UploadId},
    protocol::{AssetPage, AssetRecord, TagRecord},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod backend;
pub mod derive;
pub mod panel;
pub mod settings;
pub mod upload;
pub mod view;

pub use backend::{AssetBackend, HttpAssetBackend, UploadFile};
pub use derive::{derive_visible, DerivationCache};
pub use panel::{ClickModifiers, FocusTarget, Key, KeyOutcome, KeyPress, PanelState, UiState};
pub use settings::{ClientSettings, Preferences};
pub use upload::{UploadEntry, UploadQueue, UploadStatus};
pub use view::{SortOrder, ViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

/// Transient, user-visible message. Failures never leave the browser in a
/// broken state, they only produce one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum BrowserEvent {
    Notification(Notification),
    AssetsRefreshed { page: u32, total_count: u64 },
    TagsRefreshed { count: usize },
    UploadUpdated(UploadEntry),
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("deleting a tag also deletes every asset carrying it; confirmation required")]
    TagDeleteNotConfirmed,
    #[error("no assets selected")]
    EmptySelection,
    #[error("no asset is being previewed")]
    NothingPreviewed,
    #[error("tag name must not be empty")]
    EmptyTagName,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Everything the rendering layer needs for one frame.
#[derive(Debug, Clone)]
pub struct BrowserSnapshot {
    pub visible: Vec<AssetRecord>,
    pub panel: PanelState,
    pub preview: Option<AssetRecord>,
    pub is_selection_mode: bool,
    pub selected_asset_ids: BTreeSet<AssetId>,
    pub is_help_open: bool,
    pub is_tag_manager_open: bool,
    pub delete_confirm_pending: bool,
    pub view: ViewState,
    pub total_count: u64,
    pub total_pages: u32,
    pub uploads: Vec<UploadEntry>,
    pub tags: Vec<TagRecord>,
}

struct BrowserState {
    view: ViewState,
    ui: UiState,
    page: Option<AssetPage>,
    tags: Vec<TagRecord>,
    uploads: UploadQueue,
    cache: DerivationCache,
    page_limit: u32,
    fetch_generation: u64,
}

impl BrowserState {
    fn visible(&mut self) -> Vec<AssetRecord> {
        let assets = self.page.as_ref().map(|page| page.assets.as_slice());
        self.cache.get_or_derive(assets, &self.view).to_vec()
    }

    fn total_pages(&self) -> u32 {
        self.page.as_ref().map_or(0, AssetPage::total_pages)
    }

    /// The listing endpoint filters by tag name, so an id is swapped for the
    /// name of the loaded tag carrying it.
    fn server_tag_filter(&self) -> Option<String> {
        let filter = self.view.tag_filter()?;
        let name = self
            .tags
            .iter()
            .find(|tag| tag.id.as_str() == filter)
            .map_or(filter, |tag| tag.name.as_str());
        Some(name.to_string())
    }

    fn tag_filter_unresolved(&self) -> bool {
        self.view.tag_filter().is_some_and(|filter| {
            !self
                .tags
                .iter()
                .any(|tag| tag.id.as_str() == filter || tag.name == filter)
        })
    }

    fn page_assets(&self) -> &[AssetRecord] {
        self.page
            .as_ref()
            .map_or(&[][..], |page| page.assets.as_slice())
    }
}

/// Owns the single browser state object and talks to the backend. The
/// server is the only source of truth: every successful mutation is followed
/// by a re-fetch, never by a local edit of asset records.
pub struct AssetBrowser {
    backend: Arc<dyn AssetBackend>,
    inner: Mutex<BrowserState>,
    events: broadcast::Sender<BrowserEvent>,
}

impl AssetBrowser {
    pub fn new(backend: Arc<dyn AssetBackend>, page_limit: u32) -> Arc<Self> {
        Self::with_view(backend, page_limit, ViewState::default())
    }

    pub fn with_preferences(
        backend: Arc<dyn AssetBackend>,
        page_limit: u32,
        preferences: &Preferences,
    ) -> Arc<Self> {
        Self::with_view(
            backend,
            page_limit,
            ViewState::with_sort_order(preferences.sort_order),
        )
    }

    fn with_view(backend: Arc<dyn AssetBackend>, page_limit: u32, view: ViewState) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            backend,
            inner: Mutex::new(BrowserState {
                view,
                ui: UiState::default(),
                page: None,
                tags: Vec::new(),
                uploads: UploadQueue::default(),
                cache: DerivationCache::default(),
                page_limit: page_limit.max(1),
                fetch_generation: 0,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BrowserEvent> {
        self.events.subscribe()
    }

    fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        let _ = self.events.send(BrowserEvent::Notification(Notification {
            level,
            message: message.into(),
        }));
    }

    fn fail(&self, message: &str, err: anyhow::Error) -> BrowserError {
        warn!(error = %err, "{message}");
        self.notify(NotificationLevel::Error, message);
        BrowserError::Backend(err)
    }

    pub async fn refresh(&self) -> Result<(), BrowserError> {
        try_join(self.refresh_assets(), self.refresh_tags())
            .await
            .map(|_| ())
    }

    /// Fetches the current page. Only the most recently issued request may
    /// replace the stored page; older responses are dropped.
    pub async fn refresh_assets(&self) -> Result<(), BrowserError> {
        let unresolved = self.inner.lock().await.tag_filter_unresolved();
        if unresolved {
            let _ = self.refresh_tags().await;
        }
        let (generation, page, limit, tag_filter) = {
            let mut guard = self.inner.lock().await;
            guard.fetch_generation += 1;
            (
                guard.fetch_generation,
                guard.view.current_page(),
                guard.page_limit,
                guard.server_tag_filter(),
            )
        };
        let result = self
            .backend
            .list_assets(page, limit, tag_filter.as_deref())
            .await;

        let mut guard = self.inner.lock().await;
        if guard.fetch_generation != generation {
            debug!(page, generation, "assets: dropping superseded page response");
            return Ok(());
        }
        match result {
            Ok(fetched) => {
                let event = BrowserEvent::AssetsRefreshed {
                    page: fetched.page,
                    total_count: fetched.total_count,
                };
                guard.page = Some(fetched);
                guard.cache.invalidate();
                drop(guard);
                let _ = self.events.send(event);
                Ok(())
            }
            Err(err) => {
                drop(guard);
                Err(self.fail("Failed to load assets", err))
            }
        }
    }

    pub async fn refresh_tags(&self) -> Result<(), BrowserError> {
        match self.backend.list_tags().await {
            Ok(tags) => {
                let count = tags.len();
                self.inner.lock().await.tags = tags;
                let _ = self.events.send(BrowserEvent::TagsRefreshed { count });
                Ok(())
            }
            Err(err) => Err(self.fail("Failed to load tags", err)),
        }
    }

    /// Re-query after a successful mutation. A failure here is reported but
    /// does not turn the mutation itself into a failure.
    async fn refresh_after_mutation(&self, include_tags: bool) {
        let _ = self.refresh_assets().await;
        if include_tags {
            let _ = self.refresh_tags().await;
        }
    }

    pub async fn visible(&self) -> Vec<AssetRecord> {
        self.inner.lock().await.visible()
    }

    pub async fn view(&self) -> ViewState {
        self.inner.lock().await.view.clone()
    }

    pub async fn ui(&self) -> UiState {
        self.inner.lock().await.ui.clone()
    }

    pub async fn tags(&self) -> Vec<TagRecord> {
        self.inner.lock().await.tags.clone()
    }

    pub async fn uploads(&self) -> Vec<UploadEntry> {
        self.inner.lock().await.uploads.entries()
    }

    pub async fn snapshot(&self) -> BrowserSnapshot {
        let mut guard = self.inner.lock().await;
        let visible = guard.visible();
        let preview = guard.ui.preview_asset(guard.page_assets()).cloned();
        BrowserSnapshot {
            visible,
            panel: guard.ui.panel(),
            preview,
            is_selection_mode: guard.ui.is_selection_mode(),
            selected_asset_ids: guard.ui.selected_asset_ids().clone(),
            is_help_open: guard.ui.is_help_open(),
            is_tag_manager_open: guard.ui.is_tag_manager_open(),
            delete_confirm_pending: guard.ui.delete_confirm_pending(),
            view: guard.view.clone(),
            total_count: guard.page.as_ref().map_or(0, |page| page.total_count),
            total_pages: guard.total_pages(),
            uploads: guard.uploads.entries(),
            tags: guard.tags.clone(),
        }
    }

    pub fn download_url(&self, id: &AssetId) -> String {
        self.backend.download_url(id)
    }

    pub async fn download(&self, id: &AssetId) -> Result<Vec<u8>, BrowserError> {
        self.backend
            .download_asset(id)
            .await
            .map_err(|err| self.fail("Failed to download asset", err))
    }

    /// Applies `change` to the view and re-fetches when the server-side part
    /// of the query (page number or tag filter) moved.
    pub async fn update_view<F>(&self, change: F) -> Result<(), BrowserError>
    where
        F: FnOnce(&mut ViewState, u32),
    {
        let needs_fetch = {
            let mut guard = self.inner.lock().await;
            let before = (
                guard.view.current_page(),
                guard.view.tag_filter().map(str::to_string),
            );
            let total_pages = guard.total_pages();
            change(&mut guard.view, total_pages);
            let after = (
                guard.view.current_page(),
                guard.view.tag_filter().map(str::to_string),
            );
            before != after || guard.page.is_none()
        };
        if needs_fetch {
            self.refresh_assets().await?;
        }
        Ok(())
    }

    pub async fn set_filter_types(
        &self,
        types: Vec<FileCategory>,
    ) -> Result<(), BrowserError> {
        self.update_view(|view, _| view.set_filter_types(types)).await
    }

    pub async fn toggle_filter_type(&self, category: FileCategory) -> Result<(), BrowserError> {
        self.update_view(|view, _| view.toggle_filter_type(category))
            .await
    }

    pub async fn set_tag_filter(&self, tag: Option<String>) -> Result<(), BrowserError> {
        self.update_view(|view, _| view.set_tag_filter(tag)).await
    }

    pub async fn set_search_query(&self, query: impl Into<String>) -> Result<(), BrowserError> {
        let query = query.into();
        self.update_view(|view, _| view.set_search_query(query))
            .await
    }

    pub async fn set_sort_order(&self, order: SortOrder) -> Result<(), BrowserError> {
        self.update_view(|view, _| view.set_sort_order(order)).await
    }

    pub async fn set_page(&self, page: u32) -> Result<(), BrowserError> {
        self.update_view(|view, total| view.set_page(page, total))
            .await
    }

    pub async fn next_page(&self) -> Result<(), BrowserError> {
        self.update_view(|view, total| view.next_page(total)).await
    }

    pub async fn prev_page(&self) -> Result<(), BrowserError> {
        self.update_view(|view, _| view.prev_page()).await
    }

    pub async fn select_asset(&self, id: Option<AssetId>) {
        self.inner.lock().await.ui.select_asset(id);
    }

    pub async fn set_upload_open(&self, open: bool) {
        self.inner.lock().await.ui.set_upload_open(open);
    }

    pub async fn open_help(&self) {
        self.inner.lock().await.ui.open_help();
    }

    pub async fn open_tag_manager(&self) {
        self.inner.lock().await.ui.open_tag_manager();
    }

    pub async fn close_tag_manager(&self) {
        self.inner.lock().await.ui.close_tag_manager();
    }

    pub async fn request_delete(&self) -> bool {
        self.inner.lock().await.ui.request_delete()
    }

    pub async fn cancel_delete(&self) {
        self.inner.lock().await.ui.cancel_delete();
    }

    pub async fn escape(&self) -> bool {
        self.inner.lock().await.ui.escape()
    }

    pub async fn toggle_selection_mode(&self) {
        self.inner.lock().await.ui.toggle_selection_mode();
    }

    pub async fn toggle_asset_selection(&self, id: AssetId) {
        self.inner.lock().await.ui.toggle_asset_selection(id);
    }

    pub async fn clear_selection(&self) {
        self.inner.lock().await.ui.clear_selection();
    }

    /// Bulk-selects exactly the currently visible assets.
    pub async fn select_all_visible(&self) {
        let mut guard = self.inner.lock().await;
        let ids: Vec<AssetId> = guard.visible().into_iter().map(|asset| asset.id).collect();
        guard.ui.select_all(ids);
    }

    pub async fn click_asset(&self, id: AssetId, modifiers: ClickModifiers) {
        self.inner.lock().await.ui.click_asset(id, modifiers);
    }

    pub async fn handle_key(&self, press: KeyPress, focus: FocusTarget) -> KeyOutcome {
        let mut guard = self.inner.lock().await;
        let visible = guard.visible();
        guard.ui.handle_key(press, focus, &visible)
    }

    /// Tags shared by every asset the tag manager currently targets.
    pub async fn common_tags_for_targets(&self) -> Vec<TagId> {
        let guard = self.inner.lock().await;
        panel::common_tag_ids(guard.page_assets(), &guard.ui.tag_targets())
    }

    /// Deletes the previewed asset. On failure the asset stays selected and
    /// the confirmation prompt is dismissed.
    pub async fn confirm_delete(&self) -> Result<(), BrowserError> {
        let id = self
            .inner
            .lock()
            .await
            .ui
            .selected_asset_id()
            .cloned()
            .ok_or(BrowserError::NothingPreviewed)?;

        match self.backend.delete_asset(&id).await {
            Ok(()) => {
                self.inner.lock().await.ui.asset_deleted(&id);
                self.notify(NotificationLevel::Success, "Asset deleted");
                self.refresh_after_mutation(false).await;
                Ok(())
            }
            Err(err) => {
                self.inner.lock().await.ui.cancel_delete();
                Err(self.fail("Failed to delete asset", err))
            }
        }
    }

    pub async fn bulk_delete(&self) -> Result<usize, BrowserError> {
        let ids = self.bulk_selection().await?;
        match self.backend.bulk_delete_assets(&ids).await {
            Ok(()) => {
                {
                    let mut guard = self.inner.lock().await;
                    for id in &ids {
                        guard.ui.asset_deleted(id);
                    }
                    guard.ui.clear_selection();
                }
                self.notify(
                    NotificationLevel::Success,
                    format!("Successfully deleted {} assets", ids.len()),
                );
                self.refresh_after_mutation(false).await;
                Ok(ids.len())
            }
            Err(err) => Err(self.fail("Failed to delete assets", err)),
        }
    }

    pub async fn compress(&self, id: &AssetId) -> Result<(), BrowserError> {
        match self.backend.compress_asset(id).await {
            Ok(()) => {
                self.notify(NotificationLevel::Info, "Compression started");
                self.refresh_after_mutation(false).await;
                Ok(())
            }
            Err(err) => Err(self.fail("Failed to compress asset", err)),
        }
    }

    pub async fn bulk_compress(&self) -> Result<usize, BrowserError> {
        let ids = self.bulk_selection().await?;
        match self.backend.bulk_compress_assets(&ids).await {
            Ok(()) => {
                self.inner.lock().await.ui.clear_selection();
                self.notify(
                    NotificationLevel::Info,
                    format!("Compression started for {} assets", ids.len()),
                );
                self.refresh_after_mutation(false).await;
                Ok(ids.len())
            }
            Err(err) => Err(self.fail("Failed to compress assets", err)),
        }
    }

    async fn bulk_selection(&self) -> Result<Vec<AssetId>, BrowserError> {
        let guard = self.inner.lock().await;
        if guard.ui.selected_asset_ids().is_empty() {
            return Err(BrowserError::EmptySelection);
        }
        Ok(guard.ui.selected_asset_ids().iter().cloned().collect())
    }

    /// Opens the upload panel and uploads every file concurrently. Each file
    /// settles on its own; the returned entries are in submission order.
    pub async fn upload_files(&self, files: Vec<UploadFile>) -> Vec<UploadEntry> {
        let ids: Vec<UploadId> = {
            let mut guard = self.inner.lock().await;
            guard.ui.set_upload_open(true);
            guard
                .uploads
                .enqueue(files.iter().map(|file| file.file_name.clone()))
        };

        let outcomes = join_all(
            ids.iter()
                .copied()
                .zip(files)
                .map(|(id, file)| self.upload_one(id, file)),
        )
        .await;

        let succeeded = outcomes.iter().filter(|ok| **ok).count();
        let failed = outcomes.len() - succeeded;
        info!(succeeded, failed, "uploads: batch settled");
        if failed > 0 {
            self.notify(
                NotificationLevel::Error,
                format!("{failed} of {} uploads failed", outcomes.len()),
            );
        }
        if succeeded > 0 {
            self.refresh_after_mutation(false).await;
        }

        let guard = self.inner.lock().await;
        ids.iter()
            .filter_map(|id| guard.uploads.get(*id).cloned())
            .collect()
    }

    async fn upload_one(&self, id: UploadId, file: UploadFile) -> bool {
        self.update_upload(id, |queue| queue.mark_uploading(id))
            .await;
        let file_name = file.file_name.clone();
        match self.backend.upload_asset(file).await {
            Ok(_) => {
                self.update_upload(id, |queue| queue.mark_success(id))
                    .await;
                true
            }
            Err(err) => {
                warn!(file_name = %file_name, error = %err, "uploads: file failed");
                self.update_upload(id, |queue| queue.mark_error(id, err.to_string()))
                    .await;
                false
            }
        }
    }

    async fn update_upload<F>(&self, id: UploadId, change: F)
    where
        F: FnOnce(&mut UploadQueue) -> bool,
    {
        let entry = {
            let mut guard = self.inner.lock().await;
            if !change(&mut guard.uploads) {
                return;
            }
            guard.uploads.get(id).cloned()
        };
        if let Some(entry) = entry {
            let _ = self.events.send(BrowserEvent::UploadUpdated(entry));
        }
    }

    /// The "Done" action: once every upload has settled, clears the queue and
    /// closes the upload panel.
    pub async fn finish_uploads(&self) -> bool {
        let mut guard = self.inner.lock().await;
        if !guard.uploads.all_finished() {
            return false;
        }
        guard.uploads.clear();
        guard.ui.set_upload_open(false);
        true
    }

    pub async fn create_tag(&self, name: &str, color: &str) -> Result<TagRecord, BrowserError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BrowserError::EmptyTagName);
        }
        match self.backend.create_tag(name, color).await {
            Ok(tag) => {
                self.notify(NotificationLevel::Success, "Tag created");
                let _ = self.refresh_tags().await;
                Ok(tag)
            }
            Err(err) => Err(self.fail("Failed to create tag", err)),
        }
    }

    pub async fn update_tag(
        &self,
        id: &TagId,
        name: &str,
        color: &str,
    ) -> Result<TagRecord, BrowserError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BrowserError::EmptyTagName);
        }
        match self.backend.update_tag(id, name, color).await {
            Ok(tag) => {
                self.notify(NotificationLevel::Success, "Tag updated");
                self.refresh_after_mutation(true).await;
                Ok(tag)
            }
            Err(err) => Err(self.fail("Failed to update tag", err)),
        }
    }

    /// Deleting a tag cascades to every asset that carries it, so the caller
    /// must pass an explicit confirmation. No retry on failure.
    pub async fn delete_tag(&self, id: &TagId, confirmed: bool) -> Result<(), BrowserError> {
        if !confirmed {
            return Err(BrowserError::TagDeleteNotConfirmed);
        }
        match self.backend.delete_tag(id).await {
            Ok(()) => {
                self.notify(
                    NotificationLevel::Success,
                    "Tag and associated assets deleted",
                );
                self.refresh_after_mutation(true).await;
                Ok(())
            }
            Err(err) => Err(self.fail("Failed to delete tag", err)),
        }
    }

    /// Sets the exact tag membership of the tag manager's targets.
    pub async fn apply_tags(&self, tag_ids: Vec<TagId>) -> Result<usize, BrowserError> {
        let targets = self.inner.lock().await.ui.tag_targets();
        if targets.is_empty() {
            return Err(BrowserError::EmptySelection);
        }
        match self.backend.bulk_tag_assets(&targets, &tag_ids).await {
            Ok(()) => {
                {
                    let mut guard = self.inner.lock().await;
                    guard.ui.close_tag_manager();
                    if guard.ui.is_selection_mode() {
                        guard.ui.clear_selection();
                    }
                }
                self.notify(NotificationLevel::Success, "Assets tagged successfully");
                self.refresh_after_mutation(false).await;
                Ok(targets.len())
            }
            Err(err) => Err(self.fail("Failed to tag assets", err)),
        }
    }

    pub async fn tag_assets(
        &self,
        asset_ids: Vec<AssetId>,
        tag_ids: Vec<TagId>,
    ) -> Result<(), BrowserError> {
        if asset_ids.is_empty() {
            return Err(BrowserError::EmptySelection);
        }
        match self.backend.bulk_tag_assets(&asset_ids, &tag_ids).await {
            Ok(()) => {
                self.notify(NotificationLevel::Success, "Assets tagged successfully");
                self.refresh_after_mutation(false).await;
                Ok(())
            }
            Err(err) => Err(self.fail("Failed to tag assets", err)),
        }
    }
}

#[cfg(test)]
#[path = "tests/fake_server.rs"]
mod fake_server;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
