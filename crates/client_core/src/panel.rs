//! Which surface is visible, which asset is active, and how user input moves
//! between them.

use std::collections::BTreeSet;

use shared::{
    domain::{AssetId, TagId},
    protocol::AssetRecord,
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelState {
    Empty,
    Preview(AssetId),
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    Home,
    End,
    Escape,
    Enter,
    Space,
    Delete,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    /// Ctrl on Linux/Windows, Cmd on macOS.
    pub ctrl: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self { key, ctrl: false }
    }

    pub fn with_ctrl(key: Key) -> Self {
        Self { key, ctrl: true }
    }
}

/// Where keyboard focus sits when a key arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusTarget {
    #[default]
    Document,
    TextInput,
    Select,
}

impl FocusTarget {
    pub fn is_text_entry(self) -> bool {
        matches!(self, FocusTarget::TextInput | FocusTarget::Select)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Handled,
    /// The rendering layer should move focus into the search box.
    FocusSearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClickModifiers {
    pub ctrl: bool,
}

/// Panel and selection bookkeeping. Fields are private so that an open upload
/// panel and a previewed asset can never coexist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    selected_asset_id: Option<AssetId>,
    is_upload_open: bool,
    is_help_open: bool,
    is_tag_manager_open: bool,
    delete_confirm_pending: bool,
    is_selection_mode: bool,
    selected_asset_ids: BTreeSet<AssetId>,
}

impl UiState {
    pub fn panel(&self) -> PanelState {
        if self.is_upload_open {
            PanelState::Upload
        } else if let Some(id) = &self.selected_asset_id {
            PanelState::Preview(id.clone())
        } else {
            PanelState::Empty
        }
    }

    pub fn selected_asset_id(&self) -> Option<&AssetId> {
        self.selected_asset_id.as_ref()
    }

    pub fn is_upload_open(&self) -> bool {
        self.is_upload_open
    }

    pub fn is_help_open(&self) -> bool {
        self.is_help_open
    }

    pub fn is_tag_manager_open(&self) -> bool {
        self.is_tag_manager_open
    }

    pub fn delete_confirm_pending(&self) -> bool {
        self.delete_confirm_pending
    }

    pub fn is_selection_mode(&self) -> bool {
        self.is_selection_mode
    }

    pub fn selected_asset_ids(&self) -> &BTreeSet<AssetId> {
        &self.selected_asset_ids
    }

    /// The previewed record, if it is on the current page.
    pub fn preview_asset<'a>(&self, page: &'a [AssetRecord]) -> Option<&'a AssetRecord> {
        let id = self.selected_asset_id.as_ref()?;
        if self.is_upload_open {
            return None;
        }
        page.iter().find(|asset| &asset.id == id)
    }

    pub fn select_asset(&mut self, id: Option<AssetId>) {
        self.delete_confirm_pending = false;
        match id {
            Some(id) => {
                self.selected_asset_id = Some(id);
                self.is_upload_open = false;
            }
            None => self.selected_asset_id = None,
        }
    }

    pub fn set_upload_open(&mut self, open: bool) {
        self.is_upload_open = open;
        if open {
            self.selected_asset_id = None;
            self.delete_confirm_pending = false;
        }
    }

    pub fn open_help(&mut self) {
        self.is_help_open = true;
    }

    pub fn close_help(&mut self) {
        self.is_help_open = false;
    }

    pub fn open_tag_manager(&mut self) {
        self.is_tag_manager_open = true;
    }

    pub fn close_tag_manager(&mut self) {
        self.is_tag_manager_open = false;
    }

    /// Raises the delete confirmation for the previewed asset. Returns false
    /// when nothing is previewed.
    pub fn request_delete(&mut self) -> bool {
        if self.selected_asset_id.is_none() || self.is_upload_open {
            return false;
        }
        self.delete_confirm_pending = true;
        true
    }

    pub fn cancel_delete(&mut self) {
        self.delete_confirm_pending = false;
    }

    /// Applies a confirmed server-side deletion.
    pub fn asset_deleted(&mut self, id: &AssetId) {
        if self.selected_asset_id.as_ref() == Some(id) {
            self.selected_asset_id = None;
            self.delete_confirm_pending = false;
        }
        self.selected_asset_ids.remove(id);
    }

    /// Escape closes help, else the upload panel, else the preview.
    pub fn escape(&mut self) -> bool {
        if self.is_help_open {
            self.is_help_open = false;
        } else if self.is_upload_open {
            self.is_upload_open = false;
        } else if self.selected_asset_id.is_some() {
            self.select_asset(None);
        } else {
            return false;
        }
        true
    }

    pub fn toggle_selection_mode(&mut self) {
        self.is_selection_mode = !self.is_selection_mode;
        self.selected_asset_ids.clear();
    }

    pub fn toggle_asset_selection(&mut self, id: AssetId) {
        if !self.selected_asset_ids.remove(&id) {
            self.selected_asset_ids.insert(id);
        }
    }

    pub fn clear_selection(&mut self) {
        self.is_selection_mode = false;
        self.selected_asset_ids.clear();
    }

    pub fn select_all(&mut self, ids: impl IntoIterator<Item = AssetId>) {
        self.selected_asset_ids = ids.into_iter().collect();
    }

    /// Ctrl/Cmd+click outside selection mode enters it holding only the
    /// clicked asset.
    pub fn click_asset(&mut self, id: AssetId, modifiers: ClickModifiers) {
        if self.is_selection_mode {
            self.toggle_asset_selection(id);
        } else if modifiers.ctrl {
            self.is_selection_mode = true;
            self.selected_asset_ids.clear();
            self.selected_asset_ids.insert(id);
        } else {
            self.select_asset(Some(id));
        }
    }

    /// Assets a tag edit applies to: the bulk selection in selection mode,
    /// otherwise the previewed asset.
    pub fn tag_targets(&self) -> Vec<AssetId> {
        if self.is_selection_mode {
            self.selected_asset_ids.iter().cloned().collect()
        } else {
            self.selected_asset_id.iter().cloned().collect()
        }
    }

    /// Moves the active asset within `visible`, clamping at both ends.
    pub fn navigate(&mut self, key: Key, visible: &[AssetRecord]) -> bool {
        if visible.is_empty() {
            return false;
        }
        let last = visible.len() - 1;
        let current = self
            .selected_asset_id
            .as_ref()
            .and_then(|id| visible.iter().position(|asset| &asset.id == id));

        let next = match (key, current) {
            (Key::ArrowDown, Some(index)) => (index + 1).min(last),
            (Key::ArrowUp, Some(index)) => index.saturating_sub(1),
            (Key::ArrowDown | Key::ArrowUp, None) => 0,
            (Key::Home, _) => 0,
            (Key::End, _) => last,
            _ => return false,
        };
        self.select_asset(Some(visible[next].id.clone()));
        true
    }

    /// Global shortcut dispatch. Nothing fires while focus is in a text
    /// field or select control.
    pub fn handle_key(
        &mut self,
        press: KeyPress,
        focus: FocusTarget,
        visible: &[AssetRecord],
    ) -> KeyOutcome {
        if focus.is_text_entry() {
            return KeyOutcome::Ignored;
        }

        let handled = match press.key {
            Key::ArrowUp | Key::ArrowDown | Key::Home | Key::End => {
                self.navigate(press.key, visible)
            }
            Key::Escape => self.escape(),
            Key::Char('u') | Key::Char('U') if press.ctrl => {
                self.set_upload_open(true);
                true
            }
            Key::Char('f') | Key::Char('F') if press.ctrl => return KeyOutcome::FocusSearch,
            Key::Char('/') => return KeyOutcome::FocusSearch,
            Key::Char('?') => {
                self.open_help();
                true
            }
            Key::Enter | Key::Space => self.activate(visible),
            Key::Delete => self.request_delete(),
            Key::Char(_) => false,
        };

        debug!(key = ?press.key, ctrl = press.ctrl, handled, "ui: key dispatched");
        if handled {
            KeyOutcome::Handled
        } else {
            KeyOutcome::Ignored
        }
    }

    fn activate(&mut self, visible: &[AssetRecord]) -> bool {
        if self.is_selection_mode {
            let Some(id) = self.selected_asset_id.clone() else {
                return false;
            };
            self.toggle_asset_selection(id);
            return true;
        }
        if self.selected_asset_id.is_some() {
            return false;
        }
        match visible.first() {
            Some(first) => {
                self.select_asset(Some(first.id.clone()));
                true
            }
            None => false,
        }
    }
}

/// Tag ids carried by every target asset, in the first target's order.
pub fn common_tag_ids(assets: &[AssetRecord], targets: &[AssetId]) -> Vec<TagId> {
    let chosen: Vec<&AssetRecord> = assets
        .iter()
        .filter(|asset| targets.contains(&asset.id))
        .collect();
    let Some(first) = chosen.first() else {
        return Vec::new();
    };
    first
        .tags
        .iter()
        .filter(|tag| {
            chosen
                .iter()
                .all(|asset| asset.tags.iter().any(|t| t.id == tag.id))
        })
        .map(|tag| tag.id.clone())
        .collect()
}

#[cfg(test)]
#[path = "tests/panel_tests.rs"]
mod tests;
