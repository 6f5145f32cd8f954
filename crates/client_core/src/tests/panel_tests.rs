use super::*;
use chrono::Utc;
use proptest::prelude::*;
use shared::{domain::FileCategory, protocol::TagRecord};

fn record(id: &str) -> AssetRecord {
    AssetRecord {
        id: AssetId::new(id),
        original_filename: format!("{id}.png"),
        file_type: FileCategory::Image,
        extension: ".png".into(),
        file_size_bytes: 1,
        created_at: Utc::now(),
        is_compressed: false,
        compression_ratio: None,
        tags: Vec::new(),
    }
}

fn list(ids: &[&str]) -> Vec<AssetRecord> {
    ids.iter().map(|id| record(id)).collect()
}

fn with_tags(id: &str, tags: &[&str]) -> AssetRecord {
    let mut asset = record(id);
    asset.tags = tags
        .iter()
        .map(|tag| TagRecord {
            id: TagId::new(*tag),
            name: tag.to_string(),
            color: "#000".into(),
        })
        .collect();
    asset
}

fn id(value: &str) -> AssetId {
    AssetId::new(value)
}

#[test]
fn starts_empty() {
    let ui = UiState::default();
    assert_eq!(ui.panel(), PanelState::Empty);
    assert!(!ui.is_selection_mode());
}

#[test]
fn select_then_deselect_returns_to_empty() {
    let mut ui = UiState::default();
    ui.select_asset(Some(id("a")));
    assert_eq!(ui.panel(), PanelState::Preview(id("a")));
    ui.select_asset(None);
    assert_eq!(ui.panel(), PanelState::Empty);
}

#[test]
fn opening_upload_clears_selection() {
    let mut ui = UiState::default();
    ui.select_asset(Some(id("a")));
    ui.request_delete();
    ui.set_upload_open(true);
    assert_eq!(ui.panel(), PanelState::Upload);
    assert!(ui.selected_asset_id().is_none());
    assert!(!ui.delete_confirm_pending());

    ui.set_upload_open(false);
    assert_eq!(ui.panel(), PanelState::Empty);
}

#[test]
fn selecting_closes_upload_and_pending_delete() {
    let mut ui = UiState::default();
    ui.set_upload_open(true);
    ui.select_asset(Some(id("a")));
    assert!(!ui.is_upload_open());
    assert_eq!(ui.panel(), PanelState::Preview(id("a")));

    assert!(ui.request_delete());
    ui.select_asset(Some(id("b")));
    assert!(!ui.delete_confirm_pending());
}

#[test]
fn selecting_null_never_opens_upload() {
    let mut ui = UiState::default();
    ui.select_asset(None);
    assert_eq!(ui.panel(), PanelState::Empty);

    ui.set_upload_open(true);
    ui.select_asset(None);
    assert_eq!(ui.panel(), PanelState::Upload);
}

#[test]
fn deleting_previewed_asset_empties_panel() {
    let mut ui = UiState::default();
    ui.select_asset(Some(id("a")));
    ui.request_delete();
    ui.asset_deleted(&id("a"));
    assert_eq!(ui.panel(), PanelState::Empty);
    assert!(!ui.delete_confirm_pending());
}

#[test]
fn deleting_other_asset_keeps_preview() {
    let mut ui = UiState::default();
    ui.select_asset(Some(id("a")));
    ui.asset_deleted(&id("b"));
    assert_eq!(ui.panel(), PanelState::Preview(id("a")));
}

#[test]
fn delete_request_needs_a_preview() {
    let mut ui = UiState::default();
    assert!(!ui.request_delete());
    ui.select_asset(Some(id("a")));
    assert!(ui.request_delete());
    ui.cancel_delete();
    assert!(!ui.delete_confirm_pending());
}

#[test]
fn escape_priority_is_help_then_upload_then_selection() {
    let mut ui = UiState::default();
    ui.select_asset(Some(id("a")));
    ui.open_help();

    assert!(ui.escape());
    assert!(!ui.is_help_open());
    assert_eq!(ui.panel(), PanelState::Preview(id("a")));

    assert!(ui.escape());
    assert_eq!(ui.panel(), PanelState::Empty);

    assert!(!ui.escape());

    ui.set_upload_open(true);
    ui.open_help();
    assert!(ui.escape());
    assert!(ui.is_upload_open());
    assert!(ui.escape());
    assert!(!ui.is_upload_open());
}

#[test]
fn toggling_selection_mode_twice_restores_flag_and_clears_ids() {
    let mut ui = UiState::default();
    ui.toggle_selection_mode();
    assert!(ui.is_selection_mode());
    ui.toggle_asset_selection(id("a"));
    assert_eq!(ui.selected_asset_ids().len(), 1);

    ui.toggle_selection_mode();
    assert!(!ui.is_selection_mode());
    assert!(ui.selected_asset_ids().is_empty());

    ui.select_all(vec![id("x")]);
    ui.toggle_selection_mode();
    assert!(ui.is_selection_mode());
    assert!(ui.selected_asset_ids().is_empty());
}

#[test]
fn toggle_asset_selection_adds_and_removes() {
    let mut ui = UiState::default();
    ui.toggle_asset_selection(id("a"));
    ui.toggle_asset_selection(id("b"));
    ui.toggle_asset_selection(id("a"));
    assert!(!ui.is_selection_mode());
    assert_eq!(
        ui.selected_asset_ids().iter().cloned().collect::<Vec<_>>(),
        vec![id("b")]
    );
}

#[test]
fn clear_selection_leaves_selection_mode() {
    let mut ui = UiState::default();
    ui.toggle_selection_mode();
    ui.select_all(vec![id("a"), id("b")]);
    ui.clear_selection();
    assert!(!ui.is_selection_mode());
    assert!(ui.selected_asset_ids().is_empty());
}

#[test]
fn select_all_replaces_previous_ids() {
    let mut ui = UiState::default();
    ui.toggle_selection_mode();
    ui.toggle_asset_selection(id("old"));
    ui.select_all(vec![id("a"), id("b")]);
    let selected: Vec<_> = ui.selected_asset_ids().iter().cloned().collect();
    assert_eq!(selected, vec![id("a"), id("b")]);
}

#[test]
fn ctrl_click_enters_selection_mode_with_only_clicked_asset() {
    let mut ui = UiState::default();
    ui.select_asset(Some(id("previewed")));
    ui.click_asset(id("b"), ClickModifiers { ctrl: true });
    assert!(ui.is_selection_mode());
    let selected: Vec<_> = ui.selected_asset_ids().iter().cloned().collect();
    assert_eq!(selected, vec![id("b")]);
    // Preview target is left alone.
    assert_eq!(ui.selected_asset_id(), Some(&id("previewed")));

    ui.click_asset(id("c"), ClickModifiers::default());
    assert_eq!(ui.selected_asset_ids().len(), 2);
    ui.click_asset(id("b"), ClickModifiers { ctrl: true });
    assert_eq!(ui.selected_asset_ids().len(), 1);
}

#[test]
fn plain_click_previews() {
    let mut ui = UiState::default();
    ui.set_upload_open(true);
    ui.click_asset(id("a"), ClickModifiers::default());
    assert_eq!(ui.panel(), PanelState::Preview(id("a")));
}

#[test]
fn arrows_clamp_at_both_ends() {
    let visible = list(&["a", "b", "c"]);
    let mut ui = UiState::default();

    assert!(ui.navigate(Key::ArrowUp, &visible));
    assert_eq!(ui.selected_asset_id(), Some(&id("a")));
    ui.navigate(Key::ArrowUp, &visible);
    assert_eq!(ui.selected_asset_id(), Some(&id("a")));

    ui.navigate(Key::ArrowDown, &visible);
    ui.navigate(Key::ArrowDown, &visible);
    ui.navigate(Key::ArrowDown, &visible);
    assert_eq!(ui.selected_asset_id(), Some(&id("c")));
}

#[test]
fn home_and_end_jump_to_edges() {
    let visible = list(&["a", "b", "c", "d"]);
    let mut ui = UiState::default();
    ui.select_asset(Some(id("b")));
    ui.navigate(Key::End, &visible);
    assert_eq!(ui.selected_asset_id(), Some(&id("d")));
    ui.navigate(Key::Home, &visible);
    assert_eq!(ui.selected_asset_id(), Some(&id("a")));
}

#[test]
fn selection_outside_visible_list_restarts_at_top() {
    let visible = list(&["a", "b"]);
    let mut ui = UiState::default();
    ui.select_asset(Some(id("gone")));
    ui.navigate(Key::ArrowDown, &visible);
    assert_eq!(ui.selected_asset_id(), Some(&id("a")));
}

#[test]
fn navigation_is_noop_on_empty_list() {
    let mut ui = UiState::default();
    ui.select_asset(Some(id("a")));
    assert!(!ui.navigate(Key::ArrowDown, &[]));
    assert_eq!(
        ui.handle_key(KeyPress::plain(Key::End), FocusTarget::Document, &[]),
        KeyOutcome::Ignored
    );
    assert_eq!(ui.selected_asset_id(), Some(&id("a")));
}

#[test]
fn shortcuts_are_ignored_while_typing() {
    let visible = list(&["a", "b"]);
    let mut ui = UiState::default();
    ui.open_help();
    for focus in [FocusTarget::TextInput, FocusTarget::Select] {
        for key in [Key::ArrowDown, Key::Escape, Key::Char('?'), Key::Delete] {
            assert_eq!(
                ui.handle_key(KeyPress::plain(key), focus, &visible),
                KeyOutcome::Ignored
            );
        }
        assert_eq!(
            ui.handle_key(KeyPress::with_ctrl(Key::Char('u')), focus, &visible),
            KeyOutcome::Ignored
        );
    }
    assert!(ui.selected_asset_id().is_none());
    assert!(ui.is_help_open());
}

#[test]
fn global_shortcuts_dispatch_from_document_focus() {
    let visible = list(&["a", "b"]);
    let mut ui = UiState::default();
    let doc = FocusTarget::Document;

    assert_eq!(
        ui.handle_key(KeyPress::plain(Key::Enter), doc, &visible),
        KeyOutcome::Handled
    );
    assert_eq!(ui.selected_asset_id(), Some(&id("a")));

    assert_eq!(
        ui.handle_key(KeyPress::plain(Key::Delete), doc, &visible),
        KeyOutcome::Handled
    );
    assert!(ui.delete_confirm_pending());

    assert_eq!(
        ui.handle_key(KeyPress::plain(Key::Char('?')), doc, &visible),
        KeyOutcome::Handled
    );
    assert!(ui.is_help_open());

    assert_eq!(
        ui.handle_key(KeyPress::plain(Key::Char('/')), doc, &visible),
        KeyOutcome::FocusSearch
    );
    assert_eq!(
        ui.handle_key(KeyPress::with_ctrl(Key::Char('f')), doc, &visible),
        KeyOutcome::FocusSearch
    );

    assert_eq!(
        ui.handle_key(KeyPress::with_ctrl(Key::Char('u')), doc, &visible),
        KeyOutcome::Handled
    );
    assert_eq!(ui.panel(), PanelState::Upload);

    assert_eq!(
        ui.handle_key(KeyPress::plain(Key::Char('u')), doc, &visible),
        KeyOutcome::Ignored
    );
}

#[test]
fn space_toggles_active_asset_in_selection_mode() {
    let visible = list(&["a", "b"]);
    let mut ui = UiState::default();
    ui.select_asset(Some(id("b")));
    ui.toggle_selection_mode();
    ui.handle_key(KeyPress::plain(Key::Space), FocusTarget::Document, &visible);
    assert!(ui.selected_asset_ids().contains(&id("b")));
}

#[test]
fn tag_targets_follow_interaction_mode() {
    let mut ui = UiState::default();
    assert!(ui.tag_targets().is_empty());
    ui.select_asset(Some(id("a")));
    assert_eq!(ui.tag_targets(), vec![id("a")]);
    ui.toggle_selection_mode();
    assert!(ui.tag_targets().is_empty());
    ui.select_all(vec![id("b"), id("c")]);
    assert_eq!(ui.tag_targets(), vec![id("b"), id("c")]);
}

#[test]
fn common_tags_are_the_intersection() {
    let page = vec![
        with_tags("a", &["red", "blue", "green"]),
        with_tags("b", &["green", "red"]),
        with_tags("c", &["blue"]),
    ];
    assert_eq!(
        common_tag_ids(&page, &[id("a"), id("b")]),
        vec![TagId::new("red"), TagId::new("green")]
    );
    assert!(common_tag_ids(&page, &[id("a"), id("b"), id("c")]).is_empty());
    assert!(common_tag_ids(&page, &[]).is_empty());
}

#[test]
fn preview_asset_resolves_against_page() {
    let page = list(&["a", "b"]);
    let mut ui = UiState::default();
    ui.select_asset(Some(id("b")));
    assert_eq!(ui.preview_asset(&page).map(|a| a.id.as_str()), Some("b"));
    ui.select_asset(Some(id("missing")));
    assert!(ui.preview_asset(&page).is_none());
}

fn nav_key() -> impl Strategy<Value = Key> {
    prop::sample::select(vec![Key::ArrowUp, Key::ArrowDown, Key::Home, Key::End])
}

proptest! {
    #[test]
    fn navigation_never_leaves_the_list(
        len in 1usize..12,
        keys in prop::collection::vec(nav_key(), 1..40),
    ) {
        let names: Vec<String> = (0..len).map(|i| format!("asset-{i}")).collect();
        let visible: Vec<AssetRecord> = names.iter().map(|n| record(n)).collect();
        let mut ui = UiState::default();

        for key in keys {
            ui.handle_key(KeyPress::plain(key), FocusTarget::Document, &visible);
            let index = ui
                .selected_asset_id()
                .and_then(|sel| visible.iter().position(|a| &a.id == sel));
            prop_assert!(index.is_some());
            let index = index.unwrap_or_default();
            prop_assert!(index < len);
            match key {
                Key::Home => prop_assert_eq!(index, 0),
                Key::End => prop_assert_eq!(index, len - 1),
                _ => {}
            }
        }
    }
}
