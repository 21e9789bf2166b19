use plate_core::{ReadTxn, Selection};

use crate::actions::ToolbarAction;
use crate::config::ToolbarConfig;
use crate::derive::selected_link_url;
use crate::geometry::{
    LayoutView, NativeSelection, Origin, Placement, Rect, Size, place_floating_element,
    resolve_selection_rect,
};
use crate::state::Key;

/// Host surface the link editor is rendered on.
pub trait SurfaceProbe: LayoutView {
    fn native_selection(&self) -> Option<NativeSelection<Self::Node>>;
    fn contains(&self, ancestor: Self::Node, node: Self::Node) -> bool;
    /// Whether keyboard focus is in the link editor's own URL input.
    fn is_link_input_focused(&self) -> bool;
    fn panel_size(&self) -> Size;
    fn container_rect(&self) -> Rect;
    fn anchor_origin(&self) -> Origin;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkEditorMode {
    #[default]
    Viewing,
    Editing,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FloatingEditorState {
    pub mode: LinkEditorMode,
    pub target_rect: Option<Rect>,
    pub url: String,
    pub last_selection: Option<Selection>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyOutcome {
    pub prevent_default: bool,
    pub action: Option<ToolbarAction>,
}

/// Panel that shows the URL of the selected link and lets the user edit it.
#[derive(Debug, Clone)]
pub struct FloatingLinkEditor {
    state: FloatingEditorState,
    placement: Placement,
    pointer_down: bool,
    wants_input_focus: bool,
    /// URL shown before the current edit started.
    committed_url: String,
    vertical_gap: f32,
    horizontal_offset: f32,
}

impl FloatingLinkEditor {
    pub fn new(config: &ToolbarConfig) -> Self {
        Self {
            state: FloatingEditorState::default(),
            placement: Placement::HIDDEN,
            pointer_down: false,
            wants_input_focus: false,
            committed_url: String::new(),
            vertical_gap: config.vertical_gap,
            horizontal_offset: config.horizontal_offset,
        }
    }

    pub fn state(&self) -> &FloatingEditorState {
        &self.state
    }

    pub fn mode(&self) -> LinkEditorMode {
        self.state.mode
    }

    pub fn url(&self) -> &str {
        &self.state.url
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn is_visible(&self) -> bool {
        self.placement.is_visible()
    }

    /// Follows a selection or document change.
    pub fn on_selection_update<S: SurfaceProbe + ?Sized>(&mut self, read: &ReadTxn<'_>, surface: &S) {
        if read.range().is_some() {
            self.state.url = selected_link_url(read).unwrap_or_default();
        }

        let root = surface.root();
        let native = surface
            .native_selection()
            .filter(|native| !native.is_collapsed && surface.contains(root, native.anchor_node));

        match (read.selection(), native) {
            (Some(selection), Some(native)) => {
                let rect = resolve_selection_rect(&native, surface);
                if !self.pointer_down {
                    self.placement = place_floating_element(
                        Some(rect),
                        surface.panel_size(),
                        surface.anchor_origin(),
                        surface.container_rect(),
                        self.vertical_gap,
                        self.horizontal_offset,
                    );
                    self.state.target_rect = Some(rect);
                }
                self.state.last_selection = Some(selection.clone());
            }
            _ if !surface.is_link_input_focused() => self.hide(),
            _ => {}
        }
    }

    fn hide(&mut self) {
        self.placement = Placement::HIDDEN;
        self.state = FloatingEditorState::default();
        self.committed_url.clear();
    }

    pub fn toggle_edit_mode(&mut self) {
        match self.state.mode {
            LinkEditorMode::Viewing => self.begin_editing(),
            LinkEditorMode::Editing => self.state.mode = LinkEditorMode::Viewing,
        }
    }

    pub fn begin_editing(&mut self) {
        if self.state.mode == LinkEditorMode::Viewing {
            self.committed_url = self.state.url.clone();
        }
        self.state.mode = LinkEditorMode::Editing;
        self.wants_input_focus = true;
    }

    /// One-shot request to focus the URL input.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.wants_input_focus)
    }

    pub fn on_input(&mut self, text: &str) {
        if self.state.mode == LinkEditorMode::Editing {
            self.state.url = text.to_string();
        }
    }

    pub fn on_key(&mut self, key: Key) -> KeyOutcome {
        if self.state.mode != LinkEditorMode::Editing {
            return KeyOutcome::default();
        }
        match key {
            Key::Enter => {
                let action = (self.state.last_selection.is_some() && !self.state.url.is_empty())
                    .then(|| ToolbarAction::ApplyLink(self.state.url.clone()));
                self.state.mode = LinkEditorMode::Viewing;
                KeyOutcome {
                    prevent_default: true,
                    action,
                }
            }
            Key::Escape => {
                self.state.url = std::mem::take(&mut self.committed_url);
                self.state.mode = LinkEditorMode::Viewing;
                KeyOutcome {
                    prevent_default: true,
                    action: None,
                }
            }
            Key::Delete | Key::Backspace | Key::Other => KeyOutcome::default(),
        }
    }

    /// Mouse-down on the panel. Always prevent the default so the document
    /// selection is kept.
    pub fn on_panel_mouse_down(&mut self) -> bool {
        self.pointer_down = true;
        true
    }

    pub fn on_panel_mouse_up(&mut self) {
        self.pointer_down = false;
    }
}
