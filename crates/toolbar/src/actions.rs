use std::collections::HashMap;

use plate_core::{
    EditError, Editor, ElementNode, FormatFlag, ImagePayload, Node, Path, ReadTxn, Selection, kinds,
};
use serde::{Deserialize, Serialize};

use crate::config::ToolbarConfig;
use crate::state::{BlockType, ToolbarState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

/// Block wrappers the toolbar can switch to directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockTarget {
    Paragraph,
    H1,
    H2,
    Quote,
}

impl BlockTarget {
    pub fn block_type(self) -> BlockType {
        match self {
            BlockTarget::Paragraph => BlockType::Paragraph,
            BlockTarget::H1 => BlockType::H1,
            BlockTarget::H2 => BlockType::H2,
            BlockTarget::Quote => BlockType::Quote,
        }
    }

    fn element(self) -> ElementNode {
        match self {
            BlockTarget::Paragraph => ElementNode::paragraph(Vec::new()),
            BlockTarget::H1 => ElementNode::heading(1, Vec::new()),
            BlockTarget::H2 => ElementNode::heading(2, Vec::new()),
            BlockTarget::Quote => ElementNode::new(kinds::QUOTE, Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Bullet,
    Number,
}

impl ListKind {
    pub fn list_type(self) -> &'static str {
        match self {
            ListKind::Bullet => "bullet",
            ListKind::Number => "number",
        }
    }

    pub fn block_type(self) -> BlockType {
        match self {
            ListKind::Bullet => BlockType::Bullet,
            ListKind::Number => BlockType::Number,
        }
    }
}

/// Everything a toolbar control can ask for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum ToolbarAction {
    ToggleFormat(FormatFlag),
    Align(Alignment),
    SetBlock(BlockTarget),
    ToggleList(ListKind),
    ToggleCodeBlock,
    /// Links the selection to the placeholder URL, or unlinks it.
    ToggleLink,
    ApplyLink(String),
    IncreaseFontSize(u32),
    DecreaseFontSize(u32),
    SetFontFamily(Option<String>),
    Undo,
    Redo,
    InsertImage(ImagePayload),
}

impl ToolbarAction {
    /// Update source recorded with the transaction.
    pub fn source(&self) -> &'static str {
        match self {
            ToolbarAction::ToggleFormat(_) => "toolbar.toggle_format",
            ToolbarAction::Align(_) => "toolbar.align",
            ToolbarAction::SetBlock(_) => "toolbar.set_block",
            ToolbarAction::ToggleList(_) => "toolbar.toggle_list",
            ToolbarAction::ToggleCodeBlock => "toolbar.toggle_code_block",
            ToolbarAction::ToggleLink => "toolbar.toggle_link",
            ToolbarAction::ApplyLink(_) => "toolbar.apply_link",
            ToolbarAction::IncreaseFontSize(_) => "toolbar.increase_font_size",
            ToolbarAction::DecreaseFontSize(_) => "toolbar.decrease_font_size",
            ToolbarAction::SetFontFamily(_) => "toolbar.set_font_family",
            ToolbarAction::Undo => "history.undo",
            ToolbarAction::Redo => "history.redo",
            ToolbarAction::InsertImage(_) => "toolbar.insert_image",
        }
    }

    fn needs_range(&self) -> bool {
        !matches!(
            self,
            ToolbarAction::Undo | ToolbarAction::Redo | ToolbarAction::InsertImage(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// The document or selection changed.
    pub applied: bool,
    /// A new link was created and its URL should be edited.
    pub open_link_editor: bool,
}

/// Font size a text leaf is displayed with, in whole pixels.
pub trait RenderedStyle {
    fn font_size(&self, read: &ReadTxn<'_>, leaf: &[usize]) -> u32;
}

/// Explicit `font_size` marks win; otherwise the block's default size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultRenderedStyle {
    pub base_font_size: u32,
}

impl DefaultRenderedStyle {
    pub fn new(config: &ToolbarConfig) -> Self {
        Self {
            base_font_size: config.base_font_size,
        }
    }

    fn block_size(&self, read: &ReadTxn<'_>, leaf: &[usize]) -> u32 {
        let scale = read
            .text_block_of(leaf)
            .and_then(|block| read.element(&block))
            .and_then(ElementNode::heading_level)
            .map(|level| match level {
                1 => 2.0,
                2 => 1.5,
                3 => 1.17,
                4 => 1.0,
                5 => 0.83,
                _ => 0.67,
            })
            .unwrap_or(1.0);
        (self.base_font_size as f32 * scale).round() as u32
    }
}

impl RenderedStyle for DefaultRenderedStyle {
    fn font_size(&self, read: &ReadTxn<'_>, leaf: &[usize]) -> u32 {
        read.node(leaf)
            .and_then(Node::as_text)
            .and_then(|text| text.marks.font_size)
            .unwrap_or_else(|| self.block_size(read, leaf))
    }
}

/// Runs one action as a single update. `state` is the toolbar state the
/// action was issued against.
pub fn dispatch(
    editor: &mut Editor,
    state: &ToolbarState,
    action: &ToolbarAction,
    config: &ToolbarConfig,
    style: &dyn RenderedStyle,
) -> Result<DispatchOutcome, EditError> {
    if action.needs_range() && !editor.selection().is_some_and(Selection::is_range) {
        tracing::debug!(source = action.source(), "no range selection, skipping");
        return Ok(DispatchOutcome::default());
    }

    let revision = editor.revision();
    let source = action.source();
    let mut open_link_editor = false;

    match action {
        ToolbarAction::ToggleFormat(flag) => {
            editor.update(source, |scope| scope.format_text(*flag))?;
        }
        ToolbarAction::Align(alignment) => {
            editor.update(source, |scope| scope.set_block_align(alignment.as_str()))?;
        }
        ToolbarAction::SetBlock(target) => {
            if state.block_type == target.block_type() {
                tracing::debug!(?target, "block already has this type");
            } else {
                editor.update(source, |scope| scope.wrap_selection(|| target.element()))?;
            }
        }
        ToolbarAction::ToggleList(kind) => {
            if state.block_type == kind.block_type() {
                editor.update(source, |scope| scope.remove_list())?;
            } else {
                editor.update(source, |scope| scope.insert_list(kind.list_type()))?;
            }
        }
        ToolbarAction::ToggleCodeBlock => {
            if state.block_type == BlockType::Code {
                tracing::debug!("selection is already code");
            } else {
                editor.update(source, |scope| scope.wrap_code_block())?;
            }
        }
        ToolbarAction::ToggleLink => {
            if state.is_link {
                editor.update(source, |scope| scope.toggle_link(None))?;
            } else {
                let url = config.link_placeholder.as_str();
                editor.update(source, |scope| scope.toggle_link(Some(url)))?;
                open_link_editor = editor.revision() != revision;
            }
        }
        ToolbarAction::ApplyLink(url) => {
            editor.update(source, |scope| scope.toggle_link(Some(url.as_str())))?;
        }
        ToolbarAction::IncreaseFontSize(delta) => {
            resize_text(editor, source, i64::from(*delta), config, style)?;
        }
        ToolbarAction::DecreaseFontSize(delta) => {
            resize_text(editor, source, -i64::from(*delta), config, style)?;
        }
        ToolbarAction::SetFontFamily(family) => {
            editor.update(source, |scope| scope.set_font_family(family.as_deref()))?;
        }
        ToolbarAction::Undo => {
            editor.undo();
        }
        ToolbarAction::Redo => {
            editor.redo();
        }
        ToolbarAction::InsertImage(payload) => {
            let mut payload = payload.clone();
            payload.max_width.get_or_insert(config.image_max_width);
            payload.captions_enabled &= config.captions_enabled();
            editor.update(source, |scope| scope.insert_image(payload))?;
        }
    }

    Ok(DispatchOutcome {
        applied: editor.revision() != revision,
        open_link_editor,
    })
}

/// Adds `delta` px to the rendered size of every touched text leaf.
fn resize_text(
    editor: &mut Editor,
    source: &str,
    delta: i64,
    config: &ToolbarConfig,
    style: &dyn RenderedStyle,
) -> Result<(), EditError> {
    editor.update(source, |scope| {
        let read = scope.read();
        let sizes: HashMap<Path, u32> = read
            .selected_text_leaves()
            .into_iter()
            .map(|leaf| {
                let current = style.font_size(&read, &leaf);
                (leaf, config.clamp_font_size(i64::from(current) + delta))
            })
            .collect();
        scope.update_selected_text_marks(|path, text| {
            let mut marks = text.marks.clone();
            if let Some(size) = sizes.get(path) {
                marks.font_size = Some(*size);
            }
            marks
        })
    })
}
