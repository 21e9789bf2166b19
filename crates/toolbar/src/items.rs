use plate_core::FormatFlag;

use crate::actions::{Alignment, BlockTarget, ListKind, ToolbarAction};
use crate::config::ToolbarConfig;
use crate::state::{BlockType, ToolbarState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IconName {
    AlignCenter,
    AlignLeft,
    AlignRight,
    Bold,
    CodeXml,
    Heading1,
    Heading2,
    Image,
    Italic,
    Link,
    List,
    ListOrdered,
    Minus,
    Pilcrow,
    Plus,
    Quote,
    Redo2,
    Strikethrough,
    Underline,
    Undo2,
}

impl IconName {
    pub fn path(self) -> &'static str {
        match self {
            Self::AlignCenter => "icons/align-center.svg",
            Self::AlignLeft => "icons/align-left.svg",
            Self::AlignRight => "icons/align-right.svg",
            Self::Bold => "icons/bold.svg",
            Self::CodeXml => "icons/code-xml.svg",
            Self::Heading1 => "icons/heading-1.svg",
            Self::Heading2 => "icons/heading-2.svg",
            Self::Image => "icons/image.svg",
            Self::Italic => "icons/italic.svg",
            Self::Link => "icons/link.svg",
            Self::List => "icons/list.svg",
            Self::ListOrdered => "icons/list-ordered.svg",
            Self::Minus => "icons/minus.svg",
            Self::Pilcrow => "icons/pilcrow.svg",
            Self::Plus => "icons/plus.svg",
            Self::Quote => "icons/quote.svg",
            Self::Redo2 => "icons/redo-2.svg",
            Self::Strikethrough => "icons/strikethrough.svg",
            Self::Underline => "icons/underline.svg",
            Self::Undo2 => "icons/undo-2.svg",
        }
    }
}

/// What pressing a toolbar button does. Sizes and URLs are filled in from
/// `ToolbarConfig` when the button is pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemAction {
    Block(BlockTarget),
    List(ListKind),
    CodeBlock,
    FontSizeUp,
    FontSizeDown,
    Format(FormatFlag),
    Link,
    Align(Alignment),
    Undo,
    Redo,
    /// Opens the insert image dialog.
    OpenImageDialog,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolbarItem {
    pub id: &'static str,
    pub label: &'static str,
    pub icon: IconName,
    pub action: ItemAction,
}

impl ToolbarItem {
    /// The action to dispatch for this button. `None` when the button opens
    /// a dialog instead of editing directly.
    pub fn to_action(&self, config: &ToolbarConfig) -> Option<ToolbarAction> {
        let action = match self.action {
            ItemAction::Block(target) => ToolbarAction::SetBlock(target),
            ItemAction::List(kind) => ToolbarAction::ToggleList(kind),
            ItemAction::CodeBlock => ToolbarAction::ToggleCodeBlock,
            ItemAction::FontSizeUp => ToolbarAction::IncreaseFontSize(config.font_size_step),
            ItemAction::FontSizeDown => ToolbarAction::DecreaseFontSize(config.font_size_step),
            ItemAction::Format(flag) => ToolbarAction::ToggleFormat(flag),
            ItemAction::Link => ToolbarAction::ToggleLink,
            ItemAction::Align(alignment) => ToolbarAction::Align(alignment),
            ItemAction::Undo => ToolbarAction::Undo,
            ItemAction::Redo => ToolbarAction::Redo,
            ItemAction::OpenImageDialog => return None,
        };
        Some(action)
    }

    pub fn is_active(&self, state: &ToolbarState) -> bool {
        match self.action {
            ItemAction::Block(target) => state.block_type == target.block_type(),
            ItemAction::List(kind) => state.block_type == kind.block_type(),
            ItemAction::CodeBlock => state.block_type == BlockType::Code,
            ItemAction::Format(flag) => state.has_format(flag),
            ItemAction::Link => state.is_link,
            ItemAction::FontSizeUp
            | ItemAction::FontSizeDown
            | ItemAction::Align(_)
            | ItemAction::Undo
            | ItemAction::Redo
            | ItemAction::OpenImageDialog => false,
        }
    }
}

const fn item(id: &'static str, label: &'static str, icon: IconName, action: ItemAction) -> ToolbarItem {
    ToolbarItem {
        id,
        label,
        icon,
        action,
    }
}

/// Buttons in display order.
pub static TOOLBAR_ITEMS: [ToolbarItem; 20] = [
    item("paragraph", "Normal", IconName::Pilcrow, ItemAction::Block(BlockTarget::Paragraph)),
    item("h1", "Heading 1", IconName::Heading1, ItemAction::Block(BlockTarget::H1)),
    item("h2", "Heading 2", IconName::Heading2, ItemAction::Block(BlockTarget::H2)),
    item("font-size-up", "Increase font size", IconName::Plus, ItemAction::FontSizeUp),
    item("font-size-down", "Decrease font size", IconName::Minus, ItemAction::FontSizeDown),
    item("bullet", "Bulleted List", IconName::List, ItemAction::List(ListKind::Bullet)),
    item("number", "Numbered List", IconName::ListOrdered, ItemAction::List(ListKind::Number)),
    item("quote", "Quote", IconName::Quote, ItemAction::Block(BlockTarget::Quote)),
    item("code", "Code Block", IconName::CodeXml, ItemAction::CodeBlock),
    item("undo", "Undo", IconName::Undo2, ItemAction::Undo),
    item("redo", "Redo", IconName::Redo2, ItemAction::Redo),
    item("bold", "Bold", IconName::Bold, ItemAction::Format(FormatFlag::Bold)),
    item("italic", "Italic", IconName::Italic, ItemAction::Format(FormatFlag::Italic)),
    item("underline", "Underline", IconName::Underline, ItemAction::Format(FormatFlag::Underline)),
    item(
        "strikethrough",
        "Strikethrough",
        IconName::Strikethrough,
        ItemAction::Format(FormatFlag::Strikethrough),
    ),
    item("image", "Insert Image", IconName::Image, ItemAction::OpenImageDialog),
    item("link", "Link", IconName::Link, ItemAction::Link),
    item("align-left", "Left Align", IconName::AlignLeft, ItemAction::Align(Alignment::Left)),
    item("align-center", "Center Align", IconName::AlignCenter, ItemAction::Align(Alignment::Center)),
    item("align-right", "Right Align", IconName::AlignRight, ItemAction::Align(Alignment::Right)),
];

pub fn find_item(id: &str) -> Option<&'static ToolbarItem> {
    TOOLBAR_ITEMS.iter().find(|item| item.id == id)
}
