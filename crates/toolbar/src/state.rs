use std::collections::BTreeSet;

use plate_core::{FormatFlag, Path};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    #[default]
    Paragraph,
    H1,
    H2,
    Bullet,
    Number,
    Quote,
    Code,
    /// A recognized container the toolbar has no button for (headings 3 to 6).
    Unknown,
}

impl BlockType {
    pub fn label(self) -> &'static str {
        match self {
            BlockType::Paragraph => "Normal",
            BlockType::H1 => "Heading 1",
            BlockType::H2 => "Heading 2",
            BlockType::Bullet => "Bulleted List",
            BlockType::Number => "Numbered List",
            BlockType::Quote => "Quote",
            BlockType::Code => "Code Block",
            BlockType::Unknown => "Mixed",
        }
    }

    pub fn from_list_type(list_type: &str) -> Self {
        match list_type {
            "number" => BlockType::Number,
            _ => BlockType::Bullet,
        }
    }

    pub fn from_heading_level(level: u64) -> Self {
        match level {
            1 => BlockType::H1,
            2 => BlockType::H2,
            _ => BlockType::Unknown,
        }
    }
}

/// What the toolbar shows for the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolbarState {
    pub active_formats: BTreeSet<FormatFlag>,
    pub block_type: BlockType,
    pub is_link: bool,
    pub is_rtl: bool,
    pub selected_block: Option<Path>,
    pub font_family: Option<String>,
}

impl ToolbarState {
    pub fn has_format(&self, flag: FormatFlag) -> bool {
        self.active_formats.contains(&flag)
    }
}

/// Key presses the toolbar components react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Enter,
    Escape,
    Delete,
    Backspace,
    Other,
}
