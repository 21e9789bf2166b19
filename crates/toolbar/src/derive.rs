use plate_core::{ElementNode, FormatFlag, Node, Path, RangeSelection, ReadTxn, kinds};

use crate::state::{BlockType, ToolbarState};

/// Derives `ToolbarState` from editor reads and remembers the last emission.
#[derive(Debug, Default)]
pub struct SelectionStateTracker {
    last_block_type: BlockType,
    last_emitted: Option<ToolbarState>,
}

impl SelectionStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_emitted(&self) -> Option<&ToolbarState> {
        self.last_emitted.as_ref()
    }

    /// Recomputes the state from scratch. Only the block type survives a
    /// selection that is not a text range.
    pub fn derive(&mut self, read: &ReadTxn<'_>) -> ToolbarState {
        let Some(range) = read.range() else {
            return ToolbarState {
                block_type: self.last_block_type,
                ..ToolbarState::default()
            };
        };

        let top = read.top_level_path(&range.anchor.path).ok();
        let block = top.as_deref().and_then(|path| read.element(path));
        let block_type = block.map(classify_block).unwrap_or_default();
        self.last_block_type = block_type;

        let active_formats = FormatFlag::ALL
            .into_iter()
            .filter(|flag| read.has_format(*flag))
            .collect();

        let node = selected_node(read, range);
        let is_link = read.node(&node).is_some_and(Node::is_link)
            || read
                .parent_path(&node)
                .and_then(|parent| read.node(&parent))
                .is_some_and(Node::is_link);

        ToolbarState {
            active_formats,
            block_type,
            is_link,
            is_rtl: block.and_then(|el| el.attr_str("dir")) == Some("rtl"),
            selected_block: top,
            font_family: read
                .marks_at(&range.anchor)
                .and_then(|marks| marks.font_family.clone()),
        }
    }

    /// Derives the state and returns it only when it differs from the
    /// previous emission.
    pub fn refresh(&mut self, read: &ReadTxn<'_>) -> Option<ToolbarState> {
        let state = self.derive(read);
        if self.last_emitted.as_ref() == Some(&state) {
            return None;
        }
        tracing::debug!(block_type = ?state.block_type, is_link = state.is_link, "toolbar state changed");
        self.last_emitted = Some(state.clone());
        Some(state)
    }
}

/// Classifies a top-level block. A list is always the outermost one, so
/// nested lists report the outer list's kind.
fn classify_block(el: &ElementNode) -> BlockType {
    match el.kind.as_str() {
        kinds::LIST => BlockType::from_list_type(el.list_type().unwrap_or("bullet")),
        kinds::HEADING => BlockType::from_heading_level(el.heading_level().unwrap_or(1)),
        kinds::QUOTE => BlockType::Quote,
        kinds::CODE_BLOCK => BlockType::Code,
        _ => BlockType::Paragraph,
    }
}

/// The node a range selection is "about".
///
/// Equal endpoints give that node. Otherwise the earlier endpoint in document
/// order wins, unless it sits at the very end of its node, in which case the
/// later endpoint's node is used.
pub fn selected_node(read: &ReadTxn<'_>, range: &RangeSelection) -> Path {
    if range.anchor.path == range.focus.path {
        return range.anchor.path.clone();
    }
    let (start, end) = read.ordered(range);
    if read.is_at_node_end(start) {
        end.path.clone()
    } else {
        start.path.clone()
    }
}

/// URL of the link the selection is about, if any.
pub fn selected_link_url(read: &ReadTxn<'_>) -> Option<String> {
    let range = read.range()?;
    let node = selected_node(read, range);
    let own = read.element(&node).and_then(|el| el.url());
    let parent = read
        .parent_path(&node)
        .and_then(|parent| read.element(&parent))
        .and_then(|el| el.url());
    own.or(parent).map(str::to_string)
}
