use crate::core::{Document, ElementNode, FormatFlag, Marks, Node, Point, RangeSelection, Selection};
use crate::error::EditError;
use crate::inline;
use crate::ops::Path;
use crate::registry::NodeRegistry;

/// Part of a text block covered by the selection, in global inline offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub path: Path,
    pub start: usize,
    pub end: usize,
}

/// Shared view of the editor state. Holds no mutable borrow, so nothing
/// reachable from it can change the document.
#[derive(Clone, Copy)]
pub struct ReadTxn<'a> {
    doc: &'a Document,
    selection: Option<&'a Selection>,
    registry: &'a NodeRegistry,
}

impl<'a> ReadTxn<'a> {
    pub(crate) fn new(
        doc: &'a Document,
        selection: Option<&'a Selection>,
        registry: &'a NodeRegistry,
    ) -> Self {
        Self {
            doc,
            selection,
            registry,
        }
    }

    pub fn doc(&self) -> &'a Document {
        self.doc
    }

    pub fn selection(&self) -> Option<&'a Selection> {
        self.selection
    }

    pub fn range(&self) -> Option<&'a RangeSelection> {
        self.selection.and_then(Selection::as_range)
    }

    pub fn registry(&self) -> &'a NodeRegistry {
        self.registry
    }

    pub fn node(&self, path: &[usize]) -> Option<&'a Node> {
        self.doc.node(path)
    }

    pub fn element(&self, path: &[usize]) -> Option<&'a ElementNode> {
        self.node(path).and_then(Node::as_element)
    }

    /// Parent of `path`. Top-level nodes have the root (empty path) as parent;
    /// the root has none.
    pub fn parent_path(&self, path: &[usize]) -> Option<Path> {
        path.split_last().map(|(_, parent)| parent.to_vec())
    }

    pub fn top_level_path(&self, path: &[usize]) -> Result<Path, EditError> {
        let Some(&first) = path.first() else {
            return Err(EditError::InvalidPath("the root has no top-level ancestor".into()));
        };
        if first >= self.doc.children.len() {
            return Err(EditError::InvalidPath(format!("no top-level node at {first}")));
        }
        Ok(vec![first])
    }

    /// Nearest text block at or above `path`.
    pub fn text_block_of(&self, path: &[usize]) -> Option<Path> {
        (1..=path.len()).rev().map(|len| &path[..len]).find_map(|prefix| {
            let el = self.element(prefix)?;
            self.registry.is_text_block(el).then(|| prefix.to_vec())
        })
    }

    /// Nearest link element at or above `path`.
    pub fn link_of(&self, path: &[usize]) -> Option<Path> {
        (1..=path.len())
            .rev()
            .map(|len| &path[..len])
            .find(|prefix| self.node(prefix).is_some_and(Node::is_link))
            .map(<[usize]>::to_vec)
    }

    pub fn text_blocks(&self) -> Vec<Path> {
        fn walk(children: &[Node], path: &mut Path, registry: &NodeRegistry, out: &mut Vec<Path>) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };
                if node.is_inline() {
                    continue;
                }
                path.push(ix);
                if registry.is_text_block(el) {
                    out.push(path.clone());
                }
                walk(&el.children, path, registry, out);
                path.pop();
            }
        }

        let mut out = Vec::new();
        walk(&self.doc.children, &mut Vec::new(), self.registry, &mut out);
        out
    }

    pub fn is_backward(&self, range: &RangeSelection) -> bool {
        compare_points(&range.focus, &range.anchor).is_lt()
    }

    /// `(start, end)` in document order.
    pub fn ordered<'r>(&self, range: &'r RangeSelection) -> (&'r Point, &'r Point) {
        if self.is_backward(range) {
            (&range.focus, &range.anchor)
        } else {
            (&range.anchor, &range.focus)
        }
    }

    pub fn is_at_node_end(&self, point: &Point) -> bool {
        match self.node(&point.path) {
            Some(Node::Text(t)) => point.offset >= t.text.len(),
            Some(Node::Decorator(_)) => point.offset >= 1,
            Some(Node::Element(el)) => point.offset >= el.children.len(),
            None => false,
        }
    }

    pub fn marks_at(&self, point: &Point) -> Option<&'a Marks> {
        match self.node(&point.path)? {
            Node::Text(t) => Some(&t.marks),
            _ => None,
        }
    }

    /// Global inline offset of `point` inside its text block.
    pub fn block_offset(&self, point: &Point) -> Option<(Path, usize)> {
        let block = self.text_block_of(&point.path)?;
        let el = self.element(&block)?;
        let rel = &point.path[block.len()..];
        let offset = inline::global_offset(&el.children, rel, point.offset)?;
        Some((block, offset))
    }

    /// Text blocks touched by the range selection with the covered offsets.
    pub fn text_block_spans(&self) -> Vec<BlockSpan> {
        let Some(range) = self.range() else {
            return Vec::new();
        };
        let (start, end) = self.ordered(range);
        let (Some((start_block, start_offset)), Some((end_block, end_offset))) =
            (self.block_offset(start), self.block_offset(end))
        else {
            return Vec::new();
        };

        let blocks = self.text_blocks();
        let (Some(first), Some(last)) = (
            blocks.iter().position(|b| *b == start_block),
            blocks.iter().position(|b| *b == end_block),
        ) else {
            return Vec::new();
        };

        blocks[first..=last]
            .iter()
            .enumerate()
            .filter_map(|(ix, path)| {
                let el = self.element(path)?;
                let len = inline::inline_len(&el.children);
                let span_start = if ix == 0 { start_offset } else { 0 };
                let span_end = if first + ix == last { end_offset } else { len };
                Some(BlockSpan {
                    path: path.clone(),
                    start: span_start,
                    end: span_end.max(span_start),
                })
            })
            .collect()
    }

    /// Text leaves with a non-empty overlap with the selection. A collapsed
    /// selection touches the leaf it sits in.
    pub fn selected_text_leaves(&self) -> Vec<Path> {
        let Some(range) = self.range() else {
            return Vec::new();
        };
        if range.is_collapsed() {
            return match self.node(&range.focus.path) {
                Some(Node::Text(_)) => vec![range.focus.path.clone()],
                _ => Vec::new(),
            };
        }

        let mut out = Vec::new();
        for span in self.text_block_spans() {
            let Some(el) = self.element(&span.path) else {
                continue;
            };
            for leaf in inline::leaves(&el.children) {
                let overlaps = leaf.start < span.end && leaf.end() > span.start;
                if leaf.is_text() && overlaps {
                    let mut path = span.path.clone();
                    path.extend_from_slice(&leaf.rel);
                    out.push(path);
                }
            }
        }
        out
    }

    /// Whether the selection carries `flag`. For a range every selected text
    /// leaf must have it; a collapsed selection reads the leaf under the caret.
    pub fn has_format(&self, flag: FormatFlag) -> bool {
        let Some(range) = self.range() else {
            return false;
        };
        if range.is_collapsed() {
            return self.marks_at(&range.focus).is_some_and(|m| m.has(flag));
        }
        let leaves = self.selected_text_leaves();
        if leaves.is_empty() {
            return self.marks_at(&range.anchor).is_some_and(|m| m.has(flag));
        }
        leaves
            .iter()
            .all(|path| matches!(self.node(path), Some(Node::Text(t)) if t.marks.has(flag)))
    }
}

pub(crate) fn compare_points(a: &Point, b: &Point) -> std::cmp::Ordering {
    a.path.cmp(&b.path).then(a.offset.cmp(&b.offset))
}
