use serde_json::Value;

use crate::core::{
    AttrPatch, DecoratorNode, ElementNode, Marks, Node, Point, RangeSelection, Selection,
    TextNode, UpdateScope, kinds,
};
use crate::error::{CommandError, EditError};
use crate::image::{ImageNode, ImagePayload};
use crate::inline::{self, FlatLeaf, Wrapper};
use crate::ops::{Op, Path};
use crate::structure::{self, ListPos, Unit, UnitMove};

const FRESH_WRAPPER: usize = usize::MAX;

/// Selection endpoint expressed as (text block, global offset).
type Anchored = Option<(Path, usize)>;

impl UpdateScope<'_> {
    fn range_selection(&self) -> Option<RangeSelection> {
        self.selection().and_then(Selection::as_range).cloned()
    }

    /// Flips `flag` on the selected text. A collapsed selection toggles the
    /// marks used for the next typed text.
    pub fn format_text(&mut self, flag: crate::core::FormatFlag) -> Result<(), EditError> {
        let Some(range) = self.range_selection() else {
            tracing::debug!(?flag, "format_text without range selection");
            return Ok(());
        };
        let enable = !self.read().has_format(flag);
        if range.is_collapsed() {
            return self.set_caret_marks(&range.focus, |marks| marks.set(flag, enable));
        }
        self.map_selected_text(&mut |text: &mut TextNode| text.marks.set(flag, enable))
    }

    pub fn set_font_family(&mut self, family: Option<&str>) -> Result<(), EditError> {
        let Some(range) = self.range_selection() else {
            return Ok(());
        };
        let family = family.map(str::to_string);
        if range.is_collapsed() {
            return self.set_caret_marks(&range.focus, |marks| marks.font_family = family.clone());
        }
        self.map_selected_text(&mut |text: &mut TextNode| {
            text.marks.font_family = family.clone()
        })
    }

    fn map_selected_text(&mut self, f: &mut dyn FnMut(&mut TextNode)) -> Result<(), EditError> {
        let spans = self.read().text_block_spans();
        let mut rewrites = Vec::new();
        for span in spans {
            if span.start >= span.end {
                continue;
            }
            let Some(el) = self.read().element(&span.path).cloned() else {
                continue;
            };
            let children = inline::map_text_range(&el.children, span.start, span.end, f);
            if children != el.children {
                rewrites.push((span.path, children));
            }
        }
        self.rewrite_blocks(rewrites)
    }

    fn set_caret_marks(
        &mut self,
        point: &Point,
        f: impl FnOnce(&mut Marks),
    ) -> Result<(), EditError> {
        let Some(Node::Text(leaf)) = self.doc().node(&point.path).cloned() else {
            return Ok(());
        };
        let mut marks = leaf.marks.clone();
        f(&mut marks);
        if marks == leaf.marks {
            return Ok(());
        }
        if leaf.text.is_empty() {
            return self.apply(Op::SetTextMarks {
                path: point.path.clone(),
                marks,
            });
        }

        let Some((&ix, parent)) = point.path.split_last() else {
            return Ok(());
        };
        let offset = inline::clamp_to_char_boundary(&leaf.text, point.offset);
        let at = |ix: usize| {
            let mut path = parent.to_vec();
            path.push(ix);
            path
        };
        let pending = Node::Text(TextNode::new("").with_marks(marks));

        let caret_ix = if offset == 0 {
            self.insert_node(at(ix), pending)?;
            ix
        } else if offset >= leaf.text.len() {
            self.insert_node(at(ix + 1), pending)?;
            ix + 1
        } else {
            self.apply(Op::RemoveText {
                path: point.path.clone(),
                range: offset..leaf.text.len(),
            })?;
            let suffix = TextNode {
                text: leaf.text[offset..].to_string(),
                marks: leaf.marks.clone(),
            };
            self.insert_node(at(ix + 1), Node::Text(suffix))?;
            self.insert_node(at(ix + 1), pending)?;
            ix + 1
        };
        self.set_selection(Some(Selection::caret(Point::new(at(caret_ix), 0))));
        Ok(())
    }

    /// Rewrites each text leaf touched by the selection with the marks
    /// returned by `f`. Leaves are not split.
    pub fn update_selected_text_marks(
        &mut self,
        mut f: impl FnMut(&Path, &TextNode) -> Marks,
    ) -> Result<(), EditError> {
        let leaves = self.read().selected_text_leaves();
        for path in leaves {
            let Some(Node::Text(text)) = self.doc().node(&path) else {
                continue;
            };
            let marks = f(&path, text);
            if marks != text.marks {
                self.apply(Op::SetTextMarks { path, marks })?;
            }
        }
        Ok(())
    }

    /// Sets `align` on every touched text block, even when it already has it.
    pub fn set_block_align(&mut self, align: &str) -> Result<(), EditError> {
        let spans = self.read().text_block_spans();
        for span in spans {
            self.apply(Op::SetNodeAttrs {
                path: span.path,
                patch: AttrPatch::set("align", Value::from(align)),
            })?;
        }
        Ok(())
    }

    /// Replaces the wrapper of every touched block with a fresh element from
    /// `factory`. Touched list items leave their list.
    pub fn wrap_selection(&mut self, factory: impl Fn() -> ElementNode) -> Result<(), EditError> {
        self.restructure(|units| {
            structure::map_touched(units, |el, _| {
                let mut block = factory();
                structure::carry_block_attrs(&el, &mut block);
                block.children = el.children;
                (block, None)
            })
        })
    }

    /// Turns every touched block into an item of a `list_type` list.
    pub fn insert_list(&mut self, list_type: &str) -> Result<(), EditError> {
        self.restructure(|units| {
            structure::map_touched(units, |el, list| {
                let mut item = ElementNode::new(kinds::LIST_ITEM, Vec::new());
                structure::carry_block_attrs(&el, &mut item);
                item.children = el.children;
                let depth = list.map(|pos| pos.depth).unwrap_or(0);
                (
                    item,
                    Some(ListPos {
                        list_type: list_type.to_string(),
                        depth,
                    }),
                )
            })
        })
    }

    /// Turns every touched list item back into a paragraph.
    pub fn remove_list(&mut self) -> Result<(), EditError> {
        self.restructure(|units| {
            structure::map_touched(units, |el, list| {
                if list.is_none() {
                    return (el, None);
                }
                let mut paragraph = ElementNode::paragraph(Vec::new());
                structure::carry_block_attrs(&el, &mut paragraph);
                paragraph.children = el.children;
                (paragraph, None)
            })
        })
    }

    /// Converts the caret's block into a code block, or merges every touched
    /// block of a range into a single code block joined by newlines.
    pub fn wrap_code_block(&mut self) -> Result<(), EditError> {
        let touched = self.read().text_block_spans().len();
        let collapsed = self
            .range_selection()
            .is_some_and(|range| range.is_collapsed());
        if collapsed || touched <= 1 {
            return self.wrap_selection(|| ElementNode::new(kinds::CODE_BLOCK, Vec::new()));
        }
        self.restructure(merge_into_code_block)
    }

    fn restructure(
        &mut self,
        transform: impl FnOnce(Vec<Unit>) -> (Vec<Unit>, Vec<UnitMove>),
    ) -> Result<(), EditError> {
        let Some(range) = self.range_selection() else {
            tracing::debug!("restructure without range selection");
            return Ok(());
        };
        let read = self.read();
        let spans = read.text_block_spans();
        let (Some(first_span), Some(last_span)) = (spans.first(), spans.last()) else {
            return Ok(());
        };
        let first = first_span.path[0];
        let last = last_span.path[0];
        let touched: Vec<Path> = spans.iter().map(|span| span.path.clone()).collect();
        let anchor = read.block_offset(&range.anchor);
        let focus = read.block_offset(&range.focus);

        let nodes = self.doc().children[first..=last].to_vec();
        let units = structure::flatten(&nodes, first, self.registry(), &touched);
        let locate = |endpoint: Anchored| {
            let (block, offset) = endpoint?;
            let ix = units.iter().position(|unit| *unit.origin() == block)?;
            Some((ix, offset))
        };
        let anchor_at = locate(anchor);
        let focus_at = locate(focus);

        let (units, moves) = transform(units);
        let new_nodes = structure::regroup(units);
        if new_nodes == nodes {
            return Ok(());
        }

        for ix in (first..=last).rev() {
            self.remove_node(vec![ix])?;
        }
        for (k, node) in new_nodes.iter().enumerate() {
            self.insert_node(vec![first + k], node.clone())?;
        }

        let new_units = structure::flatten(&new_nodes, first, self.registry(), &[]);
        let resolve = |at: Option<(usize, usize)>| {
            let (ix, offset) = at?;
            let UnitMove { to, shift } = *moves.get(ix)?;
            match new_units.get(to)? {
                Unit::Block { el, origin, .. } => {
                    inline::point_at(origin, &el.children, offset + shift)
                }
                Unit::Opaque { .. } => None,
            }
        };
        if let (Some(anchor), Some(focus)) = (resolve(anchor_at), resolve(focus_at)) {
            self.set_selection(Some(Selection::range(anchor, focus)));
        }
        Ok(())
    }

    /// Wraps the selected text in a link to `url`, or retargets the link the
    /// selection sits in. `None` removes every link the selection touches.
    pub fn toggle_link(&mut self, url: Option<&str>) -> Result<(), EditError> {
        let Some(range) = self.range_selection() else {
            tracing::debug!("toggle_link without range selection");
            return Ok(());
        };

        if let Some(url) = url {
            let read = self.read();
            let anchor_link = read.link_of(&range.anchor.path);
            if let Some(link) = anchor_link
                && read.link_of(&range.focus.path).as_ref() == Some(&link)
            {
                if read.element(&link).and_then(ElementNode::url) == Some(url) {
                    return Ok(());
                }
                return self.apply(Op::SetNodeAttrs {
                    path: link,
                    patch: AttrPatch::set("url", Value::from(url)),
                });
            }
            if range.is_collapsed() {
                return Ok(());
            }
        }

        let collapsed = range.is_collapsed();
        let spans = self.read().text_block_spans();
        let mut rewrites = Vec::new();
        for span in spans {
            let Some(el) = self.read().element(&span.path).cloned() else {
                continue;
            };
            let mut flat = inline::flatten_inline(&el.children);
            match url {
                Some(url) => {
                    inline::split_flat_at(&mut flat, span.end);
                    inline::split_flat_at(&mut flat, span.start);
                    let shell = ElementNode::link(url, Vec::new());
                    let offsets = inline::flat_spans(&flat);
                    for (leaf, (start, end)) in flat.iter_mut().zip(offsets) {
                        if start >= span.start && end <= span.end && end > start {
                            leaf.wrapper = Some(Wrapper {
                                id: FRESH_WRAPPER,
                                shell: shell.clone(),
                            });
                        }
                    }
                }
                None => {
                    let spans = inline::flat_spans(&flat);
                    let touched: Vec<usize> = flat
                        .iter()
                        .zip(&spans)
                        .filter(|(_, (start, end))| {
                            if collapsed {
                                *start <= span.start && span.start <= *end
                            } else {
                                *start < span.end && *end > span.start
                            }
                        })
                        .filter_map(|(leaf, _)| leaf.wrapper.as_ref())
                        .filter(|wrapper| wrapper.shell.kind == kinds::LINK)
                        .map(|wrapper| wrapper.id)
                        .collect();
                    for leaf in &mut flat {
                        if leaf.wrapper.as_ref().is_some_and(|w| touched.contains(&w.id)) {
                            leaf.wrapper = None;
                        }
                    }
                }
            }
            let children = inline::regroup_inline(flat);
            if children != el.children {
                rewrites.push((span.path, children));
            }
        }
        self.rewrite_blocks(rewrites)
    }

    /// Replaces the children of text blocks, keeping selection endpoints at
    /// the same global offsets.
    fn rewrite_blocks(&mut self, rewrites: Vec<(Path, Vec<Node>)>) -> Result<(), EditError> {
        if rewrites.is_empty() {
            return Ok(());
        }
        let captured = self.range_selection().map(|range| {
            let read = self.read();
            (read.block_offset(&range.anchor), read.block_offset(&range.focus))
        });

        let rewritten: Vec<Path> = rewrites.iter().map(|(path, _)| path.clone()).collect();
        for (path, children) in rewrites {
            let Some(Node::Element(el)) = self.doc().node(&path).cloned() else {
                return Err(EditError::InvalidPath(format!("no text block at {path:?}")));
            };
            let mut el = el;
            el.children = children;
            self.replace_node(path, Node::Element(el))?;
        }

        let Some((anchor, focus)) = captured else {
            return Ok(());
        };
        let Some(current) = self.range_selection() else {
            return Ok(());
        };
        let remap = |endpoint: Anchored, current: Point| -> Point {
            let Some((block, offset)) = endpoint else {
                return current;
            };
            if !rewritten.contains(&block) {
                return current;
            }
            self.doc()
                .node(&block)
                .and_then(Node::as_element)
                .and_then(|el| inline::point_at(&block, &el.children, offset))
                .unwrap_or(current)
        };
        let anchor = remap(anchor, current.anchor);
        let focus = remap(focus, current.focus);
        self.set_selection(Some(Selection::range(anchor, focus)));
        Ok(())
    }

    /// Inserts `nodes` at the selection and returns the path of the first one.
    ///
    /// Inline nodes go into the focus text block. When their parent would be
    /// the root they are wrapped in a paragraph and the caret moves to the end
    /// of that paragraph.
    pub fn insert_nodes(&mut self, nodes: Vec<Node>) -> Result<Path, EditError> {
        let Some(first_node) = nodes.first().cloned() else {
            return Err(CommandError::new("nothing to insert").into());
        };

        let target = match self.selection() {
            Some(Selection::Range(range)) => self.read().block_offset(&range.focus),
            _ => None,
        };
        if let Some((block, offset)) = target
            && nodes.iter().all(Node::is_inline)
        {
            return self.insert_inline(block, offset, nodes, &first_node);
        }

        let len = self.doc().children.len();
        let index = match self.selection() {
            Some(Selection::Node(selected)) => selected.paths.iter().map(|p| p[0] + 1).max(),
            Some(Selection::Range(range)) => range.focus.path.first().map(|ix| ix + 1),
            None => None,
        }
        .unwrap_or(len)
        .min(len);

        let mut first_path = None;
        let mut caret = None;
        for (k, node) in nodes.into_iter().enumerate() {
            let path = vec![index + k];
            if node.is_inline() {
                let wrapper = ElementNode::paragraph(vec![node, Node::text("")]);
                self.insert_node(path.clone(), Node::Element(wrapper))?;
                first_path.get_or_insert_with(|| [path.clone(), vec![0]].concat());
                caret = Some(Point::new([path, vec![1]].concat(), 0));
            } else {
                self.insert_node(path.clone(), node)?;
                first_path.get_or_insert(path);
            }
        }
        if let Some(caret) = caret {
            self.set_selection(Some(Selection::caret(caret)));
        }
        first_path.ok_or_else(|| CommandError::new("nothing inserted").into())
    }

    fn insert_inline(
        &mut self,
        block: Path,
        offset: usize,
        nodes: Vec<Node>,
        first_node: &Node,
    ) -> Result<Path, EditError> {
        let Some(el) = self.read().element(&block).cloned() else {
            return Err(EditError::InvalidPath(format!("no text block at {block:?}")));
        };
        let inserted_len: usize = nodes.iter().map(Node::inline_len).sum();
        let count = nodes.len();

        let mut flat = inline::flatten_inline(&el.children);
        inline::split_flat_at(&mut flat, offset);
        let at = inline::flat_spans(&flat)
            .iter()
            .position(|(start, _)| *start >= offset)
            .unwrap_or(flat.len());
        for (k, node) in nodes.into_iter().enumerate() {
            flat.insert(at + k, FlatLeaf { node, wrapper: None });
        }
        let after = at + count;
        let has_text_after = flat
            .get(after)
            .is_some_and(|leaf| matches!(leaf.node, Node::Text(_)));
        if !has_text_after {
            let marks = flat[..at]
                .iter()
                .rev()
                .find_map(|leaf| leaf.node.as_text().map(|t| t.marks.clone()))
                .unwrap_or_default();
            flat.insert(
                after,
                FlatLeaf {
                    node: Node::Text(TextNode::new("").with_marks(marks)),
                    wrapper: None,
                },
            );
        }
        let children = inline::regroup_inline(flat);

        let mut cursor = 0;
        let mut inserted_ix = None;
        for (ix, child) in children.iter().enumerate() {
            if cursor >= offset && child == first_node {
                inserted_ix = Some(ix);
                break;
            }
            cursor += child.inline_len();
        }

        self.rewrite_blocks(vec![(block.clone(), children.clone())])?;
        if let Some(caret) = inline::point_at(&block, &children, offset + inserted_len) {
            self.set_selection(Some(Selection::caret(caret)));
        }

        let ix = inserted_ix.ok_or_else(|| CommandError::new("inserted node not found"))?;
        Ok([block, vec![ix]].concat())
    }

    pub fn insert_image(&mut self, payload: ImagePayload) -> Result<Path, EditError> {
        if !self.registry().has_node(kinds::IMAGE) {
            return Err(EditError::UnknownKind(kinds::IMAGE.to_string()));
        }
        self.insert_nodes(vec![Node::image(ImageNode::new(payload))])
    }

    /// Replaces the decorator at `path` in place.
    pub fn set_decorator(&mut self, path: Path, decorator: DecoratorNode) -> Result<(), EditError> {
        self.apply(Op::SetDecorator { path, decorator })
    }
}

fn merge_into_code_block(units: Vec<Unit>) -> (Vec<Unit>, Vec<UnitMove>) {
    let mut moves = vec![UnitMove { to: 0, shift: 0 }; units.len()];
    let mut out: Vec<Unit> = Vec::with_capacity(units.len());
    // Index of the code block in `out` and its current inline length.
    let mut merged: Option<(usize, usize)> = None;

    for (ix, unit) in units.into_iter().enumerate() {
        match unit {
            Unit::Block {
                el,
                origin,
                touched: true,
                ..
            } => {
                let len = inline::inline_len(&el.children);
                match merged {
                    None => {
                        let mut code = ElementNode::new(kinds::CODE_BLOCK, Vec::new());
                        structure::carry_block_attrs(&el, &mut code);
                        code.children = el.children;
                        moves[ix] = UnitMove {
                            to: out.len(),
                            shift: 0,
                        };
                        merged = Some((out.len(), len));
                        out.push(Unit::Block {
                            el: code,
                            list: None,
                            origin,
                            touched: true,
                        });
                    }
                    Some((at, merged_len)) => {
                        if let Some(Unit::Block { el: code, .. }) = out.get_mut(at) {
                            code.children.push(Node::text("\n"));
                            code.children.extend(el.children);
                        }
                        moves[ix] = UnitMove {
                            to: at,
                            shift: merged_len + 1,
                        };
                        merged = Some((at, merged_len + 1 + len));
                    }
                }
            }
            other => {
                moves[ix] = UnitMove {
                    to: out.len(),
                    shift: 0,
                };
                out.push(other);
            }
        }
    }
    (out, moves)
}
