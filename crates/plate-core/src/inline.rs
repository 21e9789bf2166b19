//! Offset arithmetic over the inline content of a text block.
//!
//! A text block's inline content is addressed by a single "global" offset:
//! text leaves contribute their byte length, decorators count as one unit and
//! inline elements (links) are transparent.

use crate::core::{ElementNode, Node, Point, TextNode};
use crate::ops::Path;

#[derive(Debug, Clone)]
pub(crate) struct Leaf<'a> {
    /// Path relative to the text block.
    pub rel: Path,
    pub node: &'a Node,
    pub start: usize,
    pub len: usize,
}

impl Leaf<'_> {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn is_text(&self) -> bool {
        matches!(self.node, Node::Text(_))
    }
}

pub(crate) fn leaves(children: &[Node]) -> Vec<Leaf<'_>> {
    fn walk<'a>(children: &'a [Node], rel: &mut Path, cursor: &mut usize, out: &mut Vec<Leaf<'a>>) {
        for (ix, node) in children.iter().enumerate() {
            rel.push(ix);
            match node {
                Node::Element(el) if node.is_inline() => walk(&el.children, rel, cursor, out),
                Node::Element(_) => {}
                Node::Text(_) | Node::Decorator(_) => {
                    let len = node.inline_len();
                    out.push(Leaf {
                        rel: rel.clone(),
                        node,
                        start: *cursor,
                        len,
                    });
                    *cursor += len;
                }
            }
            rel.pop();
        }
    }

    let mut out = Vec::new();
    walk(children, &mut Vec::new(), &mut 0, &mut out);
    out
}

pub(crate) fn inline_len(children: &[Node]) -> usize {
    leaves(children).last().map(Leaf::end).unwrap_or(0)
}

/// Global offset of `offset` inside the leaf at `rel`.
pub(crate) fn global_offset(children: &[Node], rel: &[usize], offset: usize) -> Option<usize> {
    leaves(children)
        .into_iter()
        .find(|leaf| leaf.rel == rel)
        .map(|leaf| leaf.start + offset.min(leaf.len))
}

/// Maps a global offset back to a text leaf of the block at `block_path`.
///
/// On a boundary between two text leaves the right one wins, so a point at
/// the start of a link lands inside the link.
pub(crate) fn point_at(block_path: &[usize], children: &[Node], global: usize) -> Option<Point> {
    let all = leaves(children);
    let texts: Vec<&Leaf<'_>> = all.iter().filter(|l| l.is_text()).collect();
    let last = texts.last()?;

    let make = |leaf: &Leaf<'_>, offset: usize| {
        let mut path = block_path.to_vec();
        path.extend_from_slice(&leaf.rel);
        Point::new(path, offset)
    };

    for (ix, leaf) in all.iter().enumerate() {
        if !leaf.is_text() || global < leaf.start || global > leaf.end() {
            continue;
        }
        if global < leaf.end() {
            return Some(make(leaf, global - leaf.start));
        }
        let next_is_text = all.get(ix + 1).is_some_and(Leaf::is_text);
        if !next_is_text {
            return Some(make(leaf, leaf.len));
        }
    }
    Some(make(last, last.len))
}

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

/// Splits text leaves at `start` and `end` and runs `f` on every non-empty
/// piece inside `[start, end)`.
pub(crate) fn map_text_range(
    children: &[Node],
    start: usize,
    end: usize,
    f: &mut dyn FnMut(&mut TextNode),
) -> Vec<Node> {
    fn walk(
        children: &[Node],
        start: usize,
        end: usize,
        cursor: &mut usize,
        f: &mut dyn FnMut(&mut TextNode),
    ) -> Vec<Node> {
        let mut out = Vec::with_capacity(children.len());
        for node in children {
            match node {
                Node::Text(t) => {
                    let (ls, le) = (*cursor, *cursor + t.text.len());
                    *cursor = le;
                    if t.text.is_empty() || le <= start || ls >= end {
                        out.push(node.clone());
                        continue;
                    }
                    let a = clamp_to_char_boundary(&t.text, start.saturating_sub(ls));
                    let b = clamp_to_char_boundary(&t.text, end.min(le) - ls);
                    if a > 0 {
                        out.push(Node::Text(TextNode {
                            text: t.text[..a].to_string(),
                            marks: t.marks.clone(),
                        }));
                    }
                    let mut middle = TextNode {
                        text: t.text[a..b].to_string(),
                        marks: t.marks.clone(),
                    };
                    f(&mut middle);
                    out.push(Node::Text(middle));
                    if b < t.text.len() {
                        out.push(Node::Text(TextNode {
                            text: t.text[b..].to_string(),
                            marks: t.marks.clone(),
                        }));
                    }
                }
                Node::Decorator(_) => {
                    *cursor += 1;
                    out.push(node.clone());
                }
                Node::Element(el) if node.is_inline() => {
                    let children = walk(&el.children, start, end, cursor, f);
                    out.push(Node::Element(ElementNode {
                        kind: el.kind.clone(),
                        attrs: el.attrs.clone(),
                        children,
                    }));
                }
                Node::Element(_) => out.push(node.clone()),
            }
        }
        out
    }

    walk(children, start, end, &mut 0, f)
}

/// A leaf together with the inline element that wrapped it.
#[derive(Debug, Clone)]
pub(crate) struct FlatLeaf {
    pub node: Node,
    pub wrapper: Option<Wrapper>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Wrapper {
    /// Identity of the original wrapper; fresh wrappers use `usize::MAX`.
    pub id: usize,
    pub shell: ElementNode,
}

pub(crate) fn flatten_inline(children: &[Node]) -> Vec<FlatLeaf> {
    let mut out = Vec::new();
    for (ix, node) in children.iter().enumerate() {
        match node {
            Node::Element(el) if node.is_inline() => {
                let shell = ElementNode {
                    kind: el.kind.clone(),
                    attrs: el.attrs.clone(),
                    children: Vec::new(),
                };
                for inner in flatten_inline(&el.children) {
                    out.push(FlatLeaf {
                        node: inner.node,
                        wrapper: Some(Wrapper {
                            id: ix,
                            shell: shell.clone(),
                        }),
                    });
                }
            }
            _ => out.push(FlatLeaf {
                node: node.clone(),
                wrapper: None,
            }),
        }
    }
    out
}

pub(crate) fn regroup_inline(flat: Vec<FlatLeaf>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::new();
    let mut current: Option<(Wrapper, Vec<Node>)> = None;

    for leaf in flat {
        match leaf.wrapper {
            None => {
                if let Some((wrapper, children)) = current.take() {
                    out.push(wrap(wrapper, children));
                }
                out.push(leaf.node);
            }
            Some(wrapper) => match &mut current {
                Some((open, children)) if *open == wrapper => children.push(leaf.node),
                _ => {
                    if let Some((open, children)) = current.take() {
                        out.push(wrap(open, children));
                    }
                    current = Some((wrapper, vec![leaf.node]));
                }
            },
        }
    }
    if let Some((wrapper, children)) = current.take() {
        out.push(wrap(wrapper, children));
    }
    out
}

fn wrap(wrapper: Wrapper, children: Vec<Node>) -> Node {
    let mut el = wrapper.shell;
    el.children = children;
    Node::Element(el)
}

/// Splits the flat leaf sequence so that `at` falls on a leaf boundary.
pub(crate) fn split_flat_at(flat: &mut Vec<FlatLeaf>, at: usize) {
    let mut cursor = 0;
    for ix in 0..flat.len() {
        let len = flat[ix].node.inline_len();
        if at > cursor && at < cursor + len {
            if let Node::Text(t) = &flat[ix].node {
                let cut = clamp_to_char_boundary(&t.text, at - cursor);
                let right = TextNode {
                    text: t.text[cut..].to_string(),
                    marks: t.marks.clone(),
                };
                let left = TextNode {
                    text: t.text[..cut].to_string(),
                    marks: t.marks.clone(),
                };
                let wrapper = flat[ix].wrapper.clone();
                flat[ix].node = Node::Text(left);
                flat.insert(
                    ix + 1,
                    FlatLeaf {
                        node: Node::Text(right),
                        wrapper,
                    },
                );
            }
            return;
        }
        cursor += len;
    }
}

/// Offsets `[start, end)` of each flat leaf.
pub(crate) fn flat_spans(flat: &[FlatLeaf]) -> Vec<(usize, usize)> {
    let mut cursor = 0;
    flat.iter()
        .map(|leaf| {
            let start = cursor;
            cursor += leaf.node.inline_len();
            (start, cursor)
        })
        .collect()
}
