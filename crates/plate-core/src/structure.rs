//! Block-level restructuring.
//!
//! The top-level blocks touched by a selection are flattened into a sequence
//! of text-block units (list items remember their list type and depth),
//! rewritten unit by unit and then regrouped into lists again.

use crate::core::{ElementNode, Node, kinds};
use crate::ops::Path;
use crate::registry::NodeRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListPos {
    pub list_type: String,
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub(crate) enum Unit {
    Block {
        el: ElementNode,
        list: Option<ListPos>,
        /// Path of the text block this unit came from.
        origin: Path,
        touched: bool,
    },
    Opaque {
        node: Node,
        origin: Path,
    },
}

impl Unit {
    pub fn origin(&self) -> &Path {
        match self {
            Unit::Block { origin, .. } | Unit::Opaque { origin, .. } => origin,
        }
    }
}

/// Where an old unit's content ended up: the new unit index and the offset
/// added to global offsets inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UnitMove {
    pub to: usize,
    pub shift: usize,
}

pub(crate) fn flatten(
    nodes: &[Node],
    first_index: usize,
    registry: &NodeRegistry,
    touched: &[Path],
) -> Vec<Unit> {
    let mut out = Vec::new();
    for (ix, node) in nodes.iter().enumerate() {
        let path = vec![first_index + ix];
        match node {
            Node::Element(el) if el.kind == kinds::LIST => {
                flatten_list(el, 0, &path, touched, &mut out)
            }
            Node::Element(el) if registry.is_text_block(el) => out.push(Unit::Block {
                el: el.clone(),
                list: None,
                touched: touched.contains(&path),
                origin: path,
            }),
            _ => out.push(Unit::Opaque {
                node: node.clone(),
                origin: path,
            }),
        }
    }
    out
}

fn flatten_list(
    list: &ElementNode,
    depth: usize,
    path: &Path,
    touched: &[Path],
    out: &mut Vec<Unit>,
) {
    let list_type = list.list_type().unwrap_or("bullet").to_string();
    for (ix, child) in list.children.iter().enumerate() {
        let mut item_path = path.clone();
        item_path.push(ix);
        let Node::Element(item) = child else {
            continue;
        };

        let (inline, blocks): (Vec<_>, Vec<_>) = item
            .children
            .iter()
            .enumerate()
            .partition(|(_, n)| n.is_inline());
        let nested: Vec<_> = blocks
            .into_iter()
            .filter_map(|(ix, n)| match n {
                Node::Element(el) if el.kind == kinds::LIST => Some((ix, el)),
                _ => None,
            })
            .collect();

        if !inline.is_empty() || nested.is_empty() {
            let mut el = item.clone();
            el.kind = kinds::LIST_ITEM.to_string();
            el.children = inline.into_iter().map(|(_, n)| n.clone()).collect();
            out.push(Unit::Block {
                el,
                list: Some(ListPos {
                    list_type: list_type.clone(),
                    depth,
                }),
                touched: touched.contains(&item_path),
                origin: item_path.clone(),
            });
        }
        for (nested_ix, nested_list) in nested {
            let mut nested_path = item_path.clone();
            nested_path.push(nested_ix);
            flatten_list(nested_list, depth + 1, &nested_path, touched, out);
        }
    }
}

pub(crate) fn regroup(units: Vec<Unit>) -> Vec<Node> {
    let mut out = Vec::new();
    let mut run: Vec<(ListPos, ElementNode)> = Vec::new();

    for unit in units {
        match unit {
            Unit::Block {
                el,
                list: Some(pos),
                ..
            } => run.push((pos, el)),
            Unit::Block { el, list: None, .. } => {
                flush_lists(&mut run, &mut out);
                out.push(Node::Element(el));
            }
            Unit::Opaque { node, .. } => {
                flush_lists(&mut run, &mut out);
                out.push(node);
            }
        }
    }
    flush_lists(&mut run, &mut out);
    out
}

fn flush_lists(run: &mut Vec<(ListPos, ElementNode)>, out: &mut Vec<Node>) {
    let items = std::mem::take(run);
    let mut ix = 0;
    while ix < items.len() {
        let (list, next) = build_list(&items, ix, items[ix].0.depth);
        out.push(list);
        ix = next;
    }
}

fn build_list(items: &[(ListPos, ElementNode)], start: usize, depth: usize) -> (Node, usize) {
    let list_type = items[start].0.list_type.clone();
    let mut children = Vec::new();
    let mut ix = start;
    while ix < items.len() {
        let (pos, item) = &items[ix];
        if pos.depth < depth {
            break;
        }
        if pos.depth == depth {
            if pos.list_type != list_type {
                break;
            }
            children.push(Node::Element(item.clone()));
            ix += 1;
        } else {
            let (nested, next) = build_list(items, ix, pos.depth);
            children.push(Node::list_item(vec![nested]));
            ix = next;
        }
    }
    (Node::list(&list_type, children), ix)
}

/// Keeps the alignment and direction of a block that changes type.
pub(crate) fn carry_block_attrs(from: &ElementNode, to: &mut ElementNode) {
    for key in ["align", "dir"] {
        if let Some(value) = from.attrs.get(key) {
            to.attrs.entry(key.to_string()).or_insert_with(|| value.clone());
        }
    }
}

/// Applies `f` to each touched block unit; the unit order is unchanged.
pub(crate) fn map_touched(
    units: Vec<Unit>,
    mut f: impl FnMut(ElementNode, Option<ListPos>) -> (ElementNode, Option<ListPos>),
) -> (Vec<Unit>, Vec<UnitMove>) {
    let moves = (0..units.len()).map(|to| UnitMove { to, shift: 0 }).collect();
    let units = units
        .into_iter()
        .map(|unit| match unit {
            Unit::Block {
                el,
                list,
                origin,
                touched: true,
            } => {
                let (el, list) = f(el, list);
                Unit::Block {
                    el,
                    list,
                    origin,
                    touched: true,
                }
            }
            other => other,
        })
        .collect();
    (units, moves)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_lists_survive_flatten_and_regroup() {
        let registry = NodeRegistry::richtext();
        let nested = Node::list("number", vec![Node::list_item(vec![Node::text("b")])]);
        let list = Node::list(
            "bullet",
            vec![
                Node::list_item(vec![Node::text("a")]),
                Node::list_item(vec![nested]),
                Node::list_item(vec![Node::text("c")]),
            ],
        );
        let units = flatten(std::slice::from_ref(&list), 0, &registry, &[]);
        assert_eq!(units.len(), 3);
        assert_eq!(units[1].origin(), &vec![0, 1, 0, 0]);
        assert_eq!(regroup(units), vec![list]);
    }
}
