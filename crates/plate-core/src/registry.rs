use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{
    Document, ElementNode, Marks, Node, NodeSelection, Point, Selection, TextNode, kinds,
};
use crate::ops::Op;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub role: NodeRole,
    pub is_decorator: bool,
    pub children: ChildConstraint,
}

impl NodeSpec {
    fn block(kind: &str, children: ChildConstraint) -> Self {
        Self {
            kind: kind.to_string(),
            role: NodeRole::Block,
            is_decorator: false,
            children,
        }
    }
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &NodeRegistry) -> Vec<Op>;
}

pub trait NodePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct NodeRegistry {
    node_specs: HashMap<String, NodeSpec>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
}

impl NodeRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn NodePlugin>>) -> Result<Self, String> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    pub fn core() -> Self {
        let plugins: Vec<Box<dyn NodePlugin>> =
            vec![Box::new(CoreParagraphPlugin), Box::new(CoreNormalizePlugin)];
        Self::new(plugins).expect("core registry must be valid")
    }

    /// Every node kind the toolbar works with.
    pub fn richtext() -> Self {
        let plugins: Vec<Box<dyn NodePlugin>> = vec![
            Box::new(CoreParagraphPlugin),
            Box::new(CoreNormalizePlugin),
            Box::new(HeadingPlugin),
            Box::new(QuotePlugin),
            Box::new(CodeBlockPlugin),
            Box::new(ListPlugin),
            Box::new(LinkPlugin),
            Box::new(ImagePlugin),
        ];
        Self::new(plugins).expect("richtext registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn NodePlugin>) -> Result<(), String> {
        for spec in plugin.node_specs() {
            if self.node_specs.contains_key(&spec.kind) {
                return Err(format!("Duplicate node spec kind: {}", spec.kind));
            }
            self.node_specs.insert(spec.kind.clone(), spec);
        }
        self.normalize_passes.extend(plugin.normalize_passes());
        tracing::debug!(plugin = plugin.id(), "registered node plugin");
        Ok(())
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn has_node(&self, kind: &str) -> bool {
        self.node_specs.contains_key(kind)
    }

    /// Returns the kinds from `kinds` that are not registered.
    pub fn missing<'k>(&self, kinds: &[&'k str]) -> Vec<&'k str> {
        kinds
            .iter()
            .copied()
            .filter(|kind| !self.has_node(kind))
            .collect()
    }

    /// A block element whose children are inline content.
    pub fn is_text_block(&self, el: &ElementNode) -> bool {
        match self.node_specs.get(&el.kind) {
            Some(spec) if spec.role == NodeRole::Inline => false,
            Some(spec) if spec.children == ChildConstraint::InlineOnly => true,
            Some(spec) if spec.children == ChildConstraint::BlockOnly => false,
            _ => el.children.iter().any(Node::is_inline),
        }
    }

    /// Runs the passes in registration order and returns the ops of the first
    /// pass that wants to change the document.
    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        for pass in &self.normalize_passes {
            let ops = pass.run(doc, self);
            if !ops.is_empty() {
                tracing::trace!(pass = pass.id(), ops = ops.len(), "normalize pass");
                return ops;
            }
        }
        Vec::new()
    }

    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Option<Selection> {
        match selection {
            Selection::Range(range) => {
                let fallback = first_text_point(doc).unwrap_or(Point {
                    path: vec![0],
                    offset: 0,
                });

                let anchor =
                    normalize_point_to_existing_text(doc, &range.anchor).unwrap_or_else(|| {
                        normalize_point_to_existing_text(doc, &range.focus)
                            .unwrap_or_else(|| fallback.clone())
                    });
                let focus = normalize_point_to_existing_text(doc, &range.focus)
                    .unwrap_or_else(|| anchor.clone());

                Some(Selection::range(anchor, focus))
            }
            Selection::Node(nodes) => {
                let paths: Vec<_> = nodes
                    .paths
                    .iter()
                    .filter(|p| matches!(doc.node(p), Some(Node::Decorator(_))))
                    .cloned()
                    .collect();
                if paths.is_empty() {
                    None
                } else {
                    Some(Selection::Node(NodeSelection { paths }))
                }
            }
        }
    }
}

fn first_text_point(doc: &Document) -> Option<Point> {
    let mut path = Vec::new();
    first_text_descendant(&doc.children, &mut path)
}

fn first_text_descendant(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        match node {
            Node::Text(_) => {
                let point = Point {
                    path: path.clone(),
                    offset: 0,
                };
                path.pop();
                return Some(point);
            }
            Node::Element(el) => {
                if let Some(point) = first_text_descendant(&el.children, path) {
                    path.pop();
                    return Some(point);
                }
            }
            Node::Decorator(_) => {}
        }
        path.pop();
    }
    None
}

fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                return Some(Point {
                    path: resolved_path,
                    offset: clamp_offset(&t.text, point.offset),
                });
            }
            Node::Element(el) => {
                children = &el.children;
            }
            Node::Decorator(_) => {
                break;
            }
        }
    }

    match doc.node(&resolved_path)? {
        Node::Text(t) => Some(Point {
            offset: clamp_offset(&t.text, point.offset),
            path: resolved_path,
        }),
        Node::Element(el) => first_text_descendant(&el.children, &mut resolved_path),
        Node::Decorator(_) => {
            // Step over the decorator to the next text leaf in the same parent.
            let (last, parent) = resolved_path.split_last()?;
            let siblings = match parent {
                [] => &doc.children,
                parent => &doc.node(parent)?.as_element()?.children,
            };
            let next = siblings
                .iter()
                .enumerate()
                .skip(last + 1)
                .find(|(_, n)| matches!(n, Node::Text(_)))?;
            let mut path = parent.to_vec();
            path.push(next.0);
            Some(Point { path, offset: 0 })
        }
    }
}

fn clamp_offset(text: &str, offset: usize) -> usize {
    let mut ix = offset.min(text.len());
    while ix > 0 && !text.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

struct CoreParagraphPlugin;

impl NodePlugin for CoreParagraphPlugin {
    fn id(&self) -> &'static str {
        "core.paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block(kinds::PARAGRAPH, ChildConstraint::InlineOnly)]
    }
}

struct CoreNormalizePlugin;

impl NodePlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(WrapRootInlineNodes),
            Box::new(EnsureTextBlockHasTextLeaf),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &NodeRegistry) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

/// Decorators and stray text never sit directly under the root.
struct WrapRootInlineNodes;

impl NormalizePass for WrapRootInlineNodes {
    fn id(&self) -> &'static str {
        "core.wrap_root_inline_nodes"
    }

    fn run(&self, doc: &Document, _registry: &NodeRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, node) in doc.children.iter().enumerate() {
            if !node.is_inline() {
                continue;
            }
            let mut children = vec![node.clone()];
            if !matches!(node, Node::Text(_)) {
                children.push(Node::text(""));
            }
            ops.push(Op::RemoveNode { path: vec![ix] });
            ops.push(Op::InsertNode {
                path: vec![ix],
                node: Node::Element(ElementNode::paragraph(children)),
            });
        }
        ops
    }
}

struct EnsureTextBlockHasTextLeaf;

impl NormalizePass for EnsureTextBlockHasTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_text_block_has_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &NodeRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(
            children: &[Node],
            path: &mut Vec<usize>,
            registry: &NodeRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };
                if node.is_inline() {
                    continue;
                }

                path.push(ix);
                let empty_item = el.kind == kinds::LIST_ITEM && el.children.is_empty();
                if registry.is_text_block(el) || empty_item {
                    let has_text = el.children.iter().any(|n| matches!(n, Node::Text(_)));
                    if !has_text {
                        let mut insert_path = path.clone();
                        insert_path.push(el.children.len());
                        ops.push(Op::InsertNode {
                            path: insert_path,
                            node: Node::Text(TextNode::new("")),
                        });
                    }
                }
                walk(&el.children, path, registry, ops);
                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), registry, &mut ops);
        ops
    }
}

/// Merges runs of text leaves with equal marks.
///
/// Runs are folded left to right into their first leaf. `AppendText` leaves
/// points at the old end of that leaf in place, and removing the appended leaf
/// maps its points onto the merged text.
struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, _registry: &NodeRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            // Leaves already merged away; later siblings sit this many slots left.
            let mut removed = 0;
            // Live index and marks of the leaf the current run folds into.
            let mut run: Option<(usize, &Marks)> = None;
            for (ix, node) in children.iter().enumerate() {
                let live = ix - removed;
                match node {
                    Node::Element(el) => {
                        run = None;
                        path.push(live);
                        walk(&el.children, path, ops);
                        path.pop();
                    }
                    Node::Decorator(_) => run = None,
                    Node::Text(leaf) => match run {
                        Some((target, marks)) if *marks == leaf.marks => {
                            if !leaf.text.is_empty() {
                                let mut target_path = path.clone();
                                target_path.push(target);
                                ops.push(Op::AppendText {
                                    path: target_path,
                                    text: leaf.text.clone(),
                                });
                            }
                            let mut remove_path = path.clone();
                            remove_path.push(live);
                            ops.push(Op::RemoveNode { path: remove_path });
                            removed += 1;
                        }
                        _ => run = Some((live, &leaf.marks)),
                    },
                }
            }
        }

        walk(&doc.children, &mut Vec::new(), &mut ops);
        ops
    }
}

struct HeadingPlugin;

impl NodePlugin for HeadingPlugin {
    fn id(&self) -> &'static str {
        "heading"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block(kinds::HEADING, ChildConstraint::InlineOnly)]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeHeadingLevels)]
    }
}

struct NormalizeHeadingLevels;

impl NormalizePass for NormalizeHeadingLevels {
    fn id(&self) -> &'static str {
        "heading.normalize_levels"
    }

    fn run(&self, doc: &Document, _registry: &NodeRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, node) in doc.children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            if el.kind != kinds::HEADING {
                continue;
            }
            let level = el.attrs.get("level").and_then(Value::as_u64);
            let fixed = level.unwrap_or(1).clamp(1, 6);
            if level != Some(fixed) {
                ops.push(Op::SetNodeAttrs {
                    path: vec![ix],
                    patch: crate::core::AttrPatch::set("level", Value::from(fixed)),
                });
            }
        }
        ops
    }
}

struct QuotePlugin;

impl NodePlugin for QuotePlugin {
    fn id(&self) -> &'static str {
        "quote"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block(kinds::QUOTE, ChildConstraint::InlineOnly)]
    }
}

struct CodeBlockPlugin;

impl NodePlugin for CodeBlockPlugin {
    fn id(&self) -> &'static str {
        "code_block"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block(kinds::CODE_BLOCK, ChildConstraint::InlineOnly)]
    }
}

struct ListPlugin;

impl NodePlugin for ListPlugin {
    fn id(&self) -> &'static str {
        "list"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::block(kinds::LIST, ChildConstraint::BlockOnly),
            NodeSpec::block(kinds::LIST_ITEM, ChildConstraint::Any),
        ]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeLists)]
    }
}

/// Drops empty lists and fills in a missing `list_type`.
struct NormalizeLists;

impl NormalizePass for NormalizeLists {
    fn id(&self) -> &'static str {
        "list.normalize"
    }

    fn run(&self, doc: &Document, _registry: &NodeRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            for (ix, node) in children.iter().enumerate().rev() {
                let Node::Element(el) = node else {
                    continue;
                };
                path.push(ix);
                if el.kind == kinds::LIST {
                    if el.children.is_empty() {
                        ops.push(Op::RemoveNode { path: path.clone() });
                        path.pop();
                        continue;
                    }
                    let valid = matches!(el.attr_str("list_type"), Some("bullet" | "number"));
                    if !valid {
                        ops.push(Op::SetNodeAttrs {
                            path: path.clone(),
                            patch: crate::core::AttrPatch::set("list_type", Value::from("bullet")),
                        });
                    }
                }
                walk(&el.children, path, ops);
                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), &mut ops);
        ops
    }
}

struct LinkPlugin;

impl NodePlugin for LinkPlugin {
    fn id(&self) -> &'static str {
        "link"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: kinds::LINK.to_string(),
            role: NodeRole::Inline,
            is_decorator: false,
            children: ChildConstraint::InlineOnly,
        }]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(RemoveEmptyLinks)]
    }
}

struct RemoveEmptyLinks;

impl NormalizePass for RemoveEmptyLinks {
    fn id(&self) -> &'static str {
        "link.remove_empty"
    }

    fn run(&self, doc: &Document, _registry: &NodeRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            for (ix, node) in children.iter().enumerate().rev() {
                let Node::Element(el) = node else {
                    continue;
                };
                path.push(ix);
                if el.kind == kinds::LINK && node.inline_len() == 0 {
                    ops.push(Op::RemoveNode { path: path.clone() });
                } else {
                    walk(&el.children, path, ops);
                }
                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), &mut ops);
        ops
    }
}

struct ImagePlugin;

impl NodePlugin for ImagePlugin {
    fn id(&self) -> &'static str {
        "image"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: kinds::IMAGE.to_string(),
            role: NodeRole::Inline,
            is_decorator: true,
            children: ChildConstraint::None,
        }]
    }
}
