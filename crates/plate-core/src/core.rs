use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EditError, PathError};
use crate::image::ImageNode;
use crate::ops::{Op, Path, Transaction};
use crate::read::ReadTxn;
use crate::registry::NodeRegistry;

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementKind = String;

pub mod kinds {
    pub const PARAGRAPH: &str = "paragraph";
    pub const HEADING: &str = "heading";
    pub const QUOTE: &str = "quote";
    pub const CODE_BLOCK: &str = "code_block";
    pub const LIST: &str = "list";
    pub const LIST_ITEM: &str = "list_item";
    pub const LINK: &str = "link";
    pub const IMAGE: &str = "image";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        node_ref(self, path)
    }

    /// Text content with blocks separated by newlines. Decorators contribute nothing.
    pub fn plain_text(&self) -> String {
        fn collect_inline(children: &[Node], out: &mut String) {
            for child in children {
                match child {
                    Node::Text(t) => out.push_str(&t.text),
                    Node::Element(el) => collect_inline(&el.children, out),
                    Node::Decorator(_) => {}
                }
            }
        }

        fn collect_blocks(children: &[Node], out: &mut Vec<String>) {
            for child in children {
                let Node::Element(el) = child else {
                    continue;
                };
                if el.children.iter().any(Node::is_inline) {
                    let mut line = String::new();
                    collect_inline(&el.children, &mut line);
                    out.push(line);
                }
                collect_blocks(&el.children, out);
            }
        }

        let mut lines = Vec::new();
        collect_blocks(&self.children, &mut lines);
        lines.join("\n")
    }

    /// True when the document holds no text and no decorators.
    pub fn is_empty(&self) -> bool {
        fn has_content(children: &[Node]) -> bool {
            children.iter().any(|node| match node {
                Node::Text(t) => !t.text.is_empty(),
                Node::Decorator(_) => true,
                Node::Element(el) => has_content(&el.children),
            })
        }
        !has_content(&self.children)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Decorator(DecoratorNode),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode::new(text))
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::Element(ElementNode::paragraph(vec![Node::text(text)]))
    }

    pub fn heading(level: u64, text: impl Into<String>) -> Self {
        Node::Element(ElementNode::heading(level, vec![Node::text(text)]))
    }

    pub fn quote(text: impl Into<String>) -> Self {
        Node::Element(ElementNode::new(kinds::QUOTE, vec![Node::text(text)]))
    }

    pub fn code_block(text: impl Into<String>) -> Self {
        Node::Element(ElementNode::new(kinds::CODE_BLOCK, vec![Node::text(text)]))
    }

    pub fn list(list_type: &str, items: Vec<Node>) -> Self {
        Node::Element(ElementNode::list(list_type, items))
    }

    pub fn list_item(children: Vec<Node>) -> Self {
        Node::Element(ElementNode::new(kinds::LIST_ITEM, children))
    }

    pub fn link(url: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element(ElementNode::link(url, children))
    }

    pub fn image(image: ImageNode) -> Self {
        Node::Decorator(DecoratorNode::Image(image))
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageNode> {
        match self {
            Node::Decorator(DecoratorNode::Image(image)) => Some(image),
            _ => None,
        }
    }

    fn is_kind(&self, kind: &str) -> bool {
        matches!(self, Node::Element(el) if el.kind == kind)
    }

    pub fn is_link(&self) -> bool {
        self.is_kind(kinds::LINK)
    }

    pub fn is_list(&self) -> bool {
        self.is_kind(kinds::LIST)
    }

    pub fn is_list_item(&self) -> bool {
        self.is_kind(kinds::LIST_ITEM)
    }

    pub fn is_heading(&self) -> bool {
        self.is_kind(kinds::HEADING)
    }

    pub fn is_quote(&self) -> bool {
        self.is_kind(kinds::QUOTE)
    }

    pub fn is_code_block(&self) -> bool {
        self.is_kind(kinds::CODE_BLOCK)
    }

    pub fn is_image(&self) -> bool {
        self.as_image().is_some()
    }

    /// Text leaves, decorators and inline elements (links).
    pub fn is_inline(&self) -> bool {
        match self {
            Node::Text(_) | Node::Decorator(_) => true,
            Node::Element(el) => el.kind == kinds::LINK,
        }
    }

    /// Length of the node in inline offsets. Decorators count as a single unit.
    pub fn inline_len(&self) -> usize {
        match self {
            Node::Text(t) => t.text.len(),
            Node::Decorator(_) => 1,
            Node::Element(el) => el.children.iter().map(Node::inline_len).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn new(kind: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            kind: kind.into(),
            attrs: Attrs::default(),
            children,
        }
    }

    pub fn paragraph(children: Vec<Node>) -> Self {
        Self::new(kinds::PARAGRAPH, children)
    }

    pub fn heading(level: u64, children: Vec<Node>) -> Self {
        Self::new(kinds::HEADING, children).with_attr("level", Value::from(level))
    }

    pub fn list(list_type: &str, items: Vec<Node>) -> Self {
        Self::new(kinds::LIST, items).with_attr("list_type", Value::from(list_type))
    }

    pub fn link(url: impl Into<String>, children: Vec<Node>) -> Self {
        Self::new(kinds::LINK, children).with_attr("url", Value::from(url.into()))
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }

    pub fn heading_level(&self) -> Option<u64> {
        if self.kind != kinds::HEADING {
            return None;
        }
        self.attrs.get("level").and_then(Value::as_u64)
    }

    pub fn list_type(&self) -> Option<&str> {
        if self.kind != kinds::LIST {
            return None;
        }
        self.attr_str("list_type")
    }

    pub fn url(&self) -> Option<&str> {
        if self.kind != kinds::LINK {
            return None;
        }
        self.attr_str("url")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecoratorNode {
    Image(ImageNode),
}

impl DecoratorNode {
    pub fn kind(&self) -> &'static str {
        match self {
            DecoratorNode::Image(_) => kinds::IMAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Marks::default(),
        }
    }

    pub fn with_marks(mut self, marks: Marks) -> Self {
        self.marks = marks;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

impl Marks {
    pub fn has(&self, flag: FormatFlag) -> bool {
        match flag {
            FormatFlag::Bold => self.bold,
            FormatFlag::Italic => self.italic,
            FormatFlag::Underline => self.underline,
            FormatFlag::Strikethrough => self.strikethrough,
            FormatFlag::Code => self.code,
        }
    }

    pub fn set(&mut self, flag: FormatFlag, on: bool) {
        let slot = match flag {
            FormatFlag::Bold => &mut self.bold,
            FormatFlag::Italic => &mut self.italic,
            FormatFlag::Underline => &mut self.underline,
            FormatFlag::Strikethrough => &mut self.strikethrough,
            FormatFlag::Code => &mut self.code,
        };
        *slot = on;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatFlag {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
}

impl FormatFlag {
    pub const ALL: [FormatFlag; 5] = [
        FormatFlag::Bold,
        FormatFlag::Italic,
        FormatFlag::Underline,
        FormatFlag::Strikethrough,
        FormatFlag::Code,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSelection {
    pub anchor: Point,
    pub focus: Point,
}

impl RangeSelection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// Object selection of whole nodes (decorators). Carries no offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSelection {
    pub paths: Vec<Path>,
}

impl NodeSelection {
    pub fn contains(&self, path: &[usize]) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selection {
    Range(RangeSelection),
    Node(NodeSelection),
}

impl Selection {
    pub fn range(anchor: Point, focus: Point) -> Self {
        Selection::Range(RangeSelection::new(anchor, focus))
    }

    pub fn caret(point: Point) -> Self {
        Selection::Range(RangeSelection::collapsed(point))
    }

    pub fn node(path: Path) -> Self {
        Selection::Node(NodeSelection { paths: vec![path] })
    }

    pub fn as_range(&self) -> Option<&RangeSelection> {
        match self {
            Selection::Range(range) => Some(range),
            Selection::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeSelection> {
        match self {
            Selection::Node(nodes) => Some(nodes),
            Selection::Range(_) => None,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Selection::Range(_))
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Option<Selection>,
    pub selection_after: Option<Selection>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl EditorConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        self
    }
}

/// Notification delivered to subscribers after a committed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    Updated { source: String },
    SelectionChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&EditorEvent, &ReadTxn<'_>)>;

struct ListenerEntry {
    id: ListenerId,
    callback: Listener,
}

pub struct Editor {
    doc: Document,
    selection: Option<Selection>,
    registry: NodeRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
    listeners: Vec<ListenerEntry>,
    next_listener: u64,
    revision: u64,
}

impl Editor {
    pub fn new(doc: Document, selection: Option<Selection>, registry: NodeRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Option<Selection>,
        registry: NodeRegistry,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            doc,
            selection,
            registry,
            config: config.with_defaults(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
            revision: 0,
        };
        editor.normalize_in_place();
        editor
    }

    pub fn with_core_nodes() -> Self {
        Self::empty(NodeRegistry::core())
    }

    pub fn with_richtext_nodes() -> Self {
        Self::empty(NodeRegistry::richtext())
    }

    fn empty(registry: NodeRegistry) -> Self {
        let doc = Document::new(vec![Node::paragraph("")]);
        let selection = Selection::caret(Point::new(vec![0, 0], 0));
        Self::new(doc, Some(selection), registry)
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Bumped on every committed change, undo and redo.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replaces the selection outside of an update. Emits `SelectionChanged`
    /// when the normalized selection differs.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        let before = self.selection.clone();
        self.selection = selection;
        self.normalize_selection_in_place();
        if self.selection != before {
            self.notify(EditorEvent::SelectionChanged);
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&ReadTxn<'_>) -> R) -> R {
        f(&self.read_txn())
    }

    pub fn read_txn(&self) -> ReadTxn<'_> {
        ReadTxn::new(&self.doc, self.selection.as_ref(), &self.registry)
    }

    /// Runs `f` inside an update scope. On `Err` every op applied by `f` is
    /// rolled back and nothing is recorded or notified.
    pub fn update<R>(
        &mut self,
        source: &str,
        f: impl FnOnce(&mut UpdateScope<'_>) -> Result<R, EditError>,
    ) -> Result<R, EditError> {
        let (out, changed) = {
            let mut scope = UpdateScope::begin(self, source);
            let out = f(&mut scope)?;
            let changed = scope.commit()?;
            (out, changed)
        };
        if changed {
            self.revision += 1;
            tracing::debug!(source, revision = self.revision, "update committed");
            self.notify(EditorEvent::Updated {
                source: source.to_string(),
            });
        }
        Ok(out)
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), EditError> {
        let source = tx.meta.source.clone().unwrap_or_else(|| "apply".to_string());
        self.update(&source, |scope| {
            for op in tx.ops {
                scope.apply(op)?;
            }
            if let Some(sel) = tx.selection_after {
                scope.set_selection(Some(sel));
            }
            Ok(())
        })
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&EditorEvent, &ReadTxn<'_>) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push(ListenerEntry {
            id,
            callback: Box::new(listener),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|entry| entry.id != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, event: EditorEvent) {
        let mut listeners = std::mem::take(&mut self.listeners);
        {
            let read = self.read_txn();
            for entry in &mut listeners {
                (entry.callback)(&event, &read);
            }
        }
        self.listeners = listeners;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let redo_ops = self.replay(inverse_ops);
        self.selection = selection_before.clone();
        self.normalize_in_place();

        self.redo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: redo_ops,
        });
        self.revision += 1;
        self.notify(EditorEvent::Updated {
            source: "history.undo".to_string(),
        });
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let undo_ops = self.replay(inverse_ops);
        self.selection = selection_after.clone();
        self.normalize_in_place();

        self.undo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: undo_ops,
        });
        self.revision += 1;
        self.notify(EditorEvent::Updated {
            source: "history.redo".to_string(),
        });
        true
    }

    fn replay(&mut self, ops: Vec<Op>) -> Vec<Op> {
        let mut inverse: Vec<Op> = Vec::new();
        for op in ops {
            match apply_op_to(&mut self.doc, &mut self.selection, op) {
                Ok(inv) => inverse.push(inv),
                Err(err) => {
                    // Stop at the first op that no longer fits the document.
                    tracing::warn!(%err, "history replay stopped");
                    break;
                }
            }
        }
        inverse.reverse();
        inverse
    }

    fn normalize_in_place(&mut self) {
        let mut sink = Vec::new();
        if let Err(err) = normalize_doc(
            &mut self.doc,
            &mut self.selection,
            &self.registry,
            self.config.max_normalize_iterations,
            &mut sink,
        ) {
            tracing::warn!(%err, "normalization failed");
        }
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = self
            .selection
            .take()
            .and_then(|sel| self.registry.normalize_selection(&self.doc, &sel));
    }
}

fn normalize_doc(
    doc: &mut Document,
    selection: &mut Option<Selection>,
    registry: &NodeRegistry,
    max_iterations: usize,
    inverse_ops: &mut Vec<Op>,
) -> Result<(), EditError> {
    for _ in 0..max_iterations {
        let ops = registry.normalize(doc);
        if ops.is_empty() {
            return Ok(());
        }
        for op in ops {
            let inv = apply_op_to(doc, selection, op)?;
            inverse_ops.push(inv);
        }
    }
    Err(EditError::NormalizeDidNotConverge)
}

/// Mutable view over an `Editor` for the duration of one update.
///
/// Every op is recorded together with its inverse. Dropping the scope without
/// a successful commit reverts the document and selection.
pub struct UpdateScope<'a> {
    editor: &'a mut Editor,
    source: String,
    inverse_ops: Vec<Op>,
    selection_before: Option<Selection>,
    committed: bool,
}

impl<'a> UpdateScope<'a> {
    fn begin(editor: &'a mut Editor, source: &str) -> Self {
        let selection_before = editor.selection.clone();
        Self {
            editor,
            source: source.to_string(),
            inverse_ops: Vec::new(),
            selection_before,
            committed: false,
        }
    }

    pub fn read(&self) -> ReadTxn<'_> {
        self.editor.read_txn()
    }

    pub fn doc(&self) -> &Document {
        &self.editor.doc
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.editor.selection.as_ref()
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.editor.registry
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn apply(&mut self, op: Op) -> Result<(), EditError> {
        let inv = apply_op_to(&mut self.editor.doc, &mut self.editor.selection, op)?;
        self.inverse_ops.push(inv);
        Ok(())
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.editor.selection = selection;
    }

    pub fn insert_node(&mut self, path: Path, node: Node) -> Result<(), EditError> {
        self.apply(Op::InsertNode { path, node })
    }

    pub fn remove_node(&mut self, path: Path) -> Result<(), EditError> {
        self.apply(Op::RemoveNode { path })
    }

    pub fn replace_node(&mut self, path: Path, node: Node) -> Result<(), EditError> {
        self.apply(Op::RemoveNode { path: path.clone() })?;
        self.apply(Op::InsertNode { path, node })
    }

    fn commit(mut self) -> Result<bool, EditError> {
        let mut normalize_inverse = Vec::new();
        let result = normalize_doc(
            &mut self.editor.doc,
            &mut self.editor.selection,
            &self.editor.registry,
            self.editor.config.max_normalize_iterations,
            &mut normalize_inverse,
        );
        self.inverse_ops.append(&mut normalize_inverse);
        result?;
        self.editor.normalize_selection_in_place();

        self.committed = true;
        let selection_after = self.editor.selection.clone();
        if self.inverse_ops.is_empty() {
            return Ok(selection_after != self.selection_before);
        }

        let mut inverse_ops = std::mem::take(&mut self.inverse_ops);
        inverse_ops.reverse();
        let editor = &mut *self.editor;
        editor.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before: self.selection_before.clone(),
            selection_after,
        });
        editor.redo_stack.clear();
        if editor.undo_stack.len() > editor.config.max_undo {
            editor.undo_stack.remove(0);
        }
        Ok(true)
    }
}

impl Drop for UpdateScope<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if !self.inverse_ops.is_empty() {
            tracing::warn!(
                source = %self.source,
                ops = self.inverse_ops.len(),
                "rolling back update"
            );
        }
        while let Some(op) = self.inverse_ops.pop() {
            if let Err(err) = apply_op_to(&mut self.editor.doc, &mut self.editor.selection, op) {
                tracing::warn!(%err, "rollback op failed");
                break;
            }
        }
        self.editor.selection = self.selection_before.take();
    }
}

fn apply_op_to(
    doc: &mut Document,
    selection: &mut Option<Selection>,
    op: Op,
) -> Result<Op, EditError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, &path, offset, text.len());
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::AppendText { path, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let start = text_node.text.len();
            text_node.text.push_str(&text);
            Ok(Op::RemoveText {
                path,
                range: start..start + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start =
                clamp_to_char_boundary(&text_node.text, range.start.min(text_node.text.len()));
            let end = clamp_to_char_boundary(&text_node.text, range.end.min(text_node.text.len()));
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed = text_node.text[start..end].to_string();
            text_node.text.replace_range(start..end, "");
            transform_selection_remove_text(selection, &path, start..end);
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            transform_selection_insert_node(selection, &path);
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, &path)?;
            transform_selection_remove_node(selection, &path, &removed, doc);
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetNodeAttrs { path, patch } => {
            let node = node_mut(doc, &path)?;
            let old = match node {
                Node::Element(el) => patch_apply(&mut el.attrs, &patch),
                Node::Decorator(_) | Node::Text(_) => {
                    return Err(PathError("Node has no attrs".into()).into());
                }
            };
            Ok(Op::SetNodeAttrs { path, patch: old })
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = node_text_mut(doc, &path)?;
            let old = std::mem::replace(&mut text_node.marks, marks);
            Ok(Op::SetTextMarks { path, marks: old })
        }
        Op::SetDecorator { path, decorator } => {
            let node = node_mut(doc, &path)?;
            let Node::Decorator(current) = node else {
                return Err(PathError("Expected decorator node".into()).into());
            };
            let old = std::mem::replace(current, decorator);
            Ok(Op::SetDecorator {
                path,
                decorator: old,
            })
        }
    }
}

fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn range_points_mut(selection: &mut Option<Selection>) -> Vec<&mut Point> {
    match selection {
        Some(Selection::Range(range)) => vec![&mut range.anchor, &mut range.focus],
        _ => Vec::new(),
    }
}

fn selection_paths_mut(selection: &mut Option<Selection>) -> Vec<&mut Path> {
    match selection {
        Some(Selection::Range(range)) => vec![&mut range.anchor.path, &mut range.focus.path],
        Some(Selection::Node(nodes)) => nodes.paths.iter_mut().collect(),
        None => Vec::new(),
    }
}

fn transform_selection_insert_text(
    selection: &mut Option<Selection>,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for point in range_points_mut(selection) {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Option<Selection>,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in range_points_mut(selection) {
        if point.path != path || point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Option<Selection>, path: &[usize]) {
    if path.is_empty() {
        return;
    }
    let (parent_path, index) = path.split_at(path.len() - 1);
    let index = index[0];
    let depth = parent_path.len();

    for p in selection_paths_mut(selection) {
        if p.len() <= depth || !p.starts_with(parent_path) {
            continue;
        }
        if p[depth] >= index {
            p[depth] += 1;
        }
    }
}

fn transform_selection_remove_node(
    selection: &mut Option<Selection>,
    path: &[usize],
    removed: &Node,
    doc_after_remove: &Document,
) {
    if path.is_empty() {
        return;
    }
    let (parent_path, index) = path.split_at(path.len() - 1);
    let index = index[0];
    let depth = parent_path.len();

    // A text leaf whose content was already appended to its left sibling.
    let merge_prefix_len = match (removed, index.checked_sub(1)) {
        (Node::Text(removed_text), Some(left_index)) => {
            let mut left_path = parent_path.to_vec();
            left_path.push(left_index);
            match node_ref(doc_after_remove, &left_path) {
                Some(Node::Text(left_text))
                    if left_text.marks == removed_text.marks
                        && left_text.text.ends_with(&removed_text.text) =>
                {
                    Some(left_text.text.len() - removed_text.text.len())
                }
                _ => None,
            }
        }
        _ => None,
    };

    if let Some(Selection::Node(nodes)) = selection.as_mut() {
        nodes
            .paths
            .retain(|p| !(p.len() > depth && p.starts_with(parent_path) && p[depth] == index));
        for p in &mut nodes.paths {
            if p.len() > depth && p.starts_with(parent_path) && p[depth] > index {
                p[depth] -= 1;
            }
        }
        if nodes.paths.is_empty() {
            *selection = None;
        }
        return;
    }

    for point in range_points_mut(selection) {
        if point.path.len() <= depth || !point.path.starts_with(parent_path) {
            continue;
        }
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        match (merge_prefix_len, removed) {
            (Some(prefix), Node::Text(removed_text)) => {
                point.path.truncate(depth + 1);
                point.path[depth] = index - 1;
                point.offset = prefix + point.offset.min(removed_text.text.len());
            }
            _ => {
                // Selection normalization resolves this to a nearby text leaf.
                point.path.truncate(depth + 1);
                point.path[depth] = index.saturating_sub(1);
                point.offset = 0;
            }
        }
    }
}

pub(crate) fn node_ref<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let mut node = doc.children.get(*first)?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Decorator(_) | Node::Text(_) => return None,
        };
    }
    Some(node)
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    let Some((first, rest)) = path.split_first() else {
        return Err(PathError("Empty path".into()));
    };

    let len = doc.children.len();
    let mut node = doc
        .children
        .get_mut(*first)
        .ok_or_else(|| PathError(format!("Path out of bounds at depth 0: {first} >= {len}")))?;

    for (depth, &ix) in rest.iter().enumerate() {
        node = match node {
            Node::Element(el) => {
                let len = el.children.len();
                el.children.get_mut(ix).ok_or_else(|| {
                    PathError(format!(
                        "Path out of bounds at depth {}: {ix} >= {len}",
                        depth + 1
                    ))
                })?
            }
            Node::Decorator(_) | Node::Text(_) => {
                return Err(PathError(format!("Non-container node at depth {depth}")));
            }
        };
    }
    Ok(node)
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(PathError("Expected Text node".into())),
    }
}

fn children_mut<'a>(doc: &'a mut Document, parent_path: &[usize]) -> Result<&'a mut Vec<Node>, PathError> {
    if parent_path.is_empty() {
        return Ok(&mut doc.children);
    }
    match node_mut(doc, parent_path)? {
        Node::Element(el) => Ok(&mut el.children),
        Node::Decorator(_) | Node::Text(_) => Err(PathError("Parent is not a container".into())),
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), PathError> {
    let Some((index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty insert path".into()));
    };
    let children = children_mut(doc, parent_path)?;
    if *index > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(*index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, PathError> {
    let Some((index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty remove path".into()));
    };
    let children = children_mut(doc, parent_path)?;
    if *index >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(*index))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        let mut set = Attrs::new();
        set.insert(key.into(), value);
        Self {
            set,
            remove: Vec::new(),
        }
    }
}

fn patch_apply(attrs: &mut Attrs, patch: &AttrPatch) -> AttrPatch {
    let mut old_set: Attrs = Attrs::new();
    let mut old_remove: Vec<String> = Vec::new();

    for (k, v) in &patch.set {
        if let Some(prev) = attrs.insert(k.clone(), v.clone()) {
            old_set.insert(k.clone(), prev);
        } else {
            old_remove.push(k.clone());
        }
    }

    for key in &patch.remove {
        if let Some(prev) = attrs.remove(key) {
            old_set.insert(key.clone(), prev);
        }
    }

    AttrPatch {
        set: old_set,
        remove: old_remove,
    }
}
