use plate_core::{
    Document, ElementNode, Editor, FormatFlag, Node, NodeRegistry, Point, Selection, TextNode,
};
use plate_toolbar::{BlockType, SelectionStateTracker, ToolbarState, selected_link_url};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::Value;

fn editor(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document::new(children), Some(selection), NodeRegistry::richtext())
}

fn caret(path: &[usize], offset: usize) -> Selection {
    Selection::caret(Point::new(path.to_vec(), offset))
}

fn range(anchor: (&[usize], usize), focus: (&[usize], usize)) -> Selection {
    Selection::range(
        Point::new(anchor.0.to_vec(), anchor.1),
        Point::new(focus.0.to_vec(), focus.1),
    )
}

fn derive(editor: &Editor) -> ToolbarState {
    let mut tracker = SelectionStateTracker::new();
    editor.read(|read| tracker.derive(read))
}

fn linked_paragraph() -> Node {
    Node::Element(ElementNode::paragraph(vec![
        Node::text("hello "),
        Node::link("https://a.dev", vec![Node::text("world")]),
    ]))
}

fn item(text: &str) -> Node {
    Node::list_item(vec![Node::text(text)])
}

#[rstest]
#[case::paragraph(Node::paragraph("abc"), &[0, 0], BlockType::Paragraph)]
#[case::h1(Node::heading(1, "abc"), &[0, 0], BlockType::H1)]
#[case::h2(Node::heading(2, "abc"), &[0, 0], BlockType::H2)]
#[case::h3(Node::heading(3, "abc"), &[0, 0], BlockType::Unknown)]
#[case::h6(Node::heading(6, "abc"), &[0, 0], BlockType::Unknown)]
#[case::quote(Node::quote("abc"), &[0, 0], BlockType::Quote)]
#[case::code(Node::code_block("abc"), &[0, 0], BlockType::Code)]
#[case::bullet(Node::list("bullet", vec![item("abc")]), &[0, 0, 0], BlockType::Bullet)]
#[case::number(Node::list("number", vec![item("abc")]), &[0, 0, 0], BlockType::Number)]
fn block_type_follows_the_top_level_block(
    #[case] block: Node,
    #[case] leaf: &[usize],
    #[case] expected: BlockType,
) {
    let editor = editor(vec![block], caret(leaf, 1));
    let state = derive(&editor);
    assert_eq!(state.block_type, expected);
    assert_eq!(state.selected_block, Some(vec![0]));
}

#[test]
fn nested_list_reports_the_outer_list_type() {
    let nested = Node::list(
        "bullet",
        vec![
            item("outer"),
            Node::list_item(vec![Node::list("number", vec![item("inner")])]),
        ],
    );
    let editor = editor(vec![nested], caret(&[0, 1, 0, 0, 0], 2));
    assert_eq!(derive(&editor).block_type, BlockType::Bullet);
}

#[test]
fn formats_are_read_from_the_selection() {
    let mut bold = TextNode::new("abc");
    bold.marks.bold = true;
    bold.marks.italic = true;
    bold.marks.font_family = Some("Arial".to_string());
    let editor = editor(
        vec![Node::Element(ElementNode::paragraph(vec![Node::Text(bold)]))],
        range((&[0, 0], 0), (&[0, 0], 3)),
    );

    let state = derive(&editor);
    assert_eq!(
        state.active_formats.into_iter().collect::<Vec<_>>(),
        vec![FormatFlag::Bold, FormatFlag::Italic]
    );
    assert_eq!(state.font_family.as_deref(), Some("Arial"));
    assert!(!state.is_link);
    assert!(!state.is_rtl);
}

#[test]
fn rtl_comes_from_the_block_direction() {
    let block = ElementNode::paragraph(vec![Node::text("abc")]).with_attr("dir", Value::from("rtl"));
    let editor = editor(vec![Node::Element(block)], caret(&[0, 0], 0));
    assert!(derive(&editor).is_rtl);
}

#[test]
fn non_range_selection_keeps_only_the_block_type() {
    let mut editor = editor(
        vec![Node::heading(1, "title"), Node::paragraph("body")],
        range((&[0, 0], 0), (&[0, 0], 5)),
    );
    editor
        .update("test", |scope| scope.format_text(FormatFlag::Bold))
        .unwrap();

    let mut tracker = SelectionStateTracker::new();
    let before = editor.read(|read| tracker.derive(read));
    assert_eq!(before.block_type, BlockType::H1);
    assert!(before.has_format(FormatFlag::Bold));

    editor.set_selection(None);
    let after = editor.read(|read| tracker.derive(read));
    assert_eq!(
        after,
        ToolbarState {
            block_type: BlockType::H1,
            ..ToolbarState::default()
        }
    );
}

#[test]
fn fresh_tracker_starts_from_paragraph() {
    let editor = Editor::new(
        Document::new(vec![Node::heading(2, "x")]),
        None,
        NodeRegistry::richtext(),
    );
    assert_eq!(derive(&editor), ToolbarState::default());
}

#[test]
fn derivation_is_deterministic() {
    let editor = editor(vec![linked_paragraph()], range((&[0, 0], 1), (&[0, 1, 0], 3)));
    assert_eq!(derive(&editor), derive(&editor));
}

#[test]
fn refresh_emits_only_on_change() {
    let mut editor = editor(vec![Node::paragraph("abcdef")], caret(&[0, 0], 1));
    let mut tracker = SelectionStateTracker::new();

    assert!(editor.read(|read| tracker.refresh(read)).is_some());
    assert!(editor.read(|read| tracker.refresh(read)).is_none());

    editor.set_selection(Some(caret(&[0, 0], 4)));
    assert!(editor.read(|read| tracker.refresh(read)).is_none());

    editor.set_selection(Some(range((&[0, 0], 0), (&[0, 0], 6))));
    editor
        .update("test", |scope| scope.format_text(FormatFlag::Underline))
        .unwrap();
    let emitted = editor.read(|read| tracker.refresh(read)).unwrap();
    assert!(emitted.has_format(FormatFlag::Underline));
    assert_eq!(tracker.last_emitted(), Some(&emitted));
}

#[rstest]
#[case::inside_link(caret(&[0, 1, 0], 2), true)]
#[case::plain_text(caret(&[0, 0], 1), false)]
#[case::start_at_end_of_plain_text(range((&[0, 0], 6), (&[0, 1, 0], 3)), true)]
#[case::backward_from_link(range((&[0, 1, 0], 3), (&[0, 0], 6)), true)]
#[case::start_inside_plain_text(range((&[0, 0], 2), (&[0, 1, 0], 3)), false)]
fn link_detection_uses_the_selected_node(#[case] selection: Selection, #[case] is_link: bool) {
    let editor = editor(vec![linked_paragraph()], selection);
    assert_eq!(derive(&editor).is_link, is_link);
    let url = editor.read(|read| selected_link_url(read));
    assert_eq!(url.is_some(), is_link);
}
