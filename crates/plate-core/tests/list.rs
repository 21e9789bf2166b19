use plate_core::{Document, Editor, Node, NodeRegistry, Point, Selection};

fn editor(doc: Document, selection: Selection) -> Editor {
    Editor::new(doc, Some(selection), NodeRegistry::richtext())
}

fn bullet(items: &[&str]) -> Node {
    Node::list(
        "bullet",
        items
            .iter()
            .map(|text| Node::list_item(vec![Node::text(*text)]))
            .collect(),
    )
}

#[test]
fn insert_then_remove_list_restores_paragraphs() {
    let original = vec![Node::paragraph("one"), Node::paragraph("two")];
    let mut editor = editor(
        Document::new(original.clone()),
        Selection::range(Point::new(vec![0, 0], 0), Point::new(vec![1, 0], 3)),
    );

    editor
        .update("test:list", |scope| scope.insert_list("bullet"))
        .unwrap();
    assert_eq!(editor.doc().children, vec![bullet(&["one", "two"])]);
    assert_eq!(
        editor.selection(),
        Some(&Selection::range(
            Point::new(vec![0, 0, 0], 0),
            Point::new(vec![0, 1, 0], 3)
        ))
    );

    editor.update("test:list", |scope| scope.remove_list()).unwrap();
    assert_eq!(editor.doc().children, original);
    assert_eq!(
        editor.selection(),
        Some(&Selection::range(
            Point::new(vec![0, 0], 0),
            Point::new(vec![1, 0], 3)
        ))
    );
}

#[test]
fn removing_one_item_splits_the_list() {
    let mut editor = editor(
        Document::new(vec![bullet(&["a", "b", "c"])]),
        Selection::caret(Point::new(vec![0, 1, 0], 1)),
    );

    editor.update("test:list", |scope| scope.remove_list()).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![bullet(&["a"]), Node::paragraph("b"), bullet(&["c"])]
    );
    assert_eq!(
        editor.selection(),
        Some(&Selection::caret(Point::new(vec![1, 0], 1)))
    );
}

#[test]
fn switching_list_type_rewrites_touched_items() {
    let mut editor = editor(
        Document::new(vec![bullet(&["a", "b"])]),
        Selection::range(Point::new(vec![0, 0, 0], 0), Point::new(vec![0, 1, 0], 1)),
    );

    editor
        .update("test:list", |scope| scope.insert_list("number"))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::list(
            "number",
            vec![
                Node::list_item(vec![Node::text("a")]),
                Node::list_item(vec![Node::text("b")]),
            ]
        )]
    );
}

#[test]
fn heading_over_list_items_leaves_the_list() {
    let mut editor = editor(
        Document::new(vec![bullet(&["a", "b"])]),
        Selection::caret(Point::new(vec![0, 0, 0], 0)),
    );

    editor
        .update("test:heading", |scope| {
            scope.wrap_selection(|| plate_core::ElementNode::heading(1, Vec::new()))
        })
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::heading(1, "a"), bullet(&["b"])]
    );
}

#[test]
fn empty_lists_are_removed() {
    let editor = editor(
        Document::new(vec![Node::list("bullet", Vec::new()), Node::paragraph("x")]),
        Selection::caret(Point::new(vec![1, 0], 0)),
    );
    assert_eq!(editor.doc().children, vec![Node::paragraph("x")]);
    assert_eq!(
        editor.selection(),
        Some(&Selection::caret(Point::new(vec![0, 0], 0)))
    );
}
