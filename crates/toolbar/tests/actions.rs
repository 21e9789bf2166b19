use plate_core::{
    Document, Editor, FormatFlag, ImagePayload, Node, NodeRegistry, Point, Selection, kinds,
};
use plate_toolbar::{
    Alignment, BlockTarget, BlockType, DispatchOutcome, LinkEditorMode, ListKind, Toolbar,
    ToolbarAction, ToolbarConfig, ToolbarError,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn toolbar(children: Vec<Node>, selection: Selection) -> Toolbar {
    let editor = Editor::new(Document::new(children), Some(selection), NodeRegistry::richtext());
    Toolbar::new(editor, ToolbarConfig::default()).unwrap()
}

fn select(anchor: (&[usize], usize), focus: (&[usize], usize)) -> Selection {
    Selection::range(
        Point::new(anchor.0.to_vec(), anchor.1),
        Point::new(focus.0.to_vec(), focus.1),
    )
}

fn leaf_font_size(toolbar: &Toolbar, path: &[usize]) -> Option<u32> {
    toolbar
        .editor()
        .doc()
        .node(path)
        .and_then(Node::as_text)
        .and_then(|text| text.marks.font_size)
}

#[rstest]
#[case::bullet_list(
    vec![Node::paragraph("one"), Node::paragraph("two")],
    select((&[0, 0], 0), (&[1, 0], 3)),
    ToolbarAction::ToggleList(ListKind::Bullet)
)]
#[case::link(
    vec![Node::paragraph("hello world")],
    select((&[0, 0], 6), (&[0, 0], 11)),
    ToolbarAction::ToggleLink
)]
#[case::bold(
    vec![Node::paragraph("abcde")],
    select((&[0, 0], 1), (&[0, 0], 3)),
    ToolbarAction::ToggleFormat(FormatFlag::Bold)
)]
fn toggling_twice_restores_the_document(
    #[case] children: Vec<Node>,
    #[case] selection: Selection,
    #[case] action: ToolbarAction,
) {
    let mut toolbar = toolbar(children.clone(), selection);

    let first = toolbar.dispatch(&action).unwrap();
    assert!(first.applied);
    assert_ne!(toolbar.editor().doc().children, children);

    let second = toolbar.dispatch(&action).unwrap();
    assert!(second.applied);
    assert_eq!(toolbar.editor().doc().children, children);
}

#[test]
fn bold_at_a_caret_toggles_back_to_the_same_caret() {
    let caret = Selection::caret(Point::new(vec![0, 0], 2));
    let mut toolbar = toolbar(vec![Node::paragraph("hello")], caret.clone());

    toolbar
        .dispatch(&ToolbarAction::ToggleFormat(FormatFlag::Bold))
        .unwrap();
    assert!(toolbar.state().has_format(FormatFlag::Bold));

    toolbar
        .dispatch(&ToolbarAction::ToggleFormat(FormatFlag::Bold))
        .unwrap();
    assert_eq!(
        toolbar.editor().doc().children,
        vec![Node::paragraph("hello")]
    );
    assert_eq!(toolbar.editor().selection(), Some(&caret));
    assert!(!toolbar.state().has_format(FormatFlag::Bold));
}

#[test]
fn link_scenario_tracks_is_link() {
    let mut toolbar = toolbar(
        vec![Node::paragraph("hello world")],
        select((&[0, 0], 6), (&[0, 0], 11)),
    );
    assert!(!toolbar.state().is_link);

    let outcome = toolbar.dispatch(&ToolbarAction::ToggleLink).unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome {
            applied: true,
            open_link_editor: true,
        }
    );
    assert!(toolbar.state().is_link);
    assert_eq!(toolbar.link_editor().mode(), LinkEditorMode::Editing);
    assert!(toolbar.link_editor_mut().take_focus_request());

    let link = toolbar.editor().doc().node(&[0, 1]).and_then(Node::as_element).unwrap();
    assert_eq!(link.kind, kinds::LINK);
    assert_eq!(link.url(), Some("https://"));

    toolbar.dispatch(&ToolbarAction::ToggleLink).unwrap();
    assert!(!toolbar.state().is_link);
}

#[test]
fn apply_link_retargets_an_existing_link() {
    let mut toolbar = toolbar(
        vec![Node::paragraph("hello world")],
        select((&[0, 0], 6), (&[0, 0], 11)),
    );
    toolbar.dispatch(&ToolbarAction::ToggleLink).unwrap();
    toolbar
        .dispatch(&ToolbarAction::ApplyLink("https://docs.rs".to_string()))
        .unwrap();

    let link = toolbar.editor().doc().node(&[0, 1]).and_then(Node::as_element).unwrap();
    assert_eq!(link.url(), Some("https://docs.rs"));
}

#[test]
fn font_size_steps_from_the_rendered_size() {
    let mut toolbar = toolbar(vec![Node::paragraph("hello")], select((&[0, 0], 0), (&[0, 0], 5)));

    toolbar.dispatch(&ToolbarAction::IncreaseFontSize(2)).unwrap();
    assert_eq!(leaf_font_size(&toolbar, &[0, 0]), Some(18));
    toolbar.dispatch(&ToolbarAction::IncreaseFontSize(2)).unwrap();
    assert_eq!(leaf_font_size(&toolbar, &[0, 0]), Some(20));
}

#[test]
fn heading_text_starts_from_the_scaled_size() {
    let mut toolbar = toolbar(vec![Node::heading(1, "title")], select((&[0, 0], 0), (&[0, 0], 5)));
    toolbar.dispatch(&ToolbarAction::DecreaseFontSize(2)).unwrap();
    assert_eq!(leaf_font_size(&toolbar, &[0, 0]), Some(30));
}

#[rstest]
#[case::floor(ToolbarAction::DecreaseFontSize(100), 8)]
#[case::ceiling(ToolbarAction::IncreaseFontSize(500), 96)]
fn font_size_is_clamped(#[case] action: ToolbarAction, #[case] expected: u32) {
    let mut toolbar = toolbar(vec![Node::paragraph("hello")], select((&[0, 0], 0), (&[0, 0], 5)));
    toolbar.dispatch(&action).unwrap();
    assert_eq!(leaf_font_size(&toolbar, &[0, 0]), Some(expected));
}

#[test]
fn set_block_is_a_no_op_for_the_current_type() {
    let mut toolbar = toolbar(vec![Node::heading(1, "title")], select((&[0, 0], 0), (&[0, 0], 2)));
    let revision = toolbar.editor().revision();

    let outcome = toolbar
        .dispatch(&ToolbarAction::SetBlock(BlockTarget::H1))
        .unwrap();
    assert!(!outcome.applied);
    assert_eq!(toolbar.editor().revision(), revision);
    assert!(!toolbar.editor().can_undo());
}

#[test]
fn set_block_rewraps_the_block() {
    let mut toolbar = toolbar(vec![Node::paragraph("title")], select((&[0, 0], 0), (&[0, 0], 2)));
    toolbar
        .dispatch(&ToolbarAction::SetBlock(BlockTarget::H2))
        .unwrap();
    assert_eq!(toolbar.editor().doc().children, vec![Node::heading(2, "title")]);
    assert_eq!(toolbar.state().block_type, BlockType::H2);

    toolbar
        .dispatch(&ToolbarAction::SetBlock(BlockTarget::Quote))
        .unwrap();
    assert_eq!(toolbar.editor().doc().children, vec![Node::quote("title")]);
}

#[test]
fn code_block_merges_touched_blocks_once() {
    let mut toolbar = toolbar(
        vec![Node::paragraph("one"), Node::paragraph("two")],
        select((&[0, 0], 0), (&[1, 0], 3)),
    );
    assert!(toolbar.dispatch(&ToolbarAction::ToggleCodeBlock).unwrap().applied);

    let doc = toolbar.editor().doc();
    assert_eq!(doc.children.len(), 1);
    assert!(doc.children[0].is_code_block());
    assert_eq!(toolbar.state().block_type, BlockType::Code);

    assert!(!toolbar.dispatch(&ToolbarAction::ToggleCodeBlock).unwrap().applied);
}

#[test]
fn align_sets_the_block_attribute() {
    let mut toolbar = toolbar(vec![Node::paragraph("abc")], select((&[0, 0], 0), (&[0, 0], 1)));
    toolbar
        .dispatch(&ToolbarAction::Align(Alignment::Center))
        .unwrap();
    let block = toolbar.editor().doc().node(&[0]).and_then(Node::as_element).unwrap();
    assert_eq!(block.attr_str("align"), Some("center"));
}

#[test]
fn font_family_is_written_to_the_selection() {
    let mut toolbar = toolbar(vec![Node::paragraph("abc")], select((&[0, 0], 0), (&[0, 0], 3)));
    toolbar
        .dispatch(&ToolbarAction::SetFontFamily(Some("Courier New".to_string())))
        .unwrap();
    assert_eq!(toolbar.state().font_family.as_deref(), Some("Courier New"));
}

#[test]
fn range_actions_ignore_other_selections() {
    let mut toolbar = toolbar(vec![Node::paragraph("abc")], select((&[0, 0], 0), (&[0, 0], 3)));
    toolbar.set_selection(None);

    for action in [
        ToolbarAction::ToggleFormat(FormatFlag::Bold),
        ToolbarAction::ToggleList(ListKind::Number),
        ToolbarAction::ToggleLink,
        ToolbarAction::IncreaseFontSize(2),
    ] {
        assert_eq!(toolbar.dispatch(&action).unwrap(), DispatchOutcome::default());
    }
    assert_eq!(toolbar.editor().doc().children, vec![Node::paragraph("abc")]);
}

#[test]
fn undo_and_redo_go_through_history() {
    let mut toolbar = toolbar(vec![Node::paragraph("abc")], select((&[0, 0], 0), (&[0, 0], 3)));
    toolbar
        .dispatch(&ToolbarAction::ToggleFormat(FormatFlag::Italic))
        .unwrap();
    assert!(toolbar.state().has_format(FormatFlag::Italic));

    assert!(toolbar.dispatch(&ToolbarAction::Undo).unwrap().applied);
    assert!(!toolbar.state().has_format(FormatFlag::Italic));

    assert!(toolbar.dispatch(&ToolbarAction::Redo).unwrap().applied);
    assert!(toolbar.state().has_format(FormatFlag::Italic));

    assert!(toolbar.dispatch(&ToolbarAction::Redo).unwrap() == DispatchOutcome::default());
}

#[test]
fn insert_image_applies_config_limits() {
    let editor = Editor::new(
        Document::new(vec![Node::paragraph("ab")]),
        Some(Selection::caret(Point::new(vec![0, 0], 1))),
        NodeRegistry::richtext(),
    );
    let config = ToolbarConfig {
        image_max_width: 320,
        captions_enabled: Some(false),
        ..ToolbarConfig::default()
    };
    let mut toolbar = Toolbar::new(editor, config).unwrap();

    let outcome = toolbar
        .dispatch(&ToolbarAction::InsertImage(ImagePayload::new("cat.png", "a cat")))
        .unwrap();
    assert!(outcome.applied);

    let image = toolbar
        .editor()
        .doc()
        .node(&[0, 1])
        .and_then(Node::as_image)
        .unwrap();
    assert_eq!(image.src, "cat.png");
    assert_eq!(image.alt_text, "a cat");
    assert_eq!(image.max_width, 320);
    assert!(!image.captions_enabled);
}

#[test]
fn queued_actions_run_in_order_against_fresh_state() {
    let original = vec![Node::paragraph("one"), Node::paragraph("two")];
    let mut toolbar = toolbar(original.clone(), select((&[0, 0], 0), (&[1, 0], 3)));

    toolbar.submit(ToolbarAction::ToggleList(ListKind::Bullet));
    toolbar.submit(ToolbarAction::ToggleList(ListKind::Bullet));
    toolbar.submit(ToolbarAction::SetBlock(BlockTarget::H1));
    assert_eq!(toolbar.pending(), 3);

    let outcomes = toolbar.run_pending().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|outcome| outcome.applied));
    assert_eq!(toolbar.pending(), 0);
    assert_eq!(
        toolbar.editor().doc().children,
        vec![Node::heading(1, "one"), Node::heading(1, "two")]
    );
}

#[test]
fn missing_node_kinds_fail_construction() {
    let err = Toolbar::new(Editor::with_core_nodes(), ToolbarConfig::default()).unwrap_err();
    let ToolbarError::MissingNode(missing) = &err else {
        panic!("unexpected error: {err}");
    };
    assert!(missing.contains(&kinds::IMAGE.to_string()));
    assert!(err.to_string().contains("image"));
}

#[test]
fn state_is_emitted_only_when_it_changes() {
    let mut toolbar = toolbar(vec![Node::paragraph("abcdef")], select((&[0, 0], 0), (&[0, 0], 2)));
    assert_eq!(toolbar.emissions(), 1);

    toolbar.set_selection(Some(select((&[0, 0], 1), (&[0, 0], 3))));
    assert_eq!(toolbar.emissions(), 1);

    toolbar
        .dispatch(&ToolbarAction::ToggleFormat(FormatFlag::Bold))
        .unwrap();
    assert_eq!(toolbar.emissions(), 2);

    let editor = toolbar.into_editor();
    assert!(editor.read(|read| read.has_format(FormatFlag::Bold)));
}
