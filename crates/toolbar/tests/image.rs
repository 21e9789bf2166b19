use std::time::{Duration, Instant};

use plate_core::{
    Dimension, Document, ElementNode, Editor, ImageNode, ImagePayload, Node, NodeRegistry, Point,
    Selection,
};
use plate_toolbar::{
    DialogMode, ImageCache, ImageComponent, ImageFile, ImageFocus, ImageLoader, InsertImageDialog,
    Key, LoadState, ToolbarAction, ToolbarConfig, ToolbarError,
};
use pretty_assertions::assert_eq;

const IMAGE: [usize; 2] = [0, 1];

fn image_editor() -> Editor {
    let image = ImageNode::new(ImagePayload::new("cat.png", "a cat"));
    Editor::new(
        Document::new(vec![Node::Element(ElementNode::paragraph(vec![
            Node::text("a"),
            Node::image(image),
            Node::text("b"),
        ]))]),
        Some(Selection::caret(Point::new(vec![0, 0], 0))),
        NodeRegistry::richtext(),
    )
}

fn component() -> ImageComponent {
    ImageComponent::new(IMAGE.to_vec(), &ToolbarConfig::default().with_defaults())
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn click_selects_and_shift_click_toggles() {
    let mut editor = image_editor();
    let mut image = component();
    let now = Instant::now();

    assert!(image.on_click(&mut editor, false, now));
    assert_eq!(editor.selection(), Some(&Selection::node(IMAGE.to_vec())));
    assert!(image.is_selected(&editor));

    image.on_click(&mut editor, true, now);
    assert_eq!(editor.selection(), None);
    assert!(!image.is_selected(&editor));
}

#[test]
fn resize_writes_the_size_and_swallows_clicks_during_cooldown() {
    let mut editor = image_editor();
    let mut image = component();
    let start = Instant::now();

    image.on_resize_start();
    assert!(image.is_resizing(start));
    image.on_resize_end(&mut editor, 120, 80, start).unwrap();

    let node = image.image(&editor).unwrap();
    assert_eq!((node.width, node.height), (Dimension::Px(120), Dimension::Px(80)));
    assert!(editor.can_undo());

    let before = editor.selection().cloned();
    assert!(image.on_click(&mut editor, false, start + ms(50)));
    assert_eq!(editor.selection().cloned(), before);

    assert!(!image.is_resizing(start + ms(250)));
    image.on_click(&mut editor, false, start + ms(250));
    assert_eq!(editor.selection(), Some(&Selection::node(IMAGE.to_vec())));
}

#[test]
fn enter_moves_into_a_shown_caption_and_escape_comes_back() {
    let mut editor = image_editor();
    let mut image = component();
    image.show_caption(&mut editor).unwrap();
    editor.set_selection(Some(Selection::node(IMAGE.to_vec())));

    assert!(image.on_key(&mut editor, Key::Enter).unwrap());
    assert_eq!(image.focus(), Some(ImageFocus::Caption));
    assert_eq!(editor.selection(), None);

    assert!(image.on_key(&mut editor, Key::Escape).unwrap());
    assert_eq!(image.focus(), Some(ImageFocus::Parent));
    assert_eq!(editor.selection(), Some(&Selection::node(IMAGE.to_vec())));
}

#[test]
fn enter_without_caption_focuses_the_control_button() {
    let mut editor = image_editor();
    let mut image = component();

    assert!(!image.on_key(&mut editor, Key::Enter).unwrap());
    assert_eq!(image.focus(), None);

    editor.set_selection(Some(Selection::node(IMAGE.to_vec())));
    assert!(image.on_key(&mut editor, Key::Enter).unwrap());
    assert_eq!(image.focus(), Some(ImageFocus::ControlButton));
    assert!(!image.on_key(&mut editor, Key::Enter).unwrap());
    assert_eq!(editor.selection(), Some(&Selection::node(IMAGE.to_vec())));
}

#[test]
fn escape_without_inner_focus_is_ignored() {
    let mut editor = image_editor();
    let mut image = component();
    assert!(!image.on_key(&mut editor, Key::Escape).unwrap());
    assert!(!image.on_key(&mut editor, Key::Other).unwrap());
}

#[test]
fn delete_removes_only_a_selected_image() {
    let mut editor = image_editor();
    let mut image = component();

    assert!(!image.on_key(&mut editor, Key::Delete).unwrap());
    assert!(image.image(&editor).is_some());

    editor.set_selection(Some(Selection::node(IMAGE.to_vec())));
    assert!(image.on_key(&mut editor, Key::Backspace).unwrap());
    assert_eq!(editor.doc().children, vec![Node::paragraph("ab")]);
    assert_eq!(editor.selection(), None);
}

#[test]
fn loads_suspend_until_signalled_once() {
    let mut loader = ImageLoader::new(ImageCache::unbounded(), None);
    let now = Instant::now();

    assert_eq!(loader.request("cat.png", now), LoadState::Suspended);
    assert!(loader.is_pending("cat.png"));
    assert_eq!(loader.request("cat.png", now + ms(60_000)), LoadState::Suspended);

    assert!(loader.signal_loaded("cat.png"));
    assert!(!loader.signal_loaded("cat.png"));
    assert_eq!(loader.request("cat.png", now), LoadState::Ready);
    assert_eq!(loader.cache().len(), 1);
}

#[test]
fn signal_without_request_is_dropped() {
    let mut loader = ImageLoader::new(ImageCache::unbounded(), None);
    assert!(!loader.signal_loaded("dog.png"));
    assert!(loader.cache().is_empty());
    assert_eq!(loader.request("dog.png", Instant::now()), LoadState::Suspended);
}

#[test]
fn stale_loads_time_out_when_configured() {
    let config = ToolbarConfig {
        image_load_timeout_ms: Some(100),
        ..ToolbarConfig::default()
    }
    .with_defaults();
    let mut loader = ImageLoader::from_config(&config);
    let start = Instant::now();

    assert_eq!(loader.request("slow.png", start), LoadState::Suspended);
    assert_eq!(loader.request("slow.png", start + ms(50)), LoadState::Suspended);
    assert_eq!(loader.request("slow.png", start + ms(100)), LoadState::TimedOut);
    assert!(!loader.is_pending("slow.png"));
    assert!(!loader.signal_loaded("slow.png"));

    assert_eq!(loader.request("slow.png", start + ms(120)), LoadState::Suspended);
}

#[test]
fn bounded_cache_forgets_old_sources() {
    let mut loader = ImageLoader::new(ImageCache::bounded(1), None);
    let now = Instant::now();
    for src in ["a.png", "b.png"] {
        loader.request(src, now);
        loader.signal_loaded(src);
    }
    assert_eq!(loader.request("b.png", now), LoadState::Ready);
    assert_eq!(loader.request("a.png", now), LoadState::Suspended);
}

#[test]
fn url_dialog_yields_a_payload() {
    let mut dialog = InsertImageDialog::new();
    assert!(!dialog.can_confirm());

    dialog.choose_mode(DialogMode::Url);
    assert!(!dialog.can_confirm());
    assert_eq!(dialog.confirm(), None);

    dialog.set_url("https://img.dev/cat.png");
    dialog.set_alt_text("a cat");
    assert!(dialog.can_confirm());

    let payload = dialog.confirm().unwrap();
    assert_eq!(payload, ImagePayload::new("https://img.dev/cat.png", "a cat"));
    assert_eq!(dialog.mode(), None);
    assert_eq!(dialog.src(), "");
}

#[test]
fn file_dialog_encodes_a_data_url() {
    let mut dialog = InsertImageDialog::new();
    dialog.choose_mode(DialogMode::File);
    dialog.set_url("ignored");
    assert_eq!(dialog.src(), "");

    dialog.load_file(Ok(ImageFile {
        name: "dot.png".to_string(),
        mime: "image/png".to_string(),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
    }));
    assert_eq!(dialog.src(), "data:image/png;base64,iVBORw==");
    assert_eq!(dialog.confirm().map(|payload| payload.src).as_deref(), Some("data:image/png;base64,iVBORw=="));
}

#[test]
fn failed_upload_notifies_and_inserts_nothing() {
    let mut dialog = InsertImageDialog::new();
    dialog.choose_mode(DialogMode::File);
    dialog.load_file(Err(ToolbarError::Upload("file too large".to_string())));

    assert!(!dialog.can_confirm());
    assert_eq!(dialog.confirm(), None);
    let notification = dialog.take_notification().unwrap();
    assert_eq!(notification.message, "image upload failed: file too large");
    assert_eq!(dialog.take_notification(), None);
}

#[test]
fn confirmed_payload_inserts_through_the_toolbar() {
    let editor = Editor::new(
        Document::new(vec![Node::paragraph("ab")]),
        Some(Selection::caret(Point::new(vec![0, 0], 2))),
        NodeRegistry::richtext(),
    );
    let mut toolbar = plate_toolbar::Toolbar::new(editor, ToolbarConfig::default()).unwrap();

    let mut dialog = InsertImageDialog::new();
    dialog.choose_mode(DialogMode::Url);
    dialog.set_url("cat.png");
    toolbar.submit(ToolbarAction::InsertImage(dialog.confirm().unwrap()));
    toolbar.run_pending().unwrap();

    let image = toolbar.editor().doc().node(&IMAGE).and_then(Node::as_image).unwrap();
    assert_eq!(image.src, "cat.png");
    assert_eq!(image.max_width, 500);
}
