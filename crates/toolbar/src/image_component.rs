use std::time::{Duration, Instant};

use plate_core::{
    DecoratorNode, Dimension, EditError, Editor, ImageNode, Node, NodeSelection, Path, Selection,
};

use crate::config::ToolbarConfig;
use crate::state::Key;

/// Where keyboard focus sits relative to an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFocus {
    Caption,
    ControlButton,
    /// Focus went back to the surrounding editor.
    Parent,
}

/// Interaction state of one rendered image node.
#[derive(Debug, Clone)]
pub struct ImageComponent {
    path: Path,
    resizing: bool,
    resize_ended_at: Option<Instant>,
    cooldown: Duration,
    focus: Option<ImageFocus>,
}

impl ImageComponent {
    pub fn new(path: Path, config: &ToolbarConfig) -> Self {
        Self {
            path,
            resizing: false,
            resize_ended_at: None,
            cooldown: Duration::from_millis(config.resize_cooldown_ms),
            focus: None,
        }
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn set_path(&mut self, path: Path) {
        self.path = path;
    }

    pub fn focus(&self) -> Option<ImageFocus> {
        self.focus
    }

    pub fn image<'a>(&self, editor: &'a Editor) -> Option<&'a ImageNode> {
        editor.doc().node(&self.path).and_then(Node::as_image)
    }

    pub fn is_selected(&self, editor: &Editor) -> bool {
        editor
            .selection()
            .and_then(Selection::as_node)
            .is_some_and(|nodes| nodes.contains(&self.path))
    }

    fn is_sole_selection(&self, editor: &Editor) -> bool {
        editor
            .selection()
            .and_then(Selection::as_node)
            .is_some_and(|nodes| nodes.paths == [self.path.clone()])
    }

    /// True while a drag is running and for the cooldown after it ended.
    pub fn is_resizing(&self, now: Instant) -> bool {
        if !self.resizing {
            return false;
        }
        match self.resize_ended_at {
            Some(ended) => now.saturating_duration_since(ended) < self.cooldown,
            None => true,
        }
    }

    /// Returns true when the click was consumed.
    pub fn on_click(&mut self, editor: &mut Editor, shift: bool, now: Instant) -> bool {
        if self.is_resizing(now) {
            return true;
        }
        self.resizing = false;

        let selection = if shift {
            let mut paths = editor
                .selection()
                .and_then(Selection::as_node)
                .map(|nodes| nodes.paths.clone())
                .unwrap_or_default();
            if let Some(ix) = paths.iter().position(|p| *p == self.path) {
                paths.remove(ix);
            } else {
                paths.push(self.path.clone());
            }
            (!paths.is_empty()).then_some(Selection::Node(NodeSelection { paths }))
        } else {
            Some(Selection::node(self.path.clone()))
        };
        editor.set_selection(selection);
        true
    }

    pub fn on_resize_start(&mut self) {
        self.resizing = true;
        self.resize_ended_at = None;
    }

    /// Writes the new size in one update. The resize flag stays up for the
    /// cooldown so the click ending the drag is swallowed.
    pub fn on_resize_end(
        &mut self,
        editor: &mut Editor,
        width: u32,
        height: u32,
        now: Instant,
    ) -> Result<(), EditError> {
        self.resize_ended_at = Some(now);
        self.edit_image(editor, "image.resize", |image| {
            image.set_size(Dimension::Px(width), Dimension::Px(height))
        })
    }

    pub fn show_caption(&mut self, editor: &mut Editor) -> Result<(), EditError> {
        self.edit_image(editor, "image.show_caption", |image| image.show_caption = true)
    }

    fn edit_image(
        &self,
        editor: &mut Editor,
        source: &str,
        f: impl FnOnce(&mut ImageNode),
    ) -> Result<(), EditError> {
        let Some(mut image) = self.image(editor).cloned() else {
            return Err(EditError::InvalidPath(format!("no image at {:?}", self.path)));
        };
        f(&mut image);
        let path = self.path.clone();
        editor.update(source, |scope| {
            scope.set_decorator(path, DecoratorNode::Image(image))
        })
    }

    /// Returns true when the key was handled and its default should be
    /// prevented.
    pub fn on_key(&mut self, editor: &mut Editor, key: Key) -> Result<bool, EditError> {
        match key {
            Key::Enter => Ok(self.on_enter(editor)),
            Key::Escape => Ok(self.on_escape(editor)),
            Key::Delete | Key::Backspace => self.on_delete(editor),
            Key::Other => Ok(false),
        }
    }

    fn on_enter(&mut self, editor: &mut Editor) -> bool {
        if !self.is_sole_selection(editor) {
            return false;
        }
        let caption_open = self
            .image(editor)
            .is_some_and(|image| image.captions_enabled && image.show_caption);
        if caption_open {
            editor.set_selection(None);
            self.focus = Some(ImageFocus::Caption);
            return true;
        }
        if self.focus != Some(ImageFocus::ControlButton) {
            self.focus = Some(ImageFocus::ControlButton);
            return true;
        }
        false
    }

    fn on_escape(&mut self, editor: &mut Editor) -> bool {
        if !matches!(
            self.focus,
            Some(ImageFocus::Caption | ImageFocus::ControlButton)
        ) {
            return false;
        }
        editor.set_selection(Some(Selection::node(self.path.clone())));
        self.focus = Some(ImageFocus::Parent);
        true
    }

    fn on_delete(&mut self, editor: &mut Editor) -> Result<bool, EditError> {
        if !self.is_selected(editor) {
            return Ok(false);
        }
        let path = self.path.clone();
        editor.update("image.delete", |scope| scope.remove_node(path))?;
        self.focus = None;
        Ok(true)
    }
}
