use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use plate_core::{Editor, ListenerId, ReadTxn, Selection, kinds};

use crate::actions::{DefaultRenderedStyle, DispatchOutcome, RenderedStyle, ToolbarAction, dispatch};
use crate::config::ToolbarConfig;
use crate::derive::SelectionStateTracker;
use crate::error::ToolbarError;
use crate::floating_link::{FloatingLinkEditor, KeyOutcome, SurfaceProbe};
use crate::state::{Key, ToolbarState};

/// Node kinds the toolbar's actions create.
pub const REQUIRED_NODES: [&str; 7] = [
    kinds::HEADING,
    kinds::QUOTE,
    kinds::CODE_BLOCK,
    kinds::LIST,
    kinds::LIST_ITEM,
    kinds::LINK,
    kinds::IMAGE,
];

#[derive(Debug, Default)]
struct Shared {
    tracker: SelectionStateTracker,
    state: ToolbarState,
    emissions: usize,
}

impl Shared {
    fn refresh(&mut self, read: &ReadTxn<'_>) {
        if let Some(state) = self.tracker.refresh(read) {
            self.state = state;
            self.emissions += 1;
        }
    }
}

/// Owns an editor and keeps a `ToolbarState` in sync with it.
///
/// Actions are queued with [`Toolbar::submit`] and run in submission order,
/// one update each.
pub struct Toolbar {
    editor: Editor,
    config: ToolbarConfig,
    style: Box<dyn RenderedStyle>,
    shared: Rc<RefCell<Shared>>,
    listener: ListenerId,
    queue: VecDeque<ToolbarAction>,
    link_editor: FloatingLinkEditor,
}

impl Toolbar {
    pub fn new(mut editor: Editor, config: ToolbarConfig) -> Result<Self, ToolbarError> {
        let missing = editor.registry().missing(&REQUIRED_NODES);
        if !missing.is_empty() {
            return Err(ToolbarError::MissingNode(
                missing.into_iter().map(str::to_string).collect(),
            ));
        }

        let config = config.with_defaults();
        let shared = Rc::new(RefCell::new(Shared::default()));
        editor.read(|read| shared.borrow_mut().refresh(read));

        let listener_shared = shared.clone();
        let listener = editor.subscribe(move |_, read| listener_shared.borrow_mut().refresh(read));

        Ok(Self {
            style: Box::new(DefaultRenderedStyle::new(&config)),
            link_editor: FloatingLinkEditor::new(&config),
            editor,
            config,
            shared,
            listener,
            queue: VecDeque::new(),
        })
    }

    pub fn with_style(mut self, style: impl RenderedStyle + 'static) -> Self {
        self.style = Box::new(style);
        self
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    pub fn config(&self) -> &ToolbarConfig {
        &self.config
    }

    pub fn state(&self) -> ToolbarState {
        self.shared.borrow().state.clone()
    }

    /// Number of distinct states emitted so far, the initial one included.
    pub fn emissions(&self) -> usize {
        self.shared.borrow().emissions
    }

    pub fn link_editor(&self) -> &FloatingLinkEditor {
        &self.link_editor
    }

    pub fn link_editor_mut(&mut self) -> &mut FloatingLinkEditor {
        &mut self.link_editor
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.editor.set_selection(selection);
    }

    pub fn submit(&mut self, action: ToolbarAction) {
        self.queue.push_back(action);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drains the queue. Stops at the first failing action and leaves the
    /// rest queued.
    pub fn run_pending(&mut self) -> Result<Vec<DispatchOutcome>, ToolbarError> {
        let mut outcomes = Vec::with_capacity(self.queue.len());
        while let Some(action) = self.queue.pop_front() {
            match self.dispatch(&action) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    tracing::warn!(%err, source = action.source(), remaining = self.queue.len(), "action rolled back");
                    return Err(err);
                }
            }
        }
        Ok(outcomes)
    }

    /// Runs one action right away against the current state.
    pub fn dispatch(&mut self, action: &ToolbarAction) -> Result<DispatchOutcome, ToolbarError> {
        let state = self.state();
        let outcome = dispatch(
            &mut self.editor,
            &state,
            action,
            &self.config,
            self.style.as_ref(),
        )?;
        if outcome.open_link_editor {
            self.link_editor.begin_editing();
        }
        Ok(outcome)
    }

    /// Routes a key press in the link editor's input. An accepted URL is
    /// applied to the selection the editor was opened for.
    pub fn handle_link_key(&mut self, key: Key) -> Result<KeyOutcome, ToolbarError> {
        let outcome = self.link_editor.on_key(key);
        if let Some(action) = &outcome.action {
            if !self.editor.selection().is_some_and(Selection::is_range) {
                let last = self.link_editor.state().last_selection.clone();
                self.editor.set_selection(last);
            }
            self.dispatch(action)?;
        }
        Ok(outcome)
    }

    /// Repositions the link editor after a selection or layout change.
    pub fn sync_link_editor<S: SurfaceProbe + ?Sized>(&mut self, surface: &S) {
        let read = self.editor.read_txn();
        self.link_editor.on_selection_update(&read, surface);
    }

    pub fn into_editor(mut self) -> Editor {
        self.editor.unsubscribe(self.listener);
        self.editor
    }
}

impl std::fmt::Debug for Toolbar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolbar")
            .field("state", &self.shared.borrow().state)
            .field("pending", &self.queue.len())
            .field("link_editor", &self.link_editor)
            .finish_non_exhaustive()
    }
}
