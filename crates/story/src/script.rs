//! JSON scripts replayed against a headless toolbar.

use anyhow::{Context as _, Result, anyhow};
use plate_core::{DocumentValue, Editor, NodeRegistry, Point, Selection};
use plate_toolbar::{
    DispatchOutcome, TOOLBAR_ITEMS, Toolbar, ToolbarAction, ToolbarConfig, ToolbarState,
    find_item,
};
use serde::{Deserialize, Serialize};

pub const DEMO_SCRIPT: &str = include_str!("../scripts/demo.json");

#[derive(Debug, Deserialize)]
pub struct Script {
    /// Starting document. An empty paragraph when missing.
    #[serde(default)]
    pub document: Option<DocumentValue>,
    #[serde(default)]
    pub selection: Option<Selection>,
    #[serde(default)]
    pub config: ToolbarConfig,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Select { select: Selection },
    /// Presses a button from `TOOLBAR_ITEMS` by id.
    Item { item: String },
    Action(ToolbarAction),
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub document: DocumentValue,
    pub state: ToolbarState,
    pub active_items: Vec<&'static str>,
    pub applied: usize,
}

impl Script {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("failed to parse script")
    }

    pub fn run(self) -> Result<Report> {
        let editor = match self.document {
            Some(value) => {
                let selection = self
                    .selection
                    .or_else(|| Some(Selection::caret(Point::new(vec![0, 0], 0))));
                let document = value.into_document().context("invalid script document")?;
                Editor::new(document, selection, NodeRegistry::richtext())
            }
            None => Editor::with_richtext_nodes(),
        };
        let mut toolbar = Toolbar::new(editor, self.config)?;

        let mut outcomes = Vec::new();
        for (ix, step) in self.steps.into_iter().enumerate() {
            match step {
                Step::Select { select } => {
                    // Queued actions run against the selection they were issued for.
                    outcomes.extend(run_queue(&mut toolbar)?);
                    toolbar.set_selection(Some(select));
                }
                Step::Item { item } => {
                    let button = find_item(&item)
                        .ok_or_else(|| anyhow!("unknown toolbar item `{item}`"))?;
                    match button.to_action(toolbar.config()) {
                        Some(action) => toolbar.submit(action),
                        None => tracing::info!(item, "button opens a dialog, skipped"),
                    }
                }
                Step::Action(action) => toolbar.submit(action),
            }
            tracing::debug!(step = ix, pending = toolbar.pending(), "step read");
        }
        outcomes.extend(run_queue(&mut toolbar)?);

        let applied = outcomes.iter().filter(|outcome| outcome.applied).count();
        tracing::info!(actions = outcomes.len(), applied, "script finished");

        let state = toolbar.state();
        let active_items = TOOLBAR_ITEMS
            .iter()
            .filter(|item| item.is_active(&state))
            .map(|item| item.id)
            .collect();
        let document = DocumentValue::from_document(toolbar.editor().doc().clone());

        Ok(Report {
            document,
            state,
            active_items,
            applied,
        })
    }
}

fn run_queue(toolbar: &mut Toolbar) -> Result<Vec<DispatchOutcome>> {
    toolbar.run_pending().context("toolbar action failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use plate_core::{FormatFlag, Node};
    use plate_toolbar::BlockType;
    use pretty_assertions::assert_eq;

    #[test]
    fn demo_script_runs() {
        let report = Script::from_json_str(DEMO_SCRIPT).unwrap().run().unwrap();
        let doc = &report.document.document;

        assert!(doc.children[0].is_heading());
        let title = doc.node(&[0, 0]).and_then(Node::as_text).unwrap();
        assert!(title.marks.has(FormatFlag::Bold));
        assert_eq!(title.marks.font_size, Some(36));

        assert!(doc.children[1].is_list());
        assert!(doc.node(&[1, 0, 0]).is_some_and(Node::is_link));
        assert_eq!(report.state.block_type, BlockType::Bullet);
        assert!(report.state.is_link);
        assert_eq!(report.active_items, vec!["bullet", "link"]);
    }

    #[test]
    fn steps_are_told_apart_by_their_keys() {
        let steps: Vec<Step> = serde_json::from_str(
            r#"[
                {"item": "bold"},
                {"action": "undo"},
                {"select": {"type": "node", "paths": [[0, 1]]}}
            ]"#,
        )
        .unwrap();
        assert!(matches!(&steps[0], Step::Item { item } if item == "bold"));
        assert!(matches!(steps[1], Step::Action(ToolbarAction::Undo)));
        assert!(matches!(steps[2], Step::Select { .. }));
    }

    #[test]
    fn unknown_item_is_an_error() {
        let script = Script::from_json_str(r#"{"steps": [{"item": "nope"}]}"#).unwrap();
        let err = script.run().unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn document_from_another_schema_is_refused() {
        let script = Script::from_json_str(
            r#"{"document": {"schema": "lexical", "version": 1, "document": {"children": []}}}"#,
        )
        .unwrap();
        let err = script.run().unwrap_err();
        assert!(format!("{err:#}").contains("lexical"));
    }
}
