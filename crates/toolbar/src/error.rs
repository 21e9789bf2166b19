use plate_core::EditError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolbarError {
    /// The editor was built without node kinds the toolbar relies on.
    #[error("required node kinds are not registered: {}", .0.join(", "))]
    MissingNode(Vec<String>),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error("image upload failed: {0}")]
    Upload(String),
}
