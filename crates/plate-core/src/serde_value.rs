use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Document;

/// Schema tag written into every snapshot.
pub const DOCUMENT_SCHEMA: &str = "plate-toolbar";
/// Newest snapshot version this build reads and the one it writes.
pub const DOCUMENT_VERSION: u32 = 1;

fn default_schema() -> String {
    DOCUMENT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

#[derive(Debug, Error)]
pub enum ValueError {
    #[error("invalid document json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected document schema `{0}`, expected `{expected}`", expected = DOCUMENT_SCHEMA)]
    Schema(String),
    #[error("unsupported document version {0}, this build reads 1..={max}", max = DOCUMENT_VERSION)]
    Version(u32),
}

/// Versioned document snapshot.
///
/// Missing `schema` and `version` fields take the current values, so a bare
/// `{"document": ...}` loads as a current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: Document,
}

impl DocumentValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            document,
        }
    }

    /// Rejects snapshots written for another schema or by a newer build.
    pub fn check(&self) -> Result<(), ValueError> {
        if self.schema != DOCUMENT_SCHEMA {
            return Err(ValueError::Schema(self.schema.clone()));
        }
        if self.version == 0 || self.version > DOCUMENT_VERSION {
            return Err(ValueError::Version(self.version));
        }
        Ok(())
    }

    pub fn into_document(self) -> Result<Document, ValueError> {
        self.check()?;
        Ok(self.document)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ValueError> {
        let value: Self = serde_json::from_str(s)?;
        value.check()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Node;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_document_loads_as_current() {
        let value = DocumentValue::from_json_str(r#"{"document": {"children": []}}"#).unwrap();
        assert_eq!(value.schema, DOCUMENT_SCHEMA);
        assert_eq!(value.version, DOCUMENT_VERSION);
    }

    #[test]
    fn written_snapshot_reads_back() {
        let value = DocumentValue::from_document(Document::new(vec![Node::paragraph("hi")]));
        let json = value.to_json_pretty().unwrap();
        assert_eq!(DocumentValue::from_json_str(&json).unwrap(), value);
    }

    #[test]
    fn foreign_schema_is_rejected() {
        let err = DocumentValue::from_json_str(r#"{"schema": "lexical", "document": {}}"#)
            .unwrap_err();
        assert!(matches!(err, ValueError::Schema(schema) if schema == "lexical"));
    }

    #[test]
    fn newer_version_is_rejected() {
        let value = DocumentValue {
            version: DOCUMENT_VERSION + 1,
            ..DocumentValue::from_document(Document::default())
        };
        assert!(matches!(value.into_document(), Err(ValueError::Version(2))));
    }
}
