use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::{Document, Editor, Node, Point, Selection};
use crate::registry::NodeRegistry;

pub const DEFAULT_MAX_WIDTH: u32 = 500;
const IMAGE_VERSION: u32 = 1;

/// Width or height of an image. `Inherit` follows the natural size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dimension {
    Px(u32),
    #[default]
    Inherit,
}

impl Dimension {
    pub fn px(self) -> Option<u32> {
        match self {
            Dimension::Px(px) => Some(px),
            Dimension::Inherit => None,
        }
    }
}

impl Serialize for Dimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Dimension::Px(px) => serializer.serialize_u32(*px),
            Dimension::Inherit => serializer.serialize_str("inherit"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DimensionRepr {
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let dimension = match DimensionRepr::deserialize(deserializer)? {
            // Older snapshots store an inherited size as 0.
            DimensionRepr::Number(n) if n <= 0.0 => Dimension::Inherit,
            DimensionRepr::Number(n) => Dimension::Px(n.round() as u32),
            DimensionRepr::Text(s) if s == "inherit" || s.is_empty() => Dimension::Inherit,
            DimensionRepr::Text(s) => match s.trim_end_matches("px").parse::<u32>() {
                Ok(0) => Dimension::Inherit,
                Ok(px) => Dimension::Px(px),
                Err(_) => {
                    return Err(serde::de::Error::custom(format!("invalid dimension `{s}`")));
                }
            },
        };
        Ok(dimension)
    }
}

/// Data needed to create an image node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub src: String,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub width: Dimension,
    #[serde(default)]
    pub height: Dimension,
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub show_caption: bool,
    #[serde(default = "default_true")]
    pub captions_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<Document>,
}

impl ImagePayload {
    pub fn new(src: impl Into<String>, alt_text: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            alt_text: alt_text.into(),
            width: Dimension::Inherit,
            height: Dimension::Inherit,
            max_width: None,
            show_caption: false,
            captions_enabled: true,
            caption: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_version() -> u32 {
    IMAGE_VERSION
}

/// Image decorator. The caption is an independent document that is only
/// materialized when first needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "SerializedImage", from = "SerializedImage")]
pub struct ImageNode {
    pub src: String,
    pub alt_text: String,
    pub width: Dimension,
    pub height: Dimension,
    pub max_width: u32,
    pub show_caption: bool,
    pub captions_enabled: bool,
    caption: Option<Document>,
}

impl ImageNode {
    pub fn new(payload: ImagePayload) -> Self {
        Self {
            src: payload.src,
            alt_text: payload.alt_text,
            width: payload.width,
            height: payload.height,
            max_width: payload.max_width.unwrap_or(DEFAULT_MAX_WIDTH),
            show_caption: payload.show_caption,
            captions_enabled: payload.captions_enabled,
            caption: payload.caption.filter(|doc| !doc.is_empty()),
        }
    }

    pub fn caption(&self) -> Option<&Document> {
        self.caption.as_ref()
    }

    pub fn caption_mut(&mut self) -> &mut Document {
        self.caption
            .get_or_insert_with(|| Document::new(vec![Node::paragraph("")]))
    }

    pub fn set_caption(&mut self, caption: Document) {
        self.caption = Some(caption);
    }

    /// An editor over a copy of the caption. Write the result back with
    /// `set_caption`.
    pub fn caption_editor(&self) -> Editor {
        let doc = self
            .caption
            .clone()
            .unwrap_or_else(|| Document::new(vec![Node::paragraph("")]));
        let selection = Selection::caret(Point::new(vec![0, 0], 0));
        Editor::new(doc, Some(selection), NodeRegistry::richtext())
    }

    pub fn set_size(&mut self, width: Dimension, height: Dimension) {
        self.width = width;
        self.height = height;
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerializedImage {
    #[serde(rename = "type", default = "image_type")]
    ty: String,
    #[serde(default = "default_version")]
    version: u32,
    src: String,
    #[serde(default)]
    alt_text: String,
    #[serde(default)]
    width: Dimension,
    #[serde(default)]
    height: Dimension,
    #[serde(default = "default_max_width")]
    max_width: u32,
    #[serde(default)]
    show_caption: bool,
    #[serde(default = "default_true")]
    captions_enabled: bool,
    #[serde(default)]
    caption: SerializedCaption,
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerializedCaption {
    #[serde(default)]
    editor_state: Document,
}

fn image_type() -> String {
    "image".to_string()
}

impl From<ImageNode> for SerializedImage {
    fn from(image: ImageNode) -> Self {
        Self {
            ty: image_type(),
            version: IMAGE_VERSION,
            src: image.src,
            alt_text: image.alt_text,
            width: image.width,
            height: image.height,
            max_width: image.max_width,
            show_caption: image.show_caption,
            captions_enabled: image.captions_enabled,
            caption: SerializedCaption {
                editor_state: image.caption.unwrap_or_default(),
            },
        }
    }
}

impl From<SerializedImage> for ImageNode {
    fn from(value: SerializedImage) -> Self {
        let state = value.caption.editor_state;
        Self {
            src: value.src,
            alt_text: value.alt_text,
            width: value.width,
            height: value.height,
            max_width: value.max_width,
            show_caption: value.show_caption,
            captions_enabled: value.captions_enabled,
            caption: (!state.is_empty()).then_some(state),
        }
    }
}
