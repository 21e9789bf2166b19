use serde::{Deserialize, Serialize};

use crate::image_loader::CachePolicy;

pub const DEFAULT_FONT_FAMILIES: [&str; 3] = ["Roboto", "Arial", "Courier New"];

/// Toolbar settings. Zero or empty values are replaced by `with_defaults`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolbarConfig {
    pub vertical_gap: f32,
    pub horizontal_offset: f32,
    pub font_size_step: u32,
    pub min_font_size: u32,
    pub max_font_size: u32,
    pub base_font_size: u32,
    pub link_placeholder: String,
    pub font_families: Vec<String>,
    pub image_max_width: u32,
    pub captions_enabled: Option<bool>,
    pub resize_cooldown_ms: u64,
    /// Pending image loads older than this report `TimedOut`. `None` waits forever.
    pub image_load_timeout_ms: Option<u64>,
    pub image_cache: CachePolicy,
}

impl ToolbarConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.vertical_gap == 0.0 {
            self.vertical_gap = 10.0;
        }
        if self.horizontal_offset == 0.0 {
            self.horizontal_offset = 5.0;
        }
        if self.font_size_step == 0 {
            self.font_size_step = 2;
        }
        if self.min_font_size == 0 {
            self.min_font_size = 8;
        }
        if self.max_font_size == 0 {
            self.max_font_size = 96;
        }
        if self.max_font_size < self.min_font_size {
            self.max_font_size = self.min_font_size;
        }
        if self.base_font_size == 0 {
            self.base_font_size = 16;
        }
        if self.link_placeholder.is_empty() {
            self.link_placeholder = "https://".to_string();
        }
        if self.font_families.is_empty() {
            self.font_families = DEFAULT_FONT_FAMILIES.iter().map(|f| f.to_string()).collect();
        }
        if self.image_max_width == 0 {
            self.image_max_width = plate_core::DEFAULT_MAX_WIDTH;
        }
        if self.resize_cooldown_ms == 0 {
            self.resize_cooldown_ms = 200;
        }
        self
    }

    pub fn captions_enabled(&self) -> bool {
        self.captions_enabled.unwrap_or(true)
    }

    pub fn clamp_font_size(&self, px: i64) -> u32 {
        px.clamp(self.min_font_size as i64, self.max_font_size as i64) as u32
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(s).map(Self::with_defaults)
    }
}
