use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use plate_core::ImagePayload;

use crate::error::ToolbarError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogMode {
    Url,
    File,
}

/// A picked file, already read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// User-facing message raised by the dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// State of the "insert image" dialog. Produces an `ImagePayload` on confirm
/// and never touches the editor itself.
#[derive(Debug, Clone, Default)]
pub struct InsertImageDialog {
    mode: Option<DialogMode>,
    src: String,
    alt_text: String,
    notification: Option<Notification>,
}

impl InsertImageDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Option<DialogMode> {
        self.mode
    }

    pub fn choose_mode(&mut self, mode: DialogMode) {
        self.mode = Some(mode);
        self.src.clear();
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        if self.mode == Some(DialogMode::Url) {
            self.src = url.into();
        }
    }

    pub fn set_alt_text(&mut self, alt_text: impl Into<String>) {
        self.alt_text = alt_text.into();
    }

    /// Takes the result of reading a picked file. A failed read leaves the
    /// dialog without a source and raises a notification.
    pub fn load_file(&mut self, upload: Result<ImageFile, ToolbarError>) {
        if self.mode != Some(DialogMode::File) {
            return;
        }
        match upload {
            Ok(file) => {
                tracing::debug!(name = %file.name, bytes = file.bytes.len(), "image file loaded");
                self.src = data_url(&file.mime, &file.bytes);
            }
            Err(err) => {
                tracing::warn!(%err, "image upload rejected");
                self.src.clear();
                self.notification = Some(Notification {
                    title: "Image upload failed".to_string(),
                    message: err.to_string(),
                });
            }
        }
    }

    pub fn can_confirm(&self) -> bool {
        self.mode.is_some() && !self.src.is_empty()
    }

    /// Returns the payload to insert and resets the dialog.
    pub fn confirm(&mut self) -> Option<ImagePayload> {
        if !self.can_confirm() {
            return None;
        }
        let payload = ImagePayload::new(std::mem::take(&mut self.src), std::mem::take(&mut self.alt_text));
        self.mode = None;
        Some(payload)
    }

    pub fn take_notification(&mut self) -> Option<Notification> {
        self.notification.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_encodes_bytes() {
        assert_eq!(data_url("image/png", b"hi"), "data:image/png;base64,aGk=");
    }
}
