//! Evidence capture
//!
//! Produces the evidence a detection submits: a still frame encoded as a
//! data URL for image modalities, or the current text buffer for text
//! analysis.

pub mod spool;

pub use spool::FrameSpool;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture unavailable: {0}")]
    Unavailable(String),
    #[error("Frame read error: {0}")]
    FrameRead(#[from] std::io::Error),
    #[error("Watcher error: {0}")]
    Watcher(String),
}

/// A single encoded still frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl EncodedFrame {
    /// Wrap raw image bytes, sniffing the MIME type from the magic number
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime_type = if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            "image/png"
        } else if bytes.len() >= 4 && &bytes[0..4] == b"RIFF" {
            "image/webp"
        } else {
            // cameras in this setup emit JPEG
            "image/jpeg"
        };
        Self { bytes, mime_type }
    }

    /// `data:<mime>;base64,<payload>` form sent to the image analyzers
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }
}

/// One unit of evidence submitted for analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvidenceUnit {
    Image(EncodedFrame),
    Text(String),
}

/// Source of still frames. Capture is synchronous and may fail when no
/// camera feed is active.
pub trait FrameSource: Send + Sync {
    fn capture_image(&self) -> Result<EncodedFrame, CaptureError>;

    /// Begin producing frames ("start camera")
    fn start(&self) -> Result<(), CaptureError> {
        Ok(())
    }
}

/// User-editable text submitted by text analysis
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    inner: Arc<RwLock<String>>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, text: impl Into<String>) {
        let text = text.into();
        match self.inner.write() {
            Ok(mut guard) => *guard = text,
            Err(poisoned) => *poisoned.into_inner() = text,
        }
    }

    /// Copy of the current contents
    pub fn contents(&self) -> String {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_jpeg() {
        let frame = EncodedFrame::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(frame.mime_type, "image/jpeg");
        assert_eq!(frame.to_data_url(), "data:image/jpeg;base64,/9j/4A==");
    }

    #[test]
    fn test_png_sniffing() {
        let frame = EncodedFrame::from_bytes(b"\x89PNG\r\n\x1a\nrest".to_vec());
        assert!(frame.to_data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_text_buffer_shared_between_clones() {
        let buffer = TextBuffer::new();
        let view = buffer.clone();
        buffer.set("buy now");
        assert_eq!(view.contents(), "buy now");
    }
}
