//! The generated document and what can be done with it.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ClientResult;

/// File name every artifact is offered under.
pub const ARTIFACT_NAME: &str = "index.html";
/// MIME type of every artifact.
pub const ARTIFACT_MIME: &str = "text/html";
/// Sandbox flags of the preview surface: scripts run, nothing else is granted.
pub const PREVIEW_SANDBOX: &str = "allow-scripts";

/// One generated HTML document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Always [`ARTIFACT_NAME`].
    pub name: String,
    /// Full HTML text.
    pub content: String,
    /// When the document was produced.
    pub generated_at: DateTime<Utc>,
}

/// Isolated preview surface for an artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewFrame {
    /// Document rendered inside the frame.
    pub srcdoc: String,
    /// Sandbox attribute.
    pub sandbox: &'static str,
}

impl PreviewFrame {
    /// `<iframe>` markup embedding the document.
    #[must_use]
    pub fn to_iframe_html(&self) -> String {
        format!(
            "<iframe title=\"Website Preview\" sandbox=\"{}\" srcdoc=\"{}\"></iframe>",
            self.sandbox,
            escape_attribute(&self.srcdoc)
        )
    }
}

/// A file offered for download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Download {
    /// Suggested file name.
    pub file_name: &'static str,
    /// MIME type.
    pub mime_type: &'static str,
    /// File body.
    pub bytes: Vec<u8>,
}

/// System clipboard.
pub trait Clipboard {
    /// Replace the clipboard text.
    fn write_text(&self, text: &str);
}

/// In-process clipboard.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<Option<String>>,
}

impl MemoryClipboard {
    /// Current clipboard text.
    #[must_use]
    pub fn read_text(&self) -> Option<String> {
        self.text.lock().ok().and_then(|guard| guard.clone())
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) {
        if let Ok(mut guard) = self.text.lock() {
            *guard = Some(text.to_string());
        }
    }
}

impl Artifact {
    /// Wrap generated HTML.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            name: ARTIFACT_NAME.to_string(),
            content: content.into(),
            generated_at: Utc::now(),
        }
    }

    /// Preview surface for the document.
    #[must_use]
    pub fn render_preview(&self) -> PreviewFrame {
        PreviewFrame {
            srcdoc: self.content.clone(),
            sandbox: PREVIEW_SANDBOX,
        }
    }

    /// The document as a downloadable `index.html`.
    #[must_use]
    pub fn download(&self) -> Download {
        Download {
            file_name: ARTIFACT_NAME,
            mime_type: ARTIFACT_MIME,
            bytes: self.content.as_bytes().to_vec(),
        }
    }

    /// Write `index.html` into `dir` and return its path.
    ///
    /// # Errors
    /// Returns [`ClientError::Io`](super::ClientError::Io) if the file cannot be written.
    pub fn save_to(&self, dir: &Path) -> ClientResult<PathBuf> {
        let path = dir.join(ARTIFACT_NAME);
        std::fs::write(&path, self.content.as_bytes())?;
        tracing::info!(path = %path.display(), bytes = self.content.len(), "Saved artifact");
        Ok(path)
    }

    /// Put the raw document on the clipboard.
    pub fn copy_to_clipboard(&self, clipboard: &dyn Clipboard) {
        clipboard.write_text(&self.content);
    }

    /// Standalone `data:` URL for opening the document in a new browsing context.
    #[must_use]
    pub fn open_in_new_surface(&self) -> String {
        format!("data:{ARTIFACT_MIME};base64,{}", STANDARD.encode(self.content.as_bytes()))
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<!DOCTYPE html><html><body><h1 class=\"x\">Pain & Co</h1></body></html>";

    #[test]
    fn test_download_is_always_index_html() {
        for content in [PAGE, "", "<html>other</html>"] {
            let download = Artifact::new(content).download();
            assert_eq!(download.file_name, "index.html");
            assert_eq!(download.mime_type, "text/html");
            assert_eq!(download.bytes, content.as_bytes());
        }
    }

    #[test]
    fn test_preview_is_sandboxed_and_escaped() {
        let preview = Artifact::new(PAGE).render_preview();
        assert_eq!(preview.srcdoc, PAGE);
        assert_eq!(preview.sandbox, "allow-scripts");

        let iframe = preview.to_iframe_html();
        assert!(iframe.contains("sandbox=\"allow-scripts\""));
        assert!(iframe.contains("class=&quot;x&quot;"));
        assert!(iframe.contains("Pain &amp; Co"));
    }

    #[test]
    fn test_copy_to_clipboard() {
        let clipboard = MemoryClipboard::default();
        Artifact::new(PAGE).copy_to_clipboard(&clipboard);
        assert_eq!(clipboard.read_text().as_deref(), Some(PAGE));
    }

    #[test]
    fn test_open_in_new_surface_round_trips() {
        let url = Artifact::new(PAGE).open_in_new_surface();
        let encoded = url.strip_prefix("data:text/html;base64,").unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), PAGE.as_bytes());
    }

    #[test]
    fn test_save_to_writes_index_html() {
        let dir = std::env::temp_dir().join(format!("sark-artifact-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let path = Artifact::new(PAGE).save_to(&dir).unwrap();
        assert_eq!(path.file_name().unwrap(), "index.html");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), PAGE);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_to_missing_dir_is_io_error() {
        let dir = std::env::temp_dir()
            .join(format!("sark-missing-{}", uuid::Uuid::new_v4()))
            .join("nested");

        let err = Artifact::new(PAGE).save_to(&dir).unwrap_err();
        assert!(matches!(err, crate::client::ClientError::Io(_)));
        assert!(!err.is_upstream_failure());
    }
}
