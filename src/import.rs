//! Drag-and-drop import of baked images.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::bake::{PNG_MIME, extract_source};
use crate::foundation::error::LabResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragPhase {
    Enter,
    Over,
    Leave,
    Drop,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum FileContent {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A file carried by a drag event. Its content is only read on demand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedFile {
    mime: String,
    content: FileContent,
}

impl DroppedFile {
    pub fn from_bytes(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            content: FileContent::Bytes(bytes),
        }
    }

    /// A file on disk; the MIME type is guessed from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            mime: mime_for_path(&path).to_owned(),
            content: FileContent::Path(path),
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn is_png(&self) -> bool {
        self.mime.eq_ignore_ascii_case(PNG_MIME)
    }

    pub fn read(&self) -> LabResult<Vec<u8>> {
        match &self.content {
            FileContent::Bytes(bytes) => Ok(bytes.clone()),
            FileContent::Path(path) => Ok(std::fs::read(path)
                .with_context(|| format!("failed to read dropped file '{}'", path.display()))?),
        }
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => PNG_MIME,
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragEvent {
    pub phase: DragPhase,
    pub files: Vec<DroppedFile>,
}

impl DragEvent {
    pub fn phase(phase: DragPhase) -> Self {
        Self {
            phase,
            files: Vec::new(),
        }
    }

    pub fn drop_files(files: Vec<DroppedFile>) -> Self {
        Self {
            phase: DragPhase::Drop,
            files,
        }
    }
}

/// Whether the host should stop the platform's default handling of the event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DragResponse {
    pub suppress_default: bool,
}

/// Result of inspecting one drag event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportOutcome {
    pub response: DragResponse,
    /// Source recovered from a dropped PNG, when there was one.
    pub source: Option<String>,
}

/// Decide what a drag event means for the lab.
///
/// Enter/over/leave only keep the drop zone active. A drop reads the first
/// file if it is a PNG and recovers its embedded source when it is non-empty;
/// anything else is ignored without error.
pub fn inspect_drag(event: &DragEvent) -> ImportOutcome {
    if event.phase != DragPhase::Drop {
        return ImportOutcome {
            response: DragResponse {
                suppress_default: true,
            },
            source: None,
        };
    }

    let Some(file) = event.files.first().filter(|f| f.is_png()) else {
        return ImportOutcome {
            response: DragResponse::default(),
            source: None,
        };
    };

    // An image baked from empty code carries nothing worth importing.
    let source = match file.read() {
        Ok(bytes) => extract_source(&bytes).filter(|s| !s.is_empty()),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unreadable drop");
            None
        }
    };
    ImportOutcome {
        response: DragResponse {
            suppress_default: true,
        },
        source,
    }
}
