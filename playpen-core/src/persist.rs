//! Durable snapshot of user state.
//!
//! One key, one JSON blob. Every field falls back to its own default when it
//! is missing or malformed, and an unparseable blob falls back entirely.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::layout::{Layout, Orientation};
use crate::store::Theme;

pub const DEFAULT_FONT_SIZE: u32 = 14;
pub const MIN_FONT_SIZE: u32 = 8;
pub const MAX_FONT_SIZE: u32 = 48;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to access snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Key-value persistence for the single snapshot key.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, PersistError>;
    fn save(&self, raw: &str) -> Result<(), PersistError>;
}

/// Snapshot stored as a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<String>, PersistError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, raw: &str) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

/// In-memory snapshot, for tests and `--ephemeral` sessions.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    raw: Mutex<Option<String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.lock().clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<String>, PersistError> {
        Ok(self.raw.lock().clone())
    }

    fn save(&self, raw: &str) -> Result<(), PersistError> {
        *self.raw.lock() = Some(raw.to_string());
        Ok(())
    }
}

/// The durable subset of the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub source_text: String,
    pub font_size: u32,
    pub theme: Theme,
    pub layout: Layout,
}

impl Snapshot {
    pub fn defaults(default_source: &str) -> Self {
        Self {
            source_text: default_source.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            theme: Theme::default(),
            layout: Layout::default(),
        }
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode leniently. Never fails.
    pub fn parse_lenient(raw: &str, default_source: &str) -> Self {
        let defaults = Self::defaults(default_source);
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unparseable snapshot");
                return defaults;
            }
        };

        let source_text = value
            .get("sourceText")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(defaults.source_text);

        let font_size = value
            .get("fontSize")
            .and_then(Value::as_f64)
            .filter(|n| n.is_finite())
            .map(clamp_font_size)
            .unwrap_or(defaults.font_size);

        let theme = value
            .get("theme")
            .and_then(Value::as_str)
            .and_then(Theme::parse)
            .unwrap_or(defaults.theme);

        let layout_value = value.get("layout");
        let field = |name: &str| layout_value.and_then(|l| l.get(name));
        let orientation = field("orientation")
            .and_then(Value::as_str)
            .and_then(Orientation::parse)
            .unwrap_or(defaults.layout.orientation);
        let editor_ratio = field("editorRatio").and_then(Value::as_f64);
        let preview_ratio = field("previewRatio").and_then(Value::as_f64);
        let layout = Layout::new(
            orientation,
            editor_ratio.unwrap_or(defaults.layout.editor_ratio),
            preview_ratio.unwrap_or(defaults.layout.preview_ratio),
        );

        Self {
            source_text,
            font_size,
            theme,
            layout,
        }
    }
}

pub fn clamp_font_size(size: f64) -> u32 {
    if !size.is_finite() {
        return DEFAULT_FONT_SIZE;
    }
    size.round()
        .clamp(f64::from(MIN_FONT_SIZE), f64::from(MAX_FONT_SIZE)) as u32
}
