//! Sandbox state store.
//!
//! The single writable shared resource: current source text, console log
//! history, layout, theme, font size and console visibility. Components get
//! an `Arc<SandboxStore>` injected and observe it through [`StoreEvent`]s.
//! Source text is also published on its own watch channel, so log traffic
//! can never crowd edits out.
//! Setters that change durable fields re-serialize the durable subset before
//! returning; persistence failures are logged and swallowed.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::layout::{Layout, LayoutUpdate};
use crate::persist::{clamp_font_size, Snapshot, SnapshotStore};

/// Starter component shown when no snapshot exists.
pub const DEFAULT_SOURCE: &str = include_str!("../assets/starter.tsx");

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Warning,
    Error,
}

impl LogKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// One console line captured from the preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub kind: LogKind,
    pub text: String,
    pub timestamp_ms: i64,
}

/// Where a source edit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
    /// The editing surface in the host page.
    Editor,
    /// Anything else (a watched file, the CLI); the editor must be told.
    External,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    SourceChanged { text: Arc<str>, origin: EditOrigin },
    LogAppended(LogEntry),
    LogsCleared,
    LayoutChanged(Layout),
    ThemeChanged(Theme),
    FontSizeChanged(u32),
    ConsoleToggled(bool),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxState {
    pub source_text: Arc<str>,
    pub font_size: u32,
    pub theme: Theme,
    pub layout: Layout,
    pub console_open: bool,
    pub logs: Vec<LogEntry>,
}

impl SandboxState {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            source_text: snapshot.source_text.into(),
            font_size: snapshot.font_size,
            theme: snapshot.theme,
            layout: snapshot.layout,
            console_open: false,
            logs: Vec::new(),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            source_text: self.source_text.to_string(),
            font_size: self.font_size,
            theme: self.theme,
            layout: self.layout,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Evict the oldest log entries beyond this many.
    pub max_log_entries: Option<usize>,
    /// Source used when the snapshot has none.
    pub default_source: Option<String>,
}

pub struct SandboxStore {
    state: RwLock<SandboxState>,
    persistence: Arc<dyn SnapshotStore>,
    events: broadcast::Sender<StoreEvent>,
    source: watch::Sender<Arc<str>>,
    max_log_entries: Option<usize>,
}

impl SandboxStore {
    /// Load from the persisted snapshot when present and well-formed,
    /// otherwise from defaults. Never fails.
    pub fn load(persistence: Arc<dyn SnapshotStore>, options: StoreOptions) -> Self {
        let default_source = options.default_source.as_deref().unwrap_or(DEFAULT_SOURCE);
        let snapshot = match persistence.load() {
            Ok(Some(raw)) => Snapshot::parse_lenient(&raw, default_source),
            Ok(None) => Snapshot::defaults(default_source),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read snapshot, using defaults");
                Snapshot::defaults(default_source)
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = SandboxState::from_snapshot(snapshot);
        let (source, _) = watch::channel(state.source_text.clone());
        Self {
            state: RwLock::new(state),
            persistence,
            events,
            source,
            max_log_entries: options.max_log_entries,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Latest source text. The current value counts as already seen.
    pub fn watch_source(&self) -> watch::Receiver<Arc<str>> {
        self.source.subscribe()
    }

    /// Log history plus a receiver that starts right after it. Events are
    /// emitted under the write lock, so nothing falls between the two.
    pub fn resync_logs(&self) -> (Vec<LogEntry>, broadcast::Receiver<StoreEvent>) {
        let state = self.state.read();
        (state.logs.clone(), self.events.subscribe())
    }

    /// Copy of the full state.
    pub fn state(&self) -> SandboxState {
        self.state.read().clone()
    }

    pub fn source(&self) -> Arc<str> {
        self.state.read().source_text.clone()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.state.read().logs.clone()
    }

    pub fn layout(&self) -> Layout {
        self.state.read().layout
    }

    pub fn theme(&self) -> Theme {
        self.state.read().theme
    }

    pub fn font_size(&self) -> u32 {
        self.state.read().font_size
    }

    pub fn console_open(&self) -> bool {
        self.state.read().console_open
    }

    pub fn set_source(&self, text: &str, origin: EditOrigin) {
        let mut state = self.state.write();
        if &*state.source_text == text {
            return;
        }
        let text: Arc<str> = Arc::from(text);
        state.source_text = text.clone();
        self.persist(&state);
        self.source.send_replace(text.clone());
        self.emit(StoreEvent::SourceChanged { text, origin });
    }

    pub fn set_theme(&self, theme: Theme) {
        let mut state = self.state.write();
        if state.theme == theme {
            return;
        }
        state.theme = theme;
        self.persist(&state);
        self.emit(StoreEvent::ThemeChanged(theme));
    }

    pub fn set_font_size(&self, size: f64) {
        let size = clamp_font_size(size);
        let mut state = self.state.write();
        if state.font_size == size {
            return;
        }
        state.font_size = size;
        self.persist(&state);
        self.emit(StoreEvent::FontSizeChanged(size));
    }

    /// Merge a partial layout update. Ratios are clamped and renormalized so
    /// that they always sum to one.
    pub fn set_layout(&self, update: LayoutUpdate) {
        let mut state = self.state.write();
        let next = state.layout.apply(&update);
        if next == state.layout {
            return;
        }
        state.layout = next;
        self.persist(&state);
        self.emit(StoreEvent::LayoutChanged(next));
    }

    pub fn set_console_open(&self, open: bool) {
        let mut state = self.state.write();
        if state.console_open == open {
            return;
        }
        state.console_open = open;
        self.emit(StoreEvent::ConsoleToggled(open));
    }

    pub fn append_log(&self, entry: LogEntry) {
        self.append_logs(std::iter::once(entry));
    }

    /// Append in iteration order. Events are sent under the write lock so
    /// observers see entries in exactly the stored order.
    pub fn append_logs(&self, entries: impl IntoIterator<Item = LogEntry>) {
        let mut state = self.state.write();
        for entry in entries {
            state.logs.push(entry.clone());
            self.emit(StoreEvent::LogAppended(entry));
        }
        if let Some(max) = self.max_log_entries {
            let excess = state.logs.len().saturating_sub(max);
            if excess > 0 {
                state.logs.drain(..excess);
            }
        }
    }

    pub fn clear_logs(&self) {
        let mut state = self.state.write();
        state.logs.clear();
        self.emit(StoreEvent::LogsCleared);
    }

    fn persist(&self, state: &SandboxState) {
        let result = state
            .snapshot()
            .to_json()
            .and_then(|raw| self.persistence.save(&raw));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist snapshot");
        }
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
