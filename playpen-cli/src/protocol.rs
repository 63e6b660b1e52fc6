//! WebSocket frames exchanged with the host page.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use playpen_core::{
    Generation, LayoutUpdate, LogEntry, MountCommand, Orientation, SandboxState, Theme,
};

/// Host page → server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    Edit {
        text: String,
    },
    Refresh,
    /// Whatever the preview frame posted, tagged with the generation the
    /// host page had mounted when it arrived.
    Relay {
        generation: Generation,
        #[serde(default)]
        payload: Value,
    },
    Mounted {
        generation: Generation,
    },
    Loaded {
        generation: Generation,
    },
    Layout(LayoutUpdate),
    Orientation {
        orientation: Orientation,
    },
    Theme {
        theme: Theme,
    },
    FontSize {
        #[serde(rename = "fontSize")]
        font_size: f64,
    },
    Console {
        open: bool,
    },
    ClearConsole,
}

/// Server → host page.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    /// Sent once on connect.
    Snapshot {
        state: SandboxState,
        mount: Option<MountCommand>,
    },
    Mount(MountCommand),
    Log {
        entry: LogEntry,
    },
    LogsCleared,
    /// Replaces the console after host frames fell behind the store.
    Logs {
        entries: Vec<LogEntry>,
    },
    /// The source changed somewhere other than this editor.
    Source {
        text: Arc<str>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(raw: Value) -> ClientFrame {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_client_frames() {
        assert_eq!(
            parse(json!({"type": "edit", "text": "x"})),
            ClientFrame::Edit { text: "x".into() }
        );
        assert_eq!(parse(json!({"type": "refresh"})), ClientFrame::Refresh);
        assert_eq!(parse(json!({"type": "clearConsole"})), ClientFrame::ClearConsole);
        assert_eq!(
            parse(json!({"type": "fontSize", "fontSize": 16})),
            ClientFrame::FontSize { font_size: 16.0 }
        );
        assert_eq!(
            parse(json!({"type": "loaded", "generation": 3})),
            ClientFrame::Loaded {
                generation: Generation(3)
            }
        );
    }

    #[test]
    fn test_partial_layout_frame() {
        let frame = parse(json!({"type": "layout", "editorRatio": 0.3}));
        assert_eq!(
            frame,
            ClientFrame::Layout(LayoutUpdate {
                editor_ratio: Some(0.3),
                ..LayoutUpdate::default()
            })
        );
    }

    #[test]
    fn test_relay_payload_is_kept_raw() {
        let frame = parse(json!({"type": "relay", "generation": 1, "payload": [1, 2]}));
        assert_eq!(
            frame,
            ClientFrame::Relay {
                generation: Generation(1),
                payload: json!([1, 2])
            }
        );
    }

    #[test]
    fn test_unknown_frame_is_an_error() {
        let result = serde_json::from_value::<ClientFrame>(json!({"type": "navigate", "url": "/"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_mount_frame_shape() {
        let frame = ServerFrame::Mount(MountCommand {
            generation: Generation(2),
            src: "/preview/2".into(),
        });
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "mount", "generation": 2, "src": "/preview/2"})
        );
    }

    #[test]
    fn test_logs_frame_shape() {
        let frame = ServerFrame::Logs {
            entries: vec![LogEntry {
                kind: playpen_core::LogKind::Warning,
                text: "careful".into(),
                timestamp_ms: 7,
            }],
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "logs", "entries": [{"kind": "warning", "text": "careful", "timestampMs": 7}]})
        );
    }
}
