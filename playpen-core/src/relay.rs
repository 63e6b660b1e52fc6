//! Log relay channel: preview frame → host.
//!
//! The preview document posts one message per console call or uncaught
//! failure. The host page forwards whatever the frame posted, tagged with the
//! generation it belongs to; everything is validated here before it can
//! reach the store.

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;

use crate::boundary::{Boundary, Generation};
use crate::store::{LogEntry, LogKind, SandboxStore};

/// Sentinel field every relay message carries with the value `true`.
pub const RELAY_MARKER: &str = "__playpenRelay";

/// Messages held for a generation that has not reported load yet.
const DEFAULT_MAX_PENDING: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayRejection {
    NotAnObject,
    MissingMarker,
    MissingKind,
    UnknownKind(String),
    /// Tagged with a generation that is no longer mounted.
    Stale(Generation),
    /// Too many messages before the generation loaded.
    BufferFull,
}

/// Validate one raw message and turn it into a log entry.
///
/// The marker must be exactly `true` and the kind one of `info`, `warning`,
/// `error`. A missing or non-numeric `timestampMs` becomes `received_ms`.
pub fn parse_relay(payload: &Value, received_ms: i64) -> Result<LogEntry, RelayRejection> {
    let obj = payload.as_object().ok_or(RelayRejection::NotAnObject)?;

    if obj.get(RELAY_MARKER) != Some(&Value::Bool(true)) {
        return Err(RelayRejection::MissingMarker);
    }

    let kind = match obj.get("kind") {
        Some(Value::String(s)) => {
            LogKind::parse(s).ok_or_else(|| RelayRejection::UnknownKind(s.clone()))?
        }
        Some(other) => return Err(RelayRejection::UnknownKind(other.to_string())),
        None => return Err(RelayRejection::MissingKind),
    };

    let text = match obj.get("text") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    };

    let timestamp_ms = obj
        .get("timestampMs")
        .and_then(Value::as_f64)
        .filter(|t| t.is_finite())
        .map(|t| t as i64)
        .unwrap_or(received_ms);

    Ok(LogEntry {
        kind,
        text,
        timestamp_ms,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Appended,
    /// Held until the generation reports load.
    Buffered,
    Rejected(RelayRejection),
}

/// Host-side listener: validates relay messages and appends them to the
/// store in arrival order.
pub struct RelayListener {
    store: Arc<SandboxStore>,
    pending: VecDeque<(Generation, LogEntry)>,
    max_pending: usize,
}

impl RelayListener {
    pub fn new(store: Arc<SandboxStore>) -> Self {
        Self {
            store,
            pending: VecDeque::new(),
            max_pending: DEFAULT_MAX_PENDING,
        }
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Handle one message forwarded by the host page.
    pub fn receive(
        &mut self,
        boundary: &Boundary,
        generation: Generation,
        payload: &Value,
        received_ms: i64,
    ) -> RelayOutcome {
        if !boundary.is_current(generation) {
            return self.reject(RelayRejection::Stale(generation));
        }

        let entry = match parse_relay(payload, received_ms) {
            Ok(entry) => entry,
            Err(rejection) => return self.reject(rejection),
        };

        if boundary.listener_attached(generation) {
            self.store.append_log(entry);
            return RelayOutcome::Appended;
        }

        // Emitted during module evaluation, before the load event reached us.
        if self.pending.len() >= self.max_pending {
            return self.reject(RelayRejection::BufferFull);
        }
        self.pending.push_back((generation, entry));
        RelayOutcome::Buffered
    }

    /// The listener for `generation` was attached: flush what it buffered,
    /// in arrival order. Returns the number of entries appended.
    pub fn on_loaded(&mut self, generation: Generation) -> usize {
        let drained: Vec<_> = self.pending.drain(..).collect();
        let entries: Vec<LogEntry> = drained
            .into_iter()
            .filter(|(g, _)| *g == generation)
            .map(|(_, entry)| entry)
            .collect();
        let count = entries.len();
        self.store.append_logs(entries);
        count
    }

    /// A remount began: anything still buffered belongs to a dead generation.
    pub fn on_remount(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(dropped = self.pending.len(), "discarding buffered relay messages");
            self.pending.clear();
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn reject(&self, rejection: RelayRejection) -> RelayOutcome {
        tracing::debug!(?rejection, "relay message ignored");
        RelayOutcome::Rejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::SandboxPolicy;
    use crate::persist::MemorySnapshotStore;
    use crate::store::StoreOptions;
    use serde_json::json;

    fn store() -> Arc<SandboxStore> {
        Arc::new(SandboxStore::load(
            Arc::new(MemorySnapshotStore::new()),
            StoreOptions::default(),
        ))
    }

    fn msg(kind: &str, text: &str) -> Value {
        json!({ RELAY_MARKER: true, "kind": kind, "text": text, "timestampMs": 1000 })
    }

    #[test]
    fn test_well_formed_message() {
        let entry = parse_relay(&msg("warning", "careful"), 5).unwrap();
        assert_eq!(entry.kind, LogKind::Warning);
        assert_eq!(entry.text, "careful");
        assert_eq!(entry.timestamp_ms, 1000);
    }

    #[test]
    fn test_missing_marker_is_rejected() {
        let payload = json!({ "kind": "info", "text": "hi" });
        assert_eq!(parse_relay(&payload, 0), Err(RelayRejection::MissingMarker));

        let payload = json!({ RELAY_MARKER: "yes", "kind": "info" });
        assert_eq!(parse_relay(&payload, 0), Err(RelayRejection::MissingMarker));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert_eq!(
            parse_relay(&msg("debug", "x"), 0),
            Err(RelayRejection::UnknownKind("debug".to_string()))
        );
        let payload = json!({ RELAY_MARKER: true });
        assert_eq!(parse_relay(&payload, 0), Err(RelayRejection::MissingKind));
        assert_eq!(parse_relay(&json!("text"), 0), Err(RelayRejection::NotAnObject));
    }

    #[test]
    fn test_timestamp_defaults_to_receipt_time() {
        let payload = json!({ RELAY_MARKER: true, "kind": "info", "text": "t" });
        assert_eq!(parse_relay(&payload, 777).unwrap().timestamp_ms, 777);

        let payload = json!({ RELAY_MARKER: true, "kind": "info", "timestampMs": "soon" });
        assert_eq!(parse_relay(&payload, 778).unwrap().timestamp_ms, 778);
    }

    #[test]
    fn test_non_string_text_is_stringified() {
        let payload = json!({ RELAY_MARKER: true, "kind": "error", "text": {"a": 1} });
        assert_eq!(parse_relay(&payload, 0).unwrap().text, r#"{"a":1}"#);
        let payload = json!({ RELAY_MARKER: true, "kind": "error" });
        assert_eq!(parse_relay(&payload, 0).unwrap().text, "");
    }

    #[test]
    fn test_listener_appends_only_for_loaded_generation() {
        let store = store();
        let mut boundary = Boundary::new(SandboxPolicy::default());
        let mut listener = RelayListener::new(store.clone());

        let cmd = boundary.begin_mount("doc");
        boundary.mark_loaded(cmd.generation).unwrap();

        assert_eq!(
            listener.receive(&boundary, cmd.generation, &msg("info", "a"), 0),
            RelayOutcome::Appended
        );
        assert_eq!(
            listener.receive(&boundary, cmd.generation, &json!({"kind": "info"}), 0),
            RelayOutcome::Rejected(RelayRejection::MissingMarker)
        );
        assert_eq!(store.logs().len(), 1);
    }

    #[test]
    fn test_messages_before_load_are_buffered_then_flushed_in_order() {
        let store = store();
        let mut boundary = Boundary::new(SandboxPolicy::default());
        let mut listener = RelayListener::new(store.clone());

        let cmd = boundary.begin_mount("doc");
        boundary.mark_applied(cmd.generation).unwrap();
        for text in ["first", "second"] {
            assert_eq!(
                listener.receive(&boundary, cmd.generation, &msg("info", text), 0),
                RelayOutcome::Buffered
            );
        }
        assert!(store.logs().is_empty());

        boundary.mark_loaded(cmd.generation).unwrap();
        assert_eq!(listener.on_loaded(cmd.generation), 2);
        listener.receive(&boundary, cmd.generation, &msg("info", "third"), 0);

        let texts: Vec<_> = store.logs().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_stale_generation_never_reaches_store() {
        let store = store();
        let mut boundary = Boundary::new(SandboxPolicy::default());
        let mut listener = RelayListener::new(store.clone());

        let old = boundary.begin_mount("doc");
        boundary.mark_applied(old.generation).unwrap();
        listener.receive(&boundary, old.generation, &msg("error", "early"), 0);

        let new = boundary.begin_mount("doc");
        listener.on_remount();
        assert_eq!(
            listener.receive(&boundary, old.generation, &msg("error", "late"), 0),
            RelayOutcome::Rejected(RelayRejection::Stale(old.generation))
        );

        boundary.mark_loaded(new.generation).unwrap();
        assert_eq!(listener.on_loaded(new.generation), 0);
        assert!(store.logs().is_empty());
    }

    #[test]
    fn test_buffer_is_bounded() {
        let store = store();
        let mut boundary = Boundary::new(SandboxPolicy::default());
        let mut listener = RelayListener::new(store).with_max_pending(1);

        let cmd = boundary.begin_mount("doc");
        listener.receive(&boundary, cmd.generation, &msg("info", "a"), 0);
        assert_eq!(
            listener.receive(&boundary, cmd.generation, &msg("info", "b"), 0),
            RelayOutcome::Rejected(RelayRejection::BufferFull)
        );
        assert_eq!(listener.pending_len(), 1);
    }
}
