//! One live preview session: the store, the boundary, the relay listener and
//! the refresh controller, wired together.
//!
//! Commits from the controller are synthesized and mounted one at a time.
//! Host pages observe the session through a broadcast of [`ServerFrame`]s.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use playpen_core::{
    Boundary, EditOrigin, Generation, LayoutUpdate, LogEntry, LogKind, MountCommand,
    RefreshController, RefreshHandle, RelayListener, RelayOutcome, SandboxPolicy, SandboxStore,
    StoreEvent,
};
use playpen_render::Synthesizer;

use crate::protocol::{ClientFrame, ServerFrame};

const FRAME_CAPACITY: usize = 1024;

pub struct PreviewSession {
    store: Arc<SandboxStore>,
    synth: Synthesizer,
    boundary: Mutex<Boundary>,
    relay: Mutex<RelayListener>,
    refresh: RefreshHandle,
    frames: broadcast::Sender<ServerFrame>,
}

impl PreviewSession {
    /// Spawn the controller and the forwarding tasks, and request the
    /// initial mount.
    pub fn start(
        store: Arc<SandboxStore>,
        synth: Synthesizer,
        policy: SandboxPolicy,
        debounce: Duration,
    ) -> Arc<Self> {
        let RefreshController {
            handle,
            mut commits,
            task: _,
        } = RefreshController::spawn(&store, debounce);
        let (frames, _) = broadcast::channel(FRAME_CAPACITY);

        let session = Arc::new(Self {
            relay: Mutex::new(RelayListener::new(store.clone())),
            store,
            synth,
            boundary: Mutex::new(Boundary::new(policy)),
            refresh: handle,
            frames,
        });

        tokio::spawn({
            let session = session.clone();
            async move {
                while let Some(commit) = commits.recv().await {
                    session.remount(&commit.text);
                }
            }
        });

        tokio::spawn({
            let session = session.clone();
            let mut events = session.store.subscribe();
            async move {
                loop {
                    match events.recv().await {
                        Ok(event) => session.forward(event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "host frames lagged behind store events, resyncing console");
                            let (entries, fresh) = session.store.resync_logs();
                            events = fresh;
                            let _ = session.frames.send(ServerFrame::Logs { entries });
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });

        session.refresh();
        session
    }

    pub fn store(&self) -> &Arc<SandboxStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerFrame> {
        self.frames.subscribe()
    }

    /// Frame sent to a host page when it connects.
    pub fn snapshot(&self) -> ServerFrame {
        ServerFrame::Snapshot {
            state: self.store.state(),
            mount: self.boundary.lock().current_command(),
        }
    }

    /// Capabilities granted to the preview frame.
    pub fn policy(&self) -> SandboxPolicy {
        self.boundary.lock().policy().clone()
    }

    pub fn refresh(&self) -> bool {
        self.refresh.refresh()
    }

    pub fn current_generation(&self) -> Option<Generation> {
        self.boundary.lock().current_generation()
    }

    /// Document of the live generation; older generations are gone.
    pub fn document(&self, generation: Generation) -> Option<Arc<str>> {
        self.boundary.lock().document(generation)
    }

    /// Synthesize `text` and remount the frame with it. A synthesis failure
    /// keeps the current preview and lands in the console instead.
    pub fn remount(&self, text: &str) -> Option<MountCommand> {
        let rendered = match self.synth.render(text) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(error = %e, "failed to synthesize preview");
                self.store.append_log(LogEntry {
                    kind: LogKind::Error,
                    text: e.to_string(),
                    timestamp_ms: now_ms(),
                });
                return None;
            }
        };

        let mut boundary = self.boundary.lock();
        let command = boundary.begin_mount(rendered.html);
        self.relay.lock().on_remount();
        info!(generation = %command.generation, imports = rendered.imports.len(), "mounting preview");
        let _ = self.frames.send(ServerFrame::Mount(command.clone()));
        Some(command)
    }

    /// Apply one frame from a host page.
    pub fn handle(&self, frame: ClientFrame) {
        match frame {
            ClientFrame::Edit { text } => self.store.set_source(&text, EditOrigin::Editor),
            ClientFrame::Refresh => {
                self.refresh();
            }
            ClientFrame::Relay {
                generation,
                payload,
            } => {
                let boundary = self.boundary.lock();
                let outcome =
                    self.relay
                        .lock()
                        .receive(&boundary, generation, &payload, now_ms());
                if let RelayOutcome::Rejected(rejection) = outcome {
                    debug!(%generation, ?rejection, "relay message dropped");
                }
            }
            ClientFrame::Mounted { generation } => {
                if let Err(rejection) = self.boundary.lock().mark_applied(generation) {
                    debug!(%generation, ?rejection, "ignoring mounted report");
                }
            }
            ClientFrame::Loaded { generation } => {
                let mut boundary = self.boundary.lock();
                match boundary.mark_loaded(generation) {
                    Ok(()) => {
                        let flushed = self.relay.lock().on_loaded(generation);
                        debug!(%generation, flushed, "preview loaded");
                    }
                    Err(rejection) => debug!(%generation, ?rejection, "ignoring loaded report"),
                }
            }
            ClientFrame::Layout(update) => self.store.set_layout(update),
            ClientFrame::Orientation { orientation } => {
                self.store.set_layout(LayoutUpdate::orientation(orientation))
            }
            ClientFrame::Theme { theme } => self.store.set_theme(theme),
            ClientFrame::FontSize { font_size } => self.store.set_font_size(font_size),
            ClientFrame::Console { open } => self.store.set_console_open(open),
            ClientFrame::ClearConsole => self.store.clear_logs(),
        }
    }

    fn forward(&self, event: StoreEvent) {
        let frame = match event {
            StoreEvent::LogAppended(entry) => ServerFrame::Log { entry },
            StoreEvent::LogsCleared => ServerFrame::LogsCleared,
            StoreEvent::SourceChanged {
                text,
                origin: EditOrigin::External,
            } => ServerFrame::Source { text },
            _ => return,
        };
        let _ = self.frames.send(frame);
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
