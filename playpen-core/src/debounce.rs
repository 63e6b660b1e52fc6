//! Debounce/refresh controller.
//!
//! Edits are committed trailing-edge: a commit fires only once the source
//! has been quiet for the whole window, and carries the last text seen.
//! A manual refresh commits the store's current text immediately and
//! cancels whatever was pending, including an edit not yet observed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::store::SandboxStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitReason {
    /// The quiescence window elapsed after the last edit.
    Debounced,
    /// Explicit refresh; bypasses the window.
    Manual,
}

/// Signal to synthesize and remount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub text: Arc<str>,
    pub reason: CommitReason,
}

/// Trailing-edge debounce state, driven by explicit instants.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Option<(Instant, Arc<str>)>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Record an edit, replacing any pending text and restarting the window.
    pub fn edit(&mut self, text: Arc<str>, now: Instant) {
        self.pending = Some((now + self.window, text));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    /// Take the pending commit if its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<Commit> {
        match &self.pending {
            Some((deadline, _)) if *deadline <= now => {
                let (_, text) = self.pending.take()?;
                Some(Commit {
                    text,
                    reason: CommitReason::Debounced,
                })
            }
            _ => None,
        }
    }

    /// Commit `current` now and drop the pending edit.
    pub fn manual(&mut self, current: Arc<str>) -> Commit {
        self.pending = None;
        Commit {
            text: current,
            reason: CommitReason::Manual,
        }
    }
}

#[derive(Debug)]
enum Control {
    Refresh,
}

/// Handle for requesting manual refreshes.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::UnboundedSender<Control>,
}

impl RefreshHandle {
    /// Request an immediate remount with the current text. Returns false if
    /// the controller has stopped.
    pub fn refresh(&self) -> bool {
        self.tx.send(Control::Refresh).is_ok()
    }
}

/// Running controller: the refresh handle, the commit stream, and the task.
pub struct RefreshController {
    pub handle: RefreshHandle,
    pub commits: mpsc::UnboundedReceiver<Commit>,
    pub task: JoinHandle<()>,
}

impl RefreshController {
    /// Spawn the controller onto the current runtime, observing the source
    /// text of `store`. Stops once the store is dropped.
    pub fn spawn(store: &SandboxStore, window: Duration) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (commit_tx, commits) = mpsc::unbounded_channel();
        let source = store.watch_source();
        let task = tokio::spawn(run(window, source, control_rx, commit_tx));
        Self {
            handle: RefreshHandle { tx: control_tx },
            commits,
            task,
        }
    }
}

async fn run(
    window: Duration,
    mut source: watch::Receiver<Arc<str>>,
    mut control: mpsc::UnboundedReceiver<Control>,
    commits: mpsc::UnboundedSender<Commit>,
) {
    let mut debouncer = Debouncer::new(window);

    loop {
        let deadline = debouncer.deadline();

        let commit = tokio::select! {
            biased;

            ctl = control.recv() => match ctl {
                Some(Control::Refresh) => {
                    if debouncer.deadline().is_some() {
                        tracing::debug!("manual refresh cancelled pending commit");
                    }
                    // Marks a queued edit as seen; it is part of this commit.
                    let current = source.borrow_and_update().clone();
                    Some(debouncer.manual(current))
                }
                None => break,
            },

            changed = source.changed() => match changed {
                Ok(()) => {
                    let text = source.borrow_and_update().clone();
                    debouncer.edit(text, Instant::now());
                    None
                }
                Err(_) => break,
            },

            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                debouncer.poll(Instant::now())
            }
        };

        if let Some(commit) = commit {
            tracing::debug!(reason = ?commit.reason, len = commit.text.len(), "commit");
            if commits.send(commit).is_err() {
                break;
            }
        }
    }
}
