//! # playpen-core
//!
//! Core library for the playpen live preview sandbox.
//!
//! This crate owns everything that does not touch HTML or the network:
//! import discovery, the resolution map, the preview boundary lifecycle,
//! the log relay, the debounce controller and the persisted store.

pub mod boundary;
pub mod config;
pub mod debounce;
pub mod exports;
pub mod imports;
pub mod layout;
pub mod persist;
pub mod relay;
pub mod resolution;
pub mod store;

pub use boundary::{
    preview_src, Boundary, Capability, Generation, LifecycleRejection, MountCommand, MountPhase,
    PolicyError, SandboxPolicy,
};
pub use config::{Config, ConfigError, PreviewConfig};
pub use debounce::{Commit, CommitReason, Debouncer, RefreshController, RefreshHandle};
pub use exports::{default_export_name, default_export_name_or, DEFAULT_COMPONENT};
pub use imports::{discover_imports, package_name};
pub use layout::{Layout, LayoutUpdate, Orientation};
pub use persist::{FileSnapshotStore, MemorySnapshotStore, PersistError, Snapshot, SnapshotStore};
pub use relay::{parse_relay, RelayListener, RelayOutcome, RelayRejection, RELAY_MARKER};
pub use resolution::{ResolutionMap, ResolutionMapBuilder};
pub use store::{
    EditOrigin, LogEntry, LogKind, SandboxState, SandboxStore, StoreEvent, StoreOptions, Theme,
    DEFAULT_SOURCE,
};
