//! The isolation boundary: capability grant and mount generations.
//!
//! The preview frame runs each synthesized document as one *generation*.
//! A new generation replaces the previous one wholesale; the host-side relay
//! listener for a generation is attached only once that generation reports
//! it has loaded, and is detached as soon as the next remount begins.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("top-level navigation can never be granted to the preview frame ({0})")]
    TopNavigation(String),

    #[error("capability lets the preview escape its sandbox ({0})")]
    Escape(String),

    #[error("unknown sandbox capability: {0}")]
    Unknown(String),

    #[error("the preview frame needs allow-scripts")]
    MissingScripts,
}

/// A capability the preview frame may be granted.
///
/// Top-level navigation has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Scripts,
    Forms,
    PointerLock,
    SameOrigin,
    Popups,
    Modals,
    Downloads,
}

impl Capability {
    pub fn token(self) -> &'static str {
        match self {
            Capability::Scripts => "allow-scripts",
            Capability::Forms => "allow-forms",
            Capability::PointerLock => "allow-pointer-lock",
            Capability::SameOrigin => "allow-same-origin",
            Capability::Popups => "allow-popups",
            Capability::Modals => "allow-modals",
            Capability::Downloads => "allow-downloads",
        }
    }

    pub fn from_token(token: &str) -> Result<Self, PolicyError> {
        let token = token.trim();
        match token {
            "allow-scripts" => Ok(Capability::Scripts),
            "allow-forms" => Ok(Capability::Forms),
            "allow-pointer-lock" => Ok(Capability::PointerLock),
            "allow-same-origin" => Ok(Capability::SameOrigin),
            "allow-popups" => Ok(Capability::Popups),
            "allow-modals" => Ok(Capability::Modals),
            "allow-downloads" => Ok(Capability::Downloads),
            t if t.starts_with("allow-top-navigation") => {
                Err(PolicyError::TopNavigation(t.to_string()))
            }
            "allow-popups-to-escape-sandbox" => Err(PolicyError::Escape(token.to_string())),
            other => Err(PolicyError::Unknown(other.to_string())),
        }
    }
}

/// The fixed capability grant of the preview frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    grants: BTreeSet<Capability>,
}

impl Default for SandboxPolicy {
    /// Scripts, forms and pointer-lock, plus same-origin and popups for the
    /// module host's loading and redirect flows.
    fn default() -> Self {
        Self {
            grants: [
                Capability::Scripts,
                Capability::Forms,
                Capability::PointerLock,
                Capability::SameOrigin,
                Capability::Popups,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl SandboxPolicy {
    /// Minimal grant: scripts, forms, pointer-lock.
    pub fn minimal() -> Self {
        Self {
            grants: [Capability::Scripts, Capability::Forms, Capability::PointerLock]
                .into_iter()
                .collect(),
        }
    }

    pub fn parse<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Result<Self, PolicyError> {
        let mut grants = BTreeSet::new();
        for token in tokens {
            for part in token.split_whitespace() {
                grants.insert(Capability::from_token(part)?);
            }
        }
        if !grants.contains(&Capability::Scripts) {
            return Err(PolicyError::MissingScripts);
        }
        Ok(Self { grants })
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.grants.contains(&capability)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.grants.iter().map(|c| c.token())
    }

    /// Value for the frame's `sandbox` attribute.
    pub fn attribute(&self) -> String {
        self.tokens().collect::<Vec<_>>().join(" ")
    }
}

/// Identifies one mounted document. Strictly increasing per boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountPhase {
    /// Issued to the host page; the frame is transitioning through a blank document.
    Pending,
    /// The host page applied the document to the frame.
    Applied,
    /// The frame reported load; the relay listener is attached.
    Loaded,
}

/// Instruction for the host page to remount the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountCommand {
    pub generation: Generation,
    pub src: String,
}

#[derive(Debug)]
struct Mount {
    generation: Generation,
    document: Arc<str>,
    phase: MountPhase,
}

/// Why a lifecycle report from the host page was not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleRejection {
    /// The report names a generation that has already been replaced.
    Stale,
    /// The report repeats or skips a phase.
    OutOfOrder,
}

/// Tracks the live generation of the preview frame.
#[derive(Debug)]
pub struct Boundary {
    policy: SandboxPolicy,
    next: u64,
    current: Option<Mount>,
    loads: u64,
}

impl Boundary {
    pub fn new(policy: SandboxPolicy) -> Self {
        Self {
            policy,
            next: 1,
            current: None,
            loads: 0,
        }
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    /// Start a new generation for `document`. The previous generation's
    /// document is dropped and its listener detached, even when the new
    /// document is byte-identical.
    pub fn begin_mount(&mut self, document: impl Into<Arc<str>>) -> MountCommand {
        let generation = Generation(self.next);
        self.next += 1;

        if let Some(prev) = self.current.take() {
            if prev.phase == MountPhase::Loaded {
                tracing::debug!(generation = %prev.generation, "relay listener detached");
            }
        }

        self.current = Some(Mount {
            generation,
            document: document.into(),
            phase: MountPhase::Pending,
        });

        MountCommand {
            generation,
            src: preview_src(generation),
        }
    }

    pub fn mark_applied(&mut self, generation: Generation) -> Result<(), LifecycleRejection> {
        let mount = self.mount_mut(generation)?;
        match mount.phase {
            MountPhase::Pending => {
                mount.phase = MountPhase::Applied;
                Ok(())
            }
            _ => Err(LifecycleRejection::OutOfOrder),
        }
    }

    /// Record the frame's load event and attach the relay listener.
    /// A load reported without a prior `mark_applied` implies it.
    pub fn mark_loaded(&mut self, generation: Generation) -> Result<(), LifecycleRejection> {
        let mount = self.mount_mut(generation)?;
        match mount.phase {
            MountPhase::Pending | MountPhase::Applied => {
                mount.phase = MountPhase::Loaded;
                self.loads += 1;
                tracing::debug!(%generation, "relay listener attached");
                Ok(())
            }
            MountPhase::Loaded => Err(LifecycleRejection::OutOfOrder),
        }
    }

    fn mount_mut(&mut self, generation: Generation) -> Result<&mut Mount, LifecycleRejection> {
        match self.current.as_mut() {
            Some(mount) if mount.generation == generation => Ok(mount),
            _ => Err(LifecycleRejection::Stale),
        }
    }

    pub fn current_generation(&self) -> Option<Generation> {
        self.current.as_ref().map(|m| m.generation)
    }

    pub fn phase(&self) -> Option<MountPhase> {
        self.current.as_ref().map(|m| m.phase)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current_generation() == Some(generation)
    }

    /// Whether relay messages tagged with `generation` are delivered now.
    pub fn listener_attached(&self, generation: Generation) -> bool {
        matches!(
            &self.current,
            Some(m) if m.generation == generation && m.phase == MountPhase::Loaded
        )
    }

    /// Document for `generation`, only while it is the live one.
    pub fn document(&self, generation: Generation) -> Option<Arc<str>> {
        self.current
            .as_ref()
            .filter(|m| m.generation == generation)
            .map(|m| m.document.clone())
    }

    /// The live mount instruction, for host pages that connect mid-session.
    pub fn current_command(&self) -> Option<MountCommand> {
        self.current_generation().map(|generation| MountCommand {
            generation,
            src: preview_src(generation),
        })
    }

    /// Number of load events observed across all generations.
    pub fn load_count(&self) -> u64 {
        self.loads
    }
}

/// URL the host page points the frame at for a generation. Distinct per
/// generation so that identical content still reloads.
pub fn preview_src(generation: Generation) -> String {
    format!("/preview/{}", generation.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_attribute() {
        assert_eq!(
            SandboxPolicy::default().attribute(),
            "allow-scripts allow-forms allow-pointer-lock allow-same-origin allow-popups"
        );
        assert_eq!(
            SandboxPolicy::minimal().attribute(),
            "allow-scripts allow-forms allow-pointer-lock"
        );
    }

    #[test]
    fn test_policy_rejects_top_navigation_variants() {
        for token in [
            "allow-top-navigation",
            "allow-top-navigation-by-user-activation",
            "allow-top-navigation-to-custom-protocols",
        ] {
            let err = SandboxPolicy::parse(["allow-scripts", token]).unwrap_err();
            assert_eq!(err, PolicyError::TopNavigation(token.to_string()));
        }
    }

    #[test]
    fn test_policy_parse_accepts_space_separated_tokens() {
        let policy = SandboxPolicy::parse(["allow-scripts allow-same-origin"]).unwrap();
        assert!(policy.allows(Capability::SameOrigin));
        assert!(!policy.allows(Capability::Popups));
    }

    #[test]
    fn test_policy_requires_scripts() {
        assert_eq!(
            SandboxPolicy::parse(["allow-forms"]).unwrap_err(),
            PolicyError::MissingScripts
        );
        assert!(matches!(
            SandboxPolicy::parse(["allow-scripts", "allow-popups-to-escape-sandbox"]),
            Err(PolicyError::Escape(_))
        ));
    }

    #[test]
    fn test_identical_content_gets_distinct_generations() {
        let mut boundary = Boundary::new(SandboxPolicy::default());
        let first = boundary.begin_mount("<html></html>");
        boundary.mark_loaded(first.generation).unwrap();
        let second = boundary.begin_mount("<html></html>");
        boundary.mark_loaded(second.generation).unwrap();

        assert_ne!(first.generation, second.generation);
        assert_ne!(first.src, second.src);
        assert_eq!(boundary.load_count(), 2);
    }

    #[test]
    fn test_superseded_generation_is_discarded() {
        let mut boundary = Boundary::new(SandboxPolicy::default());
        let first = boundary.begin_mount("one");
        boundary.mark_loaded(first.generation).unwrap();
        assert!(boundary.listener_attached(first.generation));

        let second = boundary.begin_mount("two");
        assert!(!boundary.listener_attached(first.generation));
        assert!(boundary.document(first.generation).is_none());
        assert_eq!(boundary.document(second.generation).as_deref(), Some("two"));
        assert_eq!(
            boundary.mark_loaded(first.generation),
            Err(LifecycleRejection::Stale)
        );
    }

    #[test]
    fn test_listener_attaches_only_after_load() {
        let mut boundary = Boundary::new(SandboxPolicy::default());
        let cmd = boundary.begin_mount("doc");
        assert_eq!(boundary.phase(), Some(MountPhase::Pending));
        assert!(!boundary.listener_attached(cmd.generation));

        boundary.mark_applied(cmd.generation).unwrap();
        assert!(!boundary.listener_attached(cmd.generation));

        boundary.mark_loaded(cmd.generation).unwrap();
        assert!(boundary.listener_attached(cmd.generation));
        assert_eq!(
            boundary.mark_loaded(cmd.generation),
            Err(LifecycleRejection::OutOfOrder)
        );
    }

    #[test]
    fn test_current_command_tracks_latest() {
        let mut boundary = Boundary::new(SandboxPolicy::default());
        assert!(boundary.current_command().is_none());
        boundary.begin_mount("a");
        let latest = boundary.begin_mount("b");
        assert_eq!(boundary.current_command(), Some(latest));
    }
}
