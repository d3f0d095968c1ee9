//! Resource trait and types for declarative host provisioning
//!
//! Every operation provis performs is modeled as a Resource with:
//! - State detection (current vs desired)
//! - Apply function (converge current → desired)
//! - Sudo requirements (deterministic, classified at plan time)

use anyhow::Result;
use std::fmt;

use crate::sudo::SudoContext;

/// Requirement level for sudo privileges
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SudoRequirement {
    /// No sudo needed
    None,
    /// Sudo required with a reason
    Required { reason: String },
}

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

/// Result of applying a resource
#[derive(Debug, Clone)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Short outcome label for the apply journal
    pub fn label(&self) -> String {
        match self {
            Self::NoChange => "no change".to_string(),
            Self::Created => "created".to_string(),
            Self::Modified => "modified".to_string(),
            Self::Removed => "removed".to_string(),
            Self::Failed { error } => format!("failed: {}", error),
            Self::Skipped { reason } => format!("skipped: {}", reason),
        }
    }
}

/// Context passed to apply operations
pub struct ApplyContext<'a> {
    pub dry_run: bool,
    pub verbose: bool,
    pub sudo: Option<&'a SudoContext>,
}

impl<'a> ApplyContext<'a> {
    /// Get the sudo context, or error if not available
    pub fn require_sudo(&self) -> Result<&'a SudoContext> {
        self.sudo
            .ok_or_else(|| anyhow::anyhow!("Sudo required but not available"))
    }
}

/// Core trait for all resources in provis
pub trait Resource: Send + Sync + fmt::Debug {
    /// Unique identifier (e.g. "nginx", "/etc/supervisor/conf.d/newjilo.conf")
    fn id(&self) -> String;

    /// Human-readable description
    fn description(&self) -> String;

    /// Resource type category (e.g. "apt_package", "config_file", "symlink")
    fn resource_type(&self) -> &'static str;

    /// Whether this resource requires sudo (classified at plan time)
    fn sudo_requirement(&self) -> SudoRequirement {
        SudoRequirement::None
    }

    /// Detect current state of this resource
    fn current_state(&self) -> Result<ResourceState>;

    /// Get the desired state (from config)
    fn desired_state(&self) -> ResourceState;

    /// Check if resource needs changes
    fn needs_apply(&self) -> Result<bool> {
        let current = self.current_state()?;
        let desired = self.desired_state();
        Ok(current != desired)
    }

    /// Apply changes to reach desired state
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;

    /// Rendered content diff, for resources that manage file text
    fn content_diff(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Whether this resource can be applied in parallel with others
    fn can_parallelize(&self) -> bool {
        true
    }
}

/// A diff between current and desired state
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    pub resource_id: String,
    pub resource_type: String,
    pub description: String,
    pub current: ResourceState,
    pub desired: ResourceState,
    pub requires_sudo: bool,
    /// Unified content diff for file-backed resources
    pub content_diff: Option<String>,
}

impl ResourceDiff {
    pub fn from_resource(resource: &dyn Resource) -> Result<Option<Self>> {
        let current = resource.current_state()?;
        let desired = resource.desired_state();

        if current == desired {
            return Ok(None);
        }

        Ok(Some(Self {
            resource_id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current,
            desired,
            requires_sudo: matches!(
                resource.sudo_requirement(),
                SudoRequirement::Required { .. }
            ),
            content_diff: resource.content_diff().unwrap_or(None),
        }))
    }
}

// Re-export submodules
pub mod apt_package;
pub mod config_file;
pub mod supervisor_program;
pub mod symlink;

pub use apt_package::AptPackage;
pub use config_file::ConfigFile;
pub use supervisor_program::SupervisorProgram;
pub use symlink::Symlink;
