//! Instance-related type definitions.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    #[default]
    Idle,
    Starting,
    Started,
    Stopping,
    Stopped,
    Restarting,
}

impl InstanceStatus {
    /// Whether `start` may be called from this status.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Stopped | Self::Restarting)
    }
}

/// Per-call overrides for `start` (and for creating an instance).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub port: Option<u16>,
}

impl StartOptions {
    pub fn port(port: u16) -> Self {
        Self { port: Some(port) }
    }
}

/// Status information for an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub status: InstanceStatus,
    pub pid: Option<u32>,
}
