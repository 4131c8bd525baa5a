//! Instance-level option commands

use serde_json::Value;

use crate::settings::Settings;

/// Command accepted by [`ProcInstance::opt`](super::ProcInstance::opt)
#[derive(Debug, Clone)]
pub enum ProcOpt {
    /// Switch both queues to non-blocking and call the type's unblock hook
    Unblock,
    /// Snapshot of the instance settings
    Get,
    /// Apply new settings
    Put(Settings),
    /// Type-specific option
    Private(PrivateOpt),
}

/// Option understood only by a particular processor type
#[derive(Debug, Clone, PartialEq)]
pub struct PrivateOpt {
    /// Option name
    pub tag: String,
    /// Option payload
    pub args: Value,
}

impl PrivateOpt {
    /// Create a private option
    pub fn new(tag: impl Into<String>, args: Value) -> Self {
        Self {
            tag: tag.into(),
            args,
        }
    }
}
