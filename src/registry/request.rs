//! Registry commands

use crate::error::Result;
use crate::processor::PrivateOpt;
use crate::settings::Settings;

/// Settings key naming the processor type
pub const PROC_NAME_KEY: &str = "proc_name";

/// Settings key naming the processor type to exclude from a listing
pub const PROC_NAME_NOT_KEY: &str = "proc_name!";

/// Settings key requesting a specific slot on POST
pub const FORCED_PROC_ID_KEY: &str = "forced_proc_id";

/// Command accepted by [`Procs::dispatch`](super::Procs::dispatch)
#[derive(Debug, Clone)]
pub enum ProcsRequest {
    /// List instances
    List(ProcsFilter),
    /// Create an instance of `proc_name`
    Post {
        /// Processor type name
        proc_name: String,
        /// Settings blob (JSON or query string)
        settings: String,
    },
    /// Remove an instance
    Delete(usize),
    /// Settings snapshot of an instance
    Get(usize),
    /// Update an instance, possibly substituting its type
    Put {
        /// Slot id
        id: usize,
        /// Settings blob (JSON or query string)
        settings: String,
    },
    /// Switch an instance to non-blocking I/O
    Unblock(usize),
    /// Type-specific option
    Private {
        /// Slot id
        id: usize,
        /// Option
        opt: PrivateOpt,
    },
}

/// Name filter for listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProcsFilter {
    /// Every instance
    #[default]
    All,
    /// Instances of this type only
    Name(String),
    /// Instances of any other type
    NotName(String),
}

impl ProcsFilter {
    /// Whether an instance of type `name` passes
    pub fn matches(&self, name: &str) -> bool {
        match self {
            ProcsFilter::All => true,
            ProcsFilter::Name(wanted) => wanted == name,
            ProcsFilter::NotName(excluded) => excluded != name,
        }
    }

    /// Build from settings: `proc_name=<n>` keeps only `n`,
    /// `proc_name!=<n>` drops `n`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        if let Some(name) = settings.get_str(PROC_NAME_KEY) {
            return Ok(ProcsFilter::Name(name));
        }
        if let Some(name) = settings.get_str(PROC_NAME_NOT_KEY) {
            return Ok(ProcsFilter::NotName(name));
        }
        Ok(ProcsFilter::All)
    }
}
