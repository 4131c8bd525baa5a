//! External representations of registry state

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Hypermedia link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    /// Relation, e.g. `self`
    pub rel: String,
    /// Target
    pub href: String,
}

impl Link {
    /// Link with relation `self`
    pub fn self_link(href: impl Into<String>) -> Self {
        Self {
            rel: "self".to_string(),
            href: href.into(),
        }
    }
}

/// One entry of a registry listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcSummary {
    /// Slot id
    pub proc_id: usize,
    /// Type name
    pub proc_name: String,
    /// Links, currently only `self`
    pub links: Vec<Link>,
}

/// Registry listing, serialized as `{"<prefix>": [ProcSummary, ..]}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcsListing {
    /// Collection name
    pub prefix: String,
    /// Entries in slot order
    pub procs: Vec<ProcSummary>,
}

impl Serialize for ProcsListing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.prefix, &self.procs)?;
        map.end()
    }
}

/// Reply to a successful POST
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PostResponse {
    /// Slot id of the new instance
    pub proc_id: usize,
}
