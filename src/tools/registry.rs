//! Tool Allow-list Registry
//!
//! The registry holds the set of tool identifiers that generic dispatch may
//! launch, plus a separate set of identifiers that must run elevated.
//!
//! # Concurrency
//!
//! The registry is shared between concurrently handled requests. All reads
//! and mutations go through one `RwLock`, so an install racing with a
//! dispatch observes either the old or the new set, never a torn one.
//!
//! # Mutation
//!
//! [`AllowList::add`] and [`AllowList::remove`] are crate-private. They are
//! only reached from a successful package install or removal, so naming a
//! tool in a dispatch request can never widen the allow-list.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::RwLock;
use tracing::info;

/// Tools permitted for generic dispatch at startup
pub const DEFAULT_PERMITTED_TOOLS: &[&str] = &[
    "nmap",
    "amass",
    "subfinder",
    "assetfinder",
    "httpx",
    "aquatone",
    "theharvester",
    "ffuf",
    "gobuster",
    "dirsearch",
    "wfuzz",
    "sqlmap",
    "xsstrike",
    "nuclei",
    "nikto",
    "whatweb",
    "masscan",
    "rustscan",
    "feroxbuster",
    "katana",
    "sublist3r",
    "dnsenum",
    "fierce",
    "wafw00f",
    "commix",
    "joomscan",
];

/// Tools that always run with privilege elevation
pub const DEFAULT_ELEVATED_TOOLS: &[&str] =
    &["nmap", "nikto", "sqlmap", "nuclei", "masscan", "rustscan"];

/// A case-normalized, non-empty executable name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolId(String);

impl ToolId {
    /// Trim and lowercase `raw`; `None` if nothing is left
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
struct AllowListState {
    permitted: BTreeSet<ToolId>,
    elevated: BTreeSet<ToolId>,
}

/// Process-wide allow-list of dispatchable tools
#[derive(Debug)]
pub struct AllowList {
    state: RwLock<AllowListState>,
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_PERMITTED_TOOLS, DEFAULT_ELEVATED_TOOLS)
    }
}

impl AllowList {
    /// Create a registry seeded with the given permitted and elevated names
    ///
    /// Blank names are ignored. Elevation membership is fixed here; tools
    /// added later never require elevation.
    pub fn new<P, E>(permitted: P, elevated: E) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let state = AllowListState {
            permitted: permitted
                .into_iter()
                .filter_map(|name| ToolId::parse(name.as_ref()))
                .collect(),
            elevated: elevated
                .into_iter()
                .filter_map(|name| ToolId::parse(name.as_ref()))
                .collect(),
        };
        Self {
            state: RwLock::new(state),
        }
    }

    /// Check if a tool may be launched through generic dispatch
    pub fn is_permitted(&self, tool: &str) -> bool {
        match ToolId::parse(tool) {
            Some(id) => self.read().permitted.contains(&id),
            None => false,
        }
    }

    /// Check if a tool is marked as requiring elevation
    ///
    /// This only says something about dispatch when the tool is also
    /// permitted; callers check [`AllowList::is_permitted`] first.
    pub fn requires_elevation(&self, tool: &str) -> bool {
        match ToolId::parse(tool) {
            Some(id) => self.read().elevated.contains(&id),
            None => false,
        }
    }

    /// Snapshot of the permitted set in sorted order
    pub fn permitted(&self) -> Vec<String> {
        self.read()
            .permitted
            .iter()
            .map(|id| id.as_str().to_string())
            .collect()
    }

    /// Add a tool after it was installed. Returns `false` if it was already present.
    pub(crate) fn add(&self, tool: &str) -> bool {
        let Some(id) = ToolId::parse(tool) else {
            return false;
        };
        let inserted = self.write().permitted.insert(id.clone());
        if inserted {
            info!(tool = %id, "Tool added to allow-list");
        }
        inserted
    }

    /// Remove a tool after it was uninstalled. Returns `false` if it was absent.
    pub(crate) fn remove(&self, tool: &str) -> bool {
        let Some(id) = ToolId::parse(tool) else {
            return false;
        };
        let removed = self.write().permitted.remove(&id);
        if removed {
            info!(tool = %id, "Tool removed from allow-list");
        }
        removed
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, AllowListState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, AllowListState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}
