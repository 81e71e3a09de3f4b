use std::time::Duration;

/// Canonical address of one catalog entity.
pub type Target = String;

/// Extracted image URL for a target.
pub type Reference = String;

/// A single page request handed to a [`Transport`](crate::traits::Transport).
///
/// Carries the full header profile so that every request of a run looks
/// the same apart from the rotated user agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl PageRequest {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Counts over a result store, relative to a catalog when one is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    /// Targets with a stored reference.
    pub resolved: usize,
    /// Targets attempted without success (stored null).
    pub failed: usize,
    /// Catalog targets with no entry at all.
    pub unattempted: usize,
}

impl StoreStats {
    pub fn total(&self) -> usize {
        self.resolved + self.failed + self.unattempted
    }
}

/// Outcome of an orchestrated run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    /// Unique targets in the catalog.
    pub total: usize,
    /// Catalog targets resolved at the end of the run, prior runs included.
    pub found: usize,
    /// Targets resolved by this run.
    pub newly_found: usize,
    /// Targets attempted by this run.
    pub attempted: usize,
    /// Number of failure-streak cooldowns taken.
    pub cooldowns: usize,
}
