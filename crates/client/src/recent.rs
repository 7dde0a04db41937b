//! Recent-session index
//!
//! Bounded, most-recently-used list of conversation summaries. New entries
//! enter at the front; overflow is dropped from the tail (oldest by
//! position, not by timestamp).

use serde::{Deserialize, Serialize};
use superai_protocol::RecentChat;
use tracing::debug;

pub const DEFAULT_RECENT_LIMIT: usize = 20;

/// What happens to an entry that is already in the list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecentPolicy {
    /// Overwrite where it is
    #[default]
    InPlace,
    /// Overwrite and promote to the front
    MoveToFront,
}

#[derive(Debug, Clone)]
pub struct RecentSessionIndex {
    entries: Vec<RecentChat>,
    limit: usize,
    policy: RecentPolicy,
}

impl Default for RecentSessionIndex {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_LIMIT, RecentPolicy::default())
    }
}

impl RecentSessionIndex {
    pub fn new(limit: usize, policy: RecentPolicy) -> Self {
        Self {
            entries: Vec::new(),
            limit,
            policy,
        }
    }

    pub fn upsert(&mut self, entry: RecentChat) {
        match self.entries.iter().position(|e| e.id == entry.id) {
            Some(idx) => match self.policy {
                RecentPolicy::InPlace => self.entries[idx] = entry,
                RecentPolicy::MoveToFront => {
                    self.entries.remove(idx);
                    self.entries.insert(0, entry);
                }
            },
            None => self.entries.insert(0, entry),
        }
        self.evict_overflow();
    }

    pub fn evict_overflow(&mut self) {
        if self.entries.len() > self.limit {
            debug!(
                component = "recent_index",
                event = "recent.evicted",
                dropped = self.entries.len() - self.limit,
                "Recent list over capacity"
            );
            self.entries.truncate(self.limit);
        }
    }

    /// Remove by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn get(&self, id: &str) -> Option<&RecentChat> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[RecentChat] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
