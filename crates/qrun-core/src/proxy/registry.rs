//! Per-path cache entry states and request coalescing.
//!
//! Every normalized resource path maps to one of three recorded states:
//! a download in flight, cached on disk, or uncachable. A path with no
//! record is unknown. The first request for an unknown path registers
//! itself as the owner of the download; requests arriving while it runs
//! subscribe to the owner's broadcast and are released together when it
//! settles.
//!
//! ```text
//! Request A ─┐
//!            │                         owner
//! Request B ─┼──► CacheRegistry ──────► download ──► settle(Cached | Uncachable)
//!            │         │                                   │
//! Request C ─┘         ▼                                   │
//!               [B, C wait on the  ◄───────────────────────┘
//!                broadcast, then re-evaluate]
//! ```
//!
//! Settling replaces the in-flight record in a single map mutation, so no
//! request can observe "nothing in flight" without also observing the
//! outcome.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Final state of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// The file was written completely and is authoritative
    Cached,
    /// The download failed; the path is never fetched again
    Uncachable,
}

/// Observable state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// A download owns a pending write
    CachingInProgress,
    /// Cached on disk
    Cached,
    /// A prior attempt failed
    Uncachable,
}

enum EntryState {
    InFlight(broadcast::Sender<Settled>),
    Cached,
    Uncachable,
}

impl EntryState {
    fn status(&self) -> EntryStatus {
        match self {
            EntryState::InFlight(_) => EntryStatus::CachingInProgress,
            EntryState::Cached => EntryStatus::Cached,
            EntryState::Uncachable => EntryStatus::Uncachable,
        }
    }
}

/// Result of looking up a path.
pub(crate) enum Lookup {
    Unknown,
    InFlight(broadcast::Receiver<Settled>),
    Cached,
    Uncachable,
}

/// Result of trying to start a download.
pub(crate) enum Registration {
    /// The caller owns the download and must settle the guard
    Owner(InFlightGuard),
    /// Another request started the download in the meantime
    Waiter(broadcast::Receiver<Settled>),
    /// Another request already settled the path
    Settled,
}

/// Registry of cache entry states, one instance per proxy.
#[derive(Default)]
pub struct CacheRegistry {
    entries: DashMap<String, EntryState>,
}

impl CacheRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded state of `key`, if any.
    #[must_use]
    pub fn status(&self, key: &str) -> Option<EntryStatus> {
        self.entries.get(key).map(|entry| entry.status())
    }

    /// Number of paths currently being downloaded.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.value(), EntryState::InFlight(_)))
            .count()
    }

    /// Looks up `key`, subscribing to the download if one is in flight.
    ///
    /// The subscription is taken while the entry is locked, so the receiver
    /// is guaranteed to see the settlement.
    pub(crate) fn lookup(&self, key: &str) -> Lookup {
        match self.entries.get(key).as_deref() {
            None => Lookup::Unknown,
            Some(EntryState::InFlight(tx)) => Lookup::InFlight(tx.subscribe()),
            Some(EntryState::Cached) => Lookup::Cached,
            Some(EntryState::Uncachable) => Lookup::Uncachable,
        }
    }

    /// Atomically claims the download of `key` if nothing is recorded.
    pub(crate) fn begin(self: &Arc<Self>, key: &str) -> Registration {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                EntryState::InFlight(tx) => Registration::Waiter(tx.subscribe()),
                EntryState::Cached | EntryState::Uncachable => Registration::Settled,
            },
            Entry::Vacant(entry) => {
                let (tx, _rx) = broadcast::channel(1);
                entry.insert(EntryState::InFlight(tx));
                debug!(path = key, "Caching started");
                Registration::Owner(InFlightGuard {
                    registry: Arc::clone(self),
                    key: key.to_string(),
                    settled: false,
                })
            }
        }
    }

    /// Drops a `Cached` record whose file disappeared, so the next request
    /// downloads it again. Other states are left untouched.
    pub(crate) fn forget_cached(&self, key: &str) {
        self.entries
            .remove_if(key, |_, state| matches!(state, EntryState::Cached));
    }

    fn settle(&self, key: &str, outcome: Settled) {
        let state = match outcome {
            Settled::Cached => EntryState::Cached,
            Settled::Uncachable => EntryState::Uncachable,
        };

        if let Some(EntryState::InFlight(tx)) = self.entries.insert(key.to_string(), state) {
            let waiters = tx.receiver_count();
            // No receivers is fine: nobody was waiting
            let _ = tx.send(outcome);
            if waiters > 0 {
                debug!(path = key, waiters, ?outcome, "Released coalesced requests");
            }
        }
    }
}

/// Ownership of an in-flight download.
///
/// Settle it explicitly with [`InFlightGuard::settle`]. A guard dropped
/// without settling (panic, cancelled task) marks the path uncachable so
/// waiters are never stranded.
pub struct InFlightGuard {
    registry: Arc<CacheRegistry>,
    key: String,
    settled: bool,
}

impl InFlightGuard {
    /// Normalized path this guard owns.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Records the outcome and releases every waiter.
    pub fn settle(mut self, outcome: Settled) {
        self.registry.settle(&self.key, outcome);
        self.settled = true;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.settled {
            debug!(path = %self.key, "Download dropped before settling");
            self.registry.settle(&self.key, Settled::Uncachable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_begin_owns_and_later_ones_wait() {
        let registry = Arc::new(CacheRegistry::new());

        let Registration::Owner(guard) = registry.begin("resources/a.js") else {
            panic!("first registration should own the download");
        };
        assert_eq!(
            registry.status("resources/a.js"),
            Some(EntryStatus::CachingInProgress)
        );
        assert!(matches!(
            registry.begin("resources/a.js"),
            Registration::Waiter(_)
        ));
        assert_eq!(registry.in_flight_count(), 1);

        guard.settle(Settled::Cached);
        assert_eq!(registry.status("resources/a.js"), Some(EntryStatus::Cached));
        assert!(matches!(
            registry.begin("resources/a.js"),
            Registration::Settled
        ));
    }

    #[tokio::test]
    async fn waiters_receive_the_settlement() {
        let registry = Arc::new(CacheRegistry::new());
        let Registration::Owner(guard) = registry.begin("k") else {
            panic!("expected owner");
        };

        let Lookup::InFlight(mut rx1) = registry.lookup("k") else {
            panic!("expected in-flight");
        };
        let Lookup::InFlight(mut rx2) = registry.lookup("k") else {
            panic!("expected in-flight");
        };

        guard.settle(Settled::Uncachable);

        assert_eq!(rx1.recv().await.unwrap(), Settled::Uncachable);
        assert_eq!(rx2.recv().await.unwrap(), Settled::Uncachable);
        assert!(matches!(registry.lookup("k"), Lookup::Uncachable));
    }

    #[test]
    fn dropped_guard_marks_uncachable() {
        let registry = Arc::new(CacheRegistry::new());
        let registration = registry.begin("k");
        drop(registration);
        assert_eq!(registry.status("k"), Some(EntryStatus::Uncachable));
    }

    #[test]
    fn forget_only_removes_cached_entries() {
        let registry = Arc::new(CacheRegistry::new());

        let Registration::Owner(guard) = registry.begin("cached") else {
            panic!("expected owner");
        };
        guard.settle(Settled::Cached);
        registry.forget_cached("cached");
        assert_eq!(registry.status("cached"), None);

        drop(registry.begin("failed"));
        registry.forget_cached("failed");
        assert_eq!(registry.status("failed"), Some(EntryStatus::Uncachable));
    }
}
