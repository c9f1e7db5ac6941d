//! Time-bounded cache of client addresses with a confirmed backend session.
//!
//! Entries map a [`ClientAddress`] to the instant its authorization lapses.
//! Reads never remove anything: an expired entry is simply treated as absent
//! until it is overwritten or swept. Memory is bounded by a periodic sweep and
//! a capacity cap that evicts the entry closest to expiry.

use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::domain::models::ClientAddress;

/// Longest authorization the cache will record; longer TTLs are clamped
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 86_400);

/// Shared authorization cache keyed by client address
#[derive(Debug)]
pub struct AuthorizationCache {
    entries: DashMap<ClientAddress, Instant>,
    max_entries: usize,
}

impl Default for AuthorizationCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl AuthorizationCache {
    /// Create an empty cache holding at most `max_entries` addresses
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Recorded expiry for `address`, whether or not it has lapsed
    pub fn lookup(&self, address: &ClientAddress) -> Option<Instant> {
        self.entries.get(address).map(|entry| *entry.value())
    }

    /// Returns true if `address` holds an unexpired authorization
    pub fn is_fresh(&self, address: &ClientAddress) -> bool {
        self.lookup(address)
            .is_some_and(|expires_at| Instant::now() < expires_at)
    }

    /// Authorize `address` until `now + ttl`, overwriting any previous expiry
    ///
    /// `ttl` is clamped to [`MAX_TTL`]. Returns the new expiry.
    pub fn record(&self, address: ClientAddress, ttl: Duration) -> Instant {
        let expires_at = Instant::now() + ttl.min(MAX_TTL);

        if !self.entries.contains_key(&address) && self.entries.len() >= self.max_entries {
            self.make_room();
        }
        self.entries.insert(address, expires_at);

        expires_at
    }

    /// Remove every lapsed entry, returning how many were dropped
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, expires_at| {
            let keep = now < *expires_at;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Spawn a background task sweeping expired entries every `interval`
    ///
    /// The task stops on its own once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.sweep_expired();
                if removed > 0 {
                    debug!(removed, remaining = cache.len(), "swept expired authorizations");
                }
            }
        })
    }

    /// Free one slot: drop lapsed entries, or else the one expiring soonest
    fn make_room(&self) {
        if self.sweep_expired() > 0 && self.entries.len() < self.max_entries {
            return;
        }

        let soonest = self
            .entries
            .iter()
            .min_by_key(|entry| *entry.value())
            .map(|entry| *entry.key());

        if let Some(address) = soonest {
            self.entries.remove(&address);
            debug!(%address, "evicted authorization to stay within capacity");
        }
    }
}
