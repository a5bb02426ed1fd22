//! Time-boxed, process-wide cache of the full supplement listing.

use std::time::Duration;

use nutriprice_core::Supplement;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct Slot {
    /// Current entry and when it was stored.
    entry: Option<(Vec<Supplement>, Instant)>,
    /// Most recent accepted snapshot; survives expiry and invalidation.
    last_good: Option<Vec<Supplement>>,
    generation: u64,
}

/// Single-slot cache with a fixed TTL.
///
/// Every [`invalidate`](Self::invalidate) advances a generation counter so a
/// refresh that started before a write can detect it and skip repopulating
/// the slot with data the write has made stale.
#[derive(Debug)]
pub struct SupplementCache {
    ttl: Duration,
    slot: RwLock<Slot>,
}

impl SupplementCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(Slot::default()),
        }
    }

    /// Returns the cached listing if it is younger than the TTL.
    pub async fn get(&self) -> Option<Vec<Supplement>> {
        let slot = self.slot.read().await;
        slot.entry
            .as_ref()
            .filter(|(_, stored_at)| stored_at.elapsed() < self.ttl)
            .map(|(data, _)| data.clone())
    }

    /// Stores `data` stamped with the current time, but only if no
    /// invalidation happened since `generation` was read. Returns whether
    /// the data was stored.
    pub async fn put_for(&self, generation: u64, data: Vec<Supplement>) -> bool {
        let mut slot = self.slot.write().await;
        if slot.generation != generation {
            return false;
        }
        slot.last_good = Some(data.clone());
        slot.entry = Some((data, Instant::now()));
        true
    }

    /// Clears the current entry. The last-known-good snapshot is kept.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
    }

    pub async fn generation(&self) -> u64 {
        self.slot.read().await.generation
    }

    /// Last snapshot that was stored, regardless of age or invalidation.
    pub async fn stale(&self) -> Option<Vec<Supplement>> {
        self.slot.read().await.last_good.clone()
    }
}
