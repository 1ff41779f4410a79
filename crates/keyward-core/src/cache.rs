//! Read-through snapshot cache.
//!
//! The cache is a per-process optimization and never authoritative: every
//! read replays the events committed after the cached sequence, so the log
//! always wins.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use tracing::debug;

use crate::aggregate::{AggregateRoot, fold};
use crate::error::DomainError;
use crate::event_log::EventLog;
use crate::query::SearchQuery;

struct Entry<A> {
    snapshot: A,
    touched: u64,
}

struct Slots<A> {
    entries: HashMap<String, Entry<A>>,
    /// Store order: tick of the last store to aggregate id.
    order: BTreeMap<u64, String>,
    tick: u64,
}

/// Bounded map from aggregate id to the last known snapshot.
pub struct AggregateCache<A> {
    slots: RwLock<Slots<A>>,
    capacity: usize,
}

impl<A: AggregateRoot> AggregateCache<A> {
    /// Creates a cache holding at most `capacity` snapshots (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: RwLock::new(Slots {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Returns a copy of the cached snapshot.
    #[must_use]
    pub fn get(&self, aggregate_id: &str) -> Option<A> {
        self.slots
            .read()
            .entries
            .get(aggregate_id)
            .map(|entry| entry.snapshot.clone())
    }

    /// Stores `snapshot` unless a newer one is already cached. Evicts the
    /// least recently stored entry when full.
    pub fn put(&self, snapshot: A) {
        let mut slots = self.slots.write();
        slots.tick += 1;
        let tick = slots.tick;
        let id = snapshot.aggregate_id().to_owned();

        if let Some(entry) = slots.entries.get_mut(&id) {
            if entry.snapshot.sequence() > snapshot.sequence() {
                return;
            }
            let previous = entry.touched;
            entry.snapshot = snapshot;
            entry.touched = tick;
            slots.order.remove(&previous);
            slots.order.insert(tick, id);
            return;
        }

        if slots.entries.len() >= self.capacity {
            if let Some((_, oldest)) = slots.order.pop_first() {
                slots.entries.remove(&oldest);
            }
        }
        slots.order.insert(tick, id.clone());
        slots.entries.insert(
            id,
            Entry {
                snapshot,
                touched: tick,
            },
        );
    }

    /// Drops the cached snapshot, if any.
    pub fn invalidate(&self, aggregate_id: &str) {
        let mut slots = self.slots.write();
        if let Some(entry) = slots.entries.remove(aggregate_id) {
            slots.order.remove(&entry.touched);
        }
    }

    /// Number of cached snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().entries.is_empty()
    }
}

impl<A> std::fmt::Debug for AggregateCache<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateCache")
            .field("capacity", &self.capacity)
            .field("len", &self.slots.read().entries.len())
            .finish()
    }
}

/// Loads the current snapshot of `aggregate_id`: starts from the cached
/// snapshot (or a zero-value one), folds every event committed after its
/// sequence and writes the refreshed snapshot back.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the stream has no events,
/// or any error from the log or from event decoding.
pub async fn load_through<A: AggregateRoot>(
    aggregate_id: &str,
    log: &dyn EventLog,
    cache: &AggregateCache<A>,
) -> Result<A, DomainError> {
    let cached = cache.get(aggregate_id);
    let hit = cached.is_some();
    let mut snapshot = cached.unwrap_or_else(|| A::new(aggregate_id));

    let events = log
        .filter(&SearchQuery::stream_after(
            A::AGGREGATE_TYPE,
            aggregate_id,
            snapshot.sequence(),
        ))
        .await?;
    fold(&mut snapshot, &events)?;
    debug!(
        aggregate_type = A::AGGREGATE_TYPE,
        aggregate_id,
        cache_hit = hit,
        replayed = events.len(),
        sequence = snapshot.sequence(),
        "Loaded aggregate"
    );

    if snapshot.sequence() == 0 {
        return Err(DomainError::AggregateNotFound(format!(
            "{} {aggregate_id}",
            A::AGGREGATE_TYPE
        )));
    }
    cache.put(snapshot.clone());
    Ok(snapshot)
}
