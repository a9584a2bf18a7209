use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

/// Identifies one insertion of a key, so a stale eviction timer can tell that the
/// entry it was scheduled for has since been replaced.
pub type EntryStamp = u64;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
    stamp: EntryStamp,
    last_accessed: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Capacity-bounded map with least-recently-used eviction and optional per-entry
/// expiry. Not synchronised; owners wrap it in a lock.
#[derive(Debug, Clone)]
pub struct BoundedCache<K, V> {
    max_entries: usize,
    entries: HashMap<K, CacheEntry<V>>,
    clock: u64,
    next_stamp: EntryStamp,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: HashMap::with_capacity(max_entries.min(1024)),
            clock: 0,
            next_stamp: 0,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn tick(&mut self) -> u64 {
        self.clock = self.clock.saturating_add(1);
        self.clock
    }

    /// Returns a copy of a live value and marks it most recently used.
    /// An expired entry is dropped and reported as a miss.
    pub fn get(&mut self, key: &K, now: Instant) -> Option<V> {
        let expired = self.entries.get(key)?.is_expired(now);
        if expired {
            self.entries.remove(key);
            return None;
        }

        let tick = self.tick();
        let entry = self.entries.get_mut(key)?;
        entry.last_accessed = tick;
        Some(entry.value.clone())
    }

    /// Like [`get`](Self::get) but leaves recency untouched.
    pub fn peek(&self, key: &K, now: Instant) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| &entry.value)
    }

    /// Inserts or replaces `key`, evicting least recently used entries when full.
    /// Returns the evicted keys alongside the stamp of the new entry.
    pub fn insert(
        &mut self,
        key: K,
        value: V,
        expires_at: Option<Instant>,
    ) -> (EntryStamp, Vec<K>) {
        let mut evicted = Vec::new();
        if self.max_entries == 0 {
            return (0, evicted);
        }

        self.entries.remove(&key);
        while self.entries.len() >= self.max_entries {
            match self.evict_one() {
                Some(old) => evicted.push(old),
                None => break,
            }
        }

        self.next_stamp = self.next_stamp.wrapping_add(1);
        let stamp = self.next_stamp;
        let tick = self.tick();
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at,
                stamp,
                last_accessed: tick,
            },
        );
        (stamp, evicted)
    }

    /// Replaces the value of an entry that is still cached, keeping its recency and
    /// expiry. Returns false when the key is gone.
    pub fn update_existing(&mut self, key: &K, value: V) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Removes `key` only if it still holds the insertion identified by `stamp`.
    pub fn remove_if_stamp(&mut self, key: &K, stamp: EntryStamp) -> bool {
        let matches = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.stamp == stamp);
        if matches {
            self.entries.remove(key);
        }
        matches
    }

    pub fn purge(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }

    fn evict_one(&mut self) -> Option<K> {
        let key = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone())?;
        self.entries.remove(&key);
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn evicts_least_recently_used() {
        let now = Instant::now();
        let mut cache = BoundedCache::with_capacity(2);
        cache.insert("one", 1, None);
        cache.insert("two", 2, None);
        assert_eq!(cache.get(&"one", now), Some(1));

        let (_, evicted) = cache.insert("three", 3, None);
        assert_eq!(evicted, vec!["two"]);
        assert_eq!(cache.get(&"two", now), None);
        assert_eq!(cache.get(&"one", now), Some(1));
        assert_eq!(cache.get(&"three", now), Some(3));
    }

    #[test]
    fn peek_does_not_refresh_recency() {
        let now = Instant::now();
        let mut cache = BoundedCache::with_capacity(2);
        cache.insert("one", 1, None);
        cache.insert("two", 2, None);
        assert_eq!(cache.peek(&"one", now), Some(&1));

        let (_, evicted) = cache.insert("three", 3, None);
        assert_eq!(evicted, vec!["one"]);
    }

    #[test]
    fn expired_entries_are_misses() {
        let now = Instant::now();
        let mut cache = BoundedCache::with_capacity(4);
        cache.insert("k", 7, Some(now + Duration::from_secs(10)));

        assert_eq!(cache.get(&"k", now), Some(7));
        assert_eq!(cache.peek(&"k", now + Duration::from_secs(10)), None);
        assert_eq!(cache.get(&"k", now + Duration::from_secs(11)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn stale_stamp_does_not_remove_replacement() {
        let mut cache = BoundedCache::with_capacity(4);
        let (first, _) = cache.insert("k", 1, None);
        let (second, _) = cache.insert("k", 2, None);
        assert_ne!(first, second);

        assert!(!cache.remove_if_stamp(&"k", first));
        assert_eq!(cache.len(), 1);
        assert!(cache.remove_if_stamp(&"k", second));
        assert!(cache.is_empty());
    }

    #[test]
    fn update_existing_never_resurrects() {
        let now = Instant::now();
        let mut cache = BoundedCache::with_capacity(4);
        cache.insert("k", 1, None);
        assert!(cache.update_existing(&"k", 2));
        assert_eq!(cache.get(&"k", now), Some(2));

        cache.remove(&"k");
        assert!(!cache.update_existing(&"k", 3));
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_empties_everything() {
        let mut cache = BoundedCache::with_capacity(4);
        cache.insert(1, "a", None);
        cache.insert(2, "b", None);
        cache.purge();
        assert!(cache.is_empty());
        assert!(cache.keys().is_empty());
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let now = Instant::now();
        let mut cache = BoundedCache::with_capacity(0);
        cache.insert("k", 1, None);
        assert_eq!(cache.get(&"k", now), None);
    }
}
