use std::fmt;
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::Mutex;
use raptorc_config::CacheConfig;
use tracing::{debug, trace};

use crate::error::CacheError;

/// Identifier assigned to a registered unit, unique among live units.
pub type UnitId = u64;

/// Counters since the cache was created. Reset does not clear them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub registrations: u64,
    pub compactions: u64,
    pub evicted: u64,
    pub resets: u64,
}

struct CacheEntry<U> {
    unit: Weak<U>,
    dependency_ids: Vec<UnitId>,
}

impl<U> CacheEntry<U> {
    fn is_live(&self) -> bool {
        self.unit.strong_count() > 0
    }
}

struct CacheState<U> {
    entries: AHashMap<UnitId, CacheEntry<U>>,
    /// Unit address to id. An entry's `Weak` pins the allocation, so an
    /// address cannot be reused while its entry is still listed.
    identities: AHashMap<usize, UnitId>,
    next_id: UnitId,
    /// Registrations since the last reset; drives compaction.
    registrations: u64,
    stats: CacheStats,
}

impl<U> CacheState<U> {
    fn new() -> Self {
        Self {
            entries: AHashMap::new(),
            identities: AHashMap::new(),
            next_id: 0,
            registrations: 0,
            stats: CacheStats::default(),
        }
    }

    fn live_id_of(&self, unit: &Arc<U>) -> Option<UnitId> {
        let id = *self.identities.get(&address(unit))?;
        let entry = self.entries.get(&id)?;
        (entry.is_live() && std::ptr::eq(entry.unit.as_ptr(), Arc::as_ptr(unit))).then_some(id)
    }

    fn dependency_ids(&self, dependencies: &[Arc<U>]) -> Result<Vec<UnitId>, CacheError> {
        dependencies
            .iter()
            .enumerate()
            .map(|(position, dependency)| {
                self.live_id_of(dependency)
                    .ok_or(CacheError::UnregisteredDependency { position })
            })
            .collect()
    }

    fn insert(&mut self, id: UnitId, unit: &Arc<U>, dependency_ids: Vec<UnitId>) {
        if let Some(previous) = self.entries.remove(&id) {
            let previous_address = previous.unit.as_ptr() as *const () as usize;
            if self.identities.get(&previous_address) == Some(&id) {
                self.identities.remove(&previous_address);
            }
        }
        self.entries.insert(
            id,
            CacheEntry {
                unit: Arc::downgrade(unit),
                dependency_ids,
            },
        );
        self.identities.insert(address(unit), id);
    }

    fn compact(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live());
        let entries = &self.entries;
        self.identities.retain(|_, id| entries.contains_key(id));

        let evicted = before - self.entries.len();
        self.stats.compactions += 1;
        self.stats.evicted += evicted as u64;
        evicted
    }
}

fn address<U>(unit: &Arc<U>) -> usize {
    Arc::as_ptr(unit) as *const () as usize
}

/// Weakly-owning registry of compiled units.
///
/// One lock guards all state, so registration, lookup, reset and compaction
/// never interleave.
pub struct UnitCache<U> {
    state: Mutex<CacheState<U>>,
    compaction_interval: u64,
}

impl<U> UnitCache<U> {
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default())
    }

    pub fn with_config(config: &CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState::new()),
            compaction_interval: config.effective_interval(),
        }
    }

    pub fn compaction_interval(&self) -> u64 {
        self.compaction_interval
    }

    /// Register `unit` under the next id and record the ids of its
    /// dependencies, each of which must already be registered here.
    pub fn register(&self, unit: &Arc<U>, dependencies: &[Arc<U>]) -> Result<UnitId, CacheError> {
        let mut state = self.state.lock();
        let dependency_ids = state.dependency_ids(dependencies)?;

        let id = state.next_id;
        state.next_id += 1;
        trace!(id, dependencies = ?dependency_ids, "registered unit");
        state.insert(id, unit, dependency_ids);
        self.after_registration(&mut state);
        Ok(id)
    }

    /// Register `unit` under a declared id, as done when reloading a
    /// persisted module. Fails if a live unit already holds `id`.
    pub fn register_with_id(
        &self,
        id: UnitId,
        unit: &Arc<U>,
        dependencies: &[Arc<U>],
    ) -> Result<(), CacheError> {
        let mut state = self.state.lock();
        if state.entries.get(&id).is_some_and(CacheEntry::is_live) {
            return Err(CacheError::IdCollision(id));
        }
        let dependency_ids = state.dependency_ids(dependencies)?;

        state.next_id = state.next_id.max(id.saturating_add(1));
        trace!(id, dependencies = ?dependency_ids, "registered unit under declared id");
        state.insert(id, unit, dependency_ids);
        self.after_registration(&mut state);
        Ok(())
    }

    fn after_registration(&self, state: &mut CacheState<U>) {
        state.registrations += 1;
        state.stats.registrations += 1;
        if state.registrations % self.compaction_interval == 0 {
            let evicted = state.compact();
            debug!(
                evicted,
                remaining = state.entries.len(),
                "compacted unit cache"
            );
        }
    }

    /// The live unit registered under `id`, or `None`. Used where an id that
    /// is not resolved yet is an expected condition.
    pub fn try_lookup(&self, id: UnitId) -> Option<Arc<U>> {
        self.state.lock().entries.get(&id)?.unit.upgrade()
    }

    pub fn lookup(&self, id: UnitId) -> Result<Arc<U>, CacheError> {
        self.try_lookup(id).ok_or(CacheError::NotFound(id))
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.state
            .lock()
            .entries
            .get(&id)
            .is_some_and(CacheEntry::is_live)
    }

    pub fn id_of(&self, unit: &Arc<U>) -> Option<UnitId> {
        self.state.lock().live_id_of(unit)
    }

    /// Dependency ids recorded when the live unit `id` was registered.
    pub fn dependency_ids(&self, id: UnitId) -> Result<Vec<UnitId>, CacheError> {
        let state = self.state.lock();
        match state.entries.get(&id) {
            Some(entry) if entry.is_live() => Ok(entry.dependency_ids.clone()),
            _ => Err(CacheError::NotFound(id)),
        }
    }

    /// Forget every entry and restart ids at zero.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let dropped = state.entries.len();
        state.entries.clear();
        state.identities.clear();
        state.next_id = 0;
        state.registrations = 0;
        state.stats.resets += 1;
        debug!(dropped, "reset unit cache");
    }

    /// Remove entries whose unit has been dropped. Returns how many went.
    pub fn compact(&self) -> usize {
        let mut state = self.state.lock();
        let evicted = state.compact();
        debug!(evicted, remaining = state.entries.len(), "compacted unit cache");
        evicted
    }

    /// Listed entries, dead ones included.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn live_count(&self) -> usize {
        self.state
            .lock()
            .entries
            .values()
            .filter(|entry| entry.is_live())
            .count()
    }

    /// The id the next `register` call will assign.
    pub fn next_id(&self) -> UnitId {
        self.state.lock().next_id
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }
}

impl<U> Default for UnitCache<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> fmt::Debug for UnitCache<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("UnitCache")
            .field("entries", &state.entries.len())
            .field("next_id", &state.next_id)
            .field("compaction_interval", &self.compaction_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Unit(&'static str);

    fn unit(name: &'static str) -> Arc<Unit> {
        Arc::new(Unit(name))
    }

    #[test]
    fn test_ids_increase_from_zero() {
        let cache = UnitCache::new();
        let units: Vec<_> = (0..5).map(|_| unit("u")).collect();
        let ids: Vec<_> = units
            .iter()
            .map(|u| cache.register(u, &[]).unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        for (id, u) in ids.iter().zip(&units) {
            assert!(Arc::ptr_eq(&cache.lookup(*id).unwrap(), u));
            assert_eq!(cache.id_of(u), Some(*id));
        }
    }

    #[test]
    fn test_each_dependency_id_is_recorded() {
        let cache = UnitCache::new();
        let a = unit("a");
        let b = unit("b");
        let c = unit("c");
        let d = unit("d");
        let id_a = cache.register(&a, &[]).unwrap();
        cache.register(&b, &[]).unwrap();
        let id_c = cache.register(&c, &[]).unwrap();
        let id_d = cache.register(&d, &[a.clone(), c.clone()]).unwrap();

        assert_eq!(cache.dependency_ids(id_d).unwrap(), vec![id_a, id_c]);
        assert_eq!(cache.dependency_ids(id_a).unwrap(), Vec::<UnitId>::new());
    }

    #[test]
    fn test_unregistered_dependency_is_rejected() {
        let cache = UnitCache::new();
        let a = unit("a");
        let stray = unit("stray");
        cache.register(&a, &[]).unwrap();
        let err = cache
            .register(&unit("d"), &[a.clone(), stray])
            .unwrap_err();
        assert_eq!(err, CacheError::UnregisteredDependency { position: 1 });
        assert_eq!(cache.next_id(), 1);
    }

    #[test]
    fn test_lookup_unknown_or_dropped_is_not_found() {
        let cache = UnitCache::new();
        assert_eq!(cache.lookup(3).unwrap_err(), CacheError::NotFound(3));

        let dropped = unit("gone");
        let id = cache.register(&dropped, &[]).unwrap();
        drop(dropped);
        assert_eq!(cache.lookup(id).unwrap_err(), CacheError::NotFound(id));
        assert!(cache.try_lookup(id).is_none());
        assert!(!cache.contains(id));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.live_count(), 0);
    }

    #[test]
    fn test_cache_does_not_keep_units_alive() {
        let cache = UnitCache::new();
        let kept = unit("kept");
        cache.register(&kept, &[]).unwrap();
        assert_eq!(Arc::strong_count(&kept), 1);
    }

    #[test]
    fn test_compaction_every_interval() {
        let cache = UnitCache::with_config(&CacheConfig::new(100));
        let mut owned: Vec<Arc<Unit>> = Vec::new();

        for _ in 0..99 {
            let u = unit("u");
            cache.register(&u, &[]).unwrap();
            owned.push(u);
        }
        // Release the first 50 before the 100th registration.
        owned = owned.split_off(50);
        assert_eq!(cache.len(), 99);

        let hundredth = unit("u");
        cache.register(&hundredth, &[]).unwrap();
        owned.push(hundredth);
        assert_eq!(cache.len(), 50);
        for id in 0..50 {
            assert!(cache.lookup(id).is_err());
        }

        for _ in 100..150 {
            let u = unit("u");
            cache.register(&u, &[]).unwrap();
            owned.push(u);
        }
        for id in 50..150 {
            assert!(cache.lookup(id).is_ok());
        }
        assert_eq!(owned.len(), 100);

        let stats = cache.stats();
        assert_eq!(stats.registrations, 150);
        assert_eq!(stats.compactions, 1);
        assert_eq!(stats.evicted, 50);
    }

    #[test]
    fn test_reset_restarts_ids() {
        let cache = UnitCache::new();
        let a = unit("a");
        let b = unit("b");
        cache.register(&a, &[]).unwrap();
        cache.register(&b, &[]).unwrap();

        cache.reset();
        assert!(cache.lookup(0).is_err());
        assert!(cache.lookup(1).is_err());
        assert_eq!(cache.id_of(&a), None);

        let c = unit("c");
        assert_eq!(cache.register(&c, &[]).unwrap(), 0);
        assert!(Arc::ptr_eq(&cache.lookup(0).unwrap(), &c));
        assert!(cache.lookup(1).is_err());
    }

    #[test]
    fn test_register_with_declared_id() {
        let cache = UnitCache::new();
        let a = unit("a");
        let b = unit("b");
        cache.register_with_id(7, &a, &[]).unwrap();
        cache.register_with_id(3, &b, &[a.clone()]).unwrap();
        assert_eq!(cache.dependency_ids(3).unwrap(), vec![7]);
        assert_eq!(cache.next_id(), 8);

        let err = cache.register_with_id(7, &unit("c"), &[]).unwrap_err();
        assert_eq!(err, CacheError::IdCollision(7));

        drop(a);
        let d = unit("d");
        cache.register_with_id(7, &d, &[]).unwrap();
        assert!(Arc::ptr_eq(&cache.lookup(7).unwrap(), &d));
    }

    #[test]
    fn test_concurrent_registration() {
        let cache = Arc::new(UnitCache::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let units: Vec<_> = (0..50).map(|_| unit("t")).collect();
                    let ids: Vec<_> = units
                        .iter()
                        .map(|u| cache.register(u, &[]).unwrap())
                        .collect();
                    (units, ids)
                })
            })
            .collect();

        let mut all_ids = Vec::new();
        let mut keep = Vec::new();
        for handle in handles {
            let (units, ids) = handle.join().unwrap();
            all_ids.extend(ids);
            keep.extend(units);
        }
        all_ids.sort_unstable();
        assert_eq!(all_ids, (0..200).collect::<Vec<_>>());
        assert_eq!(cache.live_count(), 200);
    }
}
