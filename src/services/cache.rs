use dashmap::DashMap;
use tracing::debug;

use crate::entities::setmeal;
use crate::services::catalog::DishView;

/// Cached listings of one kind, keyed by category.
///
/// Every key carries a generation that invalidation bumps. A reader takes the
/// generation before querying and hands it back with the listing; a listing
/// read under an older generation is discarded instead of stored.
struct Listings<V> {
    kind: &'static str,
    entries: DashMap<i32, V>,
    generations: DashMap<i32, u64>,
}

impl<V: Clone> Listings<V> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
            generations: DashMap::new(),
        }
    }

    fn get(&self, key: i32) -> Option<V> {
        let hit = self.entries.get(&key).map(|entry| entry.value().clone());
        debug!(kind = self.kind, key, hit = hit.is_some(), "catalog cache lookup");
        hit
    }

    fn generation(&self, key: i32) -> u64 {
        self.generations.get(&key).map(|g| *g).unwrap_or(0)
    }

    /// Stores `listing` unless `key` was invalidated after `generation` was read.
    fn put(&self, key: i32, generation: u64, listing: V) -> bool {
        // The generation entry stays locked until the insert is done, so an
        // invalidation cannot slip in between the check and the write.
        let current = self.generations.entry(key).or_insert(0);
        if *current != generation {
            debug!(kind = self.kind, key, "stale catalog listing discarded");
            return false;
        }
        self.entries.insert(key, listing);
        true
    }

    fn invalidate(&self, keys: impl IntoIterator<Item = i32>) {
        for key in keys {
            let mut generation = self.generations.entry(key).or_insert(0);
            *generation += 1;
            if self.entries.remove(&key).is_some() {
                debug!(kind = self.kind, key, "catalog cache entry invalidated");
            }
        }
    }
}

/// Customer-facing catalog listings, cached per category.
///
/// Writers invalidate exactly the categories they touched, after their
/// transaction commits; there is no "clear everything" operation.
pub struct CatalogCache {
    dishes: Listings<Vec<DishView>>,
    setmeals: Listings<Vec<setmeal::Model>>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self {
            dishes: Listings::new("dish"),
            setmeals: Listings::new("setmeal"),
        }
    }
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dishes(&self, category_id: i32) -> Option<Vec<DishView>> {
        self.dishes.get(category_id)
    }

    pub fn dish_generation(&self, category_id: i32) -> u64 {
        self.dishes.generation(category_id)
    }

    pub fn put_dishes(&self, category_id: i32, generation: u64, listing: Vec<DishView>) -> bool {
        self.dishes.put(category_id, generation, listing)
    }

    pub fn invalidate_dishes(&self, category_ids: impl IntoIterator<Item = i32>) {
        self.dishes.invalidate(category_ids);
    }

    pub fn setmeals(&self, category_id: i32) -> Option<Vec<setmeal::Model>> {
        self.setmeals.get(category_id)
    }

    pub fn setmeal_generation(&self, category_id: i32) -> u64 {
        self.setmeals.generation(category_id)
    }

    pub fn put_setmeals(
        &self,
        category_id: i32,
        generation: u64,
        listing: Vec<setmeal::Model>,
    ) -> bool {
        self.setmeals.put(category_id, generation, listing)
    }

    pub fn invalidate_setmeals(&self, category_ids: impl IntoIterator<Item = i32>) {
        self.setmeals.invalidate(category_ids);
    }
}
