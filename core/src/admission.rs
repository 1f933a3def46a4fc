//! Process-local fast-reject cache.
//!
//! Presence of a product means "this process saw the shared counter go
//! negative for it and has not rolled that observation back". Absence means
//! nothing more than "not known to be sold out". Entries are hints: they can
//! be stale relative to the coordination flag or to other processes.
//!
//! The cache is owned by one process and injected into the orchestrator (and
//! the background tasks that maintain it). It is never persisted and never
//! shared across process boundaries.

use crate::types::ProductId;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Concurrent map of products this process knows to be sold out.
///
/// All operations are O(1) and safe to call from many request tasks at once.
///
/// # Example
///
/// ```
/// use flash_sale_core::{LocalAdmissionCache, ProductId};
///
/// let cache = LocalAdmissionCache::new();
/// let id = ProductId::new(1);
///
/// assert!(!cache.is_known_sold_out(id));
/// cache.mark_sold_out(id);
/// assert!(cache.is_known_sold_out(id));
/// cache.clear_sold_out(id);
/// assert!(!cache.is_known_sold_out(id));
/// ```
#[derive(Debug, Default)]
pub struct LocalAdmissionCache {
    /// Product -> when this process marked it sold out
    sold_out: DashMap<ProductId, Instant>,
}

impl LocalAdmissionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this process has marked the product sold out.
    #[must_use]
    pub fn is_known_sold_out(&self, product_id: ProductId) -> bool {
        self.sold_out.contains_key(&product_id)
    }

    /// Mark the product sold out.
    ///
    /// Returns `true` if the product was not already marked. Re-marking keeps
    /// the original timestamp.
    pub fn mark_sold_out(&self, product_id: ProductId) -> bool {
        let mut newly_marked = false;
        self.sold_out.entry(product_id).or_insert_with(|| {
            newly_marked = true;
            Instant::now()
        });
        newly_marked
    }

    /// Remove the sold-out mark.
    ///
    /// Returns `true` if an entry was removed.
    pub fn clear_sold_out(&self, product_id: ProductId) -> bool {
        self.sold_out.remove(&product_id).is_some()
    }

    /// How long ago the product was marked, `None` if it is not marked.
    #[must_use]
    pub fn marked_for(&self, product_id: ProductId) -> Option<Duration> {
        self.sold_out
            .get(&product_id)
            .map(|marked_at| marked_at.elapsed())
    }

    /// Snapshot of all marked products.
    ///
    /// The snapshot may be out of date as soon as it is returned.
    #[must_use]
    pub fn sold_out_products(&self) -> Vec<ProductId> {
        self.sold_out.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of marked products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sold_out.len()
    }

    /// Whether no product is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sold_out.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn mark_reports_first_insert_only() {
        let cache = LocalAdmissionCache::new();
        let id = ProductId::new(5);

        assert!(cache.mark_sold_out(id));
        assert!(!cache.mark_sold_out(id));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_reports_removal() {
        let cache = LocalAdmissionCache::new();
        let id = ProductId::new(5);

        assert!(!cache.clear_sold_out(id));
        cache.mark_sold_out(id);
        assert!(cache.clear_sold_out(id));
        assert!(cache.is_empty());
        assert_eq!(cache.marked_for(id), None);
    }

    #[test]
    fn entries_are_per_product() {
        let cache = LocalAdmissionCache::new();
        cache.mark_sold_out(ProductId::new(1));

        assert!(cache.is_known_sold_out(ProductId::new(1)));
        assert!(!cache.is_known_sold_out(ProductId::new(2)));

        let mut products = cache.sold_out_products();
        products.sort();
        assert_eq!(products, vec![ProductId::new(1)]);
    }

    #[test]
    fn concurrent_marks_and_clears() {
        let cache = Arc::new(LocalAdmissionCache::new());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..1_000_i64 {
                        let id = ProductId::new(i % 16);
                        if worker % 2 == 0 {
                            cache.mark_sold_out(id);
                        } else {
                            cache.clear_sold_out(id);
                        }
                        let _ = cache.is_known_sold_out(id);
                    }
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().is_ok());
        }
        assert!(cache.len() <= 16);
    }
}
