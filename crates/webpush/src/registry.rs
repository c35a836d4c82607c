//! Subscription registry: subscription id → receiver-side record.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::subscription::SubscriptionRecord;

/// Storage for subscription records, keyed by subscription id.
///
/// Implementations must be safe to share across tasks; readers may run
/// concurrently with each other.
pub trait SubscriptionStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Arc<SubscriptionRecord>>;

    /// Insert or replace the record stored under its subscription id.
    fn put(&self, record: SubscriptionRecord);

    fn remove(&self, id: &str) -> Option<Arc<SubscriptionRecord>>;
}

/// In-memory store behind a single-writer, many-reader lock.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    records: RwLock<HashMap<String, Arc<SubscriptionRecord>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl SubscriptionStore for InMemorySubscriptionStore {
    fn get(&self, id: &str) -> Option<Arc<SubscriptionRecord>> {
        self.records.read().get(id).cloned()
    }

    fn put(&self, record: SubscriptionRecord) {
        let id = record.subscription.id.clone();
        self.records.write().insert(id, Arc::new(record));
    }

    fn remove(&self, id: &str) -> Option<Arc<SubscriptionRecord>> {
        self.records.write().remove(id)
    }
}
