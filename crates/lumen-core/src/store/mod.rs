// ── Bound accessory store ──

mod collection;

use std::sync::Arc;

use tokio::sync::watch;

use crate::capability::BoundAccessory;
use crate::model::RecordId;

use collection::EntityCollection;

/// Reactive store of bound accessories, keyed by record id.
pub struct AccessoryStore {
    accessories: EntityCollection<BoundAccessory>,
}

impl AccessoryStore {
    pub fn new() -> Self {
        Self {
            accessories: EntityCollection::new(),
        }
    }

    /// Bind (or rebind) an accessory. Returns `true` if it was not bound.
    pub fn bind(&self, accessory: BoundAccessory) -> bool {
        self.accessories.upsert(accessory.record_id, accessory)
    }

    pub fn unbind(&self, id: &RecordId) -> Option<Arc<BoundAccessory>> {
        self.accessories.remove(id)
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<BoundAccessory>>> {
        self.accessories.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<BoundAccessory>>>> {
        self.accessories.subscribe()
    }
}

impl Default for AccessoryStore {
    fn default() -> Self {
        Self::new()
    }
}
