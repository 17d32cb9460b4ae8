//! Persistence for dialog instance data.
//!
//! The store owns every instance's [`DialogData`]. Callers always receive a
//! copy; changes become visible only through [`InstanceStore::set_dialog_data`].

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{DialogData, DialogError, DialogInstance, Result};

#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Allocate a fresh instance of `name` holding `data`.
    async fn new_instance(&self, name: &str, data: Option<DialogData>) -> Result<DialogInstance>;

    /// Copy of the stored data. `None` means the instance exists but was
    /// explicitly cleared.
    async fn get_dialog_data(&self, instance: &DialogInstance) -> Result<Option<DialogData>>;

    /// Overwrite the stored data wholesale.
    async fn set_dialog_data(
        &self,
        instance: &DialogInstance,
        data: Option<DialogData>,
    ) -> Result<()>;

    /// Forget the instance. Deleting an unknown instance is a no-op.
    async fn delete_instance(&self, instance: &DialogInstance) -> Result<()>;
}

#[derive(Debug, Default)]
struct NameSlot {
    next_id: u64,
    entries: HashMap<String, Option<DialogData>>,
}

/// Volatile in-process store. Instance ids are a per-name counter and are
/// never reused, even after deletion.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, NameSlot>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live instances across all dialog names.
    pub async fn len(&self) -> usize {
        self.slots
            .read()
            .await
            .values()
            .map(|slot| slot.entries.len())
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl InstanceStore for MemoryStore {
    async fn new_instance(&self, name: &str, data: Option<DialogData>) -> Result<DialogInstance> {
        let mut slots = self.slots.write().await;
        let slot = slots.entry(name.to_string()).or_default();
        let id = slot.next_id.to_string();
        slot.next_id += 1;
        slot.entries.insert(id.clone(), data);
        drop(slots);

        debug!("Created dialog instance {name}#{id}");
        Ok(DialogInstance::new(name, id))
    }

    async fn get_dialog_data(&self, instance: &DialogInstance) -> Result<Option<DialogData>> {
        self.slots
            .read()
            .await
            .get(&instance.name)
            .and_then(|slot| slot.entries.get(&instance.instance))
            .cloned()
            .ok_or_else(|| DialogError::InstanceNotFound(instance.clone()))
    }

    async fn set_dialog_data(
        &self,
        instance: &DialogInstance,
        data: Option<DialogData>,
    ) -> Result<()> {
        let mut slots = self.slots.write().await;
        let entry = slots
            .get_mut(&instance.name)
            .and_then(|slot| slot.entries.get_mut(&instance.instance))
            .ok_or_else(|| DialogError::InstanceNotFound(instance.clone()))?;
        *entry = data;
        Ok(())
    }

    async fn delete_instance(&self, instance: &DialogInstance) -> Result<()> {
        let mut slots = self.slots.write().await;
        let removed = slots
            .get_mut(&instance.name)
            .and_then(|slot| slot.entries.remove(&instance.instance));
        if removed.is_some() {
            debug!("Deleted dialog instance {instance}");
        }
        Ok(())
    }
}
