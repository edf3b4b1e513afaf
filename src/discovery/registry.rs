use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::entity::EntityDescriptor;

/// Name-keyed store of entity descriptors, in registration order
///
/// Cloning shares the underlying store. Entries are only inserted or
/// overwritten, never removed. Readers take a [`snapshot`](Self::snapshot)
/// so a registration racing with a reconnect cannot tear an iteration.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entries: Arc<RwLock<Vec<EntityDescriptor>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<EntityDescriptor>) -> Self {
        let mut deduped: Vec<EntityDescriptor> = Vec::with_capacity(entries.len());
        for entry in entries {
            match deduped.iter_mut().find(|e| e.name == entry.name) {
                Some(existing) => *existing = entry,
                None => deduped.push(entry),
            }
        }
        Self {
            entries: Arc::new(RwLock::new(deduped)),
        }
    }

    /// Inserts or overwrites by name, returning the replaced descriptor
    pub async fn insert(&self, descriptor: EntityDescriptor) -> Option<EntityDescriptor> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.name == descriptor.name) {
            Some(existing) => {
                debug!("Overwriting entity {}", descriptor.name);
                Some(std::mem::replace(existing, descriptor))
            }
            None => {
                debug!("Registering entity {}", descriptor.name);
                entries.push(descriptor);
                None
            }
        }
    }

    pub async fn get(&self, name: &str) -> Option<EntityDescriptor> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.name == name)
            .cloned()
    }

    pub async fn snapshot(&self) -> Vec<EntityDescriptor> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
