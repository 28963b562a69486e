//! Registry of regions hosted by this process.
//!
//! The registry is an explicitly owned object handed to the routers at
//! construction, never a process-wide singleton. It maps region ids to the
//! hosted instance's [`SceneHandle`].
//!
//! # Concurrency
//!
//! * Backed by a sharded `DashMap`, so lookups for unrelated regions do not
//!   contend with a region starting or stopping
//! * Insertion goes through the entry API, so a double registration can never
//!   overwrite the existing handle
//! * Lookups hand out a cloned `Arc`; no shard lock is ever held while a
//!   hosted instance is being called. A region removed mid-operation simply
//!   resolves to "not found" for later lookups

use crate::error::RegistryError;
use crate::scene::SceneHandle;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use grid_types::RegionId;
use std::sync::Arc;

/// Locally hosted regions, keyed by region id.
#[derive(Default)]
pub struct LocalRegistry {
    scenes: DashMap<RegionId, Arc<dyn SceneHandle>>,
}

impl std::fmt::Debug for LocalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRegistry")
            .field("regions", &self.region_ids())
            .finish()
    }
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hosted region.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::UnassignedRegion`] if `region_id` is zero
    /// * [`RegistryError::AlreadyRegistered`] if the region is already hosted;
    ///   the existing handle is kept
    pub fn register(
        &self,
        region_id: RegionId,
        scene: Arc<dyn SceneHandle>,
    ) -> Result<(), RegistryError> {
        if region_id.is_zero() {
            return Err(RegistryError::UnassignedRegion);
        }
        match self.scenes.entry(region_id) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(region_id)),
            Entry::Vacant(slot) => {
                slot.insert(scene);
                Ok(())
            }
        }
    }

    /// Removes a hosted region and returns its handle.
    pub fn unregister(&self, region_id: RegionId) -> Result<Arc<dyn SceneHandle>, RegistryError> {
        self.scenes
            .remove(&region_id)
            .map(|(_, scene)| scene)
            .ok_or(RegistryError::NotRegistered(region_id))
    }

    pub fn get(&self, region_id: RegionId) -> Option<Arc<dyn SceneHandle>> {
        self.scenes.get(&region_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, region_id: RegionId) -> bool {
        self.scenes.contains_key(&region_id)
    }

    /// Point-in-time copy of every hosted region's handle.
    pub fn scenes(&self) -> Vec<Arc<dyn SceneHandle>> {
        self.scenes.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn region_ids(&self) -> Vec<RegionId> {
        self.scenes.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
