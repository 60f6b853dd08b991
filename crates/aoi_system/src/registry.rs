//! Keyed entity registry.
//!
//! Stores shared entity handles bucketed by [`EntityKind`] and then by
//! [`EntityId`]. The kind is checked against the id prefix on every mutation,
//! so [`EntityRegistry::get`] can find any entity from its id alone.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entity::AoiEntity;
use crate::error::RegistryError;
use crate::types::{EntityId, EntityKind};

/// Pool of entity handles keyed by type, then by id.
pub struct EntityRegistry<E> {
    pools: HashMap<EntityKind, HashMap<EntityId, Arc<E>>>,
}

impl<E: AoiEntity> EntityRegistry<E> {
    pub fn new() -> Self {
        Self {
            pools: HashMap::new(),
        }
    }

    /// Validates that the entity's id is usable and agrees with its kind.
    pub fn validate(entity: &E) -> Result<EntityKind, RegistryError> {
        let id = entity.id();
        if id.as_str().is_empty() {
            return Err(RegistryError::MissingId);
        }
        let resolved = id
            .kind()
            .ok_or_else(|| RegistryError::MissingKind(id.to_string()))?;
        let declared = entity.kind();
        if declared != resolved {
            return Err(RegistryError::KindMismatch {
                id: id.clone(),
                declared,
                resolved,
            });
        }
        Ok(resolved)
    }

    /// Inserts or replaces an entity. Returns `true` if it was not present.
    pub fn add(&mut self, entity: Arc<E>) -> Result<bool, RegistryError> {
        let kind = Self::validate(&entity)?;
        let id = entity.id().clone();
        let previous = self.pools.entry(kind).or_default().insert(id, entity);
        Ok(previous.is_none())
    }

    /// Removes an entity. Returns `true` if it was present.
    pub fn remove(&mut self, entity: &E) -> Result<bool, RegistryError> {
        let kind = Self::validate(entity)?;
        let Some(pool) = self.pools.get_mut(&kind) else {
            return Ok(false);
        };
        let removed = pool.remove(entity.id()).is_some();
        if pool.is_empty() {
            self.pools.remove(&kind);
        }
        Ok(removed)
    }

    pub fn contains(&self, entity: &E) -> bool {
        self.contains_id(entity.id())
    }

    pub fn contains_id(&self, id: &EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Looks an entity up by id, resolving its kind from the id prefix.
    pub fn get(&self, id: &EntityId) -> Option<&Arc<E>> {
        let kind = id.kind()?;
        self.pools.get(&kind)?.get(id)
    }

    /// Iterates every registered entity.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<E>> + '_ {
        self.pools.values().flat_map(|pool| pool.values())
    }

    /// Iterates the entities of the given kinds only.
    pub fn iter_kinds<'a>(
        &'a self,
        kinds: &'a [EntityKind],
    ) -> impl Iterator<Item = &'a Arc<E>> + 'a {
        kinds
            .iter()
            .filter_map(|kind| self.pools.get(kind))
            .flat_map(|pool| pool.values())
    }

    pub fn kinds(&self) -> impl Iterator<Item = &EntityKind> + '_ {
        self.pools.keys()
    }

    pub fn len(&self) -> usize {
        self.pools.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn clear(&mut self) {
        self.pools.clear();
    }

    /// Drops every entity of the given kinds.
    pub fn clear_kinds(&mut self, kinds: &[EntityKind]) {
        for kind in kinds {
            self.pools.remove(kind);
        }
    }
}

impl<E: AoiEntity> Default for EntityRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
