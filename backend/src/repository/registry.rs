//! Repository registry: one shared instance per entity type.
//!
//! The registry replaces the ambient singleton cache of the source system
//! with an explicitly constructed object owned by the composition root.
//! Repositories are stateless, so caching is purely about sharing: repeated
//! lookups return the same `Arc`, and clearing the cache only forces a
//! harmless reconstruction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use mockable::Clock;

use crate::domain::ports::OperationLog;
use crate::domain::EntityName;

use super::{EntityRepository, RepositoryError};

/// Lazy per-entity cache of [`EntityRepository`] instances.
pub struct RepositoryRegistry {
    log: Arc<dyn OperationLog>,
    clock: Arc<dyn Clock>,
    cache: Mutex<HashMap<EntityName, Arc<EntityRepository>>>,
}

impl RepositoryRegistry {
    /// Build an empty registry with the collaborators every repository will
    /// share.
    #[must_use]
    pub fn new(log: Arc<dyn OperationLog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            log,
            clock,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a repository by entity name.
    ///
    /// Fails with a validation error when the name is blank or unknown.
    /// Repeated calls with the same name return reference-identical
    /// instances.
    pub fn repository(&self, name: &str) -> Result<Arc<EntityRepository>, RepositoryError> {
        let entity: EntityName = name.parse().map_err(|err: crate::domain::EntityNameError| {
            RepositoryError::Validation {
                field: "entity".to_owned(),
                message: err.to_string(),
            }
        })?;
        Ok(self.repository_for(entity))
    }

    /// Resolve a repository for an already-parsed entity name, constructing
    /// and caching it on first access.
    #[must_use]
    pub fn repository_for(&self, entity: EntityName) -> Arc<EntityRepository> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .entry(entity)
            .or_insert_with(|| {
                Arc::new(EntityRepository::new(
                    entity,
                    Arc::clone(&self.log),
                    Arc::clone(&self.clock),
                ))
            })
            .clone()
    }

    /// Evict one cached entry, or all entries when `entity` is `None`.
    ///
    /// Intended for test isolation only: repositories are stateless, so
    /// eviction never affects correctness, it just forces reconstruction.
    pub fn clear(&self, entity: Option<EntityName>) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        match entity {
            Some(entity) => {
                cache.remove(&entity);
            }
            None => cache.clear(),
        }
    }

    /// Number of repositories currently cached.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
