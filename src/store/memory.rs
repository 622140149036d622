use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::model::{AppUser, Entity, Id, UserGroup};
use crate::store::traits::{Repository, Store};

/// Records of one type plus the sequence used to assign identifiers
#[derive(Debug)]
pub struct Collection<E> {
    records: BTreeMap<Id, E>,
    next_id: Id,
}

impl<E> Default for Collection<E> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 1,
        }
    }
}

/// In-process store. Each collection sits behind its own lock; no lock is
/// held across an await point.
#[derive(Debug, Default)]
pub struct MemoryStore {
    app_users: RwLock<Collection<AppUser>>,
    user_groups: RwLock<Collection<UserGroup>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Selects the collection that holds records of type `E`.
pub trait HasCollection<E> {
    fn collection(&self) -> &RwLock<Collection<E>>;
}

impl HasCollection<AppUser> for MemoryStore {
    fn collection(&self) -> &RwLock<Collection<AppUser>> {
        &self.app_users
    }
}

impl HasCollection<UserGroup> for MemoryStore {
    fn collection(&self) -> &RwLock<Collection<UserGroup>> {
        &self.user_groups
    }
}

#[async_trait::async_trait]
impl<E> Repository<E> for MemoryStore
where
    E: Entity,
    MemoryStore: HasCollection<E>,
{
    async fn insert(&self, mut entity: E) -> Result<E> {
        let mut collection = <Self as HasCollection<E>>::collection(self).write();
        let id = collection.next_id;
        collection.next_id += 1;
        entity.set_id(id);
        collection.records.insert(id, entity.clone());
        Ok(entity)
    }

    async fn save(&self, entity: E) -> Result<E> {
        let id = entity
            .id()
            .ok_or_else(|| anyhow!("Cannot save {} without an id", E::ENTITY_NAME))?;
        let mut collection = <Self as HasCollection<E>>::collection(self).write();
        if id >= collection.next_id {
            collection.next_id = id + 1;
        }
        collection.records.insert(id, entity.clone());
        Ok(entity)
    }

    async fn find_by_id(&self, id: Id) -> Result<Option<E>> {
        Ok(<Self as HasCollection<E>>::collection(self).read().records.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<E>> {
        Ok(<Self as HasCollection<E>>::collection(self).read().records.values().cloned().collect())
    }

    async fn exists_by_id(&self, id: Id) -> Result<bool> {
        Ok(<Self as HasCollection<E>>::collection(self).read().records.contains_key(&id))
    }

    async fn delete_by_id(&self, id: Id) -> Result<bool> {
        Ok(<Self as HasCollection<E>>::collection(self).write().records.remove(&id).is_some())
    }

    async fn count(&self) -> Result<u64> {
        Ok(<Self as HasCollection<E>>::collection(self).read().records.len() as u64)
    }
}

impl Store for MemoryStore {}
