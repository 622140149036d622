use crate::model::{AppUser, Entity, Id, UserGroup};
use anyhow::Result;

/// Persistence operations for one record type, keyed by identifier.
#[async_trait::async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Persist a new record; the store assigns its identifier.
    async fn insert(&self, entity: E) -> Result<E>;
    /// Overwrite the record with the entity's identifier.
    async fn save(&self, entity: E) -> Result<E>;
    async fn find_by_id(&self, id: Id) -> Result<Option<E>>;
    /// All records, ordered by identifier
    async fn find_all(&self) -> Result<Vec<E>>;
    async fn exists_by_id(&self, id: Id) -> Result<bool>;
    /// Returns whether a record was removed; absent ids are not an error.
    async fn delete_by_id(&self, id: Id) -> Result<bool>;
    async fn count(&self) -> Result<u64>;
}

pub trait Store: Repository<AppUser> + Repository<UserGroup> + Send + Sync {}

/// Resolves the user-group references a record of type `E` holds.
#[async_trait::async_trait]
pub trait GroupLinks<E: Entity>: Send + Sync {
    /// Replaces the referenced groups with their stored records and returns
    /// the referenced ids that have no record.
    async fn load_groups(&self, entity: &mut E) -> Result<Vec<Id>>;
}

#[async_trait::async_trait]
impl<S, E> GroupLinks<E> for S
where
    S: Repository<UserGroup>,
    E: Entity,
{
    async fn load_groups(&self, entity: &mut E) -> Result<Vec<Id>> {
        let mut groups = Vec::new();
        let mut missing = Vec::new();
        for id in entity.group_ids() {
            match self.find_by_id(id).await? {
                Some(group) => groups.push(group),
                None => missing.push(id),
            }
        }
        entity.attach_groups(groups);
        Ok(missing)
    }
}
