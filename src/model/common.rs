use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Debug;

use crate::logic::validate::FieldError;
use crate::model::user_group::UserGroup;

pub type Id = i64;

/// Non-owning reference to another record, serialized as `{"id": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
}

impl EntityRef {
    pub fn new(id: Option<Id>) -> Self {
        Self { id }
    }
}

/// Compares two records by identity: the same value, or both identified with the same id.
pub(crate) fn same_identity<T>(a: &T, b: &T, a_id: Option<Id>, b_id: Option<Id>) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    matches!((a_id, b_id), (Some(x), Some(y)) if x == y)
}

/// A persisted record type exposed through the REST layer.
pub trait Entity: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Partial-update model; every field optional.
    type Update: Debug + DeserializeOwned + Send + 'static;

    /// Tag used in error bodies and alert headers, e.g. `appUser`.
    const ENTITY_NAME: &'static str;
    /// Storage collection (table) name.
    const COLLECTION: &'static str;
    /// REST resource path, without trailing slash.
    const RESOURCE_PATH: &'static str;

    fn id(&self) -> Option<Id>;
    fn set_id(&mut self, id: Id);

    fn update_id(update: &Self::Update) -> Option<Id>;
    fn apply_update(&mut self, update: Self::Update);

    fn validate(&self) -> Result<(), Vec<FieldError>>;

    /// Restores in-memory invariants after a record is built from its stored document.
    fn normalize(&mut self) {}

    /// Ids of the user groups this record references, in order.
    fn group_ids(&self) -> Vec<Id> {
        Vec::new()
    }

    /// Replaces the referenced groups with their stored records.
    fn attach_groups(&mut self, _groups: Vec<UserGroup>) {}
}
