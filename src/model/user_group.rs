use serde::{Deserialize, Serialize};

use crate::logic::validate::{require_non_blank, FieldError};
use crate::model::common::{same_identity, Entity, EntityRef, Id};

/// A named group, owned by at most one [`AppUser`](crate::model::AppUser).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGroup {
    #[serde(default)]
    pub id: Option<Id>,

    #[serde(default)]
    pub name: String,

    /// Back-reference to the owning user, by identifier only
    #[serde(default)]
    pub app_user: Option<EntityRef>,
}

impl UserGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            app_user: None,
        }
    }

    pub fn with_id(id: Id, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            ..Self::new(name)
        }
    }

    /// Identifier of the owning user, if the group is owned by an identified user.
    pub fn owner_id(&self) -> Option<Id> {
        self.app_user.and_then(|owner| owner.id)
    }

    pub(crate) fn summary(&self) -> UserGroupSummary {
        UserGroupSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

impl PartialEq for UserGroup {
    fn eq(&self, other: &Self) -> bool {
        same_identity(self, other, self.id, other.id)
    }
}

/// Group as embedded inside its owner's document; the owner is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct UserGroupSummary {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub name: String,
}

impl From<UserGroupSummary> for UserGroup {
    fn from(summary: UserGroupSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            app_user: None,
        }
    }
}

/// Partial update for a group; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGroupUpdate {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Entity for UserGroup {
    type Update = UserGroupUpdate;

    const ENTITY_NAME: &'static str = "userGroup";
    const COLLECTION: &'static str = "user_group";
    const RESOURCE_PATH: &'static str = "/api/user-groups";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }

    fn update_id(update: &UserGroupUpdate) -> Option<Id> {
        update.id
    }

    fn apply_update(&mut self, update: UserGroupUpdate) {
        if let Some(name) = update.name.filter(|n| !n.is_empty()) {
            self.name = name;
        }
    }

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        require_non_blank(&mut errors, "name", &self.name);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_by_identifier() {
        let group1 = UserGroup::with_id(1, "admins");
        let mut group2 = UserGroup::new("other");
        assert_ne!(group1, group2);

        group2.id = group1.id;
        assert_eq!(group1, group2);

        let group3 = UserGroup::with_id(2, "admins");
        assert_ne!(group1, group3);
    }

    #[test]
    fn test_unidentified_group_equals_only_itself() {
        let group = UserGroup::new("a");
        let same = &group;
        assert_eq!(&group, same);
        assert_ne!(group, group.clone());
    }

    #[test]
    fn test_partial_update_keeps_absent_name() {
        let mut stored = UserGroup::with_id(1, "A");
        stored.apply_update(UserGroupUpdate {
            id: Some(1),
            name: None,
        });
        assert_eq!(stored.name, "A");
        assert_eq!(stored.id, Some(1));

        stored.apply_update(UserGroupUpdate {
            id: Some(1),
            name: Some("B".to_string()),
        });
        assert_eq!(stored.name, "B");
    }

    #[test]
    fn test_partial_update_ignores_empty_name() {
        let mut stored = UserGroup::with_id(1, "A");
        stored.apply_update(UserGroupUpdate {
            id: Some(1),
            name: Some(String::new()),
        });
        assert_eq!(stored.name, "A");
    }

    #[test]
    fn test_partial_update_keeps_owner() {
        let mut stored = UserGroup::with_id(1, "A");
        stored.app_user = Some(EntityRef::new(Some(9)));
        stored.apply_update(UserGroupUpdate {
            id: Some(1),
            name: Some("B".to_string()),
        });
        assert_eq!(stored.owner_id(), Some(9));
    }

    #[test]
    fn test_owner_serialized_as_reference() {
        let mut group = UserGroup::with_id(3, "ops");
        group.app_user = Some(EntityRef::new(Some(7)));
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 3, "name": "ops", "appUser": {"id": 7}})
        );
    }

    #[test]
    fn test_missing_name_fails_validation() {
        let group: UserGroup = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        let errors = group.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");
    }
}
