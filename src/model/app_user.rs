use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::logic::validate::{require_non_blank, FieldError};
use crate::model::common::{same_identity, Entity, EntityRef, Id};
use crate::model::user_group::UserGroup;

/// An application user and the groups it owns.
///
/// The user owns its group set. Each member group points back at the user
/// through [`UserGroup::app_user`], which holds only the user's identifier.
/// The relationship methods below keep both sides consistent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUser {
    #[serde(default)]
    pub id: Option<Id>,

    #[serde(default)]
    pub external_user_id: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub registered_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_login_date: Option<DateTime<Utc>>,

    #[serde(default, with = "embedded_groups")]
    user_groups: Vec<UserGroup>,
}

impl AppUser {
    pub fn new(
        external_user_id: impl Into<String>,
        username: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            external_user_id: external_user_id.into(),
            username: username.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            registered_date: None,
            last_login_date: None,
            user_groups: Vec::new(),
        }
    }

    pub fn user_groups(&self) -> &[UserGroup] {
        &self.user_groups
    }

    pub fn contains_user_group(&self, group: &UserGroup) -> bool {
        self.user_groups.iter().any(|member| member == group)
    }

    fn owner_ref(&self) -> EntityRef {
        EntityRef::new(self.id)
    }

    fn points_to_self(&self, group: &UserGroup) -> bool {
        group.app_user == Some(self.owner_ref())
    }

    /// Adds a group and makes this user its owner. Adding a group that is
    /// already a member (same identifier) leaves the set unchanged.
    pub fn add_user_group(&mut self, mut group: UserGroup) -> &mut Self {
        if self.contains_user_group(&group) {
            return self;
        }
        group.app_user = Some(self.owner_ref());
        self.user_groups.push(group);
        self
    }

    /// Removes a group from the set and returns it detached from this user.
    /// Returns `None` when the group is not a member.
    pub fn remove_user_group(&mut self, group: &UserGroup) -> Option<UserGroup> {
        let position = self
            .user_groups
            .iter()
            .position(|member| member == group)?;
        let mut removed = self.user_groups.remove(position);
        if self.points_to_self(&removed) {
            removed.app_user = None;
        }
        Some(removed)
    }

    /// Replaces the whole group set. Previously held groups are detached and
    /// returned; the new groups are deduplicated by identifier and owned by this user.
    pub fn set_user_groups(&mut self, groups: impl IntoIterator<Item = UserGroup>) -> Vec<UserGroup> {
        let mut released = std::mem::take(&mut self.user_groups);
        for group in &mut released {
            group.app_user = None;
        }

        let owner = self.owner_ref();
        self.user_groups = groups
            .into_iter()
            .enumerate()
            // unidentified groups are keyed by position so they never collapse
            .unique_by(|(position, group)| group.id.ok_or(*position))
            .map(|(_, mut group)| {
                group.app_user = Some(owner);
                group
            })
            .collect();

        released
    }

    /// Points every member's back-reference at this user.
    pub fn link_user_groups(&mut self) {
        let owner = self.owner_ref();
        for group in &mut self.user_groups {
            group.app_user = Some(owner);
        }
    }
}

impl PartialEq for AppUser {
    fn eq(&self, other: &Self) -> bool {
        same_identity(self, other, self.id, other.id)
    }
}

/// Partial update for a user; absent or empty fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUserUpdate {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_date: Option<DateTime<Utc>>,
}

fn overwrite_if_present(target: &mut String, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        *target = value;
    }
}

impl Entity for AppUser {
    type Update = AppUserUpdate;

    const ENTITY_NAME: &'static str = "appUser";
    const COLLECTION: &'static str = "app_user";
    const RESOURCE_PATH: &'static str = "/api/app-users";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
        self.link_user_groups();
    }

    fn update_id(update: &AppUserUpdate) -> Option<Id> {
        update.id
    }

    fn apply_update(&mut self, update: AppUserUpdate) {
        overwrite_if_present(&mut self.external_user_id, update.external_user_id);
        overwrite_if_present(&mut self.username, update.username);
        overwrite_if_present(&mut self.first_name, update.first_name);
        overwrite_if_present(&mut self.last_name, update.last_name);
        overwrite_if_present(&mut self.email, update.email);
        if let Some(registered_date) = update.registered_date {
            self.registered_date = Some(registered_date);
        }
        if let Some(last_login_date) = update.last_login_date {
            self.last_login_date = Some(last_login_date);
        }
    }

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        require_non_blank(&mut errors, "externalUserId", &self.external_user_id);
        require_non_blank(&mut errors, "username", &self.username);
        require_non_blank(&mut errors, "firstName", &self.first_name);
        require_non_blank(&mut errors, "lastName", &self.last_name);
        require_non_blank(&mut errors, "email", &self.email);
        if self.user_groups.iter().any(|group| group.id.is_none()) {
            errors.push(FieldError::new("userGroups", "must reference a stored user group"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn normalize(&mut self) {
        let groups = std::mem::take(&mut self.user_groups);
        self.set_user_groups(groups);
    }

    fn group_ids(&self) -> Vec<Id> {
        self.user_groups.iter().filter_map(|group| group.id).collect()
    }

    fn attach_groups(&mut self, groups: Vec<UserGroup>) {
        self.set_user_groups(groups);
    }
}

/// Member groups are embedded without their back-reference. Only the ids are
/// authoritative; names are reloaded from the group collection on every read.
mod embedded_groups {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::model::user_group::{UserGroup, UserGroupSummary};

    pub fn serialize<S: Serializer>(groups: &[UserGroup], serializer: S) -> Result<S::Ok, S::Error> {
        let summaries: Vec<UserGroupSummary> = groups.iter().map(UserGroup::summary).collect();
        summaries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<UserGroup>, D::Error> {
        let summaries = Option::<Vec<UserGroupSummary>>::deserialize(deserializer)?;
        Ok(summaries
            .unwrap_or_default()
            .into_iter()
            .map(UserGroup::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(id: Id) -> AppUser {
        let mut user = AppUser::new(
            format!("externalUserId{}", id),
            format!("username{}", id),
            format!("firstName{}", id),
            format!("lastName{}", id),
            format!("email{}", id),
        );
        user.id = Some(id);
        user
    }

    #[test]
    fn test_equality_by_identifier() {
        let user1 = sample_user(1);
        let mut user2 = AppUser::default();
        assert_ne!(user1, user2);

        user2.id = user1.id;
        assert_eq!(user1, user2);

        let user3 = sample_user(2);
        assert_ne!(user1, user3);
    }

    #[test]
    fn test_add_then_remove_group_clears_owner() {
        let mut user = sample_user(10);
        let group = UserGroup::with_id(20, "ops");

        user.add_user_group(group.clone());
        assert_eq!(user.user_groups().len(), 1);
        assert!(user.contains_user_group(&group));
        assert_eq!(user.user_groups()[0].owner_id(), Some(10));

        let removed = user.remove_user_group(&group).expect("group was a member");
        assert!(!user.contains_user_group(&group));
        assert!(user.user_groups().is_empty());
        assert_eq!(removed.app_user, None);
    }

    #[test]
    fn test_duplicate_add_is_idempotent() {
        let mut user = sample_user(1);
        user.add_user_group(UserGroup::with_id(5, "first"));
        user.add_user_group(UserGroup::with_id(5, "second"));
        assert_eq!(user.user_groups().len(), 1);
        assert_eq!(user.user_groups()[0].name, "first");
    }

    #[test]
    fn test_remove_non_member_is_noop() {
        let mut user = sample_user(1);
        user.add_user_group(UserGroup::with_id(5, "member"));
        assert!(user.remove_user_group(&UserGroup::with_id(6, "stranger")).is_none());
        assert_eq!(user.user_groups().len(), 1);
    }

    #[test]
    fn test_replace_groups_moves_ownership() {
        let mut user = sample_user(1);
        let group = UserGroup::with_id(3, "g");

        let released = user.set_user_groups(vec![group.clone()]);
        assert!(released.is_empty());
        assert!(user.contains_user_group(&group));
        assert_eq!(user.user_groups()[0].owner_id(), Some(1));

        let released = user.set_user_groups(Vec::new());
        assert!(user.user_groups().is_empty());
        assert_eq!(released.len(), 1);
        assert_eq!(released[0], group);
        assert_eq!(released[0].app_user, None);
    }

    #[test]
    fn test_replace_groups_dedupes_by_identifier() {
        let mut user = sample_user(1);
        user.set_user_groups(vec![
            UserGroup::with_id(3, "a"),
            UserGroup::with_id(3, "b"),
            UserGroup::new("c"),
            UserGroup::new("d"),
        ]);
        assert_eq!(user.user_groups().len(), 3);
    }

    #[test]
    fn test_assigning_identifier_relinks_groups() {
        let mut user = AppUser::new("ext", "user", "first", "last", "mail");
        user.add_user_group(UserGroup::with_id(4, "g"));
        assert_eq!(user.user_groups()[0].owner_id(), None);

        user.set_id(42);
        assert_eq!(user.user_groups()[0].owner_id(), Some(42));
    }

    #[test]
    fn test_partial_update_merges_present_fields() {
        let mut stored = sample_user(1);
        stored.apply_update(AppUserUpdate {
            id: Some(1),
            username: Some("renamed".to_string()),
            email: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(stored.username, "renamed");
        assert_eq!(stored.email, "email1");
        assert_eq!(stored.first_name, "firstName1");
        assert_eq!(stored.registered_date, None);
    }

    #[test]
    fn test_partial_update_sets_dates() {
        let mut stored = sample_user(1);
        let login = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        stored.apply_update(AppUserUpdate {
            id: Some(1),
            last_login_date: Some(login),
            ..Default::default()
        });
        assert_eq!(stored.last_login_date, Some(login));
    }

    #[test]
    fn test_json_shape_embeds_groups_without_owner() {
        let mut user = sample_user(1);
        user.add_user_group(UserGroup::with_id(2, "g"));
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["externalUserId"], "externalUserId1");
        assert_eq!(json["userGroups"], serde_json::json!([{"id": 2, "name": "g"}]));
    }

    #[test]
    fn test_normalize_links_deserialized_groups() {
        let json = r#"{
            "id": 8,
            "externalUserId": "e",
            "username": "u",
            "firstName": "f",
            "lastName": "l",
            "email": "m",
            "userGroups": [{"id": 1, "name": "a"}, {"id": 1, "name": "a"}]
        }"#;
        let mut user: AppUser = serde_json::from_str(json).unwrap();
        user.normalize();
        assert_eq!(user.user_groups().len(), 1);
        assert_eq!(user.user_groups()[0].owner_id(), Some(8));
    }

    #[test]
    fn test_attach_groups_takes_stored_state() {
        let json = r#"{"id": 8, "userGroups": [{"id": 1}, {"id": 2}]}"#;
        let mut user: AppUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.group_ids(), vec![1, 2]);

        user.attach_groups(vec![UserGroup::with_id(2, "stored")]);
        assert_eq!(user.group_ids(), vec![2]);
        assert_eq!(user.user_groups()[0].name, "stored");
        assert_eq!(user.user_groups()[0].owner_id(), Some(8));
    }

    #[test]
    fn test_unidentified_member_group_fails_validation() {
        let mut user = sample_user(1);
        user.add_user_group(UserGroup::new("unsaved"));
        let errors = user.validate().unwrap_err();
        assert_eq!(errors, vec![FieldError::new("userGroups", "must reference a stored user group")]);
    }

    #[test]
    fn test_required_fields_reported_together() {
        let user = AppUser {
            id: None,
            username: "  ".to_string(),
            ..sample_user(1)
        };
        assert!(user.validate().is_err());

        let errors = AppUser::default().validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["externalUserId", "username", "firstName", "lastName", "email"]
        );
    }
}
