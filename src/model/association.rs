//! Association (graph edge)

use super::{unassigned_id, ChildTopicsModel, RoleModel, UNASSIGNED_ID};
use crate::value_objects::SimpleValue;
use serde::{Deserialize, Serialize};

/// A typed, addressable edge between exactly two roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationModel {
    #[serde(default = "unassigned_id")]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default)]
    pub type_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<SimpleValue>,
    #[serde(default, skip_serializing_if = "ChildTopicsModel::is_empty")]
    pub children: ChildTopicsModel,
    pub role_1: RoleModel,
    pub role_2: RoleModel,
}

impl_object_model!(AssociationModel);

impl AssociationModel {
    pub fn new(type_uri: impl Into<String>, role_1: RoleModel, role_2: RoleModel) -> Self {
        Self {
            id: UNASSIGNED_ID,
            uri: None,
            type_uri: type_uri.into(),
            value: None,
            children: ChildTopicsModel::default(),
            role_1,
            role_2,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<SimpleValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn roles(&self) -> [&RoleModel; 2] {
        [&self.role_1, &self.role_2]
    }

    /// A type URI has been assigned
    pub fn is_initialized(&self) -> bool {
        !self.type_uri.is_empty()
    }

    /// The role played by the given object id, if any
    pub fn role_of(&self, player_id: i64) -> Option<&RoleModel> {
        self.roles()
            .into_iter()
            .find(|role| role.player_id() == Some(player_id))
    }

    /// The role opposite to the one played by `player_id`
    pub fn other_role(&self, player_id: i64) -> Option<&RoleModel> {
        if self.role_1.player_id() == Some(player_id) {
            Some(&self.role_2)
        } else if self.role_2.player_id() == Some(player_id) {
            Some(&self.role_1)
        } else {
            None
        }
    }

    /// The first role with the given role type
    pub fn role_by_type(&self, role_type_uri: &str) -> Option<&RoleModel> {
        self.roles()
            .into_iter()
            .find(|role| role.role_type_uri() == role_type_uri)
    }

    pub fn has_player(&self, player_id: i64) -> bool {
        self.role_of(player_id).is_some()
    }

    /// The model without its composite value, as storage keeps it
    pub fn without_children(&self) -> Self {
        Self {
            children: ChildTopicsModel::default(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::uris;

    fn parent_child(parent: i64, child: i64) -> AssociationModel {
        AssociationModel::new(
            uris::COMPOSITION,
            RoleModel::topic_id(parent, uris::PARENT).unwrap(),
            RoleModel::topic_id(child, uris::CHILD).unwrap(),
        )
    }

    #[test]
    fn test_role_lookup() {
        let assoc = parent_child(1, 2);
        assert_eq!(assoc.role_of(1).unwrap().role_type_uri(), uris::PARENT);
        assert_eq!(assoc.other_role(1).unwrap().player_id(), Some(2));
        assert_eq!(assoc.other_role(2).unwrap().player_id(), Some(1));
        assert!(assoc.other_role(3).is_none());
        assert_eq!(assoc.role_by_type(uris::CHILD).unwrap().player_id(), Some(2));
        assert!(assoc.has_player(2));
        assert!(!assoc.has_player(7));
    }

    #[test]
    fn test_every_association_has_two_roles() {
        let assoc = parent_child(1, 2);
        assert_eq!(assoc.roles().len(), 2);
        assert!(assoc.is_initialized());
        assert_eq!(assoc.id, UNASSIGNED_ID);
    }

    #[test]
    fn test_wire_form() {
        let assoc = AssociationModel::new(
            uris::AGGREGATION,
            RoleModel::topic_uri("test.alice", uris::PARENT).unwrap(),
            RoleModel::association(4, uris::CHILD).unwrap(),
        )
        .with_value("note");
        let json = serde_json::to_value(&assoc).unwrap();
        assert_eq!(json["role_1"]["topic_uri"], "test.alice");
        assert_eq!(json["role_2"]["assoc_id"], 4);
        assert_eq!(json["value"], "note");

        let back: AssociationModel = serde_json::from_value(json).unwrap();
        assert_eq!(back, assoc);
    }
}
