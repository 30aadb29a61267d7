//! Association definitions
//!
//! An assoc def is itself an association between the parent and the child
//! type topic, decorated with per-side cardinality and an optional custom
//! instance-level association type.

use crate::error::{CoreError, CoreResult};
use crate::model::{AssociationModel, RoleModel, ViewConfigurationModel};
use crate::value_objects::{uris, Cardinality};
use serde::{Deserialize, Serialize};

/// Whether child instances are owned or referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssocDefKind {
    /// The parent owns its children; they are deleted along with it
    Composition,
    /// The parent references shared children
    Aggregation,
}

impl AssocDefKind {
    /// Type URI of the defining association
    pub fn def_type_uri(&self) -> &'static str {
        match self {
            AssocDefKind::Composition => uris::COMPOSITION_DEF,
            AssocDefKind::Aggregation => uris::AGGREGATION_DEF,
        }
    }

    /// Default type URI of the instance-level associations
    pub fn instance_type_uri(&self) -> &'static str {
        match self {
            AssocDefKind::Composition => uris::COMPOSITION,
            AssocDefKind::Aggregation => uris::AGGREGATION,
        }
    }

    pub fn from_def_type_uri(uri: &str) -> CoreResult<Self> {
        match uri {
            uris::COMPOSITION_DEF => Ok(AssocDefKind::Composition),
            uris::AGGREGATION_DEF => Ok(AssocDefKind::Aggregation),
            other => Err(CoreError::InvalidState(format!(
                "\"{other}\" is not an association definition type"
            ))),
        }
    }
}

/// Schema rule relating a parent type's instances to a child type's instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationDefinitionModel {
    #[serde(flatten)]
    pub assoc: AssociationModel,
    pub parent_type_uri: String,
    pub child_type_uri: String,
    #[serde(rename = "parent_cardinality_uri")]
    pub parent_cardinality: Cardinality,
    #[serde(rename = "child_cardinality_uri")]
    pub child_cardinality: Cardinality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_assoc_type_uri: Option<String>,
    #[serde(default, skip_serializing_if = "ViewConfigurationModel::is_empty")]
    pub view_config: ViewConfigurationModel,
}

impl AssociationDefinitionModel {
    pub fn new(
        kind: AssocDefKind,
        parent_type_uri: impl Into<String>,
        child_type_uri: impl Into<String>,
        parent_cardinality: Cardinality,
        child_cardinality: Cardinality,
    ) -> CoreResult<Self> {
        let parent_type_uri = parent_type_uri.into();
        let child_type_uri = child_type_uri.into();
        if parent_type_uri.is_empty() || child_type_uri.is_empty() {
            return Err(CoreError::InvalidState(
                "association definition needs both a parent and a child type".to_string(),
            ));
        }
        let assoc = AssociationModel::new(
            kind.def_type_uri(),
            RoleModel::topic_uri(parent_type_uri.clone(), uris::PARENT_TYPE)?,
            RoleModel::topic_uri(child_type_uri.clone(), uris::CHILD_TYPE)?,
        );
        Ok(Self {
            assoc,
            parent_type_uri,
            child_type_uri,
            parent_cardinality,
            child_cardinality,
            custom_assoc_type_uri: None,
            view_config: ViewConfigurationModel::default(),
        })
    }

    /// An owning definition; a child belongs to exactly one parent
    pub fn composition(
        parent_type_uri: impl Into<String>,
        child_type_uri: impl Into<String>,
        child_cardinality: Cardinality,
    ) -> CoreResult<Self> {
        Self::new(
            AssocDefKind::Composition,
            parent_type_uri,
            child_type_uri,
            Cardinality::One,
            child_cardinality,
        )
    }

    /// A referencing definition; children may be shared between parents
    pub fn aggregation(
        parent_type_uri: impl Into<String>,
        child_type_uri: impl Into<String>,
        child_cardinality: Cardinality,
    ) -> CoreResult<Self> {
        Self::new(
            AssocDefKind::Aggregation,
            parent_type_uri,
            child_type_uri,
            Cardinality::Many,
            child_cardinality,
        )
    }

    pub fn with_custom_assoc_type(mut self, assoc_type_uri: impl Into<String>) -> Self {
        self.custom_assoc_type_uri = Some(assoc_type_uri.into());
        self
    }

    pub fn with_view_config(mut self, view_config: ViewConfigurationModel) -> Self {
        self.view_config = view_config;
        self
    }

    /// Identity key within the parent type
    pub fn assoc_def_uri(&self) -> String {
        match &self.custom_assoc_type_uri {
            Some(custom) => format!("{}#{}", self.child_type_uri, custom),
            None => self.child_type_uri.clone(),
        }
    }

    /// Composition or aggregation, from the defining association's type
    pub fn kind(&self) -> CoreResult<AssocDefKind> {
        AssocDefKind::from_def_type_uri(&self.assoc.type_uri)
    }

    /// Only a well-formed composition definition owns its children
    pub fn is_composition(&self) -> bool {
        matches!(self.kind(), Ok(AssocDefKind::Composition))
    }

    /// Type URI of the associations that relate parent and child instances
    pub fn instance_level_assoc_type_uri(&self) -> CoreResult<&str> {
        match &self.custom_assoc_type_uri {
            Some(custom) => Ok(custom.as_str()),
            None => Ok(self.kind()?.instance_type_uri()),
        }
    }

    /// Whether an instance-level association of this type relates a child of this definition
    pub fn matches_instance(&self, child_type_uri: &str, assoc_type_uri: &str) -> bool {
        self.child_type_uri == child_type_uri
            && self
                .instance_level_assoc_type_uri()
                .is_ok_and(|uri| uri == assoc_type_uri)
    }

    pub(crate) fn validate(&self) -> CoreResult<()> {
        AssocDefKind::from_def_type_uri(&self.assoc.type_uri)?;
        if self.parent_type_uri.is_empty() || self.child_type_uri.is_empty() {
            return Err(CoreError::InvalidState(format!(
                "association definition \"{}\" lacks a parent or child type",
                self.assoc_def_uri()
            )));
        }
        Ok(())
    }

    /// Replace every reference to a renamed type; returns whether anything changed
    pub(crate) fn rename_type(&mut self, old_uri: &str, new_uri: &str) -> bool {
        let mut changed = false;
        for uri in [&mut self.parent_type_uri, &mut self.child_type_uri] {
            if *uri == old_uri {
                *uri = new_uri.to_string();
                changed = true;
            }
        }
        if self.custom_assoc_type_uri.as_deref() == Some(old_uri) {
            self.custom_assoc_type_uri = Some(new_uri.to_string());
            changed = true;
        }
        for role in [&mut self.assoc.role_1, &mut self.assoc.role_2] {
            let renamed = match role {
                RoleModel::Topic(topic_role) if topic_role.topic_uri() == Some(old_uri) => {
                    RoleModel::topic_uri(new_uri, topic_role.role_type_uri()).ok()
                }
                _ => None,
            };
            if let Some(renamed) = renamed {
                *role = renamed;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assoc_def_uri() {
        let def = AssociationDefinitionModel::composition("test.person", "test.name", Cardinality::One).unwrap();
        assert_eq!(def.assoc_def_uri(), "test.name");
        assert_eq!(def.instance_level_assoc_type_uri().unwrap(), uris::COMPOSITION);
        assert!(def.is_composition());

        let def = AssociationDefinitionModel::aggregation("test.person", "test.account", Cardinality::Many)
            .unwrap()
            .with_custom_assoc_type("test.owns");
        assert_eq!(def.assoc_def_uri(), "test.account#test.owns");
        assert_eq!(def.instance_level_assoc_type_uri().unwrap(), "test.owns");
        assert_eq!(def.kind().unwrap(), AssocDefKind::Aggregation);
        assert_eq!(def.parent_cardinality, Cardinality::Many);
    }

    #[test]
    fn test_unknown_def_type_is_neither_kind() {
        let mut def = AssociationDefinitionModel::composition("test.person", "test.name", Cardinality::One).unwrap();
        def.assoc.type_uri = "test.corrupt_def".to_string();
        assert!(matches!(def.kind(), Err(CoreError::InvalidState(_))));
        assert!(!def.is_composition());
        assert!(def.instance_level_assoc_type_uri().is_err());
        assert!(!def.matches_instance("test.name", uris::COMPOSITION));
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_roles_address_type_topics() {
        let def = AssociationDefinitionModel::composition("test.person", "test.name", Cardinality::One).unwrap();
        assert_eq!(def.assoc.role_1.role_type_uri(), uris::PARENT_TYPE);
        assert_eq!(def.assoc.role_2.role_type_uri(), uris::CHILD_TYPE);
        assert_eq!(def.assoc.type_uri, uris::COMPOSITION_DEF);
    }

    #[test]
    fn test_empty_type_uris_are_rejected() {
        assert!(matches!(
            AssociationDefinitionModel::composition("", "test.name", Cardinality::One),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn test_wire_form_uses_cardinality_uris() {
        let def = AssociationDefinitionModel::composition("test.person", "test.name", Cardinality::One).unwrap();
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["child_cardinality_uri"], "dm4.core.one");
        assert_eq!(json["type_uri"], uris::COMPOSITION_DEF);

        let mut bad = json.clone();
        bad["child_cardinality_uri"] = serde_json::json!("dm4.core.few");
        assert!(serde_json::from_value::<AssociationDefinitionModel>(bad).is_err());

        let back: AssociationDefinitionModel = serde_json::from_value(json).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn test_rename_type() {
        let mut def = AssociationDefinitionModel::composition("test.person", "test.name", Cardinality::One).unwrap();
        assert!(def.rename_type("test.name", "test.full_name"));
        assert_eq!(def.assoc_def_uri(), "test.full_name");
        assert_eq!(
            def.assoc.role_2,
            RoleModel::topic_uri("test.full_name", uris::CHILD_TYPE).unwrap()
        );
        assert!(!def.rename_type("test.unrelated", "test.other"));
    }
}
