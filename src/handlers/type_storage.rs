//! Types stored as graph structures
//!
//! A type is a topic. Its data type and index modes are aggregations to the
//! respective topics, each assoc def is an association between the parent and
//! the child type topic carrying its position, cardinalities and the custom
//! association type hang off the assoc def, and label config entries link the
//! type topic to the assoc defs they include.
//!
//! All writes here are raw: no events, no directives.

use super::Transaction;
use crate::error::{CoreError, CoreResult};
use crate::model::{AssociationModel, DeepaMehtaObjectModel, ObjectRef, RoleModel};
use crate::types::{AssocDefKind, AssociationDefinitionModel, TypeModel};
use crate::value_objects::{uris, Cardinality, IndexMode, SimpleValue};
use indexmap::IndexSet;

/// Sequence position carried by an ordering association
fn position(assoc: &AssociationModel) -> i64 {
    match assoc.value {
        Some(SimpleValue::Int(position)) => position,
        _ => i64::MAX,
    }
}

impl Transaction<'_> {
    /// Write a type's topic and structures, replacing earlier structures
    pub(super) fn store_type(&mut self, kernel: &mut TypeModel) -> CoreResult<()> {
        if kernel.id() >= 0 {
            self.delete_type_structures(kernel.id())?;
        }
        let id = self.store_topic_raw(&kernel.topic().without_children())?;
        kernel.set_id(id);
        let type_ref = ObjectRef::Topic(id);

        let data_type_uri = kernel.data_type_uri().to_string();
        self.link_to_topic(type_ref, uris::TYPE, &data_type_uri, uris::DEFAULT)?;
        let index_modes: Vec<IndexMode> = kernel.index_modes().collect();
        for mode in index_modes {
            self.link_to_topic(type_ref, uris::TYPE, mode.uri(), uris::DEFAULT)?;
        }

        let keys: Vec<String> = kernel.assoc_defs().map(|def| def.assoc_def_uri()).collect();
        for (position, key) in keys.iter().enumerate() {
            let def = kernel.assoc_def_mut(key)?;
            self.store_assoc_def(id, def, position as i64)?;
        }

        for (position, key) in kernel.label_config().to_vec().iter().enumerate() {
            let def_id = kernel.assoc_def(key)?.assoc.id;
            let label_entry = AssociationModel::new(
                uris::AGGREGATION,
                type_ref.role(uris::TYPE)?,
                RoleModel::association(def_id, uris::INCLUDE_IN_LABEL)?,
            )
            .with_value(position as i64);
            self.store_association_raw(&label_entry)?;
        }

        self.store_view_config(type_ref, kernel.view_config_mut())
    }

    fn store_assoc_def(
        &mut self,
        parent_id: i64,
        def: &mut AssociationDefinitionModel,
        position: i64,
    ) -> CoreResult<()> {
        let child_id = if def.child_type_uri == def.parent_type_uri {
            parent_id
        } else {
            self.topic_id_by_uri(&def.child_type_uri)?
        };
        let stored = AssociationModel::new(
            def.assoc.type_uri.clone(),
            RoleModel::topic_id(parent_id, uris::PARENT_TYPE)?,
            RoleModel::topic_id(child_id, uris::CHILD_TYPE)?,
        )
        .with_value(position);
        let id = self.store_association_raw(&stored)?;
        def.assoc.id = id;
        def.assoc.value = Some(SimpleValue::Int(position));

        let def_ref = ObjectRef::Association(id);
        self.link_to_topic(def_ref, uris::ASSOC_DEF, def.parent_cardinality.uri(), uris::PARENT_CARDINALITY)?;
        self.link_to_topic(def_ref, uris::ASSOC_DEF, def.child_cardinality.uri(), uris::CHILD_CARDINALITY)?;
        if let Some(custom) = def.custom_assoc_type_uri.clone() {
            self.link_to_topic(def_ref, uris::ASSOC_DEF, &custom, uris::CUSTOM_ASSOC_TYPE)?;
        }
        self.store_view_config(def_ref, &mut def.view_config)
    }

    /// Aggregate a well-known topic, addressed by URI
    fn link_to_topic(
        &mut self,
        from: ObjectRef,
        from_role: &str,
        topic_uri: &str,
        to_role: &str,
    ) -> CoreResult<i64> {
        let topic_id = self.topic_id_by_uri(topic_uri)?;
        let link = AssociationModel::new(
            uris::AGGREGATION,
            from.role(from_role)?,
            RoleModel::topic_id(topic_id, to_role)?,
        );
        self.store_association_raw(&link)
    }

    /// Remove everything `store_type` wrote except the type topic itself
    pub(super) fn delete_type_structures(&mut self, type_id: i64) -> CoreResult<()> {
        let mut links = Vec::new();
        let mut defs = Vec::new();
        for assoc in self.player_associations(type_id)? {
            let Some(role) = assoc.role_of(type_id) else {
                continue;
            };
            match (assoc.type_uri.as_str(), role.role_type_uri()) {
                (uris::AGGREGATION, uris::TYPE) => links.push(assoc.id),
                (uris::COMPOSITION_DEF | uris::AGGREGATION_DEF, uris::PARENT_TYPE) => defs.push(assoc.id),
                _ => {}
            }
        }
        // label entries point at assoc defs, so they go first
        for id in links {
            self.delete_association_raw(id)?;
        }
        for id in defs {
            self.delete_view_config_topics(id)?;
            self.delete_structure_association(id)?;
        }
        self.delete_view_config_topics(type_id)
    }

    fn delete_structure_association(&mut self, id: i64) -> CoreResult<()> {
        for dependent in self.player_associations(id)? {
            self.delete_structure_association(dependent.id)?;
        }
        self.delete_association_raw(id)
    }

    /// Rebuild a kernel from storage
    pub(super) fn fetch_type(&mut self, uri: &str) -> CoreResult<TypeModel> {
        let topic = self
            .fetch_topic_by_uri_raw(uri)?
            .ok_or_else(|| CoreError::NotFound(format!("type \"{uri}\"")))?;
        let type_id = topic.id;

        let mut data_type_uri = None;
        let mut index_modes = IndexSet::new();
        let mut defs = Vec::new();
        let mut label_entries = Vec::new();
        for assoc in self.player_associations(type_id)? {
            let (Some(own), Some(other)) = (assoc.role_of(type_id), assoc.other_role(type_id)) else {
                continue;
            };
            match (assoc.type_uri.as_str(), own.role_type_uri(), other.role_type_uri()) {
                (uris::AGGREGATION, uris::TYPE, uris::DEFAULT) => {
                    let Some(target_id) = other.player_id() else {
                        continue;
                    };
                    let target = self.fetch_topic_raw(target_id)?;
                    let target_uri = target.uri().unwrap_or_default();
                    match target.type_uri.as_str() {
                        uris::DATA_TYPE => data_type_uri = Some(target_uri.to_string()),
                        uris::INDEX_MODE => {
                            index_modes.insert(IndexMode::from_uri(target_uri)?);
                        }
                        _ => {}
                    }
                }
                (uris::AGGREGATION, uris::TYPE, uris::INCLUDE_IN_LABEL) => {
                    if let Some(def_id) = other.player_id() {
                        label_entries.push((position(&assoc), def_id));
                    }
                }
                (uris::COMPOSITION_DEF | uris::AGGREGATION_DEF, uris::PARENT_TYPE, _) => {
                    defs.push((position(&assoc), self.fetch_assoc_def(&assoc, uri)?));
                }
                _ => {}
            }
        }
        defs.sort_by_key(|(position, _)| *position);
        label_entries.sort_by_key(|(position, _)| *position);

        let mut label_config = Vec::with_capacity(label_entries.len());
        for (_, def_id) in label_entries {
            let def = defs
                .iter()
                .find(|(_, def)| def.assoc.id == def_id)
                .ok_or_else(|| {
                    CoreError::InvalidState(format!(
                        "label config of \"{uri}\" names foreign association definition {def_id}"
                    ))
                })?;
            label_config.push(def.1.assoc_def_uri());
        }

        let data_type_uri = data_type_uri.ok_or_else(|| {
            CoreError::InvalidState(format!("type \"{uri}\" has no data type"))
        })?;
        let view_config = self.fetch_view_config(type_id)?;
        TypeModel::from_parts(
            topic,
            data_type_uri,
            index_modes,
            defs.into_iter().map(|(_, def)| def).collect(),
            label_config,
            view_config,
        )
    }

    fn fetch_assoc_def(
        &mut self,
        assoc: &AssociationModel,
        parent_type_uri: &str,
    ) -> CoreResult<AssociationDefinitionModel> {
        let kind = AssocDefKind::from_def_type_uri(&assoc.type_uri)?;
        let child_id = assoc
            .role_by_type(uris::CHILD_TYPE)
            .and_then(RoleModel::player_id)
            .ok_or_else(|| {
                CoreError::InvalidState(format!("association definition {} has no child type", assoc.id))
            })?;
        let child_type_uri = self
            .fetch_topic_raw(child_id)?
            .uri
            .ok_or_else(|| CoreError::InvalidState(format!("child type topic {child_id} has no URI")))?;

        let mut parent_cardinality = None;
        let mut child_cardinality = None;
        let mut custom_assoc_type_uri = None;
        for link in self.player_associations(assoc.id)? {
            let Some(other) = link.other_role(assoc.id) else {
                continue;
            };
            let Some(target_id) = other.player_id() else {
                continue;
            };
            let slot = match other.role_type_uri() {
                uris::PARENT_CARDINALITY => &mut parent_cardinality,
                uris::CHILD_CARDINALITY => &mut child_cardinality,
                uris::CUSTOM_ASSOC_TYPE => &mut custom_assoc_type_uri,
                _ => continue,
            };
            *slot = self.fetch_topic_raw(target_id)?.uri;
        }

        let cardinality = |uri: Option<String>, side: &str| {
            uri.ok_or_else(|| {
                CoreError::InvalidState(format!(
                    "association definition {} has no {side} cardinality",
                    assoc.id
                ))
            })
            .and_then(|uri| Cardinality::from_uri(&uri))
        };
        let mut def = AssociationDefinitionModel::new(
            kind,
            parent_type_uri,
            child_type_uri,
            cardinality(parent_cardinality, "parent")?,
            cardinality(child_cardinality, "child")?,
        )?;
        def.assoc.id = assoc.id;
        def.assoc.value = assoc.value.clone();
        if let Some(custom) = custom_assoc_type_uri {
            def = def.with_custom_assoc_type(custom);
        }
        def.view_config = self.fetch_view_config(assoc.id)?;
        Ok(def)
    }
}
