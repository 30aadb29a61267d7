//! Type kernel
//!
//! `TypeModel` is the authoritative, mutable definition of a topic type or an
//! association type. Readers never see it; they receive a [`TypeView`]
//! projected from it.
//!
//! [`TypeView`]: crate::projections::TypeView

use super::AssociationDefinitionModel;
use crate::error::{CoreError, CoreResult};
use crate::model::{DeepaMehtaObjectModel, TopicModel, ViewConfigurationModel};
use crate::value_objects::{uris, Cardinality, IndexMode};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Whether a type describes topics or associations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Topic,
    Association,
}

impl TypeKind {
    /// Type URI of the topic that represents a type of this kind
    pub fn type_topic_uri(&self) -> &'static str {
        match self {
            TypeKind::Topic => uris::TOPIC_TYPE,
            TypeKind::Association => uris::ASSOC_TYPE,
        }
    }

    /// Kind of a type topic, by the topic's own type URI
    pub fn of_type_topic(type_uri: &str) -> CoreResult<Self> {
        match type_uri {
            uris::TOPIC_TYPE | uris::META_TYPE => Ok(TypeKind::Topic),
            uris::ASSOC_TYPE => Ok(TypeKind::Association),
            other => Err(CoreError::InvalidState(format!(
                "\"{other}\" does not describe a type"
            ))),
        }
    }
}

/// The authoritative definition of a type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeModel {
    topic: TopicModel,
    kind: TypeKind,
    data_type_uri: String,
    index_modes: IndexSet<IndexMode>,
    assoc_defs: IndexMap<String, AssociationDefinitionModel>,
    label_config: Vec<String>,
    view_config: ViewConfigurationModel,
}

fn check_data_type(data_type_uri: &str) -> CoreResult<()> {
    if uris::DATA_TYPES.contains(&data_type_uri) {
        Ok(())
    } else {
        Err(CoreError::InvalidState(format!(
            "\"{data_type_uri}\" is not a known data type"
        )))
    }
}

impl TypeModel {
    fn build(
        type_topic_uri: &str,
        kind: TypeKind,
        uri: impl Into<String>,
        name: impl Into<String>,
        data_type_uri: impl Into<String>,
    ) -> CoreResult<Self> {
        let uri = uri.into();
        if uri.trim().is_empty() {
            return Err(CoreError::InvalidState("type URI must not be empty".to_string()));
        }
        let data_type_uri = data_type_uri.into();
        check_data_type(&data_type_uri)?;
        Ok(Self {
            topic: TopicModel::new(type_topic_uri).with_uri(uri).with_value(name.into()),
            kind,
            data_type_uri,
            index_modes: IndexSet::new(),
            assoc_defs: IndexMap::new(),
            label_config: Vec::new(),
            view_config: ViewConfigurationModel::default(),
        })
    }

    /// A new topic type
    pub fn topic_type(
        uri: impl Into<String>,
        name: impl Into<String>,
        data_type_uri: impl Into<String>,
    ) -> CoreResult<Self> {
        Self::build(uris::TOPIC_TYPE, TypeKind::Topic, uri, name, data_type_uri)
    }

    /// A new association type
    pub fn association_type(
        uri: impl Into<String>,
        name: impl Into<String>,
        data_type_uri: impl Into<String>,
    ) -> CoreResult<Self> {
        Self::build(uris::ASSOC_TYPE, TypeKind::Association, uri, name, data_type_uri)
    }

    /// One of the types that describe types
    pub(crate) fn meta_type(uri: &str, name: &str) -> CoreResult<Self> {
        Self::build(uris::META_TYPE, TypeKind::Topic, uri, name, uris::TEXT)
    }

    /// Reassemble a kernel from its persisted parts
    pub(crate) fn from_parts(
        topic: TopicModel,
        data_type_uri: String,
        index_modes: IndexSet<IndexMode>,
        assoc_defs: Vec<AssociationDefinitionModel>,
        label_config: Vec<String>,
        view_config: ViewConfigurationModel,
    ) -> CoreResult<Self> {
        let kind = TypeKind::of_type_topic(&topic.type_uri)?;
        let mut model = Self {
            topic,
            kind,
            data_type_uri,
            index_modes,
            assoc_defs: IndexMap::new(),
            label_config: Vec::new(),
            view_config,
        };
        for def in assoc_defs {
            model.add_assoc_def(def, None)?;
        }
        model.set_label_config(label_config)?;
        model.validate()?;
        Ok(model)
    }

    pub fn with_index_mode(mut self, mode: IndexMode) -> Self {
        self.index_modes.insert(mode);
        self
    }

    pub fn with_assoc_def(mut self, def: AssociationDefinitionModel) -> CoreResult<Self> {
        self.add_assoc_def(def, None)?;
        Ok(self)
    }

    pub fn with_label_config<I, S>(mut self, assoc_def_uris: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_label_config(assoc_def_uris.into_iter().map(Into::into).collect())?;
        Ok(self)
    }

    pub fn with_view_config(mut self, view_config: ViewConfigurationModel) -> Self {
        self.view_config = view_config;
        self
    }

    pub fn uri(&self) -> &str {
        self.topic.uri().unwrap_or_default()
    }

    pub fn id(&self) -> i64 {
        self.topic.id
    }

    pub fn name(&self) -> String {
        self.topic.label()
    }

    pub fn topic(&self) -> &TopicModel {
        &self.topic
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn data_type_uri(&self) -> &str {
        &self.data_type_uri
    }

    pub fn index_modes(&self) -> impl Iterator<Item = IndexMode> + '_ {
        self.index_modes.iter().copied()
    }

    pub fn assoc_defs(&self) -> impl Iterator<Item = &AssociationDefinitionModel> {
        self.assoc_defs.values()
    }

    pub fn assoc_def(&self, assoc_def_uri: &str) -> CoreResult<&AssociationDefinitionModel> {
        self.assoc_defs.get(assoc_def_uri).ok_or_else(|| {
            CoreError::NotFound(format!(
                "association definition \"{assoc_def_uri}\" in type \"{}\"",
                self.uri()
            ))
        })
    }

    pub fn label_config(&self) -> &[String] {
        &self.label_config
    }

    pub fn view_config(&self) -> &ViewConfigurationModel {
        &self.view_config
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        self.topic.id = id;
    }

    pub(crate) fn assoc_def_mut(&mut self, assoc_def_uri: &str) -> CoreResult<&mut AssociationDefinitionModel> {
        let type_uri = self.uri().to_string();
        self.assoc_defs.get_mut(assoc_def_uri).ok_or_else(|| {
            CoreError::NotFound(format!(
                "association definition \"{assoc_def_uri}\" in type \"{type_uri}\""
            ))
        })
    }

    pub(crate) fn view_config_mut(&mut self) -> &mut ViewConfigurationModel {
        &mut self.view_config
    }

    /// Insert an assoc def before `before`, or append it.
    ///
    /// Fails with `InvalidState` when the key is taken and with `NotFound` when
    /// `before` names no assoc def of this type.
    pub fn add_assoc_def(
        &mut self,
        def: AssociationDefinitionModel,
        before: Option<&str>,
    ) -> CoreResult<()> {
        def.validate()?;
        if def.parent_type_uri != self.uri() {
            return Err(CoreError::InvalidState(format!(
                "association definition \"{}\" belongs to type \"{}\", not \"{}\"",
                def.assoc_def_uri(),
                def.parent_type_uri,
                self.uri()
            )));
        }
        let key = def.assoc_def_uri();
        if self.assoc_defs.contains_key(&key) {
            return Err(CoreError::InvalidState(format!(
                "type \"{}\" already has an association definition \"{key}\"",
                self.uri()
            )));
        }
        match before {
            Some(before) => {
                let index = self.assoc_defs.get_index_of(before).ok_or_else(|| {
                    CoreError::NotFound(format!(
                        "association definition \"{before}\" in type \"{}\"",
                        self.uri()
                    ))
                })?;
                self.assoc_defs.shift_insert(index, key, def);
            }
            None => {
                self.assoc_defs.insert(key, def);
            }
        }
        Ok(())
    }

    /// Remove an assoc def; it is dropped from the label config too
    pub fn remove_assoc_def(&mut self, assoc_def_uri: &str) -> CoreResult<AssociationDefinitionModel> {
        let def = self.assoc_defs.shift_remove(assoc_def_uri).ok_or_else(|| {
            CoreError::NotFound(format!(
                "association definition \"{assoc_def_uri}\" in type \"{}\"",
                self.uri()
            ))
        })?;
        self.label_config.retain(|uri| uri != assoc_def_uri);
        Ok(def)
    }

    pub fn update_data_type_uri(&mut self, data_type_uri: &str) -> CoreResult<()> {
        check_data_type(data_type_uri)?;
        self.data_type_uri = data_type_uri.to_string();
        Ok(())
    }

    pub fn update_parent_cardinality(
        &mut self,
        assoc_def_uri: &str,
        cardinality: Cardinality,
    ) -> CoreResult<()> {
        self.assoc_def_mut(assoc_def_uri)?.parent_cardinality = cardinality;
        Ok(())
    }

    pub fn update_child_cardinality(
        &mut self,
        assoc_def_uri: &str,
        cardinality: Cardinality,
    ) -> CoreResult<()> {
        self.assoc_def_mut(assoc_def_uri)?.child_cardinality = cardinality;
        Ok(())
    }

    /// Replace the label config; every entry must name an assoc def, once
    pub fn set_label_config(&mut self, assoc_def_uris: Vec<String>) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for uri in &assoc_def_uris {
            self.assoc_def(uri)?;
            if !seen.insert(uri.as_str()) {
                return Err(CoreError::InvalidState(format!(
                    "\"{uri}\" appears twice in the label config of \"{}\"",
                    self.uri()
                )));
            }
        }
        self.label_config = assoc_def_uris;
        Ok(())
    }

    pub fn set_index_modes(&mut self, modes: impl IntoIterator<Item = IndexMode>) {
        self.index_modes = modes.into_iter().collect();
    }

    /// Rename this type, including the parent side of its own assoc defs
    pub(crate) fn set_uri(&mut self, new_uri: &str) -> CoreResult<()> {
        if new_uri.trim().is_empty() {
            return Err(CoreError::InvalidState("type URI must not be empty".to_string()));
        }
        let old_uri = self.uri().to_string();
        self.topic.uri = Some(new_uri.to_string());
        self.rename_type_references(&old_uri, new_uri);
        Ok(())
    }

    /// Re-key assoc defs that point at a renamed type.
    ///
    /// Keys and label config entries follow the new child URIs; order is kept.
    /// Returns whether anything changed.
    pub(crate) fn rename_type_references(&mut self, old_uri: &str, new_uri: &str) -> bool {
        let mut changed = false;
        let mut renamed_keys = Vec::new();
        let defs = std::mem::take(&mut self.assoc_defs);
        for (key, mut def) in defs {
            if def.rename_type(old_uri, new_uri) {
                changed = true;
            }
            let new_key = def.assoc_def_uri();
            if new_key != key {
                renamed_keys.push((key, new_key.clone()));
            }
            self.assoc_defs.insert(new_key, def);
        }
        for (old_key, new_key) in renamed_keys {
            for entry in self.label_config.iter_mut().filter(|entry| **entry == old_key) {
                *entry = new_key.clone();
            }
        }
        changed
    }

    pub(crate) fn validate(&self) -> CoreResult<()> {
        check_data_type(&self.data_type_uri)?;
        for (key, def) in &self.assoc_defs {
            def.validate()?;
            if *key != def.assoc_def_uri() {
                return Err(CoreError::InvalidState(format!(
                    "association definition keyed \"{key}\" identifies as \"{}\"",
                    def.assoc_def_uri()
                )));
            }
        }
        for uri in &self.label_config {
            self.assoc_def(uri)?;
        }
        Ok(())
    }
}
