//! View configuration
//!
//! UI-facing settings attached to a type, an assoc def or an instance. Each
//! config type contributes one settings topic whose children are the
//! individual settings.

use super::{DeepaMehtaObjectModel, TopicModel};
use crate::value_objects::SimpleValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Mapping from config type URI to its settings topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewConfigurationModel {
    config_topics: IndexMap<String, TopicModel>,
}

/// The object a view configuration is attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Configurable {
    Type { type_uri: String },
    AssocDef { type_uri: String, assoc_def_uri: String },
    Instance { id: i64 },
}

impl ViewConfigurationModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.config_topics.is_empty()
    }

    pub fn config_topic(&self, config_type_uri: &str) -> Option<&TopicModel> {
        self.config_topics.get(config_type_uri)
    }

    /// Add or replace the settings topic; it is keyed by its own type URI
    pub fn put_config_topic(&mut self, config_topic: TopicModel) {
        self.config_topics
            .insert(config_topic.type_uri.clone(), config_topic);
    }

    pub fn remove(&mut self, config_type_uri: &str) -> Option<TopicModel> {
        self.config_topics.shift_remove(config_type_uri)
    }

    /// A single setting value
    pub fn setting(&self, config_type_uri: &str, setting_uri: &str) -> Option<&SimpleValue> {
        self.config_topic(config_type_uri)?
            .children
            .get_one(setting_uri)?
            .topic
            .simple_value()
    }

    /// Set a single setting, creating the settings topic when absent
    pub fn set_setting(
        &mut self,
        config_type_uri: &str,
        setting_uri: &str,
        value: impl Into<SimpleValue>,
    ) {
        let topic = self
            .config_topics
            .entry(config_type_uri.to_string())
            .or_insert_with(|| TopicModel::new(config_type_uri));
        topic
            .children
            .put_one(setting_uri, TopicModel::new(setting_uri).with_value(value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TopicModel)> {
        self.config_topics.iter()
    }

    pub fn topics_mut(&mut self) -> impl Iterator<Item = &mut TopicModel> {
        self.config_topics.values_mut()
    }
}
