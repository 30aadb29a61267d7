//! Topic (graph node)

use super::{unassigned_id, ChildTopicsModel, RelatedTopicModel, UNASSIGNED_ID};
use crate::value_objects::SimpleValue;
use serde::{Deserialize, Serialize};

/// A typed, addressable graph node
///
/// Also used as an update (delta) model: `value: None` and absent child slots
/// mean "leave untouched", an empty `type_uri` means "keep the type".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicModel {
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
}

impl_object_model!(TopicModel);

impl TopicModel {
    /// A new, unpersisted topic of the given type
    pub fn new(type_uri: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            uri: None,
            type_uri: type_uri.into(),
            value: None,
            children: ChildTopicsModel::default(),
        }
    }

    /// A reference to an already persisted topic
    pub fn reference(id: i64) -> Self {
        Self {
            id,
            ..Self::new("")
        }
    }

    /// A reference to a topic by its URI
    pub fn reference_by_uri(uri: impl Into<String>) -> Self {
        Self::new("").with_uri(uri)
    }

    /// An update model for the topic with the given id
    pub fn update(id: i64) -> Self {
        Self::reference(id)
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

    pub fn with_children(mut self, children: ChildTopicsModel) -> Self {
        self.children = children;
        self
    }

    /// Put a single child (cardinality one)
    pub fn with_child(mut self, assoc_def_uri: impl Into<String>, child: TopicModel) -> Self {
        self.children.put_one(assoc_def_uri, child);
        self
    }

    /// Append a child to a cardinality-many slot
    pub fn with_child_in(mut self, assoc_def_uri: impl Into<String>, child: TopicModel) -> Self {
        self.children.add_many(assoc_def_uri, child);
        self
    }

    /// The model without its composite value, as storage keeps it
    pub fn without_children(&self) -> Self {
        Self {
            children: ChildTopicsModel::default(),
            ..self.clone()
        }
    }

    /// Whether an update model changes anything besides addressing
    pub fn carries_changes(&self) -> bool {
        self.value.is_some() || !self.children.is_empty()
    }
}

impl From<TopicModel> for RelatedTopicModel {
    fn from(topic: TopicModel) -> Self {
        RelatedTopicModel {
            topic,
            relating_assoc: None,
        }
    }
}
