//! Composite value tree
//!
//! A composite value maps assoc-def URIs to one related topic or to an
//! ordered list of them. The shape of a slot is validated against the owning
//! type's declared child cardinality by the transaction, not inferred here.

use super::{AssociationModel, DeepaMehtaObjectModel, TopicModel};
use indexmap::IndexMap;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A child topic together with the association that relates it to its parent
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedTopicModel {
    pub topic: TopicModel,
    pub relating_assoc: Option<AssociationModel>,
}

impl RelatedTopicModel {
    pub fn new(topic: TopicModel, relating_assoc: AssociationModel) -> Self {
        Self {
            topic,
            relating_assoc: Some(relating_assoc),
        }
    }

    pub fn id(&self) -> i64 {
        self.topic.id
    }

    pub fn label(&self) -> String {
        self.topic.label()
    }
}

#[derive(Serialize)]
struct RelatedTopicRef<'a> {
    #[serde(flatten)]
    topic: &'a TopicModel,
    #[serde(rename = "assoc", skip_serializing_if = "Option::is_none")]
    relating_assoc: Option<&'a AssociationModel>,
}

#[derive(Deserialize)]
struct RelatedTopicOwned {
    #[serde(flatten)]
    topic: TopicModel,
    #[serde(rename = "assoc", default)]
    relating_assoc: Option<AssociationModel>,
}

impl Serialize for RelatedTopicModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(assoc) = &self.relating_assoc {
            if !assoc.is_initialized() {
                return Err(S::Error::custom(format!(
                    "relating association of topic {} is not initialized",
                    self.topic.id
                )));
            }
        }
        RelatedTopicRef {
            topic: &self.topic,
            relating_assoc: self.relating_assoc.as_ref(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RelatedTopicModel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let owned = RelatedTopicOwned::deserialize(deserializer)?;
        Ok(Self {
            topic: owned.topic,
            relating_assoc: owned.relating_assoc,
        })
    }
}

/// The value stored under one assoc-def URI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildSlot {
    Many(Vec<RelatedTopicModel>),
    One(Box<RelatedTopicModel>),
}

impl ChildSlot {
    pub fn as_slice(&self) -> &[RelatedTopicModel] {
        match self {
            ChildSlot::One(child) => std::slice::from_ref(child.as_ref()),
            ChildSlot::Many(children) => children,
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, ChildSlot::Many(_))
    }
}

/// Ordered mapping from assoc-def URI to child slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildTopicsModel {
    slots: IndexMap<String, ChildSlot>,
}

impl ChildTopicsModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, assoc_def_uri: &str) -> bool {
        self.slots.contains_key(assoc_def_uri)
    }

    pub fn get(&self, assoc_def_uri: &str) -> Option<&ChildSlot> {
        self.slots.get(assoc_def_uri)
    }

    /// The single child in a cardinality-one slot
    pub fn get_one(&self, assoc_def_uri: &str) -> Option<&RelatedTopicModel> {
        match self.slots.get(assoc_def_uri)? {
            ChildSlot::One(child) => Some(child),
            ChildSlot::Many(_) => None,
        }
    }

    /// The children in a cardinality-many slot
    pub fn get_many(&self, assoc_def_uri: &str) -> Option<&[RelatedTopicModel]> {
        match self.slots.get(assoc_def_uri)? {
            ChildSlot::Many(children) => Some(children),
            ChildSlot::One(_) => None,
        }
    }

    /// Set a cardinality-one slot, replacing what was there
    pub fn put_one(&mut self, assoc_def_uri: impl Into<String>, child: impl Into<RelatedTopicModel>) {
        self.slots
            .insert(assoc_def_uri.into(), ChildSlot::One(Box::new(child.into())));
    }

    /// Append to a cardinality-many slot; a single child already present is kept
    pub fn add_many(&mut self, assoc_def_uri: impl Into<String>, child: impl Into<RelatedTopicModel>) {
        let child = child.into();
        let slot = self
            .slots
            .entry(assoc_def_uri.into())
            .or_insert_with(|| ChildSlot::Many(Vec::new()));
        match slot {
            ChildSlot::Many(children) => children.push(child),
            ChildSlot::One(_) => {
                if let ChildSlot::One(existing) = std::mem::replace(slot, ChildSlot::Many(Vec::new())) {
                    *slot = ChildSlot::Many(vec![*existing, child]);
                }
            }
        }
    }

    pub fn put_many(&mut self, assoc_def_uri: impl Into<String>, children: Vec<RelatedTopicModel>) {
        self.slots.insert(assoc_def_uri.into(), ChildSlot::Many(children));
    }

    pub fn put_slot(&mut self, assoc_def_uri: impl Into<String>, slot: ChildSlot) {
        self.slots.insert(assoc_def_uri.into(), slot);
    }

    pub fn remove(&mut self, assoc_def_uri: &str) -> Option<ChildSlot> {
        self.slots.shift_remove(assoc_def_uri)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ChildSlot)> {
        self.slots.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.slots.keys()
    }

    /// Apply a delta.
    ///
    /// Slots absent from `delta` are left untouched. A one-slot in the delta
    /// replaces the current one. Items of a many-slot that carry the id of an
    /// existing item replace it; all others are appended.
    pub fn merge(&mut self, delta: ChildTopicsModel) {
        for (uri, slot) in delta.slots {
            match slot {
                ChildSlot::Many(items) if self.get_many(&uri).is_some() => {
                    if let Some(ChildSlot::Many(current)) = self.slots.get_mut(&uri) {
                        for item in items {
                            let existing = current
                                .iter_mut()
                                .find(|c| item.topic.id >= 0 && c.topic.id == item.topic.id);
                            match existing {
                                Some(existing) => *existing = item,
                                None => current.push(item),
                            }
                        }
                    }
                }
                slot => {
                    self.slots.insert(uri, slot);
                }
            }
        }
    }
}

impl IntoIterator for ChildTopicsModel {
    type Item = (String, ChildSlot);
    type IntoIter = indexmap::map::IntoIter<String, ChildSlot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChildTopicsModel {
    type Item = (&'a String, &'a ChildSlot);
    type IntoIter = indexmap::map::Iter<'a, String, ChildSlot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}
