//! Per-request directives
//!
//! Directives tell downstream caches what changed during a request. They are
//! appended in operation order and never de-duplicated.

use crate::error::CoreResult;
use crate::model::{AssociationModel, TopicModel};
use crate::projections::TypeView;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One observable change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "arg", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Directive {
    UpdateTopic(TopicModel),
    DeleteTopic(TopicModel),
    UpdateAssociation(AssociationModel),
    DeleteAssociation(AssociationModel),
    UpdateTopicType(TypeView),
    DeleteTopicType { uri: String },
    UpdateAssociationType(TypeView),
    DeleteAssociationType { uri: String },
}

/// Directive discriminant, handy for assertions and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectiveKind {
    UpdateTopic,
    DeleteTopic,
    UpdateAssociation,
    DeleteAssociation,
    UpdateTopicType,
    DeleteTopicType,
    UpdateAssociationType,
    DeleteAssociationType,
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::UpdateTopic(_) => DirectiveKind::UpdateTopic,
            Directive::DeleteTopic(_) => DirectiveKind::DeleteTopic,
            Directive::UpdateAssociation(_) => DirectiveKind::UpdateAssociation,
            Directive::DeleteAssociation(_) => DirectiveKind::DeleteAssociation,
            Directive::UpdateTopicType(_) => DirectiveKind::UpdateTopicType,
            Directive::DeleteTopicType { .. } => DirectiveKind::DeleteTopicType,
            Directive::UpdateAssociationType(_) => DirectiveKind::UpdateAssociationType,
            Directive::DeleteAssociationType { .. } => DirectiveKind::DeleteAssociationType,
        }
    }

    /// Id of the affected object, for instance-level directives
    pub fn object_id(&self) -> Option<i64> {
        match self {
            Directive::UpdateTopic(t) | Directive::DeleteTopic(t) => Some(t.id),
            Directive::UpdateAssociation(a) | Directive::DeleteAssociation(a) => Some(a.id),
            _ => None,
        }
    }
}

/// The ordered change log of one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directives {
    pub request_id: Uuid,
    pub created_at: DateTime<Utc>,
    entries: Vec<Directive>,
}

impl Directives {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            created_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, directive: Directive) {
        self.entries.push(directive);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Directive> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kinds(&self) -> Vec<DirectiveKind> {
        self.entries.iter().map(Directive::kind).collect()
    }

    pub fn into_entries(self) -> Vec<Directive> {
        self.entries
    }

    /// The entries as a JSON array
    pub fn to_json(&self) -> CoreResult<serde_json::Value> {
        Ok(serde_json::to_value(&self.entries)?)
    }
}

impl Default for Directives {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives the directives of every committed request
#[async_trait]
pub trait DirectivesPublisher: Send + Sync {
    async fn publish(&self, directives: &Directives) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_only_without_deduplication() {
        let mut directives = Directives::new();
        let topic = TopicModel::new("test.note").with_id(3);
        directives.add(Directive::UpdateTopic(topic.clone()));
        directives.add(Directive::UpdateTopic(topic));
        directives.add(Directive::DeleteTopicType { uri: "test.note".into() });
        assert_eq!(
            directives.kinds(),
            vec![
                DirectiveKind::UpdateTopic,
                DirectiveKind::UpdateTopic,
                DirectiveKind::DeleteTopicType
            ]
        );
        assert_eq!(directives.iter().next().unwrap().object_id(), Some(3));
    }

    #[test]
    fn test_wire_form() {
        let mut directives = Directives::new();
        directives.add(Directive::UpdateTopic(TopicModel::new("test.note").with_value("x")));
        directives.add(Directive::DeleteAssociationType { uri: "test.owns".into() });
        let json = directives.to_json().unwrap();
        assert_eq!(json[0]["type"], "UPDATE_TOPIC");
        assert_eq!(json[0]["arg"]["value"], "x");
        assert_eq!(json[1]["type"], "DELETE_ASSOCIATION_TYPE");
        assert_eq!(json[1]["arg"]["uri"], "test.owns");
    }
}
