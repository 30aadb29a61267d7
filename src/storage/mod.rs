//! Storage collaborator boundary
//!
//! The core never talks to a physical store directly. It opens a
//! [`StorageTransaction`] per request and reads and writes flat objects:
//! composite values are never stored as such, only as topics and the
//! associations between them.
//!
//! Storage sees id-addressed roles only; topics and associations share one id
//! space.

use crate::model::{AssociationModel, TopicModel};
use thiserror::Error;

/// Failures reported by a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    /// A write would violate referential integrity or uniqueness
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend failure: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn topic_not_found(id: i64) -> Self {
        StorageError::NotFound {
            kind: "topic",
            key: id.to_string(),
        }
    }

    pub fn association_not_found(id: i64) -> Self {
        StorageError::NotFound {
            kind: "association",
            key: id.to_string(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A lazy sequence of stored objects
pub type StoredObjects<'a, T> = Box<dyn Iterator<Item = T> + 'a>;

/// A graph store that hands out transactions
pub trait GraphStorage: Send + Sync {
    fn begin_tx(&self) -> StorageResult<Box<dyn StorageTransaction + '_>>;
}

/// One storage transaction.
///
/// Ids are assigned by `store_*` when the model's id is `-1`; otherwise the
/// stored object with that id is replaced. Child topics of a model are
/// ignored.
pub trait StorageTransaction {
    fn fetch_topic(&self, id: i64) -> StorageResult<TopicModel>;

    fn fetch_topic_by_uri(&self, uri: &str) -> StorageResult<Option<TopicModel>>;

    fn fetch_association(&self, id: i64) -> StorageResult<AssociationModel>;

    fn fetch_association_by_uri(&self, uri: &str) -> StorageResult<Option<AssociationModel>>;

    fn fetch_all_topics(&self) -> StorageResult<StoredObjects<'_, TopicModel>>;

    fn fetch_all_associations(&self) -> StorageResult<StoredObjects<'_, AssociationModel>>;

    fn fetch_topics_by_type(&self, type_uri: &str) -> StorageResult<Vec<TopicModel>> {
        Ok(self
            .fetch_all_topics()?
            .filter(|topic| topic.type_uri == type_uri)
            .collect())
    }

    fn fetch_associations_by_type(&self, type_uri: &str) -> StorageResult<Vec<AssociationModel>> {
        Ok(self
            .fetch_all_associations()?
            .filter(|assoc| assoc.type_uri == type_uri)
            .collect())
    }

    /// Associations in which the given topic or association plays a role
    fn fetch_player_associations(&self, player_id: i64) -> StorageResult<Vec<AssociationModel>>;

    fn store_topic(&mut self, topic: &TopicModel) -> StorageResult<i64>;

    fn store_association(&mut self, assoc: &AssociationModel) -> StorageResult<i64>;

    /// Fails with `Conflict` while the topic still plays a role
    fn delete_topic(&mut self, id: i64) -> StorageResult<()>;

    /// Fails with `Conflict` while the association still plays a role
    fn delete_association(&mut self, id: i64) -> StorageResult<()>;

    fn store_role_type_uri(
        &mut self,
        assoc_id: i64,
        player_id: i64,
        role_type_uri: &str,
    ) -> StorageResult<()>;

    /// Make the writes durable, then run `publish` before other writers may
    /// begin. Process-wide state derived from the writes is published there.
    fn commit_with(self: Box<Self>, publish: &mut dyn FnMut()) -> StorageResult<()>;

    fn commit(self: Box<Self>) -> StorageResult<()> {
        self.commit_with(&mut || {})
    }

    fn rollback(self: Box<Self>) -> StorageResult<()>;
}
