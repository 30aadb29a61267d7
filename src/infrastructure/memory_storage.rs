//! In-memory reference storage
//!
//! Transactions are serialized: a transaction holds the store mutex from
//! `begin_tx` until commit or rollback and works on a copy of the graph, which
//! replaces the shared state on commit.

use crate::model::{AssociationModel, DeepaMehtaObjectModel, RoleModel, TopicModel, UNASSIGNED_ID};
use crate::storage::{GraphStorage, StorageError, StorageResult, StorageTransaction, StoredObjects};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct GraphState {
    topics: BTreeMap<i64, TopicModel>,
    associations: BTreeMap<i64, AssociationModel>,
    next_id: i64,
}

impl GraphState {
    fn is_player(&self, id: i64) -> bool {
        self.associations.values().any(|assoc| assoc.has_player(id))
    }

    fn assign_id(&mut self, id: i64) -> StorageResult<i64> {
        if id == UNASSIGNED_ID {
            let id = self.next_id;
            self.next_id += 1;
            Ok(id)
        } else if id < 0 {
            Err(StorageError::Backend(format!("{id} is not a valid id")))
        } else {
            Ok(id)
        }
    }

    fn check_uri_unique(&self, uri: Option<&str>, id: i64) -> StorageResult<()> {
        let Some(uri) = uri.filter(|uri| !uri.is_empty()) else {
            return Ok(());
        };
        let taken = self
            .topics
            .values()
            .map(|t| (t.id, t.uri.as_deref()))
            .chain(self.associations.values().map(|a| (a.id, a.uri.as_deref())))
            .any(|(other, other_uri)| other != id && other_uri == Some(uri));
        if taken {
            return Err(StorageError::Conflict(format!("URI \"{uri}\" is already taken")));
        }
        Ok(())
    }

    fn check_player(&self, role: &RoleModel, assoc_id: i64) -> StorageResult<()> {
        let player_id = role.player_id().ok_or_else(|| {
            StorageError::Backend(format!(
                "role \"{}\" is not addressed by id",
                role.role_type_uri()
            ))
        })?;
        let exists = match role {
            RoleModel::Topic(_) => self.topics.contains_key(&player_id),
            RoleModel::Association(_) => {
                player_id != assoc_id && self.associations.contains_key(&player_id)
            }
        };
        if !exists {
            return Err(StorageError::Conflict(format!(
                "role player {player_id} does not exist"
            )));
        }
        Ok(())
    }
}

/// A volatile graph store for tests and tooling
#[derive(Debug, Default)]
pub struct InMemoryGraphStorage {
    state: Mutex<GraphState>,
}

impl InMemoryGraphStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed topics
    pub fn topic_count(&self) -> usize {
        self.state.lock().topics.len()
    }

    /// Number of committed associations
    pub fn association_count(&self) -> usize {
        self.state.lock().associations.len()
    }
}

impl GraphStorage for InMemoryGraphStorage {
    fn begin_tx(&self) -> StorageResult<Box<dyn StorageTransaction + '_>> {
        let guard = self.state.lock();
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }
}

/// Transaction over [`InMemoryGraphStorage`]
pub struct InMemoryTransaction<'a> {
    guard: MutexGuard<'a, GraphState>,
    working: GraphState,
}

impl StorageTransaction for InMemoryTransaction<'_> {
    fn fetch_topic(&self, id: i64) -> StorageResult<TopicModel> {
        self.working
            .topics
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::topic_not_found(id))
    }

    fn fetch_topic_by_uri(&self, uri: &str) -> StorageResult<Option<TopicModel>> {
        Ok(self
            .working
            .topics
            .values()
            .find(|topic| topic.uri() == Some(uri))
            .cloned())
    }

    fn fetch_association(&self, id: i64) -> StorageResult<AssociationModel> {
        self.working
            .associations
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::association_not_found(id))
    }

    fn fetch_association_by_uri(&self, uri: &str) -> StorageResult<Option<AssociationModel>> {
        Ok(self
            .working
            .associations
            .values()
            .find(|assoc| assoc.uri() == Some(uri))
            .cloned())
    }

    fn fetch_all_topics(&self) -> StorageResult<StoredObjects<'_, TopicModel>> {
        Ok(Box::new(self.working.topics.values().cloned()))
    }

    fn fetch_all_associations(&self) -> StorageResult<StoredObjects<'_, AssociationModel>> {
        Ok(Box::new(self.working.associations.values().cloned()))
    }

    fn fetch_player_associations(&self, player_id: i64) -> StorageResult<Vec<AssociationModel>> {
        Ok(self
            .working
            .associations
            .values()
            .filter(|assoc| assoc.has_player(player_id))
            .cloned()
            .collect())
    }

    fn store_topic(&mut self, topic: &TopicModel) -> StorageResult<i64> {
        if topic.id != UNASSIGNED_ID && !self.working.topics.contains_key(&topic.id) {
            return Err(StorageError::topic_not_found(topic.id));
        }
        let id = self.working.assign_id(topic.id)?;
        self.working.check_uri_unique(topic.uri(), id)?;
        let mut stored = topic.without_children();
        stored.id = id;
        self.working.topics.insert(id, stored);
        debug!(id, type_uri = %topic.type_uri, "Stored topic");
        Ok(id)
    }

    fn store_association(&mut self, assoc: &AssociationModel) -> StorageResult<i64> {
        if assoc.id != UNASSIGNED_ID && !self.working.associations.contains_key(&assoc.id) {
            return Err(StorageError::association_not_found(assoc.id));
        }
        let id = self.working.assign_id(assoc.id)?;
        self.working.check_uri_unique(assoc.uri(), id)?;
        self.working.check_player(&assoc.role_1, id)?;
        self.working.check_player(&assoc.role_2, id)?;
        let mut stored = assoc.without_children();
        stored.id = id;
        self.working.associations.insert(id, stored);
        debug!(id, type_uri = %assoc.type_uri, "Stored association");
        Ok(id)
    }

    fn delete_topic(&mut self, id: i64) -> StorageResult<()> {
        if !self.working.topics.contains_key(&id) {
            return Err(StorageError::topic_not_found(id));
        }
        if self.working.is_player(id) {
            return Err(StorageError::Conflict(format!(
                "topic {id} still plays a role in an association"
            )));
        }
        self.working.topics.remove(&id);
        Ok(())
    }

    fn delete_association(&mut self, id: i64) -> StorageResult<()> {
        if !self.working.associations.contains_key(&id) {
            return Err(StorageError::association_not_found(id));
        }
        if self.working.is_player(id) {
            return Err(StorageError::Conflict(format!(
                "association {id} still plays a role in another association"
            )));
        }
        self.working.associations.remove(&id);
        Ok(())
    }

    fn store_role_type_uri(
        &mut self,
        assoc_id: i64,
        player_id: i64,
        role_type_uri: &str,
    ) -> StorageResult<()> {
        let assoc = self
            .working
            .associations
            .get_mut(&assoc_id)
            .ok_or_else(|| StorageError::association_not_found(assoc_id))?;
        let role = if assoc.role_1.player_id() == Some(player_id) {
            &mut assoc.role_1
        } else if assoc.role_2.player_id() == Some(player_id) {
            &mut assoc.role_2
        } else {
            return Err(StorageError::NotFound {
                kind: "role player",
                key: format!("{player_id} in association {assoc_id}"),
            });
        };
        role.set_role_type_uri(role_type_uri)
            .map_err(|err| StorageError::Backend(err.to_string()))
    }

    fn commit_with(mut self: Box<Self>, publish: &mut dyn FnMut()) -> StorageResult<()> {
        let working = std::mem::take(&mut self.working);
        debug!(
            topics = working.topics.len(),
            associations = working.associations.len(),
            "Committing in-memory transaction"
        );
        *self.guard = working;
        // the guard is released only when `self` drops
        publish();
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StorageResult<()> {
        debug!("Discarding in-memory transaction");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test Coverage
    ///
    /// ```mermaid
    /// graph TD
    ///     S[InMemoryGraphStorage] --> C[Commit publishes]
    ///     S --> R[Rollback discards]
    ///     S --> I[Referential integrity]
    ///     S --> U[URI uniqueness]
    ///     S --> RT[store_role_type_uri]
    ///     C --> P[Publish runs under the store lock]
    /// ```

    fn link(tx: &mut Box<dyn StorageTransaction + '_>, a: i64, b: i64) -> i64 {
        let assoc = AssociationModel::new(
            "test.link",
            RoleModel::topic_id(a, "dm4.core.default").unwrap(),
            RoleModel::topic_id(b, "dm4.core.default").unwrap(),
        );
        tx.store_association(&assoc).unwrap()
    }

    #[test]
    fn test_ids_are_assigned_and_unique() {
        let storage = InMemoryGraphStorage::new();
        let mut tx = storage.begin_tx().unwrap();
        let a = tx.store_topic(&TopicModel::new("test.note")).unwrap();
        let b = tx.store_topic(&TopicModel::new("test.note")).unwrap();
        let c = link(&mut tx, a, b);
        assert!(a >= 0 && b >= 0 && c >= 0);
        assert_ne!(a, b);
        assert_ne!(b, c);
        tx.commit().unwrap();
        assert_eq!(storage.topic_count(), 2);
        assert_eq!(storage.association_count(), 1);
    }

    #[test]
    fn test_publish_runs_before_the_store_is_released() {
        let storage = InMemoryGraphStorage::new();
        let mut tx = storage.begin_tx().unwrap();
        tx.store_topic(&TopicModel::new("test.note")).unwrap();
        let mut locked_during_publish = None;
        tx.commit_with(&mut || {
            locked_during_publish = Some(storage.state.try_lock().is_none());
        })
        .unwrap();
        assert_eq!(locked_during_publish, Some(true));
        assert!(storage.state.try_lock().is_some());
        assert_eq!(storage.topic_count(), 1);
    }

    #[test]
    fn test_rollback_discards_changes() {
        let storage = InMemoryGraphStorage::new();
        let mut tx = storage.begin_tx().unwrap();
        tx.store_topic(&TopicModel::new("test.note")).unwrap();
        tx.rollback().unwrap();
        assert_eq!(storage.topic_count(), 0);

        let tx = storage.begin_tx().unwrap();
        drop(tx);
        assert_eq!(storage.topic_count(), 0);
    }

    #[test]
    fn test_player_cannot_be_deleted() {
        let storage = InMemoryGraphStorage::new();
        let mut tx = storage.begin_tx().unwrap();
        let a = tx.store_topic(&TopicModel::new("test.note")).unwrap();
        let b = tx.store_topic(&TopicModel::new("test.note")).unwrap();
        let assoc = link(&mut tx, a, b);

        assert!(matches!(tx.delete_topic(a), Err(StorageError::Conflict(_))));
        tx.delete_association(assoc).unwrap();
        tx.delete_topic(a).unwrap();
        assert!(matches!(tx.fetch_topic(a), Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn test_dangling_player_is_rejected() {
        let storage = InMemoryGraphStorage::new();
        let mut tx = storage.begin_tx().unwrap();
        let a = tx.store_topic(&TopicModel::new("test.note")).unwrap();
        let assoc = AssociationModel::new(
            "test.link",
            RoleModel::topic_id(a, "dm4.core.default").unwrap(),
            RoleModel::topic_id(99, "dm4.core.default").unwrap(),
        );
        assert!(matches!(tx.store_association(&assoc), Err(StorageError::Conflict(_))));

        let by_uri = AssociationModel::new(
            "test.link",
            RoleModel::topic_id(a, "dm4.core.default").unwrap(),
            RoleModel::topic_uri("test.x", "dm4.core.default").unwrap(),
        );
        assert!(matches!(tx.store_association(&by_uri), Err(StorageError::Backend(_))));
    }

    #[test]
    fn test_uri_uniqueness_and_lookup() {
        let storage = InMemoryGraphStorage::new();
        let mut tx = storage.begin_tx().unwrap();
        let id = tx
            .store_topic(&TopicModel::new("test.note").with_uri("test.first"))
            .unwrap();
        let dup = tx.store_topic(&TopicModel::new("test.note").with_uri("test.first"));
        assert!(matches!(dup, Err(StorageError::Conflict(_))));

        assert_eq!(tx.fetch_topic_by_uri("test.first").unwrap().unwrap().id, id);
        assert!(tx.fetch_topic_by_uri("test.second").unwrap().is_none());
        assert_eq!(tx.fetch_topics_by_type("test.note").unwrap().len(), 1);
    }

    #[test]
    fn test_store_role_type_uri() {
        let storage = InMemoryGraphStorage::new();
        let mut tx = storage.begin_tx().unwrap();
        let a = tx.store_topic(&TopicModel::new("test.note")).unwrap();
        let b = tx.store_topic(&TopicModel::new("test.note")).unwrap();
        let assoc = link(&mut tx, a, b);

        tx.store_role_type_uri(assoc, b, "dm4.core.child").unwrap();
        let stored = tx.fetch_association(assoc).unwrap();
        assert_eq!(stored.role_of(b).unwrap().role_type_uri(), "dm4.core.child");
        assert_eq!(tx.fetch_player_associations(a).unwrap().len(), 1);
        assert!(tx.store_role_type_uri(assoc, 42, "dm4.core.child").is_err());
    }

    #[test]
    fn test_children_are_not_stored() {
        let storage = InMemoryGraphStorage::new();
        let mut tx = storage.begin_tx().unwrap();
        let topic = TopicModel::new("test.person")
            .with_child("test.name", TopicModel::new("test.name").with_value("Alice"));
        let id = tx.store_topic(&topic).unwrap();
        assert!(tx.fetch_topic(id).unwrap().children.is_empty());
    }
}
