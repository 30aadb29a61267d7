//! Cascading delete
//!
//! Deleting an object first deletes its composition children depth-first,
//! then its settings topics and every association it still plays a role in,
//! and finally the object itself. Aggregated children survive; only the
//! relating association goes.

use super::types::is_type_topic;
use super::Transaction;
use crate::directives::Directive;
use crate::error::{CoreError, CoreResult};
use crate::events::CoreEvent;
use crate::model::{ObjectRef, RoleModel};
use crate::projections::TypeView;
use crate::value_objects::uris;
use std::collections::HashSet;
use tracing::debug;

/// Objects already handled by one delete cascade
#[derive(Debug, Default)]
pub(super) struct Cascade {
    visited: HashSet<i64>,
}

impl Cascade {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// A cascade that treats `id` as already handled, so its label is left alone
    pub(super) fn sparing(id: i64) -> Self {
        let mut cascade = Self::new();
        cascade.visited.insert(id);
        cascade
    }

    fn enter(&mut self, id: i64) -> bool {
        self.visited.insert(id)
    }

    fn has_visited(&self, id: i64) -> bool {
        self.visited.contains(&id)
    }
}

impl Transaction<'_> {
    pub fn delete_topic(&mut self, id: i64) -> CoreResult<()> {
        self.delete_topic_in(id, &mut Cascade::new(), 0)
    }

    pub fn delete_association(&mut self, id: i64) -> CoreResult<()> {
        self.delete_association_in(id, &mut Cascade::new(), 0)
    }

    fn check_cascade_depth(&self, object: ObjectRef, depth: usize) -> CoreResult<()> {
        if depth > self.max_depth() {
            return Err(CoreError::InvalidState(format!(
                "deleting {object} exceeds the cascade depth of {}",
                self.max_depth()
            )));
        }
        Ok(())
    }

    pub(super) fn delete_topic_in(&mut self, id: i64, cascade: &mut Cascade, depth: usize) -> CoreResult<()> {
        if !cascade.enter(id) {
            return Ok(());
        }
        self.check_cascade_depth(ObjectRef::Topic(id), depth)?;
        let stored = self.fetch_topic_raw(id)?;
        if is_type_topic(&stored.type_uri) {
            return Err(CoreError::InvalidState(format!(
                "topic {id} is a type; delete it as a type"
            )));
        }
        let view = self.type_view(&stored.type_uri)?;
        let topic = self.load_composite(stored)?;

        self.fire(CoreEvent::PreDeleteTopic(&topic))?;
        self.delete_dependents(id, &view, cascade, depth)?;
        self.delete_topic_raw(id)?;
        debug!(id, type_uri = %topic.type_uri, "Deleted topic");
        self.add_directive(Directive::DeleteTopic(topic.clone()));
        self.fire(CoreEvent::PostDeleteTopic(&topic))?;
        Ok(())
    }

    pub(super) fn delete_association_in(
        &mut self,
        id: i64,
        cascade: &mut Cascade,
        depth: usize,
    ) -> CoreResult<()> {
        if !cascade.enter(id) {
            return Ok(());
        }
        self.check_cascade_depth(ObjectRef::Association(id), depth)?;
        let assoc = self.get_association(id)?;
        let view = self.type_view(&assoc.type_uri)?;

        self.fire(CoreEvent::PreDeleteAssociation(&assoc))?;
        self.delete_dependents(id, &view, cascade, depth)?;
        self.delete_association_raw(id)?;
        debug!(id, type_uri = %assoc.type_uri, "Deleted association");
        self.add_directive(Directive::DeleteAssociation(assoc.clone()));
        self.fire(CoreEvent::PostDeleteAssociation(&assoc))?;

        // a parent that lost a child gets a fresh label
        let parent_id = match (assoc.role_by_type(uris::PARENT), assoc.role_by_type(uris::CHILD)) {
            (Some(RoleModel::Topic(parent)), Some(_)) => parent.topic_id(),
            _ => None,
        };
        if let Some(parent_id) = parent_id.filter(|parent_id| !cascade.has_visited(*parent_id)) {
            if let Some(parent) = self.refresh_label(parent_id)? {
                self.refresh_parent_labels(parent.id, &parent.type_uri, 0)?;
            }
        }
        Ok(())
    }

    /// Composition children, settings topics and remaining associations of an object
    fn delete_dependents(
        &mut self,
        id: i64,
        view: &TypeView,
        cascade: &mut Cascade,
        depth: usize,
    ) -> CoreResult<()> {
        for def in view.assoc_defs().iter().filter(|def| def.is_composition()) {
            for child in self.fetch_children(id, def, None)? {
                self.delete_topic_in(child.id(), cascade, depth + 1)?;
            }
        }
        self.delete_view_config_topics(id)?;
        for assoc in self.player_associations(id)? {
            self.delete_association_in(assoc.id, cascade, depth + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CoreConfig;
    use crate::directives::DirectiveKind;
    use crate::error::CoreError;
    use crate::events::{EventKind, FnListener, ListenerError};
    use crate::handlers::CoreService;
    use crate::infrastructure::InMemoryGraphStorage;
    use crate::model::TopicModel;
    use crate::types::{AssociationDefinitionModel, TypeModel};
    use crate::value_objects::{uris, Cardinality, SimpleValue};
    use std::sync::Arc;

    /// Test Coverage
    ///
    /// ```mermaid
    /// graph TD
    ///     D[Cascading delete] --> C[Composition children first]
    ///     D --> A[Aggregated children survive]
    ///     D --> L[Former parent label refresh]
    ///     D --> X[Depth bound]
    ///     D --> R[Listener failure aborts]
    /// ```

    fn service_with(config: CoreConfig) -> CoreService {
        let service = CoreService::new(Arc::new(InMemoryGraphStorage::new()), config).unwrap();
        let mut tx = service.begin_tx().unwrap();
        for uri in ["test.item", "test.name", "test.tag"] {
            tx.create_topic_type(TypeModel::topic_type(uri, uri, uris::TEXT).unwrap())
                .unwrap();
        }
        let list = TypeModel::topic_type("test.list", "List", uris::COMPOSITE)
            .unwrap()
            .with_assoc_def(AssociationDefinitionModel::composition("test.list", "test.item", Cardinality::Many).unwrap())
            .unwrap();
        tx.create_topic_type(list).unwrap();
        let entry = TypeModel::topic_type("test.entry", "Entry", uris::COMPOSITE)
            .unwrap()
            .with_assoc_def(AssociationDefinitionModel::composition("test.entry", "test.name", Cardinality::One).unwrap())
            .unwrap()
            .with_assoc_def(AssociationDefinitionModel::aggregation("test.entry", "test.tag", Cardinality::Many).unwrap())
            .unwrap()
            .with_label_config(["test.name", "test.tag"])
            .unwrap();
        tx.create_topic_type(entry).unwrap();
        let folder = TypeModel::topic_type("test.folder", "Folder", uris::COMPOSITE)
            .unwrap()
            .with_assoc_def(AssociationDefinitionModel::composition("test.folder", "test.list", Cardinality::One).unwrap())
            .unwrap();
        tx.create_topic_type(folder).unwrap();
        tx.commit().unwrap();
        service
    }

    fn service() -> CoreService {
        service_with(CoreConfig::default())
    }

    fn list_of(items: &[&str]) -> TopicModel {
        items.iter().fold(TopicModel::new("test.list"), |list, item| {
            list.with_child_in("test.item", TopicModel::new("test.item").with_value(*item))
        })
    }

    #[test]
    fn test_composition_children_are_deleted_before_the_parent() {
        let service = service();
        let mut tx = service.begin_tx().unwrap();
        let list = tx.create_topic(list_of(&["a", "b", "c"])).unwrap();
        tx.commit().unwrap();

        let mut tx = service.begin_tx().unwrap();
        tx.delete_topic(list.id).unwrap();
        assert_eq!(
            tx.directives().kinds(),
            vec![
                DirectiveKind::DeleteAssociation,
                DirectiveKind::DeleteTopic,
                DirectiveKind::DeleteAssociation,
                DirectiveKind::DeleteTopic,
                DirectiveKind::DeleteAssociation,
                DirectiveKind::DeleteTopic,
                DirectiveKind::DeleteTopic,
            ]
        );
        assert_eq!(tx.directives().iter().last().and_then(|d| d.object_id()), Some(list.id));
        assert_eq!(tx.get_all_topics().unwrap().filter(|t| t.type_uri == "test.item").count(), 0);
    }

    #[test]
    fn test_aggregated_children_survive() {
        let service = service();
        let mut tx = service.begin_tx().unwrap();
        let entry = tx
            .create_topic(
                TopicModel::new("test.entry")
                    .with_child("test.name", TopicModel::new("test.name").with_value("first"))
                    .with_child_in("test.tag", TopicModel::new("test.tag").with_value("shared")),
            )
            .unwrap();
        let other = tx
            .create_topic(
                TopicModel::new("test.entry")
                    .with_child("test.name", TopicModel::new("test.name").with_value("second"))
                    .with_child_in("test.tag", TopicModel::new("test.tag").with_value("shared")),
            )
            .unwrap();
        let tag_id = entry.children.get_many("test.tag").unwrap()[0].id();
        let name_id = entry.children.get_one("test.name").unwrap().id();

        tx.delete_topic(entry.id).unwrap();
        assert!(matches!(tx.get_topic(name_id), Err(CoreError::NotFound(_))));
        assert_eq!(tx.get_topic(tag_id).unwrap().value, Some(SimpleValue::from("shared")));
        let other = tx.get_topic(other.id).unwrap();
        assert_eq!(other.children.get_many("test.tag").unwrap()[0].id(), tag_id);
        assert_eq!(tx.get_player_associations(tag_id).unwrap().len(), 1);
    }

    #[test]
    fn test_deleting_a_child_refreshes_the_former_parent() {
        let service = service();
        let mut tx = service.begin_tx().unwrap();
        let entry = tx
            .create_topic(
                TopicModel::new("test.entry")
                    .with_child("test.name", TopicModel::new("test.name").with_value("Foo"))
                    .with_child_in("test.tag", TopicModel::new("test.tag").with_value("Bar")),
            )
            .unwrap();
        assert_eq!(entry.value, Some(SimpleValue::from("Foo Bar")));
        let tag = entry.children.get_many("test.tag").unwrap()[0].clone();
        tx.commit().unwrap();

        let mut tx = service.begin_tx().unwrap();
        tx.delete_association(tag.relating_assoc.unwrap().id).unwrap();
        assert_eq!(tx.get_topic(entry.id).unwrap().value, Some(SimpleValue::from("Foo")));
        assert_eq!(
            tx.directives().kinds(),
            vec![DirectiveKind::DeleteAssociation, DirectiveKind::UpdateTopic]
        );
    }

    #[test]
    fn test_cascade_depth_is_bounded() {
        let service = service_with(CoreConfig {
            max_cascade_depth: 1,
            ..CoreConfig::default()
        });
        let mut tx = service.begin_tx().unwrap();
        let folder = tx
            .create_topic(TopicModel::new("test.folder").with_child("test.list", list_of(&["a"])))
            .unwrap();
        assert!(matches!(tx.delete_topic(folder.id), Err(CoreError::InvalidState(_))));
    }

    #[test]
    fn test_type_topics_are_refused() {
        let service = service();
        let mut tx = service.begin_tx().unwrap();
        let list_type = tx.type_view("test.list").unwrap();
        assert!(matches!(tx.delete_topic(list_type.id()), Err(CoreError::InvalidState(_))));
    }

    #[test]
    fn test_listener_failure_aborts_the_delete() {
        let service = service();
        let mut tx = service.begin_tx().unwrap();
        let list = tx.create_topic(list_of(&["a", "b"])).unwrap();
        tx.commit().unwrap();

        service.events().add_listener(
            EventKind::PreDeleteTopic,
            Arc::new(FnListener::new("veto", |event| match event {
                crate::events::CoreEvent::PreDeleteTopic(topic) if topic.type_uri == "test.list" => {
                    Err(ListenerError::Failed(anyhow::anyhow!("lists are forever")))
                }
                _ => Ok(()),
            })),
        );
        let mut tx = service.begin_tx().unwrap();
        assert!(matches!(
            tx.delete_topic(list.id),
            Err(CoreError::Listener { event: EventKind::PreDeleteTopic, .. })
        ));
        drop(tx);

        let mut tx = service.begin_tx().unwrap();
        assert_eq!(tx.get_topic(list.id).unwrap().children.get_many("test.item").unwrap().len(), 2);
    }
}
