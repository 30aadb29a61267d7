//! Topic operations

use super::Transaction;
use crate::directives::Directive;
use crate::error::{CoreError, CoreResult, StorageContext};
use crate::events::CoreEvent;
use crate::model::{ChildTopicsModel, ObjectRef, TopicModel, UNASSIGNED_ID};
use crate::projections::TypeView;
use crate::storage::StoredObjects;
use crate::types::TypeKind;
use crate::value_objects::SimpleValue;
use std::sync::Arc;
use tracing::debug;

impl Transaction<'_> {
    /// A topic with its composite value
    pub fn get_topic(&mut self, id: i64) -> CoreResult<TopicModel> {
        let topic = self.fetch_topic_raw(id)?;
        self.load_composite(topic)
    }

    pub fn get_topic_by_uri(&mut self, uri: &str) -> CoreResult<TopicModel> {
        let topic = self
            .fetch_topic_by_uri_raw(uri)?
            .ok_or_else(|| CoreError::NotFound(format!("topic \"{uri}\"")))?;
        self.load_composite(topic)
    }

    /// All instances of a type, with composite values
    pub fn get_topics_by_type(&mut self, type_uri: &str) -> CoreResult<Vec<TopicModel>> {
        self.type_view(type_uri)?;
        let topics = self
            .storage()?
            .fetch_topics_by_type(type_uri)
            .with_context(|| format!("fetching instances of \"{type_uri}\""))?;
        topics
            .into_iter()
            .map(|topic| self.load_composite(topic))
            .collect()
    }

    /// Every stored topic, without composite values
    pub fn get_all_topics(&self) -> CoreResult<StoredObjects<'_, TopicModel>> {
        self.storage()?
            .fetch_all_topics()
            .with_context(|| "fetching all topics".to_string())
    }

    pub fn get_topic_type(&mut self, topic: &TopicModel) -> CoreResult<Arc<TypeView>> {
        self.type_view(&topic.type_uri)
    }

    pub(super) fn load_composite(&mut self, mut topic: TopicModel) -> CoreResult<TopicModel> {
        let view = self.type_view(&topic.type_uri)?;
        topic.children = self.load_child_topics(topic.id, &view, 0)?;
        Ok(topic)
    }

    /// Create a topic together with its composite value.
    ///
    /// The model must not be persisted yet. Simple values are checked against
    /// the type's data type; composite topics get their label computed.
    pub fn create_topic(&mut self, mut model: TopicModel) -> CoreResult<TopicModel> {
        if model.id != UNASSIGNED_ID {
            return Err(CoreError::InvalidState(format!(
                "topic {} is already persisted",
                model.id
            )));
        }
        let view = self.type_view(&model.type_uri)?;
        if view.kind() != TypeKind::Topic {
            return Err(CoreError::InvalidState(format!(
                "\"{}\" is not a topic type",
                model.type_uri
            )));
        }
        self.check_uri_free(model.uri.as_deref(), UNASSIGNED_ID)?;
        self.validate_children(&view, &model.children)?;
        self.prepare_value(&view, &mut model.value)?;

        self.fire(CoreEvent::PreCreateTopic(&model))?;
        let children = std::mem::take(&mut model.children);
        model.id = self.store_topic_raw(&model)?;
        model.children = self.store_child_topics(ObjectRef::Topic(model.id), &view, children)?;
        if view.is_composite() {
            let label = self.calculate_label(model.id, &view, &model.children)?;
            model.value = Some(SimpleValue::Text(label));
            self.store_topic_raw(&model)?;
        }
        debug!(id = model.id, type_uri = %model.type_uri, "Created topic");
        self.fire(CoreEvent::PostCreateTopic(&model))?;
        Ok(model)
    }

    /// Apply an update model with delta semantics
    pub fn update_topic(&mut self, update: TopicModel) -> CoreResult<TopicModel> {
        self.update_topic_internal(update, true)
    }

    /// Update a topic; with `propagate` the labels of its parents are refreshed
    pub(super) fn update_topic_internal(&mut self, update: TopicModel, propagate: bool) -> CoreResult<TopicModel> {
        let id = update.id;
        let stored = self.fetch_topic_raw(id)?;
        if !update.type_uri.is_empty() && update.type_uri != stored.type_uri {
            return Err(CoreError::InvalidState(format!(
                "topic {id} of type \"{}\" cannot be retyped to \"{}\"",
                stored.type_uri, update.type_uri
            )));
        }
        let view = self.type_view(&stored.type_uri)?;
        self.validate_children(&view, &update.children)?;
        if let (Some(value), false) = (&update.value, view.is_composite()) {
            value.check_data_type(view.data_type_uri())?;
        }
        if let Some(uri) = update.uri.as_deref() {
            self.check_uri_free(Some(uri), id)?;
        }

        let old = self.load_composite(stored)?;
        self.fire(CoreEvent::PreUpdateTopic {
            topic: &old,
            update: &update,
        })?;

        let mut topic = old.clone();
        if let Some(uri) = update.uri {
            topic.uri = Some(uri).filter(|uri| !uri.is_empty());
        }
        if !view.is_composite() {
            if let Some(value) = update.value {
                topic.value = Some(value);
            }
        }
        topic.children = self.update_child_topics(
            ObjectRef::Topic(id),
            &view,
            old.children.clone(),
            update.children,
        )?;
        if view.is_composite() {
            let label = self.calculate_label(id, &view, &topic.children)?;
            topic.value = Some(SimpleValue::Text(label));
        }
        self.store_topic_raw(&topic)?;
        debug!(id, type_uri = %topic.type_uri, "Updated topic");

        self.add_directive(Directive::UpdateTopic(topic.clone()));
        self.fire(CoreEvent::PostUpdateTopic {
            topic: &topic,
            old: &old,
        })?;
        if propagate {
            self.refresh_parent_labels(id, &topic.type_uri, 0)?;
        }
        Ok(topic)
    }

    pub fn set_simple_value(&mut self, id: i64, value: SimpleValue) -> CoreResult<TopicModel> {
        self.update_topic(TopicModel::update(id).with_value(value))
    }

    /// Update the composite value; slots absent from `children` are kept
    pub fn set_child_topics(&mut self, id: i64, children: ChildTopicsModel) -> CoreResult<TopicModel> {
        self.update_topic(TopicModel::update(id).with_children(children))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CoreConfig;
    use crate::error::CoreError;
    use crate::handlers::{CoreService, Transaction};
    use crate::infrastructure::InMemoryGraphStorage;
    use crate::model::{ChildTopicsModel, TopicModel, UNASSIGNED_ID};
    use crate::types::{AssociationDefinitionModel, TypeModel};
    use crate::value_objects::{uris, Cardinality, SimpleValue};
    use std::sync::Arc;

    /// Test Coverage
    ///
    /// ```mermaid
    /// graph TD
    ///     T[Topic handlers] --> C[Create with children]
    ///     T --> V[Value checks]
    ///     T --> U[Delta updates]
    ///     T --> A[Aggregation reuse]
    ///     T --> Q[Queries]
    /// ```

    fn service() -> CoreService {
        CoreService::new(Arc::new(InMemoryGraphStorage::new()), CoreConfig::default()).unwrap()
    }

    fn install(tx: &mut Transaction<'_>) {
        for (uri, data_type) in [("test.name", uris::TEXT), ("test.tag", uris::TEXT), ("test.age", uris::NUMBER)] {
            tx.create_topic_type(TypeModel::topic_type(uri, uri, data_type).unwrap())
                .unwrap();
        }
        let person = TypeModel::topic_type("test.person", "Person", uris::COMPOSITE)
            .unwrap()
            .with_assoc_def(AssociationDefinitionModel::composition("test.person", "test.name", Cardinality::One).unwrap())
            .unwrap()
            .with_assoc_def(AssociationDefinitionModel::composition("test.person", "test.age", Cardinality::One).unwrap())
            .unwrap()
            .with_assoc_def(AssociationDefinitionModel::aggregation("test.person", "test.tag", Cardinality::Many).unwrap())
            .unwrap();
        tx.create_topic_type(person).unwrap();
    }

    #[test]
    fn test_create_assigns_ids() {
        let service = service();
        let mut tx = service.begin_tx().unwrap();
        install(&mut tx);
        let model = TopicModel::new("test.person")
            .with_child("test.name", TopicModel::new("test.name").with_value("Ada"));
        assert_eq!(model.id, UNASSIGNED_ID);

        let person = tx.create_topic(model).unwrap();
        assert!(person.id >= 0);
        let name = person.children.get_one("test.name").unwrap();
        assert!(name.id() >= 0);
        assert_ne!(name.id(), person.id);
        let assoc = name.relating_assoc.as_ref().unwrap();
        assert_eq!(assoc.type_uri, uris::COMPOSITION);
        assert_eq!(assoc.role_by_type(uris::PARENT).unwrap().player_id(), Some(person.id));

        let loaded = tx.get_topic(person.id).unwrap();
        assert_eq!(loaded.children, person.children);
        assert_eq!(loaded.value, Some(SimpleValue::from("Ada")));
    }

    #[test]
    fn test_value_and_shape_checks() {
        let service = service();
        let mut tx = service.begin_tx().unwrap();
        install(&mut tx);
        assert!(matches!(
            tx.create_topic(TopicModel::new("test.age").with_value("old")),
            Err(CoreError::TypeMismatch { .. })
        ));
        let age = tx.create_topic(TopicModel::new("test.age")).unwrap();
        assert_eq!(age.value, Some(SimpleValue::Int(0)));

        assert!(matches!(
            tx.create_topic(TopicModel::new("test.person").with_child("test.unknown", TopicModel::new("test.name"))),
            Err(CoreError::InvalidState(_))
        ));
        assert!(matches!(
            tx.create_topic(TopicModel::new("test.person").with_child("test.tag", TopicModel::new("test.tag"))),
            Err(CoreError::InvalidState(_))
        ));
        assert!(matches!(
            tx.create_topic(TopicModel::new("test.missing")),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            tx.create_topic(TopicModel::new(uris::COMPOSITION)),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn test_uri_uniqueness() {
        let service = service();
        let mut tx = service.begin_tx().unwrap();
        install(&mut tx);
        let a = tx
            .create_topic(TopicModel::new("test.tag").with_uri("test.tag.rust").with_value("rust"))
            .unwrap();
        assert!(matches!(
            tx.create_topic(TopicModel::new("test.tag").with_uri("test.tag.rust")),
            Err(CoreError::InvalidState(_))
        ));
        assert_eq!(tx.get_topic_by_uri("test.tag.rust").unwrap().id, a.id);
        assert!(matches!(tx.get_topic_by_uri("test.tag.go"), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn test_delta_update_keeps_unspecified_children() {
        let service = service();
        let mut tx = service.begin_tx().unwrap();
        install(&mut tx);
        let person = tx
            .create_topic(
                TopicModel::new("test.person")
                    .with_child("test.name", TopicModel::new("test.name").with_value("Ada"))
                    .with_child("test.age", TopicModel::new("test.age").with_value(36)),
            )
            .unwrap();
        let name_id = person.children.get_one("test.name").unwrap().id();

        let mut delta = ChildTopicsModel::new();
        delta.put_one("test.name", TopicModel::new("test.name").with_value("Ada Lovelace"));
        let updated = tx.set_child_topics(person.id, delta).unwrap();

        // composition one is updated in place
        assert_eq!(updated.children.get_one("test.name").unwrap().id(), name_id);
        assert_eq!(updated.value, Some(SimpleValue::from("Ada Lovelace")));
        assert_eq!(
            updated.children.get_one("test.age").unwrap().topic.value,
            Some(SimpleValue::Int(36))
        );
        assert_eq!(tx.get_topic(person.id).unwrap().children, updated.children);

        let mut retype = TopicModel::update(person.id);
        retype.type_uri = "test.tag".to_string();
        assert!(matches!(tx.update_topic(retype), Err(CoreError::InvalidState(_))));
        assert!(matches!(
            tx.set_simple_value(name_id, SimpleValue::Int(1)),
            Err(CoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_aggregation_reuses_equal_values() {
        let service = service();
        let mut tx = service.begin_tx().unwrap();
        install(&mut tx);
        let first = tx
            .create_topic(
                TopicModel::new("test.person")
                    .with_child_in("test.tag", TopicModel::new("test.tag").with_value("rust")),
            )
            .unwrap();
        let second = tx
            .create_topic(
                TopicModel::new("test.person")
                    .with_child_in("test.tag", TopicModel::new("test.tag").with_value("rust"))
                    .with_child_in("test.tag", TopicModel::new("test.tag").with_value("go")),
            )
            .unwrap();
        let tag_of = |topic: &TopicModel, index: usize| topic.children.get_many("test.tag").unwrap()[index].id();
        assert_eq!(tag_of(&first, 0), tag_of(&second, 0));
        assert_eq!(tx.get_topics_by_type("test.tag").unwrap().len(), 2);

        // referencing by id appends to the list
        let mut delta = ChildTopicsModel::new();
        delta.add_many("test.tag", TopicModel::reference(tag_of(&second, 1)));
        let updated = tx.set_child_topics(first.id, delta).unwrap();
        assert_eq!(updated.children.get_many("test.tag").unwrap().len(), 2);
        assert_eq!(tx.get_topics_by_type("test.tag").unwrap().len(), 2);
    }

    #[test]
    fn test_aggregation_one_replacement_keeps_old_child() {
        let service = service();
        let mut tx = service.begin_tx().unwrap();
        install(&mut tx);
        let team = TypeModel::topic_type("test.team", "Team", uris::COMPOSITE)
            .unwrap()
            .with_assoc_def(AssociationDefinitionModel::aggregation("test.team", "test.tag", Cardinality::One).unwrap())
            .unwrap();
        tx.create_topic_type(team).unwrap();
        let team = tx
            .create_topic(TopicModel::new("test.team").with_child("test.tag", TopicModel::new("test.tag").with_value("red")))
            .unwrap();
        let red = team.children.get_one("test.tag").unwrap().id();

        let mut delta = ChildTopicsModel::new();
        delta.put_one("test.tag", TopicModel::new("test.tag").with_value("blue"));
        let team = tx.set_child_topics(team.id, delta).unwrap();
        assert_eq!(team.value, Some(SimpleValue::from("blue")));
        assert!(tx.get_topic(red).is_ok());
        assert_eq!(tx.get_player_associations(red).unwrap().len(), 0);
    }
}
