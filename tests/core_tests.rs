//! Core Integration Tests

use deepamehta_core::{
    uris, AssociationDefinitionModel, Cardinality, CoreConfig, CoreError, CoreEvent, CoreService,
    DirectiveKind, Directives, DirectivesPublisher, EventKind, FnListener, InMemoryGraphStorage,
    ListenerError, ShortCircuit, SimpleValue, TopicModel, TypeModel, UNASSIGNED_ID,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

/// person = (name: composition one, account: aggregation many)
fn person_service() -> (Arc<InMemoryGraphStorage>, CoreService) {
    let storage = Arc::new(InMemoryGraphStorage::new());
    let service = CoreService::new(storage.clone(), CoreConfig::default()).unwrap();
    let mut tx = service.begin_tx().unwrap();
    tx.create_topic_type(TypeModel::topic_type("test.name", "Name", uris::TEXT).unwrap())
        .unwrap();
    tx.create_topic_type(TypeModel::topic_type("test.account", "Account", uris::TEXT).unwrap())
        .unwrap();
    let person = TypeModel::topic_type("test.person", "Person", uris::COMPOSITE)
        .unwrap()
        .with_assoc_def(AssociationDefinitionModel::composition("test.person", "test.name", Cardinality::One).unwrap())
        .unwrap()
        .with_assoc_def(
            AssociationDefinitionModel::aggregation("test.person", "test.account", Cardinality::Many).unwrap(),
        )
        .unwrap();
    tx.create_topic_type(person).unwrap();
    tx.commit().unwrap();
    (storage, service)
}

fn person(name: &str) -> TopicModel {
    TopicModel::new("test.person").with_child("test.name", TopicModel::new("test.name").with_value(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleting_a_person_spares_referenced_accounts() {
        let (_storage, service) = person_service();
        let mut tx = service.begin_tx().unwrap();
        let ada = tx
            .create_topic(person("Ada").with_child_in("test.account", TopicModel::new("test.account").with_value("ada@host")))
            .unwrap();
        let account_id = ada.children.get_many("test.account").unwrap()[0].id();
        let grace = tx
            .create_topic(person("Grace").with_child_in("test.account", TopicModel::reference(account_id)))
            .unwrap();
        let name_id = ada.children.get_one("test.name").unwrap().id();
        tx.commit().unwrap();

        let mut tx = service.begin_tx().unwrap();
        tx.delete_topic(ada.id).unwrap();
        assert_eq!(
            tx.directives().kinds(),
            vec![
                DirectiveKind::DeleteAssociation,
                DirectiveKind::DeleteTopic,
                DirectiveKind::DeleteAssociation,
                DirectiveKind::DeleteTopic,
            ]
        );
        assert!(matches!(tx.get_topic(name_id), Err(CoreError::NotFound(_))));
        assert_eq!(tx.get_topic(account_id).unwrap().value, Some(SimpleValue::from("ada@host")));
        let grace = tx.get_topic(grace.id).unwrap();
        assert_eq!(grace.children.get_many("test.account").unwrap()[0].id(), account_id);
        assert_eq!(tx.get_player_associations(account_id).unwrap().len(), 1);
    }

    #[test]
    fn test_type_directive_precedes_dependent_instance_update() {
        let (_storage, service) = person_service();
        let mut tx = service.begin_tx().unwrap();
        let ada = tx.create_topic(person("Ada")).unwrap();
        tx.commit().unwrap();

        let mut tx = service.begin_tx().unwrap();
        tx.update_type_uri("test.name", "test.full_name").unwrap();
        let mut children = deepamehta_core::ChildTopicsModel::new();
        children.put_one("test.full_name", TopicModel::new("test.full_name").with_value("Ada Lovelace"));
        let updated = tx.set_child_topics(ada.id, children).unwrap();
        assert_eq!(updated.value, Some(SimpleValue::from("Ada Lovelace")));

        let kinds = tx.directives().kinds();
        let last_type = kinds.iter().rposition(|k| *k == DirectiveKind::UpdateTopicType).unwrap();
        let first_instance = kinds.iter().position(|k| *k == DirectiveKind::UpdateTopic).unwrap();
        assert!(last_type < first_instance);
        assert_eq!(kinds.last(), Some(&DirectiveKind::UpdateTopic));
    }

    #[test]
    fn test_rename_re_keys_parent_types_loaded_from_storage() {
        let (storage, service) = person_service();
        drop(service);
        let service = CoreService::new(storage, CoreConfig::default()).unwrap();
        service.type_cache().clear();

        let mut tx = service.begin_tx().unwrap();
        tx.update_type_uri("test.name", "test.full_name").unwrap();
        assert_eq!(
            tx.directives().kinds(),
            vec![DirectiveKind::UpdateTopicType, DirectiveKind::UpdateTopicType]
        );
        let person = tx.type_view("test.person").unwrap();
        assert!(person.assoc_def("test.full_name").is_ok());
        tx.commit().unwrap();

        let cached = service.type_cache().get("test.person").unwrap();
        assert!(cached.assoc_def("test.full_name").is_ok());
        assert!(cached.assoc_def("test.name").is_err());
    }

    #[test]
    fn test_duplicate_assoc_def_is_rejected() {
        let (_storage, service) = person_service();
        let mut tx = service.begin_tx().unwrap();
        let def = || AssociationDefinitionModel::composition("test.person", "test.name", Cardinality::One).unwrap();
        assert!(matches!(
            tx.add_assoc_def("test.person", def(), None),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn test_wire_form_round_trip() {
        let (_storage, service) = person_service();
        let mut tx = service.begin_tx().unwrap();
        let ada = tx
            .create_topic(person("Ada").with_child_in("test.account", TopicModel::new("test.account").with_value("ada@host")))
            .unwrap();

        let json = serde_json::to_value(&ada).unwrap();
        assert_eq!(json["type_uri"], "test.person");
        assert_eq!(json["children"]["test.name"]["value"], "Ada");
        assert!(json["children"]["test.account"].is_array());

        let back: TopicModel = serde_json::from_value(json).unwrap();
        assert_eq!(back.type_uri, ada.type_uri);
        assert_eq!(back.value, ada.value);
        assert_eq!(back.children, ada.children);
    }

    #[test]
    fn test_short_circuit_passes_through_unwrapped() {
        let (storage, service) = person_service();
        service.events().add_listener(
            EventKind::PreCreateTopic,
            Arc::new(FnListener::new("conditional", |_event: &CoreEvent<'_>| {
                Err(ListenerError::ShortCircuit(ShortCircuit::not_modified()))
            })),
        );
        let before = storage.topic_count();
        let mut tx = service.begin_tx().unwrap();
        match tx.create_topic(TopicModel::new("test.name").with_value("x")) {
            Err(CoreError::ShortCircuit(short_circuit)) => assert_eq!(short_circuit.status, 304),
            other => panic!("Expected short-circuit, got {other:?}"),
        }
        drop(tx);
        assert_eq!(storage.topic_count(), before);
    }

    #[test]
    fn test_listener_failure_rolls_back_the_request() {
        let (storage, service) = person_service();
        service.events().add_listener(
            EventKind::PostCreateTopic,
            Arc::new(FnListener::new("audit", |event: &CoreEvent<'_>| match event {
                CoreEvent::PostCreateTopic(topic) if topic.type_uri == "test.person" => {
                    Err(ListenerError::Failed(anyhow::anyhow!("audit log unavailable")))
                }
                _ => Ok(()),
            })),
        );
        let before = storage.topic_count();
        let mut tx = service.begin_tx().unwrap();
        assert!(matches!(
            tx.create_topic(person("Ada")),
            Err(CoreError::Listener { event: EventKind::PostCreateTopic, .. })
        ));
        drop(tx);
        assert_eq!(storage.topic_count(), before);
    }

    #[test]
    fn test_type_changes_reach_the_cache_only_on_commit() {
        let (_storage, service) = person_service();
        let mut tx = service.begin_tx().unwrap();
        tx.update_child_cardinality_uri("test.person", "test.name", uris::MANY)
            .unwrap();
        let committed = service.type_cache().get("test.person").unwrap();
        assert_eq!(committed.assoc_def("test.name").unwrap().child_cardinality, Cardinality::One);
        tx.commit().unwrap();
        let committed = service.type_cache().get("test.person").unwrap();
        assert_eq!(committed.assoc_def("test.name").unwrap().child_cardinality, Cardinality::Many);
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<Directives>>,
    }

    #[async_trait]
    impl DirectivesPublisher for RecordingPublisher {
        async fn publish(&self, directives: &Directives) -> anyhow::Result<()> {
            self.published.lock().push(directives.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_request_publishes_committed_directives() {
        let (_storage, service) = person_service();
        let publisher = Arc::new(RecordingPublisher::default());
        let service = Arc::new(service.with_publisher(publisher.clone()));

        let (ada, directives) = service
            .run_request(|tx| {
                let ada = tx.create_topic(person("Ada"))?;
                tx.set_simple_value(ada.children.get_one("test.name").map_or(UNASSIGNED_ID, |c| c.id()), "Ada L.".into())
            })
            .await
            .unwrap();
        assert_eq!(ada.value, Some(SimpleValue::from("Ada L.")));
        assert_eq!(
            directives.kinds(),
            vec![DirectiveKind::UpdateTopic, DirectiveKind::UpdateTopic]
        );
        assert_eq!(publisher.published.lock().as_slice(), &[directives]);

        let failed = service
            .run_request(|tx| tx.create_topic(TopicModel::new("test.unknown")))
            .await;
        assert!(matches!(failed, Err(CoreError::NotFound(_))));
        assert_eq!(publisher.published.lock().len(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_ids_are_assigned_on_persistence(values in proptest::collection::vec("[a-z]{1,8}", 1..8)) {
            let (_storage, service) = person_service();
            let mut tx = service.begin_tx().unwrap();
            let mut ids = std::collections::HashSet::new();
            for value in values {
                let model = TopicModel::new("test.account").with_value(value);
                prop_assert_eq!(model.id, UNASSIGNED_ID);
                let stored = tx.create_topic(model).unwrap();
                prop_assert!(stored.id >= 0);
                prop_assert!(ids.insert(stored.id));
            }
        }
    }
}
