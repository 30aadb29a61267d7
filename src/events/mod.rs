//! Lifecycle events and the listener registry
//!
//! Every mutation point of the core fires a pre and a post event. Listeners
//! run synchronously on the request's thread, in registration order.

use crate::error::{CoreError, CoreResult};
use crate::model::{AssociationModel, TopicModel};
use crate::projections::TypeView;
use crate::types::TypeKind;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// The kinds of lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    PreCreateTopic,
    PostCreateTopic,
    PreUpdateTopic,
    PostUpdateTopic,
    PreDeleteTopic,
    PostDeleteTopic,
    PreCreateAssociation,
    PostCreateAssociation,
    PreUpdateAssociation,
    PostUpdateAssociation,
    PreDeleteAssociation,
    PostDeleteAssociation,
    PreCreateTopicType,
    PostCreateTopicType,
    PreUpdateTopicType,
    PostUpdateTopicType,
    PreDeleteTopicType,
    PostDeleteTopicType,
    PreCreateAssociationType,
    PostCreateAssociationType,
    PreUpdateAssociationType,
    PostUpdateAssociationType,
    PreDeleteAssociationType,
    PostDeleteAssociationType,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PreCreateTopic => "PRE_CREATE_TOPIC",
            EventKind::PostCreateTopic => "POST_CREATE_TOPIC",
            EventKind::PreUpdateTopic => "PRE_UPDATE_TOPIC",
            EventKind::PostUpdateTopic => "POST_UPDATE_TOPIC",
            EventKind::PreDeleteTopic => "PRE_DELETE_TOPIC",
            EventKind::PostDeleteTopic => "POST_DELETE_TOPIC",
            EventKind::PreCreateAssociation => "PRE_CREATE_ASSOCIATION",
            EventKind::PostCreateAssociation => "POST_CREATE_ASSOCIATION",
            EventKind::PreUpdateAssociation => "PRE_UPDATE_ASSOCIATION",
            EventKind::PostUpdateAssociation => "POST_UPDATE_ASSOCIATION",
            EventKind::PreDeleteAssociation => "PRE_DELETE_ASSOCIATION",
            EventKind::PostDeleteAssociation => "POST_DELETE_ASSOCIATION",
            EventKind::PreCreateTopicType => "PRE_CREATE_TOPIC_TYPE",
            EventKind::PostCreateTopicType => "POST_CREATE_TOPIC_TYPE",
            EventKind::PreUpdateTopicType => "PRE_UPDATE_TOPIC_TYPE",
            EventKind::PostUpdateTopicType => "POST_UPDATE_TOPIC_TYPE",
            EventKind::PreDeleteTopicType => "PRE_DELETE_TOPIC_TYPE",
            EventKind::PostDeleteTopicType => "POST_DELETE_TOPIC_TYPE",
            EventKind::PreCreateAssociationType => "PRE_CREATE_ASSOCIATION_TYPE",
            EventKind::PostCreateAssociationType => "POST_CREATE_ASSOCIATION_TYPE",
            EventKind::PreUpdateAssociationType => "PRE_UPDATE_ASSOCIATION_TYPE",
            EventKind::PostUpdateAssociationType => "POST_UPDATE_ASSOCIATION_TYPE",
            EventKind::PreDeleteAssociationType => "PRE_DELETE_ASSOCIATION_TYPE",
            EventKind::PostDeleteAssociationType => "POST_DELETE_ASSOCIATION_TYPE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event, borrowing the affected object
#[derive(Debug, Clone, Copy)]
pub enum CoreEvent<'a> {
    PreCreateTopic(&'a TopicModel),
    PostCreateTopic(&'a TopicModel),
    /// The stored topic and the update model about to be applied
    PreUpdateTopic {
        topic: &'a TopicModel,
        update: &'a TopicModel,
    },
    /// The updated topic and its state before the update
    PostUpdateTopic {
        topic: &'a TopicModel,
        old: &'a TopicModel,
    },
    PreDeleteTopic(&'a TopicModel),
    PostDeleteTopic(&'a TopicModel),
    PreCreateAssociation(&'a AssociationModel),
    PostCreateAssociation(&'a AssociationModel),
    PreUpdateAssociation {
        assoc: &'a AssociationModel,
        update: &'a AssociationModel,
    },
    PostUpdateAssociation {
        assoc: &'a AssociationModel,
        old: &'a AssociationModel,
    },
    PreDeleteAssociation(&'a AssociationModel),
    PostDeleteAssociation(&'a AssociationModel),
    /// The type about to be created, as a projection of the new kernel
    PreCreateType(&'a TypeView),
    PostCreateType(&'a TypeView),
    PreUpdateType(&'a TypeView),
    PostUpdateType(&'a TypeView),
    PreDeleteType(&'a TypeView),
    PostDeleteType(&'a TypeView),
}

impl CoreEvent<'_> {
    pub fn kind(&self) -> EventKind {
        use EventKind as K;
        let by_type = |view: &TypeView, topic: K, assoc: K| match view.kind() {
            TypeKind::Topic => topic,
            TypeKind::Association => assoc,
        };
        match self {
            CoreEvent::PreCreateTopic(_) => K::PreCreateTopic,
            CoreEvent::PostCreateTopic(_) => K::PostCreateTopic,
            CoreEvent::PreUpdateTopic { .. } => K::PreUpdateTopic,
            CoreEvent::PostUpdateTopic { .. } => K::PostUpdateTopic,
            CoreEvent::PreDeleteTopic(_) => K::PreDeleteTopic,
            CoreEvent::PostDeleteTopic(_) => K::PostDeleteTopic,
            CoreEvent::PreCreateAssociation(_) => K::PreCreateAssociation,
            CoreEvent::PostCreateAssociation(_) => K::PostCreateAssociation,
            CoreEvent::PreUpdateAssociation { .. } => K::PreUpdateAssociation,
            CoreEvent::PostUpdateAssociation { .. } => K::PostUpdateAssociation,
            CoreEvent::PreDeleteAssociation(_) => K::PreDeleteAssociation,
            CoreEvent::PostDeleteAssociation(_) => K::PostDeleteAssociation,
            CoreEvent::PreCreateType(v) => by_type(*v, K::PreCreateTopicType, K::PreCreateAssociationType),
            CoreEvent::PostCreateType(v) => by_type(*v, K::PostCreateTopicType, K::PostCreateAssociationType),
            CoreEvent::PreUpdateType(v) => by_type(*v, K::PreUpdateTopicType, K::PreUpdateAssociationType),
            CoreEvent::PostUpdateType(v) => by_type(*v, K::PostUpdateTopicType, K::PostUpdateAssociationType),
            CoreEvent::PreDeleteType(v) => by_type(*v, K::PreDeleteTopicType, K::PreDeleteAssociationType),
            CoreEvent::PostDeleteType(v) => by_type(*v, K::PostDeleteTopicType, K::PostDeleteAssociationType),
        }
    }
}

/// A response the transport should send instead of treating the request as failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortCircuit {
    pub status: u16,
    pub reason: String,
}

impl ShortCircuit {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    /// Conditional request: the client's copy is current
    pub fn not_modified() -> Self {
        Self::new(304, "Not Modified")
    }
}

impl fmt::Display for ShortCircuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.reason)
    }
}

/// Failure reported by a listener
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("short-circuit: {0}")]
    ShortCircuit(ShortCircuit),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Receives lifecycle events
pub trait Listener: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    fn handle(&self, event: &CoreEvent<'_>) -> Result<(), ListenerError>;
}

/// Adapts a closure into a [`Listener`]
pub struct FnListener<F> {
    name: String,
    f: F,
}

impl<F> FnListener<F>
where
    F: Fn(&CoreEvent<'_>) -> Result<(), ListenerError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Listener for FnListener<F>
where
    F: Fn(&CoreEvent<'_>) -> Result<(), ListenerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &CoreEvent<'_>) -> Result<(), ListenerError> {
        (self.f)(event)
    }
}

/// Listener registry, keyed by event kind
#[derive(Default)]
pub struct EventManager {
    listeners: RwLock<HashMap<EventKind, Vec<Arc<dyn Listener>>>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, kind: EventKind, listener: Arc<dyn Listener>) {
        debug!(event = %kind, listener = listener.name(), "Adding listener");
        self.listeners.write().entry(kind).or_default().push(listener);
    }

    /// Remove a listener by identity; returns whether it was registered
    pub fn remove_listener(&self, kind: EventKind, listener: &Arc<dyn Listener>) -> bool {
        let mut listeners = self.listeners.write();
        let Some(registered) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|l| !Arc::ptr_eq(l, listener));
        before != registered.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    /// Deliver an event to the listeners registered for its kind.
    ///
    /// The first failing listener stops delivery. A short-circuit passes
    /// through unwrapped; anything else is wrapped with the listener's name.
    pub fn fire_event(&self, event: &CoreEvent<'_>) -> CoreResult<()> {
        let kind = event.kind();
        let snapshot: Vec<Arc<dyn Listener>> = match self.listeners.read().get(&kind) {
            Some(listeners) => listeners.clone(),
            None => return Ok(()),
        };
        for listener in snapshot {
            match listener.handle(event) {
                Ok(()) => {}
                Err(ListenerError::ShortCircuit(short_circuit)) => {
                    debug!(event = %kind, listener = listener.name(), %short_circuit, "Listener short-circuited");
                    return Err(CoreError::ShortCircuit(short_circuit));
                }
                Err(ListenerError::Failed(source)) => {
                    warn!(event = %kind, listener = listener.name(), error = %source, "Listener failed");
                    return Err(CoreError::Listener {
                        listener: listener.name().to_string(),
                        event: kind,
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("EventManager")
            .field("kinds", &listeners.len())
            .field("listeners", &listeners.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Test Coverage
    ///
    /// ```mermaid
    /// graph TD
    ///     EM[EventManager] --> O[Registration order]
    ///     EM --> S[First failure stops delivery]
    ///     EM --> SC[Short-circuit unwrapped]
    ///     EM --> R[remove_listener]
    ///     EM --> D[Registration during delivery]
    /// ```

    fn recorder(name: &str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Listener> {
        let name_owned = name.to_string();
        Arc::new(FnListener::new(name, move |_event: &CoreEvent<'_>| {
            log.lock().push(name_owned.clone());
            Ok(())
        }))
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let manager = EventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        manager.add_listener(EventKind::PostCreateTopic, recorder("a", log.clone()));
        manager.add_listener(EventKind::PostCreateTopic, recorder("b", log.clone()));
        manager.add_listener(EventKind::PreCreateTopic, recorder("other", log.clone()));

        let topic = TopicModel::new("test.note");
        manager.fire_event(&CoreEvent::PostCreateTopic(&topic)).unwrap();
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_failure_stops_delivery_and_is_wrapped() {
        let manager = EventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        manager.add_listener(
            EventKind::PreDeleteTopic,
            Arc::new(FnListener::new("veto", |_event: &CoreEvent<'_>| {
                Err(ListenerError::Failed(anyhow::anyhow!("not allowed")))
            })),
        );
        manager.add_listener(EventKind::PreDeleteTopic, recorder("late", log.clone()));

        let topic = TopicModel::new("test.note");
        match manager.fire_event(&CoreEvent::PreDeleteTopic(&topic)) {
            Err(CoreError::Listener { listener, event, .. }) => {
                assert_eq!(listener, "veto");
                assert_eq!(event, EventKind::PreDeleteTopic);
            }
            other => panic!("Expected Listener error, got {other:?}"),
        }
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_short_circuit_passes_through_unwrapped() {
        let manager = EventManager::new();
        manager.add_listener(
            EventKind::PreUpdateTopic,
            Arc::new(FnListener::new("etag", |_event: &CoreEvent<'_>| {
                Err(ListenerError::ShortCircuit(ShortCircuit::not_modified()))
            })),
        );
        let topic = TopicModel::new("test.note");
        let err = manager
            .fire_event(&CoreEvent::PreUpdateTopic {
                topic: &topic,
                update: &topic,
            })
            .unwrap_err();
        match err {
            CoreError::ShortCircuit(sc) => assert_eq!(sc.status, 304),
            other => panic!("Expected ShortCircuit, got {other:?}"),
        }
    }

    #[test]
    fn test_remove_listener_by_identity() {
        let manager = EventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = recorder("a", log.clone());
        manager.add_listener(EventKind::PostDeleteTopic, listener.clone());
        manager.add_listener(EventKind::PostDeleteTopic, recorder("a", log));
        assert_eq!(manager.listener_count(EventKind::PostDeleteTopic), 2);

        assert!(manager.remove_listener(EventKind::PostDeleteTopic, &listener));
        assert!(!manager.remove_listener(EventKind::PostDeleteTopic, &listener));
        assert_eq!(manager.listener_count(EventKind::PostDeleteTopic), 1);
    }

    #[test]
    fn test_listener_may_register_during_delivery() {
        let manager = Arc::new(EventManager::new());
        let weak = Arc::downgrade(&manager);
        manager.add_listener(
            EventKind::PostCreateTopic,
            Arc::new(FnListener::new("registrar", move |_event: &CoreEvent<'_>| {
                if let Some(manager) = weak.upgrade() {
                    manager.add_listener(
                        EventKind::PostCreateTopic,
                        Arc::new(FnListener::new("late", |_event: &CoreEvent<'_>| Ok(()))),
                    );
                }
                Ok(())
            })),
        );
        let topic = TopicModel::new("test.note");
        manager.fire_event(&CoreEvent::PostCreateTopic(&topic)).unwrap();
        assert_eq!(manager.listener_count(EventKind::PostCreateTopic), 2);
    }

    #[test]
    fn test_type_events_map_by_type_kind() {
        let kernel = crate::types::TypeModel::association_type("test.owns", "Owns", "dm4.core.text").unwrap();
        let view = TypeView::project(&kernel);
        assert_eq!(
            CoreEvent::PostUpdateType(&view).kind(),
            EventKind::PostUpdateAssociationType
        );
        assert_eq!(EventKind::PreDeleteTopicType.to_string(), "PRE_DELETE_TOPIC_TYPE");
    }
}
