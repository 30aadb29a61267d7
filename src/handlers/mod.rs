//! Persistence and transaction orchestration
//!
//! [`CoreService`] owns the process-wide collaborators (storage backend, type
//! cache, listener registry). Each request runs in one [`Transaction`], which
//! owns the storage transaction, a staged overlay of type changes and the
//! request's [`Directives`].
//!
//! Any error aborts the whole request: dropping an uncommitted transaction
//! rolls the storage back and discards staged type changes.

mod associations;
mod bootstrap;
mod delete;
mod labels;
mod topics;
mod type_storage;
mod types;
mod values;
mod view_config;

use crate::config::CoreConfig;
use crate::directives::{Directive, Directives, DirectivesPublisher};
use crate::error::{CoreError, CoreResult, StorageContext};
use crate::events::{CoreEvent, EventManager};
use crate::model::{AssociationModel, DeepaMehtaObjectModel, ObjectRef, RoleModel, TopicModel};
use crate::projections::TypeView;
use crate::storage::{GraphStorage, StorageTransaction};
use crate::types::{CachedType, TypeCache, TypeKind};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Process-scoped core services, shared between requests
pub struct CoreService {
    storage: Arc<dyn GraphStorage>,
    type_cache: Arc<TypeCache>,
    events: Arc<EventManager>,
    publisher: Option<Arc<dyn DirectivesPublisher>>,
    config: CoreConfig,
}

impl CoreService {
    /// Start a core over the given storage with fresh cache and listener registry
    pub fn new(storage: Arc<dyn GraphStorage>, config: CoreConfig) -> CoreResult<Self> {
        Self::with_services(
            storage,
            Arc::new(TypeCache::new()),
            Arc::new(EventManager::new()),
            config,
        )
    }

    /// Start a core with injected cache and listener registry
    pub fn with_services(
        storage: Arc<dyn GraphStorage>,
        type_cache: Arc<TypeCache>,
        events: Arc<EventManager>,
        config: CoreConfig,
    ) -> CoreResult<Self> {
        let service = Self {
            storage,
            type_cache,
            events,
            publisher: None,
            config,
        };
        service.start()?;
        Ok(service)
    }

    /// Hand the directives of every request run through [`run_request`](Self::run_request) to `publisher`
    pub fn with_publisher(mut self, publisher: Arc<dyn DirectivesPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    fn start(&self) -> CoreResult<()> {
        let mut tx = self.begin_tx()?;
        if self.config.bootstrap_meta_model {
            tx.install_meta_model()?;
        }
        if self.config.preload_types {
            let types = tx.get_all_types()?;
            info!(count = types.len(), "Preloaded types");
        }
        tx.commit()?;
        Ok(())
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn type_cache(&self) -> &TypeCache {
        &self.type_cache
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    /// Open a transaction for one request
    pub fn begin_tx(&self) -> CoreResult<Transaction<'_>> {
        let storage = self
            .storage
            .begin_tx()
            .with_context(|| "beginning a transaction".to_string())?;
        Ok(Transaction {
            service: self,
            storage: Some(storage),
            staged_types: HashMap::new(),
            directives: Directives::new(),
            started_at: Utc::now(),
        })
    }

    /// Run one request on a blocking worker inside its own transaction.
    ///
    /// The transaction is committed when `request` succeeds; the directives
    /// are then handed to the configured publisher and returned.
    pub async fn run_request<F, T>(self: &Arc<Self>, request: F) -> CoreResult<(T, Directives)>
    where
        F: FnOnce(&mut Transaction<'_>) -> CoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let service = Arc::clone(self);
        let (value, directives) = tokio::task::spawn_blocking(move || {
            let mut tx = service.begin_tx()?;
            let value = request(&mut tx)?;
            let directives = tx.commit()?;
            Ok::<_, CoreError>((value, directives))
        })
        .await
        .map_err(|err| CoreError::RequestAborted(err.to_string()))??;

        if let Some(publisher) = &self.publisher {
            if let Err(err) = publisher.publish(&directives).await {
                warn!(
                    request_id = %directives.request_id,
                    error = %err,
                    "Publishing directives failed"
                );
            }
        }
        Ok((value, directives))
    }

    /// Drop cached types and registered listeners
    pub fn shutdown(&self) {
        self.type_cache.clear();
        self.events.clear();
        info!("Core service shut down");
    }
}

/// A type change staged by a transaction
#[derive(Debug, Clone)]
enum StagedType {
    Put(CachedType),
    Removed,
}

/// Request-scoped unit of work
pub struct Transaction<'a> {
    service: &'a CoreService,
    storage: Option<Box<dyn StorageTransaction + 'a>>,
    staged_types: HashMap<String, StagedType>,
    directives: Directives,
    started_at: DateTime<Utc>,
}

impl<'a> Transaction<'a> {
    /// Directives recorded so far
    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    pub(crate) fn add_directive(&mut self, directive: Directive) {
        self.directives.add(directive);
    }

    fn add_type_directive(&mut self, view: &Arc<TypeView>) {
        let directive = match view.kind() {
            TypeKind::Topic => Directive::UpdateTopicType(TypeView::clone(view)),
            TypeKind::Association => Directive::UpdateAssociationType(TypeView::clone(view)),
        };
        self.add_directive(directive);
    }

    fn fire(&self, event: CoreEvent<'_>) -> CoreResult<()> {
        self.service.events.fire_event(&event)
    }

    fn max_depth(&self) -> usize {
        self.service.config.max_cascade_depth
    }

    /// Commit storage and return the directives.
    ///
    /// Staged types reach the cache before the storage transaction releases
    /// other writers.
    pub fn commit(mut self) -> CoreResult<Directives> {
        let storage = self.take_storage()?;
        let service = self.service;
        let type_cache = &service.type_cache;
        let mut staged = Some(std::mem::take(&mut self.staged_types));
        let published = staged.as_ref().map_or(0, HashMap::len);
        storage
            .commit_with(&mut || {
                for (uri, change) in staged.take().into_iter().flatten() {
                    match change {
                        StagedType::Put(cached) => type_cache.put(cached),
                        StagedType::Removed => {
                            type_cache.invalidate(&uri);
                        }
                    }
                }
            })
            .with_context(|| "committing the transaction".to_string())?;

        let directives = std::mem::take(&mut self.directives);
        let elapsed = Utc::now() - self.started_at;
        info!(
            request_id = %directives.request_id,
            directives = directives.len(),
            types = published,
            elapsed_ms = elapsed.num_milliseconds(),
            "Transaction committed"
        );
        Ok(directives)
    }

    /// Discard all changes of this transaction
    pub fn rollback(mut self) -> CoreResult<()> {
        let storage = self.take_storage()?;
        self.staged_types.clear();
        warn!(request_id = %self.directives.request_id, "Transaction rolled back");
        storage
            .rollback()
            .with_context(|| "rolling back the transaction".to_string())
    }

    fn take_storage(&mut self) -> CoreResult<Box<dyn StorageTransaction + 'a>> {
        self.storage
            .take()
            .ok_or_else(|| CoreError::InvalidState("transaction is already finished".to_string()))
    }

    fn storage(&self) -> CoreResult<&(dyn StorageTransaction + 'a)> {
        self.storage
            .as_deref()
            .ok_or_else(|| CoreError::InvalidState("transaction is already finished".to_string()))
    }

    fn storage_mut(&mut self) -> CoreResult<&mut (dyn StorageTransaction + 'a)> {
        self.storage
            .as_deref_mut()
            .ok_or_else(|| CoreError::InvalidState("transaction is already finished".to_string()))
    }

    // Low-level storage access; no events, no directives.

    fn fetch_topic_raw(&self, id: i64) -> CoreResult<TopicModel> {
        self.storage()?
            .fetch_topic(id)
            .with_context(|| format!("fetching topic {id}"))
    }

    fn fetch_association_raw(&self, id: i64) -> CoreResult<AssociationModel> {
        self.storage()?
            .fetch_association(id)
            .with_context(|| format!("fetching association {id}"))
    }

    fn fetch_topic_by_uri_raw(&self, uri: &str) -> CoreResult<Option<TopicModel>> {
        self.storage()?
            .fetch_topic_by_uri(uri)
            .with_context(|| format!("fetching topic \"{uri}\""))
    }

    fn topic_id_by_uri(&self, uri: &str) -> CoreResult<i64> {
        self.fetch_topic_by_uri_raw(uri)?
            .map(|topic| topic.id)
            .ok_or_else(|| CoreError::NotFound(format!("topic \"{uri}\"")))
    }

    fn player_associations(&self, player_id: i64) -> CoreResult<Vec<AssociationModel>> {
        self.storage()?
            .fetch_player_associations(player_id)
            .with_context(|| format!("fetching associations of {player_id}"))
    }

    fn store_topic_raw(&mut self, topic: &TopicModel) -> CoreResult<i64> {
        self.storage_mut()?
            .store_topic(topic)
            .with_context(|| format!("storing topic {} ({})", topic.id, topic.type_uri))
    }

    fn store_association_raw(&mut self, assoc: &AssociationModel) -> CoreResult<i64> {
        self.storage_mut()?
            .store_association(assoc)
            .with_context(|| format!("storing association {} ({})", assoc.id, assoc.type_uri))
    }

    fn delete_topic_raw(&mut self, id: i64) -> CoreResult<()> {
        self.storage_mut()?
            .delete_topic(id)
            .with_context(|| format!("deleting topic {id}"))
    }

    fn delete_association_raw(&mut self, id: i64) -> CoreResult<()> {
        self.storage_mut()?
            .delete_association(id)
            .with_context(|| format!("deleting association {id}"))
    }

    /// Whether an id names a topic or an association
    fn object_ref(&self, id: i64) -> CoreResult<ObjectRef> {
        let storage = self.storage()?;
        if storage.fetch_topic(id).is_ok() {
            return Ok(ObjectRef::Topic(id));
        }
        storage
            .fetch_association(id)
            .map(|_| ObjectRef::Association(id))
            .with_context(|| format!("resolving object {id}"))
    }

    /// Address a role's player by id, checking that it exists
    fn resolve_role(&self, role: RoleModel) -> CoreResult<RoleModel> {
        match &role {
            RoleModel::Topic(topic_role) => match topic_role.topic_uri() {
                Some(uri) => RoleModel::topic_id(self.topic_id_by_uri(uri)?, topic_role.role_type_uri()),
                None => {
                    if let Some(id) = topic_role.topic_id() {
                        self.fetch_topic_raw(id)?;
                    }
                    Ok(role)
                }
            },
            RoleModel::Association(assoc_role) => {
                self.fetch_association_raw(assoc_role.assoc_id())?;
                Ok(role)
            }
        }
    }

    /// Refuse a URI another topic or association already carries
    fn check_uri_free(&self, uri: Option<&str>, own_id: i64) -> CoreResult<()> {
        let Some(uri) = uri.filter(|uri| !uri.is_empty()) else {
            return Ok(());
        };
        let storage = self.storage()?;
        let topic = storage
            .fetch_topic_by_uri(uri)
            .with_context(|| format!("checking URI \"{uri}\""))?;
        let assoc = storage
            .fetch_association_by_uri(uri)
            .with_context(|| format!("checking URI \"{uri}\""))?;
        let taken = topic.map(|t| t.id()).into_iter().chain(assoc.map(|a| a.id()));
        for other in taken {
            if other != own_id {
                return Err(CoreError::InvalidState(format!(
                    "URI \"{uri}\" is already taken by object {other}"
                )));
            }
        }
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if let Some(storage) = self.storage.take() {
            warn!(
                request_id = %self.directives.request_id,
                "Rolling back unfinished transaction"
            );
            if let Err(err) = storage.rollback() {
                warn!(error = %err, "Rollback failed");
            }
        }
    }
}
