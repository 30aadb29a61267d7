//! Type lifecycle inside a transaction
//!
//! Reads resolve through the staged overlay, then the committed cache, then
//! storage. Every mutation works on a copy of the kernel, persists it and
//! stages the result; the cache only sees it on commit.

use super::{StagedType, Transaction};
use crate::directives::Directive;
use crate::error::{CoreError, CoreResult, StorageContext};
use crate::events::CoreEvent;
use crate::model::UNASSIGNED_ID;
use crate::projections::TypeView;
use crate::types::{AssociationDefinitionModel, CachedType, TypeKind, TypeModel};
use crate::value_objects::{uris, Cardinality};
use std::sync::Arc;
use tracing::{debug, info};

pub(super) fn is_type_topic(type_uri: &str) -> bool {
    matches!(type_uri, uris::META_TYPE | uris::TOPIC_TYPE | uris::ASSOC_TYPE)
}

impl<'a> Transaction<'a> {
    /// The read-only view of a type, as this transaction sees it
    pub fn type_view(&mut self, uri: &str) -> CoreResult<Arc<TypeView>> {
        Ok(self.cached_type(uri)?.view())
    }

    /// A copy of the kernel of a type, for mutation
    pub fn kernel(&mut self, uri: &str) -> CoreResult<TypeModel> {
        Ok(self.cached_type(uri)?.kernel().clone())
    }

    fn cached_type(&mut self, uri: &str) -> CoreResult<CachedType> {
        match self.staged_types.get(uri) {
            Some(StagedType::Put(cached)) => return Ok(cached.clone()),
            Some(StagedType::Removed) => {
                return Err(CoreError::NotFound(format!("type \"{uri}\"")));
            }
            None => {}
        }
        if let Some(cached) = self.service.type_cache.get_cached(uri) {
            return Ok(cached);
        }
        let cached = CachedType::new(self.fetch_type(uri)?);
        debug!(uri, "Loaded type from storage");
        self.staged_types
            .insert(uri.to_string(), StagedType::Put(cached.clone()));
        Ok(cached)
    }

    pub(super) fn stage_type(&mut self, kernel: TypeModel) -> Arc<TypeView> {
        let cached = CachedType::new(kernel);
        let view = cached.view();
        self.staged_types
            .insert(cached.uri().to_string(), StagedType::Put(cached));
        view
    }

    fn is_type_defined(&self, uri: &str) -> CoreResult<bool> {
        match self.staged_types.get(uri) {
            Some(StagedType::Put(_)) => Ok(true),
            Some(StagedType::Removed) => Ok(false),
            None => Ok(self.service.type_cache.contains(uri)
                || self.fetch_topic_by_uri_raw(uri)?.is_some()),
        }
    }

    pub(super) fn all_type_uris(&self) -> CoreResult<Vec<String>> {
        let uris = self
            .storage()?
            .fetch_all_topics()
            .with_context(|| "listing types".to_string())?
            .filter(|topic| is_type_topic(&topic.type_uri))
            .filter_map(|topic| topic.uri)
            .collect();
        Ok(uris)
    }

    /// Every stored type
    pub fn get_all_types(&mut self) -> CoreResult<Vec<Arc<TypeView>>> {
        self.all_type_uris()?
            .iter()
            .map(|uri| self.type_view(uri))
            .collect()
    }

    pub fn create_topic_type(&mut self, kernel: TypeModel) -> CoreResult<Arc<TypeView>> {
        self.create_type(kernel, TypeKind::Topic)
    }

    pub fn create_association_type(&mut self, kernel: TypeModel) -> CoreResult<Arc<TypeView>> {
        self.create_type(kernel, TypeKind::Association)
    }

    fn create_type(&mut self, mut kernel: TypeModel, kind: TypeKind) -> CoreResult<Arc<TypeView>> {
        if kernel.kind() != kind {
            return Err(CoreError::InvalidState(format!(
                "\"{}\" is not a {kind:?} type",
                kernel.uri()
            )));
        }
        if kernel.id() != UNASSIGNED_ID {
            return Err(CoreError::InvalidState(format!(
                "type \"{}\" is already persisted as {}",
                kernel.uri(),
                kernel.id()
            )));
        }
        kernel.validate()?;
        let uri = kernel.uri().to_string();
        if self.is_type_defined(&uri)? {
            return Err(CoreError::InvalidState(format!("type \"{uri}\" already exists")));
        }
        self.check_uri_free(Some(&uri), UNASSIGNED_ID)?;
        self.check_type_references(&kernel)?;

        self.fire(CoreEvent::PreCreateType(&TypeView::project(&kernel)))?;
        self.store_type(&mut kernel)?;
        let view = self.stage_type(kernel);
        info!(uri = %uri, kind = ?kind, id = view.id(), "Created type");
        self.add_type_directive(&view);
        self.fire(CoreEvent::PostCreateType(&view))?;
        Ok(view)
    }

    /// Child and custom association types must exist
    fn check_type_references(&mut self, kernel: &TypeModel) -> CoreResult<()> {
        for def in kernel.assoc_defs() {
            if def.child_type_uri != kernel.uri() {
                self.type_view(&def.child_type_uri)?;
            }
            if let Some(custom) = &def.custom_assoc_type_uri {
                if self.type_view(custom)?.kind() != TypeKind::Association {
                    return Err(CoreError::InvalidState(format!(
                        "custom association type \"{custom}\" is not an association type"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Apply a kernel mutation, persist and stage the result
    pub(super) fn update_type_with<F>(&mut self, uri: &str, mutate: F) -> CoreResult<Arc<TypeView>>
    where
        F: FnOnce(&mut TypeModel) -> CoreResult<()>,
    {
        let mut kernel = self.kernel(uri)?;
        mutate(&mut kernel)?;
        kernel.validate()?;
        self.check_type_references(&kernel)?;

        self.fire(CoreEvent::PreUpdateType(&TypeView::project(&kernel)))?;
        self.store_type(&mut kernel)?;
        let view = self.stage_type(kernel);
        debug!(uri, "Updated type");
        self.add_type_directive(&view);
        self.fire(CoreEvent::PostUpdateType(&view))?;
        Ok(view)
    }

    /// Insert an assoc def before `before`, or append it
    pub fn add_assoc_def(
        &mut self,
        type_uri: &str,
        def: AssociationDefinitionModel,
        before: Option<&str>,
    ) -> CoreResult<Arc<TypeView>> {
        self.update_type_with(type_uri, |kernel| kernel.add_assoc_def(def, before))
    }

    pub fn remove_assoc_def(&mut self, type_uri: &str, assoc_def_uri: &str) -> CoreResult<Arc<TypeView>> {
        self.update_type_with(type_uri, |kernel| {
            kernel.remove_assoc_def(assoc_def_uri).map(|_| ())
        })
    }

    pub fn update_data_type_uri(&mut self, type_uri: &str, data_type_uri: &str) -> CoreResult<Arc<TypeView>> {
        self.update_type_with(type_uri, |kernel| kernel.update_data_type_uri(data_type_uri))
    }

    pub fn update_parent_cardinality_uri(
        &mut self,
        type_uri: &str,
        assoc_def_uri: &str,
        cardinality_uri: &str,
    ) -> CoreResult<Arc<TypeView>> {
        let cardinality = Cardinality::from_uri(cardinality_uri)?;
        self.update_type_with(type_uri, |kernel| {
            kernel.update_parent_cardinality(assoc_def_uri, cardinality)
        })
    }

    pub fn update_child_cardinality_uri(
        &mut self,
        type_uri: &str,
        assoc_def_uri: &str,
        cardinality_uri: &str,
    ) -> CoreResult<Arc<TypeView>> {
        let cardinality = Cardinality::from_uri(cardinality_uri)?;
        self.update_type_with(type_uri, |kernel| {
            kernel.update_child_cardinality(assoc_def_uri, cardinality)
        })
    }

    pub fn set_label_config(&mut self, type_uri: &str, assoc_def_uris: Vec<String>) -> CoreResult<Arc<TypeView>> {
        self.update_type_with(type_uri, |kernel| kernel.set_label_config(assoc_def_uris))
    }

    /// Rename a type.
    ///
    /// Instances follow the new URI. Other types whose assoc defs point at the
    /// renamed type are re-keyed and get their own directive, after the
    /// renamed type's.
    pub fn update_type_uri(&mut self, old_uri: &str, new_uri: &str) -> CoreResult<Arc<TypeView>> {
        if old_uri == new_uri {
            return self.type_view(old_uri);
        }
        let mut kernel = self.kernel(old_uri)?;
        if self.is_type_defined(new_uri)? {
            return Err(CoreError::InvalidState(format!("type \"{new_uri}\" already exists")));
        }
        self.check_uri_free(Some(new_uri), kernel.id())?;
        kernel.set_uri(new_uri)?;

        // Collected while storage still holds the old URI; a type loaded after
        // the rename would already resolve its child to the new one.
        let mut dependents = Vec::new();
        for other_uri in self.all_type_uris()? {
            if other_uri == old_uri {
                continue;
            }
            let mut other = self.kernel(&other_uri)?;
            if other.rename_type_references(old_uri, new_uri) {
                dependents.push(other);
            }
        }

        self.fire(CoreEvent::PreUpdateType(&TypeView::project(&kernel)))?;
        self.store_type(&mut kernel)?;
        let kind = kernel.kind();
        self.staged_types.insert(old_uri.to_string(), StagedType::Removed);
        let view = self.stage_type(kernel);
        self.add_type_directive(&view);

        let retyped = match kind {
            TypeKind::Topic => self.retype_topics(old_uri, new_uri)?,
            TypeKind::Association => self.retype_associations(old_uri, new_uri)?,
        };

        for mut other in dependents {
            self.store_type(&mut other)?;
            let other_view = self.stage_type(other);
            self.add_type_directive(&other_view);
        }

        info!(old_uri, new_uri, instances = retyped, "Renamed type");
        self.fire(CoreEvent::PostUpdateType(&view))?;
        Ok(view)
    }

    fn retype_topics(&mut self, old_uri: &str, new_uri: &str) -> CoreResult<usize> {
        let topics = self
            .storage()?
            .fetch_topics_by_type(old_uri)
            .with_context(|| format!("fetching instances of \"{old_uri}\""))?;
        let count = topics.len();
        for mut topic in topics {
            topic.type_uri = new_uri.to_string();
            self.store_topic_raw(&topic)?;
        }
        Ok(count)
    }

    fn retype_associations(&mut self, old_uri: &str, new_uri: &str) -> CoreResult<usize> {
        let assocs = self
            .storage()?
            .fetch_associations_by_type(old_uri)
            .with_context(|| format!("fetching instances of \"{old_uri}\""))?;
        let count = assocs.len();
        for mut assoc in assocs {
            assoc.type_uri = new_uri.to_string();
            self.store_association_raw(&assoc)?;
        }
        Ok(count)
    }

    pub fn delete_topic_type(&mut self, uri: &str) -> CoreResult<()> {
        self.delete_type(uri, TypeKind::Topic)
    }

    pub fn delete_association_type(&mut self, uri: &str) -> CoreResult<()> {
        self.delete_type(uri, TypeKind::Association)
    }

    /// Delete a type that has no instances and is no other type's child
    fn delete_type(&mut self, uri: &str, kind: TypeKind) -> CoreResult<()> {
        let view = self.type_view(uri)?;
        if view.kind() != kind {
            return Err(CoreError::InvalidState(format!("\"{uri}\" is not a {kind:?} type")));
        }
        let storage = self.storage()?;
        let instances = match kind {
            TypeKind::Topic => storage.fetch_topics_by_type(uri).map(|v| v.len()),
            TypeKind::Association => storage.fetch_associations_by_type(uri).map(|v| v.len()),
        }
        .with_context(|| format!("counting instances of \"{uri}\""))?;
        if instances > 0 {
            return Err(CoreError::InvalidState(format!(
                "type \"{uri}\" still has {instances} instances"
            )));
        }
        for other_uri in self.all_type_uris()? {
            if other_uri == uri {
                continue;
            }
            let other = self.type_view(&other_uri)?;
            let referenced = other.assoc_defs().iter().any(|def| {
                def.child_type_uri == uri || def.custom_assoc_type_uri.as_deref() == Some(uri)
            });
            if referenced {
                return Err(CoreError::InvalidState(format!(
                    "type \"{uri}\" is referenced by type \"{other_uri}\""
                )));
            }
        }

        self.fire(CoreEvent::PreDeleteType(&view))?;
        self.delete_type_structures(view.id())?;
        self.delete_topic_raw(view.id())?;
        self.staged_types.insert(uri.to_string(), StagedType::Removed);
        let directive = match kind {
            TypeKind::Topic => Directive::DeleteTopicType { uri: uri.to_string() },
            TypeKind::Association => Directive::DeleteAssociationType { uri: uri.to_string() },
        };
        self.add_directive(directive);
        info!(uri, "Deleted type");
        self.fire(CoreEvent::PostDeleteType(&view))?;
        Ok(())
    }
}
