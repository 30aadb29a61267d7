//! Composite value storage
//!
//! Children are stored as topics of their own, each related to its parent by
//! an instance-level association with roles `parent` and `child`. Composition
//! children are owned by the parent; aggregation children are shared and
//! only referenced.

use super::delete::Cascade;
use super::Transaction;
use crate::error::{CoreError, CoreResult, StorageContext};
use crate::model::{
    AssociationModel, ChildSlot, ChildTopicsModel, DeepaMehtaObjectModel, ObjectRef,
    RelatedTopicModel, RoleModel, TopicModel,
};
use crate::projections::TypeView;
use crate::types::AssociationDefinitionModel;
use crate::value_objects::{uris, Cardinality, SimpleValue};
use tracing::debug;

impl Transaction<'_> {
    /// Keys must name assoc defs of the type and slot shapes must match cardinality
    pub(super) fn validate_children(&self, view: &TypeView, children: &ChildTopicsModel) -> CoreResult<()> {
        for (uri, slot) in children {
            let def = view.assoc_def(uri).map_err(|_| {
                CoreError::InvalidState(format!(
                    "\"{uri}\" is not an association definition of type \"{}\"",
                    view.uri()
                ))
            })?;
            match (def.child_cardinality, slot) {
                (Cardinality::One, ChildSlot::Many(_)) => {
                    return Err(CoreError::InvalidState(format!(
                        "\"{uri}\" of type \"{}\" holds a single child, not a list",
                        view.uri()
                    )));
                }
                (Cardinality::Many, ChildSlot::One(_)) => {
                    return Err(CoreError::InvalidState(format!(
                        "\"{uri}\" of type \"{}\" holds a list of children",
                        view.uri()
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Check a new object's value against its type, filling in the default
    pub(super) fn prepare_value(&self, view: &TypeView, value: &mut Option<SimpleValue>) -> CoreResult<()> {
        if view.is_composite() {
            *value = Some(SimpleValue::default());
            return Ok(());
        }
        match value {
            Some(value) => value.check_data_type(view.data_type_uri()),
            None => {
                *value = Some(SimpleValue::default_for(view.data_type_uri()));
                Ok(())
            }
        }
    }

    /// Store the children of a freshly created parent
    pub(super) fn store_child_topics(
        &mut self,
        parent: ObjectRef,
        view: &TypeView,
        children: ChildTopicsModel,
    ) -> CoreResult<ChildTopicsModel> {
        let mut stored = ChildTopicsModel::new();
        for (uri, slot) in children {
            let def = view.assoc_def(&uri)?;
            match slot {
                ChildSlot::One(child) => {
                    let related = self.attach_child(parent, def, *child)?;
                    stored.put_one(uri, related);
                }
                ChildSlot::Many(items) => {
                    let mut related = Vec::with_capacity(items.len());
                    for item in items {
                        related.push(self.attach_child(parent, def, item)?);
                    }
                    stored.put_many(uri, related);
                }
            }
        }
        Ok(stored)
    }

    /// Apply a composite delta to a stored parent; returns the resulting children
    pub(super) fn update_child_topics(
        &mut self,
        parent: ObjectRef,
        view: &TypeView,
        current: ChildTopicsModel,
        delta: ChildTopicsModel,
    ) -> CoreResult<ChildTopicsModel> {
        let mut children = current;
        for (uri, slot) in delta {
            let def = view.assoc_def(&uri)?;
            match slot {
                ChildSlot::One(child) => {
                    let existing = children.get_one(&uri).cloned();
                    let related = self.replace_child(parent, def, existing, *child)?;
                    children.put_one(uri, related);
                }
                ChildSlot::Many(items) => {
                    let mut related = children.get_many(&uri).map(<[_]>::to_vec).unwrap_or_default();
                    for item in items {
                        let known = related
                            .iter()
                            .position(|c| item.topic.id >= 0 && c.id() == item.topic.id);
                        match known {
                            Some(index) => {
                                if item.topic.carries_changes() {
                                    related[index].topic = self.update_topic_internal(item.topic, false)?;
                                }
                            }
                            None => related.push(self.attach_child(parent, def, item)?),
                        }
                    }
                    children.put_many(uri, related);
                }
            }
        }
        Ok(children)
    }

    /// Update or replace the child of a cardinality-one slot
    fn replace_child(
        &mut self,
        parent: ObjectRef,
        def: &AssociationDefinitionModel,
        existing: Option<RelatedTopicModel>,
        child: RelatedTopicModel,
    ) -> CoreResult<RelatedTopicModel> {
        let Some(mut existing) = existing else {
            return self.attach_child(parent, def, child);
        };
        let same_child = child.topic.id == existing.id();
        if def.is_composition() && (same_child || !child.topic.is_persisted()) {
            let mut update = child.topic;
            update.id = existing.id();
            existing.topic = self.update_topic_internal(update, false)?;
            return Ok(existing);
        }
        if same_child {
            if child.topic.carries_changes() {
                existing.topic = self.update_topic_internal(child.topic, false)?;
            }
            return Ok(existing);
        }

        let mut cascade = Cascade::sparing(parent.id());
        if def.is_composition() {
            self.delete_topic_in(existing.id(), &mut cascade, 0)?;
        } else if let Some(assoc) = &existing.relating_assoc {
            self.delete_association_in(assoc.id, &mut cascade, 0)?;
        }
        self.attach_child(parent, def, child)
    }

    /// Create or resolve a child and relate it to the parent
    fn attach_child(
        &mut self,
        parent: ObjectRef,
        def: &AssociationDefinitionModel,
        child: RelatedTopicModel,
    ) -> CoreResult<RelatedTopicModel> {
        let topic = if def.is_composition() {
            if child.topic.is_persisted() {
                self.update_topic_internal(child.topic, false)?
            } else {
                self.create_child_topic(def, child.topic)?
            }
        } else {
            self.resolve_aggregated_child(def, child.topic)?
        };
        if topic.type_uri != def.child_type_uri {
            return Err(CoreError::type_mismatch(&def.child_type_uri, &topic.type_uri));
        }

        let assoc_type_uri = def.instance_level_assoc_type_uri()?.to_string();
        let mut assoc = AssociationModel::new(
            assoc_type_uri.clone(),
            parent.role(uris::PARENT)?,
            RoleModel::topic_id(topic.id, uris::CHILD)?,
        );
        if let Some(template) = child.relating_assoc {
            if !template.type_uri.is_empty() && template.type_uri != assoc_type_uri {
                return Err(CoreError::type_mismatch(assoc_type_uri, template.type_uri));
            }
            assoc.value = template.value;
            assoc.children = template.children;
        }
        let assoc = self.create_association(assoc)?;
        debug!(parent = %parent, child = topic.id, assoc_def = %def.assoc_def_uri(), "Attached child");
        Ok(RelatedTopicModel::new(topic, assoc))
    }

    fn create_child_topic(&mut self, def: &AssociationDefinitionModel, mut topic: TopicModel) -> CoreResult<TopicModel> {
        if topic.type_uri.is_empty() {
            topic.type_uri = def.child_type_uri.clone();
        }
        self.create_topic(topic)
    }

    /// Reference by id or URI, reuse an equal simple value, or create
    fn resolve_aggregated_child(
        &mut self,
        def: &AssociationDefinitionModel,
        topic: TopicModel,
    ) -> CoreResult<TopicModel> {
        if topic.is_persisted() {
            return if topic.carries_changes() {
                self.update_topic_internal(topic, false)
            } else {
                self.get_topic(topic.id)
            };
        }
        if let Some(uri) = topic.uri.as_deref().filter(|uri| !uri.is_empty()) {
            if let Some(existing) = self.fetch_topic_by_uri_raw(uri)? {
                return self.load_composite(existing);
            }
        }
        let child_view = self.type_view(&def.child_type_uri)?;
        if !child_view.is_composite() {
            if let Some(value) = &topic.value {
                let existing = self
                    .storage()?
                    .fetch_topics_by_type(&def.child_type_uri)
                    .with_context(|| format!("looking up \"{}\" topics", def.child_type_uri))?
                    .into_iter()
                    .find(|candidate| candidate.value.as_ref() == Some(value));
                if let Some(existing) = existing {
                    debug!(id = existing.id, type_uri = %existing.type_uri, "Reusing aggregated topic");
                    return Ok(existing);
                }
            }
        }
        self.create_child_topic(def, topic)
    }

    /// Load the composite value of a stored parent along its type's assoc defs
    pub(super) fn load_child_topics(
        &mut self,
        parent_id: i64,
        view: &TypeView,
        depth: usize,
    ) -> CoreResult<ChildTopicsModel> {
        let mut children = ChildTopicsModel::new();
        if view.assoc_defs().is_empty() {
            return Ok(children);
        }
        if depth >= self.max_depth() {
            debug!(parent_id, depth, "Stopped loading children at max depth");
            return Ok(children);
        }
        for def in view.assoc_defs() {
            let related = self.fetch_children(parent_id, def, Some(depth + 1))?;
            match def.child_cardinality {
                Cardinality::One => {
                    if let Some(first) = related.into_iter().next() {
                        children.put_one(def.assoc_def_uri(), first);
                    }
                }
                Cardinality::Many => {
                    if !related.is_empty() {
                        children.put_many(def.assoc_def_uri(), related);
                    }
                }
            }
        }
        Ok(children)
    }

    /// Children related through one assoc def, in relation order.
    ///
    /// With `depth` set their own composite values are loaded as well.
    pub(super) fn fetch_children(
        &mut self,
        parent_id: i64,
        def: &AssociationDefinitionModel,
        depth: Option<usize>,
    ) -> CoreResult<Vec<RelatedTopicModel>> {
        let assoc_type_uri = def.instance_level_assoc_type_uri()?;
        let mut related = Vec::new();
        for assoc in self.player_associations(parent_id)? {
            if assoc.type_uri != assoc_type_uri {
                continue;
            }
            let plays_parent = assoc
                .role_of(parent_id)
                .is_some_and(|role| role.role_type_uri() == uris::PARENT);
            let child_id = assoc
                .other_role(parent_id)
                .filter(|role| role.is_topic_role() && role.role_type_uri() == uris::CHILD)
                .and_then(RoleModel::player_id);
            let (true, Some(child_id)) = (plays_parent, child_id) else {
                continue;
            };
            let mut topic = self.fetch_topic_raw(child_id)?;
            if topic.type_uri != def.child_type_uri {
                continue;
            }
            if let Some(depth) = depth {
                let child_view = self.type_view(&topic.type_uri)?;
                topic.children = self.load_child_topics(topic.id, &child_view, depth)?;
            }
            related.push(RelatedTopicModel::new(topic, assoc));
        }
        Ok(related)
    }
}
