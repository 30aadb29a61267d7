//! Derived labels
//!
//! A composite object's value is its label, built from the children named by
//! the type's effective label config. A changed label propagates to every
//! parent whose label includes the changed slot.

use super::Transaction;
use crate::directives::Directive;
use crate::error::CoreResult;
use crate::events::CoreEvent;
use crate::label::{build_label, join_child_labels};
use crate::model::{ChildTopicsModel, RelatedTopicModel, RoleModel, TopicModel};
use crate::projections::TypeView;
use crate::value_objects::{uris, SimpleValue};
use tracing::debug;

impl Transaction<'_> {
    /// Compute the label of a composite object.
    ///
    /// Slots missing from `children` are loaded from storage when the object
    /// is persisted; anything still missing contributes nothing.
    pub(super) fn calculate_label(
        &mut self,
        object_id: i64,
        view: &TypeView,
        children: &ChildTopicsModel,
    ) -> CoreResult<String> {
        let mut contributions = Vec::new();
        for assoc_def_uri in view.effective_label_config() {
            let contribution = match children.get(&assoc_def_uri) {
                Some(slot) => join_child_labels(slot.as_slice().iter().map(RelatedTopicModel::label)),
                None if object_id >= 0 => {
                    let def = view.assoc_def(&assoc_def_uri)?;
                    let related = self.fetch_children(object_id, def, None)?;
                    join_child_labels(related.iter().map(RelatedTopicModel::label))
                }
                None => String::new(),
            };
            contributions.push(contribution);
        }
        Ok(build_label(contributions))
    }

    /// Recompute a stored topic's label; returns the topic when the label changed
    pub(super) fn refresh_label(&mut self, topic_id: i64) -> CoreResult<Option<TopicModel>> {
        let stored = self.fetch_topic_raw(topic_id)?;
        let view = self.type_view(&stored.type_uri)?;
        if !view.is_composite() {
            return Ok(None);
        }
        let label = self.calculate_label(topic_id, &view, &ChildTopicsModel::new())?;
        if stored.value.as_ref().and_then(SimpleValue::as_text) == Some(label.as_str()) {
            return Ok(None);
        }
        let old = self.load_composite(stored.clone())?;
        let update = TopicModel::update(topic_id).with_value(label.clone());
        self.fire(CoreEvent::PreUpdateTopic {
            topic: &old,
            update: &update,
        })?;

        debug!(id = topic_id, label = %label, "Label changed");
        let mut topic = stored;
        topic.value = Some(SimpleValue::Text(label));
        self.store_topic_raw(&topic)?;
        let topic = self.load_composite(topic)?;
        self.add_directive(Directive::UpdateTopic(topic.clone()));
        self.fire(CoreEvent::PostUpdateTopic {
            topic: &topic,
            old: &old,
        })?;
        Ok(Some(topic))
    }

    /// Refresh the labels of the topic parents whose label includes the child
    pub(super) fn refresh_parent_labels(
        &mut self,
        child_id: i64,
        child_type_uri: &str,
        depth: usize,
    ) -> CoreResult<()> {
        if depth >= self.max_depth() {
            debug!(child_id, depth, "Stopped label propagation at max depth");
            return Ok(());
        }
        for assoc in self.player_associations(child_id)? {
            let plays_child = assoc
                .role_of(child_id)
                .is_some_and(|role| role.role_type_uri() == uris::CHILD);
            let parent_id = match assoc.other_role(child_id) {
                Some(RoleModel::Topic(role)) if role.role_type_uri() == uris::PARENT => role.topic_id(),
                _ => None,
            };
            let (true, Some(parent_id)) = (plays_child, parent_id) else {
                continue;
            };
            let parent_type_uri = self.fetch_topic_raw(parent_id)?.type_uri;
            let parent_view = self.type_view(&parent_type_uri)?;
            let Some(def) = parent_view.find_assoc_def(child_type_uri, &assoc.type_uri) else {
                continue;
            };
            if !parent_view.effective_label_config().contains(&def.assoc_def_uri()) {
                continue;
            }
            if let Some(parent) = self.refresh_label(parent_id)? {
                self.refresh_parent_labels(parent.id, &parent.type_uri, depth + 1)?;
            }
        }
        Ok(())
    }
}
