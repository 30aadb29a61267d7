//! View configuration storage
//!
//! A settings topic is aggregated by its owner (role `configurable` to role
//! `view_config`); its settings are composition children.

use super::Transaction;
use crate::directives::Directive;
use crate::error::CoreResult;
use crate::events::CoreEvent;
use crate::model::{
    AssociationModel, ChildTopicsModel, Configurable, ObjectRef, RoleModel, TopicModel,
    ViewConfigurationModel, UNASSIGNED_ID,
};
use crate::value_objects::{uris, SimpleValue};
use tracing::debug;

impl Transaction<'_> {
    /// The view configuration of a type, an assoc def or an instance
    pub fn get_view_config(&mut self, configurable: &Configurable) -> CoreResult<ViewConfigurationModel> {
        match configurable {
            Configurable::Type { type_uri } => Ok(self.type_view(type_uri)?.view_config().clone()),
            Configurable::AssocDef {
                type_uri,
                assoc_def_uri,
            } => Ok(self
                .type_view(type_uri)?
                .assoc_def(assoc_def_uri)?
                .view_config
                .clone()),
            Configurable::Instance { id } => {
                self.object_ref(*id)?;
                self.fetch_view_config(*id)
            }
        }
    }

    /// A single setting, if configured
    pub fn view_config_setting(
        &mut self,
        configurable: &Configurable,
        config_type_uri: &str,
        setting_uri: &str,
    ) -> CoreResult<Option<SimpleValue>> {
        Ok(self
            .get_view_config(configurable)?
            .setting(config_type_uri, setting_uri)
            .cloned())
    }

    /// Add or replace the settings topic of one config type
    pub fn update_view_config(
        &mut self,
        configurable: &Configurable,
        config_topic: TopicModel,
    ) -> CoreResult<ViewConfigurationModel> {
        match configurable {
            Configurable::Type { type_uri } => {
                let view = self.update_type_with(type_uri, |kernel| {
                    kernel.view_config_mut().put_config_topic(config_topic);
                    Ok(())
                })?;
                Ok(view.view_config().clone())
            }
            Configurable::AssocDef {
                type_uri,
                assoc_def_uri,
            } => {
                let view = self.update_type_with(type_uri, |kernel| {
                    kernel
                        .assoc_def_mut(assoc_def_uri)?
                        .view_config
                        .put_config_topic(config_topic);
                    Ok(())
                })?;
                Ok(view.assoc_def(assoc_def_uri)?.view_config.clone())
            }
            Configurable::Instance { id } => match self.object_ref(*id)? {
                ObjectRef::Topic(id) => {
                    let old = self.get_topic(id)?;
                    self.fire(CoreEvent::PreUpdateTopic {
                        topic: &old,
                        update: &old,
                    })?;
                    let config = self.replace_instance_view_config(ObjectRef::Topic(id), config_topic)?;
                    let topic = self.get_topic(id)?;
                    self.add_directive(Directive::UpdateTopic(topic.clone()));
                    self.fire(CoreEvent::PostUpdateTopic {
                        topic: &topic,
                        old: &old,
                    })?;
                    Ok(config)
                }
                ObjectRef::Association(id) => {
                    let old = self.get_association(id)?;
                    self.fire(CoreEvent::PreUpdateAssociation {
                        assoc: &old,
                        update: &old,
                    })?;
                    let config =
                        self.replace_instance_view_config(ObjectRef::Association(id), config_topic)?;
                    let assoc = self.get_association(id)?;
                    self.add_directive(Directive::UpdateAssociation(assoc.clone()));
                    self.fire(CoreEvent::PostUpdateAssociation {
                        assoc: &assoc,
                        old: &old,
                    })?;
                    Ok(config)
                }
            },
        }
    }

    fn replace_instance_view_config(
        &mut self,
        owner: ObjectRef,
        config_topic: TopicModel,
    ) -> CoreResult<ViewConfigurationModel> {
        let mut config = self.fetch_view_config(owner.id())?;
        self.delete_view_config_topics(owner.id())?;
        config.put_config_topic(config_topic);
        self.store_view_config(owner, &mut config)?;
        Ok(config)
    }

    /// Write every settings topic as new and link it to `owner`
    pub(super) fn store_view_config(
        &mut self,
        owner: ObjectRef,
        config: &mut ViewConfigurationModel,
    ) -> CoreResult<()> {
        for config_topic in config.topics_mut() {
            config_topic.id = UNASSIGNED_ID;
            let settings = std::mem::take(&mut config_topic.children);
            let config_id = self.store_topic_raw(config_topic)?;
            config_topic.id = config_id;

            let mut stored = ChildTopicsModel::new();
            for (setting_uri, slot) in settings {
                let many = slot.is_many();
                for child in slot.as_slice() {
                    let mut setting = child.topic.without_children();
                    setting.id = UNASSIGNED_ID;
                    setting.id = self.store_topic_raw(&setting)?;
                    let link = AssociationModel::new(
                        uris::COMPOSITION,
                        RoleModel::topic_id(config_id, uris::PARENT)?,
                        RoleModel::topic_id(setting.id, uris::CHILD)?,
                    );
                    self.store_association_raw(&link)?;
                    if many {
                        stored.add_many(setting_uri.clone(), setting);
                    } else {
                        stored.put_one(setting_uri.clone(), setting);
                    }
                }
            }
            config_topic.children = stored;

            let link = AssociationModel::new(
                uris::AGGREGATION,
                owner.role(uris::CONFIGURABLE)?,
                RoleModel::topic_id(config_id, uris::VIEW_CONFIG)?,
            );
            self.store_association_raw(&link)?;
            debug!(%owner, config_type = %config_topic.type_uri, "Stored view config");
        }
        Ok(())
    }

    /// Links from `owner` to its settings topics
    fn config_topic_links(&self, owner_id: i64) -> CoreResult<Vec<(AssociationModel, i64)>> {
        let mut links = Vec::new();
        for assoc in self.player_associations(owner_id)? {
            let is_config_link = assoc.type_uri == uris::AGGREGATION
                && assoc
                    .role_of(owner_id)
                    .is_some_and(|role| role.role_type_uri() == uris::CONFIGURABLE);
            let config_id = assoc
                .other_role(owner_id)
                .filter(|role| role.role_type_uri() == uris::VIEW_CONFIG)
                .and_then(RoleModel::player_id);
            if let (true, Some(config_id)) = (is_config_link, config_id) {
                links.push((assoc, config_id));
            }
        }
        Ok(links)
    }

    fn setting_links(&self, config_id: i64) -> CoreResult<Vec<(AssociationModel, i64)>> {
        let mut links = Vec::new();
        for assoc in self.player_associations(config_id)? {
            if assoc.type_uri != uris::COMPOSITION {
                continue;
            }
            let is_parent = assoc
                .role_of(config_id)
                .is_some_and(|role| role.role_type_uri() == uris::PARENT);
            let setting_id = assoc.other_role(config_id).and_then(RoleModel::player_id);
            if let (true, Some(setting_id)) = (is_parent, setting_id) {
                links.push((assoc, setting_id));
            }
        }
        Ok(links)
    }

    pub(super) fn fetch_view_config(&self, owner_id: i64) -> CoreResult<ViewConfigurationModel> {
        let mut config = ViewConfigurationModel::new();
        for (_, config_id) in self.config_topic_links(owner_id)? {
            let mut config_topic = self.fetch_topic_raw(config_id)?;
            for (_, setting_id) in self.setting_links(config_id)? {
                let setting = self.fetch_topic_raw(setting_id)?;
                let setting_uri = setting.type_uri.clone();
                if config_topic.children.contains(&setting_uri) {
                    config_topic.children.add_many(setting_uri, setting);
                } else {
                    config_topic.children.put_one(setting_uri, setting);
                }
            }
            config.put_config_topic(config_topic);
        }
        Ok(config)
    }

    pub(super) fn delete_view_config_topics(&mut self, owner_id: i64) -> CoreResult<()> {
        for (link, config_id) in self.config_topic_links(owner_id)? {
            for (setting_link, setting_id) in self.setting_links(config_id)? {
                self.delete_association_raw(setting_link.id)?;
                self.delete_topic_raw(setting_id)?;
            }
            self.delete_association_raw(link.id)?;
            self.delete_topic_raw(config_id)?;
        }
        Ok(())
    }
}
