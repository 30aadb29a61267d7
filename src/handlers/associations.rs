//! Association operations

use super::Transaction;
use crate::directives::Directive;
use crate::error::{CoreError, CoreResult, StorageContext};
use crate::events::CoreEvent;
use crate::model::{AssociationModel, ObjectRef, RoleModel, UNASSIGNED_ID};
use crate::storage::StoredObjects;
use crate::types::TypeKind;
use crate::value_objects::SimpleValue;
use tracing::debug;

impl Transaction<'_> {
    /// An association with its composite value
    pub fn get_association(&mut self, id: i64) -> CoreResult<AssociationModel> {
        let mut assoc = self.fetch_association_raw(id)?;
        let view = self.type_view(&assoc.type_uri)?;
        assoc.children = self.load_child_topics(id, &view, 0)?;
        Ok(assoc)
    }

    pub fn get_association_by_uri(&mut self, uri: &str) -> CoreResult<AssociationModel> {
        let assoc = self
            .storage()?
            .fetch_association_by_uri(uri)
            .with_context(|| format!("fetching association \"{uri}\""))?
            .ok_or_else(|| CoreError::NotFound(format!("association \"{uri}\"")))?;
        self.get_association(assoc.id)
    }

    /// Every stored association, without composite values
    pub fn get_all_associations(&self) -> CoreResult<StoredObjects<'_, AssociationModel>> {
        self.storage()?
            .fetch_all_associations()
            .with_context(|| "fetching all associations".to_string())
    }

    /// Associations in which the given topic or association plays a role
    pub fn get_player_associations(&self, player_id: i64) -> CoreResult<Vec<AssociationModel>> {
        self.object_ref(player_id)?;
        self.player_associations(player_id)
    }

    fn association_type(&mut self, type_uri: &str) -> CoreResult<std::sync::Arc<crate::projections::TypeView>> {
        let view = self.type_view(type_uri)?;
        if view.kind() != TypeKind::Association {
            return Err(CoreError::InvalidState(format!(
                "\"{type_uri}\" is not an association type"
            )));
        }
        Ok(view)
    }

    /// Create an association; URI-addressed topic roles are resolved to ids
    pub fn create_association(&mut self, mut model: AssociationModel) -> CoreResult<AssociationModel> {
        if model.id != UNASSIGNED_ID {
            return Err(CoreError::InvalidState(format!(
                "association {} is already persisted",
                model.id
            )));
        }
        let view = self.association_type(&model.type_uri)?;
        self.check_uri_free(model.uri.as_deref(), UNASSIGNED_ID)?;
        model.role_1 = self.resolve_role(model.role_1)?;
        model.role_2 = self.resolve_role(model.role_2)?;
        self.validate_children(&view, &model.children)?;
        self.prepare_value(&view, &mut model.value)?;

        self.fire(CoreEvent::PreCreateAssociation(&model))?;
        let children = std::mem::take(&mut model.children);
        model.id = self.store_association_raw(&model)?;
        model.children = self.store_child_topics(ObjectRef::Association(model.id), &view, children)?;
        if view.is_composite() {
            let label = self.calculate_label(model.id, &view, &model.children)?;
            model.value = Some(SimpleValue::Text(label));
            self.store_association_raw(&model)?;
        }
        debug!(id = model.id, type_uri = %model.type_uri, "Created association");
        self.fire(CoreEvent::PostCreateAssociation(&model))?;
        Ok(model)
    }

    /// Apply an update model.
    ///
    /// A role is replaced only when it addresses a different player; otherwise
    /// just its role type is updated.
    pub fn update_association(&mut self, update: AssociationModel) -> CoreResult<AssociationModel> {
        let id = update.id;
        let old = self.get_association(id)?;
        let type_uri = if update.type_uri.is_empty() {
            old.type_uri.clone()
        } else {
            update.type_uri.clone()
        };
        let view = self.association_type(&type_uri)?;
        self.validate_children(&view, &update.children)?;
        if let (Some(value), false) = (&update.value, view.is_composite()) {
            value.check_data_type(view.data_type_uri())?;
        }
        if let Some(uri) = update.uri.as_deref() {
            self.check_uri_free(Some(uri), id)?;
        }

        self.fire(CoreEvent::PreUpdateAssociation {
            assoc: &old,
            update: &update,
        })?;

        let mut assoc = old.clone();
        assoc.type_uri = type_uri;
        if let Some(uri) = update.uri {
            assoc.uri = Some(uri).filter(|uri| !uri.is_empty());
        }
        if !view.is_composite() {
            if let Some(value) = update.value {
                assoc.value = Some(value);
            }
        }
        assoc.role_1 = self.update_role(&old.role_1, update.role_1)?;
        assoc.role_2 = self.update_role(&old.role_2, update.role_2)?;
        assoc.children = self.update_child_topics(
            ObjectRef::Association(id),
            &view,
            old.children.clone(),
            update.children,
        )?;
        if view.is_composite() {
            let label = self.calculate_label(id, &view, &assoc.children)?;
            assoc.value = Some(SimpleValue::Text(label));
        }
        self.store_association_raw(&assoc)?;
        debug!(id, type_uri = %assoc.type_uri, "Updated association");

        self.add_directive(Directive::UpdateAssociation(assoc.clone()));
        self.fire(CoreEvent::PostUpdateAssociation {
            assoc: &assoc,
            old: &old,
        })?;
        Ok(assoc)
    }

    fn update_role(&self, current: &RoleModel, requested: RoleModel) -> CoreResult<RoleModel> {
        if !current.refs_same_object(&requested) {
            return self.resolve_role(requested);
        }
        let mut role = current.clone();
        if role.role_type_uri() != requested.role_type_uri() {
            role.set_role_type_uri(requested.role_type_uri())?;
        }
        Ok(role)
    }

    /// Change the role type of the role `player` plays in an association
    pub fn set_role_type_uri(
        &mut self,
        assoc_id: i64,
        player: ObjectRef,
        role_type_uri: &str,
    ) -> CoreResult<AssociationModel> {
        if role_type_uri.trim().is_empty() {
            return Err(CoreError::InvalidState(
                "role type URI must not be empty".to_string(),
            ));
        }
        let old = self.get_association(assoc_id)?;
        let mut update = old.clone();
        let role = if update.role_1.player_id() == Some(player.id()) {
            &mut update.role_1
        } else if update.role_2.player_id() == Some(player.id()) {
            &mut update.role_2
        } else {
            return Err(CoreError::NotFound(format!(
                "player {player} in association {assoc_id}"
            )));
        };
        role.set_role_type_uri(role_type_uri)?;
        self.fire(CoreEvent::PreUpdateAssociation {
            assoc: &old,
            update: &update,
        })?;

        self.storage_mut()?
            .store_role_type_uri(assoc_id, player.id(), role_type_uri)
            .with_context(|| format!("setting role type of {player} in association {assoc_id}"))?;
        let assoc = self.get_association(assoc_id)?;
        self.add_directive(Directive::UpdateAssociation(assoc.clone()));
        self.fire(CoreEvent::PostUpdateAssociation {
            assoc: &assoc,
            old: &old,
        })?;
        Ok(assoc)
    }
}
