//! Read-only type projection

use crate::error::{CoreError, CoreResult};
use crate::types::{AssociationDefinitionModel, TypeKind, TypeModel};
use crate::value_objects::{uris, IndexMode};
use crate::model::ViewConfigurationModel;
use serde::{Deserialize, Serialize};

/// Snapshot of a type as readers see it.
///
/// Produced by [`TypeView::project`]; it has no mutation methods. Type changes
/// go through the kernel inside a transaction and yield a fresh projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeView {
    id: i64,
    uri: String,
    type_uri: String,
    value: String,
    kind: TypeKind,
    data_type_uri: String,
    index_mode_uris: Vec<IndexMode>,
    assoc_defs: Vec<AssociationDefinitionModel>,
    label_config: Vec<String>,
    #[serde(default, skip_serializing_if = "ViewConfigurationModel::is_empty")]
    view_config: ViewConfigurationModel,
}

impl TypeView {
    /// Project a kernel into a detached read-only snapshot
    pub fn project(kernel: &TypeModel) -> Self {
        Self {
            id: kernel.id(),
            uri: kernel.uri().to_string(),
            type_uri: kernel.topic().type_uri.clone(),
            value: kernel.name(),
            kind: kernel.kind(),
            data_type_uri: kernel.data_type_uri().to_string(),
            index_mode_uris: kernel.index_modes().collect(),
            assoc_defs: kernel.assoc_defs().cloned().collect(),
            label_config: kernel.label_config().to_vec(),
            view_config: kernel.view_config().clone(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn type_uri(&self) -> &str {
        &self.type_uri
    }

    pub fn name(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn data_type_uri(&self) -> &str {
        &self.data_type_uri
    }

    pub fn is_composite(&self) -> bool {
        self.data_type_uri == uris::COMPOSITE
    }

    pub fn index_modes(&self) -> &[IndexMode] {
        &self.index_mode_uris
    }

    pub fn assoc_defs(&self) -> &[AssociationDefinitionModel] {
        &self.assoc_defs
    }

    pub fn assoc_def_uris(&self) -> impl Iterator<Item = String> + '_ {
        self.assoc_defs.iter().map(|def| def.assoc_def_uri())
    }

    pub fn has_assoc_def(&self, assoc_def_uri: &str) -> bool {
        self.assoc_defs
            .iter()
            .any(|def| def.assoc_def_uri() == assoc_def_uri)
    }

    pub fn assoc_def(&self, assoc_def_uri: &str) -> CoreResult<&AssociationDefinitionModel> {
        self.assoc_defs
            .iter()
            .find(|def| def.assoc_def_uri() == assoc_def_uri)
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "association definition \"{assoc_def_uri}\" in type \"{}\"",
                    self.uri
                ))
            })
    }

    /// The assoc def an instance-level association belongs to
    pub fn find_assoc_def(
        &self,
        child_type_uri: &str,
        assoc_type_uri: &str,
    ) -> Option<&AssociationDefinitionModel> {
        self.assoc_defs
            .iter()
            .find(|def| def.matches_instance(child_type_uri, assoc_type_uri))
    }

    pub fn label_config(&self) -> &[String] {
        &self.label_config
    }

    /// The configured label entries, or the first assoc def when none are configured
    pub fn effective_label_config(&self) -> Vec<String> {
        if self.label_config.is_empty() {
            self.assoc_defs
                .first()
                .map(|def| vec![def.assoc_def_uri()])
                .unwrap_or_default()
        } else {
            self.label_config.clone()
        }
    }

    pub fn view_config(&self) -> &ViewConfigurationModel {
        &self.view_config
    }
}
