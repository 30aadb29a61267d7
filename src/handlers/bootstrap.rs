//! Meta model installation
//!
//! A fresh store gets the types that describe types, the data type,
//! cardinality, index mode and role type topics, and the four core
//! association types. Everything is written raw.

use super::Transaction;
use crate::error::CoreResult;
use crate::model::TopicModel;
use crate::types::TypeModel;
use crate::value_objects::uris;
use tracing::{debug, info};

/// "dm4.core.fulltext_key" -> "Fulltext Key"
fn display_name(uri: &str) -> String {
    let local = uri.rsplit('.').next().unwrap_or(uri);
    local
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn meta_model() -> CoreResult<Vec<TypeModel>> {
    Ok(vec![
        TypeModel::meta_type(uris::META_TYPE, "Meta Type")?,
        TypeModel::meta_type(uris::TOPIC_TYPE, "Topic Type")?,
        TypeModel::meta_type(uris::ASSOC_TYPE, "Association Type")?,
        TypeModel::topic_type(uris::DATA_TYPE, "Data Type", uris::TEXT)?,
        TypeModel::topic_type(uris::ROLE_TYPE, "Role Type", uris::TEXT)?,
        TypeModel::topic_type(uris::CARDINALITY, "Cardinality", uris::TEXT)?,
        TypeModel::topic_type(uris::INDEX_MODE, "Index Mode", uris::TEXT)?,
        TypeModel::association_type(uris::COMPOSITION, "Composition", uris::TEXT)?,
        TypeModel::association_type(uris::AGGREGATION, "Aggregation", uris::TEXT)?,
        TypeModel::association_type(uris::COMPOSITION_DEF, "Composition Definition", uris::TEXT)?,
        TypeModel::association_type(uris::AGGREGATION_DEF, "Aggregation Definition", uris::TEXT)?,
    ])
}

impl Transaction<'_> {
    /// Install the meta model unless the store already holds one.
    ///
    /// Returns whether anything was installed.
    pub(super) fn install_meta_model(&mut self) -> CoreResult<bool> {
        if self.fetch_topic_by_uri_raw(uris::TOPIC_TYPE)?.is_some() {
            debug!("Meta model already installed");
            return Ok(false);
        }

        let kernels = meta_model()?;
        for kernel in &kernels {
            self.stage_type(kernel.clone());
        }

        let well_known = [
            (uris::DATA_TYPE, &uris::DATA_TYPES[..]),
            (uris::CARDINALITY, &[uris::ONE, uris::MANY][..]),
            (
                uris::INDEX_MODE,
                &[uris::INDEX_OFF, uris::INDEX_KEY, uris::INDEX_FULLTEXT, uris::INDEX_FULLTEXT_KEY][..],
            ),
            (uris::ROLE_TYPE, &uris::ROLE_TYPES[..]),
        ];
        let mut topics = 0;
        for (type_uri, instances) in well_known {
            for uri in instances {
                let topic = TopicModel::new(type_uri)
                    .with_uri(*uri)
                    .with_value(display_name(uri));
                self.store_topic_raw(&topic)?;
                topics += 1;
            }
        }

        let count = kernels.len();
        for mut kernel in kernels {
            self.store_type(&mut kernel)?;
            self.stage_type(kernel);
        }
        info!(types = count, topics, "Installed meta model");
        Ok(true)
    }
}
