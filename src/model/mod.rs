//! Object model
//!
//! Topics (nodes) and associations (edges) share one abstract shape: an id
//! assigned by storage, an optional unique URI, a type URI, a scalar value and
//! a composite value. Associations additionally own exactly two roles and may
//! themselves be players of other associations.
//!
//! Back-references (role → player, type → assoc def → type) are kept as ids
//! and URIs and resolved through the transaction, never as embedded pointers.

macro_rules! impl_object_model {
    ($model:ty) => {
        impl $crate::model::DeepaMehtaObjectModel for $model {
            fn id(&self) -> i64 {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = id;
            }

            fn uri(&self) -> Option<&str> {
                self.uri.as_deref()
            }

            fn set_uri(&mut self, uri: Option<String>) {
                self.uri = uri;
            }

            fn type_uri(&self) -> &str {
                &self.type_uri
            }

            fn simple_value(&self) -> Option<&$crate::value_objects::SimpleValue> {
                self.value.as_ref()
            }

            fn set_simple_value(&mut self, value: $crate::value_objects::SimpleValue) {
                self.value = Some(value);
            }

            fn child_topics(&self) -> &$crate::model::ChildTopicsModel {
                &self.children
            }

            fn child_topics_mut(&mut self) -> &mut $crate::model::ChildTopicsModel {
                &mut self.children
            }
        }
    };
}

mod association;
mod child_topics;
mod role;
mod topic;
mod view_config;

pub use association::AssociationModel;
pub use child_topics::{ChildSlot, ChildTopicsModel, RelatedTopicModel};
pub use role::{AssociationRoleModel, RoleModel, TopicPlayer, TopicRoleModel};
pub use topic::TopicModel;
pub use view_config::{Configurable, ViewConfigurationModel};

use crate::error::CoreResult;
use crate::value_objects::SimpleValue;

/// Id of an object that has not been persisted yet
pub const UNASSIGNED_ID: i64 = -1;

pub(crate) fn unassigned_id() -> i64 {
    UNASSIGNED_ID
}

/// Accessors shared by topics and associations
pub trait DeepaMehtaObjectModel {
    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn uri(&self) -> Option<&str>;
    fn set_uri(&mut self, uri: Option<String>);
    fn type_uri(&self) -> &str;
    fn simple_value(&self) -> Option<&SimpleValue>;
    fn set_simple_value(&mut self, value: SimpleValue);
    fn child_topics(&self) -> &ChildTopicsModel;
    fn child_topics_mut(&mut self) -> &mut ChildTopicsModel;

    /// Storage has assigned an id
    fn is_persisted(&self) -> bool {
        self.id() >= 0
    }

    /// The scalar value rendered as text; missing values render empty
    fn label(&self) -> String {
        self.simple_value()
            .map(|value| value.to_string())
            .unwrap_or_default()
    }

    /// Replace composite children with delta semantics
    fn update_child_topics(&mut self, delta: ChildTopicsModel) {
        self.child_topics_mut().merge(delta);
    }
}

/// An id-addressed reference to a topic or an association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Topic(i64),
    Association(i64),
}

impl ObjectRef {
    pub fn id(&self) -> i64 {
        match self {
            ObjectRef::Topic(id) | ObjectRef::Association(id) => *id,
        }
    }

    /// A role in which this object is the player
    pub fn role(&self, role_type_uri: &str) -> CoreResult<RoleModel> {
        match self {
            ObjectRef::Topic(id) => RoleModel::topic_id(*id, role_type_uri),
            ObjectRef::Association(id) => RoleModel::association(*id, role_type_uri),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectRef::Topic(id) => write!(f, "topic {id}"),
            ObjectRef::Association(id) => write!(f, "association {id}"),
        }
    }
}
