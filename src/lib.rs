//! Topic/association graph core
//!
//! Topics and associations form a typed graph in which associations may
//! themselves be players of other associations. Types are stored in the same
//! graph they describe, and every request runs inside one transaction that
//! yields an ordered list of directives.

pub mod config;
pub mod directives;
pub mod error;
pub mod events;
pub mod handlers;
pub mod infrastructure;
pub mod label;
pub mod model;
pub mod projections;
pub mod storage;
pub mod types;
pub mod value_objects;

// Re-export the request surface
pub use handlers::{CoreService, Transaction};

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};

// Re-export events and directives
pub use directives::{Directive, DirectiveKind, Directives, DirectivesPublisher};
pub use events::{
    CoreEvent, EventKind, EventManager, FnListener, Listener, ListenerError, ShortCircuit,
};

// Re-export the object model
pub use model::{
    AssociationModel, ChildSlot, ChildTopicsModel, Configurable, DeepaMehtaObjectModel, ObjectRef,
    RelatedTopicModel, RoleModel, TopicModel, ViewConfigurationModel, UNASSIGNED_ID,
};

// Re-export the type system
pub use projections::TypeView;
pub use types::{AssocDefKind, AssociationDefinitionModel, TypeCache, TypeKind, TypeModel};

// Re-export value objects
pub use value_objects::{uris, Cardinality, IndexMode, SimpleValue};

// Re-export storage
pub use infrastructure::InMemoryGraphStorage;
pub use storage::{GraphStorage, StorageError, StorageTransaction};
