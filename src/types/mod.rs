//! Type system
//!
//! Types are topics themselves. The kernel ([`TypeModel`]) is the only
//! mutable representation; everything handed to readers is a
//! [`TypeView`](crate::projections::TypeView).

mod assoc_def;
pub mod type_cache;
mod type_model;

pub use assoc_def::{AssocDefKind, AssociationDefinitionModel};
pub use type_cache::{CachedType, TypeCache};
pub use type_model::{TypeKind, TypeModel};
