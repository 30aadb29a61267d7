//! Read-side projections
//!
//! Readers of the type system receive projections, never the kernel.

pub mod type_view;

pub use type_view::TypeView;
