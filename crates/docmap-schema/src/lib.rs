//! Schema registry and mapping compiler for docmap.
//!
//! Application types declare how they map onto store documents: which index
//! and type they live in, which field carries the id, and the store-facing
//! options of each field. Declarations happen once, on a
//! [`RegistryBuilder`], and are frozen into a read-only [`Registry`].
//!
//! # Modules
//!
//! - [`class`] -- class identity ([`ClassId`]) and the [`Mapped`] trait
//! - [`descriptor`] -- index and property descriptors, declaration inputs
//! - [`registry`] -- [`RegistryBuilder`], [`ClassDeclaration`], [`Registry`]
//! - [`compiler`] -- [`compile`], property tree to store mapping
//! - [`global`] -- optional process-wide registry
//!
//! # Invariants
//!
//! 1. Each field name is declared at most once per class.
//! 2. A class has at most one primary field.
//! 3. Embedded schemas are copied at declaration time, so the schema graph
//!    is always a finite tree.
//! 4. Nothing outside the registration phase mutates a descriptor.

pub mod class;
pub mod compiler;
pub mod descriptor;
pub mod error;
pub mod global;
pub mod registry;

pub use class::{ClassId, Mapped};
pub use compiler::compile;
pub use descriptor::{
    EmbeddedSchema, FieldKind, FieldSpec, IndexDescriptor, IndexOptions, IndexSpec,
    PropertyDescriptor, PropertyTree,
};
pub use error::{SchemaError, SchemaResult};
pub use registry::{id_value, ClassDeclaration, Registry, RegistryBuilder, Schema};
