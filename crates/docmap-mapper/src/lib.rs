//! Object-document mapping for docmap.
//!
//! Two directions, both driven by the schema registry:
//!
//! - **Documents to instances**: [`DocumentMapper`] rebuilds typed instance
//!   graphs from raw, possibly nested, possibly array-valued documents.
//! - **Calls to requests**: [`QueryResolver`] turns the accepted call shapes
//!   ([`Target`]) into one canonical [`QueryStructure`], and builds bulk
//!   request bodies.
//!
//! Nothing here talks to a store.

pub mod error;
pub mod mapper;
pub mod partial;
pub mod record;
pub mod resolver;

pub use error::{MapperError, MapperResult};
pub use mapper::DocumentMapper;
pub use partial::Partial;
pub use record::{FieldValue, Record, Reconstructed};
pub use resolver::{BulkAction, QueryResolver, QueryStructure, Target};
