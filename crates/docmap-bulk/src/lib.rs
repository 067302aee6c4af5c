//! Bulk indexing for docmap.
//!
//! A [`BulkPipeline`] reads items from a [`BulkSource`] (an owned list, or a
//! bounded channel fed through a [`BulkFeeder`]), cuts them into chunks of
//! at most [`MAX_CHUNK_SIZE`] documents, and submits each chunk as one bulk
//! request.
//!
//! # Guarantees
//!
//! 1. At most one chunk submission is in flight.
//! 2. Chunks are submitted in source order.
//! 3. The first failure ends the run; later chunks are never built.
//! 4. The source is released on every exit path.

pub mod error;
pub mod pipeline;
pub mod source;

pub use error::{BulkError, BulkResult};
pub use pipeline::{BulkPipeline, BulkReport, PipelineState, MAX_CHUNK_SIZE};
pub use source::{BulkFeeder, BulkSource};
