//! The bulk indexing pipeline.

use serde::Serialize;
use tracing::{debug, info, warn};

use docmap_mapper::{BulkAction, QueryResolver};
use docmap_schema::{ClassId, Mapped};
use docmap_store::{BulkRequest, StoreClient};

use crate::error::BulkResult;
use crate::source::BulkSource;

/// Largest number of documents submitted in one bulk request.
pub const MAX_CHUNK_SIZE: usize = 1000;

// ---------------------------------------------------------------------------
// PipelineState / BulkReport
// ---------------------------------------------------------------------------

/// Where a pipeline run stands.
///
/// `Streaming` and `Flushing` alternate until the source ends (`Done`) or
/// anything fails (`Error`). Both terminal states are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// Pulling items into the buffer.
    Streaming,
    /// Submitting a full (or final) chunk; the source is not read.
    Flushing,
    Done,
    Error,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Summary of a successful run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// Bulk requests submitted.
    pub chunks: usize,
    /// Documents submitted across all chunks.
    pub documents: usize,
}

// ---------------------------------------------------------------------------
// BulkPipeline
// ---------------------------------------------------------------------------

/// Buffers items from a [`BulkSource`] into chunks of at most
/// [`MAX_CHUNK_SIZE`] documents and submits them one at a time.
///
/// Chunk `k + 1` is neither built nor sent before chunk `k` has completed.
/// The first failure (from the source, from building a chunk, or from the
/// store) stops the run: nothing more is read or submitted, and chunks
/// already accepted stay accepted. Nothing is retried.
pub struct BulkPipeline<'a, C: ?Sized> {
    client: &'a C,
    resolver: QueryResolver<'a>,
    state: PipelineState,
}

impl<'a, C: StoreClient + ?Sized> BulkPipeline<'a, C> {
    pub fn new(client: &'a C, resolver: QueryResolver<'a>) -> Self {
        Self {
            client,
            resolver,
            state: PipelineState::Streaming,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Index every item of `source` as a document of class `T`.
    ///
    /// The source is dropped before this returns, whatever the outcome, so
    /// a channel feeder sees [`crate::BulkError::Abandoned`] afterwards.
    pub async fn run<T, D>(&mut self, source: BulkSource<D>) -> BulkResult<BulkReport>
    where
        T: Mapped,
        D: Serialize + Send,
    {
        let mut source = source;
        let mut report = BulkReport::default();
        let class = ClassId::of::<T>();

        let outcome = self.drive(class, &mut source, &mut report).await;
        drop(source);

        match outcome {
            Ok(()) => {
                self.transition(PipelineState::Done);
                info!(class = %class, chunks = report.chunks, documents = report.documents, "bulk index complete");
                Ok(report)
            }
            Err(error) => {
                self.transition(PipelineState::Error);
                warn!(
                    class = %class,
                    chunks = report.chunks,
                    documents = report.documents,
                    %error,
                    "bulk index aborted"
                );
                Err(error)
            }
        }
    }

    async fn drive<D>(&mut self, class: ClassId, source: &mut BulkSource<D>, report: &mut BulkReport) -> BulkResult<()>
    where
        D: Serialize + Send,
    {
        // Unknown classes fail before anything is read or sent.
        self.resolver.from_class_id(class)?;

        self.transition(PipelineState::Streaming);
        let mut buffer = Vec::with_capacity(MAX_CHUNK_SIZE);
        while let Some(item) = source.next().await {
            buffer.push(item?);
            if buffer.len() == MAX_CHUNK_SIZE {
                self.flush(class, &mut buffer, report).await?;
                self.transition(PipelineState::Streaming);
            }
        }
        self.flush(class, &mut buffer, report).await
    }

    /// Submit the buffered items as one chunk. An empty buffer sends nothing.
    async fn flush<D>(&mut self, class: ClassId, buffer: &mut Vec<D>, report: &mut BulkReport) -> BulkResult<()>
    where
        D: Serialize + Send,
    {
        self.transition(PipelineState::Flushing);
        if buffer.is_empty() {
            return Ok(());
        }

        let documents = buffer.len();
        let body = self.resolver.bulk_body(BulkAction::Index, class, buffer.drain(..))?;
        let chunk = report.chunks + 1;
        debug!(class = %class, chunk, documents, "submitting bulk chunk");

        let response = self.client.bulk(BulkRequest::new(body)).await?;
        if response.errors {
            debug!(class = %class, chunk, "bulk chunk reported item errors");
        }

        report.chunks = chunk;
        report.documents += documents;
        Ok(())
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "bulk pipeline state");
            self.state = next;
        }
    }
}
