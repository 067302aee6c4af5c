//! Item sources for the bulk pipeline.
//!
//! A source is pulled one item at a time. The pipeline stops pulling while a
//! chunk is being submitted, so a bounded channel fills up and holds its
//! producer back until the submission completes.

use std::collections::VecDeque;

use tokio::sync::mpsc;

use crate::error::{BulkError, BulkResult};

enum Inner<D> {
    Items(VecDeque<D>),
    Channel(mpsc::Receiver<Result<D, BulkError>>),
}

/// Items for a bulk run: an owned list or the receiving end of a channel.
pub struct BulkSource<D> {
    inner: Inner<D>,
}

impl<D> BulkSource<D> {
    /// A bounded channel source. The feeder pushes items (or a failure);
    /// dropping it ends the source.
    pub fn channel(capacity: usize) -> (BulkFeeder<D>, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            BulkFeeder { sender },
            Self {
                inner: Inner::Channel(receiver),
            },
        )
    }

    /// The next item, a source failure, or `None` once the source has ended.
    pub async fn next(&mut self) -> Option<Result<D, BulkError>> {
        match &mut self.inner {
            Inner::Items(items) => items.pop_front().map(Ok),
            Inner::Channel(receiver) => receiver.recv().await,
        }
    }
}

impl<D> From<Vec<D>> for BulkSource<D> {
    fn from(items: Vec<D>) -> Self {
        Self {
            inner: Inner::Items(items.into()),
        }
    }
}

impl<D> FromIterator<D> for BulkSource<D> {
    fn from_iter<I: IntoIterator<Item = D>>(iter: I) -> Self {
        Self {
            inner: Inner::Items(iter.into_iter().collect()),
        }
    }
}

impl<D> std::fmt::Debug for BulkSource<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Inner::Items(items) => f.debug_struct("BulkSource").field("items", &items.len()).finish(),
            Inner::Channel(_) => f.debug_struct("BulkSource").field("channel", &true).finish(),
        }
    }
}

/// Producer half of a channel source.
#[derive(Debug)]
pub struct BulkFeeder<D> {
    sender: mpsc::Sender<Result<D, BulkError>>,
}

impl<D> Clone for BulkFeeder<D> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<D> BulkFeeder<D> {
    /// Push one item, waiting while the channel is full.
    ///
    /// Fails with [`BulkError::Abandoned`] once the pipeline has finished
    /// or aborted.
    pub async fn send(&self, item: D) -> BulkResult<()> {
        self.sender.send(Ok(item)).await.map_err(|_| BulkError::Abandoned)
    }

    /// Report a source failure; the pipeline aborts when it reaches it.
    pub async fn fail(&self, message: impl Into<String>) -> BulkResult<()> {
        self.sender
            .send(Err(BulkError::source_failure(message)))
            .await
            .map_err(|_| BulkError::Abandoned)
    }

    /// Whether the pipeline has dropped the source.
    pub fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }
}
