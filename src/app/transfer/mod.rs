//! Transfer engine
//!
//! Moves archive bytes between the remote services and local disk:
//!
//! - [`fetch`] - Streams a remote object to a local file in fixed-size chunks
//! - [`publish`] - Uploads a local file, switching to a chunked session for
//!   anything larger than one chunk
//!
//! The remote side is reached only through the [`ObjectSource`] and
//! [`UploadSink`] traits. The HTTP implementations live in
//! [`crate::app::client`]; tests substitute in-memory fakes.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::app::models::RemoteLocator;
use crate::errors::TransferResult;

pub mod fetch;
pub mod publish;

pub use fetch::{FetchOptions, Fetcher, PartialPolicy};
pub use publish::{PublishOutcome, Publisher};

/// Progress of a single transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Cumulative bytes moved so far
    pub bytes_transferred: u64,
    /// Total size when the remote side reports it
    pub total_bytes: Option<u64>,
}

/// Receives cumulative byte counts while a transfer runs
///
/// Calls for one transfer carry monotonically increasing
/// `bytes_transferred` values.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, progress: &TransferProgress);

    /// Called once after the last byte has been transferred
    fn on_complete(&self, _progress: &TransferProgress) {}
}

/// Progress callback that discards updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _progress: &TransferProgress) {}
}

/// Hands out one progress callback per transfer
pub trait ProgressFactory: Send + Sync {
    fn for_transfer(&self, label: &str) -> Box<dyn ProgressCallback>;
}

impl ProgressFactory for NoProgress {
    fn for_transfer(&self, _label: &str) -> Box<dyn ProgressCallback> {
        Box::new(NoProgress)
    }
}

/// An opened remote object, ready to be streamed
pub struct RemoteObject {
    /// Size reported by the remote, if any
    pub content_length: Option<u64>,
    /// Body chunks in order
    pub body: BoxStream<'static, TransferResult<Bytes>>,
}

impl std::fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteObject")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Read side of the remote dataset hub
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Open the object a locator points at
    async fn open(&self, locator: &RemoteLocator) -> TransferResult<RemoteObject>;
}

/// Position within an open upload session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCursor {
    pub session_id: String,
    /// Bytes the service has accepted so far
    pub offset: u64,
}

/// Write side of the remote object store
///
/// Objects up to one chunk go through [`UploadSink::upload`]. Larger objects
/// open a session with the first chunk, append the middle chunks and close
/// the session with the last chunk.
#[async_trait]
pub trait UploadSink: Send + Sync {
    /// Store a small object in a single call
    async fn upload(&self, data: Bytes, destination: &str) -> TransferResult<()>;

    /// Open a session with its first chunk, returning the session id
    async fn start_session(&self, first_chunk: Bytes) -> TransferResult<String>;

    /// Append a chunk at `cursor.offset`
    async fn append(&self, cursor: &UploadCursor, chunk: Bytes) -> TransferResult<()>;

    /// Close the session with its last chunk and commit it to `destination`
    async fn finish(
        &self,
        cursor: &UploadCursor,
        last_chunk: Bytes,
        destination: &str,
    ) -> TransferResult<()>;
}
