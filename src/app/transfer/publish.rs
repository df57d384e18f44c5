//! Chunked uploads
//!
//! A file no larger than one chunk is stored with a single upload call.
//! Anything larger opens an upload session with the first chunk, appends
//! chunks while more than one chunk remains unread, and closes the session
//! with whatever is left. Failures are not retried.

use std::path::Path;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use super::{ProgressCallback, TransferProgress, UploadCursor, UploadSink};
use crate::constants::transfer;
use crate::errors::{TransferError, TransferResult};

/// What a publish call sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOutcome {
    pub bytes_sent: u64,
    /// Number of upload calls, including session start and finish
    pub calls: usize,
    /// Whether a chunked session was used
    pub chunked: bool,
}

/// Uploads local files to an [`UploadSink`]
#[derive(Clone)]
pub struct Publisher {
    sink: Arc<dyn UploadSink>,
    chunk_size: usize,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl Publisher {
    pub fn new(sink: Arc<dyn UploadSink>) -> Self {
        Self {
            sink,
            chunk_size: transfer::UPLOAD_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Upload `local_path` to `destination`
    pub async fn publish(
        &self,
        local_path: &Path,
        destination: &str,
        progress: &dyn ProgressCallback,
    ) -> TransferResult<PublishOutcome> {
        let mut file = File::open(local_path)
            .await
            .map_err(|e| TransferError::io(local_path, e))?;
        let file_size = file
            .metadata()
            .await
            .map_err(|e| TransferError::io(local_path, e))?
            .len();
        let chunk = self.chunk_size as u64;

        let mut state = TransferProgress {
            bytes_transferred: 0,
            total_bytes: Some(file_size),
        };

        if file_size <= chunk {
            let data = read_chunk(&mut file, local_path, file_size as usize).await?;
            self.sink.upload(data, destination).await?;
            state.bytes_transferred = file_size;
            progress.on_progress(&state);
            progress.on_complete(&state);
            info!("Uploaded {} to {} in one call", local_path.display(), destination);
            return Ok(PublishOutcome {
                bytes_sent: file_size,
                calls: 1,
                chunked: false,
            });
        }

        let mut position = 0u64;
        let first = read_chunk(&mut file, local_path, self.chunk_size).await?;
        position += first.len() as u64;
        let session_id = self.sink.start_session(first).await?;
        let mut cursor = UploadCursor {
            session_id,
            offset: position,
        };
        let mut calls = 1;
        state.bytes_transferred = position;
        progress.on_progress(&state);
        debug!("Started upload session {} for {}", cursor.session_id, destination);

        loop {
            assert_eq!(
                cursor.offset, position,
                "upload cursor out of step with bytes read"
            );
            let remaining = file_size - position;

            if remaining <= chunk {
                let last = read_chunk(&mut file, local_path, remaining as usize).await?;
                position += last.len() as u64;
                self.sink.finish(&cursor, last, destination).await?;
                calls += 1;
                break;
            }

            let next = read_chunk(&mut file, local_path, self.chunk_size).await?;
            position += next.len() as u64;
            self.sink.append(&cursor, next).await?;
            calls += 1;
            cursor.offset = position;

            state.bytes_transferred = position;
            progress.on_progress(&state);
        }

        state.bytes_transferred = position;
        progress.on_progress(&state);
        progress.on_complete(&state);
        info!(
            "Uploaded {} to {} in {} calls",
            local_path.display(),
            destination,
            calls
        );

        Ok(PublishOutcome {
            bytes_sent: position,
            calls,
            chunked: true,
        })
    }
}

/// Read exactly `len` bytes unless the file ends first
async fn read_chunk(file: &mut File, path: &Path, len: usize) -> TransferResult<Bytes> {
    let mut buffer = BytesMut::zeroed(len);
    let mut filled = 0;
    while filled < len {
        let read = file
            .read(&mut buffer[filled..])
            .await
            .map_err(|e| TransferError::io(path, e))?;
        if read == 0 {
            return Err(TransferError::io(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "file shrank while it was being uploaded",
                ),
            ));
        }
        filled += read;
    }
    Ok(buffer.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::transfer::NoProgress;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Upload { len: usize, destination: String },
        Start { len: usize },
        Append { offset: u64, len: usize },
        Finish { offset: u64, len: usize, destination: String },
    }

    /// Records every call and the bytes received
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<Call>>,
        received: Mutex<Vec<u8>>,
        fail_appends: bool,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call, data: &[u8]) {
            self.calls.lock().unwrap().push(call);
            self.received.lock().unwrap().extend_from_slice(data);
        }
    }

    #[async_trait]
    impl UploadSink for RecordingSink {
        async fn upload(&self, data: Bytes, destination: &str) -> TransferResult<()> {
            let call = Call::Upload {
                len: data.len(),
                destination: destination.to_string(),
            };
            self.record(call, &data);
            Ok(())
        }

        async fn start_session(&self, first_chunk: Bytes) -> TransferResult<String> {
            self.record(
                Call::Start {
                    len: first_chunk.len(),
                },
                &first_chunk,
            );
            Ok("session-1".to_string())
        }

        async fn append(&self, cursor: &UploadCursor, chunk: Bytes) -> TransferResult<()> {
            if self.fail_appends {
                return Err(TransferError::Append {
                    session_id: cursor.session_id.clone(),
                    offset: cursor.offset,
                    reason: "rejected".to_string(),
                });
            }
            self.record(
                Call::Append {
                    offset: cursor.offset,
                    len: chunk.len(),
                },
                &chunk,
            );
            Ok(())
        }

        async fn finish(
            &self,
            cursor: &UploadCursor,
            last_chunk: Bytes,
            destination: &str,
        ) -> TransferResult<()> {
            let call = Call::Finish {
                offset: cursor.offset,
                len: last_chunk.len(),
                destination: destination.to_string(),
            };
            self.record(call, &last_chunk);
            Ok(())
        }
    }

    async fn write_file(dir: &TempDir, len: usize) -> (std::path::PathBuf, Vec<u8>) {
        let data: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
        let path = dir.path().join("seg1.zip");
        tokio::fs::write(&path, &data).await.unwrap();
        (path, data)
    }

    #[tokio::test]
    async fn test_small_file_uses_single_upload() {
        let temp_dir = TempDir::new().unwrap();
        let (path, data) = write_file(&temp_dir, 1000).await;
        let sink = Arc::new(RecordingSink::default());
        let publisher = Publisher::new(sink.clone());

        let outcome = publisher
            .publish(&path, "/results/seg1.zip", &NoProgress)
            .await
            .unwrap();

        assert!(!outcome.chunked);
        assert_eq!(
            sink.calls(),
            vec![Call::Upload {
                len: 1000,
                destination: "/results/seg1.zip".to_string()
            }]
        );
        assert_eq!(*sink.received.lock().unwrap(), data);
    }

    #[tokio::test]
    async fn test_exactly_one_chunk_uses_single_upload() {
        let temp_dir = TempDir::new().unwrap();
        let (path, _) = write_file(&temp_dir, 4096).await;
        let sink = Arc::new(RecordingSink::default());
        let publisher = Publisher::new(sink.clone()).with_chunk_size(4096);

        publisher.publish(&path, "/r/seg1.zip", &NoProgress).await.unwrap();
        assert!(matches!(sink.calls().as_slice(), [Call::Upload { len: 4096, .. }]));
    }

    #[tokio::test]
    async fn test_unaligned_file_finishes_with_remainder() {
        let temp_dir = TempDir::new().unwrap();
        let (path, data) = write_file(&temp_dir, 3 * 4096 + 10).await;
        let sink = Arc::new(RecordingSink::default());
        let publisher = Publisher::new(sink.clone()).with_chunk_size(4096);

        let outcome = publisher.publish(&path, "/r/seg1.zip", &NoProgress).await.unwrap();

        assert_eq!(
            sink.calls(),
            vec![
                Call::Start { len: 4096 },
                Call::Append {
                    offset: 4096,
                    len: 4096
                },
                Call::Append {
                    offset: 8192,
                    len: 4096
                },
                Call::Finish {
                    offset: 12288,
                    len: 10,
                    destination: "/r/seg1.zip".to_string()
                },
            ]
        );
        assert_eq!(outcome.calls, 4);
        assert_eq!(outcome.bytes_sent, data.len() as u64);
        assert_eq!(*sink.received.lock().unwrap(), data);
    }

    #[tokio::test]
    async fn test_two_chunks_skip_append() {
        let temp_dir = TempDir::new().unwrap();
        let (path, _) = write_file(&temp_dir, 2 * 4096).await;
        let sink = Arc::new(RecordingSink::default());
        let publisher = Publisher::new(sink.clone()).with_chunk_size(4096);

        publisher.publish(&path, "/r/seg1.zip", &NoProgress).await.unwrap();
        assert!(matches!(
            sink.calls().as_slice(),
            [
                Call::Start { len: 4096 },
                Call::Finish {
                    offset: 4096,
                    len: 4096,
                    ..
                }
            ]
        ));
    }

    #[tokio::test]
    async fn test_hundred_mebibytes_in_default_chunks() {
        let temp_dir = TempDir::new().unwrap();
        let size = 100 * 1024 * 1024;
        let (path, data) = write_file(&temp_dir, size).await;
        let sink = Arc::new(RecordingSink::default());
        let publisher = Publisher::new(sink.clone());
        assert_eq!(publisher.chunk_size(), 64 * 1024);

        publisher.publish(&path, "/r/big.zip", &NoProgress).await.unwrap();

        let calls = sink.calls();
        let total_chunks = size / (64 * 1024);
        let starts = calls.iter().filter(|c| matches!(c, Call::Start { .. })).count();
        let appends = calls
            .iter()
            .filter(|c| matches!(c, Call::Append { .. }))
            .count();
        let finishes: Vec<_> = calls
            .iter()
            .filter(|c| matches!(c, Call::Finish { .. }))
            .collect();

        assert_eq!(starts, 1);
        assert_eq!(finishes.len(), 1);
        assert_eq!(starts + appends, total_chunks - 1);
        match finishes[0] {
            Call::Finish { offset, len, .. } => {
                assert_eq!(*offset, (size - 64 * 1024) as u64);
                assert_eq!(*len, 64 * 1024);
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert!(*sink.received.lock().unwrap() == data);
    }

    #[tokio::test]
    async fn test_append_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let (path, _) = write_file(&temp_dir, 3 * 4096).await;
        let sink = Arc::new(RecordingSink {
            fail_appends: true,
            ..Default::default()
        });
        let publisher = Publisher::new(sink.clone()).with_chunk_size(4096);

        let result = publisher.publish(&path, "/r/seg1.zip", &NoProgress).await;
        match result {
            Err(TransferError::Append {
                session_id, offset, ..
            }) => {
                assert_eq!(session_id, "session-1");
                assert_eq!(offset, 4096);
            }
            other => panic!("Expected Append error, got {:?}", other),
        }
        // No retry, no finish
        assert_eq!(sink.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = Publisher::new(sink.clone());
        let result = publisher
            .publish(Path::new("/nonexistent/seg1.zip"), "/r/seg1.zip", &NoProgress)
            .await;
        assert!(matches!(result, Err(TransferError::Io { .. })));
        assert!(sink.calls().is_empty());
    }
}
