//! In-memory remote services shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use astrovision_sync::app::transfer::{RemoteObject, UploadCursor};
use astrovision_sync::app::{ObjectSource, RemoteLocator, UploadSink};
use astrovision_sync::errors::{TransferError, TransferResult};

/// Object store keyed by path, playing both the hub and the upload service
///
/// Uploaded destinations are stored without their leading `/`, so an object
/// published to `/segments/ds/seg1.zip` is served for the hub path
/// `segments/ds/seg1.zip`.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    sessions: Mutex<HashMap<String, Vec<u8>>>,
    next_session: Mutex<u32>,
    /// Body chunk size used when serving objects
    pub serve_chunk: usize,
    pub calls: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            serve_chunk: 1000,
            ..Default::default()
        }
    }

    pub fn insert(&self, path: &str, data: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.trim_start_matches('/').to_string(), data);
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(path.trim_start_matches('/'))
            .cloned()
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl ObjectSource for MemoryStore {
    async fn open(&self, locator: &RemoteLocator) -> TransferResult<RemoteObject> {
        self.log(format!("open {}", locator));
        let data = self.get(locator.as_str()).ok_or_else(|| TransferError::ServerError {
            status: 404,
            url: locator.as_str().to_string(),
        })?;

        let chunks: Vec<TransferResult<Bytes>> = data
            .chunks(self.serve_chunk.max(1))
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(RemoteObject {
            content_length: Some(data.len() as u64),
            body: futures::stream::iter(chunks).boxed(),
        })
    }
}

#[async_trait]
impl UploadSink for MemoryStore {
    async fn upload(&self, data: Bytes, destination: &str) -> TransferResult<()> {
        self.log(format!("upload {}", destination));
        self.insert(destination, data.to_vec());
        Ok(())
    }

    async fn start_session(&self, first_chunk: Bytes) -> TransferResult<String> {
        let mut next = self.next_session.lock().unwrap();
        *next += 1;
        let session_id = format!("session-{}", *next);
        self.log(format!("start {}", session_id));
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.clone(), first_chunk.to_vec());
        Ok(session_id)
    }

    async fn append(&self, cursor: &UploadCursor, chunk: Bytes) -> TransferResult<()> {
        self.log(format!("append {}@{}", cursor.session_id, cursor.offset));
        let mut sessions = self.sessions.lock().unwrap();
        let buffer = sessions
            .get_mut(&cursor.session_id)
            .ok_or_else(|| TransferError::Append {
                session_id: cursor.session_id.clone(),
                offset: cursor.offset,
                reason: "unknown session".to_string(),
            })?;
        if buffer.len() as u64 != cursor.offset {
            return Err(TransferError::Append {
                session_id: cursor.session_id.clone(),
                offset: cursor.offset,
                reason: format!("incorrect offset, expected {}", buffer.len()),
            });
        }
        buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(
        &self,
        cursor: &UploadCursor,
        last_chunk: Bytes,
        destination: &str,
    ) -> TransferResult<()> {
        self.log(format!("finish {}@{}", cursor.session_id, cursor.offset));
        let mut buffer = self
            .sessions
            .lock()
            .unwrap()
            .remove(&cursor.session_id)
            .ok_or_else(|| TransferError::Finish {
                session_id: cursor.session_id.clone(),
                destination: destination.to_string(),
                reason: "unknown session".to_string(),
            })?;
        assert_eq!(buffer.len() as u64, cursor.offset);
        buffer.extend_from_slice(&last_chunk);
        self.insert(destination, buffer);
        Ok(())
    }
}

/// Deterministic bytes that deflate cannot shrink much
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xff) as u8
        })
        .collect()
}

/// `<root>/<dataset>/<unit>/images/*.png` result tree
pub fn result_tree(root: &Path, dataset: &str, units: &[&str], image_len: usize) -> PathBuf {
    let local_dir = root.join(dataset);
    for (index, unit) in units.iter().enumerate() {
        let images = local_dir.join(unit).join("images");
        std::fs::create_dir_all(&images).unwrap();
        for frame in 0..3u32 {
            std::fs::write(
                images.join(format!("frame_{}.png", frame)),
                noise(image_len, index as u32 * 10 + frame + 1),
            )
            .unwrap();
        }
        std::fs::write(
            local_dir.join(unit).join("cameras.json"),
            format!("{{\"unit\": \"{}\"}}", unit),
        )
        .unwrap();
    }
    local_dir
}
