//! Artifact I/O offload.
//!
//! Reading artifact bytes is the one place evaluation touches the outside
//! world, so it runs on a dedicated worker thread behind a channel. The
//! engine only ever holds an [`OffloadClient`]; where the bytes actually live
//! is the [`ArtifactStore`] implementation's business.
//!
//! Lifecycle: [`OffloadService::start`] spawns the worker, clients are cheap
//! clones of the request sender, and [`OffloadService::shutdown`] (or drop)
//! stops the worker. Requests sent after shutdown fail with
//! [`Error::Offload`] rather than hanging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, mpsc};
use std::thread;

use lace_result::{Error, Result};
use lace_types::{ArtifactId, AssetRef};
use rustc_hash::FxHashMap;

/// Backing storage for artifact bytes, keyed by artifact id and path.
///
/// Implementations must be safe to call from the worker thread while the
/// owning service is shared elsewhere.
pub trait ArtifactStore: Send + Sync + 'static {
    /// Reserve a fresh artifact id.
    fn allocate(&self) -> ArtifactId;

    /// Store `bytes` under `(artifact, path)`, replacing any previous entry.
    fn put(&self, artifact: ArtifactId, path: &str, bytes: Vec<u8>) -> Result<()>;

    /// Fetch the bytes stored under `(artifact, path)`.
    fn get(&self, artifact: ArtifactId, path: &str) -> Result<Vec<u8>>;
}

/// In-memory [`ArtifactStore`] used for tests and single-process runs.
pub struct MemArtifactStore {
    next_id: AtomicU64,
    blobs: RwLock<FxHashMap<(ArtifactId, String), Vec<u8>>>,
}

impl Default for MemArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemArtifactStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            blobs: RwLock::new(FxHashMap::default()),
        }
    }

    /// Number of stored `(artifact, path)` entries.
    pub fn entry_count(&self) -> usize {
        self.blobs
            .read()
            .expect("MemArtifactStore blobs read lock poisoned")
            .len()
    }
}

impl ArtifactStore for MemArtifactStore {
    fn allocate(&self) -> ArtifactId {
        ArtifactId::from(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn put(&self, artifact: ArtifactId, path: &str, bytes: Vec<u8>) -> Result<()> {
        let mut map = self
            .blobs
            .write()
            .expect("MemArtifactStore blobs write lock poisoned");
        map.insert((artifact, path.to_string()), bytes);
        Ok(())
    }

    fn get(&self, artifact: ArtifactId, path: &str) -> Result<Vec<u8>> {
        let map = self
            .blobs
            .read()
            .expect("MemArtifactStore blobs read lock poisoned");
        map.get(&(artifact, path.to_string()))
            .cloned()
            .ok_or_else(|| Error::Offload(format!("no bytes stored for {artifact} at '{path}'")))
    }
}

enum OffloadRequest {
    Read {
        artifact: ArtifactId,
        path: String,
        reply: mpsc::SyncSender<Result<Vec<u8>>>,
    },
    Write {
        path: String,
        bytes: Vec<u8>,
        reply: mpsc::SyncSender<Result<AssetRef>>,
    },
    Shutdown,
}

/// Owns the offload worker thread.
pub struct OffloadService {
    sender: mpsc::Sender<OffloadRequest>,
    worker: Option<thread::JoinHandle<()>>,
}

impl OffloadService {
    /// Spawn the worker thread over the given store.
    pub fn start(store: Arc<dyn ArtifactStore>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("lace-offload".to_string())
            .spawn(move || worker_loop(store, receiver))?;
        tracing::debug!("offload worker started");
        Ok(Self {
            sender,
            worker: Some(worker),
        })
    }

    /// A handle that routes artifact reads and writes through the worker.
    pub fn client(&self) -> OffloadClient {
        OffloadClient {
            sender: self.sender.clone(),
        }
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// Outstanding clients keep their senders; their next request fails with
    /// [`Error::Offload`].
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.sender.send(OffloadRequest::Shutdown).ok();
            worker.join().ok();
        }
    }
}

impl Drop for OffloadService {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn worker_loop(store: Arc<dyn ArtifactStore>, receiver: mpsc::Receiver<OffloadRequest>) {
    while let Ok(request) = receiver.recv() {
        match request {
            OffloadRequest::Read {
                artifact,
                path,
                reply,
            } => {
                tracing::trace!(%artifact, path, "offload read");
                reply.send(store.get(artifact, &path)).ok();
            }
            OffloadRequest::Write { path, bytes, reply } => {
                tracing::trace!(path, len = bytes.len(), "offload write");
                let artifact = store.allocate();
                let result = store
                    .put(artifact, &path, bytes)
                    .map(|()| AssetRef::new(artifact, path));
                reply.send(result).ok();
            }
            OffloadRequest::Shutdown => break,
        }
    }
    tracing::debug!("offload worker stopped");
}

/// Cheaply cloneable handle to the offload worker.
#[derive(Clone)]
pub struct OffloadClient {
    sender: mpsc::Sender<OffloadRequest>,
}

impl OffloadClient {
    /// Read the bytes behind an asset reference.
    pub fn read_artifact(&self, artifact: ArtifactId, path: &str) -> Result<Vec<u8>> {
        let (reply, response) = mpsc::sync_channel(1);
        self.sender
            .send(OffloadRequest::Read {
                artifact,
                path: path.to_string(),
                reply,
            })
            .map_err(|_| Error::Offload("offload worker is not running".to_string()))?;
        response
            .recv()
            .map_err(|_| Error::Offload("offload worker dropped the request".to_string()))?
    }

    /// Store bytes as a new artifact and return the asset reference for it.
    pub fn write_artifact(&self, path: &str, bytes: Vec<u8>) -> Result<AssetRef> {
        let (reply, response) = mpsc::sync_channel(1);
        self.sender
            .send(OffloadRequest::Write {
                path: path.to_string(),
                bytes,
                reply,
            })
            .map_err(|_| Error::Offload("offload worker is not running".to_string()))?;
        response
            .recv()
            .map_err(|_| Error::Offload("offload worker dropped the request".to_string()))?
    }
}
