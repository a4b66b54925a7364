mod prototype;

pub use prototype::{parse_gltf, AssetPrototype};

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read glTF at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse glTF at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("glTF at {path} references missing buffer {index}")]
    MissingBuffer { path: String, index: usize },
    #[error("glTF at {path} contains no triangle meshes")]
    NoTriangles { path: String },
    #[error("failed to start asset loader thread: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },
}

pub type LoadFn = dyn Fn(&Path, &LoadProgress) -> Result<AssetPrototype, AssetError> + Send + Sync;

const READ_CHUNK: usize = 64 * 1024;

/// Outcome of a background load, delivered by [`AssetManager::poll`].
#[derive(Debug, Clone)]
pub enum AssetEvent {
    Loaded {
        path: String,
        prototype: Arc<AssetPrototype>,
    },
    Failed {
        path: String,
        error: String,
    },
}

enum LoadUpdate {
    Progress(f32),
    Done(Result<AssetPrototype, AssetError>),
}

struct LoadMessage {
    generation: u64,
    path: String,
    update: LoadUpdate,
}

/// Handed to a loader so it can report how far along it is.
pub struct LoadProgress {
    generation: u64,
    path: String,
    sender: Sender<LoadMessage>,
}

impl LoadProgress {
    /// `fraction` is clamped to `[0, 1]`.
    pub fn report(&self, fraction: f32) {
        let _ = self.sender.send(LoadMessage {
            generation: self.generation,
            path: self.path.clone(),
            update: LoadUpdate::Progress(fraction.clamp(0.0, 1.0)),
        });
    }
}

/// Loads assets on background threads. Each path is loaded at most once;
/// results are handed back on the UI thread through [`poll`](Self::poll).
pub struct AssetManager {
    root: PathBuf,
    loader: Arc<LoadFn>,
    generation: u64,
    sender: Sender<LoadMessage>,
    receiver: Receiver<LoadMessage>,
    pending: HashSet<String>,
    progress: HashMap<String, f32>,
    cache: HashMap<String, Arc<AssetPrototype>>,
    failures: HashMap<String, String>,
    ready: Vec<AssetEvent>,
    discarded: usize,
}

impl AssetManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_loader(root, Arc::new(load_gltf_file))
    }

    pub fn with_loader(root: impl Into<PathBuf>, loader: Arc<LoadFn>) -> Self {
        let (sender, receiver) = channel();
        Self {
            root: root.into(),
            loader,
            generation: 0,
            sender,
            receiver,
            pending: HashSet::new(),
            progress: HashMap::new(),
            cache: HashMap::new(),
            failures: HashMap::new(),
            ready: Vec::new(),
            discarded: 0,
        }
    }

    /// Starts loading `path` unless it is cached, failed or already in
    /// flight. Cached and failed paths are re-announced on the next poll.
    pub fn request(&mut self, path: &str) {
        if let Some(prototype) = self.cache.get(path) {
            self.ready.push(AssetEvent::Loaded {
                path: path.to_string(),
                prototype: Arc::clone(prototype),
            });
            return;
        }
        if let Some(error) = self.failures.get(path) {
            self.ready.push(AssetEvent::Failed {
                path: path.to_string(),
                error: error.clone(),
            });
            return;
        }
        if !self.pending.insert(path.to_string()) {
            return;
        }

        let full_path = self.root.join(path);
        let sender = self.sender.clone();
        let loader = Arc::clone(&self.loader);
        let generation = self.generation;
        let key = path.to_string();
        log::info!("loading asset {}", full_path.display());
        let spawned = std::thread::Builder::new()
            .name(format!("asset-load-{}", path))
            .spawn(move || {
                let progress = LoadProgress {
                    generation,
                    path: key.clone(),
                    sender: sender.clone(),
                };
                let result = loader(&full_path, &progress);
                // The receiver is gone once the manager is dropped.
                let _ = sender.send(LoadMessage {
                    generation,
                    path: key,
                    update: LoadUpdate::Done(result),
                });
            });
        if let Err(source) = spawned {
            self.pending.remove(path);
            self.record_failure(path, AssetError::Spawn { source });
        }
    }

    /// Drains finished loads. Results from before the last
    /// [`shutdown`](Self::shutdown) are dropped.
    pub fn poll(&mut self) -> Vec<AssetEvent> {
        while let Ok(message) = self.receiver.try_recv() {
            if message.generation != self.generation {
                if matches!(message.update, LoadUpdate::Progress(_)) {
                    continue;
                }
                self.discarded += 1;
                log::debug!(
                    "discarding stale load of {} ({} discarded so far)",
                    message.path,
                    self.discarded
                );
                continue;
            }
            let result = match message.update {
                LoadUpdate::Progress(fraction) => {
                    if self.pending.contains(&message.path) {
                        self.progress.insert(message.path, fraction);
                    }
                    continue;
                }
                LoadUpdate::Done(result) => result,
            };
            self.pending.remove(&message.path);
            self.progress.remove(&message.path);
            match result {
                Ok(prototype) => {
                    log::info!(
                        "loaded {} ({} triangles)",
                        message.path,
                        prototype.triangle_count()
                    );
                    let prototype = Arc::new(prototype);
                    self.cache
                        .insert(message.path.clone(), Arc::clone(&prototype));
                    self.ready.push(AssetEvent::Loaded {
                        path: message.path,
                        prototype,
                    });
                }
                Err(err) => self.record_failure(&message.path, err),
            }
        }
        std::mem::take(&mut self.ready)
    }

    fn record_failure(&mut self, path: &str, err: AssetError) {
        log::error!("{err}");
        let error = err.to_string();
        self.failures.insert(path.to_string(), error.clone());
        self.ready.push(AssetEvent::Failed {
            path: path.to_string(),
            error,
        });
    }

    /// Mean completion of the loads in flight; `None` when nothing is loading.
    /// Loads that have not reported yet count as zero.
    pub fn progress(&self) -> Option<f32> {
        if self.pending.is_empty() {
            return None;
        }
        let total: f32 = self
            .pending
            .iter()
            .map(|path| self.progress.get(path).copied().unwrap_or(0.0))
            .sum();
        Some(total / self.pending.len() as f32)
    }

    #[cfg(test)]
    pub fn is_pending(&self, path: &str) -> bool {
        self.pending.contains(path)
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.failures
            .iter()
            .map(|(path, error)| (path.as_str(), error.as_str()))
    }

    /// Number of results dropped because they arrived after a shutdown.
    #[cfg(test)]
    pub fn discarded_count(&self) -> usize {
        self.discarded
    }

    /// Forgets all loads. In-flight loads still finish but are discarded.
    pub fn shutdown(&mut self) {
        self.generation += 1;
        self.pending.clear();
        self.progress.clear();
        self.cache.clear();
        self.failures.clear();
        self.ready.clear();
    }
}

pub fn load_gltf_file(path: &Path, progress: &LoadProgress) -> Result<AssetPrototype, AssetError> {
    let bytes = load_gltf_bytes(path, progress)?;
    parse_gltf(&bytes, path)
}

/// Reads the file in chunks, reporting the byte fraction read so far.
fn load_gltf_bytes(path: &Path, progress: &LoadProgress) -> Result<Vec<u8>, AssetError> {
    let read_error = |source: std::io::Error| AssetError::Read {
        path: path.display().to_string(),
        source,
    };
    let mut file = File::open(path).map_err(read_error)?;
    let total = file.metadata().map_err(read_error)?.len();
    let mut bytes = Vec::with_capacity(total as usize);
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let read = match file.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(read_error(err)),
        };
        bytes.extend_from_slice(&chunk[..read]);
        if total > 0 {
            progress.report(bytes.len() as f32 / total as f32);
        }
    }
    Ok(bytes)
}
