//! Asset Readers
//!
//! Byte sources for model files. Every reader resolves a relative asset path
//! (`"<home dir>/<file>"`) against its own root:
//!
//! - [`FileAssetReader`]: local files, read on the shared tokio asset runtime
//! - [`HttpAssetReader`]: HTTP(S) through `ehttp` (feature `http`)
//! - [`MemoryAssetReader`]: an in-memory file table for embedding and tests
//!
//! Readers are dispatched through [`AssetReaderVariant`] so fetch futures can
//! own a cheap clone without boxing.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::{PuppetError, Result};

#[cfg(not(target_arch = "wasm32"))]
use std::sync::OnceLock;
#[cfg(not(target_arch = "wasm32"))]
use tokio::runtime::Runtime;

#[cfg(not(target_arch = "wasm32"))]
static ASSET_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Shared runtime that services blocking file reads off the render thread.
#[cfg(not(target_arch = "wasm32"))]
fn get_asset_runtime() -> Result<&'static Runtime> {
    if let Some(runtime) = ASSET_RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = Runtime::new()?;
    Ok(ASSET_RUNTIME.get_or_init(|| runtime))
}

/// Joins a model home directory and a file name declared in its settings.
#[must_use]
pub fn join_asset_path(home: &str, file: &str) -> String {
    if home.is_empty() {
        file.to_string()
    } else if home.ends_with('/') {
        format!("{home}{file}")
    } else {
        format!("{home}/{file}")
    }
}

pub trait AssetReader: Send + Sync {
    /// Reads the whole resource at `path`.
    fn read_bytes(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

// ============================================================================
// Local files
// ============================================================================

pub struct FileAssetReader {
    root_path: PathBuf,
}

impl FileAssetReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let root_path = if path.is_file() {
            path.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            path.to_path_buf()
        };
        Self { root_path }
    }

    #[inline]
    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

impl AssetReader for FileAssetReader {
    #[cfg(not(target_arch = "wasm32"))]
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.root_path.join(path);
        let task = get_asset_runtime()?.spawn(async move { tokio::fs::read(&full).await });
        match task.await? {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PuppetError::AssetNotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[cfg(target_arch = "wasm32")]
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        Err(PuppetError::AssetNotFound(format!(
            "{path} (local files are unavailable on wasm32)"
        )))
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[cfg(feature = "http")]
pub struct HttpAssetReader {
    root_url: url::Url,
}

#[cfg(feature = "http")]
impl HttpAssetReader {
    pub fn new(url_str: &str) -> Result<Self> {
        let url = url::Url::parse(url_str)?;
        let root_url = if url.path().ends_with('/') {
            url
        } else {
            let mut u = url.clone();
            if let Ok(mut segments) = u.path_segments_mut() {
                segments.pop();
                segments.push("");
            }
            u
        };
        Ok(Self { root_url })
    }

    #[inline]
    #[must_use]
    pub fn root_url(&self) -> &url::Url {
        &self.root_url
    }
}

#[cfg(feature = "http")]
impl AssetReader for HttpAssetReader {
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.root_url.join(path)?;
        let request = ehttp::Request::get(url.as_str());
        let response = ehttp::fetch_async(request)
            .await
            .map_err(PuppetError::HttpError)?;
        if !response.ok {
            return Err(PuppetError::HttpResponseError {
                status: response.status,
            });
        }
        Ok(response.bytes)
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Releases every read held on a gated path when opened or dropped.
pub struct AssetGate(flume::Sender<()>);

impl AssetGate {
    pub fn open(self) {
        drop(self.0);
    }
}

/// A fixed table of files keyed by joined asset path.
#[derive(Default)]
pub struct MemoryAssetReader {
    files: FxHashMap<String, Vec<u8>>,
    stalled: FxHashSet<String>,
    gates: FxHashMap<String, flume::Receiver<()>>,
}

impl MemoryAssetReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    /// Reads of `path` never complete.
    #[must_use]
    pub fn with_stalled(mut self, path: impl Into<String>) -> Self {
        self.stalled.insert(path.into());
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    /// Holds reads of `path` until the returned gate is opened.
    pub fn gate(&mut self, path: impl Into<String>) -> AssetGate {
        let (tx, rx) = flume::bounded(0);
        self.gates.insert(path.into(), rx);
        AssetGate(tx)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

impl AssetReader for MemoryAssetReader {
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        if self.stalled.contains(path) {
            futures::future::pending::<()>().await;
        }
        if let Some(gate) = self.gates.get(path) {
            // Resolves with `Disconnected` once the gate is opened.
            let _ = gate.recv_async().await;
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| PuppetError::AssetNotFound(path.to_string()))
    }
}

// ============================================================================
// Dispatch
// ============================================================================

#[derive(Clone)]
pub enum AssetReaderVariant {
    File(Arc<FileAssetReader>),
    #[cfg(feature = "http")]
    Http(Arc<HttpAssetReader>),
    Memory(Arc<MemoryAssetReader>),
}

impl AssetReaderVariant {
    /// Picks a reader for a root directory or URL.
    pub fn from_source(source: &str) -> Result<Self> {
        if source.starts_with("http://") || source.starts_with("https://") {
            #[cfg(feature = "http")]
            {
                Ok(Self::Http(Arc::new(HttpAssetReader::new(source)?)))
            }
            #[cfg(not(feature = "http"))]
            {
                Err(PuppetError::InvalidConfig(
                    "HTTP feature is not enabled. Enable it with `features = [\"http\"]`".to_string(),
                ))
            }
        } else {
            Ok(Self::File(Arc::new(FileAssetReader::new(source))))
        }
    }

    #[must_use]
    pub fn memory(reader: MemoryAssetReader) -> Self {
        Self::Memory(Arc::new(reader))
    }

    pub async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        match self {
            Self::File(r) => r.read_bytes(path).await,
            #[cfg(feature = "http")]
            Self::Http(r) => r.read_bytes(path).await,
            Self::Memory(r) => r.read_bytes(path).await,
        }
    }
}

impl Default for AssetReaderVariant {
    fn default() -> Self {
        Self::File(Arc::new(FileAssetReader::new(".")))
    }
}
