//! Asset I/O
//!
//! Fetching, decoding and caching of the files a model is built from.
//!
//! Fetches are `'static` futures spawned on a [`LocalPool`] owned by
//! [`AssetIo`]. The pool is only driven from the frame loop
//! ([`AssetIo::run_until_stalled`]), so completions are always applied on the
//! thread that owns the models.

pub mod image;
pub mod io;
pub mod texture_cache;

use std::future::Future;

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;

pub use self::image::{DecodedImage, decode_image};
pub use io::{
    AssetGate, AssetReader, AssetReaderVariant, FileAssetReader, MemoryAssetReader,
    join_asset_path,
};
#[cfg(feature = "http")]
pub use io::HttpAssetReader;
pub use texture_cache::{TextureCache, TextureHandle, TextureKey, TextureRecord};

pub struct AssetIo {
    reader: AssetReaderVariant,
    pool: LocalPool,
    spawner: LocalSpawner,
}

impl AssetIo {
    #[must_use]
    pub fn new(reader: AssetReaderVariant) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            reader,
            pool,
            spawner,
        }
    }

    #[inline]
    #[must_use]
    pub fn reader(&self) -> &AssetReaderVariant {
        &self.reader
    }

    /// Queues a fetch. It makes progress on the next
    /// [`run_until_stalled`](Self::run_until_stalled).
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        if let Err(e) = self.spawner.spawn_local(future) {
            log::error!("Failed to spawn asset task: {e}");
        }
    }

    /// Polls every queued fetch until none can make progress.
    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled();
    }
}

impl Default for AssetIo {
    fn default() -> Self {
        Self::new(AssetReaderVariant::default())
    }
}
