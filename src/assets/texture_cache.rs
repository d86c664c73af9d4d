//! Texture Cache
//!
//! Deduplicates texture loads by `(path, premultiply)`. Loads are asynchronous:
//! [`TextureCache::resolve`] queues a request together with a caller-chosen
//! waiter value, and a later [`TextureCache::poll`] uploads whatever finished
//! decoding and hands each waiter its record.
//!
//! # Identity
//!
//! A key maps to exactly one [`TextureHandle`] and one GPU texture for as long
//! as it stays in the cache. Resolving a key that already has a record reads
//! and decodes the image again and uploads it into the *same* GPU texture, so
//! the identity is stable while the pixels refresh. Concurrent requests for a
//! key that is still loading attach to the in-flight load and are served by a
//! single decode.
//!
//! There is no eviction. Records live until one of the `release_*` methods
//! removes them, which also deletes their GPU texture.

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::assets::AssetIo;
use crate::assets::image::{DecodedImage, decode_image};
use crate::backend::{GpuContext, GpuTextureId};
use crate::errors::{PuppetError, Result};

new_key_type! {
    pub struct TextureHandle;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub path: String,
    pub premultiply: bool,
}

impl TextureKey {
    #[must_use]
    pub fn new(path: impl Into<String>, premultiply: bool) -> Self {
        Self {
            path: path.into(),
            premultiply,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureRecord {
    pub handle: TextureHandle,
    pub path: String,
    pub premultiply: bool,
    pub gpu: GpuTextureId,
    pub width: u32,
    pub height: u32,
}

struct DecodedTexture {
    key: TextureKey,
    result: Result<DecodedImage>,
}

pub struct TextureCache<W> {
    records: SlotMap<TextureHandle, TextureRecord>,
    index: FxHashMap<TextureKey, TextureHandle>,
    /// Waiters of loads that are still in flight.
    pending: FxHashMap<TextureKey, Vec<W>>,
    tx: flume::Sender<DecodedTexture>,
    rx: flume::Receiver<DecodedTexture>,
    generate_mipmaps: bool,
}

impl<W> Default for TextureCache<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> TextureCache<W> {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            records: SlotMap::with_key(),
            index: FxHashMap::default(),
            pending: FxHashMap::default(),
            tx,
            rx,
            generate_mipmaps: true,
        }
    }

    /// Requests `path` and queues `waiter` for the result.
    pub fn resolve(&mut self, path: &str, premultiply: bool, waiter: W, io: &AssetIo) {
        let key = TextureKey::new(path, premultiply);

        if let Some(waiters) = self.pending.get_mut(&key) {
            log::debug!("Texture '{path}' already loading, attaching waiter");
            waiters.push(waiter);
            return;
        }
        self.pending.insert(key.clone(), vec![waiter]);

        let reader = io.reader().clone();
        let tx = self.tx.clone();
        io.spawn(async move {
            let result = match reader.read_bytes(&key.path).await {
                Ok(bytes) => decode_image(&bytes, key.premultiply, &key.path),
                Err(e) => Err(e),
            };
            // The receiver only disappears with the cache itself.
            let _ = tx.send(DecodedTexture { key, result });
        });
    }

    /// Uploads every finished decode and returns the completed waiters.
    pub fn poll(&mut self, gpu: &mut dyn GpuContext) -> Vec<(W, Result<TextureRecord>)> {
        let mut completed = Vec::new();

        while let Ok(DecodedTexture { key, result }) = self.rx.try_recv() {
            let waiters = self.pending.remove(&key).unwrap_or_default();

            match result.and_then(|image| self.upload(&key, &image, gpu)) {
                Ok(record) => {
                    log::debug!(
                        "Texture '{}' ready ({}x{}, premultiply: {})",
                        record.path,
                        record.width,
                        record.height,
                        record.premultiply
                    );
                    completed.extend(waiters.into_iter().map(|w| (w, Ok(record.clone()))));
                }
                Err(e) => {
                    log::warn!("Texture '{}' failed to load: {e}", key.path);
                    let reason = e.to_string();
                    completed.extend(waiters.into_iter().map(|w| {
                        (
                            w,
                            Err(PuppetError::TextureError {
                                path: key.path.clone(),
                                reason: reason.clone(),
                            }),
                        )
                    }));
                }
            }
        }

        completed
    }

    fn upload(
        &mut self,
        key: &TextureKey,
        image: &DecodedImage,
        gpu: &mut dyn GpuContext,
    ) -> Result<TextureRecord> {
        if let Some(record) = self.index.get(key).and_then(|h| self.records.get_mut(*h)) {
            gpu.update_texture(record.gpu, image)?;
            record.width = image.width;
            record.height = image.height;
            return Ok(record.clone());
        }

        let gpu_id = gpu.create_texture(image, self.generate_mipmaps)?;
        let handle = self.records.insert_with_key(|handle| TextureRecord {
            handle,
            path: key.path.clone(),
            premultiply: key.premultiply,
            gpu: gpu_id,
            width: image.width,
            height: image.height,
        });
        self.index.insert(key.clone(), handle);
        Ok(self.records[handle].clone())
    }

    #[must_use]
    pub fn get(&self, handle: TextureHandle) -> Option<&TextureRecord> {
        self.records.get(handle)
    }

    #[must_use]
    pub fn find(&self, path: &str, premultiply: bool) -> Option<&TextureRecord> {
        self.index
            .get(&TextureKey::new(path, premultiply))
            .and_then(|h| self.records.get(*h))
    }

    #[must_use]
    pub fn is_pending(&self, path: &str, premultiply: bool) -> bool {
        self.pending.contains_key(&TextureKey::new(path, premultiply))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextureRecord> {
        self.records.values()
    }

    /// Releases every record loaded from `path`, whatever its premultiply flag.
    /// Returns how many records were removed.
    pub fn release_by_path(&mut self, path: &str, gpu: &mut dyn GpuContext) -> usize {
        let handles: Vec<TextureHandle> = self
            .records
            .iter()
            .filter(|(_, r)| r.path == path)
            .map(|(h, _)| h)
            .collect();
        for &handle in &handles {
            self.release_by_handle(handle, gpu);
        }
        handles.len()
    }

    pub fn release_by_handle(&mut self, handle: TextureHandle, gpu: &mut dyn GpuContext) -> bool {
        let Some(record) = self.records.remove(handle) else {
            return false;
        };
        self.index
            .remove(&TextureKey::new(record.path, record.premultiply));
        gpu.delete_texture(record.gpu);
        true
    }

    pub fn release_all(&mut self, gpu: &mut dyn GpuContext) {
        for (_, record) in self.records.drain() {
            gpu.delete_texture(record.gpu);
        }
        self.index.clear();
    }
}
