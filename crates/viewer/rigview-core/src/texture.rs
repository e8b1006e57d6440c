//! Texture cache keyed by (path, premultiplied alpha).
//!
//! Every `acquire` issues a fresh image decode, hit or miss. When a decode completes for a
//! key that already owns a GPU texture, the decoded image is dropped and the existing
//! record is returned, so a key is uploaded and inserted at most once per cache lifetime.

use hashbrown::HashMap;
use serde::Serialize;

use crate::error::TextureError;
use crate::ids::{DecodeId, IdAllocator, TextureHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextureFilter {
    Linear,
    LinearMipmapLinear,
}

/// How a decoded image is turned into a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadOptions {
    pub premultiply_alpha: bool,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub generate_mipmaps: bool,
}

impl UploadOptions {
    pub fn new(premultiply_alpha: bool) -> Self {
        Self {
            premultiply_alpha,
            min_filter: TextureFilter::LinearMipmapLinear,
            mag_filter: TextureFilter::Linear,
            generate_mipmaps: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadedTexture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// GPU side of the cache. The host supplies the decoded image type.
pub trait TextureBackend {
    type Image;

    fn upload(
        &mut self,
        image: &Self::Image,
        options: &UploadOptions,
    ) -> Result<UploadedTexture, TextureError>;

    fn delete(&mut self, handle: TextureHandle);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TextureKey {
    pub path: String,
    pub premultiplied_alpha: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecodeStatus {
    Pending,
    Decoded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextureRecord {
    pub key: TextureKey,
    pub status: DecodeStatus,
    pub width: u32,
    pub height: u32,
    pub handle: Option<TextureHandle>,
}

/// An image decode the host must perform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeRequest {
    pub id: DecodeId,
    pub key: TextureKey,
    pub url: String,
}

#[derive(Debug, Default)]
pub struct TextureCache {
    ids: IdAllocator,
    records: HashMap<TextureKey, TextureRecord>,
    pending: HashMap<DecodeId, TextureKey>,
    decodes_issued: u64,
    uploads: u64,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `path` and issue a decode of `url`.
    pub fn acquire(&mut self, path: &str, premultiply_alpha: bool, url: &str) -> DecodeRequest {
        let key = TextureKey {
            path: path.to_string(),
            premultiplied_alpha: premultiply_alpha,
        };
        self.records
            .entry(key.clone())
            .or_insert_with(|| TextureRecord {
                key: key.clone(),
                status: DecodeStatus::Pending,
                width: 0,
                height: 0,
                handle: None,
            });
        let id = self.ids.alloc_decode();
        self.pending.insert(id, key.clone());
        self.decodes_issued += 1;
        DecodeRequest {
            id,
            key,
            url: url.to_string(),
        }
    }

    /// Finish decode `id`. Uploads on the first successful decode of a key; later decodes
    /// of the same key reuse the existing texture.
    pub fn complete<B: TextureBackend>(
        &mut self,
        id: DecodeId,
        image: Result<B::Image, String>,
        backend: &mut B,
    ) -> Result<TextureRecord, TextureError> {
        let key = self
            .pending
            .remove(&id)
            .ok_or(TextureError::UnknownDecode(id))?;
        let record = self
            .records
            .get_mut(&key)
            .ok_or(TextureError::UnknownDecode(id))?;

        let image = match image {
            Ok(image) => image,
            Err(reason) => {
                if record.handle.is_none() {
                    record.status = DecodeStatus::Failed;
                }
                return Err(TextureError::Decode {
                    path: key.path,
                    reason,
                });
            }
        };

        if record.handle.is_some() {
            return Ok(record.clone());
        }

        let uploaded = match backend.upload(&image, &UploadOptions::new(key.premultiplied_alpha)) {
            Ok(uploaded) => uploaded,
            Err(e) => {
                record.status = DecodeStatus::Failed;
                return Err(e);
            }
        };
        self.uploads += 1;
        record.handle = Some(uploaded.handle);
        record.width = uploaded.width;
        record.height = uploaded.height;
        record.status = DecodeStatus::Decoded;
        Ok(record.clone())
    }

    pub fn get(&self, path: &str, premultiplied_alpha: bool) -> Option<&TextureRecord> {
        self.records.get(&TextureKey {
            path: path.to_string(),
            premultiplied_alpha,
        })
    }

    /// Delete every GPU texture and forget all records and pending decodes.
    pub fn release<B: TextureBackend>(&mut self, backend: &mut B) {
        for (_, record) in self.records.drain() {
            if let Some(handle) = record.handle {
                backend.delete(handle);
            }
        }
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn pending_decodes(&self) -> usize {
        self.pending.len()
    }

    pub fn decodes_issued(&self) -> u64 {
        self.decodes_issued
    }

    pub fn uploads(&self) -> u64 {
        self.uploads
    }
}
