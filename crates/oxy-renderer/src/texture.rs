// texture.rs — texture loading seam, image-backed loader and the path cache

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::gfx_types::{GfxTexture, TextureHandle, TextureRef};

// ============================================================
// Loader seam
// ============================================================

/// Dimensions and handle of an uploaded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedTexture {
    pub width: u32,
    pub height: u32,
    pub handle: TextureHandle,
}

/// Turns an image path into a backend texture.
pub trait TextureLoader {
    fn load_texture(&mut self, path: &Path) -> Option<LoadedTexture>;
}

/// Decodes images with the `image` crate and keeps the RGBA pixels for
/// the host to upload.
#[derive(Default)]
pub struct ImageTextureLoader {
    next_handle: u64,
    images: HashMap<TextureHandle, image::RgbaImage>,
}

impl ImageTextureLoader {
    pub fn new() -> Self {
        Self {
            next_handle: TextureHandle::FIRST_DYNAMIC,
            images: HashMap::new(),
        }
    }

    pub fn pixels(&self, handle: TextureHandle) -> Option<&image::RgbaImage> {
        self.images.get(&handle)
    }

    /// Register already-decoded pixels under a new handle.
    pub fn insert(&mut self, rgba: image::RgbaImage) -> LoadedTexture {
        let handle = TextureHandle(self.next_handle.max(TextureHandle::FIRST_DYNAMIC));
        self.next_handle = handle.0 + 1;
        let loaded = LoadedTexture {
            width: rgba.width(),
            height: rgba.height(),
            handle,
        };
        self.images.insert(handle, rgba);
        loaded
    }
}

impl TextureLoader for ImageTextureLoader {
    fn load_texture(&mut self, path: &Path) -> Option<LoadedTexture> {
        match image::open(path) {
            Ok(img) => Some(self.insert(img.to_rgba8())),
            Err(e) => {
                debug!("image decode failed for {}: {}", path.display(), e);
                None
            }
        }
    }
}

// ============================================================
// Cache
// ============================================================

/// Path-keyed texture cache. Failed loads are remembered so a missing
/// file is only reported once.
pub struct TextureCache {
    entries: Mutex<HashMap<String, Option<TextureRef>>>,
    error_texture: TextureRef,
    white_texture: TextureRef,
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            error_texture: Arc::new(GfxTexture {
                path: "*error".into(),
                width: 16,
                height: 16,
                handle: TextureHandle::ERROR,
            }),
            white_texture: Arc::new(GfxTexture {
                path: "*white".into(),
                width: 1,
                height: 1,
                handle: TextureHandle::WHITE,
            }),
        }
    }

    pub fn error_texture(&self) -> &TextureRef {
        &self.error_texture
    }

    pub fn white_texture(&self) -> &TextureRef {
        &self.white_texture
    }

    /// Load or fetch `path`. `None` if the loader cannot produce it.
    pub fn try_load(&self, loader: &mut dyn TextureLoader, path: &Path) -> Option<TextureRef> {
        let key = path.to_string_lossy().into_owned();
        let mut entries = self.entries.lock();
        if let Some(cached) = entries.get(&key) {
            return cached.clone();
        }

        let tex = loader.load_texture(path).map(|t| {
            Arc::new(GfxTexture {
                path: key.clone(),
                width: t.width,
                height: t.height,
                handle: t.handle,
            })
        });
        if tex.is_none() {
            warn!("couldn't load texture {}", key);
        }
        entries.insert(key, tex.clone());
        tex
    }

    /// Load or fetch `path`, falling back to the error texture.
    pub fn load(&self, loader: &mut dyn TextureLoader, path: &Path) -> TextureRef {
        self.try_load(loader, path)
            .unwrap_or_else(|| self.error_texture.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached entry; used on level unload.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
