//! Asset catalog: cached image and audio handles behind a host loader.
//!
//! Sprites reference assets by path; the catalog resolves each path once
//! through the host's [`AssetLoader`] and hands out shared handles after
//! that. The engine can warm the whole catalog at startup by constructing one
//! sprite of every registered kind while insertion is suppressed, so the
//! first real spawn never pays a load.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use orrery_core::prelude::Vec2;

use crate::EngineError;

/// Resolved image asset. The size is authoritative: sprites take their
/// on-screen extent from the handle unless a kind overrides it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHandle {
    pub path: String,
    pub size: Vec2,
}

/// Resolved audio asset with playback parameters fixed at resolution time.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioHandle {
    pub path: String,
    pub volume: f32,
    pub looping: bool,
}

/// Host-supplied resolver. Implementations read from disk, an archive, or
/// anywhere else; the catalog only asks whether a path resolves and, for
/// images, to what pixel size.
pub trait AssetLoader: Send + Sync {
    fn image_size(&self, path: &str) -> Result<Vec2, EngineError>;
    fn audio_exists(&self, path: &str) -> Result<(), EngineError>;
}

/// In-memory loader backed by a registered path set. Useful for headless
/// hosts and as the loader behind every test in this crate.
#[derive(Debug, Default)]
pub struct MemoryAssetLoader {
    images: HashMap<String, Vec2>,
    audio: Vec<String>,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, path: &str, size: Vec2) -> Self {
        self.images.insert(path.to_owned(), size);
        self
    }

    pub fn with_audio(mut self, path: &str) -> Self {
        self.audio.push(path.to_owned());
        self
    }
}

impl AssetLoader for MemoryAssetLoader {
    fn image_size(&self, path: &str) -> Result<Vec2, EngineError> {
        self.images
            .get(path)
            .copied()
            .ok_or_else(|| EngineError::AssetNotFound { path: path.to_owned() })
    }

    fn audio_exists(&self, path: &str) -> Result<(), EngineError> {
        if self.audio.iter().any(|p| p == path) {
            Ok(())
        } else {
            Err(EngineError::AssetNotFound { path: path.to_owned() })
        }
    }
}

/// Shared, thread-safe asset cache. Every resolution after the first for a
/// given path is a map lookup.
pub struct AssetCatalog {
    loader: Box<dyn AssetLoader>,
    images: Mutex<HashMap<String, Arc<ImageHandle>>>,
    audio: Mutex<HashMap<AudioKey, Arc<AudioHandle>>>,
}

#[derive(PartialEq, Eq, Hash)]
struct AudioKey {
    path: String,
    volume_bits: u32,
    looping: bool,
}

impl AssetCatalog {
    pub fn new(loader: Box<dyn AssetLoader>) -> Self {
        Self {
            loader,
            images: Mutex::new(HashMap::new()),
            audio: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves an image, loading it through the host on first use.
    pub fn image(&self, path: &str) -> Result<Arc<ImageHandle>, EngineError> {
        let mut cache = self.images.lock();
        if let Some(handle) = cache.get(path) {
            return Ok(Arc::clone(handle));
        }
        let size = self.loader.image_size(path)?;
        tracing::debug!(path, width = size.x, height = size.y, "image cached");
        let handle = Arc::new(ImageHandle { path: path.to_owned(), size });
        cache.insert(path.to_owned(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Resolves an audio clip. Handles are cached per (path, volume, looping)
    /// combination since playback parameters are baked in at resolution time.
    pub fn audio(&self, path: &str, volume: f32, looping: bool) -> Result<Arc<AudioHandle>, EngineError> {
        let key = AudioKey { path: path.to_owned(), volume_bits: volume.to_bits(), looping };
        let mut cache = self.audio.lock();
        if let Some(handle) = cache.get(&key) {
            return Ok(Arc::clone(handle));
        }
        self.loader.audio_exists(path)?;
        tracing::debug!(path, volume, looping, "audio cached");
        let handle = Arc::new(AudioHandle { path: path.to_owned(), volume, looping });
        cache.insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn cached_image_count(&self) -> usize {
        self.images.lock().len()
    }

    pub fn cached_audio_count(&self) -> usize {
        self.audio.lock().len()
    }

    /// Drops every cached handle. Called during engine shutdown.
    pub fn clear(&self) {
        self.images.lock().clear();
        self.audio.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> AssetCatalog {
        let loader = MemoryAssetLoader::new()
            .with_image("sprites/drifter.png", Vec2::new(32.0, 32.0))
            .with_audio("sounds/thrust.wav");
        AssetCatalog::new(Box::new(loader))
    }

    // -- 1. resolution and caching ------------------------------------------

    #[test]
    fn image_resolves_with_loader_size() {
        let catalog = catalog();
        let handle = catalog.image("sprites/drifter.png").unwrap();
        assert_eq!(handle.size, Vec2::new(32.0, 32.0));
        assert_eq!(catalog.cached_image_count(), 1);
    }

    #[test]
    fn repeated_image_requests_share_one_handle() {
        let catalog = catalog();
        let a = catalog.image("sprites/drifter.png").unwrap();
        let b = catalog.image("sprites/drifter.png").unwrap();
        assert!(Arc::ptr_eq(&a, &b), "second request must hit the cache");
        assert_eq!(catalog.cached_image_count(), 1);
    }

    #[test]
    fn audio_caches_per_parameter_combination() {
        let catalog = catalog();
        let quiet = catalog.audio("sounds/thrust.wav", 0.2, false).unwrap();
        let loud = catalog.audio("sounds/thrust.wav", 1.0, true).unwrap();
        assert!(!Arc::ptr_eq(&quiet, &loud));
        assert_eq!(catalog.cached_audio_count(), 2);

        let again = catalog.audio("sounds/thrust.wav", 0.2, false).unwrap();
        assert!(Arc::ptr_eq(&quiet, &again));
    }

    // -- 2. failures ---------------------------------------------------------

    #[test]
    fn missing_image_is_an_error() {
        let catalog = catalog();
        let err = catalog.image("sprites/missing.png").unwrap_err();
        assert!(matches!(err, EngineError::AssetNotFound { .. }));
        assert_eq!(catalog.cached_image_count(), 0, "failures must not be cached");
    }

    #[test]
    fn missing_audio_is_an_error() {
        let catalog = catalog();
        assert!(catalog.audio("sounds/missing.wav", 1.0, false).is_err());
    }

    #[test]
    fn clear_empties_both_caches() {
        let catalog = catalog();
        catalog.image("sprites/drifter.png").unwrap();
        catalog.audio("sounds/thrust.wav", 1.0, false).unwrap();
        catalog.clear();
        assert_eq!(catalog.cached_image_count(), 0);
        assert_eq!(catalog.cached_audio_count(), 0);
    }
}
