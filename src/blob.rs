//! Binary handles and displayable object URLs
//!
//! A [`MediaBlob`] is the raw bytes of a piece of media plus its name and MIME
//! type. Rendering surfaces never see the bytes directly: they get an
//! [`ObjectUrl`] from the [`UrlRegistry`], which resolves back to the blob
//! without a network round trip.
//!
//! `ObjectUrl` is deliberately not `Clone`. The asset or result that created it
//! owns it, and dropping it releases the registry entry, so every URL is
//! released exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

const URL_SCHEME: &str = "blob:media-workflow/";

/// Opaque handle to media bytes held by the client
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    bytes: Arc<[u8]>,
    mime_type: String,
    name: String,
}

impl MediaBlob {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Arc::from(bytes.into()),
            mime_type: mime_type.into(),
            name: name.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same bytes under a different name (used for downloads)
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            bytes: Arc::clone(&self.bytes),
            mime_type: self.mime_type.clone(),
            name: name.into(),
        }
    }
}

/// Registry of live object URLs
pub struct UrlRegistry {
    entries: Mutex<HashMap<u64, MediaBlob>>,
    next_id: AtomicU64,
    created: AtomicU64,
    released: AtomicU64,
}

impl UrlRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a displayable URL for `blob`
    pub fn create(self: &Arc<Self>, blob: &MediaBlob) -> ObjectUrl {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().insert(id, blob.clone());
        self.created.fetch_add(1, Ordering::Relaxed);

        let href = format!("{}{}", URL_SCHEME, id);
        debug!("Created object URL {} for {}", href, blob.name());

        ObjectUrl {
            id,
            href,
            registry: Arc::clone(self),
        }
    }

    /// Resolve a URL back to its blob, if it is still live
    pub fn resolve(&self, href: &str) -> Option<MediaBlob> {
        let id = href.strip_prefix(URL_SCHEME)?.parse::<u64>().ok()?;
        self.lock().get(&id).cloned()
    }

    /// Number of URLs created and not yet released
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    fn release(&self, id: u64) {
        if self.lock().remove(&id).is_some() {
            self.released.fetch_add(1, Ordering::Relaxed);
            debug!("Released object URL {}{}", URL_SCHEME, id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, MediaBlob>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for UrlRegistry {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            created: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }
}

/// Exclusively owned displayable URL; released when dropped
pub struct ObjectUrl {
    id: u64,
    href: String,
    registry: Arc<UrlRegistry>,
}

impl ObjectUrl {
    pub fn href(&self) -> &str {
        &self.href
    }

    /// Resolve this URL's blob through its registry
    pub fn blob(&self) -> Option<MediaBlob> {
        self.registry.resolve(&self.href)
    }
}

impl fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectUrl").field(&self.href).finish()
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}
