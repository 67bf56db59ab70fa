//! Temporary handles exposing in-memory bytes through a locator
//!
//! Renderers and download targets address content by locator rather than by
//! holding the bytes. A [`TemporaryHandle`] keeps its bytes resolvable in the
//! [`HandleRegistry`] for exactly as long as the guard lives: dropping it or
//! calling [`TemporaryHandle::release`] revokes the locator once, and a
//! released guard cannot be used again.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Locator scheme prefix of every handle
pub const LOCATOR_PREFIX: &str = "blob:image3d/";

/// Most recent lifecycle events kept in the registry ledger
pub const MAX_LEDGER_EVENTS: usize = 1024;

/// Unique identifier for a handle within its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// What a handle was created for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlePurpose {
    /// Local preview of the submitted image
    SourcePreview,
    /// Mesh bytes handed to the mesh loader
    MeshLoad,
    /// Mesh bytes handed to a download target
    Download,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleEventKind {
    Created,
    Released,
}

/// Ledger entry for a handle lifecycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleEvent {
    pub id: HandleId,
    pub purpose: HandlePurpose,
    pub kind: HandleEventKind,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    live: HashMap<HandleId, (HandlePurpose, Arc<[u8]>)>,
    created: HashMap<HandlePurpose, usize>,
    events: VecDeque<HandleEvent>,
}

impl RegistryInner {
    fn record(&mut self, event: HandleEvent) {
        if self.events.len() == MAX_LEDGER_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Issues and tracks temporary handles for one session
///
/// Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct HandleRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a handle for `bytes`; it is live until the guard is released
    pub(crate) fn create(&self, purpose: HandlePurpose, bytes: Arc<[u8]>) -> TemporaryHandle {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = HandleId(inner.next_id);
        inner.live.insert(id, (purpose, Arc::clone(&bytes)));
        *inner.created.entry(purpose).or_default() += 1;
        inner.record(HandleEvent {
            id,
            purpose,
            kind: HandleEventKind::Created,
        });
        tracing::trace!(%id, ?purpose, "handle created");

        TemporaryHandle {
            id,
            purpose,
            locator: format!("{LOCATOR_PREFIX}{}", id.0),
            bytes,
            registry: self.clone(),
            released: false,
        }
    }

    fn release(&self, id: HandleId) {
        let mut inner = self.lock();
        match inner.live.remove(&id) {
            Some((purpose, _)) => {
                inner.record(HandleEvent {
                    id,
                    purpose,
                    kind: HandleEventKind::Released,
                });
                tracing::trace!(%id, ?purpose, "handle released");
            }
            None => tracing::error!(%id, "release of a handle that is not live"),
        }
    }

    /// Bytes behind a live locator
    pub fn resolve(&self, locator: &str) -> Option<Arc<[u8]>> {
        let id = locator.strip_prefix(LOCATOR_PREFIX)?.parse().ok()?;
        self.lock()
            .live
            .get(&HandleId(id))
            .map(|(_, bytes)| Arc::clone(bytes))
    }

    /// Number of handles created but not yet released
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// Create/release ledger in order, limited to the last
    /// [`MAX_LEDGER_EVENTS`] entries
    pub fn events(&self) -> Vec<HandleEvent> {
        self.lock().events.iter().copied().collect()
    }

    /// Number of handles ever created for `purpose`
    pub fn created_count(&self, purpose: HandlePurpose) -> usize {
        self.lock().created.get(&purpose).copied().unwrap_or(0)
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("HandleRegistry")
            .field("live", &inner.live.len())
            .field("events", &inner.events.len())
            .finish()
    }
}

/// Scoped locator for in-memory bytes
///
/// Released exactly once: explicitly through [`TemporaryHandle::release`] or
/// implicitly when dropped.
#[derive(Debug)]
pub struct TemporaryHandle {
    id: HandleId,
    purpose: HandlePurpose,
    locator: String,
    bytes: Arc<[u8]>,
    registry: HandleRegistry,
    released: bool,
}

impl TemporaryHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn purpose(&self) -> HandlePurpose {
        self.purpose
    }

    /// Locator consumers resolve through the registry
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    /// Revoke the locator now
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(self.id);
        }
    }
}

impl Drop for TemporaryHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}
