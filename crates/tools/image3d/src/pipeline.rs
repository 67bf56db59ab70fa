//! Generation pipeline controller
//!
//! Owns one preview session: it takes a submitted image through the fetch,
//! load and normalize steps and publishes a single [`PipelineState`] that the
//! presentation layer observes.
//!
//! # Ordering
//!
//! Every submission gets the next sequence number. The fetch and the mesh
//! load are the only suspension points; after each one the cycle checks that
//! its sequence is still the latest and otherwise drops its result. State is
//! only ever replaced under the session lock, by the latest cycle, so a stale
//! response can never overwrite a newer submission (last submission wins).
//! In-flight requests are not aborted. Dropping a `submit_image` future
//! before it resolves fails its cycle as cancelled if it is still the latest.
//!
//! # Handles
//!
//! The controller is the only creator of [`TemporaryHandle`]s. The source
//! preview handle lives in the session until the next submission or
//! [`GenerationPipeline::end_session`]; mesh load and download handles are
//! scoped to the call that creates them.

use crate::client::MeshFetcher;
use crate::handle::{HandlePurpose, HandleRegistry, TemporaryHandle};
use crate::surface::{DownloadTarget, RenderSurface};
use crate::types::{FailureReason, GenerationError, ImageAsset, MeshAsset, Result};
use mesh::{normalize, LoadError, MeshLoader, NormalizedModel};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Default file name offered when saving a generated mesh
pub const DEFAULT_DOWNLOAD_FILE_NAME: &str = "generated_model.obj";

/// Current phase of the session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Nothing submitted yet
    #[default]
    Idle,
    /// Image accepted, request being prepared
    Uploading,
    /// Request sent, waiting for the mesh
    AwaitingGeneration,
    /// Mesh generated, loaded, normalized and displayed
    Ready(MeshAsset),
    Failed(FailureReason),
}

impl PipelineState {
    /// True while a cycle is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::Uploading | PipelineState::AwaitingGeneration
        )
    }

    /// True once a cycle has ended in success or failure
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Ready(_) | PipelineState::Failed(_))
    }

    pub fn mesh(&self) -> Option<&MeshAsset> {
        match self {
            PipelineState::Ready(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            PipelineState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Uploading => "uploading",
            PipelineState::AwaitingGeneration => "awaiting_generation",
            PipelineState::Ready(_) => "ready",
            PipelineState::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Ready(mesh) => write!(f, "ready ({} bytes)", mesh.len()),
            PipelineState::Failed(reason) => write!(f, "failed {reason}"),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Default)]
struct Session {
    /// Sequence number of the most recent submission
    latest: u64,
    preview: Option<TemporaryHandle>,
}

enum CycleOutcome {
    Completed(MeshAsset, NormalizedModel),
    Superseded,
}

/// Orchestrates image submission, generation and preview for one session
pub struct GenerationPipeline {
    fetcher: Arc<dyn MeshFetcher>,
    loader: Arc<dyn MeshLoader>,
    surface: Arc<dyn RenderSurface>,
    handles: HandleRegistry,
    download_file_name: String,
    state_tx: watch::Sender<PipelineState>,
    session: Mutex<Session>,
}

impl GenerationPipeline {
    pub fn new(
        fetcher: Arc<dyn MeshFetcher>,
        loader: Arc<dyn MeshLoader>,
        surface: Arc<dyn RenderSurface>,
    ) -> Self {
        let (state_tx, _) = watch::channel(PipelineState::Idle);
        Self {
            fetcher,
            loader,
            surface,
            handles: HandleRegistry::new(),
            download_file_name: DEFAULT_DOWNLOAD_FILE_NAME.to_string(),
            state_tx,
            session: Mutex::default(),
        }
    }

    /// Set the file name offered by [`GenerationPipeline::download`]
    pub fn with_download_file_name(mut self, name: impl Into<String>) -> Self {
        self.download_file_name = name.into();
        self
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PipelineState {
        self.state_tx.borrow().clone()
    }

    /// Receiver notified on every state replacement
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    /// Registry of every handle this session created
    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one generation cycle for `image` and return its sequence number
    ///
    /// Resolves once this cycle has reached `Ready` or `Failed`, or has been
    /// superseded by a newer submission.
    pub async fn submit_image(&self, image: ImageAsset) -> u64 {
        let validation = image.validate();
        let seq = self.begin_cycle(&image, validation.is_ok());

        if let Err(e) = validation {
            self.finish(seq, Err(e));
            return seq;
        }

        tracing::info!(
            seq,
            file = image.file_name(),
            media_type = image.media_type(),
            bytes = image.len(),
            "generation started"
        );
        let mut guard = CycleGuard {
            pipeline: self,
            seq,
            settled: false,
        };
        let outcome = self.run_cycle(seq, &image).await;
        self.finish(seq, outcome);
        guard.settled = true;
        seq
    }

    /// Start a new cycle: supersede the previous one and swap the preview
    fn begin_cycle(&self, image: &ImageAsset, valid: bool) -> u64 {
        let mut session = self.lock_session();
        session.latest += 1;
        let seq = session.latest;

        self.surface.clear_model();

        // The surface lets go of the old locator before its handle is released
        let previous = if valid {
            let preview = self
                .handles
                .create(HandlePurpose::SourcePreview, Arc::clone(image.bytes()));
            self.surface.show_source_image(preview.locator());
            let previous = session.preview.replace(preview);
            self.replace_state(seq, PipelineState::Uploading);
            previous
        } else {
            self.surface.clear_source_image();
            session.preview.take()
        };
        drop(previous);
        seq
    }

    async fn run_cycle(&self, seq: u64, image: &ImageAsset) -> Result<CycleOutcome> {
        if !self.transition(seq, PipelineState::AwaitingGeneration) {
            return Ok(CycleOutcome::Superseded);
        }

        let bytes = self.fetcher.fetch_model(image).await?;
        if !self.is_latest(seq) {
            return Ok(CycleOutcome::Superseded);
        }
        let mesh = MeshAsset::new(bytes, seq);

        let handle = self
            .handles
            .create(HandlePurpose::MeshLoad, Arc::clone(mesh.bytes()));
        let loaded = match self.handles.resolve(handle.locator()) {
            Some(bytes) => self.loader.load(bytes).await,
            None => Err(LoadError::Task("mesh handle was not live".to_string())),
        };
        handle.release();

        let model = loaded.map_err(|e| {
            tracing::error!(seq, error = %e, "mesh loader rejected generated content");
            GenerationError::MalformedResponse(e.to_string())
        })?;
        if !self.is_latest(seq) {
            return Ok(CycleOutcome::Superseded);
        }

        Ok(CycleOutcome::Completed(mesh, normalize(model)))
    }

    /// Publish the outcome of cycle `seq` if it is still the latest
    fn finish(&self, seq: u64, outcome: Result<CycleOutcome>) {
        let session = self.lock_session();
        if session.latest != seq {
            tracing::debug!(seq, latest = session.latest, "discarding stale result");
            return;
        }

        match outcome {
            Ok(CycleOutcome::Completed(mesh, model)) => {
                tracing::info!(
                    seq,
                    bytes = mesh.len(),
                    vertices = model.vertex_count(),
                    bounds = %model.bounds(),
                    "generation ready"
                );
                self.surface.attach_model(Arc::new(model));
                self.replace_state(seq, PipelineState::Ready(mesh));
            }
            Ok(CycleOutcome::Superseded) => {
                tracing::debug!(seq, "cycle superseded");
            }
            Err(e) => {
                tracing::warn!(seq, category = %e.category(), error = %e, "generation failed");
                self.replace_state(seq, PipelineState::Failed(FailureReason::from(&e)));
            }
        }
    }

    fn is_latest(&self, seq: u64) -> bool {
        self.lock_session().latest == seq
    }

    /// Replace the state if `seq` is still the latest cycle
    fn transition(&self, seq: u64, next: PipelineState) -> bool {
        let session = self.lock_session();
        if session.latest != seq {
            return false;
        }
        self.replace_state(seq, next);
        true
    }

    /// Callers hold the session lock
    fn replace_state(&self, seq: u64, next: PipelineState) {
        tracing::debug!(seq, state = next.name(), "state transition");
        self.state_tx.send_replace(next);
    }

    /// Save the ready mesh through `target` under the default file name
    ///
    /// Rejected with [`GenerationError::DownloadPrecondition`] unless the
    /// state is `Ready`; a rejection creates no handle and leaves the state
    /// untouched.
    pub fn download(&self, target: &dyn DownloadTarget) -> Result<PathBuf> {
        let mesh = match self.state_tx.borrow().mesh() {
            Some(mesh) => mesh.clone(),
            None => {
                tracing::warn!("download requested with no ready model");
                return Err(GenerationError::DownloadPrecondition);
            }
        };

        let handle = self
            .handles
            .create(HandlePurpose::Download, Arc::clone(mesh.bytes()));
        let saved = target.save(&handle, &self.download_file_name);
        handle.release();
        Ok(saved?)
    }

    /// End the session: drop any in-flight result, release the preview and
    /// return to `Idle`
    pub fn end_session(&self) {
        let mut session = self.lock_session();
        session.latest += 1;
        self.surface.clear_source_image();
        self.surface.clear_model();
        session.preview = None;
        let seq = session.latest;
        self.replace_state(seq, PipelineState::Idle);
    }
}

/// Settles a cycle whose `submit_image` future was dropped mid-flight
///
/// If the cycle is still the latest it would otherwise stay busy forever, so
/// it is failed as cancelled.
struct CycleGuard<'a> {
    pipeline: &'a GenerationPipeline,
    seq: u64,
    settled: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let session = self.pipeline.lock_session();
        if session.latest != self.seq {
            return;
        }
        tracing::warn!(seq = self.seq, "generation cancelled before completion");
        let err = GenerationError::Network("generation was cancelled".to_string());
        self.pipeline
            .replace_state(self.seq, PipelineState::Failed(FailureReason::from(&err)));
    }
}

impl std::fmt::Debug for GenerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationPipeline")
            .field("state", &*self.state_tx.borrow())
            .field("handles", &self.handles)
            .finish_non_exhaustive()
    }
}
