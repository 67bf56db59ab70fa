//! Image-to-3D generation client and preview pipeline
//!
//! This crate submits a 2D image to a remote generation service, receives an
//! OBJ mesh back, and prepares it for display:
//!
//! - **HTTP Client**: multipart upload to `POST /api/generate` ([`GenerateClient`])
//! - **Pipeline Controller**: one owned [`PipelineState`] per session with
//!   last-submission-wins ordering ([`GenerationPipeline`])
//! - **Temporary Handles**: scoped locators for in-memory bytes, each released
//!   exactly once ([`HandleRegistry`])
//! - **Presentation seams**: [`RenderSurface`] and [`DownloadTarget`]
//!
//! Loading and normalization of the mesh live in the `mesh` crate.
//!
//! # Architecture
//!
//! ```text
//! ImageAsset
//!     ↓ submit_image()
//! GenerationPipeline ── preview handle ──→ RenderSurface
//!     ↓ MeshFetcher (HTTP multipart)
//! mesh bytes → MeshAsset
//!     ↓ MeshLoader (OBJ)
//! LoadedModel
//!     ↓ mesh::normalize()
//! NormalizedModel ──→ RenderSurface, state = Ready
//! ```
//!
//! # Example
//!
//! ```no_run
//! use image3d::{DirectoryTarget, GenerateClient, GenerationPipeline, HeadlessSurface, ImageAsset};
//! use mesh::ObjLoader;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = GenerationPipeline::new(
//!         Arc::new(GenerateClient::new("http://localhost:5000")),
//!         Arc::new(ObjLoader::new()),
//!         Arc::new(HeadlessSurface::new()),
//!     );
//!
//!     pipeline.submit_image(ImageAsset::from_path("chair.png")?).await;
//!     println!("state: {}", pipeline.state());
//!
//!     let saved = pipeline.download(&DirectoryTarget::new("out"))?;
//!     println!("saved {}", saved.display());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod handle;
pub mod pipeline;
pub mod surface;
pub mod types;

pub use client::{GenerateClient, MeshFetcher, DEFAULT_ENDPOINT, DEFAULT_SERVER_URL};
pub use config::{ConfigError, Image3dConfig};
pub use handle::{
    HandleEvent, HandleEventKind, HandleId, HandlePurpose, HandleRegistry, TemporaryHandle,
    MAX_LEDGER_EVENTS,
};
pub use pipeline::{GenerationPipeline, PipelineState, DEFAULT_DOWNLOAD_FILE_NAME};
pub use surface::{
    DirectoryTarget, DownloadTarget, HeadlessSurface, RenderSurface, SceneSetup,
};
pub use types::{
    ErrorCategory, FailureReason, GenerationError, ImageAsset, MeshAsset, Result,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::{GenerateClient, MeshFetcher};
    pub use crate::pipeline::{GenerationPipeline, PipelineState};
    pub use crate::surface::{DirectoryTarget, DownloadTarget, HeadlessSurface, RenderSurface};
    pub use crate::types::{ErrorCategory, FailureReason, GenerationError, ImageAsset, MeshAsset};
}
