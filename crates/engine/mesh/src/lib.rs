//! Mesh scene graph, OBJ loading and display normalization
//!
//! This crate holds the geometric side of the image-to-3D preview pipeline:
//!
//! - **Scene graph**: [`LoadedModel`] trees of groups and mesh nodes
//! - **Bounds**: world-space axis-aligned bounding boxes ([`Aabb`])
//! - **Loading**: the async [`MeshLoader`] capability and its OBJ implementation
//! - **Normalization**: recentering and fixed-scale resizing for display
//!
//! # Example
//!
//! ```no_run
//! use mesh::{normalize, MeshLoader, ObjLoader};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bytes: Arc<[u8]> = std::fs::read("generated_model.obj")?.into();
//!     let model = ObjLoader::new().load(bytes).await?;
//!
//!     let normalized = normalize(model);
//!     println!("{} -> {}", normalized.source_bounds(), normalized.bounds());
//!     Ok(())
//! }
//! ```

pub mod bounds;
pub mod normalize;
pub mod obj;
pub mod scene;

pub use bounds::Aabb;
pub use normalize::{normalize, NormalizedModel, NORMALIZED_SCALE};
pub use obj::{parse_obj, LoadError, MeshLoader, ObjLoader, OBJ_ROOT_NAME};
pub use scene::{LoadedModel, Material, MaterialKind, MeshData, NodeKind, SceneNode, Transform};
