//! Wavefront OBJ loading
//!
//! Parses OBJ text into a [`LoadedModel`]: one group named [`OBJ_ROOT_NAME`]
//! whose children are the OBJ objects as mesh nodes. Material libraries
//! referenced with `mtllib` are never opened; every mesh starts with the
//! default material.

use crate::scene::{LoadedModel, MeshData, SceneNode};
use async_trait::async_trait;
use glam::Vec3;
use std::io::{BufReader, Cursor};
use std::sync::Arc;
use thiserror::Error;

/// Name of the group node wrapping every loaded OBJ object
pub const OBJ_ROOT_NAME: &str = "obj-root";

/// Mesh loading error types
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Mesh parse error: {0}")]
    Parse(String),

    #[error("Mesh contains no geometry")]
    Empty,

    #[error("Loader task failed: {0}")]
    Task(String),
}

/// Asynchronous capability turning mesh bytes into a model graph
#[async_trait]
pub trait MeshLoader: Send + Sync {
    /// Parse `bytes` into a model, or fail without side effects
    async fn load(&self, bytes: Arc<[u8]>) -> Result<LoadedModel, LoadError>;
}

/// OBJ loader backed by `tobj`
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjLoader;

impl ObjLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MeshLoader for ObjLoader {
    async fn load(&self, bytes: Arc<[u8]>) -> Result<LoadedModel, LoadError> {
        tokio::task::spawn_blocking(move || parse_obj(&bytes))
            .await
            .map_err(|e| LoadError::Task(e.to_string()))?
    }
}

/// Parse OBJ bytes synchronously
pub fn parse_obj(bytes: &[u8]) -> Result<LoadedModel, LoadError> {
    let mut reader = BufReader::new(Cursor::new(bytes));
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };

    let (models, _materials) = tobj::load_obj_buf(&mut reader, &options, |_path| {
        Err(tobj::LoadError::OpenFileFailed)
    })
    .map_err(|e| LoadError::Parse(e.to_string()))?;

    let mut root = SceneNode::group(OBJ_ROOT_NAME);
    for (index, model) in models.into_iter().enumerate() {
        let positions: Vec<Vec3> = model
            .mesh
            .positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
            .collect();
        if positions.is_empty() {
            continue;
        }
        let name = if model.name.is_empty() {
            format!("mesh-{index}")
        } else {
            model.name
        };
        root.children
            .push(SceneNode::mesh(name, MeshData::new(positions, model.mesh.indices)));
    }

    let loaded = LoadedModel::new(root);
    if loaded.vertex_count() == 0 {
        return Err(LoadError::Empty);
    }

    tracing::debug!(
        meshes = loaded.mesh_count(),
        vertices = loaded.vertex_count(),
        triangles = loaded.triangle_count(),
        "parsed OBJ"
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeKind;

    const QUAD: &str = "\
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
";

    #[test]
    fn test_parse_quad_is_triangulated() {
        let model = parse_obj(QUAD.as_bytes()).unwrap();
        assert_eq!(model.root.name, OBJ_ROOT_NAME);
        assert!(matches!(model.root.kind, NodeKind::Group));
        assert_eq!(model.mesh_count(), 1);
        assert_eq!(model.triangle_count(), 2);
        assert_eq!(model.root.children[0].name, "quad");
    }

    #[test]
    fn test_parse_ignores_missing_mtllib() {
        let src = format!("mtllib missing.mtl\n{QUAD}");
        assert!(parse_obj(src.as_bytes()).is_ok());
    }

    #[test]
    fn test_parse_rejects_non_utf8() {
        let err = parse_obj(&[0xff, 0xfe, 0x00, 0x9f]).unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn test_parse_rejects_json_error_body() {
        let err = parse_obj(br#"{"error": "No image uploaded"}"#).unwrap_err();
        assert!(matches!(err, LoadError::Empty));
    }

    #[test]
    fn test_parse_rejects_truncated_vertex() {
        let err = parse_obj(b"v 1.0 2.0\nf 1 1 1\n").unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[tokio::test]
    async fn test_loader_runs_off_thread() {
        let bytes: Arc<[u8]> = Arc::from(QUAD.as_bytes());
        let model = ObjLoader::new().load(bytes).await.unwrap();
        assert_eq!(model.vertex_count(), 4);
    }
}
