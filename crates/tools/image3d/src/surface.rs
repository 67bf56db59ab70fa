//! Presentation seams: the preview surface and the download target

use crate::handle::TemporaryHandle;
use glam::Vec3;
use mesh::NormalizedModel;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

// ============================================================================
// Scene setup
// ============================================================================

/// Perspective camera with orbit controls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSetup {
    pub position: Vec3,
    pub target: Vec3,
    pub near: f32,
    pub far: f32,
    /// Orbit, pan and zoom with inertia
    pub orbit_damping: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub intensity: f32,
}

/// Fixed camera and lighting of the model preview
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneSetup {
    pub camera: CameraSetup,
    pub ambient_intensity: f32,
    pub directional: DirectionalLight,
}

impl std::fmt::Display for SceneSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "camera at {} looking at {} (near {}, far {}), ambient {}, directional {} at {}",
            self.camera.position,
            self.camera.target,
            self.camera.near,
            self.camera.far,
            self.ambient_intensity,
            self.directional.intensity,
            self.directional.position
        )
    }
}

impl Default for SceneSetup {
    fn default() -> Self {
        Self {
            camera: CameraSetup {
                position: Vec3::new(0.0, -20.0, 15.0),
                target: Vec3::ZERO,
                near: 0.1,
                far: 1000.0,
                orbit_damping: true,
            },
            ambient_intensity: 0.5,
            directional: DirectionalLight {
                position: Vec3::new(10.0, 10.0, 5.0),
                intensity: 1.0,
            },
        }
    }
}

// ============================================================================
// Render surface
// ============================================================================

/// Where the pipeline shows the source image and the generated model
///
/// The surface re-renders whenever the attached model changes. Only
/// normalized models can be attached.
pub trait RenderSurface: Send + Sync {
    /// Show the submitted image, addressed by a live handle locator
    fn show_source_image(&self, locator: &str);

    fn clear_source_image(&self);

    /// Replace the displayed model
    fn attach_model(&self, model: Arc<NormalizedModel>);

    fn clear_model(&self);
}

#[derive(Debug, Default)]
struct HeadlessState {
    source_image: Option<String>,
    model: Option<Arc<NormalizedModel>>,
    attach_count: usize,
}

/// Surface that records what it was asked to display
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    setup: SceneSetup,
    state: Mutex<HeadlessState>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Camera and lighting the preview is rendered with
    pub fn setup(&self) -> &SceneSetup {
        &self.setup
    }

    /// Locator of the source image currently shown
    pub fn source_image(&self) -> Option<String> {
        self.lock().source_image.clone()
    }

    /// Model currently attached
    pub fn model(&self) -> Option<Arc<NormalizedModel>> {
        self.lock().model.clone()
    }

    /// Number of times a model was attached
    pub fn attach_count(&self) -> usize {
        self.lock().attach_count
    }
}

impl RenderSurface for HeadlessSurface {
    fn show_source_image(&self, locator: &str) {
        self.lock().source_image = Some(locator.to_string());
    }

    fn clear_source_image(&self) {
        self.lock().source_image = None;
    }

    fn attach_model(&self, model: Arc<NormalizedModel>) {
        tracing::debug!(bounds = %model.bounds(), "model attached");
        let mut state = self.lock();
        state.model = Some(model);
        state.attach_count += 1;
    }

    fn clear_model(&self) {
        self.lock().model = None;
    }
}

// ============================================================================
// Download target
// ============================================================================

/// Save action for generated meshes
///
/// `save` must have captured the handle's content by the time it returns;
/// the handle is released right after.
pub trait DownloadTarget: Send + Sync {
    fn save(&self, handle: &TemporaryHandle, file_name: &str) -> std::io::Result<PathBuf>;
}

/// Saves downloads into a directory
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
    dir: PathBuf,
}

impl DirectoryTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadTarget for DirectoryTarget {
    fn save(&self, handle: &TemporaryHandle, file_name: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, handle.bytes())?;
        tracing::info!(path = %path.display(), bytes = handle.bytes().len(), "saved download");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{HandlePurpose, HandleRegistry};

    #[test]
    fn test_default_scene_setup() {
        let setup = SceneSetup::default();
        assert_eq!(setup.camera.position, Vec3::new(0.0, -20.0, 15.0));
        assert_eq!(setup.camera.near, 0.1);
        assert_eq!(setup.camera.far, 1000.0);
        assert!(setup.camera.orbit_damping);
        assert_eq!(setup.ambient_intensity, 0.5);
        assert_eq!(setup.directional.position, Vec3::new(10.0, 10.0, 5.0));
        assert_eq!(setup.directional.intensity, 1.0);
    }

    #[test]
    fn test_headless_surface_uses_default_scene() {
        let surface = HeadlessSurface::new();
        assert_eq!(surface.setup(), &SceneSetup::default());
        let described = surface.setup().to_string();
        assert!(described.contains("camera at [0, -20, 15]"), "{described}");
        assert!(described.contains("far 1000"), "{described}");
    }

    #[test]
    fn test_headless_surface_records_source_image() {
        let surface = HeadlessSurface::new();
        surface.show_source_image("blob:image3d/1");
        assert_eq!(surface.source_image().as_deref(), Some("blob:image3d/1"));
        surface.clear_source_image();
        assert!(surface.source_image().is_none());
    }

    #[test]
    fn test_directory_target_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = DirectoryTarget::new(dir.path().join("out"));
        let registry = HandleRegistry::new();
        let handle = registry.create(HandlePurpose::Download, Arc::from(&b"v 1 2 3\n"[..]));

        let path = target.save(&handle, "generated_model.obj").unwrap();
        assert_eq!(path, dir.path().join("out").join("generated_model.obj"));
        assert_eq!(std::fs::read(&path).unwrap(), b"v 1 2 3\n");
    }
}
