//! In-memory scene graph for a loaded model
//!
//! A [`LoadedModel`] is a tree of [`SceneNode`]s. Group nodes only carry a
//! transform; mesh nodes carry geometry and a material. World-space bounds
//! account for every ancestor transform.

use crate::bounds::Aabb;
use glam::{Mat4, Quat, Vec3};

// ============================================================================
// Transform
// ============================================================================

/// Local transform of a scene node (scale, then rotate, then translate)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Transform with only a translation
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Local-to-parent matrix
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ============================================================================
// Material
// ============================================================================

/// Shading model of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialKind {
    /// Whatever the loader picked (usually an unlit default)
    #[default]
    Basic,
    /// Physically based standard material
    Standard,
}

/// Surface material of a mesh node
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub kind: MaterialKind,
    /// Base color, linear RGB in 0.0-1.0
    pub color: [f32; 3],
    pub wireframe: bool,
    /// 1.0 is fully opaque
    pub opacity: f32,
}

impl Material {
    /// White, opaque, solid standard material
    pub fn neutral_standard() -> Self {
        Self {
            kind: MaterialKind::Standard,
            color: [1.0, 1.0, 1.0],
            wireframe: false,
            opacity: 1.0,
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.opacity >= 1.0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            kind: MaterialKind::Basic,
            color: [0.8, 0.8, 0.8],
            wireframe: false,
            opacity: 1.0,
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// Triangle geometry of a mesh node, in node-local coordinates
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    /// Triangle list indices into `positions`
    pub indices: Vec<u32>,
    pub material: Material,
}

impl MeshData {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            material: Material::default(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Bounds in node-local coordinates
    pub fn local_bounds(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().copied())
    }
}

/// What a node holds besides its transform
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Transform-only node
    Group,
    Mesh(MeshData),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Create an empty group node
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind: NodeKind::Group,
            children: Vec::new(),
        }
    }

    /// Create a mesh node
    pub fn mesh(name: impl Into<String>, data: MeshData) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind: NodeKind::Mesh(data),
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh(_))
    }

    /// Visit this node and every descendant, parents first
    pub fn traverse(&self, f: &mut impl FnMut(&SceneNode)) {
        f(self);
        for child in &self.children {
            child.traverse(f);
        }
    }

    /// Mutable variant of [`SceneNode::traverse`]
    pub fn traverse_mut(&mut self, f: &mut impl FnMut(&mut SceneNode)) {
        f(self);
        for child in &mut self.children {
            child.traverse_mut(f);
        }
    }

    fn accumulate_bounds(&self, parent: &Mat4, acc: &mut Aabb) {
        let world = *parent * self.transform.matrix();
        if let NodeKind::Mesh(data) = &self.kind {
            for p in &data.positions {
                acc.expand(world.transform_point3(*p));
            }
        }
        for child in &self.children {
            child.accumulate_bounds(&world, acc);
        }
    }
}

// ============================================================================
// LoadedModel
// ============================================================================

/// Model graph produced by a mesh loader, not yet fit for display
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    pub root: SceneNode,
}

impl LoadedModel {
    pub fn new(root: SceneNode) -> Self {
        Self { root }
    }

    /// Union of every mesh vertex in world space
    pub fn world_bounds(&self) -> Aabb {
        let mut acc = Aabb::EMPTY;
        self.root.accumulate_bounds(&Mat4::IDENTITY, &mut acc);
        acc
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.root.traverse(&mut |node| {
            if node.is_mesh() {
                count += 1;
            }
        });
        count
    }

    pub fn vertex_count(&self) -> usize {
        let mut count = 0;
        self.root.traverse(&mut |node| {
            if let NodeKind::Mesh(data) = &node.kind {
                count += data.positions.len();
            }
        });
        count
    }

    pub fn triangle_count(&self) -> usize {
        let mut count = 0;
        self.root.traverse(&mut |node| {
            if let NodeKind::Mesh(data) = &node.kind {
                count += data.triangle_count();
            }
        });
        count
    }

    pub fn traverse_mut(&mut self, f: &mut impl FnMut(&mut SceneNode)) {
        self.root.traverse_mut(f);
    }
}
