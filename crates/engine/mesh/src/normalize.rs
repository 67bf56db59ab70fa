//! Display normalization of loaded models
//!
//! A freshly loaded model sits wherever its source put it, in whatever units
//! it was authored in. [`normalize`] recenters it on the origin and applies a
//! fixed uniform scale so a fixed preview camera can frame it.
//!
//! The steps run in this order:
//!
//! 1. Every mesh node gets [`Material::neutral_standard`]; groups are untouched.
//! 2. World-space bounds of the whole graph are computed.
//! 3. The root transform is rewritten so world positions map to
//!    `NORMALIZED_SCALE * (v - center)`.
//!
//! The scale is a constant rather than derived from the bounds, so unusually
//! large or small meshes display large or small.

use crate::bounds::Aabb;
use crate::scene::{LoadedModel, Material, NodeKind, SceneNode};
use glam::Vec3;
use std::ops::Deref;

/// Uniform scale applied to every normalized model
pub const NORMALIZED_SCALE: f32 = 0.5;

/// A model that has been recentered and scaled for display
///
/// Only [`normalize`] constructs this type, so holding one proves the
/// normalization ran exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedModel {
    model: LoadedModel,
    source_bounds: Aabb,
    bounds: Aabb,
}

impl NormalizedModel {
    /// World bounds before normalization
    pub fn source_bounds(&self) -> Aabb {
        self.source_bounds
    }

    /// World bounds after normalization
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn model(&self) -> &LoadedModel {
        &self.model
    }

    pub fn into_model(self) -> LoadedModel {
        self.model
    }
}

impl Deref for NormalizedModel {
    type Target = LoadedModel;

    fn deref(&self) -> &LoadedModel {
        &self.model
    }
}

/// Recenter and rescale `model` for display
pub fn normalize(mut model: LoadedModel) -> NormalizedModel {
    assign_neutral_materials(&mut model);

    let source_bounds = model.world_bounds();
    let center = if source_bounds.is_empty() {
        tracing::warn!("normalizing a model without geometry, skipping recenter");
        Vec3::ZERO
    } else {
        source_bounds.center()
    };

    // Uniform scale commutes with the root rotation, so folding it into the
    // existing root transform yields world = s * (old_world - c).
    let root = &mut model.root.transform;
    root.translation = (root.translation - center) * NORMALIZED_SCALE;
    root.scale *= NORMALIZED_SCALE;

    let bounds = model.world_bounds();
    tracing::debug!(source = %source_bounds, normalized = %bounds, "normalized model");

    NormalizedModel {
        model,
        source_bounds,
        bounds,
    }
}

fn assign_neutral_materials(model: &mut LoadedModel) {
    model.traverse_mut(&mut |node: &mut SceneNode| {
        if let NodeKind::Mesh(data) = &mut node.kind {
            data.material = Material::neutral_standard();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MaterialKind, MeshData, Transform};
    use glam::Quat;

    fn box_mesh(center: Vec3, size: Vec3) -> MeshData {
        let b = Aabb::from_center_size(center, size);
        let positions = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { b.min.x } else { b.max.x },
                    if i & 2 == 0 { b.min.y } else { b.max.y },
                    if i & 4 == 0 { b.min.z } else { b.max.z },
                )
            })
            .collect();
        MeshData::new(positions, vec![0, 1, 2, 1, 3, 2])
    }

    #[test]
    fn test_box_centered_at_five() {
        let model = LoadedModel::new(SceneNode::group("root").with_child(SceneNode::mesh(
            "box",
            box_mesh(Vec3::splat(5.0), Vec3::new(10.0, 20.0, 30.0)),
        )));
        let normalized = normalize(model);

        assert!(normalized.bounds().center().abs_diff_eq(Vec3::ZERO, 1e-5));
        assert!(normalized
            .bounds()
            .size()
            .abs_diff_eq(Vec3::new(5.0, 10.0, 15.0), 1e-5));
        assert!(normalized
            .source_bounds()
            .center()
            .abs_diff_eq(Vec3::splat(5.0), 1e-5));
    }

    #[test]
    fn test_materials_replaced_on_meshes_only() {
        let model = LoadedModel::new(
            SceneNode::group("root")
                .with_child(SceneNode::mesh("a", box_mesh(Vec3::ZERO, Vec3::ONE)))
                .with_child(
                    SceneNode::group("nested")
                        .with_child(SceneNode::mesh("b", box_mesh(Vec3::X, Vec3::ONE))),
                ),
        );
        let normalized = normalize(model);

        let mut meshes = 0;
        normalized.root.traverse(&mut |node| match &node.kind {
            NodeKind::Mesh(data) => {
                meshes += 1;
                assert_eq!(data.material.kind, MaterialKind::Standard);
                assert_eq!(data.material.color, [1.0, 1.0, 1.0]);
                assert!(!data.material.wireframe);
                assert!(data.material.is_opaque());
            }
            NodeKind::Group => assert_eq!(node.transform.rotation, Quat::IDENTITY),
        });
        assert_eq!(meshes, 2);
    }

    #[test]
    fn test_existing_root_transform_is_respected() {
        let root = SceneNode::group("root")
            .with_transform(Transform {
                translation: Vec3::new(-3.0, 7.0, 1.0),
                rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
                scale: Vec3::splat(2.0),
            })
            .with_child(SceneNode::mesh("box", box_mesh(Vec3::ONE, Vec3::new(2.0, 4.0, 6.0))));
        let model = LoadedModel::new(root);
        let before = model.world_bounds();
        let normalized = normalize(model);

        assert!(normalized.bounds().center().abs_diff_eq(Vec3::ZERO, 1e-4));
        assert!(normalized
            .bounds()
            .size()
            .abs_diff_eq(before.size() * NORMALIZED_SCALE, 1e-4));
    }

    #[test]
    fn test_empty_model_is_only_scaled() {
        let normalized = normalize(LoadedModel::new(SceneNode::group("root")));
        assert!(normalized.bounds().is_empty());
        assert_eq!(normalized.root.transform.translation, Vec3::ZERO);
        assert_eq!(normalized.root.transform.scale, Vec3::splat(NORMALIZED_SCALE));
    }
}
