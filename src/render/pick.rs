//! CPU picking
//!
//! Pointer picks are resolved on the CPU: a world-space ray is cast through
//! the pixel and intersected with mesh triangles (Möller–Trumbore). Gizmo
//! handles are hit-tested in screen space by [`crate::render::gizmo`]. Both
//! report a [`PickHit`] carrying a [`PickKey`].
//!
//! Mesh visibility is not considered: a mesh hidden behind its outline in
//! mesh mode is still pickable as long as its ancestors are drawn.

use crate::render::graph::{Geometry, NodeId, NodeKind, SceneGraph};
use glam::Vec3;

// ========================================================================
// PickKey — identifier for any pickable element
// ========================================================================

/// Classification of pickable element.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickKind {
    SceneMesh = 1,
    GizmoAxis = 2,
    GizmoPlane = 3,
}

/// `object_id` is the model index for scene meshes and the handle index for
/// gizmo parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PickKey {
    pub kind: PickKind,
    pub object_id: u32,
}

impl PickKey {
    pub fn new(kind: PickKind, object_id: u32) -> Self {
        Self { kind, object_id }
    }

    pub fn scene_mesh(object_id: u32) -> Self {
        Self::new(PickKind::SceneMesh, object_id)
    }
}

// ========================================================================
// PickHit — result of a pick operation
// ========================================================================

#[derive(Debug, Clone, Copy)]
pub struct PickHit {
    pub key: PickKey,
    /// Distance along the pick ray; zero for screen-space hits.
    pub distance: f32,
}

// ========================================================================
// Ray casting
// ========================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir: dir.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

/// Distance along `ray` to the triangle, back faces included.
pub fn ray_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    const EPSILON: f32 = 1e-7;
    let edge1 = b - a;
    let edge2 = c - a;
    let p = ray.dir.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = ray.dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_det;
    (t > EPSILON).then_some(t)
}

/// Nearest hit distance among the triangle meshes under `subtree`.
pub fn raycast_subtree(graph: &SceneGraph, subtree: NodeId, ray: &Ray) -> Option<f32> {
    if !graph.is_drawn(subtree) {
        return None;
    }
    let mut nearest: Option<f32> = None;
    for mesh in graph.meshes_under(subtree) {
        let Some(NodeKind::Mesh { geometry, .. }) = graph.node(mesh).map(|node| node.kind) else {
            continue;
        };
        let Some(Geometry::Triangles { positions, indices }) = graph.geometry(geometry) else {
            continue;
        };
        let world = graph.world_matrix(mesh);
        for tri in indices.chunks_exact(3) {
            let corner = |i: u32| {
                positions
                    .get(i as usize)
                    .map(|p| world.transform_point3(*p))
            };
            let (Some(a), Some(b), Some(c)) = (corner(tri[0]), corner(tri[1]), corner(tri[2]))
            else {
                continue;
            };
            if let Some(t) = ray_triangle(ray, a, b, c) {
                nearest = Some(nearest.map_or(t, |best| best.min(t)));
            }
        }
    }
    nearest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::graph::{Material, Transform};

    fn quad_scene() -> (SceneGraph, NodeId, NodeId) {
        let mut graph = SceneGraph::new();
        let geometry = graph.create_geometry(Geometry::Triangles {
            positions: vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        });
        let material = graph.create_material(Material::Standard {
            base_color: [1.0; 4],
        });
        let group = graph.add_node(
            Some(graph.root()),
            "group",
            NodeKind::Group,
            Transform::IDENTITY,
        );
        let mesh = graph.add_node(
            Some(group),
            "quad",
            NodeKind::Mesh { geometry, material },
            Transform::IDENTITY,
        );
        (graph, group, mesh)
    }

    #[test]
    fn ray_hits_triangle_in_front() {
        let ray = Ray::new(Vec3::new(0.2, 0.2, 5.0), Vec3::NEG_Z);
        let t = ray_triangle(&ray, Vec3::ZERO, Vec3::X, Vec3::Y).unwrap();
        assert!((t - 5.0).abs() < 1e-5);
        assert!((ray.at(t) - Vec3::new(0.2, 0.2, 0.0)).length() < 1e-5);
    }

    #[test]
    fn ray_misses_triangle_behind_origin() {
        let ray = Ray::new(Vec3::new(0.2, 0.2, -5.0), Vec3::NEG_Z);
        assert!(ray_triangle(&ray, Vec3::ZERO, Vec3::X, Vec3::Y).is_none());
    }

    #[test]
    fn hidden_mesh_is_still_pickable_but_hidden_group_is_not() {
        let (mut graph, group, mesh) = quad_scene();
        let ray = Ray::new(Vec3::new(0.0, 0.0, 8.0), Vec3::NEG_Z);
        graph.set_visible(mesh, false);
        assert!(raycast_subtree(&graph, group, &ray).is_some());
        graph.set_visible(group, false);
        assert!(raycast_subtree(&graph, group, &ray).is_none());
    }

    #[test]
    fn raycast_respects_group_transform() {
        let (mut graph, group, _) = quad_scene();
        graph.set_transform(
            group,
            Transform {
                translation: Vec3::new(5.0, 0.0, 0.0),
                ..Transform::IDENTITY
            },
        );
        let centered = Ray::new(Vec3::new(0.0, 0.0, 8.0), Vec3::NEG_Z);
        let shifted = Ray::new(Vec3::new(5.0, 0.0, 8.0), Vec3::NEG_Z);
        assert!(raycast_subtree(&graph, group, &centered).is_none());
        assert!(raycast_subtree(&graph, group, &shifted).is_some());
    }
}
