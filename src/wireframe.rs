//! Mesh-mode outlines
//!
//! In mesh mode a mesh is hidden and replaced, visually, by a sibling line
//! object built from its feature edges. The projector owns every outline it
//! creates and the only backup of each mesh's original material; the backup
//! is keyed by [`NodeId`], which is stable for the lifetime of the clone.

use crate::preferences::Theme;
use crate::render::graph::{
    Geometry, GeometryId, Material, MaterialId, NodeId, NodeKind, SceneGraph,
};
use glam::Vec3;
use std::collections::HashMap;

pub const DEFAULT_BASE_THRESHOLD_DEG: f32 = 15.0;

const WELD_PRECISION: f32 = 1e4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WireframeParams {
    pub mesh_mode: bool,
    pub opacity: f32,
    pub line_density: f32,
    pub theme: Theme,
}

/// An outline and the resources it exclusively owns.
#[derive(Debug, Clone, PartialEq)]
pub struct WireframeArtifact {
    pub node: NodeId,
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub edge_count: usize,
}

pub struct WireframeProjector {
    base_threshold_deg: f32,
    originals: HashMap<NodeId, MaterialId>,
    artifacts: HashMap<NodeId, WireframeArtifact>,
}

impl Default for WireframeProjector {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_THRESHOLD_DEG)
    }
}

impl WireframeProjector {
    pub fn new(base_threshold_deg: f32) -> Self {
        Self {
            base_threshold_deg,
            originals: HashMap::new(),
            artifacts: HashMap::new(),
        }
    }

    pub fn threshold_deg(&self, line_density: f32) -> f32 {
        threshold_for_density(self.base_threshold_deg, line_density)
    }

    /// Brings `mesh` in line with `params`. Any existing outline is disposed
    /// first, so a parameter change always yields a fresh outline.
    pub fn apply(&mut self, graph: &mut SceneGraph, mesh: NodeId, params: &WireframeParams) {
        let Some(node) = graph.node(mesh) else {
            log::debug!("wireframe target {:?} no longer exists", mesh);
            return;
        };
        let NodeKind::Mesh { geometry, material } = node.kind else {
            return;
        };
        self.originals.entry(mesh).or_insert(material);
        self.dispose_artifact(graph, mesh);

        if !params.mesh_mode {
            self.restore(graph, mesh);
            return;
        }

        let threshold = self.threshold_deg(params.line_density);
        let segments = match graph.geometry(geometry) {
            Some(Geometry::Triangles { positions, indices }) => {
                extract_edges(positions, indices, threshold)
            }
            _ => Vec::new(),
        };
        let edge_count = segments.len();
        let (parent, transform, name) = {
            let Some(node) = graph.node(mesh) else {
                return;
            };
            (node.parent(), node.transform, format!("{} outline", node.name))
        };
        let line_geometry = graph.create_geometry(Geometry::Lines { segments });
        let line_material = graph.create_material(Material::Line {
            color: params.theme.outline_color(),
            opacity: params.opacity,
            transparent: true,
        });
        let outline = graph.add_node(
            parent,
            name,
            NodeKind::Lines {
                geometry: line_geometry,
                material: line_material,
            },
            transform,
        );
        graph.set_visible(mesh, false);
        self.artifacts.insert(
            mesh,
            WireframeArtifact {
                node: outline,
                geometry: line_geometry,
                material: line_material,
                edge_count,
            },
        );
        log::debug!(
            "outline for {:?}: {} edges at {:.2} deg",
            mesh,
            edge_count,
            threshold
        );
    }

    /// Drops the outline, restores the mesh and forgets its backup.
    pub fn release(&mut self, graph: &mut SceneGraph, mesh: NodeId) {
        self.dispose_artifact(graph, mesh);
        self.restore(graph, mesh);
        self.originals.remove(&mesh);
    }

    /// Releases every mesh the projector has seen.
    pub fn teardown(&mut self, graph: &mut SceneGraph) {
        let meshes: Vec<NodeId> = self
            .originals
            .keys()
            .chain(self.artifacts.keys())
            .copied()
            .collect();
        for mesh in meshes {
            self.release(graph, mesh);
        }
    }

    pub fn artifact(&self, mesh: NodeId) -> Option<&WireframeArtifact> {
        self.artifacts.get(&mesh)
    }

    #[cfg(test)]
    pub fn original_material(&self, mesh: NodeId) -> Option<MaterialId> {
        self.originals.get(&mesh).copied()
    }

    #[cfg(test)]
    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    fn restore(&self, graph: &mut SceneGraph, mesh: NodeId) {
        if let Some(material) = self.originals.get(&mesh) {
            graph.set_mesh_material(mesh, *material);
        }
        graph.set_visible(mesh, true);
    }

    fn dispose_artifact(&mut self, graph: &mut SceneGraph, mesh: NodeId) {
        if let Some(artifact) = self.artifacts.remove(&mesh) {
            graph.remove_subtree(artifact.node);
            graph.dispose_geometry(artifact.geometry);
            graph.dispose_material(artifact.material);
        }
    }
}

/// Angle threshold for a density; denser means a smaller threshold.
/// Non-positive or non-finite densities fall back to the smallest positive
/// density, i.e. the largest threshold.
pub fn threshold_for_density(base_threshold_deg: f32, line_density: f32) -> f32 {
    let density = if line_density.is_finite() && line_density > 0.0 {
        line_density
    } else {
        f32::MIN_POSITIVE
    };
    (base_threshold_deg / density).clamp(0.0, 180.0)
}

/// Feature edges of a triangle mesh: boundary edges plus edges whose two
/// faces meet at an angle of at least `threshold_deg`.
pub fn extract_edges(positions: &[Vec3], indices: &[u32], threshold_deg: f32) -> Vec<[Vec3; 2]> {
    let threshold_dot = threshold_deg.to_radians().cos();
    let keep_all = threshold_deg <= 0.0;

    let mut welded: HashMap<[i64; 3], u32> = HashMap::new();
    let mut weld = |p: Vec3| -> u32 {
        let key = [
            (p.x * WELD_PRECISION).round() as i64,
            (p.y * WELD_PRECISION).round() as i64,
            (p.z * WELD_PRECISION).round() as i64,
        ];
        let next = welded.len() as u32;
        *welded.entry(key).or_insert(next)
    };

    struct EdgeFaces {
        ends: [Vec3; 2],
        normals: Vec<Vec3>,
    }
    let mut order: Vec<(u32, u32)> = Vec::new();
    let mut edges: HashMap<(u32, u32), EdgeFaces> = HashMap::new();

    for tri in indices.chunks_exact(3) {
        let corners = [
            positions.get(tri[0] as usize),
            positions.get(tri[1] as usize),
            positions.get(tri[2] as usize),
        ];
        let [Some(a), Some(b), Some(c)] = corners else {
            continue;
        };
        let ids = [weld(*a), weld(*b), weld(*c)];
        if ids[0] == ids[1] || ids[1] == ids[2] || ids[0] == ids[2] {
            continue;
        }
        let normal = (*b - *a).cross(*c - *a).normalize_or_zero();
        if normal == Vec3::ZERO {
            continue;
        }
        let points = [*a, *b, *c];
        for k in 0..3 {
            let (i, j) = (ids[k], ids[(k + 1) % 3]);
            let key = (i.min(j), i.max(j));
            let entry = edges.entry(key).or_insert_with(|| {
                order.push(key);
                EdgeFaces {
                    ends: [points[k], points[(k + 1) % 3]],
                    normals: Vec::new(),
                }
            });
            entry.normals.push(normal);
        }
    }

    order
        .into_iter()
        .filter_map(|key| edges.get(&key))
        .filter(|edge| match edge.normals.as_slice() {
            [n1, n2] => keep_all || n1.dot(*n2) <= threshold_dot,
            _ => true,
        })
        .map(|edge| edge.ends)
        .collect()
}
