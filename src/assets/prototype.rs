use crate::assets::AssetError;
use crate::render::graph::{Geometry, Material, NodeId, NodeKind, SceneGraph, Transform};
use glam::{Mat4, Quat, Vec3};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct PrototypeMesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub base_color: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrototypeNode {
    pub name: String,
    pub transform: Transform,
    pub meshes: Vec<PrototypeMesh>,
    pub children: Vec<PrototypeNode>,
}

/// Plain-data copy of a loaded asset, built off the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetPrototype {
    pub name: String,
    pub roots: Vec<PrototypeNode>,
    pub center: [f32; 3],
    pub extent: [f32; 3],
}

impl AssetPrototype {
    pub fn from_roots(name: impl Into<String>, roots: Vec<PrototypeNode>) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for root in &roots {
            accumulate_bounds(root, Mat4::IDENTITY, &mut min, &mut max);
        }
        let (center, extent) = if min.cmple(max).all() {
            ((min + max) * 0.5, (max - min) * 0.5)
        } else {
            (Vec3::ZERO, Vec3::ZERO)
        };
        Self {
            name: name.into(),
            roots,
            center: center.to_array(),
            extent: extent.to_array(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        fn count(node: &PrototypeNode) -> usize {
            node.meshes.iter().map(|m| m.indices.len() / 3).sum::<usize>()
                + node.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }

    /// Builds the asset as a detached subtree and returns its root group.
    /// The caller owns the created geometry and materials.
    pub fn instantiate(&self, graph: &mut SceneGraph) -> NodeId {
        let root = graph.add_node(None, self.name.clone(), NodeKind::Group, Transform::IDENTITY);
        for node in &self.roots {
            instantiate_node(graph, root, node);
        }
        root
    }
}

fn instantiate_node(graph: &mut SceneGraph, parent: NodeId, node: &PrototypeNode) {
    let group = graph.add_node(
        Some(parent),
        node.name.clone(),
        NodeKind::Group,
        node.transform,
    );
    for (i, mesh) in node.meshes.iter().enumerate() {
        let geometry = graph.create_geometry(Geometry::Triangles {
            positions: mesh.positions.clone(),
            indices: mesh.indices.clone(),
        });
        let material = graph.create_material(Material::Standard {
            base_color: mesh.base_color,
        });
        graph.add_node(
            Some(group),
            format!("{}#{}", node.name, i),
            NodeKind::Mesh { geometry, material },
            Transform::IDENTITY,
        );
    }
    for child in &node.children {
        instantiate_node(graph, group, child);
    }
}

fn accumulate_bounds(node: &PrototypeNode, parent: Mat4, min: &mut Vec3, max: &mut Vec3) {
    let world = parent * node.transform.matrix();
    for mesh in &node.meshes {
        for p in &mesh.positions {
            let p = world.transform_point3(*p);
            *min = min.min(p);
            *max = max.max(p);
        }
    }
    for child in &node.children {
        accumulate_bounds(child, world, min, max);
    }
}

/// Parses a GLB (or a glTF with embedded or sibling buffers).
pub fn parse_gltf(bytes: &[u8], path: &Path) -> Result<AssetPrototype, AssetError> {
    let display = path.display().to_string();
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|source| AssetError::Parse {
        path: display.clone(),
        source,
    })?;

    let mut buffers: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf.blob.as_deref().ok_or_else(|| AssetError::MissingBuffer {
                    path: display.clone(),
                    index: buffer.index(),
                })?;
                buffers.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                let sibling = path.parent().unwrap_or(Path::new("")).join(uri);
                let data = std::fs::read(&sibling).map_err(|source| AssetError::Read {
                    path: sibling.display().to_string(),
                    source,
                })?;
                buffers.push(data);
            }
        }
    }

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| AssetError::NoTriangles {
            path: display.clone(),
        })?;
    let roots: Vec<PrototypeNode> = scene
        .nodes()
        .map(|node| convert_node(node, &buffers, &display))
        .collect();

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| display.clone());
    let prototype = AssetPrototype::from_roots(name, roots);
    if prototype.triangle_count() == 0 {
        return Err(AssetError::NoTriangles { path: display });
    }
    Ok(prototype)
}

fn convert_node(node: gltf::scene::Node, buffers: &[Vec<u8>], path: &str) -> PrototypeNode {
    let (translation, rotation, scale) = node.transform().decomposed();
    let mut meshes = Vec::new();
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "{}: skipping {:?} primitive in mesh {:?}",
                    path,
                    primitive.mode(),
                    mesh.name()
                );
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let positions: Vec<Vec3> = match reader.read_positions() {
                Some(iter) => iter.map(Vec3::from_array).collect(),
                None => continue,
            };
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            meshes.push(PrototypeMesh {
                positions,
                indices,
                base_color: primitive
                    .material()
                    .pbr_metallic_roughness()
                    .base_color_factor(),
            });
        }
    }
    PrototypeNode {
        name: node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node{}", node.index())),
        transform: Transform {
            translation: Vec3::from_array(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from_array(scale),
        },
        meshes,
        children: node
            .children()
            .map(|child| convert_node(child, buffers, path))
            .collect(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn tetrahedron(name: &str) -> AssetPrototype {
        AssetPrototype::from_roots(
            name,
            vec![PrototypeNode {
                name: "hull".to_string(),
                transform: Transform {
                    translation: Vec3::new(0.0, 1.0, 0.0),
                    ..Transform::IDENTITY
                },
                meshes: vec![PrototypeMesh {
                    positions: vec![
                        Vec3::new(0.0, 0.0, 0.0),
                        Vec3::new(1.0, 0.0, 0.0),
                        Vec3::new(0.0, 1.0, 0.0),
                        Vec3::new(0.0, 0.0, 1.0),
                    ],
                    indices: vec![0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3],
                    base_color: [0.7, 0.7, 0.75, 1.0],
                }],
                children: Vec::new(),
            }],
        )
    }

    #[test]
    fn bounds_include_node_transform() {
        let prototype = tetrahedron("t");
        assert_eq!(prototype.center, [0.5, 1.5, 0.5]);
        assert_eq!(prototype.extent, [0.5, 0.5, 0.5]);
        assert_eq!(prototype.triangle_count(), 4);
    }

    #[test]
    fn instantiate_creates_detached_template() {
        let mut graph = SceneGraph::new();
        let root = tetrahedron("t").instantiate(&mut graph);
        assert!(graph.node(root).unwrap().parent().is_none());
        assert_eq!(graph.meshes_under(root).len(), 1);
        assert_eq!(graph.live_geometry_count(), 1);
        assert_eq!(graph.live_material_count(), 1);
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let err = parse_gltf(b"definitely not a glb", Path::new("bad.glb")).unwrap_err();
        assert!(matches!(err, AssetError::Parse { .. }));
    }
}
