//! Retained scene graph
//!
//! Nodes live in an arena addressed by generational [`NodeId`]s, so an id that
//! outlived its node never aliases a newer one. Geometry and materials live in
//! separate pools with live counts; nothing is reference counted, whoever
//! creates a resource disposes it.
//!
//! Only nodes reachable from [`SceneGraph::root`] are drawn. Detached subtrees
//! (parent `None`, not the root) are used as templates for cloning.

use glam::{Mat4, Quat, Vec3};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Triangles {
        positions: Vec<Vec3>,
        indices: Vec<u32>,
    },
    Lines {
        segments: Vec<[Vec3; 2]>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    /// Lit surface with a constant base color (linear RGBA).
    Standard { base_color: [f32; 4] },
    /// Unlit line material.
    Line {
        color: [f32; 3],
        opacity: f32,
        transparent: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh {
        geometry: GeometryId,
        material: MaterialId,
    },
    Lines {
        geometry: GeometryId,
        material: MaterialId,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

struct Pool<T> {
    next: u32,
    items: HashMap<u32, T>,
}

impl<T> Pool<T> {
    fn new() -> Self {
        Self {
            next: 0,
            items: HashMap::new(),
        }
    }

    fn insert(&mut self, item: T) -> u32 {
        let key = self.next;
        self.next += 1;
        self.items.insert(key, item);
        key
    }
}

pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    geometries: Pool<Geometry>,
    materials: Pool<Material>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut graph = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            geometries: Pool::new(),
            materials: Pool::new(),
        };
        graph.root = graph.alloc(Node {
            name: "root".to_string(),
            transform: Transform::IDENTITY,
            visible: true,
            kind: NodeKind::Group,
            parent: None,
            children: Vec::new(),
        });
        graph
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Adds a node. `parent: None` creates a detached subtree root.
    pub fn add_node(
        &mut self,
        parent: Option<NodeId>,
        name: impl Into<String>,
        kind: NodeKind,
        transform: Transform,
    ) -> NodeId {
        let parent = parent.filter(|p| self.contains(*p));
        let id = self.alloc(Node {
            name: name.into(),
            transform,
            visible: true,
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent.and_then(|p| self.node_mut(p)) {
            parent.children.push(id);
        }
        id
    }

    /// Removes `id` and all its descendants. Resources referenced by the
    /// removed nodes are not disposed.
    pub fn remove_subtree(&mut self, id: NodeId) {
        if id == self.root {
            log::warn!("refusing to remove the scene root");
            return;
        }
        let Some(parent) = self.node(id).map(|node| node.parent) else {
            return;
        };
        if let Some(parent) = parent.and_then(|p| self.node_mut(p)) {
            parent.children.retain(|child| *child != id);
        }
        for node_id in self.descendants(id) {
            let slot = &mut self.slots[node_id.index as usize];
            slot.node = None;
            self.free.push(node_id.index);
        }
    }

    /// `id` followed by all its descendants, depth first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    pub fn meshes_under(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|node_id| {
                matches!(
                    self.node(*node_id).map(|node| node.kind),
                    Some(NodeKind::Mesh { .. })
                )
            })
            .collect()
    }

    /// Deep-copies the subtree at `source` under `parent`. Geometry and
    /// material ids are shared with the source, node ids are fresh.
    pub fn clone_subtree(&mut self, source: NodeId, parent: Option<NodeId>) -> Option<NodeId> {
        let node = self.node(source)?.clone();
        let copy = self.add_node(parent, node.name, node.kind, node.transform);
        if let Some(copied) = self.node_mut(copy) {
            copied.visible = node.visible;
        }
        for child in node.children {
            self.clone_subtree(child, Some(copy));
        }
        Some(copy)
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.node_mut(id) {
            node.visible = visible;
        }
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) {
        if let Some(node) = self.node_mut(id) {
            node.transform = transform;
        }
    }

    pub fn set_mesh_material(&mut self, id: NodeId, material: MaterialId) {
        if let Some(node) = self.node_mut(id) {
            if let NodeKind::Mesh { material: current, .. } = &mut node.kind {
                *current = material;
            }
        }
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.node(c)) {
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    /// True when the node and every ancestor up to the root are visible.
    pub fn is_drawn(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.node(node_id) else {
                return false;
            };
            if !node.visible {
                return false;
            }
            if node_id == self.root {
                return true;
            }
            current = node.parent;
        }
        false
    }

    pub fn create_geometry(&mut self, geometry: Geometry) -> GeometryId {
        GeometryId(self.geometries.insert(geometry))
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.items.get(&id.0)
    }

    pub fn dispose_geometry(&mut self, id: GeometryId) {
        if self.geometries.items.remove(&id.0).is_none() {
            log::debug!("geometry {:?} already disposed", id);
        }
    }

    pub fn create_material(&mut self, material: Material) -> MaterialId {
        MaterialId(self.materials.insert(material))
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.items.get(&id.0)
    }

    pub fn dispose_material(&mut self, id: MaterialId) {
        if self.materials.items.remove(&id.0).is_none() {
            log::debug!("material {:?} already disposed", id);
        }
    }

    pub fn live_geometry_count(&self) -> usize {
        self.geometries.items.len()
    }

    pub fn live_material_count(&self) -> usize {
        self.materials.items.len()
    }

    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }
}
