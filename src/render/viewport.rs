//! Software viewport
//!
//! Projects the scene graph through the orbit camera and paints it with the
//! egui painter: flat-shaded back-face-culled triangles sorted far to near,
//! outline segments, a ground grid and the gizmo handles on top.

use crate::preferences::Theme;
use crate::render::camera::OrbitCamera;
use crate::render::gizmo::HandleShape;
use crate::render::graph::{Geometry, Material, NodeKind, SceneGraph};
use egui::{Color32, Pos2, Rgba, Stroke};
use glam::{Vec2, Vec3};

pub const LIGHT_POSITION: Vec3 = Vec3::new(5.0, 5.0, 5.0);
const AMBIENT: f32 = 0.35;
const DIFFUSE: f32 = 0.75;
const GRID_HALF_EXTENT: i32 = 10;
const GRID_Y: f32 = -2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenTriangle {
    pub points: [Vec2; 3],
    pub depth: f32,
    /// Linear RGBA after lighting.
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSegment {
    pub from: Vec2,
    pub to: Vec2,
    pub color: [f32; 4],
}

#[derive(Debug, Default)]
pub struct DrawList {
    pub triangles: Vec<ScreenTriangle>,
    pub segments: Vec<ScreenSegment>,
}

/// Lambert term for a flat face plus ambient, applied to `base`.
pub fn shade(base: [f32; 4], normal: Vec3) -> [f32; 4] {
    let light = LIGHT_POSITION.normalize();
    let lambert = normal.normalize_or_zero().dot(light).max(0.0);
    let k = (AMBIENT + DIFFUSE * lambert).min(1.0);
    [base[0] * k, base[1] * k, base[2] * k, base[3]]
}

/// Everything reachable and visible in `graph`, in viewport pixels.
pub fn collect(graph: &SceneGraph, camera: &OrbitCamera, viewport: Vec2) -> DrawList {
    let mut list = DrawList::default();
    let eye = camera.eye();
    for id in graph.descendants(graph.root()) {
        let Some(node) = graph.node(id) else {
            continue;
        };
        let (geometry, material) = match node.kind {
            NodeKind::Group => continue,
            NodeKind::Mesh { geometry, material } | NodeKind::Lines { geometry, material } => {
                (geometry, material)
            }
        };
        if !graph.is_drawn(id) {
            continue;
        }
        let (Some(geometry), Some(material)) = (graph.geometry(geometry), graph.material(material))
        else {
            continue;
        };
        let world = graph.world_matrix(id);
        match (geometry, material) {
            (Geometry::Triangles { positions, indices }, Material::Standard { base_color }) => {
                for tri in indices.chunks_exact(3) {
                    let corners = [tri[0], tri[1], tri[2]]
                        .map(|i| positions.get(i as usize).copied().unwrap_or(Vec3::ZERO))
                        .map(|p| world.transform_point3(p));
                    let normal = (corners[1] - corners[0]).cross(corners[2] - corners[0]);
                    let centroid = (corners[0] + corners[1] + corners[2]) / 3.0;
                    if normal.dot(eye - centroid) <= 0.0 {
                        continue;
                    }
                    let projected = corners.map(|p| camera.project(p, viewport));
                    let [Some(a), Some(b), Some(c)] = projected else {
                        continue;
                    };
                    list.triangles.push(ScreenTriangle {
                        points: [a.truncate(), b.truncate(), c.truncate()],
                        depth: (a.z + b.z + c.z) / 3.0,
                        color: shade(*base_color, normal),
                    });
                }
            }
            (
                Geometry::Lines { segments },
                Material::Line {
                    color,
                    opacity,
                    transparent,
                },
            ) => {
                let alpha = if *transparent { *opacity } else { 1.0 };
                for [p0, p1] in segments {
                    let from = camera.project(world.transform_point3(*p0), viewport);
                    let to = camera.project(world.transform_point3(*p1), viewport);
                    if let (Some(from), Some(to)) = (from, to) {
                        list.segments.push(ScreenSegment {
                            from: from.truncate(),
                            to: to.truncate(),
                            color: [color[0], color[1], color[2], alpha],
                        });
                    }
                }
            }
            _ => log::debug!("node {} pairs geometry with an incompatible material", node.name),
        }
    }
    list.triangles.sort_by(|a, b| b.depth.total_cmp(&a.depth));
    list
}

/// Ground grid on the XZ plane below the models.
pub fn grid_segments(camera: &OrbitCamera, viewport: Vec2, theme: Theme) -> Vec<ScreenSegment> {
    let tint = match theme {
        Theme::Dark => [0.3, 0.35, 0.5, 0.25],
        Theme::Light => [0.2, 0.2, 0.25, 0.2],
    };
    let extent = GRID_HALF_EXTENT as f32;
    let mut segments = Vec::new();
    for i in -GRID_HALF_EXTENT..=GRID_HALF_EXTENT {
        let t = i as f32;
        for (a, b) in [
            (Vec3::new(t, GRID_Y, -extent), Vec3::new(t, GRID_Y, extent)),
            (Vec3::new(-extent, GRID_Y, t), Vec3::new(extent, GRID_Y, t)),
        ] {
            if let (Some(from), Some(to)) =
                (camera.project(a, viewport), camera.project(b, viewport))
            {
                segments.push(ScreenSegment {
                    from: from.truncate(),
                    to: to.truncate(),
                    color: tint,
                });
            }
        }
    }
    segments
}

fn to_color32(color: [f32; 4]) -> Color32 {
    Color32::from(Rgba::from_rgba_unmultiplied(
        color[0], color[1], color[2], color[3],
    ))
}

fn rgb(color: [u8; 3]) -> Color32 {
    Color32::from_rgb(color[0], color[1], color[2])
}

/// Paints the graph, grid and gizmo into `rect`.
pub fn paint(
    painter: &egui::Painter,
    rect: egui::Rect,
    graph: &SceneGraph,
    camera: &OrbitCamera,
    theme: Theme,
    gizmo: &[HandleShape],
) {
    let viewport = Vec2::new(rect.width(), rect.height());
    let offset = rect.min.to_vec2();
    let pos = |p: Vec2| Pos2::new(p.x, p.y) + offset;

    painter.rect_filled(rect, 0.0, rgb(theme.background()));

    for segment in grid_segments(camera, viewport, theme) {
        painter.line_segment(
            [pos(segment.from), pos(segment.to)],
            Stroke::new(1.0, to_color32(segment.color)),
        );
    }

    let list = collect(graph, camera, viewport);
    if !list.triangles.is_empty() {
        let mut mesh = egui::Mesh::default();
        for triangle in &list.triangles {
            let base = mesh.vertices.len() as u32;
            let color = to_color32(triangle.color);
            for point in triangle.points {
                mesh.colored_vertex(pos(point), color);
            }
            mesh.add_triangle(base, base + 1, base + 2);
        }
        painter.add(egui::Shape::mesh(mesh));
    }
    for segment in &list.segments {
        painter.line_segment(
            [pos(segment.from), pos(segment.to)],
            Stroke::new(1.0, to_color32(segment.color)),
        );
    }

    for shape in gizmo {
        let color = rgb(shape.handle().color());
        match shape {
            HandleShape::Plane { corners, .. } => {
                painter.add(egui::Shape::convex_polygon(
                    corners.iter().map(|c| pos(*c)).collect(),
                    color.gamma_multiply(0.45),
                    Stroke::new(1.0, color),
                ));
            }
            HandleShape::Axis { from, to, .. } => {
                painter.line_segment([pos(*from), pos(*to)], Stroke::new(3.0, color));
                painter.circle_filled(pos(*to), 5.0, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::graph::Transform;

    fn camera() -> OrbitCamera {
        OrbitCamera::new(Vec3::new(0.0, 0.0, 8.0), Vec3::ZERO, 45.0)
    }

    fn add_quad(graph: &mut SceneGraph, z: f32, color: [f32; 4]) {
        let geometry = graph.create_geometry(Geometry::Triangles {
            positions: vec![
                Vec3::new(-1.0, -1.0, z),
                Vec3::new(1.0, -1.0, z),
                Vec3::new(1.0, 1.0, z),
                Vec3::new(-1.0, 1.0, z),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        });
        let material = graph.create_material(Material::Standard { base_color: color });
        let root = graph.root();
        graph.add_node(
            Some(root),
            "quad",
            NodeKind::Mesh { geometry, material },
            Transform::IDENTITY,
        );
    }

    #[test]
    fn shade_is_brighter_facing_the_light() {
        let base = [1.0, 1.0, 1.0, 1.0];
        let lit = shade(base, LIGHT_POSITION);
        let away = shade(base, -LIGHT_POSITION);
        assert!(lit[0] > away[0]);
        assert!((away[0] - AMBIENT).abs() < 1e-6);
        assert_eq!(lit[3], 1.0);
    }

    #[test]
    fn back_faces_are_culled() {
        let mut graph = SceneGraph::new();
        add_quad(&mut graph, 0.0, [1.0; 4]);
        let viewport = Vec2::new(800.0, 600.0);
        assert_eq!(collect(&graph, &camera(), viewport).triangles.len(), 2);

        let behind = OrbitCamera::new(Vec3::new(0.0, 0.0, -8.0), Vec3::ZERO, 45.0);
        assert!(collect(&graph, &behind, viewport).triangles.is_empty());
    }

    #[test]
    fn triangles_are_sorted_far_to_near() {
        let mut graph = SceneGraph::new();
        add_quad(&mut graph, 1.0, [1.0, 0.0, 0.0, 1.0]);
        add_quad(&mut graph, -1.0, [0.0, 0.0, 1.0, 1.0]);
        let list = collect(&graph, &camera(), Vec2::new(800.0, 600.0));
        assert_eq!(list.triangles.len(), 4);
        assert!(list.triangles[0].depth >= list.triangles[3].depth);
        assert!(list.triangles[0].color[2] > 0.0);
    }

    #[test]
    fn hidden_nodes_are_skipped() {
        let mut graph = SceneGraph::new();
        add_quad(&mut graph, 0.0, [1.0; 4]);
        let quad = graph.meshes_under(graph.root())[0];
        graph.set_visible(quad, false);
        assert!(collect(&graph, &camera(), Vec2::new(800.0, 600.0))
            .triangles
            .is_empty());
    }

    #[test]
    fn outline_opacity_applies_only_when_transparent() {
        let mut graph = SceneGraph::new();
        let geometry = graph.create_geometry(Geometry::Lines {
            segments: vec![[Vec3::ZERO, Vec3::X]],
        });
        let material = graph.create_material(Material::Line {
            color: [1.0, 1.0, 1.0],
            opacity: 0.4,
            transparent: true,
        });
        let root = graph.root();
        graph.add_node(
            Some(root),
            "outline",
            NodeKind::Lines { geometry, material },
            Transform::IDENTITY,
        );
        let list = collect(&graph, &camera(), Vec2::new(800.0, 600.0));
        assert_eq!(list.segments.len(), 1);
        assert_eq!(list.segments[0].color[3], 0.4);
    }
}
