use crate::render::camera::OrbitCamera;
use crate::render::pick::{PickHit, PickKey, PickKind, Ray};
use glam::{Vec2, Vec3};

const GIZMO_TRANSLATE_X: u32 = 1;
const GIZMO_TRANSLATE_Y: u32 = 2;
const GIZMO_TRANSLATE_Z: u32 = 3;
const GIZMO_TRANSLATE_XY: u32 = 4;
const GIZMO_TRANSLATE_XZ: u32 = 5;
const GIZMO_TRANSLATE_YZ: u32 = 6;

/// On-screen length of an axis handle.
const AXIS_SCREEN_PX: f32 = 90.0;
/// Plane handles span this fraction of the axis, starting at the origin.
const PLANE_INSET: f32 = 0.2;
const PLANE_SIZE: f32 = 0.25;
const AXIS_HIT_TOLERANCE_PX: f32 = 8.0;
const PARALLEL_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GizmoHandle {
    AxisX,
    AxisY,
    AxisZ,
    PlaneXY,
    PlaneXZ,
    PlaneYZ,
}

impl GizmoHandle {
    pub const ALL: [GizmoHandle; 6] = [
        GizmoHandle::AxisX,
        GizmoHandle::AxisY,
        GizmoHandle::AxisZ,
        GizmoHandle::PlaneXY,
        GizmoHandle::PlaneXZ,
        GizmoHandle::PlaneYZ,
    ];

    pub fn id(self) -> u32 {
        match self {
            GizmoHandle::AxisX => GIZMO_TRANSLATE_X,
            GizmoHandle::AxisY => GIZMO_TRANSLATE_Y,
            GizmoHandle::AxisZ => GIZMO_TRANSLATE_Z,
            GizmoHandle::PlaneXY => GIZMO_TRANSLATE_XY,
            GizmoHandle::PlaneXZ => GIZMO_TRANSLATE_XZ,
            GizmoHandle::PlaneYZ => GIZMO_TRANSLATE_YZ,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|handle| handle.id() == id)
    }

    pub fn pick_key(self) -> PickKey {
        let kind = if self.is_axis() {
            PickKind::GizmoAxis
        } else {
            PickKind::GizmoPlane
        };
        PickKey::new(kind, self.id())
    }

    pub fn from_pick_key(key: PickKey) -> Option<Self> {
        match key.kind {
            PickKind::GizmoAxis | PickKind::GizmoPlane => Self::from_id(key.object_id),
            _ => None,
        }
    }

    pub fn is_axis(self) -> bool {
        matches!(
            self,
            GizmoHandle::AxisX | GizmoHandle::AxisY | GizmoHandle::AxisZ
        )
    }

    /// Axis direction for axis handles, plane normal for plane handles.
    pub fn direction(self) -> Vec3 {
        match self {
            GizmoHandle::AxisX | GizmoHandle::PlaneYZ => Vec3::X,
            GizmoHandle::AxisY | GizmoHandle::PlaneXZ => Vec3::Y,
            GizmoHandle::AxisZ | GizmoHandle::PlaneXY => Vec3::Z,
        }
    }

    /// The two in-plane axes of a plane handle.
    fn plane_axes(self) -> Option<(Vec3, Vec3)> {
        match self {
            GizmoHandle::PlaneXY => Some((Vec3::X, Vec3::Y)),
            GizmoHandle::PlaneXZ => Some((Vec3::X, Vec3::Z)),
            GizmoHandle::PlaneYZ => Some((Vec3::Y, Vec3::Z)),
            _ => None,
        }
    }

    pub fn color(self) -> [u8; 3] {
        match self {
            GizmoHandle::AxisX | GizmoHandle::PlaneYZ => [230, 70, 70],
            GizmoHandle::AxisY | GizmoHandle::PlaneXZ => [90, 210, 90],
            GizmoHandle::AxisZ | GizmoHandle::PlaneXY => [80, 130, 240],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GizmoParams {
    pub visible: bool,
    pub origin: Vec3,
    pub axis_world_len: f32,
}

impl GizmoParams {
    pub fn hidden() -> Self {
        Self {
            visible: false,
            origin: Vec3::ZERO,
            axis_world_len: 1.0,
        }
    }

    /// Gizmo at `origin`, sized so an axis covers a constant pixel length.
    pub fn at(origin: Vec3, camera: &OrbitCamera, viewport: Vec2) -> Self {
        let depth = (origin - camera.eye()).dot(camera.basis().0).max(0.1);
        let world_per_px =
            2.0 * depth * (camera.fov_y_deg.to_radians() * 0.5).tan() / viewport.y.max(1.0);
        Self {
            visible: true,
            origin,
            axis_world_len: AXIS_SCREEN_PX * world_per_px,
        }
    }
}

/// A handle projected to screen space.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleShape {
    Axis {
        handle: GizmoHandle,
        from: Vec2,
        to: Vec2,
    },
    Plane {
        handle: GizmoHandle,
        corners: [Vec2; 4],
    },
}

impl HandleShape {
    pub fn handle(&self) -> GizmoHandle {
        match self {
            HandleShape::Axis { handle, .. } | HandleShape::Plane { handle, .. } => *handle,
        }
    }
}

/// Screen-space handle shapes; empty when hidden or behind the camera.
pub fn layout(params: &GizmoParams, camera: &OrbitCamera, viewport: Vec2) -> Vec<HandleShape> {
    if !params.visible {
        return Vec::new();
    }
    let project = |p: Vec3| camera.project(p, viewport).map(|s| s.truncate());
    let Some(origin) = project(params.origin) else {
        return Vec::new();
    };
    let len = params.axis_world_len;
    let mut shapes = Vec::new();
    for handle in GizmoHandle::ALL {
        if handle.is_axis() {
            if let Some(to) = project(params.origin + handle.direction() * len) {
                shapes.push(HandleShape::Axis {
                    handle,
                    from: origin,
                    to,
                });
            }
        } else if let Some((u, v)) = handle.plane_axes() {
            let a = PLANE_INSET * len;
            let b = (PLANE_INSET + PLANE_SIZE) * len;
            let corners = [
                project(params.origin + u * a + v * a),
                project(params.origin + u * b + v * a),
                project(params.origin + u * b + v * b),
                project(params.origin + u * a + v * b),
            ];
            if let [Some(c0), Some(c1), Some(c2), Some(c3)] = corners {
                shapes.push(HandleShape::Plane {
                    handle,
                    corners: [c0, c1, c2, c3],
                });
            }
        }
    }
    shapes
}

/// Plane handles win over axes; among axes the closest within tolerance.
pub fn hit_test(shapes: &[HandleShape], pixel: Vec2) -> Option<PickHit> {
    let hit = |handle: GizmoHandle| PickHit {
        key: handle.pick_key(),
        distance: 0.0,
    };
    for shape in shapes {
        if let HandleShape::Plane { handle, corners } = shape {
            if point_in_quad(pixel, corners) {
                return Some(hit(*handle));
            }
        }
    }
    shapes
        .iter()
        .filter_map(|shape| match shape {
            HandleShape::Axis { handle, from, to } => {
                let distance = distance_to_segment(pixel, *from, *to);
                (distance <= AXIS_HIT_TOLERANCE_PX).then_some((*handle, distance))
            }
            HandleShape::Plane { .. } => None,
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(handle, _)| hit(handle))
}

/// World point under `ray` constrained to the handle's axis line or plane
/// through `origin`. `None` when the ray is parallel to the constraint.
pub fn constrained_point(handle: GizmoHandle, origin: Vec3, ray: &Ray) -> Option<Vec3> {
    if handle.is_axis() {
        closest_point_on_axis(origin, handle.direction(), ray)
    } else {
        intersect_plane(origin, handle.direction(), ray)
    }
}

fn closest_point_on_axis(origin: Vec3, axis: Vec3, ray: &Ray) -> Option<Vec3> {
    let w0 = origin - ray.origin;
    let b = axis.dot(ray.dir);
    let d = axis.dot(w0);
    let e = ray.dir.dot(w0);
    let denom = 1.0 - b * b;
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }
    let s = (b * e - d) / denom;
    Some(origin + axis * s)
}

fn intersect_plane(origin: Vec3, normal: Vec3, ray: &Ray) -> Option<Vec3> {
    let denom = ray.dir.dot(normal);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }
    let t = (origin - ray.origin).dot(normal) / denom;
    (t >= 0.0).then(|| ray.at(t))
}

fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

fn point_in_quad(p: Vec2, corners: &[Vec2; 4]) -> bool {
    let mut inside = false;
    let mut j = corners.len() - 1;
    for i in 0..corners.len() {
        let (ci, cj) = (corners[i], corners[j]);
        if (ci.y > p.y) != (cj.y > p.y) && p.x < (cj.x - ci.x) * (p.y - ci.y) / (cj.y - ci.y) + ci.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
