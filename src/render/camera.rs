use crate::render::pick::Ray;
use glam::{Mat4, Vec2, Vec3};

const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 1000.0;
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Orbit camera: eye sits on a sphere of radius `distance` around `target`.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    pub fov_y_deg: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    home: (Vec3, f32, f32, f32),
}

impl OrbitCamera {
    pub fn new(position: Vec3, target: Vec3, fov_y_deg: f32) -> Self {
        let offset = position - target;
        let distance = offset.length().max(1e-3);
        let (yaw, pitch) = offset_to_yaw_pitch(offset);
        let mut camera = Self {
            target,
            yaw,
            pitch,
            distance,
            fov_y_deg,
            min_distance: 0.0,
            max_distance: f32::MAX,
            home: (target, yaw, pitch, distance),
        };
        camera.pitch = camera.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        camera.home = (camera.target, camera.yaw, camera.pitch, camera.distance);
        camera
    }

    pub fn with_distance_limits(mut self, min_distance: f32, max_distance: f32) -> Self {
        self.min_distance = min_distance.max(0.0);
        self.max_distance = max_distance.max(self.min_distance);
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);
        self.home.3 = self.distance;
        self
    }

    pub fn eye(&self) -> Vec3 {
        self.target + yaw_pitch_to_offset(self.yaw, self.pitch) * self.distance
    }

    /// (forward, right, up), forward pointing from the eye toward the target.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        camera_basis(self.yaw, self.pitch)
    }

    pub fn orbit(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw = wrap_angle(self.yaw + yaw_delta);
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Multiplies the orbit distance; `factor < 1` moves closer.
    pub fn zoom(&mut self, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        self.distance = (self.distance * factor).clamp(self.min_distance, self.max_distance);
    }

    /// Pans target and eye together by a screen-space delta in pixels.
    pub fn pan(&mut self, delta_px: Vec2, viewport_height: f32) {
        if viewport_height <= 0.0 {
            return;
        }
        let world_per_px =
            2.0 * self.distance * (self.fov_y_deg.to_radians() * 0.5).tan() / viewport_height;
        let (_, right, up) = self.basis();
        self.target += (-right * delta_px.x + up * delta_px.y) * world_per_px;
    }

    pub fn reset(&mut self) {
        let (target, yaw, pitch, distance) = self.home;
        self.target = target;
        self.yaw = yaw;
        self.pitch = pitch;
        self.distance = distance;
    }

    pub fn view_matrix(&self) -> Mat4 {
        let (_, _, up) = self.basis();
        Mat4::look_at_rh(self.eye(), self.target, up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            aspect.max(1e-3),
            NEAR_PLANE,
            FAR_PLANE,
        )
    }

    pub fn view_projection(&self, viewport: Vec2) -> Mat4 {
        self.projection_matrix(viewport.x / viewport.y.max(1.0)) * self.view_matrix()
    }

    /// World-space ray through a pixel (origin top-left).
    pub fn screen_ray(&self, pixel: Vec2, viewport: Vec2) -> Ray {
        let ndc = Vec2::new(
            2.0 * pixel.x / viewport.x.max(1.0) - 1.0,
            1.0 - 2.0 * pixel.y / viewport.y.max(1.0),
        );
        let inverse = self.view_projection(viewport).inverse();
        let near = inverse.project_point3(ndc.extend(0.0));
        let far = inverse.project_point3(ndc.extend(1.0));
        Ray::new(near, far - near)
    }

    /// Projects a world point to pixels; `z` of the result is the view
    /// depth. `None` when the point lies behind the near plane.
    pub fn project(&self, point: Vec3, viewport: Vec2) -> Option<Vec3> {
        let clip = self.view_projection(viewport) * point.extend(1.0);
        if clip.w <= NEAR_PLANE {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec3::new(
            (ndc.x + 1.0) * 0.5 * viewport.x,
            (1.0 - ndc.y) * 0.5 * viewport.y,
            clip.w,
        ))
    }
}

fn yaw_pitch_to_offset(yaw: f32, pitch: f32) -> Vec3 {
    let cos_pitch = pitch.cos();
    Vec3::new(yaw.sin() * cos_pitch, pitch.sin(), yaw.cos() * cos_pitch)
}

fn offset_to_yaw_pitch(offset: Vec3) -> (f32, f32) {
    let dir = offset.normalize_or_zero();
    if dir == Vec3::ZERO {
        return (0.0, 0.0);
    }
    (dir.x.atan2(dir.z), dir.y.clamp(-1.0, 1.0).asin())
}

fn camera_basis(yaw: f32, pitch: f32) -> (Vec3, Vec3, Vec3) {
    let forward = -yaw_pitch_to_offset(yaw, pitch);
    let right = Vec3::new(yaw.cos(), 0.0, -yaw.sin());
    let up = right.cross(forward).normalize_or_zero();
    (forward, right, up)
}

fn wrap_angle(angle: f32) -> f32 {
    const TWO_PI: f32 = std::f32::consts::PI * 2.0;
    if angle.is_finite() {
        (angle + std::f32::consts::PI).rem_euclid(TWO_PI) - std::f32::consts::PI
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::OrbitCamera;
    use glam::{Vec2, Vec3};

    fn default_camera() -> OrbitCamera {
        OrbitCamera::new(Vec3::new(0.0, 0.0, 8.0), Vec3::ZERO, 45.0).with_distance_limits(3.0, 50.0)
    }

    #[test]
    fn new_reproduces_the_starting_eye() {
        let camera = default_camera();
        assert!((camera.eye() - Vec3::new(0.0, 0.0, 8.0)).length() < 1e-5);
        let (forward, right, up) = camera.basis();
        assert!((forward - Vec3::NEG_Z).length() < 1e-5);
        assert!((right - Vec3::X).length() < 1e-5);
        assert!((up - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn zoom_is_clamped_to_limits() {
        let mut camera = default_camera();
        camera.zoom(0.01);
        assert!((camera.distance - 3.0).abs() < 1e-6);
        camera.zoom(1000.0);
        assert!((camera.distance - 50.0).abs() < 1e-6);
        camera.zoom(-1.0);
        assert!((camera.distance - 50.0).abs() < 1e-6);
    }

    #[test]
    fn orbit_keeps_pitch_away_from_poles() {
        let mut camera = default_camera();
        camera.orbit(0.3, 10.0);
        assert!(camera.pitch < std::f32::consts::FRAC_PI_2);
        assert!(camera.eye().is_finite());
        assert!((camera.eye().length() - 8.0).abs() < 1e-4);
    }

    #[test]
    fn reset_restores_home_pose() {
        let mut camera = default_camera();
        camera.orbit(1.0, 0.5);
        camera.zoom(2.0);
        camera.pan(Vec2::new(40.0, -10.0), 720.0);
        camera.reset();
        assert!((camera.eye() - Vec3::new(0.0, 0.0, 8.0)).length() < 1e-5);
        assert_eq!(camera.target, Vec3::ZERO);
    }

    #[test]
    fn center_ray_points_at_target_and_projects_back() {
        let camera = default_camera();
        let viewport = Vec2::new(1280.0, 720.0);
        let ray = camera.screen_ray(viewport * 0.5, viewport);
        assert!((ray.dir - Vec3::NEG_Z).length() < 1e-4);

        let projected = camera.project(Vec3::ZERO, viewport).unwrap();
        assert!((projected.x - 640.0).abs() < 1e-2);
        assert!((projected.y - 360.0).abs() < 1e-2);
        assert!(camera.project(Vec3::new(0.0, 0.0, 20.0), viewport).is_none());
    }

    #[test]
    fn pan_moves_target_sideways() {
        let mut camera = default_camera();
        camera.pan(Vec2::new(-100.0, 0.0), 720.0);
        assert!(camera.target.x > 0.0);
        assert!(camera.target.y.abs() < 1e-6);
    }
}
