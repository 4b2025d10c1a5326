use glam::{Mat4, Vec3};

/// A perspective camera for 3D scenes.
///
/// Position and orientation are stored as vectors rather than a matrix so the
/// transition controller can interpolate them directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Width / height of the image this camera renders into.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            fov: 75f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.look_at(target);
        self
    }

    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    /// Point the camera at `target`. Keeps the current forward if the target
    /// coincides with the camera position.
    pub fn look_at(&mut self, target: Vec3) {
        self.forward = (target - self.position).normalize_or(self.forward);
    }

    /// Sets the aspect ratio from pixel dimensions. Zero-height sizes are ignored.
    pub fn set_aspect_from_size(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// A point one unit ahead of the camera, used as its look target.
    pub fn target(&self) -> Vec3 {
        self.position + self.forward
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_at_normalizes_forward() {
        let camera = Camera::new()
            .at(Vec3::new(0.0, 0.0, 10.0))
            .looking_at(Vec3::ZERO);
        assert!((camera.forward - Vec3::NEG_Z).length() < 1e-5);
        assert!((camera.target() - Vec3::new(0.0, 0.0, 9.0)).length() < 1e-5);
    }

    #[test]
    fn look_at_self_keeps_forward() {
        let mut camera = Camera::new().at(Vec3::ONE);
        let before = camera.forward;
        camera.look_at(Vec3::ONE);
        assert_eq!(camera.forward, before);
    }

    #[test]
    fn aspect_ignores_zero_height() {
        let mut camera = Camera::new();
        camera.set_aspect_from_size(512, 256);
        assert_eq!(camera.aspect, 2.0);
        camera.set_aspect_from_size(512, 0);
        assert_eq!(camera.aspect, 2.0);
    }
}
