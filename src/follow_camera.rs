use glam::Vec3;

use crate::camera::Camera;

const MAX_ELEVATION: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// A spherical camera placement around a look target.
///
/// `angle_x` is the horizontal angle measured from +Z towards +X, `angle_y` the
/// elevation above the horizontal plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FollowPose {
    pub target: Vec3,
    pub distance: f32,
    pub angle_x: f32,
    pub angle_y: f32,
}

impl FollowPose {
    /// The pose that places a camera at `position` looking at `target`.
    ///
    /// A camera sitting on its target has no defined direction; it keeps a
    /// zero angle at a minimal distance.
    pub fn from_view(position: Vec3, target: Vec3) -> Self {
        let offset = position - target;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return Self {
                target,
                distance: 0.0,
                angle_x: 0.0,
                angle_y: 0.0,
            };
        }

        Self {
            target,
            distance,
            angle_x: offset.x.atan2(offset.z),
            angle_y: (offset.y / distance).clamp(-1.0, 1.0).asin(),
        }
    }

    /// Offset from the target to the camera.
    pub fn offset(&self) -> Vec3 {
        Vec3::new(
            self.distance * self.angle_y.cos() * self.angle_x.sin(),
            self.distance * self.angle_y.sin(),
            self.distance * self.angle_y.cos() * self.angle_x.cos(),
        )
    }

    pub fn position(&self) -> Vec3 {
        self.target + self.offset()
    }
}

/// Third-person camera that trails a target with damped motion.
///
/// Input writes the `target_*` fields; [`update`](Self::update) eases the
/// current fields towards them. Writing both sets at once, as
/// [`snap_to`](Self::snap_to) does, moves the camera without any easing.
///
/// # Example
/// ```ignore
/// let mut follow = FollowCamera::new().distance(4.0).smoothing(8.0);
///
/// // In frame loop:
/// follow.follow(avatar_position + Vec3::Y);
/// follow.update(dt);
/// follow.apply(&mut camera);
/// ```
#[derive(Clone, Debug)]
pub struct FollowCamera {
    /// Point the camera looks at.
    pub target: Vec3,
    pub distance: f32,
    /// Horizontal angle in radians.
    pub angle_x: f32,
    /// Vertical angle in radians, clamped short of the poles.
    pub angle_y: f32,
    pub target_distance: f32,
    pub target_angle_x: f32,
    pub target_angle_y: f32,
    /// Damping rate; higher values reach the targets faster.
    pub smoothing: f32,
    /// Field of view in radians.
    pub fov: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for FollowCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 5.0,
            angle_x: 0.0,
            angle_y: 0.3,
            target_distance: 5.0,
            target_angle_x: 0.0,
            target_angle_y: 0.3,
            smoothing: 8.0,
            fov: 75f32.to_radians(),
            min_distance: 1.0,
            max_distance: 20.0,
        }
    }
}

impl FollowCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set current and target distance.
    pub fn distance(mut self, distance: f32) -> Self {
        self.distance = distance.clamp(self.min_distance, self.max_distance);
        self.target_distance = self.distance;
        self
    }

    pub fn smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.max(0.0);
        self
    }

    /// Set the field of view in degrees.
    pub fn fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    /// Set distance limits.
    pub fn distance_limits(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min;
        self.max_distance = max;
        self.distance = self.distance.clamp(min, max);
        self.target_distance = self.target_distance.clamp(min, max);
        self
    }

    /// Move the look target, e.g. to the avatar's head each frame.
    pub fn follow(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Rotate the desired placement by the given angles in radians.
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        self.target_angle_x += delta_x;
        self.target_angle_y = (self.target_angle_y + delta_y).clamp(-MAX_ELEVATION, MAX_ELEVATION);
    }

    /// Change the desired distance.
    pub fn zoom(&mut self, delta: f32) {
        self.target_distance =
            (self.target_distance - delta).clamp(self.min_distance, self.max_distance);
    }

    /// Ease the current placement towards the desired one.
    pub fn update(&mut self, dt: f32) {
        let blend = 1.0 - (-self.smoothing * dt.max(0.0)).exp();
        self.distance += (self.target_distance - self.distance) * blend;
        self.angle_x += (self.target_angle_x - self.angle_x) * blend;
        self.angle_y += (self.target_angle_y - self.angle_y) * blend;
    }

    /// Write `pose` into both the current and the desired state.
    ///
    /// The distance is not clamped to the limits here, so a pose taken from an
    /// existing camera is reproduced exactly.
    pub fn snap_to(&mut self, pose: FollowPose) {
        let angle_y = pose.angle_y.clamp(-MAX_ELEVATION, MAX_ELEVATION);
        self.target = pose.target;
        self.distance = pose.distance;
        self.angle_x = pose.angle_x;
        self.angle_y = angle_y;
        self.target_distance = pose.distance;
        self.target_angle_x = pose.angle_x;
        self.target_angle_y = angle_y;
    }

    /// The current placement.
    pub fn pose(&self) -> FollowPose {
        FollowPose {
            target: self.target,
            distance: self.distance,
            angle_x: self.angle_x,
            angle_y: self.angle_y,
        }
    }

    /// Whether the current state has reached the desired one.
    pub fn is_settled(&self) -> bool {
        const EPS: f32 = 1e-4;
        (self.target_distance - self.distance).abs() < EPS
            && (self.target_angle_x - self.angle_x).abs() < EPS
            && (self.target_angle_y - self.angle_y).abs() < EPS
    }

    /// Place `camera` at the current pose, keeping its aspect and clip planes.
    pub fn apply(&self, camera: &mut Camera) {
        let pose = self.pose();
        camera.position = pose.position();
        camera.forward = (self.target - camera.position).normalize_or(camera.forward);
        camera.up = Vec3::Y;
        camera.fov = self.fov;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn from_view_round_trips_position() {
        let target = Vec3::new(0.0, 1.6, 0.0);
        let position = Vec3::new(2.0, 3.0, 5.0);
        let pose = FollowPose::from_view(position, target);
        assert!(close(pose.position(), position));
        assert!((pose.distance - (position - target).length()).abs() < 1e-5);
    }

    #[test]
    fn from_view_angles_match_axes() {
        let behind = FollowPose::from_view(Vec3::new(0.0, 0.0, 4.0), Vec3::ZERO);
        assert_eq!(behind.angle_x, 0.0);
        assert_eq!(behind.angle_y, 0.0);

        let side = FollowPose::from_view(Vec3::new(4.0, 0.0, 0.0), Vec3::ZERO);
        assert!((side.angle_x - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn coincident_view_is_degenerate_not_nan() {
        let pose = FollowPose::from_view(Vec3::ONE, Vec3::ONE);
        assert_eq!(pose.distance, 0.0);
        assert!(!pose.angle_x.is_nan());
    }

    #[test]
    fn snap_leaves_nothing_to_interpolate() {
        let mut follow = FollowCamera::new();
        follow.orbit(1.0, 0.2);
        follow.zoom(-3.0);
        let pose = FollowPose::from_view(Vec3::new(1.0, 2.0, 6.0), Vec3::new(0.0, 1.0, 0.0));

        follow.snap_to(pose);
        assert!(follow.is_settled());
        follow.update(0.5);

        assert_eq!(follow.pose(), pose);
        let mut camera = Camera::new();
        follow.apply(&mut camera);
        assert!(close(camera.position, Vec3::new(1.0, 2.0, 6.0)));
    }

    #[test]
    fn update_eases_towards_targets() {
        let mut follow = FollowCamera::new().distance(5.0).smoothing(4.0);
        follow.zoom(-2.0);
        follow.update(0.1);
        assert!(follow.distance > 5.0 && follow.distance < 7.0);
        for _ in 0..200 {
            follow.update(0.05);
        }
        assert!(follow.is_settled());
    }
}
