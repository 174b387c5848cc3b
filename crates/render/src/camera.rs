use glam::{Mat4, Vec3};

/// View and projection provider driven by the renderer's update.
pub trait Camera {
    fn view_matrix(&self) -> Mat4;
    fn projection_matrix(&self) -> Mat4;

    /// Camera-to-world transform; its translation is the eye position.
    fn inverse_view_matrix(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    fn update(&mut self, _elapsed_seconds: f32) {}
}

/// Movement requested for the next update, each axis in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraMotion {
    pub forward: f32,
    pub right: f32,
    pub up: f32,
}

/// Fly camera with position, yaw, pitch, and projection parameters.
///
/// Input handlers set a motion intent and accumulate mouse look; `update`
/// integrates both with the frame time.
#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub speed: f32,
    pub sensitivity: f32,
    motion: CameraMotion,
    pending_look: (f32, f32),
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 10.0), 45.0, 4.0 / 3.0)
    }
}

impl FlyCamera {
    /// Camera at `position` looking down -Z.
    pub fn new(position: Vec3, fov_degrees: f32, aspect: f32) -> Self {
        Self {
            position,
            yaw: -90.0_f32.to_radians(),
            pitch: 0.0,
            fov: fov_degrees.to_radians(),
            aspect,
            near: 0.1,
            far: 100.0,
            speed: 10.0,
            sensitivity: 0.003,
            motion: CameraMotion::default(),
            pending_look: (0.0, 0.0),
        }
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn set_motion(&mut self, motion: CameraMotion) {
        self.motion = motion;
    }

    pub fn motion(&self) -> CameraMotion {
        self.motion
    }

    /// Queue a mouse delta, applied on the next update.
    pub fn look(&mut self, dx: f32, dy: f32) {
        self.pending_look.0 += dx;
        self.pending_look.1 += dy;
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch -= dy * self.sensitivity;
        self.pitch = self
            .pitch
            .clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

impl Camera for FlyCamera {
    fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    fn update(&mut self, elapsed_seconds: f32) {
        let (dx, dy) = std::mem::take(&mut self.pending_look);
        if dx != 0.0 || dy != 0.0 {
            self.rotate(dx, dy);
        }
        let m = self.motion;
        let direction = self.forward() * m.forward + self.right() * m.right + Vec3::Y * m.up;
        self.position += direction * self.speed * elapsed_seconds;
    }
}
