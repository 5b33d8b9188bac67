//! Camera system for 3D visualization

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

/// Camera uniform for GPU
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub right: [f32; 3],
    pub point_size: f32,
    pub up: [f32; 3],
    pub _padding: f32,
}

/// Orbit camera around `target`
pub struct Camera {
    pub distance: f32,
    pub rotation: Quat,
    pub target: Vec3,
    pub aspect: f32,
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub const MIN_DISTANCE: f32 = 0.05;
    pub const MAX_DISTANCE: f32 = 1000.0;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            distance: 4.0,
            rotation: Quat::from_rotation_x(-0.4),
            target: Vec3::ZERO,
            aspect: width as f32 / height.max(1) as f32,
            fovy: 45.0_f32.to_radians(),
            znear: 0.01,
            zfar: 10000.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.target + self.rotation * Vec3::new(0.0, 0.0, self.distance)
    }

    pub fn rotate(&mut self, delta_x: f32, delta_y: f32) {
        let up = self.rotation * Vec3::Y;
        let yaw_rotation = Quat::from_axis_angle(up, -delta_x);

        let right = self.rotation * Vec3::X;
        let pitch_rotation = Quat::from_axis_angle(right, -delta_y);

        self.rotation = (yaw_rotation * pitch_rotation * self.rotation).normalize();
    }

    /// Multiplicative so zoom feels the same at every scale
    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance * (1.0 - delta * 0.1))
            .clamp(Self::MIN_DISTANCE, Self::MAX_DISTANCE);
    }

    pub fn build_view_projection_matrix(&self) -> Mat4 {
        let view = Mat4::from_quat(self.rotation.conjugate())
            * Mat4::from_translation(-self.position());
        let proj = Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar);
        proj * view
    }

    pub fn to_uniform(&self, point_size: f32) -> CameraUniform {
        CameraUniform {
            view_proj: self.build_view_projection_matrix().to_cols_array_2d(),
            right: (self.rotation * Vec3::X).to_array(),
            point_size,
            up: (self.rotation * Vec3::Y).to_array(),
            _padding: 0.0,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }
}
