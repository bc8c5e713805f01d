//! Camera ray generation.

use lux_math::{Camera, Mat4, Ray, Vec3, Vec4};

/// Per-render ray generator built from a camera's inverse matrices.
///
/// Holds no references to the camera, so a render owns its own copy and
/// several renders can run side by side.
#[derive(Debug, Clone, Copy)]
pub struct CameraRays {
    inv_view: Mat4,
    inv_proj: Mat4,
    eye: Vec3,
}

impl CameraRays {
    /// Build from an inverse view (camera → world) and inverse projection
    /// (clip → camera) matrix.
    pub fn from_inverse_matrices(inv_view: Mat4, inv_proj: Mat4) -> Self {
        Self {
            inv_view,
            inv_proj,
            eye: inv_view.transform_point3(Vec3::ZERO),
        }
    }

    pub fn from_camera(camera: &Camera) -> Self {
        Self::from_inverse_matrices(camera.inverse_view_matrix(), camera.inverse_projection_matrix())
    }

    /// Camera position in world space.
    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    /// World-space ray through normalized image coordinates.
    ///
    /// `(0, 0)` is the top-left corner of the image and `(1, 1)` the
    /// bottom-right.
    pub fn ray(&self, u: f32, v: f32) -> Ray {
        let ndc = Vec4::new(2.0 * u - 1.0, 1.0 - 2.0 * v, 0.0, 1.0);

        // Depth 0 is the near plane in glam's right-handed projection
        let near = self.inv_proj * ndc;
        let near = near.truncate() / near.w;

        let target = self.inv_view.transform_point3(near);
        Ray::towards(self.eye, target)
    }
}
