use std::f32::consts::FRAC_PI_4;

use bevy::{prelude::*, render::camera::CameraProjection};

/// Perspective projection for the camera drawing the held gun, with a near plane short enough
/// that the gun doesn't get clipped.
#[derive(Debug, Component, Clone, Reflect)]
#[reflect(Component)]
pub struct ViewModelProjection {
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ViewModelProjection {
    fn default() -> Self {
        ViewModelProjection {
            fov: FRAC_PI_4,
            aspect_ratio: 16. / 9.,
            near: 0.05,
            far: 10.,
        }
    }
}

impl CameraProjection for ViewModelProjection {
    fn get_projection_matrix(&self) -> Mat4 {
        Mat4::perspective_infinite_reverse_rh(self.fov, self.aspect_ratio, self.near)
    }

    fn update(&mut self, width: f32, height: f32) {
        if height > 0. {
            self.aspect_ratio = width / height;
        }
    }

    fn far(&self) -> f32 {
        self.far
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_plane_maps_to_depth_one() {
        let projection = ViewModelProjection {
            near: 0.05,
            ..default()
        };
        let clip = projection.get_projection_matrix() * Vec4::new(0., 0., -0.05, 1.);
        assert!((clip.z / clip.w - 1.).abs() < 1e-5);
    }

    #[test]
    fn resizing_keeps_aspect_ratio_finite() {
        let mut projection = ViewModelProjection::default();
        projection.update(1280., 720.);
        assert!((projection.aspect_ratio - 16. / 9.).abs() < 1e-6);
        projection.update(1280., 0.);
        assert!((projection.aspect_ratio - 16. / 9.).abs() < 1e-6);
    }
}
