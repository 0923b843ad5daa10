use bevy::{prelude::*, reflect::FromReflect};
use bevy_rapier3d::prelude::Velocity;

#[derive(Debug, Default, Component, Reflect, FromReflect)]
#[reflect(Component)]
/// Marker for props the player can pick up.
pub struct Grabbable;

/// Soft position/orientation constraint on a physics body.
///
/// Both operations return `false` when `target` no longer refers to a live body.
pub trait PointConstraint {
    fn move_to_point(&mut self, target: Entity, point: Vec3, max_rate: f32) -> bool;
    fn rotate_to(&mut self, target: Entity, rotation: Quat, max_rate: f32) -> bool;
}

/// Velocity which brings `current` to `target` in one step of `dt`, capped at `max_speed`.
pub fn velocity_towards_point(current: Vec3, target: Vec3, max_speed: f32, dt: f32) -> Vec3 {
    ((target - current) / dt).clamp_length_max(max_speed)
}

/// Angular velocity which brings `current` to `target` in one step of `dt`, capped at
/// `max_rate` radians per second.
pub fn angular_velocity_towards(current: Quat, target: Quat, max_rate: f32, dt: f32) -> Vec3 {
    const MIN_ANGLE: f32 = 1e-4;

    let mut delta = target * current.inverse();
    // Take the short way around
    if delta.w < 0. {
        delta = -delta;
    }
    let (axis, angle) = delta.to_axis_angle();
    if angle.abs() < MIN_ANGLE {
        return Vec3::ZERO;
    }
    (axis * angle / dt).clamp_length_max(max_rate)
}

/// [`PointConstraint`] driving the velocity of grabbable Rapier bodies.
pub struct VelocityConstraints<'a, 'w, 's> {
    pub bodies: &'a mut Query<'w, 's, (&'static Transform, &'static mut Velocity), With<Grabbable>>,
    pub dt: f32,
}

impl PointConstraint for VelocityConstraints<'_, '_, '_> {
    fn move_to_point(&mut self, target: Entity, point: Vec3, max_rate: f32) -> bool {
        match self.bodies.get_mut(target) {
            Ok((transform, mut velocity)) => {
                velocity.linvel =
                    velocity_towards_point(transform.translation, point, max_rate, self.dt);
                true
            }
            Err(_) => false,
        }
    }

    fn rotate_to(&mut self, target: Entity, rotation: Quat, max_rate: f32) -> bool {
        match self.bodies.get_mut(target) {
            Ok((transform, mut velocity)) => {
                velocity.angvel =
                    angular_velocity_towards(transform.rotation, rotation, max_rate, self.dt);
                true
            }
            Err(_) => false,
        }
    }
}
