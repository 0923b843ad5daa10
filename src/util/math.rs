use bevy::prelude::*;

/// Move `current` towards `target` by at most `max_delta`.
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + (target - current).signum() * max_delta
    }
}

/// Move `current` towards `target` by at most `max_delta` along the straight line between them.
pub fn move_towards_vec3(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let delta = target - current;
    let distance = delta.length();
    if distance <= max_delta || distance == 0. {
        target
    } else {
        current + delta / distance * max_delta
    }
}

/// Project `v` on the horizontal plane and normalize it.
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0., v.z).normalize_or_zero()
}

/// Component of `v` lying in the plane of normal `normal`.
pub fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}
