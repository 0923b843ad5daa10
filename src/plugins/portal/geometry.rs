use bevy::prelude::*;

use crate::util::math::project_on_plane;

/// Half size of a portal opening: 1 m wide, 2 m tall.
pub const PORTAL_HALF_EXTENTS: Vec2 = Vec2::new(0.5, 1.);
/// Distance kept between the portal and the surface it lies on, to prevent Z fighting.
pub const Z_FIGHTING_OFFSET: f32 = 0.001;
/// Height above the surface from which the edge probes are cast.
const PROBE_LIFT: f32 = 0.05;
/// Remaining overlap with an obstacle under which a portal is still considered to fit.
const FIT_TOLERANCE: f32 = 0.01;

/// Orientation of a portal lying on a surface of normal `normal`.
///
/// The portal faces away from the surface. Its up axis follows `up_hint` projected on the
/// surface, or the shot direction when the hint is perpendicular to the surface (floors and
/// ceilings shot while looking straight ahead). Returns `None` for degenerate input, like the zero
/// normal of a synthesized hit.
pub fn portal_orientation(normal: Vec3, up_hint: Vec3, shot_direction: Vec3) -> Option<Quat> {
    const MIN_LENGTH: f32 = 1e-3;

    let normal = normal.try_normalize()?;
    let up = [up_hint, shot_direction]
        .into_iter()
        .map(|v| project_on_plane(v, normal))
        .find(|v| v.length() > MIN_LENGTH)?
        .normalize();
    // Looking into the surface keeps the portal's back() along the normal
    Some(Transform::IDENTITY.looking_at(-normal, up).rotation)
}

pub fn location_from_impact(point: Vec3, normal: Vec3, rotation: Quat) -> Transform {
    Transform {
        translation: point + normal * Z_FIGHTING_OFFSET,
        rotation,
        ..default()
    }
}

/// Slide a portal centered on `base_location` away from obstacles overlapping its edges.
///
/// `cast` returns the distance to the nearest obstacle from a point along a direction, if one is
/// closer than the given maximum. Returns `None` when the portal does not fit even after the
/// correction.
pub fn adjust_portal_origin_to_obstacles(
    base_location: Vec3,
    normal: Vec3,
    rotation: Quat,
    cast: impl Fn(Vec3, Vec3, f32) -> Option<f32>,
) -> Option<Vec3> {
    let up = rotation * Vec3::Y;
    let right = rotation * Vec3::X;
    let lift = normal * PROBE_LIFT;

    let mut corrected = base_location;
    for (axis, extent) in [(up, PORTAL_HALF_EXTENTS.y), (right, PORTAL_HALF_EXTENTS.x)] {
        if let Some(distance) = cast(corrected + lift, -axis, extent) {
            corrected += axis * (extent - distance);
        } else if let Some(distance) = cast(corrected + lift, axis, extent) {
            corrected -= axis * (extent - distance);
        }
    }

    let fits = [up, -up, right, -right].into_iter().all(|direction| {
        let extent = if direction.dot(up).abs() > 0.5 {
            PORTAL_HALF_EXTENTS.y
        } else {
            PORTAL_HALF_EXTENTS.x
        };
        cast(corrected + lift, direction, extent - FIT_TOLERANCE).is_none()
    });
    fits.then_some(corrected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_portal_keeps_player_up() {
        let rotation = portal_orientation(Vec3::Z, Vec3::Y, Vec3::NEG_Z).unwrap();
        assert!((rotation * Vec3::Y).abs_diff_eq(Vec3::Y, 1e-5));
        assert!((rotation * Vec3::Z).abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn floor_portal_uses_shot_direction() {
        let shot = Vec3::new(0., -1., -1.).normalize();
        // Up hint perpendicular to the floor: fall back to the shot direction
        let rotation = portal_orientation(Vec3::Y, Vec3::Y, shot).unwrap();
        assert!((rotation * Vec3::Y).abs_diff_eq(Vec3::NEG_Z, 1e-5));
        assert!((rotation * Vec3::Z).abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn tilted_up_hint_is_projected_on_the_surface() {
        let hint = Vec3::new(0., 1., 1.).normalize();
        let rotation = portal_orientation(Vec3::Z, hint, Vec3::NEG_Z).unwrap();
        assert!((rotation * Vec3::Y).abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn synthesized_hit_has_no_orientation() {
        assert!(portal_orientation(Vec3::ZERO, Vec3::Y, Vec3::NEG_Z).is_none());
        assert!(portal_orientation(Vec3::Y, Vec3::Y, Vec3::Y).is_none());
    }

    #[test]
    fn portal_near_floor_is_pushed_up() {
        // Wall facing +Z, floor at y = 0, shot landing 0.4 m above the floor
        let rotation = portal_orientation(Vec3::Z, Vec3::Y, Vec3::NEG_Z).unwrap();
        let floor = |origin: Vec3, direction: Vec3, max: f32| {
            if direction.y < -0.5 && origin.y < max {
                Some(origin.y)
            } else {
                None
            }
        };
        let corrected =
            adjust_portal_origin_to_obstacles(Vec3::new(0., 0.4, 0.), Vec3::Z, rotation, floor)
                .unwrap();
        assert!((corrected.y - PORTAL_HALF_EXTENTS.y).abs() < 1e-5);
        assert_eq!(corrected.x, 0.);
    }

    #[test]
    fn portal_in_narrow_gap_does_not_fit() {
        let rotation = portal_orientation(Vec3::Z, Vec3::Y, Vec3::NEG_Z).unwrap();
        // Floor and ceiling 1 m apart, too low for a 2 m portal
        let corridor = |origin: Vec3, direction: Vec3, max: f32| {
            let distance = if direction.y < -0.5 {
                origin.y
            } else if direction.y > 0.5 {
                1. - origin.y
            } else {
                return None;
            };
            (distance < max).then_some(distance)
        };
        assert!(adjust_portal_origin_to_obstacles(
            Vec3::new(0., 0.5, 0.),
            Vec3::Z,
            rotation,
            corridor
        )
        .is_none());
    }

    #[test]
    fn open_space_needs_no_correction() {
        let rotation = portal_orientation(Vec3::X, Vec3::Y, Vec3::NEG_X).unwrap();
        let base = Vec3::new(1., 2., 3.);
        let corrected =
            adjust_portal_origin_to_obstacles(base, Vec3::X, rotation, |_, _, _| None).unwrap();
        assert_eq!(corrected, base);
    }
}
