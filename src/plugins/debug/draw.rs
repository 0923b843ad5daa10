use bevy::prelude::*;
use bevy_prototype_debug_lines::DebugLines;

use crate::plugins::{
    game::SimulationTick,
    portal::PortalSlot,
    portal_gun::{projectile_color, PortalGun, PortalGunConfig},
};

/// Line segments showing where each traveling projectile is headed. The first segment of a slot
/// is the one its next tick will raycast, the second runs on to the aimed point.
pub fn projectile_segments(gun: &PortalGun, config: &PortalGunConfig, dt: f32) -> Vec<(Vec3, Vec3, Color)> {
    let mut segments = Vec::new();
    for slot in PortalSlot::ALL {
        let projectile = gun.projectile(slot);
        if projectile.is_idle() {
            continue;
        }
        let ray = &projectile.ray;
        let step_end = ray.point_at(config.projectile_speed * dt + config.step_epsilon);
        segments.push((ray.origin, step_end, Color::WHITE));

        let remaining = projectile.max_distance - projectile.distance;
        if remaining > 0. {
            segments.push((ray.origin, ray.point_at(remaining), projectile_color(slot)));
        }
    }
    segments
}

pub fn draw_projectiles(
    guns: Query<&PortalGun>,
    config: Res<PortalGunConfig>,
    tick: Res<SimulationTick>,
    mut lines: ResMut<DebugLines>,
) {
    for gun in &guns {
        for (start, end, color) in projectile_segments(gun, &config, tick.dt) {
            lines.line_colored(start, end, 0., color);
        }
    }
}
