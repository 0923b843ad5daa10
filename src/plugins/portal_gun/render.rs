//! Projection of the gun state into draw requests. Nothing here mutates the simulation.

use bevy::prelude::*;

use super::{
    gun::{PortalGun, PortalGunConfig},
    projectile::PortalGunProjectile,
};
use crate::plugins::portal::PortalSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerLook {
    /// Drawn opaque while the projectile has not moved yet.
    MuzzleFlash,
    Glow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderCommand {
    Trail {
        slot: PortalSlot,
        from: Vec3,
        to: Vec3,
        alpha: f32,
    },
    Marker {
        slot: PortalSlot,
        transform: Transform,
        color: Color,
        look: MarkerLook,
    },
    /// Switch the view model camera to a near plane suitable for held objects.
    NearPlane { near: f32 },
    Gun { transform: Transform },
}

pub trait RenderSink {
    fn submit(&mut self, command: RenderCommand);
}

impl RenderSink for Vec<RenderCommand> {
    fn submit(&mut self, command: RenderCommand) {
        self.push(command);
    }
}

pub fn projectile_color(slot: PortalSlot) -> Color {
    match slot {
        PortalSlot::First => Color::rgb_u8(200, 100, 50),
        PortalSlot::Second => Color::rgb_u8(50, 70, 200),
    }
}

/// Opacity of a projectile marker, ramping up to 1 over `fade_distance`.
pub fn projectile_opacity(distance: f32, fade_distance: f32) -> f32 {
    if fade_distance <= 0. {
        return 1.;
    }
    (distance / fade_distance).clamp(0., 1.)
}

/// The marker starts at the muzzle and converges on the projectile ray as it approaches its target.
pub fn marker_position(projectile: &PortalGunProjectile) -> Vec3 {
    if projectile.distance < projectile.max_distance {
        projectile.ray.origin
            + projectile.effect_offset * (1. - projectile.distance / projectile.max_distance)
    } else {
        projectile.ray.origin
    }
}

/// Emit the draw requests for the gun and its projectiles. Markers face the viewer.
pub fn render_portal_gun(
    gun: &PortalGun,
    view_rotation: Quat,
    config: &PortalGunConfig,
    sink: &mut impl RenderSink,
) {
    for slot in PortalSlot::ALL {
        let projectile = gun.projectile(slot);

        if let Some((from, to, alpha)) = projectile.trail.segment() {
            sink.submit(RenderCommand::Trail {
                slot,
                from,
                to,
                alpha,
            });
        }

        if projectile.is_idle() {
            continue;
        }

        let mut color = projectile_color(slot);
        // The flash is drawn opaque, only the glow fades in
        let look = if projectile.distance == 0. {
            MarkerLook::MuzzleFlash
        } else {
            color.set_a(projectile_opacity(projectile.distance, config.fade_distance));
            MarkerLook::Glow
        };
        sink.submit(RenderCommand::Marker {
            slot,
            transform: Transform {
                translation: marker_position(projectile),
                rotation: view_rotation,
                scale: Vec3::splat(config.projectile_radius),
            },
            color,
            look,
        });
    }

    if gun.visible {
        sink.submit(RenderCommand::NearPlane {
            near: config.near_plane,
        });
        sink.submit(RenderCommand::Gun {
            transform: Transform {
                scale: Vec3::ONE,
                ..gun.transform
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{
        first_person_controller::PlayerFlags,
        physics::{Ray, RoomIndex},
        portal_gun::gun::tests::{RecordedSplashes, ScriptedOpener, Wall, DT},
    };

    fn shot() -> Ray {
        Ray::new(Vec3::new(0., 1.2, 0.), Vec3::NEG_Z)
    }

    fn markers(commands: &[RenderCommand]) -> Vec<(PortalSlot, Transform, Color, MarkerLook)> {
        commands
            .iter()
            .filter_map(|command| match *command {
                RenderCommand::Marker {
                    slot,
                    transform,
                    color,
                    look,
                } => Some((slot, transform, color, look)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn idle_gun_renders_only_the_gun() {
        let config = PortalGunConfig::default();
        let mut gun = PortalGun::new(Transform::IDENTITY, &config);
        gun.visible = true;
        let mut commands = Vec::new();
        render_portal_gun(&gun, Quat::IDENTITY, &config, &mut commands);
        assert_eq!(
            commands,
            vec![
                RenderCommand::NearPlane {
                    near: config.near_plane
                },
                RenderCommand::Gun {
                    transform: Transform::IDENTITY
                },
            ]
        );
    }

    #[test]
    fn hidden_gun_is_not_drawn() {
        let config = PortalGunConfig::default();
        let gun = PortalGun::new(Transform::IDENTITY, &config);
        let mut commands = Vec::new();
        render_portal_gun(&gun, Quat::IDENTITY, &config, &mut commands);
        assert!(commands.is_empty());
    }

    #[test]
    fn fresh_projectile_is_a_muzzle_flash_at_the_muzzle() {
        let config = PortalGunConfig::default();
        let mut gun = PortalGun::new(Transform::from_xyz(0.2, 1., -0.3), &config);
        gun.fire(PortalSlot::First, &shot(), Vec3::Y, RoomIndex(0), &config, &Wall::at(-8.));

        let view = Quat::from_rotation_y(0.3);
        let mut commands = Vec::new();
        render_portal_gun(&gun, view, &config, &mut commands);

        let markers = markers(&commands);
        assert_eq!(markers.len(), 1);
        let (slot, transform, color, look) = markers[0];
        assert_eq!(slot, PortalSlot::First);
        assert_eq!(look, MarkerLook::MuzzleFlash);
        assert_eq!(color.a(), 1.);
        assert_eq!(transform.rotation, view);
        assert_eq!(transform.scale, Vec3::splat(config.projectile_radius));
        assert!(transform
            .translation
            .abs_diff_eq(gun.muzzle_position(&config), 1e-5));
        assert!(commands
            .iter()
            .any(|command| matches!(command, RenderCommand::Trail { slot: PortalSlot::First, .. })));
    }

    #[test]
    fn marker_fades_in_and_converges_on_the_ray() {
        let config = PortalGunConfig::default();
        let wall = Wall::at(-8.);
        let mut gun = PortalGun::new(Transform::from_xyz(0.2, 1., -0.3), &config);
        gun.fire(PortalSlot::Second, &shot(), Vec3::Y, RoomIndex(0), &config, &wall);
        gun.update(
            &mut PlayerFlags::empty(),
            DT,
            &config,
            &wall,
            &mut ScriptedOpener::new(true),
            &mut RecordedSplashes::default(),
        );

        let projectile = gun.projectile(PortalSlot::Second);
        let mut commands = Vec::new();
        render_portal_gun(&gun, Quat::IDENTITY, &config, &mut commands);
        let (_, transform, color, look) = markers(&commands)[0];

        assert_eq!(look, MarkerLook::Glow);
        let expected_alpha = projectile.distance / config.fade_distance;
        assert!((color.a() - expected_alpha).abs() < 1e-5);
        let expected_position = projectile.ray.origin
            + projectile.effect_offset * (1. - projectile.distance / projectile.max_distance);
        assert!(transform.translation.abs_diff_eq(expected_position, 1e-5));
    }

    #[test]
    fn opacity_saturates_at_no_hit_distance() {
        let config = PortalGunConfig::default();
        let mut gun = PortalGun::new(Transform::IDENTITY, &config);
        gun.fire(PortalSlot::First, &shot(), Vec3::Y, RoomIndex(0), &config, &Wall::empty());
        let projectile = gun.projectile(PortalSlot::First);
        assert_eq!(projectile.max_distance, config.no_hit_distance);
        assert_eq!(projectile_opacity(projectile.max_distance, config.fade_distance), 1.);
        assert_eq!(projectile_opacity(config.fade_distance * 0.5, config.fade_distance), 0.5);
    }

    #[test]
    fn marker_sits_on_the_ray_past_max_distance() {
        let config = PortalGunConfig::default();
        let mut projectile = PortalGun::new(Transform::IDENTITY, &config).projectiles[0].clone();
        projectile.launch(shot(), RoomIndex(0), Vec3::Y, 1., Vec3::ONE);
        projectile.advance(2.);
        assert_eq!(marker_position(&projectile), projectile.ray.origin);
    }

    #[test]
    fn rendering_leaves_the_gun_untouched() {
        let config = PortalGunConfig::default();
        let mut gun = PortalGun::new(Transform::IDENTITY, &config);
        gun.fire(PortalSlot::First, &shot(), Vec3::Y, RoomIndex(0), &config, &Wall::at(-4.));
        let before = format!("{:?}", gun);
        render_portal_gun(&gun, Quat::IDENTITY, &config, &mut Vec::new());
        assert_eq!(format!("{:?}", gun), before);
    }
}
