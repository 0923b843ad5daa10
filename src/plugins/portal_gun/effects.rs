//! Fire and forget visual effects: the projectile trail and the splash shown when a portal could
//! not be opened.

use bevy::{ecs::system::SystemParam, prelude::*};

use crate::plugins::portal::PortalSlot;

use super::PortalGunAssets;

#[derive(Debug, Clone, Default, PartialEq)]
/// Streak drawn from the gun muzzle to the aimed point, fading out over its lifetime.
pub struct PortalTrail {
    from: Vec3,
    to: Vec3,
    age: f32,
    lifetime: f32,
    active: bool,
}

impl PortalTrail {
    pub fn new(lifetime: f32) -> PortalTrail {
        PortalTrail {
            lifetime,
            ..default()
        }
    }

    pub fn play(&mut self, from: Vec3, to: Vec3) {
        self.from = from;
        self.to = to;
        self.age = 0.;
        self.active = true;
    }

    pub fn update(&mut self, dt: f32) {
        if !self.active {
            return;
        }
        self.age += dt;
        if self.age >= self.lifetime {
            self.active = false;
        }
    }

    /// The visible segment and its opacity, if the trail is playing.
    pub fn segment(&self) -> Option<(Vec3, Vec3, f32)> {
        if !self.active {
            return None;
        }
        let alpha = if self.lifetime > 0. {
            (1. - self.age / self.lifetime).clamp(0., 1.)
        } else {
            1.
        };
        Some((self.from, self.to, alpha))
    }
}

/// Sink for the splash played when a projectile hits a surface without opening a portal.
pub trait SplashEffects {
    fn play_fail_splash(&mut self, slot: PortalSlot, at: Vec3, normal: Vec3);
}

#[derive(Debug, Component)]
pub struct FailSplash {
    timer: Timer,
}

const FAIL_SPLASH_LIFETIME: f32 = 0.3;

/// [`SplashEffects`] spawning short lived flashes.
#[derive(SystemParam)]
pub struct FailSplashSpawner<'w, 's> {
    commands: Commands<'w, 's>,
    assets: Res<'w, PortalGunAssets>,
}

impl<'w, 's> SplashEffects for FailSplashSpawner<'w, 's> {
    fn play_fail_splash(&mut self, slot: PortalSlot, at: Vec3, normal: Vec3) {
        info!("Portal {:?} failed to open at {}", slot, at);
        let mut transform = Transform::from_translation(at + normal * 0.01);
        if let Some(normal) = normal.try_normalize() {
            transform.rotation = Quat::from_rotation_arc(Vec3::Z, normal);
        }
        self.commands.spawn((
            PbrBundle {
                mesh: self.assets.splash_mesh.clone(),
                material: self.assets.splash_materials[slot.index()].clone(),
                transform,
                ..default()
            },
            FailSplash {
                timer: Timer::from_seconds(FAIL_SPLASH_LIFETIME, TimerMode::Once),
            },
            Name::from("Fail splash"),
        ));
    }
}

pub fn expire_fail_splashes(
    mut commands: Commands,
    time: Res<Time>,
    mut splashes: Query<(Entity, &mut FailSplash, &mut Transform)>,
) {
    for (entity, mut splash, mut transform) in &mut splashes {
        splash.timer.tick(time.delta());
        if splash.timer.finished() {
            commands.entity(entity).despawn_recursive();
        } else {
            transform.scale = Vec3::splat(1. + splash.timer.percent());
        }
    }
}
