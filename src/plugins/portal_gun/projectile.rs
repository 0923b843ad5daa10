use bevy::prelude::*;

use super::effects::PortalTrail;
use crate::plugins::physics::{Ray, RoomIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileState {
    Idle,
    Traveling { room: RoomIndex },
}

#[derive(Debug, Clone)]
/// Flight state of the projectile fired from one gun slot.
pub struct PortalGunProjectile {
    pub state: ProjectileState,
    /// The origin moves every tick, the direction is fixed when firing.
    pub ray: Ray,
    pub distance: f32,
    /// Distance to the surface the shot was aimed at, only used to fade the visuals.
    pub max_distance: f32,
    /// From the ray origin to the gun muzzle, at the time of firing.
    pub effect_offset: Vec3,
    /// Player up vector at the time of firing, the portal is oriented after it.
    pub player_up: Vec3,
    pub trail: PortalTrail,
}

impl PortalGunProjectile {
    pub fn new(trail: PortalTrail) -> PortalGunProjectile {
        PortalGunProjectile {
            state: ProjectileState::Idle,
            ray: Ray::new(Vec3::ZERO, Vec3::NEG_Z),
            distance: 0.,
            max_distance: 0.,
            effect_offset: Vec3::ZERO,
            player_up: Vec3::Y,
            trail,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == ProjectileState::Idle
    }

    pub fn room(&self) -> Option<RoomIndex> {
        match self.state {
            ProjectileState::Idle => None,
            ProjectileState::Traveling { room } => Some(room),
        }
    }

    /// Start a new flight, dropping whatever flight was in progress.
    pub fn launch(
        &mut self,
        ray: Ray,
        room: RoomIndex,
        player_up: Vec3,
        max_distance: f32,
        effect_offset: Vec3,
    ) {
        self.state = ProjectileState::Traveling { room };
        self.ray = ray;
        self.player_up = player_up;
        self.distance = 0.;
        self.max_distance = max_distance.max(0.);
        self.effect_offset = effect_offset;
    }

    pub fn advance(&mut self, step: f32) {
        self.ray.origin += self.ray.direction * step;
        self.distance += step;
    }
}
