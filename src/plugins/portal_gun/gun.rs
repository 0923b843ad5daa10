use bevy::prelude::*;
use serde::Deserialize;

use super::{
    effects::{PortalTrail, SplashEffects},
    projectile::{PortalGunProjectile, ProjectileState},
};
use crate::plugins::{
    first_person_controller::PlayerFlags,
    physics::{Ray, RaycastHit, RoomIndex, RoomRaycaster, PROJECTILE_GROUPS},
    portal::{OpenPortalRequest, PortalOpener, PortalSlot},
};

#[derive(Debug, Clone, Deserialize, Resource)]
#[serde(default)]
pub struct PortalGunConfig {
    /// In m/s.
    pub projectile_speed: f32,
    /// Added to the per tick raycast so surfaces right at the end of a step are not missed.
    pub step_epsilon: f32,
    /// Range of the aiming raycast done when firing.
    pub fire_distance: f32,
    /// Assumed distance to the target when the aiming raycast finds nothing.
    pub no_hit_distance: f32,
    /// Duration of the recoil animation, in seconds.
    pub recoil_time: f32,
    /// Distance over which the projectile fades in.
    pub fade_distance: f32,
    pub projectile_radius: f32,
    /// Muzzle position in the gun frame.
    pub muzzle_offset: Vec3,
    /// Near plane used to draw the gun, so it doesn't clip into the camera.
    pub near_plane: f32,
    pub trail_lifetime: f32,
}

impl Default for PortalGunConfig {
    fn default() -> Self {
        PortalGunConfig {
            projectile_speed: 50.,
            step_epsilon: 0.1,
            fire_distance: 1_000_000.,
            no_hit_distance: 20.,
            recoil_time: 0.18,
            fade_distance: 5.,
            projectile_radius: 0.15,
            muzzle_offset: Vec3::new(0., 0., -0.154008),
            near_plane: 0.05,
            trail_lifetime: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// A projectile hitting a surface during a gun update.
pub struct ProjectileImpact {
    pub slot: PortalSlot,
    pub hit: RaycastHit,
    pub opened: bool,
}

#[derive(Debug, Clone, Component)]
pub struct PortalGun {
    /// World transform of the gun body.
    pub transform: Transform,
    pub visible: bool,
    /// Seconds of recoil animation left, never negative.
    pub recoil_timer: f32,
    pub projectiles: [PortalGunProjectile; 2],
}

impl PortalGun {
    pub fn new(transform: Transform, config: &PortalGunConfig) -> PortalGun {
        PortalGun {
            transform: Transform {
                scale: Vec3::ONE,
                ..transform
            },
            visible: false,
            recoil_timer: 0.,
            projectiles: [(); 2]
                .map(|_| PortalGunProjectile::new(PortalTrail::new(config.trail_lifetime))),
        }
    }

    pub fn projectile(&self, slot: PortalSlot) -> &PortalGunProjectile {
        &self.projectiles[slot.index()]
    }

    pub fn muzzle_position(&self, config: &PortalGunConfig) -> Vec3 {
        self.transform.transform_point(config.muzzle_offset)
    }

    /// Shoot the projectile of `slot` along `ray`, overwriting any flight in progress.
    ///
    /// Returns the point the shot is aimed at. When nothing is in range, the aim point is
    /// synthesized `no_hit_distance` along the ray.
    pub fn fire(
        &mut self,
        slot: PortalSlot,
        ray: &Ray,
        player_up: Vec3,
        room: RoomIndex,
        config: &PortalGunConfig,
        raycaster: &impl RoomRaycaster,
    ) -> RaycastHit {
        let result = raycaster.raycast(room, ray, PROJECTILE_GROUPS, config.fire_distance);
        let hit = match result.blocking_hit() {
            Some(hit) => *hit,
            None => RaycastHit::synthesized(ray, config.no_hit_distance, room),
        };

        let muzzle = self.muzzle_position(config);
        let projectile = &mut self.projectiles[slot.index()];
        projectile.launch(*ray, room, player_up, hit.distance, muzzle - ray.origin);
        projectile.trail.play(muzzle, hit.point);
        hit
    }

    /// Advance the gun by one tick of `dt` seconds.
    pub fn update(
        &mut self,
        flags: &mut PlayerFlags,
        dt: f32,
        config: &PortalGunConfig,
        raycaster: &impl RoomRaycaster,
        opener: &mut impl PortalOpener,
        splashes: &mut impl SplashEffects,
    ) -> Vec<ProjectileImpact> {
        self.visible =
            flags.intersects(PlayerFlags::HAS_FIRST_GUN.union(PlayerFlags::HAS_SECOND_GUN));

        if flags.contains(PlayerFlags::JUST_FIRED) && self.recoil_timer <= 0. {
            self.recoil_timer = config.recoil_time;
        }
        if self.recoil_timer > 0. {
            self.recoil_timer -= dt;
            if self.recoil_timer <= 0. {
                self.recoil_timer = 0.;
                flags.remove(PlayerFlags::JUST_FIRED);
            }
        }

        let step = config.projectile_speed * dt;
        let mut impacts = Vec::new();
        for slot in PortalSlot::ALL {
            let projectile = &mut self.projectiles[slot.index()];
            projectile.trail.update(dt);

            let room = match projectile.room() {
                Some(room) => room,
                None => continue,
            };

            let result = raycaster.raycast(
                room,
                &projectile.ray,
                PROJECTILE_GROUPS,
                step + config.step_epsilon,
            );
            match result.blocking_hit() {
                Some(hit) => {
                    let opened = opener.try_open_portal(&OpenPortalRequest {
                        ray: projectile.ray,
                        hit: *hit,
                        up_hint: projectile.player_up,
                        slot,
                        room,
                        from_player: true,
                        just_checking: false,
                    });
                    if !opened {
                        splashes.play_fail_splash(slot, hit.point, hit.normal);
                    }
                    projectile.state = ProjectileState::Idle;
                    impacts.push(ProjectileImpact {
                        slot,
                        hit: *hit,
                        opened,
                    });
                }
                None => {
                    projectile.state = ProjectileState::Traveling {
                        room: result.room(),
                    };
                }
            }

            projectile.advance(step);
        }
        impacts
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;

    use bevy_rapier3d::prelude::Group;

    use super::*;
    use crate::plugins::physics::RaycastResult;

    pub const DT: f32 = 1. / 30.;

    /// A single infinite wall, plus an optional boundary switching rooms at a fixed z.
    pub struct Wall {
        /// Plane `z = wall_z`, facing +Z, absent when `None`.
        pub wall_z: Option<f32>,
        pub wall_entity: Entity,
        /// Crossing `z = boundary_z` moves the ray to `to_room`.
        pub boundary: Option<(f32, RoomIndex)>,
        pub queries: RefCell<Vec<(RoomIndex, f32)>>,
    }

    impl Wall {
        pub fn at(z: f32) -> Wall {
            Wall {
                wall_z: Some(z),
                wall_entity: Entity::from_raw(100),
                boundary: None,
                queries: RefCell::new(Vec::new()),
            }
        }

        pub fn empty() -> Wall {
            Wall {
                wall_z: None,
                ..Wall::at(0.)
            }
        }
    }

    impl RoomRaycaster for Wall {
        fn raycast(
            &self,
            room: RoomIndex,
            ray: &Ray,
            _mask: Group,
            max_distance: f32,
        ) -> RaycastResult {
            self.queries.borrow_mut().push((room, max_distance));
            let distance_to = |z: f32| {
                if ray.direction.z.abs() < 1e-6 {
                    return None;
                }
                let t = (z - ray.origin.z) / ray.direction.z;
                (t >= 0. && t <= max_distance).then_some(t)
            };

            if let Some(t) = self.wall_z.and_then(distance_to) {
                return RaycastResult {
                    blocked: true,
                    hit: RaycastHit {
                        normal: Vec3::Z,
                        object: Some(self.wall_entity),
                        ..RaycastHit::synthesized(ray, t, room)
                    },
                };
            }
            let room = match self.boundary {
                Some((z, to)) if distance_to(z).is_some() => to,
                _ => room,
            };
            RaycastResult::miss(ray, max_distance, room, None)
        }
    }

    pub struct ScriptedOpener {
        pub succeed: bool,
        pub requests: Vec<OpenPortalRequest>,
    }

    impl ScriptedOpener {
        pub fn new(succeed: bool) -> ScriptedOpener {
            ScriptedOpener {
                succeed,
                requests: Vec::new(),
            }
        }
    }

    impl PortalOpener for ScriptedOpener {
        fn try_open_portal(&mut self, request: &OpenPortalRequest) -> bool {
            self.requests.push(*request);
            self.succeed
        }
    }

    #[derive(Default)]
    pub struct RecordedSplashes(pub Vec<(PortalSlot, Vec3, Vec3)>);

    impl SplashEffects for RecordedSplashes {
        fn play_fail_splash(&mut self, slot: PortalSlot, at: Vec3, normal: Vec3) {
            self.0.push((slot, at, normal));
        }
    }

    fn gun() -> PortalGun {
        PortalGun::new(Transform::from_xyz(0.2, 1., -0.3), &PortalGunConfig::default())
    }

    fn shot() -> Ray {
        Ray::new(Vec3::new(0., 1.2, 0.), Vec3::NEG_Z)
    }

    fn tick(
        gun: &mut PortalGun,
        flags: &mut PlayerFlags,
        raycaster: &Wall,
        opener: &mut ScriptedOpener,
        splashes: &mut RecordedSplashes,
    ) -> Vec<ProjectileImpact> {
        gun.update(flags, DT, &PortalGunConfig::default(), raycaster, opener, splashes)
    }

    #[test]
    fn wall_hit_sets_max_distance_and_lands_after_expected_ticks() {
        let config = PortalGunConfig::default();
        let wall = Wall::at(-3.);
        let mut gun = gun();
        let hit = gun.fire(PortalSlot::First, &shot(), Vec3::Y, RoomIndex(0), &config, &wall);

        let projectile = gun.projectile(PortalSlot::First);
        assert!((projectile.max_distance - 3.).abs() < 1e-5);
        assert!((hit.distance - 3.).abs() < 1e-5);
        assert_eq!(projectile.distance, 0.);
        assert_eq!(projectile.room(), Some(RoomIndex(0)));

        let expected_ticks = (3. / (config.projectile_speed * DT)).ceil() as usize;
        let mut flags = PlayerFlags::empty();
        let mut opener = ScriptedOpener::new(true);
        let mut splashes = RecordedSplashes::default();
        for i in 1..=expected_ticks {
            assert!(!gun.projectile(PortalSlot::First).is_idle(), "landed early, tick {}", i);
            tick(&mut gun, &mut flags, &wall, &mut opener, &mut splashes);
        }
        assert!(gun.projectile(PortalSlot::First).is_idle());
        assert_eq!(opener.requests.len(), 1);
        assert!(splashes.0.is_empty());
    }

    #[test]
    fn missing_everything_uses_no_hit_distance() {
        let config = PortalGunConfig::default();
        let mut gun = gun();
        let hit = gun.fire(PortalSlot::Second, &shot(), Vec3::Y, RoomIndex(2), &config, &Wall::empty());

        assert_eq!(hit.distance, config.no_hit_distance);
        assert_eq!(hit.normal, Vec3::ZERO);
        assert_eq!(hit.object, None);
        assert_eq!(hit.room, RoomIndex(2));
        assert!(hit.point.abs_diff_eq(shot().point_at(config.no_hit_distance), 1e-5));
        assert_eq!(gun.projectile(PortalSlot::Second).max_distance, config.no_hit_distance);
    }

    #[test]
    fn fire_records_offset_and_up() {
        let config = PortalGunConfig::default();
        let mut gun = gun();
        let up = Vec3::new(0., 0.8, 0.6);
        gun.fire(PortalSlot::First, &shot(), up, RoomIndex(0), &config, &Wall::at(-10.));

        let projectile = gun.projectile(PortalSlot::First);
        assert_eq!(projectile.player_up, up);
        let expected = gun.muzzle_position(&config) - shot().origin;
        assert!(projectile.effect_offset.abs_diff_eq(expected, 1e-6));
        let (from, to, _) = projectile.trail.segment().unwrap();
        assert!(from.abs_diff_eq(gun.muzzle_position(&config), 1e-6));
        assert!(to.abs_diff_eq(Vec3::new(0., 1.2, -10.), 1e-4));
    }

    #[test]
    fn refiring_mid_flight_restarts_the_projectile() {
        let config = PortalGunConfig::default();
        let wall = Wall::at(-30.);
        let mut gun = gun();
        let mut flags = PlayerFlags::empty();
        let mut opener = ScriptedOpener::new(true);
        let mut splashes = RecordedSplashes::default();

        gun.fire(PortalSlot::First, &shot(), Vec3::Y, RoomIndex(0), &config, &wall);
        for _ in 0..3 {
            tick(&mut gun, &mut flags, &wall, &mut opener, &mut splashes);
        }
        assert!(gun.projectile(PortalSlot::First).distance > 0.);

        gun.fire(PortalSlot::First, &shot(), Vec3::Y, RoomIndex(1), &config, &wall);
        let projectile = gun.projectile(PortalSlot::First);
        assert_eq!(projectile.distance, 0.);
        assert_eq!(projectile.room(), Some(RoomIndex(1)));
        assert_eq!(projectile.ray, shot());
        assert!(projectile.max_distance >= 0.);
    }

    #[test]
    fn idle_projectiles_do_not_move() {
        let wall = Wall::at(-3.);
        let mut gun = gun();
        let before = gun.projectiles.clone();
        let mut flags = PlayerFlags::empty();
        let mut opener = ScriptedOpener::new(true);
        let mut splashes = RecordedSplashes::default();
        for _ in 0..10 {
            tick(&mut gun, &mut flags, &wall, &mut opener, &mut splashes);
        }
        for (before, after) in before.iter().zip(&gun.projectiles) {
            assert!(after.is_idle());
            assert_eq!(before.ray, after.ray);
            assert_eq!(before.distance, after.distance);
        }
        assert!(wall.queries.borrow().is_empty());
    }

    #[test]
    fn traveling_projectile_advances_and_follows_rooms() {
        let config = PortalGunConfig::default();
        let step = config.projectile_speed * DT;
        let mut wall = Wall::empty();
        wall.boundary = Some((-2., RoomIndex(4)));
        let mut gun = gun();
        let mut flags = PlayerFlags::empty();
        let mut opener = ScriptedOpener::new(true);
        let mut splashes = RecordedSplashes::default();

        gun.fire(PortalSlot::Second, &shot(), Vec3::Y, RoomIndex(3), &config, &wall);
        let mut previous = 0.;
        for i in 1..=5 {
            tick(&mut gun, &mut flags, &wall, &mut opener, &mut splashes);
            let projectile = gun.projectile(PortalSlot::Second);
            assert!((projectile.distance - previous - step).abs() < 1e-4);
            assert!((projectile.distance - step * i as f32).abs() < 1e-3);
            previous = projectile.distance;
        }
        // queries[0] is the aiming raycast. The boundary sits inside the second step segment,
        // so the third step is the first one cast from the new room.
        let queries = wall.queries.borrow();
        assert_eq!(queries[1].0, RoomIndex(3));
        assert_eq!(queries[2].0, RoomIndex(3));
        assert_eq!(queries[3].0, RoomIndex(4));
        assert_eq!(queries[1].1, step + config.step_epsilon);
        assert_eq!(gun.projectile(PortalSlot::Second).room(), Some(RoomIndex(4)));
        assert!(opener.requests.is_empty());
    }

    #[test]
    fn failed_portal_plays_splash_and_consumes_projectile() {
        let config = PortalGunConfig::default();
        let wall = Wall::at(-1.);
        let mut gun = gun();
        let mut flags = PlayerFlags::empty();
        let mut opener = ScriptedOpener::new(false);
        let mut splashes = RecordedSplashes::default();

        gun.fire(PortalSlot::Second, &shot(), Vec3::X, RoomIndex(0), &config, &wall);
        let impacts = tick(&mut gun, &mut flags, &wall, &mut opener, &mut splashes);

        assert!(gun.projectile(PortalSlot::Second).is_idle());
        assert_eq!(impacts.len(), 1);
        assert!(!impacts[0].opened);
        assert_eq!(splashes.0.len(), 1);
        let (slot, at, normal) = splashes.0[0];
        assert_eq!(slot, PortalSlot::Second);
        assert_eq!(at, impacts[0].hit.point);
        assert_eq!(normal, Vec3::Z);

        let request = opener.requests[0];
        assert_eq!(request.slot, PortalSlot::Second);
        assert_eq!(request.up_hint, Vec3::X);
        assert_eq!(request.room, RoomIndex(0));
        assert!(request.from_player);
        assert!(!request.just_checking);
        assert_eq!(request.hit.object, Some(wall.wall_entity));
    }

    #[test]
    fn successful_portal_plays_no_splash() {
        let config = PortalGunConfig::default();
        let wall = Wall::at(-1.);
        let mut gun = gun();
        let mut flags = PlayerFlags::empty();
        let mut opener = ScriptedOpener::new(true);
        let mut splashes = RecordedSplashes::default();

        gun.fire(PortalSlot::First, &shot(), Vec3::Y, RoomIndex(0), &config, &wall);
        let impacts = tick(&mut gun, &mut flags, &wall, &mut opener, &mut splashes);
        assert!(impacts[0].opened);
        assert!(splashes.0.is_empty());
        assert!(gun.projectile(PortalSlot::First).is_idle());
    }

    #[test]
    fn slots_are_independent() {
        let config = PortalGunConfig::default();
        let near = Wall::at(-1.);
        let mut gun = gun();
        let mut flags = PlayerFlags::empty();
        let mut opener = ScriptedOpener::new(true);
        let mut splashes = RecordedSplashes::default();

        gun.fire(PortalSlot::First, &shot(), Vec3::Y, RoomIndex(0), &config, &near);
        let sideways = Ray::new(Vec3::ZERO, Vec3::X);
        gun.fire(PortalSlot::Second, &sideways, Vec3::Y, RoomIndex(0), &config, &near);
        tick(&mut gun, &mut flags, &near, &mut opener, &mut splashes);

        assert!(gun.projectile(PortalSlot::First).is_idle());
        assert!(!gun.projectile(PortalSlot::Second).is_idle());
    }

    #[test]
    fn recoil_clears_just_fired_once() {
        let config = PortalGunConfig::default();
        let wall = Wall::empty();
        let mut gun = gun();
        let mut flags = PlayerFlags::HAS_FIRST_GUN.union(PlayerFlags::JUST_FIRED);
        let mut opener = ScriptedOpener::new(true);
        let mut splashes = RecordedSplashes::default();

        let mut cleared_at = Vec::new();
        let mut previous = f32::INFINITY;
        for i in 0..60 {
            let had_flag = flags.contains(PlayerFlags::JUST_FIRED);
            tick(&mut gun, &mut flags, &wall, &mut opener, &mut splashes);
            assert!(gun.recoil_timer >= 0.);
            assert!(gun.recoil_timer <= previous);
            assert!(gun.recoil_timer <= config.recoil_time);
            previous = gun.recoil_timer;
            if had_flag && !flags.contains(PlayerFlags::JUST_FIRED) {
                cleared_at.push(i);
            }
        }
        assert_eq!(cleared_at.len(), 1);
        assert_eq!(gun.recoil_timer, 0.);
        assert!(gun.visible);
        assert!(flags.contains(PlayerFlags::HAS_FIRST_GUN));
    }

    #[test]
    fn gun_hidden_without_any_gun() {
        let mut gun = gun();
        let mut flags = PlayerFlags::empty();
        let wall = Wall::empty();
        let mut opener = ScriptedOpener::new(true);
        let mut splashes = RecordedSplashes::default();
        tick(&mut gun, &mut flags, &wall, &mut opener, &mut splashes);
        assert!(!gun.visible);

        flags.insert(PlayerFlags::HAS_SECOND_GUN);
        tick(&mut gun, &mut flags, &wall, &mut opener, &mut splashes);
        assert!(gun.visible);
    }
}
