//! Kinematic player simulation, independent from the ECS so it can be stepped by hand.

use std::f32::consts::{FRAC_PI_2, PI};

use bevy::{prelude::*, reflect::FromReflect};
use bevy_rapier3d::prelude::Group;
use euclid::Angle;
use serde::Deserialize;

use crate::{
    plugins::{
        input::InputSnapshot,
        physics::{PointConstraint, Ray, RoomIndex, RoomRaycaster, PROPS_GROUP},
        portal::PortalSlot,
        portal_gun::FirePortalEvent,
    },
    util::math::{flatten, move_towards, move_towards_vec3},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Reflect, FromReflect)]
/// Gameplay flags carried by the player.
pub struct PlayerFlags(u8);

bitflags::bitflags! {
    impl PlayerFlags: u8 {
        const HAS_FIRST_GUN = 1 << 0;
        const HAS_SECOND_GUN = 1 << 1;
        /// Set when a portal is fired, cleared by the gun once the recoil animation is over.
        const JUST_FIRED = 1 << 2;
    }
}

impl PlayerFlags {
    /// Flag granting the gun for `slot`.
    pub fn gun_for(slot: PortalSlot) -> PlayerFlags {
        match slot {
            PortalSlot::First => PlayerFlags::HAS_FIRST_GUN,
            PortalSlot::Second => PlayerFlags::HAS_SECOND_GUN,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Resource)]
#[serde(default)]
/// Tuning of the player controller.
pub struct PlayerControllerConfig {
    /// Ground speed at full stick deflection, in m/s.
    pub max_speed: f32,
    /// Used while the velocity already points towards the target velocity, in m/s².
    pub acceleration: f32,
    /// Used when slowing down or reversing, in m/s².
    pub stop_acceleration: f32,
    /// Turn rate with a look button held, in rad/s.
    pub look_rate: f32,
    pub look_acceleration: f32,
    pub look_stop_acceleration: f32,
    /// Camera position in the body frame.
    pub camera_offset: Vec3,
    /// Distance in front of the camera where grabbed props are held.
    pub grab_distance: f32,
    pub grab_move_rate: f32,
    pub grab_rotate_rate: f32,
}

impl Default for PlayerControllerConfig {
    fn default() -> Self {
        PlayerControllerConfig {
            max_speed: 5.,
            acceleration: 40.,
            stop_acceleration: 80.,
            look_rate: PI * 2.,
            look_acceleration: PI * 7.5,
            look_stop_acceleration: PI * 15.,
            camera_offset: Vec3::new(0., 1.2, 0.),
            grab_distance: 2.5,
            grab_move_rate: 20.,
            grab_rotate_rate: 5.,
        }
    }
}

#[derive(Debug, Clone, Component)]
/// Player state, advanced once per simulation tick.
pub struct Player {
    pub body: Transform,
    pub velocity: Vec3,
    pub yaw: Angle<f32>,
    pub pitch: Angle<f32>,
    /// In rad/s.
    pub yaw_velocity: f32,
    /// In rad/s.
    pub pitch_velocity: f32,
    /// Prop held in front of the camera. The physics scene owns it and may remove it at any time.
    pub grabbing: Option<Entity>,
    pub flags: PlayerFlags,
    /// Room the camera is in.
    pub room: RoomIndex,
}

impl Player {
    /// Only the heading of `body` is kept, the body never rolls or pitches.
    pub fn new(body: Transform, room: RoomIndex, flags: PlayerFlags) -> Player {
        let (yaw, _, _) = body.rotation.to_euler(EulerRot::YXZ);
        Player {
            body: Transform {
                translation: body.translation,
                rotation: Quat::from_axis_angle(Vec3::Y, yaw),
                scale: Vec3::ONE,
            },
            velocity: Vec3::ZERO,
            yaw: Angle::radians(yaw),
            pitch: Angle::zero(),
            yaw_velocity: 0.,
            pitch_velocity: 0.,
            grabbing: None,
            flags,
            room,
        }
    }

    pub fn camera_transform(&self, config: &PlayerControllerConfig) -> Transform {
        Transform {
            translation: self.body.transform_point(config.camera_offset),
            rotation: self.body.rotation * Quat::from_axis_angle(Vec3::X, self.pitch.radians),
            scale: Vec3::ONE,
        }
    }
}

fn look_direction(positive: bool, negative: bool) -> f32 {
    if positive {
        1.
    } else if negative {
        -1.
    } else {
        0.
    }
}

/// Approach `target` rate, using the stop acceleration unless both rates share a sign.
fn approach_rate(current: f32, target: f32, acceleration: f32, stop_acceleration: f32, dt: f32) -> f32 {
    let rate = if current * target > 0. {
        acceleration
    } else {
        stop_acceleration
    };
    move_towards(current, target, rate * dt)
}

/// Advance `player` by one tick of `dt` seconds and write the resulting camera transform.
pub fn update_player(
    player: &mut Player,
    camera: &mut Transform,
    input: &InputSnapshot,
    dt: f32,
    config: &PlayerControllerConfig,
    constraint: &mut impl PointConstraint,
) {
    let forward = flatten(player.body.forward());
    let right = flatten(player.body.right());

    let target_velocity =
        (forward * input.move_axes.y + right * input.move_axes.x) * config.max_speed;
    let acceleration = if player.velocity.dot(target_velocity) > 0. {
        config.acceleration
    } else {
        config.stop_acceleration
    };
    player.velocity = move_towards_vec3(player.velocity, target_velocity, acceleration * dt);
    player.body.translation += player.velocity * dt;

    let target_yaw = look_direction(input.look_left, input.look_right) * config.look_rate;
    let target_pitch = look_direction(input.look_up, input.look_down) * config.look_rate;
    player.yaw_velocity = approach_rate(
        player.yaw_velocity,
        target_yaw,
        config.look_acceleration,
        config.look_stop_acceleration,
        dt,
    );
    player.pitch_velocity = approach_rate(
        player.pitch_velocity,
        target_pitch,
        config.look_acceleration,
        config.look_stop_acceleration,
        dt,
    );

    player.yaw += Angle::radians(player.yaw_velocity * dt);
    player.pitch = Angle::radians(
        (player.pitch.radians + player.pitch_velocity * dt).clamp(-FRAC_PI_2, FRAC_PI_2),
    );

    player.body.rotation = Quat::from_axis_angle(Vec3::Y, player.yaw.radians);
    *camera = player.camera_transform(config);

    if let Some(target) = player.grabbing {
        let grab_point = camera.transform_point(Vec3::NEG_Z * config.grab_distance);
        let held = constraint.move_to_point(target, grab_point, config.grab_move_rate)
            && constraint.rotate_to(target, camera.rotation, config.grab_rotate_rate);
        if !held {
            debug!("Grabbed object {:?} is gone, releasing it", target);
            player.grabbing = None;
        }
    }
}

/// Follow the camera from `from` to `to`, returning the room it ends up in.
pub fn track_room(room: RoomIndex, from: Vec3, to: Vec3, raycaster: &impl RoomRaycaster) -> RoomIndex {
    let delta = to - from;
    let distance = delta.length();
    if distance <= f32::EPSILON {
        return room;
    }
    // An empty mask leaves only the room boundaries visible
    raycaster
        .raycast(room, &Ray::new(from, delta), Group::NONE, distance)
        .room()
}

/// Turn this tick's fire presses into fire events, for the guns the player owns.
pub fn fire_requests(player: &mut Player, camera: &Transform, input: &InputSnapshot) -> Vec<FirePortalEvent> {
    let mut events = Vec::new();
    for slot in PortalSlot::ALL {
        if !input.fire[slot.index()] || !player.flags.contains(PlayerFlags::gun_for(slot)) {
            continue;
        }
        player.flags.insert(PlayerFlags::JUST_FIRED);
        events.push(FirePortalEvent {
            slot,
            ray: Ray::new(camera.translation, camera.forward()),
            player_up: camera.up(),
            room: player.room,
        });
    }
    events
}

/// Start or stop holding a prop in front of the camera.
pub fn toggle_grab(
    player: &mut Player,
    camera: &Transform,
    config: &PlayerControllerConfig,
    raycaster: &impl RoomRaycaster,
    is_grabbable: impl Fn(Entity) -> bool,
) {
    if let Some(released) = player.grabbing.take() {
        info!("Releasing {:?}", released);
        return;
    }
    let ray = Ray::new(camera.translation, camera.forward());
    let result = raycaster.raycast(player.room, &ray, PROPS_GROUP, config.grab_distance);
    if let Some(object) = result.blocking_hit().and_then(|hit| hit.object) {
        if is_grabbable(object) {
            info!("Grabbing {:?}", object);
            player.grabbing = Some(object);
        }
    }
}
