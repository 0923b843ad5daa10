//! This module contains the first person controller plugin.
//!
//! The player is a kinematic body moved by [`update_player`] once per simulation tick. Inputs are
//! buffered every frame so presses landing between two ticks are not lost.

use bevy::{prelude::*, reflect::FromReflect, render::camera::Projection};
use bevy_rapier3d::prelude::*;
use iyes_loopless::prelude::*;
use leafwing_input_manager::prelude::*;

mod controller;

pub use controller::*;

use crate::plugins::{
    game::{SimulationTick, SIMULATION_STAGE},
    input::{default_input_map, Actions, InputSnapshot},
    physics::*,
    portal_gun::FirePortalEvent,
};

#[derive(Debug)]
/// First person controller plugin, which registers the required systems to use the first person
/// controller also provided by this module.
pub struct FirstPersonControllerPlugin;

impl Plugin for FirstPersonControllerPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<FirstPersonCamera>()
            .register_type::<FirstPersonControllerSpawner>()
            .add_system(spawn_controller.label(FirstPersonLabels::SpawnControllers))
            .add_system(buffer_inputs.label(FirstPersonLabels::BufferInputs))
            .add_fixed_timestep_system(
                SIMULATION_STAGE,
                0,
                process_controller_inputs.label(FirstPersonLabels::ProcessInputs),
            );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SystemLabel)]
/// Labels for the first person controller systems.
pub enum FirstPersonLabels {
    SpawnControllers,
    BufferInputs,
    ProcessInputs,
}

#[derive(Debug, Component)]
/// First person controller component.
pub struct FirstPersonController {
    pub camera: Entity,
}

#[derive(Debug, Default, Component, Reflect, FromReflect)]
#[reflect(Component)]
/// Marker trait for first person cameras
pub struct FirstPersonCamera;

#[derive(Debug, Component, Default, Reflect, FromReflect)]
#[reflect(Component)]
/// Turned into a full player on the next frame.
pub struct FirstPersonControllerSpawner {
    pub room: RoomIndex,
    pub flags: PlayerFlags,
}

#[derive(Debug, Bundle, Default)]
pub struct FirstPersonControllerBundle {
    #[bundle]
    pub spatial: SpatialBundle,
    pub spawner: FirstPersonControllerSpawner,
}

#[derive(Debug, Default, Component)]
/// Inputs gathered since the last simulation tick.
pub struct InputBuffer(pub InputSnapshot);

const PLAYER_HEIGHT: f32 = 1.8;
const PLAYER_RADIUS: f32 = 0.4;

fn spawn_controller(
    mut commands: Commands,
    config: Res<PlayerControllerConfig>,
    spawners_query: Query<(&FirstPersonControllerSpawner, &Transform, Entity)>,
) {
    for (spawner, transform, id) in &spawners_query {
        let player = Player::new(*transform, spawner.room, spawner.flags);

        let camera = commands
            .spawn((
                Camera3dBundle {
                    projection: Projection::Perspective(PerspectiveProjection {
                        fov: std::f32::consts::FRAC_PI_4,
                        aspect_ratio: 16. / 9.,
                        near: 0.1,
                        far: 1000.,
                    }),
                    transform: player.camera_transform(&config),
                    ..default()
                },
                Name::from("Player camera"),
                FirstPersonCamera,
            ))
            .id();

        info!("Spawning player in {} at {}", spawner.room, transform.translation);
        commands
            .entity(id)
            .insert((
                InputManagerBundle {
                    action_state: ActionState::default(),
                    input_map: default_input_map(),
                },
                RigidBody::KinematicPositionBased,
                Collider::capsule_y(PLAYER_HEIGHT / 2. - PLAYER_RADIUS, PLAYER_RADIUS),
                CollisionGroups::new(PLAYER_GROUP, ALL_GROUPS),
                Name::from("Player"),
                InputBuffer::default(),
                FirstPersonController { camera },
                player,
            ))
            .remove::<FirstPersonControllerSpawner>();
    }
}

fn buffer_inputs(mut players: Query<(&ActionState<Actions>, &mut InputBuffer)>) {
    for (action_state, mut buffer) in &mut players {
        buffer.0.latch(&InputSnapshot::from_action_state(action_state));
    }
}

fn process_controller_inputs(
    tick: Res<SimulationTick>,
    config: Res<PlayerControllerConfig>,
    mut players: Query<
        (
            &mut Player,
            &mut InputBuffer,
            &FirstPersonController,
            &mut Transform,
        ),
        Without<Grabbable>,
    >,
    mut cameras: Query<
        &mut Transform,
        (With<FirstPersonCamera>, Without<Player>, Without<Grabbable>),
    >,
    mut bodies: Query<(&'static Transform, &'static mut Velocity), With<Grabbable>>,
    grabbables: Query<(), With<Grabbable>>,
    raycaster: RapierRoomRaycaster,
    mut fire_events: EventWriter<FirePortalEvent>,
) {
    for (mut player, mut buffer, controller, mut body) in &mut players {
        let input = buffer.0.take();
        let mut camera = match cameras.get_mut(controller.camera) {
            Ok(camera) => camera,
            Err(_) => {
                warn!("Player camera {:?} is missing", controller.camera);
                continue;
            }
        };

        let previous_eye = camera.translation;
        let mut eye = *camera;
        let mut constraint = VelocityConstraints {
            bodies: &mut bodies,
            dt: tick.dt,
        };
        update_player(&mut player, &mut eye, &input, tick.dt, &config, &mut constraint);

        let room = track_room(player.room, previous_eye, eye.translation, &raycaster);
        if room != player.room {
            info!("Player moved from {} to {}", player.room, room);
            player.room = room;
        }

        if input.grab {
            toggle_grab(&mut player, &eye, &config, &raycaster, |entity| {
                grabbables.contains(entity)
            });
        }

        for event in fire_requests(&mut player, &eye, &input) {
            info!("Player fires portal {:?} from {}", event.slot, event.room);
            fire_events.send(event);
        }

        *body = player.body;
        *camera = eye;
    }
}
