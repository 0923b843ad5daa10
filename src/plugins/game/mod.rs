use std::{f32::consts::*, time::Duration};

use crate::{plugins::*, util::scenes::make_test_arena};

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use iyes_loopless::prelude::*;

mod config;

pub use config::*;

use crate::plugins::{
    first_person_controller::{FirstPersonControllerBundle, FirstPersonControllerSpawner, PlayerFlags},
    physics::RoomIndex,
    portal::PortalSlot,
};

/// Fixed timestep stage running the simulation. Sub-stage 0 moves the players, sub-stage 1 runs
/// the portal guns.
pub const SIMULATION_STAGE: &str = "simulation";

const ROOM_LENGTH: f32 = 10.;
const ROOM_WIDTH: f32 = 12.;
const ROOM_HEIGHT: f32 = 4.;

#[derive(Debug, Clone, Copy, Resource)]
/// Duration of one simulation tick, in seconds.
pub struct SimulationTick {
    pub dt: f32,
}

#[derive(Debug, Resource)]
struct StartingGuns([bool; 2]);

#[derive(Debug)]
/// Main game plugin, responsible for loading the other game plugins and bootstrapping the game.
pub struct GamePlugin;

impl Plugin for GamePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            window: WindowDescriptor {
                title: "Portal gun prototype".to_string(),
                width: 1280.,
                height: 720.,
                ..default()
            },
            ..default()
        }));

        let config = match GameConfig::load(CONFIG_PATH) {
            Ok(config) => {
                info!("Loaded game config from {}", CONFIG_PATH);
                config
            }
            Err(e) => {
                warn!("{}, using the default config", e);
                GameConfig::default()
            }
        };

        // The simulation stage must exist before the plugins add their systems to it
        app.add_fixed_timestep(
            Duration::from_secs_f32(config.tick_duration()),
            SIMULATION_STAGE,
        )
        .add_fixed_timestep_child_stage(SIMULATION_STAGE)
        .insert_resource(SimulationTick {
            dt: config.tick_duration(),
        })
        .insert_resource(config.player.clone())
        .insert_resource(config.portal_gun.clone())
        .insert_resource(StartingGuns(config.start_with_guns));

        #[cfg(feature = "devel")]
        {
            app.add_plugins(debug::DeveloperPlugins);
        }

        app.add_plugin(RapierPhysicsPlugin::<NoUserData>::default());
        app.add_plugin(physics::PhysicsPlugin);
        app.add_plugin(input::InputPlugin);
        app.add_plugin(first_person_controller::FirstPersonControllerPlugin);
        app.add_plugin(portal::PortalPlugin);
        app.add_plugin(portal_gun::PortalGunPlugin);

        app.add_startup_system(setup);
    }
}

fn starting_flags(guns: [bool; 2]) -> PlayerFlags {
    let mut flags = PlayerFlags::empty();
    for (index, owned) in guns.into_iter().enumerate() {
        if owned {
            flags.insert(PlayerFlags::gun_for(PortalSlot::from_index(index)));
        }
    }
    flags
}

/// Perform game initialization
fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    guns: Res<StartingGuns>,
) {
    make_test_arena(
        &mut commands,
        &mut meshes,
        &mut materials,
        ROOM_LENGTH,
        ROOM_WIDTH,
        ROOM_HEIGHT,
    );

    // Light
    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            color: Color::ANTIQUE_WHITE,
            illuminance: 20_000.,
            shadows_enabled: true,
            ..default()
        },
        transform: Transform {
            translation: Vec3::Y * 5.,
            rotation: Quat::from_euler(EulerRot::YXZ, FRAC_PI_4, -FRAC_PI_4, 0.),
            scale: Vec3::ONE,
        },
        ..default()
    });

    // Player, facing the doorway from room 0
    commands.spawn(FirstPersonControllerBundle {
        spatial: SpatialBundle::from(
            Transform::from_xyz(-ROOM_LENGTH / 2., 0., 0.)
                .with_rotation(Quat::from_rotation_y(-FRAC_PI_2)),
        ),
        spawner: FirstPersonControllerSpawner {
            room: RoomIndex(0),
            flags: starting_flags(guns.0),
        },
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_guns_map_to_flags() {
        assert_eq!(starting_flags([false, false]), PlayerFlags::empty());
        assert_eq!(starting_flags([true, false]), PlayerFlags::HAS_FIRST_GUN);
        assert_eq!(
            starting_flags([true, true]),
            PlayerFlags::HAS_FIRST_GUN.union(PlayerFlags::HAS_SECOND_GUN)
        );
    }
}
