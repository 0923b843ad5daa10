//! The two-slot portal gun. Firing launches a projectile that travels through the rooms one
//! simulation tick at a time and asks the portal plugin to open a portal where it lands.

use bevy::{
    core_pipeline::{
        clear_color::ClearColorConfig,
        core_3d::{self, Camera3dDepthLoadOp},
        tonemapping::Tonemapping,
    },
    ecs::system::SystemParam,
    prelude::*,
    transform::TransformSystem,
    render::{
        camera::{CameraProjectionPlugin, CameraRenderGraph},
        primitives::Frustum,
        view::{update_frusta, RenderLayers, VisibleEntities},
    },
};
use bevy_rapier3d::prelude::*;
use iyes_loopless::prelude::*;

mod effects;
mod gun;
mod projectile;
mod render;
mod viewmodel;

pub use effects::*;
pub use gun::*;
pub use projectile::*;
pub use render::*;
pub use viewmodel::*;

use crate::plugins::{
    first_person_controller::{FirstPersonCamera, FirstPersonController, Player},
    game::{SimulationTick, SIMULATION_STAGE},
    physics::{Ray, RapierRoomRaycaster, RoomIndex, PLAYER_GROUP, PROPS_GROUP},
    portal::{PortalPlacer, PortalSlot},
};

/// Render layer of the held gun, only drawn by the view model camera.
const VIEW_MODEL_LAYER: u8 = 1;
/// Gun position in the camera frame.
const GUN_OFFSET: Vec3 = Vec3::new(0.25, -0.22, -0.45);

#[derive(Debug)]
pub struct PortalGunPlugin;

impl Plugin for PortalGunPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<FirePortalEvent>()
            .register_type::<ViewModelProjection>()
            .add_plugin(CameraProjectionPlugin::<ViewModelProjection>::default())
            .add_startup_system(load_portal_gun_assets)
            .add_system(spawn_portal_guns.label(PortalGunLabels::SpawnGuns))
            .add_fixed_timestep_system(
                SIMULATION_STAGE,
                1,
                simulate_portal_guns.label(PortalGunLabels::Simulate),
            )
            .add_system(
                render_portal_guns
                    .label(PortalGunLabels::Render)
                    .after(PortalGunLabels::SpawnGuns),
            )
            .add_system(expire_fail_splashes)
            .add_system_to_stage(
                CoreStage::PostUpdate,
                update_frusta::<ViewModelProjection>.after(TransformSystem::TransformPropagate),
            );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SystemLabel)]
pub enum PortalGunLabels {
    SpawnGuns,
    Simulate,
    Render,
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Request to shoot the projectile of one slot, sent by the player controller.
pub struct FirePortalEvent {
    pub slot: PortalSlot,
    /// From the camera position, along the camera forward vector.
    pub ray: Ray,
    pub player_up: Vec3,
    pub room: RoomIndex,
}

#[derive(Debug, Resource)]
pub struct PortalGunAssets {
    pub marker_mesh: Handle<Mesh>,
    pub trail_mesh: Handle<Mesh>,
    pub splash_mesh: Handle<Mesh>,
    pub splash_materials: [Handle<StandardMaterial>; 2],
    pub gun_mesh: Handle<Mesh>,
    pub gun_material: Handle<StandardMaterial>,
}

#[derive(Debug, Component)]
/// Links a player to the gun it carries.
pub struct PortalGunHolder {
    pub gun: Entity,
}

#[derive(Debug, Component)]
pub struct ProjectileMarker {
    pub gun: Entity,
    pub slot: PortalSlot,
}

#[derive(Debug, Component)]
pub struct ProjectileTrailMesh {
    pub gun: Entity,
    pub slot: PortalSlot,
}

#[derive(Debug, Component)]
/// The camera drawing the held gun on top of the scene.
pub struct ViewModelCamera;

fn load_portal_gun_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let marker_mesh = meshes.add(
        shape::Icosphere {
            radius: 1.,
            subdivisions: 2,
        }
        .into(),
    );
    let trail_mesh = meshes.add(shape::Cube { size: 1. }.into());
    let splash_mesh = meshes.add(
        shape::Quad {
            size: Vec2::splat(0.4),
            flip: false,
        }
        .into(),
    );
    let splash_materials = PortalSlot::ALL.map(|slot| {
        let color = projectile_color(slot);
        materials.add(StandardMaterial {
            base_color: color,
            emissive: color,
            unlit: true,
            double_sided: true,
            cull_mode: None,
            alpha_mode: AlphaMode::Blend,
            ..default()
        })
    });
    let gun_mesh = meshes.add(
        shape::Box {
            min_x: -0.04,
            max_x: 0.04,
            min_y: -0.05,
            max_y: 0.05,
            min_z: -0.154,
            max_z: 0.1,
        }
        .into(),
    );
    let gun_material = materials.add(StandardMaterial {
        base_color: Color::rgb(0.85, 0.85, 0.8),
        perceptual_roughness: 0.4,
        ..default()
    });

    commands.insert_resource(PortalGunAssets {
        marker_mesh,
        trail_mesh,
        splash_mesh,
        splash_materials,
        gun_mesh,
        gun_material,
    });
}

fn effect_material(materials: &mut Assets<StandardMaterial>, color: Color) -> Handle<StandardMaterial> {
    materials.add(StandardMaterial {
        base_color: color,
        emissive: color,
        unlit: true,
        alpha_mode: AlphaMode::Blend,
        ..default()
    })
}

/// Give each new first person controller a gun, its projectile visuals and a view model camera.
fn spawn_portal_guns(
    mut commands: Commands,
    config: Res<PortalGunConfig>,
    assets: Res<PortalGunAssets>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    controllers: Query<(Entity, &FirstPersonController), Added<FirstPersonController>>,
) {
    for (player, controller) in &controllers {
        let local = Transform::from_translation(GUN_OFFSET);
        let gun = commands
            .spawn((
                PbrBundle {
                    mesh: assets.gun_mesh.clone(),
                    material: assets.gun_material.clone(),
                    transform: local,
                    visibility: Visibility { is_visible: false },
                    ..default()
                },
                PortalGun::new(local, &config),
                RigidBody::KinematicPositionBased,
                Collider::cylinder(0.05, 0.05),
                Sensor,
                CollisionGroups::new(PLAYER_GROUP, PROPS_GROUP),
                RenderLayers::layer(VIEW_MODEL_LAYER),
                Name::from("Portal gun"),
            ))
            .id();

        let view_model_camera = commands
            .spawn((
                Camera {
                    priority: 1,
                    ..default()
                },
                CameraRenderGraph::new(core_3d::graph::NAME),
                ViewModelProjection {
                    near: config.near_plane,
                    ..default()
                },
                VisibleEntities::default(),
                Frustum::default(),
                TransformBundle::default(),
                Camera3d {
                    clear_color: ClearColorConfig::None,
                    depth_load_op: Camera3dDepthLoadOp::Clear(0.),
                },
                Tonemapping::Enabled {
                    deband_dither: true,
                },
                RenderLayers::layer(VIEW_MODEL_LAYER),
                ViewModelCamera,
                Name::from("View model camera"),
            ))
            .id();

        commands
            .entity(controller.camera)
            .push_children(&[gun, view_model_camera]);

        for slot in PortalSlot::ALL {
            let color = projectile_color(slot);
            commands.spawn((
                PbrBundle {
                    mesh: assets.marker_mesh.clone(),
                    material: effect_material(&mut materials, color),
                    visibility: Visibility { is_visible: false },
                    ..default()
                },
                ProjectileMarker { gun, slot },
                Name::from(format!("Projectile marker {}", slot.index())),
            ));
            commands.spawn((
                PbrBundle {
                    mesh: assets.trail_mesh.clone(),
                    material: effect_material(&mut materials, color),
                    visibility: Visibility { is_visible: false },
                    ..default()
                },
                ProjectileTrailMesh { gun, slot },
                Name::from(format!("Projectile trail {}", slot.index())),
            ));
        }

        commands.entity(player).insert(PortalGunHolder { gun });
        info!("Portal gun {:?} given to player {:?}", gun, player);
    }
}

/// Fire then advance every held gun by one simulation tick.
fn simulate_portal_guns(
    mut fire_events: EventReader<FirePortalEvent>,
    config: Res<PortalGunConfig>,
    tick: Res<SimulationTick>,
    mut players: Query<(&mut Player, &FirstPersonController, &PortalGunHolder)>,
    cameras: Query<&Transform, With<FirstPersonCamera>>,
    mut guns: Query<(&mut PortalGun, &Transform), Without<FirstPersonCamera>>,
    raycaster: RapierRoomRaycaster,
    mut placer: PortalPlacer,
    mut splashes: FailSplashSpawner,
) {
    let fired: Vec<FirePortalEvent> = fire_events.iter().copied().collect();

    for (mut player, controller, holder) in &mut players {
        let (mut gun, local) = match guns.get_mut(holder.gun) {
            Ok(gun) => gun,
            Err(_) => continue,
        };
        if let Ok(camera) = cameras.get(controller.camera) {
            gun.transform = camera.mul_transform(*local);
        }

        for event in &fired {
            let hit = gun.fire(event.slot, &event.ray, event.player_up, event.room, &config, &raycaster);
            info!(
                "Fired portal {:?} from {}, aiming at {} ({} m away)",
                event.slot, event.room, hit.point, hit.distance
            );
        }

        let impacts = gun.update(
            &mut player.flags,
            tick.dt,
            &config,
            &raycaster,
            &mut placer,
            &mut splashes,
        );
        for impact in impacts {
            info!(
                "Projectile {:?} landed at {} in {}, portal opened: {}",
                impact.slot, impact.hit.point, impact.hit.room, impact.opened
            );
        }
    }
}

/// [`RenderSink`] writing render commands to the projectile visual entities.
#[derive(SystemParam)]
pub struct GunVisuals<'w, 's> {
    markers: Query<
        'w,
        's,
        (
            &'static ProjectileMarker,
            &'static mut Transform,
            &'static mut Visibility,
            &'static Handle<StandardMaterial>,
        ),
        Without<ProjectileTrailMesh>,
    >,
    trails: Query<
        'w,
        's,
        (
            &'static ProjectileTrailMesh,
            &'static mut Transform,
            &'static mut Visibility,
            &'static Handle<StandardMaterial>,
        ),
        Without<ProjectileMarker>,
    >,
    guns: Query<
        'w,
        's,
        &'static mut Visibility,
        (
            With<PortalGun>,
            Without<ProjectileMarker>,
            Without<ProjectileTrailMesh>,
        ),
    >,
    projections: Query<'w, 's, &'static mut ViewModelProjection>,
    materials: ResMut<'w, Assets<StandardMaterial>>,
}

/// Render commands for one gun, applied to its visuals.
struct GunSink<'a, 'w, 's> {
    visuals: &'a mut GunVisuals<'w, 's>,
    gun: Entity,
}

impl<'a, 'w, 's> GunSink<'a, 'w, 's> {
    /// Hide everything, commands only show what is live this frame.
    fn begin(visuals: &'a mut GunVisuals<'w, 's>, gun: Entity) -> Self {
        for (marker, _, mut visibility, _) in &mut visuals.markers {
            if marker.gun == gun {
                visibility.is_visible = false;
            }
        }
        for (trail, _, mut visibility, _) in &mut visuals.trails {
            if trail.gun == gun {
                visibility.is_visible = false;
            }
        }
        if let Ok(mut visibility) = visuals.guns.get_mut(gun) {
            visibility.is_visible = false;
        }
        GunSink { visuals, gun }
    }

    fn set_material(&mut self, handle: &Handle<StandardMaterial>, color: Color, emissive: Color) {
        if let Some(material) = self.visuals.materials.get_mut(handle) {
            material.base_color = color;
            material.emissive = emissive;
        }
    }
}

impl<'a, 'w, 's> RenderSink for GunSink<'a, 'w, 's> {
    fn submit(&mut self, command: RenderCommand) {
        match command {
            RenderCommand::Marker {
                slot,
                transform,
                color,
                look,
            } => {
                let gun = self.gun;
                let mut material = None;
                for (marker, mut marker_transform, mut visibility, handle) in &mut self.visuals.markers {
                    if marker.gun == gun && marker.slot == slot {
                        *marker_transform = transform;
                        if look == MarkerLook::MuzzleFlash {
                            marker_transform.scale *= 2.;
                        }
                        visibility.is_visible = true;
                        material = Some(handle.clone());
                    }
                }
                if let Some(handle) = material {
                    let emissive = match look {
                        MarkerLook::MuzzleFlash => Color::WHITE,
                        MarkerLook::Glow => color,
                    };
                    self.set_material(&handle, color, emissive);
                }
            }
            RenderCommand::Trail {
                slot,
                from,
                to,
                alpha,
            } => {
                let gun = self.gun;
                let length = from.distance(to);
                if length <= f32::EPSILON {
                    return;
                }
                let direction = (to - from) / length;
                let up = if direction.y.abs() > 0.99 { Vec3::X } else { Vec3::Y };
                let segment = Transform::from_translation((from + to) * 0.5)
                    .looking_at(to, up)
                    .with_scale(Vec3::new(0.02, 0.02, length));

                let mut material = None;
                for (trail, mut transform, mut visibility, handle) in &mut self.visuals.trails {
                    if trail.gun == gun && trail.slot == slot {
                        *transform = segment;
                        visibility.is_visible = true;
                        material = Some(handle.clone());
                    }
                }
                if let Some(handle) = material {
                    let mut color = projectile_color(slot);
                    color.set_a(alpha);
                    self.set_material(&handle, color, color);
                }
            }
            RenderCommand::NearPlane { near } => {
                for mut projection in &mut self.visuals.projections {
                    projection.near = near;
                }
            }
            // The gun mesh follows the camera through the hierarchy, only its visibility is
            // driven from here.
            RenderCommand::Gun { .. } => {
                if let Ok(mut visibility) = self.visuals.guns.get_mut(self.gun) {
                    visibility.is_visible = true;
                }
            }
        }
    }
}

fn render_portal_guns(
    config: Res<PortalGunConfig>,
    guns: Query<(Entity, &PortalGun)>,
    cameras: Query<&GlobalTransform, With<FirstPersonCamera>>,
    mut visuals: GunVisuals,
) {
    let view_rotation = cameras
        .iter()
        .next()
        .map(|camera| camera.compute_transform().rotation)
        .unwrap_or_default();
    for (entity, gun) in &guns {
        let mut sink = GunSink::begin(&mut visuals, entity);
        render_portal_gun(gun, view_rotation, &config, &mut sink);
    }
}
