//! Portal placement. Given a projectile impact, decides whether a portal can be opened there and
//! spawns it.

use bevy::{ecs::system::SystemParam, prelude::*, reflect::FromReflect};
use bevy_rapier3d::prelude::*;

mod geometry;

pub use geometry::*;

use super::physics::*;
use super::physics::Ray;

#[derive(Debug)]
pub struct PortalPlugin;

impl Plugin for PortalPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<Portal>()
            .register_type::<PortalSurface>()
            .register_type::<PortalSlot>()
            .add_startup_system(load_portal_assets);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Reflect, FromReflect)]
/// Identity of one of the two portals, and of the projectile slot that opens it.
pub enum PortalSlot {
    #[default]
    First,
    Second,
}

impl PortalSlot {
    pub const ALL: [PortalSlot; 2] = [PortalSlot::First, PortalSlot::Second];

    pub const fn index(self) -> usize {
        match self {
            PortalSlot::First => 0,
            PortalSlot::Second => 1,
        }
    }

    /// Panics on anything but 0 or 1.
    pub fn from_index(index: usize) -> PortalSlot {
        match index {
            0 => PortalSlot::First,
            1 => PortalSlot::Second,
            _ => panic!("No such portal slot: {}", index),
        }
    }
}

#[derive(Debug, Default, Component, Reflect, FromReflect)]
#[reflect(Component)]
pub struct Portal {
    pub slot: PortalSlot,
    pub room: RoomIndex,
}

#[derive(Debug, Default, Component, Reflect, FromReflect)]
#[reflect(Component)]
/// Marks static geometry portals can be opened on.
pub struct PortalSurface;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenPortalRequest {
    pub ray: Ray,
    pub hit: RaycastHit,
    pub up_hint: Vec3,
    pub slot: PortalSlot,
    pub room: RoomIndex,
    /// The request comes from a player shot rather than from level scripting.
    pub from_player: bool,
    /// Only validate the placement, don't open anything.
    pub just_checking: bool,
}

/// Decides whether a portal can be opened at a hit location, and opens it.
pub trait PortalOpener {
    fn try_open_portal(&mut self, request: &OpenPortalRequest) -> bool;
}

#[derive(Debug, Default, Resource)]
pub struct PortalResources {
    pub mesh: Handle<Mesh>,
    pub materials: [Handle<StandardMaterial>; 2],
}

#[derive(Bundle)]
pub struct PortalBundle {
    pbr: PbrBundle,
    portal: Portal,
    room: RoomMember,
    collider: Collider,
    sensor: Sensor,
    collision_groups: CollisionGroups,
    name: Name,
}

impl Default for PortalBundle {
    fn default() -> Self {
        PortalBundle {
            pbr: PbrBundle::default(),
            portal: Portal::default(),
            room: RoomMember::default(),
            collider: Collider::cuboid(PORTAL_HALF_EXTENTS.x, PORTAL_HALF_EXTENTS.y, 0.05),
            sensor: Sensor,
            collision_groups: CollisionGroups::new(PORTAL_GROUP, PLAYER_GROUP | PROPS_GROUP),
            name: Name::from("Portal"),
        }
    }
}

/// Load the assets required to render the portals.
fn load_portal_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let mesh = meshes.add(
        shape::Quad {
            size: PORTAL_HALF_EXTENTS * 2.,
            flip: false,
        }
        .into(),
    );
    let colors = [Color::rgb_u8(255, 140, 40), Color::rgb_u8(40, 110, 255)];
    let materials = colors.map(|color| {
        materials.add(StandardMaterial {
            base_color: color,
            emissive: color,
            unlit: true,
            double_sided: true,
            cull_mode: None,
            ..default()
        })
    });
    commands.insert_resource(PortalResources { mesh, materials });
}

/// [`PortalOpener`] working against the Rapier scene.
#[derive(SystemParam)]
pub struct PortalPlacer<'w, 's> {
    commands: Commands<'w, 's>,
    rapier: Res<'w, RapierContext>,
    surfaces: Query<'w, 's, (), With<PortalSurface>>,
    portals: Query<'w, 's, (Entity, &'static Portal)>,
    resources: Res<'w, PortalResources>,
}

impl<'w, 's> PortalPlacer<'w, 's> {
    fn probe(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<f32> {
        self.rapier
            .cast_ray(
                origin,
                direction,
                max_distance,
                true,
                QueryFilter::new().groups(CollisionGroups::new(RAYCAST_GROUP, PROJECTILE_GROUPS).into()),
            )
            .map(|(_entity, distance)| distance)
    }

    fn placement(&self, request: &OpenPortalRequest) -> Option<Transform> {
        let hit = &request.hit;
        let surface = hit.object?;
        if !self.surfaces.contains(surface) {
            debug!("{:?} does not accept portals", surface);
            return None;
        }
        let rotation = portal_orientation(hit.normal, request.up_hint, request.ray.direction)?;
        let origin = adjust_portal_origin_to_obstacles(hit.point, hit.normal, rotation, |o, d, m| {
            self.probe(o, d, m)
        })?;
        Some(location_from_impact(origin, hit.normal, rotation))
    }
}

impl<'w, 's> PortalOpener for PortalPlacer<'w, 's> {
    fn try_open_portal(&mut self, request: &OpenPortalRequest) -> bool {
        let location = match self.placement(request) {
            Some(location) => location,
            None => return false,
        };
        if request.just_checking {
            return true;
        }

        info!(
            "Spawning portal {:?} at {} in {} (player shot: {})",
            request.slot, location.translation, request.room, request.from_player
        );
        for (entity, portal) in &self.portals {
            if portal.slot == request.slot {
                info!("Despawning previous portal");
                self.commands.entity(entity).despawn_recursive();
            }
        }
        self.commands.spawn(PortalBundle {
            pbr: PbrBundle {
                mesh: self.resources.mesh.clone(),
                material: self.resources.materials[request.slot.index()].clone(),
                transform: location,
                ..default()
            },
            portal: Portal {
                slot: request.slot,
                room: request.room,
            },
            room: RoomMember(request.room),
            ..default()
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_indices_round_trip() {
        for slot in PortalSlot::ALL {
            assert_eq!(PortalSlot::from_index(slot.index()), slot);
        }
    }

    #[test]
    #[should_panic(expected = "No such portal slot")]
    fn out_of_range_slot_panics() {
        PortalSlot::from_index(2);
    }
}
