use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::plugins::{physics::*, portal::PortalSurface};

const WALL_THICKNESS: f32 = 0.5;
const DOORWAY_HALF_WIDTH: f32 = 1.;

/// What a block of level geometry is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    /// Portals can be opened on it.
    Portalable,
    /// Static, but portals don't stick.
    Plain,
    /// Stops projectiles without accepting portals.
    PortalBlocker,
}

struct ArenaBuilder<'a, 'w, 's> {
    commands: &'a mut Commands<'w, 's>,
    meshes: &'a mut Assets<Mesh>,
}

impl<'a, 'w, 's> ArenaBuilder<'a, 'w, 's> {
    #[allow(clippy::too_many_arguments)]
    fn block(
        &mut self,
        name: &str,
        center: Vec3,
        half_extents: Vec3,
        material: &Handle<StandardMaterial>,
        groups: Group,
        surface: Surface,
        room: Option<RoomIndex>,
    ) {
        let mesh = self.meshes.add(
            shape::Box {
                min_x: -half_extents.x,
                max_x: half_extents.x,
                min_y: -half_extents.y,
                max_y: half_extents.y,
                min_z: -half_extents.z,
                max_z: half_extents.z,
            }
            .into(),
        );
        let mut block = self.commands.spawn((
            PbrBundle {
                mesh,
                material: material.clone(),
                transform: Transform::from_translation(center),
                ..default()
            },
            Name::from(name),
            RigidBody::Fixed,
            Collider::cuboid(half_extents.x, half_extents.y, half_extents.z),
            CollisionGroups::new(groups, ALL_GROUPS),
        ));
        if surface == Surface::Portalable {
            block.insert(PortalSurface);
        }
        if let Some(room) = room {
            block.insert(RoomMember(room));
        }
    }
}

/// Two rooms side by side, split along `x = 0` by a wall with a doorway. Room 0 is on the -X side.
///
/// The outer walls belong to their room, floor, ceiling and the dividing wall are shared.
pub fn make_test_arena(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    room_length: f32,
    room_width: f32,
    height: f32,
) {
    let room_materials = [
        materials.add(StandardMaterial::from(Color::rgb(0.8, 0.78, 0.72))),
        materials.add(StandardMaterial::from(Color::rgb(0.65, 0.7, 0.78))),
    ];
    let ground_material = materials.add(StandardMaterial::from(Color::DARK_GRAY));
    let divider_material = materials.add(StandardMaterial::from(Color::GRAY));
    let blocker_material = materials.add(StandardMaterial {
        base_color: Color::rgba(0.3, 0.9, 1., 0.35),
        alpha_mode: AlphaMode::Blend,
        ..default()
    });
    let prop_material = materials.add(StandardMaterial::from(Color::ORANGE_RED));

    let half_width = room_width / 2.;
    let half_height = height / 2.;
    let t = WALL_THICKNESS / 2.;
    let mut arena = ArenaBuilder { commands, meshes };

    let slab = Vec3::new(room_length + t * 2., t, half_width + t * 2.);
    arena.block("Ground", Vec3::new(0., -t, 0.), slab, &ground_material, GROUND_GROUP, Surface::Portalable, None);
    arena.block("Ceiling", Vec3::new(0., height + t, 0.), slab, &ground_material, GROUND_GROUP, Surface::Plain, None);

    for (i, side) in [-1., 1.].into_iter().enumerate() {
        let room = RoomIndex(i as u32);
        let material = &room_materials[i];
        let room_center_x = side * room_length / 2.;
        let along_x = Vec3::new(room_length / 2., half_height, t);
        arena.block(
            &format!("North wall {}", i),
            Vec3::new(room_center_x, half_height, -half_width - t),
            along_x,
            material,
            WALLS_GROUP,
            Surface::Portalable,
            Some(room),
        );
        arena.block(
            &format!("South wall {}", i),
            Vec3::new(room_center_x, half_height, half_width + t),
            along_x,
            material,
            WALLS_GROUP,
            Surface::Portalable,
            Some(room),
        );
        arena.block(
            &format!("End wall {}", i),
            Vec3::new(side * (room_length + t), half_height, 0.),
            Vec3::new(t, half_height, half_width),
            material,
            WALLS_GROUP,
            Surface::Portalable,
            Some(room),
        );
    }

    let divider_half_len = (half_width - DOORWAY_HALF_WIDTH) / 2.;
    for (i, side) in [-1., 1.].into_iter().enumerate() {
        arena.block(
            &format!("Divider {}", i),
            Vec3::new(0., half_height, side * (DOORWAY_HALF_WIDTH + divider_half_len)),
            Vec3::new(t, half_height, divider_half_len),
            &divider_material,
            WALLS_GROUP,
            Surface::Plain,
            None,
        );
    }

    arena.block(
        "Portal blocker",
        Vec3::new(room_length / 2., 1.5, -half_width / 2.),
        Vec3::new(1.5, 1.5, 0.05),
        &blocker_material,
        BLOCK_PORTAL_GROUP,
        Surface::PortalBlocker,
        Some(RoomIndex(1)),
    );

    arena.commands.spawn((
        TransformBundle::from(Transform::from_xyz(0., half_height, 0.)),
        Name::from("Doorway"),
        Collider::cuboid(t, half_height, DOORWAY_HALF_WIDTH),
        Sensor,
        CollisionGroups::new(ROOM_BOUNDARY_GROUP, RAYCAST_GROUP),
        RoomBoundary {
            a: RoomIndex(0),
            b: RoomIndex(1),
            normal: Vec3::X,
            portal: false,
        },
    ));

    const PROP_HALF_SIZE: f32 = 0.25;
    let prop_mesh = arena.meshes.add(shape::Cube { size: PROP_HALF_SIZE * 2. }.into());
    for (i, x) in [-room_length * 0.7, -room_length * 0.3, room_length * 0.5]
        .into_iter()
        .enumerate()
    {
        arena.commands.spawn((
            PbrBundle {
                mesh: prop_mesh.clone(),
                material: prop_material.clone(),
                transform: Transform::from_xyz(x, PROP_HALF_SIZE + 0.5, half_width / 2.),
                ..default()
            },
            Name::from(format!("Prop {}", i)),
            RigidBody::Dynamic,
            Collider::cuboid(PROP_HALF_SIZE, PROP_HALF_SIZE, PROP_HALF_SIZE),
            CollisionGroups::new(PROPS_GROUP, ALL_GROUPS),
            Velocity::default(),
            Grabbable,
        ));
    }
}
