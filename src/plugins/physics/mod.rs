use bevy::prelude::*;
use bevy_rapier3d::prelude::{Group, RapierConfiguration, TimestepMode};

mod constraint;
mod raycast;

pub use constraint::*;
pub use raycast::*;
pub use raycast::Ray;

pub const WALLS_GROUP: Group = Group::GROUP_1;
pub const PROPS_GROUP: Group = Group::GROUP_2;
pub const PORTAL_GROUP: Group = Group::GROUP_3;
pub const PLAYER_GROUP: Group = Group::GROUP_4;
pub const RAYCAST_GROUP: Group = Group::GROUP_5;
pub const GROUND_GROUP: Group = Group::GROUP_6;
pub const BLOCK_PORTAL_GROUP: Group = Group::GROUP_7;
pub const ROOM_BOUNDARY_GROUP: Group = Group::GROUP_8;
pub const ALL_GROUPS: Group = Group::ALL;

/// Geometry that never moves: walls, floors and ceilings.
pub const STATIC_GROUPS: Group = WALLS_GROUP.union(GROUND_GROUP);
/// Everything that stops a portal projectile.
pub const PROJECTILE_GROUPS: Group = STATIC_GROUPS.union(BLOCK_PORTAL_GROUP);

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<RoomIndex>()
            .register_type::<RoomMember>()
            .register_type::<RoomBoundary>()
            .register_type::<Grabbable>()
            .add_startup_system(configure_rapier);
    }
}

fn configure_rapier(mut config: ResMut<RapierConfiguration>) {
    // Extra CCD substeps because grabbed props get dragged around fast
    config.timestep_mode = TimestepMode::Variable {
        max_dt: 1. / 20.,
        time_scale: 1.,
        substeps: 4,
    }
}
