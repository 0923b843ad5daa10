//! Room scoped raycasts.
//!
//! The level is partitioned in rooms. Static geometry is tagged with the [`RoomMember`] component
//! and adjacent rooms are connected by [`RoomBoundary`] sensors. A ray only sees the geometry of
//! the room it is currently travelling through, and switches to the neighbouring room whenever it
//! crosses a boundary. Crossing a boundary never stops the ray.

use std::fmt;

use bevy::{ecs::system::SystemParam, prelude::*, reflect::FromReflect};
use bevy_rapier3d::prelude::*;

use super::{RAYCAST_GROUP, ROOM_BOUNDARY_GROUP};

/// Upper bound on the number of boundaries a single query walks through.
const MAX_ROOM_CROSSINGS: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Reflect, FromReflect)]
/// Identifier of a spatial partition of the level.
pub struct RoomIndex(pub u32);

impl fmt::Display for RoomIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Ray {
        Ray {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub point: Vec3,
    /// Zero when the hit was synthesized rather than found on a surface.
    pub normal: Vec3,
    pub distance: f32,
    /// Room the ray was in when it stopped.
    pub room: RoomIndex,
    /// The collider that stopped the ray, if any.
    pub object: Option<Entity>,
    /// The last portal boundary the ray went through, if any.
    pub through_portal: Option<Entity>,
}

impl RaycastHit {
    /// A hit at `distance` along `ray` that is not backed by any surface.
    pub fn synthesized(ray: &Ray, distance: f32, room: RoomIndex) -> RaycastHit {
        RaycastHit {
            point: ray.point_at(distance),
            normal: Vec3::ZERO,
            distance,
            room,
            object: None,
            through_portal: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Outcome of a room scoped raycast.
///
/// `blocked` tells whether a surface stopped the ray. `hit.room` is valid in both cases: on a
/// miss it is the room the ray ended up in after crossing every boundary along the segment.
pub struct RaycastResult {
    pub blocked: bool,
    pub hit: RaycastHit,
}

impl RaycastResult {
    pub fn miss(
        ray: &Ray,
        max_distance: f32,
        room: RoomIndex,
        through_portal: Option<Entity>,
    ) -> RaycastResult {
        RaycastResult {
            blocked: false,
            hit: RaycastHit {
                through_portal,
                ..RaycastHit::synthesized(ray, max_distance, room)
            },
        }
    }

    pub fn room(&self) -> RoomIndex {
        self.hit.room
    }

    pub fn blocking_hit(&self) -> Option<&RaycastHit> {
        self.blocked.then_some(&self.hit)
    }
}

/// Collision query against the level, scoped to one room.
pub trait RoomRaycaster {
    /// Cast `ray` from `room` against colliders in `mask`, up to `max_distance`.
    fn raycast(&self, room: RoomIndex, ray: &Ray, mask: Group, max_distance: f32)
        -> RaycastResult;
}

#[derive(Debug, Clone, Copy, Default, Component, Reflect, FromReflect)]
#[reflect(Component)]
/// Tags a collider as belonging to a room. Untagged colliders are visible from every room.
pub struct RoomMember(pub RoomIndex);

#[derive(Debug, Clone, Copy, Default, Component, Reflect, FromReflect)]
#[reflect(Component)]
/// Sensor separating two rooms.
pub struct RoomBoundary {
    pub a: RoomIndex,
    pub b: RoomIndex,
    /// World space direction pointing from room `a` into room `b`.
    pub normal: Vec3,
    /// The boundary is an open portal surface rather than a doorway.
    pub portal: bool,
}

impl RoomBoundary {
    pub fn touches(&self, room: RoomIndex) -> bool {
        self.a == room || self.b == room
    }

    /// Room reached by a ray travelling along `direction` through the boundary. The side is picked
    /// from the direction alone, so entering the sensor volume again from the inside is a no-op.
    pub fn destination(&self, from: RoomIndex, direction: Vec3) -> RoomIndex {
        if !self.touches(from) {
            return from;
        }
        let side = direction.dot(self.normal);
        if side > 0. {
            self.b
        } else if side < 0. {
            self.a
        } else {
            from
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ImpactKind {
    Blocking,
    Boundary { to: RoomIndex, portal: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Impact {
    pub entity: Entity,
    pub toi: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub kind: ImpactKind,
}

/// Walk `ray` from `room`, letting `cast` find the nearest collider visible from the current
/// room along the rest of the segment. `cast` receives the room, the segment origin, the
/// remaining length and the boundary that was just crossed (to be ignored).
pub(crate) fn walk_rooms<F>(
    room: RoomIndex,
    ray: &Ray,
    max_distance: f32,
    mut cast: F,
) -> RaycastResult
where
    F: FnMut(RoomIndex, Vec3, f32, Option<Entity>) -> Option<Impact>,
{
    let mut room = room;
    let mut travelled = 0.;
    let mut last_boundary = None;
    let mut through_portal = None;

    for _ in 0..MAX_ROOM_CROSSINGS {
        let impact = match cast(
            room,
            ray.point_at(travelled),
            max_distance - travelled,
            last_boundary,
        ) {
            Some(impact) => impact,
            None => break,
        };
        let distance = travelled + impact.toi;
        match impact.kind {
            ImpactKind::Blocking => {
                return RaycastResult {
                    blocked: true,
                    hit: RaycastHit {
                        point: impact.point,
                        normal: impact.normal,
                        distance,
                        room,
                        object: Some(impact.entity),
                        through_portal,
                    },
                };
            }
            ImpactKind::Boundary { to, portal } => {
                room = to;
                travelled = distance;
                last_boundary = Some(impact.entity);
                if portal {
                    through_portal = Some(impact.entity);
                }
            }
        }
    }

    RaycastResult::miss(ray, max_distance, room, through_portal)
}

/// [`RoomRaycaster`] backed by the Rapier query pipeline.
#[derive(SystemParam)]
pub struct RapierRoomRaycaster<'w, 's> {
    rapier: Res<'w, RapierContext>,
    members: Query<'w, 's, &'static RoomMember>,
    boundaries: Query<'w, 's, &'static RoomBoundary>,
}

impl<'w, 's> RapierRoomRaycaster<'w, 's> {
    fn visible_from(&self, entity: Entity, room: RoomIndex) -> bool {
        if let Ok(boundary) = self.boundaries.get(entity) {
            return boundary.touches(room);
        }
        self.members
            .get(entity)
            .map(|member| member.0 == room)
            .unwrap_or(true)
    }
}

impl<'w, 's> RoomRaycaster for RapierRoomRaycaster<'w, 's> {
    fn raycast(
        &self,
        room: RoomIndex,
        ray: &Ray,
        mask: Group,
        max_distance: f32,
    ) -> RaycastResult {
        walk_rooms(room, ray, max_distance, |room, origin, remaining, exclude| {
            let predicate = |entity: Entity| self.visible_from(entity, room);
            let mut filter = QueryFilter::new()
                .groups(CollisionGroups::new(RAYCAST_GROUP, mask | ROOM_BOUNDARY_GROUP).into())
                .predicate(&predicate);
            if let Some(exclude) = exclude {
                filter = filter.exclude_collider(exclude);
            }
            let (entity, intersection) = self.rapier.cast_ray_and_get_normal(
                origin,
                ray.direction,
                remaining,
                true,
                filter,
            )?;
            let kind = match self.boundaries.get(entity) {
                Ok(boundary) => ImpactKind::Boundary {
                    to: boundary.destination(room, ray.direction),
                    portal: boundary.portal,
                },
                Err(_) => ImpactKind::Blocking,
            };
            Some(Impact {
                entity,
                toi: intersection.toi,
                point: intersection.point,
                normal: intersection.normal,
                kind,
            })
        })
    }
}
