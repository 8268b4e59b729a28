// hull_physics.rs — per-frame hull movement: slide, bounce and hull-vs-hull pushes

use log::trace;
use oxy_common::hullmove::{calculate_hull_slide_movement, hull_overlap, is_within_radius, HullTracer};
use oxy_common::q_shared::{
    vector_add, vector_length_squared, vector_normalize, vector_reflect, vector_scale,
    vector_subtract, EntityId, Vec3,
};

use crate::entity::{CollisionResponse, EntityArena, EnvPush, HullComponent};
use crate::world_config::WorldConfig;

/// Moves shorter than this (squared) skip hull clipping and leave the
/// position untouched.
const MIN_MOVE_SQ: f32 = 1e-4;

// ============================================================
// Events
// ============================================================

/// Collision notifications queued during `World::update`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HullEvent {
    /// `entity` overlapped `other`; `push` is the separation applied to
    /// `entity` when both are solid.
    Collide {
        entity: EntityId,
        other: EntityId,
        position: Vec3,
        push: Vec3,
    },
    /// `entity` bounced off the world (`other == None`) or another hull.
    Bounce {
        entity: EntityId,
        other: Option<EntityId>,
        position: Vec3,
    },
}

// ============================================================
// Physics step
// ============================================================

/// Shared read-only state for stepping one hull.
pub struct HullStep<'a, T: HullTracer> {
    pub tracer: &'a T,
    pub entities: &'a EntityArena,
    pub config: &'a WorldConfig,
    pub dt: f32,
}

impl<T: HullTracer> HullStep<'_, T> {
    /// Advance `hull` owned by `id`. Returns the new position.
    pub fn run(
        &self,
        id: EntityId,
        position: &Vec3,
        hull: &mut HullComponent,
        events: &mut Vec<HullEvent>,
    ) -> Vec3 {
        match hull.response {
            CollisionResponse::None => *position,
            CollisionResponse::Slide => self.slide(id, position, hull, events),
            CollisionResponse::Bounce => self.bounce(id, position, hull, events),
        }
    }

    fn slide(&self, id: EntityId, position: &Vec3, hull: &mut HullComponent, events: &mut Vec<HullEvent>) -> Vec3 {
        let dt = self.dt;
        let gravity = hull.gravity * self.config.gravity_scale;

        let mut start = *position;
        if gravity != 0.0 {
            start[2] += self.config.step_lift * dt;
        }
        let moved = calculate_hull_slide_movement(
            self.tracer,
            hull.hull,
            &start,
            &vector_scale(&hull.velocity, dt),
        );

        let mut target = moved;
        if gravity != 0.0 {
            let fall = [moved[0], moved[1], moved[2] - gravity * dt];
            let tr = self.tracer.hull_trace(hull.hull, &moved, &fall);
            if tr.hit {
                hull.velocity[2] = 0.0;
                target = tr.end_pos;
            } else {
                hull.velocity[2] -= gravity * dt;
            }
        }

        let out = self.clip_to_hulls(id, position, &target, hull, events);
        apply_drag(hull, dt);
        out
    }

    fn bounce(&self, id: EntityId, position: &Vec3, hull: &mut HullComponent, events: &mut Vec<HullEvent>) -> Vec3 {
        let dt = self.dt;
        let end = vector_add(position, &vector_scale(&hull.velocity, dt));
        let tr = self.tracer.hull_trace(hull.hull, position, &end);

        let out = if tr.hit {
            hull.velocity = vector_scale(&vector_reflect(&hull.velocity, &tr.plane_normal), hull.restitution);
            events.push(HullEvent::Bounce {
                entity: id,
                other: None,
                position: tr.end_pos,
            });
            self.clip_to_hulls(id, position, &tr.end_pos, hull, events)
        } else {
            self.clip_to_hulls(id, position, &end, hull, events)
        };

        hull.velocity[2] -= hull.gravity * self.config.gravity_scale * dt;
        apply_drag(hull, dt);
        out
    }

    /// Push `new_pos` out of every overlapping solid hull, scanning the
    /// entity list in order. Each push uses the position left by the
    /// previous one.
    pub fn clip_to_hulls(
        &self,
        id: EntityId,
        old_pos: &Vec3,
        new_pos: &Vec3,
        hull: &mut HullComponent,
        events: &mut Vec<HullEvent>,
    ) -> Vec3 {
        if vector_length_squared(&vector_subtract(new_pos, old_pos)) < MIN_MOVE_SQ {
            return *old_pos;
        }

        let mut final_pos = *new_pos;
        for (other_id, other) in self.entities.iter() {
            if other_id == id {
                continue;
            }
            let Some(other_hull) = other.active_hull() else {
                continue;
            };
            if other_hull.ignores(Some(id)) || hull.ignores(Some(other_id)) {
                continue;
            }
            let Some(contact) = hull_overlap(&other.position, other_hull.hull, &final_pos, hull.hull) else {
                continue;
            };

            events.push(HullEvent::Collide {
                entity: id,
                other: other_id,
                position: contact.position,
                push: contact.push,
            });
            if hull.response == CollisionResponse::Bounce {
                events.push(HullEvent::Bounce {
                    entity: id,
                    other: Some(other_id),
                    position: contact.position,
                });
            }

            if other_hull.solid && hull.solid {
                final_pos = vector_add(&final_pos, &contact.push);
                if hull.response == CollisionResponse::Bounce {
                    let mut n = contact.push;
                    if vector_normalize(&mut n) > 0.0 {
                        hull.velocity = vector_scale(&vector_reflect(&hull.velocity, &n), hull.restitution);
                    }
                }
                trace!("hull {:?} pushed out of {:?} by {:?}", id, other_id, contact.push);
            }
        }
        final_pos
    }
}

fn apply_drag(hull: &mut HullComponent, dt: f32) {
    let keep = 1.0 - hull.drag * dt;
    hull.velocity[0] *= keep;
    hull.velocity[1] *= keep;
}

// ============================================================
// Push volumes
// ============================================================

/// Add the push velocity to `target` on the frame it enters the radius.
/// Returns true when a push was applied.
pub fn apply_env_push(push: &mut EnvPush, origin: &Vec3, target_pos: &Vec3, target: &mut HullComponent) -> bool {
    if !is_within_radius(target_pos, target.hull, origin, push.radius) {
        push.is_pushing = false;
        return false;
    }
    let entered = !push.is_pushing;
    if entered {
        target.velocity = vector_add(&target.velocity, &push.velocity);
    }
    push.is_pushing = true;
    entered
}
