// entity.rs — entity arena, flags and the components the world drives

use bitflags::bitflags;
use oxy_common::q_shared::{CollisionHull, EntityId, Vec3, VEC3_ORIGIN};

use crate::camera::CameraRig;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct EntityFlags: u32 {
        /// Skipped by update, render and every hull query.
        const DISABLED     = 0x0001;
        const STATIC       = 0x0002;
        const DYNAMIC      = 0x0004;
        const RENDERABLE   = 0x0008;
        const HAS_HULL     = 0x0010;
        const LOCAL_PLAYER = 0x0020;
    }
}

// ============================================================
// Components
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionResponse {
    None,
    Slide,
    #[default]
    Bounce,
}

/// Collision hull plus the motion state the hull physics integrates.
#[derive(Debug, Clone, PartialEq)]
pub struct HullComponent {
    pub hull: CollisionHull,
    pub velocity: Vec3,
    /// Downward acceleration in units per second squared.
    pub gravity: f32,
    /// Horizontal velocity lost per second, as a fraction.
    pub drag: f32,
    /// Pushes other solid hulls out on overlap.
    pub solid: bool,
    /// Velocity multiplier applied on every bounce.
    pub restitution: f32,
    pub response: CollisionResponse,
    pub enabled: bool,
    ignore: Vec<EntityId>,
}

impl Default for HullComponent {
    fn default() -> Self {
        Self {
            hull: CollisionHull::None,
            velocity: VEC3_ORIGIN,
            gravity: 0.0,
            drag: 0.0,
            solid: true,
            restitution: 1.0,
            response: CollisionResponse::Bounce,
            enabled: true,
            ignore: Vec::new(),
        }
    }
}

impl HullComponent {
    pub fn new(hull: CollisionHull, response: CollisionResponse) -> Self {
        Self {
            hull,
            response,
            ..Default::default()
        }
    }

    pub fn add_to_ignore_list(&mut self, id: EntityId) {
        if !self.ignore.contains(&id) {
            self.ignore.push(id);
        }
    }

    /// `None` stands for "no entity" and is never ignored.
    pub fn ignores(&self, id: Option<EntityId>) -> bool {
        id.is_some_and(|id| self.ignore.contains(&id))
    }
}

/// Trigger volume that adds its velocity to the local player once per
/// entry into its radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvPush {
    pub velocity: Vec3,
    pub radius: f32,
    pub is_pushing: bool,
}

impl EnvPush {
    pub fn new(velocity: Vec3, radius: f32) -> Self {
        Self {
            velocity,
            radius,
            is_pushing: false,
        }
    }
}

// ============================================================
// Entity
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct Entity {
    pub position: Vec3,
    pub flags: EntityFlags,
    pub hull: Option<HullComponent>,
    pub camera: Option<CameraRig>,
    pub env_push: Option<EnvPush>,
    /// Render occlusion box relative to `position`.
    pub render_mins: Vec3,
    pub render_maxs: Vec3,
}

impl Entity {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.flags.contains(EntityFlags::DISABLED)
    }

    /// The hull component, when it takes part in collision at all.
    pub fn active_hull(&self) -> Option<&HullComponent> {
        if self.is_disabled() || !self.flags.contains(EntityFlags::HAS_HULL) {
            return None;
        }
        self.hull.as_ref().filter(|h| h.enabled)
    }

    pub fn set_hull(&mut self, hull: HullComponent) {
        self.flags.insert(EntityFlags::HAS_HULL);
        self.hull = Some(hull);
    }
}

// ============================================================
// Arena
// ============================================================

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Slot storage for entities. Removing an entity bumps its slot's
/// generation so every outstanding id for it resolves to `None`.
#[derive(Debug, Clone, Default)]
pub struct EntityArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    count: usize,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        self.count += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entity = Some(entity);
            return EntityId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entity: Some(entity),
        });
        EntityId { index, generation: 0 }
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let entity = slot.entity.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.count -= 1;
        Some(entity)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.entity.as_ref())
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.entity.as_mut())
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.entity.as_ref().map(|e| {
                (
                    EntityId {
                        index: i as u32,
                        generation: s.generation,
                    },
                    e,
                )
            })
        })
    }

    /// Snapshot of live ids, for loops that mutate while they walk.
    pub fn ids(&self) -> Vec<EntityId> {
        self.iter().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================
    // Arena
    // ============================================================

    #[test]
    fn test_spawn_and_get() {
        let mut arena = EntityArena::new();
        let a = arena.spawn(Entity::at([1.0, 2.0, 3.0]));
        let b = arena.spawn(Entity::default());
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a).map(|e| e.position), Some([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_stale_id_resolves_to_none() {
        let mut arena = EntityArena::new();
        let a = arena.spawn(Entity::default());
        assert!(arena.remove(a).is_some());
        let b = arena.spawn(Entity::at([5.0, 0.0, 0.0]));
        // slot reused with a new generation
        assert_eq!(a.index, b.index);
        assert_ne!(a.generation, b.generation);
        assert!(arena.get(a).is_none());
        assert!(arena.get_mut(a).is_none());
        assert!(arena.remove(a).is_none());
        assert!(arena.contains(b));
    }

    #[test]
    fn test_double_remove() {
        let mut arena = EntityArena::new();
        let a = arena.spawn(Entity::default());
        assert!(arena.remove(a).is_some());
        assert!(arena.remove(a).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn test_iter_skips_removed() {
        let mut arena = EntityArena::new();
        let a = arena.spawn(Entity::default());
        let b = arena.spawn(Entity::default());
        let c = arena.spawn(Entity::default());
        arena.remove(b);
        assert_eq!(arena.ids(), vec![a, c]);
    }

    // ============================================================
    // Components
    // ============================================================

    #[test]
    fn test_hull_defaults() {
        let hull = HullComponent::default();
        assert!(hull.solid);
        assert!(hull.enabled);
        assert_eq!(hull.restitution, 1.0);
        assert_eq!(hull.response, CollisionResponse::Bounce);
    }

    #[test]
    fn test_ignore_list() {
        let mut hull = HullComponent::new(CollisionHull::Player, CollisionResponse::Slide);
        let id = EntityId { index: 3, generation: 1 };
        hull.add_to_ignore_list(id);
        hull.add_to_ignore_list(id);
        assert!(hull.ignores(Some(id)));
        assert!(!hull.ignores(Some(EntityId { index: 3, generation: 2 })));
        assert!(!hull.ignores(None));
    }

    #[test]
    fn test_active_hull_needs_flag_and_enabled() {
        let mut ent = Entity::default();
        ent.hull = Some(HullComponent::new(CollisionHull::Player, CollisionResponse::Slide));
        assert!(ent.active_hull().is_none());
        ent.flags.insert(EntityFlags::HAS_HULL);
        assert!(ent.active_hull().is_some());
        ent.flags.insert(EntityFlags::DISABLED);
        assert!(ent.active_hull().is_none());
        ent.flags.remove(EntityFlags::DISABLED);
        if let Some(h) = ent.hull.as_mut() {
            h.enabled = false;
        }
        assert!(ent.active_hull().is_none());
    }
}
