use crate::math::Vec2;
use flint::logging::{self, Logger};
use flint::{ObjectId, SessionId};
use hashbrown::HashMap;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum ObjectKind {
    Player = 0,
    Monster = 1,
    Projectile = 2,
}

impl ObjectKind {
    pub fn from_u8(value: u8) -> Option<ObjectKind> {
        match value {
            0 => Some(ObjectKind::Player),
            1 => Some(ObjectKind::Monster),
            2 => Some(ObjectKind::Projectile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum ObjectState {
    Idle = 0,
    Moving = 1,
    Downed = 2,
    Dead = 3,
}

/// Static tuning for one monster archetype.
pub struct MonsterDef {
    pub type_id: i32,
    pub hp: i32,
    pub speed: f32,
    pub attack: i32,
    pub exp: i32,
    /// Body radius; also the contact-damage range.
    pub radius: f32,
}

const MONSTER_DEFS: [MonsterDef; 3] = [
    MonsterDef {
        type_id: 1,
        hp: 30,
        speed: 80.0,
        attack: 5,
        exp: 3,
        radius: 20.0,
    },
    MonsterDef {
        type_id: 2,
        hp: 60,
        speed: 110.0,
        attack: 8,
        exp: 5,
        radius: 22.0,
    },
    MonsterDef {
        type_id: 3,
        hp: 200,
        speed: 55.0,
        attack: 15,
        exp: 20,
        radius: 40.0,
    },
];

pub fn monster_def(type_id: i32) -> &'static MonsterDef {
    MONSTER_DEFS
        .iter()
        .find(|def| def.type_id == type_id)
        .unwrap_or(&MONSTER_DEFS[0])
}

/// One live entity in a room. At most one object exists per id for the
/// lifetime of the room.
#[derive(Debug)]
pub struct GameObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub type_id: i32,
    pub pos: Vec2,
    pub velocity: Vec2,
    pub hp: i32,
    pub max_hp: i32,
    pub state: ObjectState,
    pub owner_session: Option<SessionId>,
    /// Seconds until the next contact attack (monsters).
    pub attack_timer: f32,
    /// Knockback stagger: steering is suppressed while positive.
    pub stagger: f32,
}

impl GameObject {
    pub fn new(id: ObjectId, kind: ObjectKind, type_id: i32, pos: Vec2, hp: i32) -> GameObject {
        GameObject {
            id,
            kind,
            type_id,
            pos,
            velocity: Vec2::ZERO,
            hp,
            max_hp: hp,
            state: ObjectState::Idle,
            owner_session: None,
            attack_timer: 0.0,
            stagger: 0.0,
        }
    }

    pub fn monster(id: ObjectId, type_id: i32, pos: Vec2) -> GameObject {
        let def = monster_def(type_id);
        GameObject::new(id, ObjectKind::Monster, type_id, pos, def.hp)
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state != ObjectState::Dead
    }
}

/// Object id -> entity table with a room-local id allocator. Ids are never
/// derived from session ids; the room allocates its own small integers.
pub struct ObjectManager {
    objects: HashMap<ObjectId, GameObject>,
    next_id: ObjectId,
    log: Logger,
}

impl ObjectManager {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(log: L) -> ObjectManager {
        ObjectManager {
            objects: HashMap::new(),
            next_id: 1,
            log: logging::child(log),
        }
    }

    pub fn alloc_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Inserting an already-used id is a programmer error: panics in debug,
    /// skips with a log in release.
    pub fn add_object(&mut self, object: GameObject) -> bool {
        if self.objects.contains_key(&object.id) {
            debug_assert!(false, "duplicate object id {}", object.id);
            logging::error!(self.log, "duplicate object id, insert skipped"; "object_id" => object.id);
            return false;
        }

        self.objects.insert(object.id, object);
        true
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Option<GameObject> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.values()
    }

    /// Id snapshot for iteration that mutates the table as it goes.
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        // Deterministic tick order regardless of hash seed.
        ids.sort_unstable();
        ids
    }

    pub fn count_of(&self, kind: ObjectKind) -> usize {
        self.objects.values().filter(|object| object.kind == kind).count()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.next_id = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove() {
        let mut manager = ObjectManager::new(None);

        let id = manager.alloc_id();
        assert!(manager.add_object(GameObject::new(id, ObjectKind::Player, 0, Vec2::ZERO, 100)));
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get(id).unwrap().hp, 100);

        let removed = manager.remove_object(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(manager.get(id).is_none());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "duplicate object id"))]
    fn test_duplicate_id_rejected() {
        let mut manager = ObjectManager::new(None);

        let id = manager.alloc_id();
        assert!(manager.add_object(GameObject::new(id, ObjectKind::Player, 0, Vec2::ZERO, 100)));
        // Release builds skip the insert; debug builds assert.
        assert!(!manager.add_object(GameObject::new(id, ObjectKind::Monster, 1, Vec2::ZERO, 30)));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_id_allocation_is_monotonic() {
        let mut manager = ObjectManager::new(None);
        let a = manager.alloc_id();
        let b = manager.alloc_id();
        assert!(b > a);
    }

    #[test]
    fn test_monster_from_def() {
        let monster = GameObject::monster(5, 2, Vec2::new(1.0, 2.0));
        assert_eq!(monster.hp, monster_def(2).hp);
        assert_eq!(monster.kind, ObjectKind::Monster);
        assert!(monster.is_alive());

        // Unknown type ids fall back to the first archetype.
        let fallback = GameObject::monster(6, 999, Vec2::ZERO);
        assert_eq!(fallback.hp, MONSTER_DEFS[0].hp);
    }

    #[test]
    fn test_count_of_kind() {
        let mut manager = ObjectManager::new(None);
        let a = manager.alloc_id();
        manager.add_object(GameObject::new(a, ObjectKind::Player, 0, Vec2::ZERO, 100));
        let b = manager.alloc_id();
        manager.add_object(GameObject::monster(b, 1, Vec2::ZERO));

        assert_eq!(manager.count_of(ObjectKind::Player), 1);
        assert_eq!(manager.count_of(ObjectKind::Monster), 1);
    }
}
