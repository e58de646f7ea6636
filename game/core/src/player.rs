use crate::emitter::{weapon_for_skill, Emitter};
use crate::modifier::{ModifierContainer, StatType};
use flint::{ObjectId, SessionId, UserId};

pub const BASE_SPEED: f32 = 200.0;
pub const BASE_MAX_HP: f32 = 100.0;
pub const BASE_ATTACK: f32 = 10.0;

/// Seconds a downed player waits before reviving.
pub const REVIVE_DELAY: f32 = 5.0;

/// Per-room player state. Holds the session id as a weak handle: the
/// session itself is reached through the registry, never owned here, so
/// the room -> player -> session -> player cycle cannot form.
pub struct Player {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub object_id: ObjectId,
    pub name: String,
    pub stats: ModifierContainer,
    pub weapons: Vec<Emitter>,
    pub exp: i32,
    pub level: i32,
    /// Level-up options offered and not yet consumed.
    pub pending_options: Vec<i32>,
    /// Simulation time at which a downed player revives.
    pub revive_at: f32,
}

impl Player {
    pub fn new(session_id: SessionId, user_id: UserId, object_id: ObjectId, name: String) -> Player {
        let mut stats = ModifierContainer::new();
        stats.set_base(StatType::Speed, BASE_SPEED);
        stats.set_base(StatType::MaxHp, BASE_MAX_HP);
        stats.set_base(StatType::Attack, BASE_ATTACK);
        stats.set_base(StatType::Cooldown, 1.0);
        stats.set_base(StatType::Area, 1.0);
        stats.set_base(StatType::ProjectileCount, 1.0);

        Player {
            session_id,
            user_id,
            object_id,
            name,
            stats,
            weapons: Vec::new(),
            exp: 0,
            level: 1,
            pending_options: Vec::new(),
            revive_at: 0.0,
        }
    }

    /// Applies persistent unlocks loaded from the user tables.
    pub fn apply_skills(&mut self, skills: &[(i32, i32)]) {
        for &(skill_id, level) in skills {
            self.set_weapon_level(skill_id, level);
        }
    }

    /// Adds the weapon at level 1, or raises its level by one. Returns the
    /// resulting level.
    pub fn add_or_level_weapon(&mut self, skill_id: i32) -> i32 {
        let current = self
            .weapons
            .iter()
            .find(|weapon| weapon.stats.skill_id == skill_id)
            .map(|weapon| weapon.stats.level)
            .unwrap_or(0);

        let next = current + 1;
        self.set_weapon_level(skill_id, next);
        next
    }

    fn set_weapon_level(&mut self, skill_id: i32, level: i32) {
        match self
            .weapons
            .iter_mut()
            .find(|weapon| weapon.stats.skill_id == skill_id)
        {
            Some(weapon) => weapon.set_level(level),
            None => self.weapons.push(Emitter::new(weapon_for_skill(skill_id, level))),
        }
    }

    pub fn exp_to_next(level: i32) -> i32 {
        10 + (level - 1) * 5
    }

    /// Returns how many levels were gained.
    pub fn gain_exp(&mut self, amount: i32) -> i32 {
        self.exp += amount;

        let mut gained = 0;
        while self.exp >= Self::exp_to_next(self.level) {
            self.exp -= Self::exp_to_next(self.level);
            self.level += 1;
            gained += 1;
        }
        gained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_stats() {
        let mut player = Player::new(1, 10, 1, "alice".to_string());
        assert_eq!(player.stats.get_stat(StatType::Speed), BASE_SPEED);
        assert_eq!(player.stats.get_stat(StatType::MaxHp), BASE_MAX_HP);
        assert_eq!(player.stats.get_stat(StatType::Area), 1.0);
    }

    #[test]
    fn test_weapon_level_progression() {
        let mut player = Player::new(1, 10, 1, "alice".to_string());

        assert_eq!(player.add_or_level_weapon(2), 1);
        assert_eq!(player.add_or_level_weapon(2), 2);
        assert_eq!(player.weapons.len(), 1);
        assert_eq!(player.weapons[0].stats.level, 2);

        assert_eq!(player.add_or_level_weapon(3), 1);
        assert_eq!(player.weapons.len(), 2);
    }

    #[test]
    fn test_apply_persistent_skills() {
        let mut player = Player::new(1, 10, 1, "alice".to_string());
        player.apply_skills(&[(1, 2), (3, 1)]);

        assert_eq!(player.weapons.len(), 2);
        assert_eq!(player.weapons[0].stats.level, 2);
    }

    #[test]
    fn test_exp_levels() {
        let mut player = Player::new(1, 10, 1, "alice".to_string());

        // Level 1 needs 10 exp.
        assert_eq!(player.gain_exp(9), 0);
        assert_eq!(player.gain_exp(1), 1);
        assert_eq!(player.level, 2);
        assert_eq!(player.exp, 0);

        // A big grant can gain several levels at once.
        assert_eq!(player.gain_exp(15 + 20), 2);
        assert_eq!(player.level, 4);
    }
}
