//! Damage emitters: the periodic sources attached to player weapons.
//! A trivial two-state machine drives them; the room applies the damage
//! through a grid range query when an emitter fires.

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EmitterState {
    Cooling,
    Active,
}

#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    pub skill_id: i32,
    pub level: i32,
    pub damage: i32,
    pub radius: f32,
    pub cooldown: f32,
    pub active_duration: f32,
    /// Impulse applied away from the owner on hit.
    pub knockback: f32,
}

/// Built-in weapon table, keyed by skill id. Damage scales with level.
pub fn weapon_for_skill(skill_id: i32, level: i32) -> WeaponStats {
    let level = level.max(1);
    let base = match skill_id {
        // Whirling aura: short reach, quick cadence.
        1 => WeaponStats {
            skill_id,
            level,
            damage: 6,
            radius: 90.0,
            cooldown: 1.5,
            active_duration: 0.4,
            knockback: 150.0,
        },
        // Nova burst: wide, slow, heavy push.
        2 => WeaponStats {
            skill_id,
            level,
            damage: 14,
            radius: 160.0,
            cooldown: 3.0,
            active_duration: 0.5,
            knockback: 320.0,
        },
        // Spike field: middle ground, almost no push.
        3 => WeaponStats {
            skill_id,
            level,
            damage: 9,
            radius: 120.0,
            cooldown: 2.0,
            active_duration: 0.3,
            knockback: 60.0,
        },
        _ => WeaponStats {
            skill_id,
            level,
            damage: 5,
            radius: 80.0,
            cooldown: 2.0,
            active_duration: 0.3,
            knockback: 100.0,
        },
    };

    WeaponStats {
        damage: base.damage + (level - 1) * base.damage / 2,
        ..base
    }
}

#[derive(Debug)]
pub struct Emitter {
    pub stats: WeaponStats,
    state: EmitterState,
    timer: f32,
}

impl Emitter {
    pub fn new(stats: WeaponStats) -> Emitter {
        Emitter {
            stats,
            state: EmitterState::Cooling,
            timer: stats.cooldown,
        }
    }

    pub fn state(&self) -> EmitterState {
        self.state
    }

    pub fn set_level(&mut self, level: i32) {
        self.stats = weapon_for_skill(self.stats.skill_id, level);
    }

    /// Advances the state machine. Returns true exactly when the Active
    /// phase elapses: that is the moment damage applies and the emitter
    /// returns to Cooling.
    pub fn update(&mut self, dt: f32) -> bool {
        self.timer -= dt;
        if self.timer > 0.0 {
            return false;
        }

        match self.state {
            EmitterState::Cooling => {
                self.state = EmitterState::Active;
                self.timer = self.stats.active_duration;
                false
            }
            EmitterState::Active => {
                self.state = EmitterState::Cooling;
                self.timer = self.stats.cooldown;
                true
            }
        }
    }
}
