use hashbrown::HashMap;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum StatType {
    Speed,
    Attack,
    MaxHp,
    Cooldown,
    Area,
    ProjectileCount,
}

/// Application order is fixed: Flat, then PercentAdd, then PercentMult.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ModifierOp {
    Flat,
    PercentAdd,
    PercentMult,
}

/// One stat-altering effect. `expires_at` is simulation time; 0 means
/// permanent. Non-stacking modifiers refresh in place per `(source, stat)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatModifier {
    pub stat: StatType,
    pub op: ModifierOp,
    pub value: f32,
    pub source_id: i32,
    pub expires_at: f32,
    pub stacking: bool,
}

impl StatModifier {
    pub fn permanent(stat: StatType, op: ModifierOp, value: f32, source_id: i32) -> StatModifier {
        StatModifier {
            stat,
            op,
            value,
            source_id,
            expires_at: 0.0,
            stacking: false,
        }
    }
}

/// Layered stat calculator with per-stat caching.
///
/// `get_stat` = round₃((base + ΣFlat) × (1 + ΣPercentAdd) × ΠPercentMult),
/// with per-stat clamps (Speed never drops under 0.1). The cache is
/// invalidated by dirty bits set on every mutation of a stat's inputs.
pub struct ModifierContainer {
    base: HashMap<StatType, f32>,
    modifiers: Vec<StatModifier>,
    cache: HashMap<StatType, f32>,
    dirty: HashMap<StatType, bool>,
}

impl ModifierContainer {
    pub fn new() -> ModifierContainer {
        ModifierContainer {
            base: HashMap::new(),
            // Most entities carry zero to two modifiers.
            modifiers: Vec::with_capacity(2),
            cache: HashMap::new(),
            dirty: HashMap::new(),
        }
    }

    pub fn set_base(&mut self, stat: StatType, value: f32) {
        self.base.insert(stat, value);
        self.set_dirty(stat);
    }

    pub fn base(&self, stat: StatType) -> f32 {
        self.base.get(&stat).copied().unwrap_or(0.0)
    }

    /// Non-stacking modifiers replace any previous non-stacking entry from
    /// the same source on the same stat (refresh, not stack).
    pub fn add_modifier(&mut self, modifier: StatModifier) {
        if !modifier.stacking {
            self.modifiers.retain(|existing| {
                !(existing.source_id == modifier.source_id
                    && existing.stat == modifier.stat
                    && !existing.stacking)
            });
        }

        self.set_dirty(modifier.stat);
        self.modifiers.push(modifier);
    }

    pub fn remove_by_source(&mut self, source_id: i32) {
        let mut touched = Vec::new();
        self.modifiers.retain(|modifier| {
            if modifier.source_id == source_id {
                touched.push(modifier.stat);
                false
            } else {
                true
            }
        });

        for stat in touched {
            self.set_dirty(stat);
        }
    }

    pub fn remove_by_source_and_stat(&mut self, source_id: i32, stat: StatType) {
        let before = self.modifiers.len();
        self.modifiers
            .retain(|modifier| !(modifier.source_id == source_id && modifier.stat == stat));

        if self.modifiers.len() != before {
            self.set_dirty(stat);
        }
    }

    pub fn clear(&mut self) {
        self.modifiers.clear();
        self.cache.clear();
        self.dirty.clear();
    }

    /// Drops modifiers whose expiry has passed. Permanent entries
    /// (`expires_at == 0`) are never touched.
    pub fn update(&mut self, now: f32) {
        let mut touched = Vec::new();
        self.modifiers.retain(|modifier| {
            if modifier.expires_at > 0.0 && now >= modifier.expires_at {
                touched.push(modifier.stat);
                false
            } else {
                true
            }
        });

        for stat in touched {
            self.set_dirty(stat);
        }
    }

    pub fn get_stat(&mut self, stat: StatType) -> f32 {
        let dirty = self.dirty.get(&stat).copied().unwrap_or(false);
        if dirty || !self.cache.contains_key(&stat) {
            let value = self.calculate(stat);
            self.cache.insert(stat, value);
            self.dirty.insert(stat, false);
        }

        self.cache[&stat]
    }

    pub fn modifier_count(&self) -> usize {
        self.modifiers.len()
    }

    fn calculate(&self, stat: StatType) -> f32 {
        let mut flat_sum = 0.0f32;
        let mut percent_add_sum = 0.0f32;
        let mut percent_mult_product = 1.0f32;

        for modifier in &self.modifiers {
            if modifier.stat != stat {
                continue;
            }

            match modifier.op {
                ModifierOp::Flat => flat_sum += modifier.value,
                ModifierOp::PercentAdd => percent_add_sum += modifier.value,
                ModifierOp::PercentMult => percent_mult_product *= modifier.value,
            }
        }

        let mut result = (self.base(stat) + flat_sum) * (1.0 + percent_add_sum) * percent_mult_product;

        // Round to 3 decimal places to suppress floating point drift.
        result = (result * 1000.0).round() / 1000.0;

        if stat == StatType::Speed && result < 0.1 {
            result = 0.1;
        }

        result
    }

    fn set_dirty(&mut self, stat: StatType) {
        self.dirty.insert(stat, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speed(op: ModifierOp, value: f32, source_id: i32) -> StatModifier {
        StatModifier::permanent(StatType::Speed, op, value, source_id)
    }

    #[test]
    fn test_layered_formula() {
        let mut stats = ModifierContainer::new();
        stats.set_base(StatType::Speed, 10.0);

        stats.add_modifier(speed(ModifierOp::Flat, 5.0, 1));
        stats.add_modifier(speed(ModifierOp::PercentAdd, 0.2, 2));
        stats.add_modifier(speed(ModifierOp::PercentMult, 0.5, 3));

        // (10 + 5) * 1.2 * 0.5
        assert_eq!(stats.get_stat(StatType::Speed), 9.0);
    }

    #[test]
    fn test_non_stacking_refreshes() {
        let mut stats = ModifierContainer::new();
        stats.set_base(StatType::Speed, 10.0);

        stats.add_modifier(speed(ModifierOp::Flat, 5.0, 1));
        stats.add_modifier(speed(ModifierOp::PercentAdd, 0.2, 2));
        stats.add_modifier(speed(ModifierOp::PercentMult, 0.5, 3));
        assert_eq!(stats.get_stat(StatType::Speed), 9.0);

        // Same source, same stat, stacking = false: refresh, not stack.
        stats.add_modifier(speed(ModifierOp::Flat, 5.0, 1));
        assert_eq!(stats.get_stat(StatType::Speed), 9.0);
        assert_eq!(stats.modifier_count(), 3);
    }

    #[test]
    fn test_stacking_accumulates() {
        let mut stats = ModifierContainer::new();
        stats.set_base(StatType::Attack, 10.0);

        let mut buff = StatModifier::permanent(StatType::Attack, ModifierOp::Flat, 2.0, 7);
        buff.stacking = true;

        stats.add_modifier(buff);
        stats.add_modifier(buff);
        stats.add_modifier(buff);
        assert_eq!(stats.get_stat(StatType::Attack), 16.0);
    }

    #[test]
    fn test_expiry_boundary() {
        let mut stats = ModifierContainer::new();
        stats.set_base(StatType::Speed, 10.0);

        let mut buff = speed(ModifierOp::Flat, 5.0, 1);
        buff.expires_at = 100.0;
        stats.add_modifier(buff);

        stats.update(99.0);
        assert_eq!(stats.get_stat(StatType::Speed), 15.0);

        // Expiry is inclusive: at exactly t=100 the modifier is gone.
        stats.update(100.0);
        assert_eq!(stats.get_stat(StatType::Speed), 10.0);
    }

    #[test]
    fn test_permanent_never_expires() {
        let mut stats = ModifierContainer::new();
        stats.set_base(StatType::Speed, 10.0);
        stats.add_modifier(speed(ModifierOp::Flat, 5.0, 1));

        stats.update(1.0e9);
        assert_eq!(stats.get_stat(StatType::Speed), 15.0);
    }

    #[test]
    fn test_speed_clamp() {
        let mut stats = ModifierContainer::new();
        stats.set_base(StatType::Speed, 10.0);
        stats.add_modifier(speed(ModifierOp::PercentMult, 0.0, 1));

        assert_eq!(stats.get_stat(StatType::Speed), 0.1);

        // Other stats are not clamped.
        stats.set_base(StatType::Attack, 10.0);
        stats.add_modifier(StatModifier::permanent(StatType::Attack, ModifierOp::PercentMult, 0.0, 2));
        assert_eq!(stats.get_stat(StatType::Attack), 0.0);
    }

    #[test]
    fn test_remove_by_source() {
        let mut stats = ModifierContainer::new();
        stats.set_base(StatType::Speed, 10.0);
        stats.set_base(StatType::Attack, 10.0);

        stats.add_modifier(speed(ModifierOp::Flat, 5.0, 1));
        stats.add_modifier(StatModifier::permanent(StatType::Attack, ModifierOp::Flat, 3.0, 1));
        stats.add_modifier(speed(ModifierOp::Flat, 2.0, 2));

        stats.remove_by_source(1);
        assert_eq!(stats.get_stat(StatType::Speed), 12.0);
        assert_eq!(stats.get_stat(StatType::Attack), 10.0);

        stats.remove_by_source_and_stat(2, StatType::Speed);
        assert_eq!(stats.get_stat(StatType::Speed), 10.0);
    }

    #[test]
    fn test_rounding_suppresses_drift() {
        let mut stats = ModifierContainer::new();
        stats.set_base(StatType::Area, 1.0);
        for i in 0..10 {
            let mut buff = StatModifier::permanent(StatType::Area, ModifierOp::PercentAdd, 0.1, 100 + i);
            buff.stacking = true;
            stats.add_modifier(buff);
        }

        // 1.0 * (1 + 10 * 0.1) with accumulated float error rounds to 2.0.
        assert_eq!(stats.get_stat(StatType::Area), 2.0);
    }
}
