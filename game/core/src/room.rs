use crate::grid::SpatialGrid;
use crate::math::Vec2;
use crate::modifier::{ModifierOp, StatModifier, StatType};
use crate::objects::{monster_def, GameObject, ObjectKind, ObjectManager, ObjectState};
use crate::player::{Player, BASE_ATTACK, REVIVE_DELAY};
use crate::protocol::{
    build_packet, send_to_session, Message, ObjectInfo, ObjectPos, SDamageEffect, SDespawnObject, SExpChange,
    SGameOver, SGameWin, SLevelUpOption, SMoveObjectBatch, SPlayerDowned, SPlayerRevive, SSkillEffect, SSpawnObject,
};
use crate::state::GameState;
use crate::userdb::UserDb;
use crate::wave::{WaveDef, WaveManager};
use flint::logging::{self, Logger};
use flint::{ObjectId, RoomId, SessionId};
use harrow::dispatch::strand::StrandKey;
use harrow::dispatch::timer::{TimerApi, TimerHandle};
use harrow::net::packet::PacketPool;
use harrow::net::session::SessionRegistry;
use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Duration;

/// 20 Hz fixed-step simulation.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);
pub const FIXED_DT: f32 = 0.05;

/// Grid cell size; large cells keep the full-broadcast phase cheap.
const GRID_CELL_SIZE: f32 = 100.0;

/// Body radius used for monster contact checks against players.
const PLAYER_RADIUS: f32 = 20.0;

/// Seconds a monster's steering stays suppressed after knockback.
const KNOCKBACK_STAGGER: f32 = 0.25;

/// Seconds between contact attacks from one monster.
const CONTACT_ATTACK_INTERVAL: f32 = 1.0;

/// Account points awarded to every member of a winning room.
const WIN_POINTS: i64 = 100;

const LEVEL_UP_OPTIONS: [i32; 6] = [1, 2, 3, 4, 5, 6];
const OPTIONS_PER_LEVEL: usize = 3;

/// Everything a room needs from the outside world for one call. Borrowed
/// from the framework and game state by [`GameState::split`].
pub struct RoomServices<'a> {
    pub sessions: &'a SessionRegistry,
    pub pool: &'a PacketPool,
    pub user_db: &'a UserDb,
    pub timers: &'a TimerApi<GameState>,
    pub log: &'a Logger,
}

/// The authoritative per-room simulation. All state in here is owned by
/// the logic thread and serialized through the room's strand; nothing
/// inside the tick takes a lock.
pub struct Room {
    room_id: RoomId,
    title: String,
    players: HashMap<SessionId, Player>,
    objects: ObjectManager,
    grid: SpatialGrid,
    waves: WaveManager,
    rng: StdRng,
    pub strand: StrandKey,
    pub timer_handle: Option<TimerHandle>,
    tick_count: u32,
    sim_time: f32,
    started: bool,
    game_over: bool,
    map_size: Vec2,
    /// Objects that died last tick; unlinked at the top of this tick.
    pending_removal: Vec<ObjectId>,
    log: Logger,
}

impl Room {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(
        room_id: RoomId,
        title: String,
        waves: Vec<WaveDef>,
        map_size: Vec2,
        log: L,
    ) -> Room {
        let log = logging::child(log);

        Room {
            room_id,
            title,
            players: HashMap::new(),
            objects: ObjectManager::new(&log),
            grid: SpatialGrid::new(GRID_CELL_SIZE),
            waves: WaveManager::new(waves),
            rng: StdRng::from_entropy(),
            strand: StrandKey::next(),
            timer_handle: None,
            tick_count: 0,
            sim_time: 0.0,
            started: false,
            game_over: false,
            map_size,
            pending_removal: Vec::new(),
            log,
        }
    }

    pub fn id(&self) -> RoomId {
        self.room_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_playing(&self) -> bool {
        self.started && !self.game_over
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn tick_count(&self) -> u32 {
        self.tick_count
    }

    pub fn sim_time(&self) -> f32 {
        self.sim_time
    }

    pub fn object_id_of(&self, session_id: SessionId) -> Option<ObjectId> {
        self.players.get(&session_id).map(|player| player.object_id)
    }

    pub fn objects(&self) -> &ObjectManager {
        &self.objects
    }

    // -----------------------------------------------------------------
    // Membership

    /// Adds a player: loads persistent skills, spawns the avatar, sends
    /// the newcomer a world snapshot and announces the spawn to the rest.
    /// Starts the game clock on the first entry.
    pub fn enter(
        &mut self,
        session_id: SessionId,
        user_id: flint::UserId,
        name: String,
        svc: &RoomServices<'_>,
    ) -> ObjectId {
        let object_id = self.objects.alloc_id();
        let mut player = Player::new(session_id, user_id, object_id, name);

        let skills = svc.user_db.get_user_skills(user_id);
        player.apply_skills(&skills);
        if !skills.is_empty() {
            logging::info!(self.log, "persistent skills applied";
                           "user_id" => user_id,
                           "skills" => skills.len());
        }

        let max_hp = player.stats.get_stat(StatType::MaxHp) as i32;
        let mut avatar = GameObject::new(object_id, ObjectKind::Player, 0, Vec2::ZERO, max_hp);
        avatar.owner_session = Some(session_id);

        self.objects.add_object(avatar);
        self.grid.add(object_id, Vec2::ZERO);
        self.players.insert(session_id, player);

        // World snapshot for the newcomer, including their own avatar.
        let snapshot = SSpawnObject {
            objects: self.objects.iter().map(object_info).collect(),
        };
        send_to_session(svc.sessions, svc.pool, session_id, &snapshot, svc.log);

        // The rest only need the new avatar.
        if let Some(object) = self.objects.get(object_id) {
            let announce = SSpawnObject {
                objects: vec![object_info(object)],
            };
            self.broadcast_except(&announce, session_id, svc);
        }

        logging::info!(self.log, "player entered";
                       "room_id" => self.room_id,
                       "session_id" => session_id,
                       "players" => self.players.len());

        if !self.started {
            self.started = true;
            self.waves.start();
            logging::info!(self.log, "game started"; "room_id" => self.room_id);
        }

        object_id
    }

    /// Removes a player and despawns the avatar immediately.
    pub fn leave(&mut self, session_id: SessionId, svc: &RoomServices<'_>) -> bool {
        let Some(player) = self.players.remove(&session_id) else {
            return false;
        };

        let object_id = player.object_id;
        if let Some(object) = self.objects.remove_object(object_id) {
            self.grid.remove(object_id, object.pos);
        }
        self.pending_removal.retain(|&id| id != object_id);

        self.broadcast(&SDespawnObject {
            object_ids: vec![object_id],
        }, svc);

        logging::info!(self.log, "player left";
                       "room_id" => self.room_id,
                       "session_id" => session_id,
                       "players" => self.players.len());
        true
    }

    /// Returns the room to its idle state. Called once the last player is
    /// gone and the tick timer is cancelled.
    pub fn reset(&mut self) {
        self.players.clear();
        self.objects.clear();
        self.grid.rebuild(std::iter::empty());
        self.waves.start();
        self.pending_removal.clear();
        self.tick_count = 0;
        self.sim_time = 0.0;
        self.started = false;
        self.game_over = false;

        logging::info!(self.log, "room reset"; "room_id" => self.room_id);
    }

    // -----------------------------------------------------------------
    // Input

    /// Applies a movement intent: velocity = direction x Speed stat.
    /// Direction components are clamped to the unit box; anything longer
    /// than a unit vector is normalized.
    pub fn set_player_direction(&mut self, session_id: SessionId, dir: Vec2) {
        let Some(player) = self.players.get_mut(&session_id) else {
            return;
        };
        let speed = player.stats.get_stat(StatType::Speed);

        let Some(object) = self.objects.get_mut(player.object_id) else {
            return;
        };
        if object.state == ObjectState::Downed || object.state == ObjectState::Dead {
            return;
        }

        let mut dir = Vec2::new(dir.x.clamp(-1.0, 1.0), dir.y.clamp(-1.0, 1.0));
        if dir.length_sq() > 1.0 {
            dir = dir.normalized();
        }

        object.velocity = dir * speed;
        object.state = if dir.is_zero() {
            ObjectState::Idle
        } else {
            ObjectState::Moving
        };
    }

    /// Adds or levels a weapon and announces the effect.
    pub fn use_skill(&mut self, session_id: SessionId, skill_id: i32, svc: &RoomServices<'_>) {
        let effect = {
            let Some(player) = self.players.get_mut(&session_id) else {
                return;
            };
            let level = player.add_or_level_weapon(skill_id);
            let pos = self
                .objects
                .get(player.object_id)
                .map(|object| object.pos)
                .unwrap_or(Vec2::ZERO);

            logging::debug!(self.log, "skill used";
                            "session_id" => session_id,
                            "skill_id" => skill_id,
                            "level" => level);

            SSkillEffect {
                caster_id: player.object_id,
                skill_id,
                x: pos.x,
                y: pos.y,
            }
        };

        self.broadcast(&effect, svc);
    }

    /// Consumes one pending level-up option if it was actually offered.
    pub fn select_level_up(&mut self, session_id: SessionId, option_id: i32) {
        let Some(player) = self.players.get_mut(&session_id) else {
            return;
        };
        let Some(index) = player.pending_options.iter().position(|&id| id == option_id) else {
            return;
        };
        player.pending_options.remove(index);

        let source = 9000 + option_id;
        let stacking = |stat, op, value| StatModifier {
            stat,
            op,
            value,
            source_id: source,
            expires_at: 0.0,
            stacking: true,
        };

        match option_id {
            1 => player.stats.add_modifier(stacking(StatType::Speed, ModifierOp::PercentAdd, 0.1)),
            2 => {
                player.stats.add_modifier(stacking(StatType::MaxHp, ModifierOp::Flat, 20.0));
                let max_hp = player.stats.get_stat(StatType::MaxHp) as i32;
                if let Some(object) = self.objects.get_mut(player.object_id) {
                    object.max_hp = max_hp;
                    object.hp = (object.hp + 20).min(max_hp);
                }
            }
            3 => player.stats.add_modifier(stacking(StatType::Attack, ModifierOp::Flat, 5.0)),
            4 => player.stats.add_modifier(stacking(StatType::Cooldown, ModifierOp::PercentMult, 0.9)),
            5 => player.stats.add_modifier(stacking(StatType::Area, ModifierOp::PercentAdd, 0.1)),
            _ => {
                let skill_id = *[1, 2, 3].choose(&mut self.rng).unwrap_or(&1);
                player.add_or_level_weapon(skill_id);
            }
        }
    }

    pub fn nearest_player(&self, from: Vec2) -> Option<(ObjectId, Vec2)> {
        let mut nearest: Option<(ObjectId, Vec2)> = None;
        let mut best = f32::MAX;

        for player in self.players.values() {
            let Some(object) = self.objects.get(player.object_id) else {
                continue;
            };
            if object.state == ObjectState::Downed || object.state == ObjectState::Dead {
                continue;
            }

            let dist = Vec2::distance_sq(object.pos, from);
            if dist < best {
                best = dist;
                nearest = Some((object.id, object.pos));
            }
        }

        nearest
    }

    // -----------------------------------------------------------------
    // Tick

    /// One fixed step of the authoritative simulation.
    pub fn update(&mut self, dt: f32, svc: &RoomServices<'_>) {
        if self.game_over {
            return;
        }

        self.unlink_dead();
        self.run_waves(dt, svc);

        let moves = self.integrate(dt);
        self.steer_monsters();
        self.run_emitters(dt, svc);
        self.contact_damage(dt, svc);
        self.revive_downed(svc);
        self.reap_dead(svc);

        if !moves.is_empty() {
            self.broadcast(&SMoveObjectBatch { moves }, svc);
        }

        for player in self.players.values_mut() {
            player.stats.update(self.sim_time);
        }

        self.check_win(svc);

        self.tick_count += 1;
        self.sim_time += dt;
    }

    /// Objects marked dead last tick leave the table and grid now.
    fn unlink_dead(&mut self) {
        let pending = std::mem::take(&mut self.pending_removal);
        for id in pending {
            if let Some(object) = self.objects.remove_object(id) {
                self.grid.remove(id, object.pos);
            }
        }
    }

    fn run_waves(&mut self, dt: f32, svc: &RoomServices<'_>) {
        if !self.started {
            return;
        }

        let requests = self.waves.update(dt, &mut self.rng);
        if requests.is_empty() {
            return;
        }

        let mut spawned = Vec::new();
        for request in requests {
            let id = self.objects.alloc_id();
            let monster = GameObject::monster(id, request.monster_type, request.pos);

            if self.objects.add_object(monster) {
                self.grid.add(id, request.pos);
                if let Some(object) = self.objects.get(id) {
                    spawned.push(object_info(object));
                }
            }
        }

        if !spawned.is_empty() {
            logging::debug!(self.log, "monsters spawned";
                            "room_id" => self.room_id,
                            "count" => spawned.len());
            self.broadcast(&SSpawnObject { objects: spawned }, svc);
        }
    }

    /// Euler integration at fixed dt, with map-bounds clamping and grid
    /// maintenance for every cell crossing.
    fn integrate(&mut self, dt: f32) -> Vec<ObjectPos> {
        let half = self.map_size * 0.5;
        let mut moves = Vec::new();

        for id in self.objects.ids() {
            let (old_pos, new_pos, velocity) = {
                let Some(object) = self.objects.get_mut(id) else {
                    continue;
                };
                if object.state == ObjectState::Dead || object.state == ObjectState::Downed {
                    continue;
                }
                if object.stagger > 0.0 {
                    object.stagger -= dt;
                }
                if object.velocity.is_zero() {
                    continue;
                }

                let old_pos = object.pos;
                let mut next = old_pos + object.velocity * dt;
                if half.x > 0.0 {
                    next.x = next.x.clamp(-half.x, half.x);
                }
                if half.y > 0.0 {
                    next.y = next.y.clamp(-half.y, half.y);
                }
                object.pos = next;
                (old_pos, next, object.velocity)
            };

            self.grid.update(id, old_pos, new_pos);
            moves.push(ObjectPos::new(id, new_pos, velocity));
        }

        moves
    }

    /// Monsters steer toward the nearest live player.
    fn steer_monsters(&mut self) {
        let targets: Vec<Vec2> = self
            .players
            .values()
            .filter_map(|player| self.objects.get(player.object_id))
            .filter(|object| object.is_alive() && object.state != ObjectState::Downed)
            .map(|object| object.pos)
            .collect();

        for id in self.objects.ids() {
            let Some(object) = self.objects.get_mut(id) else {
                continue;
            };
            if object.kind != ObjectKind::Monster || !object.is_alive() {
                continue;
            }
            if object.stagger > 0.0 {
                continue;
            }

            let nearest = targets
                .iter()
                .copied()
                .min_by(|a, b| {
                    Vec2::distance_sq(*a, object.pos)
                        .partial_cmp(&Vec2::distance_sq(*b, object.pos))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

            match nearest {
                Some(target) => {
                    let def = monster_def(object.type_id);
                    object.velocity = (target - object.pos).normalized() * def.speed;
                    object.state = ObjectState::Moving;
                }
                None => {
                    object.velocity = Vec2::ZERO;
                    object.state = ObjectState::Idle;
                }
            }
        }
    }

    /// Ticks every player weapon; a firing emitter damages and knocks back
    /// all monsters in its (Area-scaled) radius.
    fn run_emitters(&mut self, dt: f32, svc: &RoomServices<'_>) {
        let session_ids: Vec<SessionId> = self.players.keys().copied().collect();

        for session_id in session_ids {
            let (owner_pos, fired, damage_scale) = {
                let Some(player) = self.players.get_mut(&session_id) else {
                    continue;
                };
                let Some(object) = self.objects.get(player.object_id) else {
                    continue;
                };
                if object.state == ObjectState::Downed {
                    continue;
                }
                let owner_pos = object.pos;

                // Cooldown reduction accelerates the whole cycle.
                let haste = 1.0 / player.stats.get_stat(StatType::Cooldown).max(0.1);
                let area = player.stats.get_stat(StatType::Area).max(0.1);
                let damage_scale = player.stats.get_stat(StatType::Attack) / BASE_ATTACK;

                let mut fired = Vec::new();
                for weapon in &mut player.weapons {
                    if weapon.update(dt * haste) {
                        fired.push((weapon.stats, weapon.stats.radius * area));
                    }
                }
                (owner_pos, fired, damage_scale)
            };

            for (stats, radius) in fired {
                let amount = (stats.damage as f32 * damage_scale).round() as i32;
                let targets = self.grid.query_range(owner_pos, radius, &self.objects);

                for target_id in targets {
                    let effect = {
                        let Some(target) = self.objects.get_mut(target_id) else {
                            continue;
                        };
                        if target.kind != ObjectKind::Monster || !target.is_alive() {
                            continue;
                        }

                        target.hp -= amount;
                        target.velocity = (target.pos - owner_pos).normalized() * stats.knockback;
                        target.stagger = KNOCKBACK_STAGGER;

                        SDamageEffect {
                            object_id: target_id,
                            damage: amount,
                            hp: target.hp.max(0),
                        }
                    };
                    self.broadcast(&effect, svc);
                }
            }
        }
    }

    /// Monsters in contact range attack on a fixed cadence; players at
    /// zero hp go down rather than dying.
    fn contact_damage(&mut self, dt: f32, svc: &RoomServices<'_>) {
        let targets: Vec<(SessionId, ObjectId, Vec2)> = self
            .players
            .values()
            .filter_map(|player| {
                let object = self.objects.get(player.object_id)?;
                if object.is_alive() && object.state != ObjectState::Downed {
                    Some((player.session_id, object.id, object.pos))
                } else {
                    None
                }
            })
            .collect();

        let mut hits: Vec<(SessionId, ObjectId, i32)> = Vec::new();

        for id in self.objects.ids() {
            let Some(monster) = self.objects.get_mut(id) else {
                continue;
            };
            if monster.kind != ObjectKind::Monster || !monster.is_alive() {
                continue;
            }

            monster.attack_timer -= dt;
            if monster.attack_timer > 0.0 {
                continue;
            }

            let def = monster_def(monster.type_id);
            let reach = def.radius + PLAYER_RADIUS;
            let in_reach = targets
                .iter()
                .find(|(_, _, pos)| Vec2::distance_sq(*pos, monster.pos) <= reach * reach);

            if let Some(&(session_id, object_id, _)) = in_reach {
                monster.attack_timer = CONTACT_ATTACK_INTERVAL;
                hits.push((session_id, object_id, def.attack));
            }
        }

        let mut downed = Vec::new();
        for (session_id, object_id, attack) in hits {
            let effect = {
                let Some(object) = self.objects.get_mut(object_id) else {
                    continue;
                };
                if !object.is_alive() || object.state == ObjectState::Downed {
                    continue;
                }

                object.hp -= attack;
                if object.hp <= 0 {
                    object.hp = 0;
                    object.state = ObjectState::Downed;
                    object.velocity = Vec2::ZERO;
                    downed.push((session_id, object_id));
                }

                SDamageEffect {
                    object_id,
                    damage: attack,
                    hp: object.hp,
                }
            };
            self.broadcast(&effect, svc);
        }

        for (session_id, object_id) in downed {
            if let Some(player) = self.players.get_mut(&session_id) {
                player.revive_at = self.sim_time + REVIVE_DELAY;
            }
            logging::info!(self.log, "player downed";
                           "room_id" => self.room_id,
                           "session_id" => session_id);
            self.broadcast(&SPlayerDowned { object_id }, svc);
        }

        self.check_wipe(svc);
    }

    fn revive_downed(&mut self, svc: &RoomServices<'_>) {
        let session_ids: Vec<SessionId> = self.players.keys().copied().collect();

        for session_id in session_ids {
            let revive = {
                let Some(player) = self.players.get_mut(&session_id) else {
                    continue;
                };
                if self.sim_time < player.revive_at {
                    continue;
                }
                let Some(object) = self.objects.get_mut(player.object_id) else {
                    continue;
                };
                if object.state != ObjectState::Downed {
                    continue;
                }

                object.hp = object.max_hp / 2;
                object.state = ObjectState::Idle;
                SPlayerRevive {
                    object_id: object.id,
                    hp: object.hp,
                }
            };
            self.broadcast(&revive, svc);
        }
    }

    /// Marks spent monsters dead, batches the despawn, awards experience.
    /// The actual unlink happens next frame.
    fn reap_dead(&mut self, svc: &RoomServices<'_>) {
        let mut despawned = Vec::new();
        let mut exp_award = 0;

        for id in self.objects.ids() {
            let Some(object) = self.objects.get_mut(id) else {
                continue;
            };
            if object.kind == ObjectKind::Monster && object.hp <= 0 && object.state != ObjectState::Dead {
                object.state = ObjectState::Dead;
                object.velocity = Vec2::ZERO;
                exp_award += monster_def(object.type_id).exp;
                despawned.push(id);
            }
        }

        if despawned.is_empty() {
            return;
        }

        self.pending_removal.extend(&despawned);
        self.broadcast(&SDespawnObject {
            object_ids: despawned,
        }, svc);

        if exp_award > 0 {
            self.award_exp(exp_award, svc);
        }
    }

    fn award_exp(&mut self, amount: i32, svc: &RoomServices<'_>) {
        let session_ids: Vec<SessionId> = self.players.keys().copied().collect();

        for session_id in session_ids {
            let (change, options) = {
                let Some(player) = self.players.get_mut(&session_id) else {
                    continue;
                };
                let gained = player.gain_exp(amount);

                let options = if gained > 0 {
                    let rolled: Vec<i32> = LEVEL_UP_OPTIONS
                        .choose_multiple(&mut self.rng, OPTIONS_PER_LEVEL)
                        .copied()
                        .collect();
                    player.pending_options.extend(&rolled);
                    Some(SLevelUpOption { options: rolled })
                } else {
                    None
                };

                (
                    SExpChange {
                        object_id: player.object_id,
                        exp: player.exp,
                        level: player.level,
                    },
                    options,
                )
            };

            self.broadcast(&change, svc);
            if let Some(options) = options {
                send_to_session(svc.sessions, svc.pool, session_id, &options, svc.log);
            }
        }
    }

    /// Every wave finished and every monster cleared: the room is won.
    fn check_win(&mut self, svc: &RoomServices<'_>) {
        if !self.started
            || self.game_over
            || !self.waves.has_schedule()
            || !self.waves.finished()
            || !self.pending_removal.is_empty()
            || self.objects.count_of(ObjectKind::Monster) > 0
        {
            return;
        }

        logging::info!(self.log, "game won"; "room_id" => self.room_id, "ticks" => self.tick_count);
        self.broadcast(&SGameWin, svc);
        self.game_over = true;

        for player in self.players.values() {
            svc.user_db.add_user_points(player.user_id, WIN_POINTS);
        }
    }

    /// Every player down at once ends the run.
    fn check_wipe(&mut self, svc: &RoomServices<'_>) {
        if self.players.is_empty() || self.game_over {
            return;
        }

        let all_down = self.players.values().all(|player| {
            self.objects
                .get(player.object_id)
                .map_or(true, |object| object.state == ObjectState::Downed)
        });

        if all_down {
            logging::info!(self.log, "game over"; "room_id" => self.room_id, "ticks" => self.tick_count);
            self.broadcast(&SGameOver, svc);
            self.game_over = true;
        }
    }

    // -----------------------------------------------------------------
    // Broadcast

    /// One packet instance, one reference per player send queue. The last
    /// session to finish writing returns the buffer to the pool.
    pub fn broadcast<M: Message>(&self, msg: &M, svc: &RoomServices<'_>) {
        let Some(packet) = build_packet(svc.pool, msg) else {
            logging::warn!(self.log, "packet pool exhausted, broadcast dropped"; "packet_id" => ?M::ID);
            return;
        };

        for &session_id in self.players.keys() {
            let _ = svc.sessions.with_session(session_id, |session| session.send(packet.clone()));
        }
    }

    fn broadcast_except<M: Message>(&self, msg: &M, skip: SessionId, svc: &RoomServices<'_>) {
        let Some(packet) = build_packet(svc.pool, msg) else {
            return;
        };

        for &session_id in self.players.keys() {
            if session_id == skip {
                continue;
            }
            let _ = svc.sessions.with_session(session_id, |session| session.send(packet.clone()));
        }
    }
}

fn object_info(object: &GameObject) -> ObjectInfo {
    ObjectInfo {
        object_id: object.id,
        kind: object.kind as u8,
        type_id: object.type_id,
        x: object.pos.x,
        y: object.pos.y,
        hp: object.hp,
        max_hp: object.max_hp,
    }
}
