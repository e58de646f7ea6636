use crate::math::Vec2;
use crate::room::{Room, RoomServices, FIXED_DT, TICK_INTERVAL};
use crate::wave::WaveDef;
use flint::logging::{self, Logger};
use flint::{ObjectId, RoomId, SessionId, UserId};
use harrow::dispatch::timer::{TimerFire, TimerId};
use hashbrown::HashMap;

/// Room 1 always exists; it is reset rather than destroyed.
pub const LOBBY_ROOM_ID: RoomId = 1;

const ROOM_TICK_TIMER: TimerId = 1;

/// Timer owner key for a room, so teardown can sweep all of its timers.
pub fn room_owner_key(room_id: RoomId) -> u64 {
    0x524F_4F4D_0000_0000 | room_id as u32 as u64
}

#[derive(Debug, Clone, Copy)]
pub struct Tuning {
    pub map_width: f32,
    pub map_height: f32,
    pub max_players: usize,
}

impl Default for Tuning {
    fn default() -> Tuning {
        Tuning {
            map_width: 8000.0,
            map_height: 8000.0,
            max_players: 4,
        }
    }
}

/// Room id -> room table plus the session -> room index.
///
/// Confined to the logic thread: strand serialization replaces the mutex
/// the equivalent shared-registry design would need.
pub struct RoomManager {
    rooms: HashMap<RoomId, Room>,
    by_session: HashMap<SessionId, RoomId>,
    next_room_id: RoomId,
    waves: Vec<WaveDef>,
    tuning: Tuning,
    log: Logger,
}

impl RoomManager {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(tuning: Tuning, waves: Vec<WaveDef>, log: L) -> RoomManager {
        RoomManager {
            rooms: HashMap::new(),
            by_session: HashMap::new(),
            next_room_id: LOBBY_ROOM_ID + 1,
            waves,
            tuning,
            log: logging::child(log),
        }
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn get(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    pub fn get_mut(&mut self, room_id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&room_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn room_of_session(&mut self, session_id: SessionId) -> Option<&mut Room> {
        let room_id = *self.by_session.get(&session_id)?;
        self.rooms.get_mut(&room_id)
    }

    /// Creates the standing lobby room. Called once at startup.
    pub fn bootstrap(&mut self, svc: &RoomServices<'_>) {
        self.spawn_room(LOBBY_ROOM_ID, "lobby".to_string(), svc);
    }

    pub fn create_room(&mut self, title: String, svc: &RoomServices<'_>) -> RoomId {
        let room_id = self.next_room_id;
        self.next_room_id += 1;
        self.spawn_room(room_id, title, svc);
        room_id
    }

    fn spawn_room(&mut self, room_id: RoomId, title: String, svc: &RoomServices<'_>) {
        let map_size = Vec2::new(self.tuning.map_width, self.tuning.map_height);
        let mut room = Room::new(room_id, title, self.waves.clone(), map_size, &self.log);

        room.timer_handle = Some(Self::arm_tick_timer(room_id, svc));
        logging::info!(self.log, "room created"; "room_id" => room_id, "title" => room.title());

        self.rooms.insert(room_id, room);
    }

    fn arm_tick_timer(room_id: RoomId, svc: &RoomServices<'_>) -> harrow::dispatch::timer::TimerHandle {
        svc.timers.set_interval(
            ROOM_TICK_TIMER,
            TICK_INTERVAL,
            room_owner_key(room_id),
            move |ctx, _event| {
                let (rooms, svc) = ctx.app.split(ctx.fw);
                rooms.tick_room(room_id, &svc)
            },
        )
    }

    /// The 20 Hz tick body. A missing room stops its own interval: the
    /// timer resolves its listener by room id, so a destroyed room simply
    /// winds the timer down.
    pub fn tick_room(&mut self, room_id: RoomId, svc: &RoomServices<'_>) -> TimerFire {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return TimerFire::Stop;
        };
        if room.timer_handle.is_none() {
            return TimerFire::Stop;
        }

        room.update(FIXED_DT, svc);
        TimerFire::Continue
    }

    /// Puts a session's player into a room. `None` on any admission
    /// failure: already in a room, unknown room, room full.
    pub fn join_room(
        &mut self,
        room_id: RoomId,
        session_id: SessionId,
        user_id: UserId,
        name: String,
        svc: &RoomServices<'_>,
    ) -> Option<ObjectId> {
        if self.by_session.contains_key(&session_id) {
            logging::warn!(self.log, "join refused, already in a room"; "session_id" => session_id);
            return None;
        }

        let max_players = self.tuning.max_players;
        let room = self.rooms.get_mut(&room_id)?;
        if room.player_count() >= max_players {
            logging::info!(self.log, "join refused, room full"; "room_id" => room_id);
            return None;
        }

        // A room left idle had its tick timer cancelled; re-arm it.
        if room.timer_handle.is_none() {
            room.timer_handle = Some(Self::arm_tick_timer(room_id, svc));
        }

        let object_id = room.enter(session_id, user_id, name, svc);
        self.by_session.insert(session_id, room_id);
        Some(object_id)
    }

    /// Removes a session's player from its room, if any. The last player
    /// leaving cancels the tick timer and resets the room; non-lobby rooms
    /// are destroyed outright.
    pub fn leave(&mut self, session_id: SessionId, svc: &RoomServices<'_>) -> bool {
        let Some(room_id) = self.by_session.remove(&session_id) else {
            return false;
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return false;
        };

        room.leave(session_id, svc);

        if room.player_count() == 0 {
            if let Some(handle) = room.timer_handle.take() {
                svc.timers.cancel(handle);
            }
            svc.timers.cancel_owner(room_owner_key(room_id));
            room.reset();

            if room_id != LOBBY_ROOM_ID {
                self.rooms.remove(&room_id);
                logging::info!(self.log, "room destroyed"; "room_id" => room_id);
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GameState;
    use crate::userdb::UserDb;
    use harrow::db::pool::DbPool;
    use harrow::framework::Framework;
    use std::sync::Arc;

    struct Fixture {
        _dispatcher: harrow::dispatch::dispatcher::Dispatcher<GameState>,
        fw: Framework<GameState>,
        user_db: UserDb,
        log: Logger,
    }

    impl Fixture {
        fn new() -> Fixture {
            let (dispatcher, fw) = Framework::standalone(1024, None);
            Fixture {
                _dispatcher: dispatcher,
                user_db: UserDb::new(Arc::new(DbPool::empty(None)), None),
                fw,
                log: flint::logging::discard(),
            }
        }

        fn svc(&self) -> RoomServices<'_> {
            RoomServices {
                sessions: &self.fw.sessions,
                pool: &self.fw.pool,
                user_db: &self.user_db,
                timers: &self.fw.timers,
                log: &self.log,
            }
        }
    }

    fn manager() -> RoomManager {
        RoomManager::new(Tuning::default(), Vec::new(), None)
    }

    #[test]
    fn test_bootstrap_creates_lobby() {
        let fx = Fixture::new();
        let mut rooms = manager();

        rooms.bootstrap(&fx.svc());
        assert_eq!(rooms.room_count(), 1);
        assert!(rooms.get(LOBBY_ROOM_ID).is_some());
    }

    #[test]
    fn test_create_room_ids_start_after_lobby() {
        let fx = Fixture::new();
        let mut rooms = manager();
        rooms.bootstrap(&fx.svc());

        let first = rooms.create_room("one".to_string(), &fx.svc());
        let second = rooms.create_room("two".to_string(), &fx.svc());
        assert_eq!(first, 2);
        assert_eq!(second, 3);
    }

    #[test]
    fn test_join_and_leave_lifecycle() {
        let fx = Fixture::new();
        let mut rooms = manager();
        rooms.bootstrap(&fx.svc());
        let room_id = rooms.create_room("run".to_string(), &fx.svc());

        assert!(rooms.join_room(room_id, 100, 1, "alice".to_string(), &fx.svc()).is_some());
        // Double-join refused.
        assert!(rooms.join_room(room_id, 100, 1, "alice".to_string(), &fx.svc()).is_none());
        assert!(rooms.room_of_session(100).is_some());

        // Last leave destroys the non-lobby room.
        assert!(rooms.leave(100, &fx.svc()));
        assert!(rooms.get(room_id).is_none());
        assert!(!rooms.leave(100, &fx.svc()));
    }

    #[test]
    fn test_lobby_survives_empty() {
        let fx = Fixture::new();
        let mut rooms = manager();
        rooms.bootstrap(&fx.svc());

        rooms.join_room(LOBBY_ROOM_ID, 100, 1, "alice".to_string(), &fx.svc());
        rooms.leave(100, &fx.svc());

        let lobby = rooms.get(LOBBY_ROOM_ID).unwrap();
        assert_eq!(lobby.player_count(), 0);
        assert!(lobby.timer_handle.is_none());

        // Re-joining re-arms the tick timer.
        rooms.join_room(LOBBY_ROOM_ID, 101, 2, "bob".to_string(), &fx.svc());
        assert!(rooms.get(LOBBY_ROOM_ID).unwrap().timer_handle.is_some());
    }

    #[test]
    fn test_room_capacity() {
        let fx = Fixture::new();
        let mut rooms = RoomManager::new(
            Tuning {
                max_players: 2,
                ..Tuning::default()
            },
            Vec::new(),
            None,
        );
        rooms.bootstrap(&fx.svc());

        assert!(rooms.join_room(LOBBY_ROOM_ID, 1, 1, "a".to_string(), &fx.svc()).is_some());
        assert!(rooms.join_room(LOBBY_ROOM_ID, 2, 2, "b".to_string(), &fx.svc()).is_some());
        assert!(rooms.join_room(LOBBY_ROOM_ID, 3, 3, "c".to_string(), &fx.svc()).is_none());
    }

    #[test]
    fn test_tick_missing_room_stops_timer() {
        let fx = Fixture::new();
        let mut rooms = manager();
        assert_eq!(rooms.tick_room(99, &fx.svc()), TimerFire::Stop);
    }
}
