use crate::room::RoomServices;
use crate::rooms::RoomManager;
use crate::userdb::UserDb;
use flint::logging::{self, Logger};
use flint::{SessionId, UserId};
use harrow::framework::Framework;
use hashbrown::HashMap;

/// Everything the logic thread owns. There is exactly one of these, held
/// by the dispatcher loop; handlers, timers and event callbacks all reach
/// it through their `Ctx`.
pub struct GameState {
    pub rooms: RoomManager,
    pub user_db: UserDb,
    /// Authenticated sessions: session id -> account id.
    pub accounts: HashMap<SessionId, UserId>,
    pub log: Logger,
}

impl GameState {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(rooms: RoomManager, user_db: UserDb, log: L) -> GameState {
        GameState {
            rooms,
            user_db,
            accounts: HashMap::new(),
            log: logging::child(log),
        }
    }

    pub fn account_of(&self, session_id: SessionId) -> Option<UserId> {
        self.accounts.get(&session_id).copied()
    }

    /// Splits the state into the room table plus the borrowed service
    /// bundle room calls need. Field-level borrows keep both usable at
    /// once.
    pub fn split<'a>(&'a mut self, fw: &'a Framework<GameState>) -> (&'a mut RoomManager, RoomServices<'a>) {
        let GameState {
            rooms, user_db, log, ..
        } = self;

        (
            rooms,
            RoomServices {
                sessions: &fw.sessions,
                pool: &fw.pool,
                user_db,
                timers: &fw.timers,
                log,
            },
        )
    }
}
