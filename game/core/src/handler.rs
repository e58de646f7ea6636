use crate::events::LoginRequested;
use crate::math::Vec2;
use crate::protocol::{
    decode_body, send_to_session, CChat, CCreateRoom, CJoinRoom, CLogin, CMove, CSelectLevelUp, CUseSkill, PacketId,
    SChat, SCreateRoom, SJoinRoom, SLeaveRoom,
};
use crate::state::GameState;
use flint::logging;
use flint::SessionId;
use harrow::dispatch::dispatcher::Ctx;
use harrow::dispatch::handlers::HandlerRegistry;

/// Registers every client packet handler. Called once at startup; the
/// registry is immutable afterwards.
pub fn register_handlers(registry: &mut HandlerRegistry<GameState>) {
    registry.register(PacketId::CLogin as u16, |ctx, session, view| {
        let Some(msg) = decode_body::<CLogin>(view.body, &ctx.app.log) else {
            return;
        };

        // Marshal onto the event bus; the login controller owns the rest.
        ctx.fw.events.publish(LoginRequested {
            session_id: session.id(),
            username: msg.username,
            password: msg.password,
        });
    });

    registry.register(PacketId::CCreateRoom as u16, |ctx, session, view| {
        let Some(msg) = decode_body::<CCreateRoom>(view.body, &ctx.app.log) else {
            return;
        };
        if ctx.app.account_of(session.id()).is_none() {
            send_to_session(&ctx.fw.sessions, &ctx.fw.pool, session.id(), &SCreateRoom {
                success: false,
                room_id: 0,
            }, &ctx.app.log);
            return;
        }

        let (rooms, svc) = ctx.app.split(ctx.fw);
        let room_id = rooms.create_room(msg.title, &svc);

        send_to_session(svc.sessions, svc.pool, session.id(), &SCreateRoom {
            success: true,
            room_id,
        }, svc.log);
    });

    registry.register(PacketId::CJoinRoom as u16, |ctx, session, view| {
        let Some(msg) = decode_body::<CJoinRoom>(view.body, &ctx.app.log) else {
            return;
        };
        let Some(user_id) = ctx.app.account_of(session.id()) else {
            send_to_session(&ctx.fw.sessions, &ctx.fw.pool, session.id(), &SJoinRoom {
                success: false,
                room_id: msg.room_id,
                my_object_id: 0,
            }, &ctx.app.log);
            return;
        };

        let name = format!("survivor_{}", user_id);
        let (rooms, svc) = ctx.app.split(ctx.fw);
        let joined = rooms.join_room(msg.room_id, session.id(), user_id, name, &svc);

        send_to_session(svc.sessions, svc.pool, session.id(), &SJoinRoom {
            success: joined.is_some(),
            room_id: msg.room_id,
            my_object_id: joined.unwrap_or(0),
        }, svc.log);
    });

    registry.register(PacketId::CLeaveRoom as u16, |ctx, session, _view| {
        let (rooms, svc) = ctx.app.split(ctx.fw);
        let left = rooms.leave(session.id(), &svc);

        send_to_session(svc.sessions, svc.pool, session.id(), &SLeaveRoom { success: left }, svc.log);
    });

    registry.register(PacketId::CChat as u16, |ctx, session, view| {
        let Some(msg) = decode_body::<CChat>(view.body, &ctx.app.log) else {
            return;
        };

        let (rooms, svc) = ctx.app.split(ctx.fw);
        let Some(room) = rooms.room_of_session(session.id()) else {
            return;
        };
        let Some(object_id) = room.object_id_of(session.id()) else {
            return;
        };

        room.broadcast(&SChat {
            object_id,
            message: msg.message,
        }, &svc);
    });

    registry.register(PacketId::CMove as u16, |ctx, session, view| {
        let Some(msg) = decode_body::<CMove>(view.body, &ctx.app.log) else {
            return;
        };

        let (rooms, svc) = ctx.app.split(ctx.fw);
        match rooms.room_of_session(session.id()) {
            Some(room) => room.set_player_direction(session.id(), Vec2::new(msg.dir_x, msg.dir_y)),
            None => {
                logging::warn!(svc.log, "move from session outside any room"; "session_id" => session.id());
            }
        }
    });

    registry.register(PacketId::CUseSkill as u16, |ctx, session, view| {
        let Some(msg) = decode_body::<CUseSkill>(view.body, &ctx.app.log) else {
            return;
        };

        let (rooms, svc) = ctx.app.split(ctx.fw);
        if let Some(room) = rooms.room_of_session(session.id()) {
            room.use_skill(session.id(), msg.skill_id, &svc);
        }
    });

    registry.register(PacketId::CSelectLevelUp as u16, |ctx, session, view| {
        let Some(msg) = decode_body::<CSelectLevelUp>(view.body, &ctx.app.log) else {
            return;
        };

        let (rooms, _svc) = ctx.app.split(ctx.fw);
        if let Some(room) = rooms.room_of_session(session.id()) {
            room.select_level_up(session.id(), msg.option_id);
        }
    });
}

/// Reactor disconnect hook: tears the player out of its room and drops
/// the account binding.
pub fn on_session_disconnected(ctx: &mut Ctx<'_, GameState>, session_id: SessionId) {
    ctx.app.accounts.remove(&session_id);

    let (rooms, svc) = ctx.app.split(ctx.fw);
    if rooms.leave(session_id, &svc) {
        logging::info!(svc.log, "player removed after disconnect"; "session_id" => session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_packet, Message};
    use crate::rooms::{RoomManager, Tuning, LOBBY_ROOM_ID};
    use crate::userdb::UserDb;
    use harrow::db::pool::DbPool;
    use harrow::dispatch::dispatcher::{Dispatcher, DispatcherHandle};
    use harrow::framework::Framework;
    use harrow::net::session::{alloc_session_id, Session, SessionState};
    use std::sync::Arc;

    struct Harness {
        dispatcher: Dispatcher<GameState>,
        fw: Framework<GameState>,
        state: GameState,
        registry: HandlerRegistry<GameState>,
    }

    impl Harness {
        fn new() -> Harness {
            let (dispatcher, fw) = Framework::standalone(4096, None);
            let mut registry = HandlerRegistry::new(None);
            register_handlers(&mut registry);

            let state = GameState::new(
                RoomManager::new(Tuning::default(), Vec::new(), None),
                UserDb::new(Arc::new(DbPool::empty(None)), None),
                None,
            );

            Harness {
                dispatcher,
                fw,
                state,
                registry,
            }
        }

        fn connect(&self) -> Arc<Session> {
            let session = Arc::new(Session::new(alloc_session_id(), Arc::new(|| {})));
            session.set_state(SessionState::Connected);
            self.fw.sessions.register(Arc::clone(&session));
            session
        }

        fn deliver<M: Message>(&self, handle: &DispatcherHandle<GameState>, session: &Session, msg: &M) {
            let packet = build_packet(&self.fw.pool, msg).unwrap();
            handle.deliver(session.id(), packet);
        }

        fn run(self) -> (GameState, Framework<GameState>) {
            let Harness {
                dispatcher,
                fw,
                mut state,
                registry,
            } = self;

            dispatcher.handle().shutdown();
            dispatcher.run(&mut state, &fw, &registry);
            (state, fw)
        }
    }

    fn drain_ids(session: &Session) -> Vec<u16> {
        let mut ids = Vec::new();
        while let Some(packet) = session.take_next_outbound() {
            ids.push(packet.header().unwrap().id);
        }
        ids
    }

    #[test]
    fn test_join_move_leave_flow() {
        let mut harness = Harness::new();
        let handle = harness.dispatcher.handle();
        let session = harness.connect();

        // Short-circuit authentication; the login path has its own test.
        harness.state.accounts.insert(session.id(), 10);

        {
            let (rooms, svc) = harness.state.split(&harness.fw);
            rooms.bootstrap(&svc);
        }

        harness.deliver(&handle, &session, &CJoinRoom { room_id: LOBBY_ROOM_ID });
        harness.deliver(&handle, &session, &CMove { dir_x: 1.0, dir_y: 0.0 });
        harness.deliver(&handle, &session, &CChat { message: "hi".to_string() });

        let (mut state, fw) = harness.run();

        let ids = drain_ids(&session);
        assert!(ids.contains(&(PacketId::SJoinRoom as u16)));
        assert!(ids.contains(&(PacketId::SSpawnObject as u16)));
        assert!(ids.contains(&(PacketId::SChat as u16)));

        // The movement intent landed on the avatar at base speed.
        let room = state.rooms.room_of_session(session.id()).unwrap();
        let object_id = room.object_id_of(session.id()).unwrap();
        let object = room.objects().get(object_id).unwrap();
        assert_eq!(object.velocity.x, 200.0);
        drop(fw);
    }

    #[test]
    fn test_join_requires_login() {
        let mut harness = Harness::new();
        let handle = harness.dispatcher.handle();
        let session = harness.connect();

        {
            let (rooms, svc) = harness.state.split(&harness.fw);
            rooms.bootstrap(&svc);
        }

        harness.deliver(&handle, &session, &CJoinRoom { room_id: LOBBY_ROOM_ID });
        let (mut state, _fw) = harness.run();

        assert!(state.rooms.room_of_session(session.id()).is_none());
        let log = flint::logging::discard();
        let reply = session.take_next_outbound().unwrap();
        let joined = decode_body::<SJoinRoom>(reply.body(), &log).unwrap();
        assert!(!joined.success);
    }

    #[test]
    fn test_create_room_responds_with_id() {
        let mut harness = Harness::new();
        let handle = harness.dispatcher.handle();
        let session = harness.connect();
        harness.state.accounts.insert(session.id(), 10);

        {
            let (rooms, svc) = harness.state.split(&harness.fw);
            rooms.bootstrap(&svc);
        }

        harness.deliver(&handle, &session, &CCreateRoom { title: "run".to_string() });
        let (state, _fw) = harness.run();

        assert_eq!(state.rooms.room_count(), 2);
        let log = flint::logging::discard();
        let reply = session.take_next_outbound().unwrap();
        let created = decode_body::<SCreateRoom>(reply.body(), &log).unwrap();
        assert!(created.success);
        assert_eq!(created.room_id, 2);
    }

    #[test]
    fn test_disconnect_hook_removes_player() {
        let mut harness = Harness::new();
        let handle = harness.dispatcher.handle();
        let session = harness.connect();
        harness.state.accounts.insert(session.id(), 10);

        {
            let (rooms, svc) = harness.state.split(&harness.fw);
            rooms.bootstrap(&svc);
        }
        harness.deliver(&handle, &session, &CJoinRoom { room_id: LOBBY_ROOM_ID });

        let session_id = session.id();
        handle.post(move |ctx| on_session_disconnected(ctx, session_id));

        let (mut state, _fw) = harness.run();
        assert!(state.rooms.room_of_session(session.id()).is_none());
        assert!(state.account_of(session.id()).is_none());
    }

}
