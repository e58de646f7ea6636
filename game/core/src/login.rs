use crate::events::LoginRequested;
use crate::protocol::{send_to_session, SLogin};
use crate::state::GameState;
use flint::logging;
use harrow::dispatch::dispatcher::Ctx;
use harrow::framework::Framework;
use harrow::mq::MessageQos;

/// Reliable MQ topic carrying login audit records.
pub const LOGIN_AUDIT_TOPIC: &str = "auth.login";

/// Subscribes the login flow on the event bus. Packet handlers publish
/// [`LoginRequested`]; the callback runs on the logic dispatcher, checks
/// credentials against the users table, binds the session to its account
/// and answers with `S_LOGIN`.
pub fn init(fw: &Framework<GameState>) {
    fw.events
        .subscribe::<LoginRequested, _>(fw.dispatcher.clone(), on_login);
}

fn on_login(ctx: &mut Ctx<'_, GameState>, event: &LoginRequested) {
    let state = &mut *ctx.app;
    logging::info!(state.log, "processing login"; "username" => %event.username, "session_id" => event.session_id);

    let verified = state.user_db.verify_credentials(&event.username, &event.password);
    let success = verified.is_some();

    if let Some(user_id) = verified {
        state.accounts.insert(event.session_id, user_id);
        logging::info!(state.log, "login ok"; "username" => %event.username, "user_id" => user_id);
    } else {
        logging::info!(state.log, "login failed"; "username" => %event.username);
    }

    let tuning = *state.rooms.tuning();
    let reply = SLogin {
        success,
        user_id: verified.unwrap_or(0),
        map_width: tuning.map_width,
        map_height: tuning.map_height,
    };
    send_to_session(&ctx.fw.sessions, &ctx.fw.pool, event.session_id, &reply, &state.log);

    if success {
        let record = format!(
            "{{\"user\":\"{}\",\"session\":{},\"ts\":{}}}",
            event.username,
            event.session_id,
            flint::time::unix_now()
        );
        if let Err(err) = ctx
            .fw
            .mq
            .publish(LOGIN_AUDIT_TOPIC, record.as_bytes(), MessageQos::Reliable)
        {
            // Audit is best-effort when no reliable driver is installed.
            logging::debug!(state.log, "login audit not published"; "error" => ?err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demodb::{DemoConnection, DemoStore};
    use crate::protocol::{decode_body, PacketId};
    use crate::rooms::{RoomManager, Tuning};
    use crate::userdb::UserDb;
    use crate::wave::default_waves;
    use harrow::db::pool::DbPool;
    use harrow::dispatch::handlers::HandlerRegistry;
    use harrow::net::session::{alloc_session_id, Session, SessionState};
    use std::sync::Arc;

    fn seeded_user_db() -> UserDb {
        let store = DemoStore::new();
        store.seed_user("alice", "x", 1, 0);

        let factory_store = Arc::clone(&store);
        let pool = Arc::new(DbPool::new(
            1,
            "demo://memory",
            Box::new(move || Box::new(DemoConnection::new(Arc::clone(&factory_store)))),
            None,
        ));
        UserDb::new(pool, None)
    }

    #[test]
    fn test_login_flow_end_to_end() {
        let (dispatcher, fw) = Framework::standalone(1024, None);
        init(&fw);

        let mut state = GameState::new(
            RoomManager::new(Tuning::default(), default_waves(), None),
            seeded_user_db(),
            None,
        );

        let session = Arc::new(Session::new(alloc_session_id(), Arc::new(|| {})));
        session.set_state(SessionState::Connected);
        fw.sessions.register(Arc::clone(&session));

        fw.events.publish(LoginRequested {
            session_id: session.id(),
            username: "alice".to_string(),
            password: "x".to_string(),
        });
        fw.events.publish(LoginRequested {
            session_id: session.id(),
            username: "alice".to_string(),
            password: "wrong".to_string(),
        });
        fw.dispatcher.shutdown();

        dispatcher.run(&mut state, &fw, &HandlerRegistry::new(None));

        // Bound to the account by the first request only.
        assert_eq!(state.account_of(session.id()), Some(1));

        let log = flint::logging::discard();
        let first = session.take_next_outbound().unwrap();
        assert_eq!(first.header().unwrap().id, PacketId::SLogin as u16);
        let reply = decode_body::<SLogin>(first.body(), &log).unwrap();
        assert!(reply.success);
        assert_eq!(reply.user_id, 1);

        let second = session.take_next_outbound().unwrap();
        let reply = decode_body::<SLogin>(second.body(), &log).unwrap();
        assert!(!reply.success);
    }
}
