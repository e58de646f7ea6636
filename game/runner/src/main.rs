use clap::Parser;
use flint::logging;
use flint::RoomId;
use gamecore::config::GameConfig;
use gamecore::demodb::{DemoConnection, DemoStore};
use gamecore::protocol::SChat;
use gamecore::rooms::{RoomManager, Tuning};
use gamecore::state::GameState;
use gamecore::userdb::UserDb;
use gamecore::wave::default_waves;
use harrow::db::pool::DbPool;
use harrow::dispatch::dispatcher::Dispatcher;
use harrow::dispatch::handlers::HandlerRegistry;
use harrow::dispatch::strand::StrandKey;
use harrow::dispatch::timer::TimerApi;
use harrow::events::EventBus;
use harrow::framework::{Framework, DEFAULT_MAX_PACKETS};
use harrow::mq::relay::RelayDriver;
use harrow::mq::stream::{MemoryStream, StreamDriver};
use harrow::mq::{MessageDriver, MessageQos, MessageSystem};
use harrow::net::packet::PacketPool;
use harrow::net::reactor::{DispatcherSink, Reactor, ReactorConfig};
use harrow::net::session::SessionRegistry;
use std::path::PathBuf;
use std::sync::Arc;

const EXIT_OK: i32 = 0;
const EXIT_CONFIG: i32 = 1;
const EXIT_BIND: i32 = 2;
const EXIT_DB: i32 = 3;

#[derive(Parser)]
#[command(name = "gamerunner", about = "Survivor game server")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "server.toml")]
    config: PathBuf,
}

fn main() {
    std::process::exit(run());
}

fn log_client_connected(ctx: &mut harrow::dispatch::dispatcher::Ctx<'_, GameState>, session_id: flint::SessionId) {
    logging::info!(ctx.app.log, "client connected"; "session_id" => session_id);
}

fn run() -> i32 {
    let args = Args::parse();

    let config = match GameConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            return EXIT_CONFIG;
        }
    };

    let log = logging::terminal(&config.log.level);
    logging::info!(log, "server starting"; "config" => %args.config.display());

    if config.game.fps != 20 {
        logging::warn!(log, "simulation step is fixed at 20 Hz, fps setting ignored"; "fps" => config.game.fps);
    }

    // Persistence. The demo store stands in where a production SQL driver
    // would be wired into the pool factory.
    let store = DemoStore::new();
    store.seed_user("alice", "x", 1, 100);
    store.seed_user("bob", "hunter2", 2, 0);

    let factory_store = Arc::clone(&store);
    let db = Arc::new(DbPool::new(
        config.database.pool_size,
        &config.database.conn_str,
        Box::new(move || Box::new(DemoConnection::new(Arc::clone(&factory_store)))),
        &log,
    ));
    if config.database.pool_size > 0 && db.available() == 0 {
        logging::crit!(log, "database pool initialization failed"; "conn_str" => %config.database.conn_str);
        return EXIT_DB;
    }

    // Message queue: fast relay plus reliable stream.
    let mq = Arc::new(MessageSystem::new(&log));

    let relay = Arc::new(RelayDriver::new(&log));
    match relay.connect(&config.mq.fast_url) {
        Ok(()) => mq.install(MessageQos::Fast, relay),
        Err(err) => logging::warn!(log, "fast mq driver unavailable"; "error" => ?err),
    }

    let stream = Arc::new(StreamDriver::new(Arc::new(MemoryStream::new()), &log));
    match stream.connect(&config.mq.reliable_url) {
        Ok(()) => mq.install(MessageQos::Reliable, stream),
        Err(err) => logging::warn!(log, "reliable mq driver unavailable"; "error" => ?err),
    }

    // Framework services.
    let dispatcher: Dispatcher<GameState> = Dispatcher::new(config.limits.dispatch_soft_cap, &log);
    let handle = dispatcher.handle();
    let pool = PacketPool::new(DEFAULT_MAX_PACKETS);
    let sessions = Arc::new(SessionRegistry::new(&log));

    let fw = Framework {
        timers: TimerApi::new(handle.clone()),
        dispatcher: handle.clone(),
        pool: pool.clone(),
        sessions: Arc::clone(&sessions),
        events: Arc::new(EventBus::new(&log)),
        db: Arc::clone(&db),
        mq: Arc::clone(&mq),
        log: log.clone(),
    };

    // Game state and wiring.
    let tuning = Tuning {
        map_width: config.game.map_width,
        map_height: config.game.map_height,
        max_players: config.game.max_players,
    };
    let mut state = GameState::new(
        RoomManager::new(tuning, default_waves(), &log),
        UserDb::new(Arc::clone(&db), &log),
        &log,
    );

    let mut registry = HandlerRegistry::new(&log);
    gamecore::handler::register_handlers(&mut registry);
    gamecore::login::init(&fw);

    {
        let (rooms, svc) = state.split(&fw);
        rooms.bootstrap(&svc);
    }

    // Operational topics on the reliable stream: announcements fan out to
    // every room through its strand, shutdown stops the logic loop.
    let _ = mq.subscribe("ops.announce", MessageQos::Reliable, handle.clone(), |ctx, _topic, payload| {
        let text = String::from_utf8_lossy(payload).into_owned();
        let targets: Vec<(RoomId, StrandKey)> = ctx
            .app
            .rooms
            .iter()
            .map(|room| (room.id(), room.strand))
            .collect();

        for (room_id, strand) in targets {
            let message = text.clone();
            ctx.fw.dispatcher.stranded(strand, move |ctx| {
                let (rooms, svc) = ctx.app.split(ctx.fw);
                if let Some(room) = rooms.get(room_id) {
                    room.broadcast(
                        &SChat {
                            object_id: 0,
                            message,
                        },
                        &svc,
                    );
                }
            });
        }
    });
    let _ = mq.subscribe("ops.shutdown", MessageQos::Reliable, handle.clone(), |ctx, _topic, _payload| {
        logging::info!(ctx.app.log, "shutdown requested over mq");
        ctx.fw.dispatcher.shutdown();
    });

    // Network reactor.
    let sink = Arc::new(
        DispatcherSink::new(handle.clone())
            .on_connect(log_client_connected)
            .on_disconnect(gamecore::handler::on_session_disconnected),
    );

    let reactor_config = ReactorConfig {
        address: config.server.address.clone(),
        io_threads: config.server.io_threads,
        max_sessions: config.server.max_sessions,
        recv_rate: config.limits.recv_rate,
        recv_burst: config.limits.recv_burst,
        ..ReactorConfig::default()
    };
    let mut reactor = match Reactor::bind(reactor_config, pool, Arc::clone(&sessions), sink, &log) {
        Ok(reactor) => reactor,
        Err(err) => {
            logging::crit!(log, "listener bind failed"; "address" => %config.server.address, "error" => ?err);
            return EXIT_BIND;
        }
    };

    logging::info!(log, "server running"; "address" => %reactor.local_addr());

    // The main thread is the logic thread.
    dispatcher.run(&mut state, &fw, &registry);

    logging::info!(log, "server stopping");
    reactor.shutdown();
    mq.shutdown();

    EXIT_OK
}
