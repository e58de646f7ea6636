use crate::dispatch::dispatcher::{Ctx, PacketView};
use crate::net::session::Session;
use flint::logging::{self, Logger};
use hashbrown::HashMap;
use std::sync::Arc;

pub type PacketHandlerFn<A> = Box<dyn Fn(&mut Ctx<'_, A>, &Arc<Session>, PacketView<'_>) + Send>;

/// Packet id -> handler table. Populated once at startup; duplicate
/// registration is a wiring bug and panics. Unknown ids and malformed
/// payloads are logged and dropped, never fatal.
pub struct HandlerRegistry<A> {
    handlers: HashMap<u16, PacketHandlerFn<A>>,
    log: Logger,
}

impl<A: 'static> HandlerRegistry<A> {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(log: L) -> HandlerRegistry<A> {
        HandlerRegistry {
            handlers: HashMap::new(),
            log: logging::child(log),
        }
    }

    pub fn register<F>(&mut self, packet_id: u16, handler: F)
    where
        F: Fn(&mut Ctx<'_, A>, &Arc<Session>, PacketView<'_>) + Send + 'static,
    {
        if self.handlers.insert(packet_id, Box::new(handler)).is_some() {
            panic!("duplicate handler registration for packet id {}", packet_id);
        }
    }

    pub fn dispatch(&self, ctx: &mut Ctx<'_, A>, session: &Arc<Session>, view: PacketView<'_>) {
        match self.handlers.get(&view.id) {
            Some(handler) => handler(ctx, session, view),
            None => {
                logging::warn!(self.log, "unknown packet id dropped";
                               "packet_id" => view.id,
                               "session_id" => session.id());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}
