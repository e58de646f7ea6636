use crate::dispatch::dispatcher::{Ctx, DispatcherHandle};
use flint::logging::{self, Logger};
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

type AnyCallback<A> = Arc<dyn Fn(&mut Ctx<'_, A>, &dyn Any) + Send + Sync>;

struct Listener<A> {
    target: DispatcherHandle<A>,
    callback: AnyCallback<A>,
}

/// Type-indexed pub/sub. Publishing never invokes a callback inline: each
/// subscriber gets its own copy of the event, posted as a task onto that
/// subscriber's dispatcher. Delivery is exactly once per subscriber and
/// FIFO per (publisher, subscriber) pair; ordering across publishers is
/// unspecified.
pub struct EventBus<A> {
    listeners: Mutex<HashMap<TypeId, Vec<Listener<A>>>>,
    log: Logger,
}

fn erase<A, E, F>(f: F) -> AnyCallback<A>
where
    E: 'static,
    F: Fn(&mut Ctx<'_, A>, &E) + Send + Sync + 'static,
{
    Arc::new(move |ctx: &mut Ctx<'_, A>, event: &dyn Any| {
        if let Some(event) = event.downcast_ref::<E>() {
            f(ctx, event);
        }
    })
}

impl<A: 'static> EventBus<A> {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(log: L) -> EventBus<A> {
        EventBus {
            listeners: Mutex::new(HashMap::new()),
            log: logging::child(log),
        }
    }

    /// Registers `f` to run on `target`'s logic thread for every published
    /// `E`. Subscribers must outlive the bus entry; unsubscribe by
    /// [`EventBus::reset`] before tearing the subscriber down.
    pub fn subscribe<E, F>(&self, target: DispatcherHandle<A>, f: F)
    where
        E: 'static,
        F: Fn(&mut Ctx<'_, A>, &E) + Send + Sync + 'static,
    {
        logging::debug!(self.log, "event subscription added";
                        "event" => std::any::type_name::<E>());

        self.listeners
            .lock()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Listener {
                target,
                callback: erase(f),
            });
    }

    /// Copies `event` once per subscriber and marshals the callback onto
    /// each subscriber's dispatcher.
    pub fn publish<E>(&self, event: E)
    where
        E: Clone + Send + Sync + 'static,
    {
        let listeners = self.listeners.lock();
        let Some(subscribers) = listeners.get(&TypeId::of::<E>()) else {
            return;
        };

        for listener in subscribers {
            let event = event.clone();
            let callback = Arc::clone(&listener.callback);
            listener.target.post(move |ctx| callback(ctx, &event));
        }
    }

    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.listeners
            .lock()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }

    /// Drops every subscription. For tests and shutdown.
    pub fn reset(&self) {
        self.listeners.lock().clear();
    }
}
