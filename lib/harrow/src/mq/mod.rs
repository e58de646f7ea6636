//! Message queue drivers. The core only depends on the [`MessageDriver`]
//! contract; external brokers plug in behind it. Two shapes ship in-tree:
//! the relay driver (fast path, callbacks on the driver's own thread) and
//! the stream driver (reliable path, cursor-based polling over a
//! [`stream::StreamBackend`]).

pub mod relay;
pub mod stream;

use crate::dispatch::dispatcher::{Ctx, DispatcherHandle};
use flint::logging::{self, Logger};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MqError {
    NotConnected,
    Backend(String),
}

pub type MqResult<T> = Result<T, MqError>;

/// Runs on the driver's delivery thread. Subscribers that touch game state
/// must marshal onto the logic dispatcher; [`MessageSystem::subscribe`]
/// does that wrapping.
pub type MessageCallback = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

pub trait MessageDriver: Send + Sync {
    fn connect(&self, url: &str) -> MqResult<()>;
    fn disconnect(&self);
    fn publish(&self, topic: &str, payload: &[u8]) -> MqResult<()>;
    fn subscribe(&self, topic: &str, callback: MessageCallback) -> MqResult<()>;
}

/// Quality of service selects the driver: `Fast` trades delivery guarantees
/// for latency, `Reliable` persists through the stream backend.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MessageQos {
    Fast,
    Reliable,
}

/// Facade over the installed drivers, keyed by QoS.
pub struct MessageSystem {
    drivers: Mutex<HashMap<MessageQos, Arc<dyn MessageDriver>>>,
    log: Logger,
}

impl MessageSystem {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(log: L) -> MessageSystem {
        MessageSystem {
            drivers: Mutex::new(HashMap::new()),
            log: logging::child(log),
        }
    }

    pub fn install(&self, qos: MessageQos, driver: Arc<dyn MessageDriver>) {
        logging::info!(self.log, "mq driver installed"; "qos" => ?qos);
        self.drivers.lock().insert(qos, driver);
    }

    fn driver(&self, qos: MessageQos) -> MqResult<Arc<dyn MessageDriver>> {
        self.drivers
            .lock()
            .get(&qos)
            .cloned()
            .ok_or(MqError::NotConnected)
    }

    pub fn publish(&self, topic: &str, payload: &[u8], qos: MessageQos) -> MqResult<()> {
        self.driver(qos)?.publish(topic, payload)
    }

    /// Subscribes with a raw callback running on the driver's thread.
    pub fn subscribe_raw(&self, topic: &str, qos: MessageQos, callback: MessageCallback) -> MqResult<()> {
        self.driver(qos)?.subscribe(topic, callback)
    }

    /// Subscribes with a callback marshaled onto `target`'s logic thread,
    /// which is where anything touching game state belongs.
    pub fn subscribe<A, F>(&self, topic: &str, qos: MessageQos, target: DispatcherHandle<A>, f: F) -> MqResult<()>
    where
        A: 'static,
        F: Fn(&mut Ctx<'_, A>, &str, &[u8]) + Send + Sync + 'static,
    {
        let f = Arc::new(f);

        let callback: MessageCallback = Arc::new(move |topic: &str, payload: &[u8]| {
            let topic = topic.to_string();
            let payload = payload.to_vec();
            let f = Arc::clone(&f);
            target.post(move |ctx| f(ctx, &topic, &payload));
        });

        self.subscribe_raw(topic, qos, callback)
    }

    pub fn shutdown(&self) {
        for driver in self.drivers.lock().values() {
            driver.disconnect();
        }
        self.drivers.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_driver() {
        let system = MessageSystem::new(None);
        assert_eq!(
            system.publish("topic", b"payload", MessageQos::Fast),
            Err(MqError::NotConnected)
        );
    }
}
