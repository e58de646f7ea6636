use crate::mq::{MessageCallback, MessageDriver, MqError, MqResult};
use crossbeam::channel::{self, Sender};
use flint::logging::{self, Logger};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

enum RelayMsg {
    Publish(String, Vec<u8>),
    Stop,
}

/// Fast-path driver: publishes flow through one fan-out thread that calls
/// subscriber callbacks directly on that thread, the same delivery shape a
/// native broker client presents. No persistence, no replay.
pub struct RelayDriver {
    tx: Sender<RelayMsg>,
    connected: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    subs: Arc<Mutex<HashMap<String, Vec<MessageCallback>>>>,
    log: Logger,
}

impl RelayDriver {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(log: L) -> RelayDriver {
        let log = logging::child(log);
        let (tx, rx) = channel::unbounded::<RelayMsg>();
        let subs: Arc<Mutex<HashMap<String, Vec<MessageCallback>>>> = Arc::new(Mutex::new(HashMap::new()));

        let worker_subs = Arc::clone(&subs);
        let worker = std::thread::spawn(move || {
            while let Ok(msg) = rx.recv() {
                match msg {
                    RelayMsg::Publish(topic, payload) => {
                        let subs = worker_subs.lock();
                        if let Some(callbacks) = subs.get(&topic) {
                            for callback in callbacks {
                                callback(&topic, &payload);
                            }
                        }
                    }
                    RelayMsg::Stop => break,
                }
            }
        });

        RelayDriver {
            tx,
            connected: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
            subs,
            log,
        }
    }
}

impl MessageDriver for RelayDriver {
    fn connect(&self, url: &str) -> MqResult<()> {
        logging::info!(self.log, "relay driver connected"; "url" => url);
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(RelayMsg::Stop);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> MqResult<()> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(MqError::NotConnected);
        }
        self.tx
            .send(RelayMsg::Publish(topic.to_string(), payload.to_vec()))
            .map_err(|_| MqError::Backend("relay worker gone".to_string()))
    }

    fn subscribe(&self, topic: &str, callback: MessageCallback) -> MqResult<()> {
        self.subs
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(callback);
        Ok(())
    }
}

impl Drop for RelayDriver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached within a second");
    }

    #[test]
    fn test_publish_reaches_subscriber() {
        let driver = RelayDriver::new(None);
        driver.connect("inproc://test").unwrap();

        let seen: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        driver
            .subscribe(
                "game.chat",
                Arc::new(move |topic, payload| {
                    assert_eq!(topic, "game.chat");
                    sink.lock().push(payload.to_vec());
                }),
            )
            .unwrap();

        driver.publish("game.chat", b"one").unwrap();
        driver.publish("game.chat", b"two").unwrap();
        driver.publish("other", b"ignored").unwrap();

        wait_for(|| seen.lock().len() == 2);
        assert_eq!(*seen.lock(), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn test_publish_requires_connect() {
        let driver = RelayDriver::new(None);
        assert_eq!(driver.publish("t", b"x"), Err(MqError::NotConnected));
    }
}
