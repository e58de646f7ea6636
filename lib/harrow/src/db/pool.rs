use crate::db::DbConnection;
use flint::logging::{self, Logger};
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

pub type ConnectionFactory = Box<dyn Fn() -> Box<dyn DbConnection> + Send + Sync>;

/// Bounded pool of database connections. `acquire` never blocks and the
/// pool never expands: when empty, callers get `None` and decide whether to
/// retry or fail the request.
pub struct DbPool {
    free: Mutex<Vec<Box<dyn DbConnection>>>,
    conn_str: String,
    log: Logger,
}

impl DbPool {
    /// Builds `size` connections up front; connections that fail to connect
    /// are dropped (the pool starts smaller, it does not fail).
    pub fn new<'a, L: Into<Option<&'a Logger>>>(
        size: usize,
        conn_str: &str,
        factory: ConnectionFactory,
        log: L,
    ) -> DbPool {
        let log = logging::child(log);
        let mut free = Vec::with_capacity(size);

        for _ in 0..size {
            let mut conn = factory();
            if conn.connect(conn_str) {
                free.push(conn);
            } else {
                logging::error!(log, "initial db connection failed"; "conn_str" => conn_str);
            }
        }

        logging::info!(log, "db pool initialized"; "connections" => free.len(), "requested" => size);

        DbPool {
            free: Mutex::new(free),
            conn_str: conn_str.to_string(),
            log,
        }
    }

    /// A pool with no connections; `acquire` always returns `None`.
    pub fn empty<'a, L: Into<Option<&'a Logger>>>(log: L) -> DbPool {
        DbPool {
            free: Mutex::new(Vec::new()),
            conn_str: String::new(),
            log: logging::child(log),
        }
    }

    /// Pops a healthy connection. Dead connections are reconnected in
    /// place; a connection that cannot be revived goes back to the free
    /// list and the caller gets `None`.
    pub fn acquire(self: &Arc<Self>) -> Option<PooledDb> {
        let mut conn = self.free.lock().pop()?;

        if !conn.is_connected() || !conn.ping() {
            logging::info!(self.log, "db connection lost, reconnecting");
            conn.disconnect();

            if !conn.connect(&self.conn_str) {
                logging::error!(self.log, "db reconnect failed");
                self.free.lock().push(conn);
                return None;
            }
        }

        Some(PooledDb {
            conn: Some(conn),
            pool: Arc::clone(self),
        })
    }

    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    fn release(&self, conn: Box<dyn DbConnection>) {
        self.free.lock().push(conn);
    }
}

impl Drop for DbPool {
    fn drop(&mut self) {
        for conn in self.free.lock().iter_mut() {
            conn.disconnect();
        }
    }
}

/// Guard over an acquired connection; returns it to the pool on drop.
pub struct PooledDb {
    conn: Option<Box<dyn DbConnection>>,
    pool: Arc<DbPool>,
}

impl Deref for PooledDb {
    type Target = dyn DbConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_deref().expect("connection present until drop")
    }
}

impl DerefMut for PooledDb {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_deref_mut().expect("connection present until drop")
    }
}

impl Drop for PooledDb {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbError, DbResult, ResultSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyConnection {
        connected: bool,
        healthy: Arc<std::sync::atomic::AtomicBool>,
        reconnects: Arc<AtomicUsize>,
    }

    impl DbConnection for FlakyConnection {
        fn connect(&mut self, _conn_str: &str) -> bool {
            self.reconnects.fetch_add(1, Ordering::Relaxed);
            self.connected = true;
            true
        }
        fn disconnect(&mut self) {
            self.connected = false;
        }
        fn is_connected(&self) -> bool {
            self.connected
        }
        fn ping(&mut self) -> bool {
            self.healthy.load(Ordering::Relaxed)
        }
        fn execute(&mut self, _sql: &str) -> DbResult<()> {
            Ok(())
        }
        fn query(&mut self, _sql: &str) -> DbResult<Box<dyn ResultSet>> {
            Err(DbError::Exec("unused".to_string()))
        }
    }

    fn flaky_pool(size: usize) -> (Arc<DbPool>, Arc<std::sync::atomic::AtomicBool>, Arc<AtomicUsize>) {
        let healthy = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let reconnects = Arc::new(AtomicUsize::new(0));

        let factory_healthy = Arc::clone(&healthy);
        let factory_reconnects = Arc::clone(&reconnects);
        let pool = Arc::new(DbPool::new(
            size,
            "server=localhost",
            Box::new(move || {
                Box::new(FlakyConnection {
                    connected: false,
                    healthy: Arc::clone(&factory_healthy),
                    reconnects: Arc::clone(&factory_reconnects),
                })
            }),
            None,
        ));

        (pool, healthy, reconnects)
    }

    #[test]
    fn test_basic_pooling() {
        let (pool, _healthy, _reconnects) = flaky_pool(2);
        assert_eq!(pool.available(), 2);

        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert_eq!(pool.available(), 0);

        // At capacity: no blocking, just none.
        assert!(pool.acquire().is_none());

        drop(first);
        assert_eq!(pool.available(), 1);
        drop(second);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_dead_connection_reconnects() {
        let (pool, healthy, reconnects) = flaky_pool(1);
        assert_eq!(reconnects.load(Ordering::Relaxed), 1);

        // Ping fails: acquire revives the connection before returning it.
        healthy.store(false, Ordering::Relaxed);
        let conn = pool.acquire().unwrap();
        assert_eq!(reconnects.load(Ordering::Relaxed), 2);
        assert!(conn.is_connected());
    }

    #[test]
    fn test_empty_pool() {
        let pool = Arc::new(DbPool::empty(None));
        assert!(pool.acquire().is_none());
        assert_eq!(pool.available(), 0);
    }
}
