//! Database capability contract plus the bounded connection pool. The
//! concrete SQL driver is an external collaborator: anything implementing
//! [`DbConnection`] plugs in through the pool's connection factory.

pub mod pool;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DbError {
    NotConnected,
    /// Statement or query failure, with the driver's message.
    Exec(String),
    TxAborted,
}

pub type DbResult<T> = Result<T, DbError>;

/// Forward-only cursor over query results. Column access is by 0-based
/// index; out-of-range or type-mismatched access yields zero values, as
/// thin SQL shims conventionally do.
pub trait ResultSet {
    /// Advances to the next row. False when exhausted.
    fn next(&mut self) -> bool;

    fn get_int(&self, column: usize) -> i64;
    fn get_string(&self, column: usize) -> String;
    fn get_double(&self, column: usize) -> f64;
}

/// One database connection. Implementations need not be thread-safe: a
/// connection is used by one caller at a time, brokered by the pool.
pub trait DbConnection: Send {
    fn connect(&mut self, conn_str: &str) -> bool;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;

    /// Cheap liveness probe.
    fn ping(&mut self) -> bool;

    fn execute(&mut self, sql: &str) -> DbResult<()>;
    fn query(&mut self, sql: &str) -> DbResult<Box<dyn ResultSet>>;
}

/// Scope guard for a transaction: dropping it without `commit` rolls back.
pub struct Transaction<'a> {
    conn: &'a mut dyn DbConnection,
    committed: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(conn: &'a mut dyn DbConnection) -> DbResult<Transaction<'a>> {
        conn.execute("BEGIN TRANSACTION;")?;
        Ok(Transaction {
            conn,
            committed: false,
        })
    }

    pub fn execute(&mut self, sql: &str) -> DbResult<()> {
        self.conn.execute(sql)
    }

    pub fn query(&mut self, sql: &str) -> DbResult<Box<dyn ResultSet>> {
        self.conn.query(sql)
    }

    pub fn commit(mut self) -> DbResult<()> {
        let result = self.conn.execute("COMMIT;");
        if result.is_ok() {
            self.committed = true;
        }
        result
    }

    pub fn rollback(mut self) -> DbResult<()> {
        self.committed = true;
        self.conn.execute("ROLLBACK;")
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let _ = self.conn.execute("ROLLBACK;");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every statement; scripted to fail on demand.
    pub(crate) struct ScriptedConnection {
        pub statements: Vec<String>,
        pub fail_on: Option<&'static str>,
    }

    impl ScriptedConnection {
        pub fn new() -> ScriptedConnection {
            ScriptedConnection {
                statements: Vec::new(),
                fail_on: None,
            }
        }
    }

    impl DbConnection for ScriptedConnection {
        fn connect(&mut self, _conn_str: &str) -> bool {
            true
        }
        fn disconnect(&mut self) {}
        fn is_connected(&self) -> bool {
            true
        }
        fn ping(&mut self) -> bool {
            true
        }

        fn execute(&mut self, sql: &str) -> DbResult<()> {
            self.statements.push(sql.to_string());
            if let Some(needle) = self.fail_on {
                if sql.contains(needle) {
                    return Err(DbError::Exec("scripted failure".to_string()));
                }
            }
            Ok(())
        }

        fn query(&mut self, _sql: &str) -> DbResult<Box<dyn ResultSet>> {
            Err(DbError::Exec("not scripted".to_string()))
        }
    }

    #[test]
    fn test_transaction_commit() {
        let mut conn = ScriptedConnection::new();
        {
            let mut tx = Transaction::begin(&mut conn).unwrap();
            tx.execute("UPDATE t SET v = 1;").unwrap();
            tx.commit().unwrap();
        }
        assert_eq!(
            conn.statements,
            vec!["BEGIN TRANSACTION;", "UPDATE t SET v = 1;", "COMMIT;"]
        );
    }

    #[test]
    fn test_transaction_drop_rolls_back() {
        let mut conn = ScriptedConnection::new();
        {
            let mut tx = Transaction::begin(&mut conn).unwrap();
            tx.execute("UPDATE t SET v = 1;").unwrap();
            // Dropped without commit.
        }
        assert_eq!(conn.statements.last().map(String::as_str), Some("ROLLBACK;"));
    }

    #[test]
    fn test_failed_commit_rolls_back() {
        let mut conn = ScriptedConnection::new();
        conn.fail_on = Some("COMMIT");
        {
            let tx = Transaction::begin(&mut conn).unwrap();
            assert!(tx.commit().is_err());
        }
        assert_eq!(conn.statements.last().map(String::as_str), Some("ROLLBACK;"));
    }
}
