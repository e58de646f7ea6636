//! In-memory database used by tests and the demo server wiring. It
//! understands exactly the statement shapes [`crate::userdb::UserDb`]
//! issues; a real SQL driver replaces it behind the same
//! [`DbConnection`] seam without touching game code.

use harrow::db::{DbConnection, DbError, DbResult, ResultSet};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Default)]
struct Tables {
    /// username -> (user_id, password)
    users: Vec<(String, String, i64)>,
    /// user_id -> points
    points: Vec<(i64, i64)>,
    /// (user_id, skill_id) -> level
    skills: Vec<(i64, i32, i32)>,
}

#[derive(Default)]
struct StoreInner {
    tables: Tables,
    /// Snapshot taken at BEGIN, restored on ROLLBACK. The logic thread is
    /// the only writer, so one open transaction at a time is the reality.
    tx_snapshot: Option<Tables>,
    fail_execute_containing: Option<String>,
}

/// Backing tables shared by every pooled [`DemoConnection`].
pub struct DemoStore {
    inner: Mutex<StoreInner>,
}

impl DemoStore {
    pub fn new() -> Arc<DemoStore> {
        Arc::new(DemoStore {
            inner: Mutex::new(StoreInner::default()),
        })
    }

    pub fn seed_user(&self, username: &str, password: &str, user_id: i64, points: i64) {
        let mut inner = self.inner.lock();
        inner
            .tables
            .users
            .push((username.to_string(), password.to_string(), user_id));
        inner.tables.points.push((user_id, points));
    }

    pub fn seed_skill(&self, user_id: i64, skill_id: i32, level: i32) {
        let mut inner = self.inner.lock();
        inner.tables.skills.push((user_id, skill_id, level));
    }

    /// The next execute whose SQL contains `needle` fails once.
    pub fn fail_next_execute(&self, needle: &str) {
        self.inner.lock().fail_execute_containing = Some(needle.to_string());
    }
}

/// Every integer literal in the statement, in order.
fn numbers(sql: &str) -> Vec<i64> {
    let mut out = Vec::new();
    let mut current: Option<i64> = None;

    for ch in sql.chars() {
        if let Some(digit) = ch.to_digit(10) {
            current = Some(current.unwrap_or(0) * 10 + digit as i64);
        } else if let Some(value) = current.take() {
            out.push(value);
        }
    }
    if let Some(value) = current {
        out.push(value);
    }
    out
}

/// The single quoted literal of the statement. Doubled quotes unescape;
/// the statements issued here carry at most one literal.
fn quoted(sql: &str) -> Option<String> {
    let start = sql.find('\'')? + 1;
    let end = sql.rfind('\'')?;
    if end < start {
        return None;
    }
    Some(sql[start..end].replace("''", "'"))
}

enum Value {
    Int(i64),
    Text(String),
}

struct Rows {
    rows: Vec<Vec<Value>>,
    cursor: Option<usize>,
}

impl Rows {
    fn new(rows: Vec<Vec<Value>>) -> Box<Rows> {
        Box::new(Rows { rows, cursor: None })
    }

    fn current(&self, column: usize) -> Option<&Value> {
        self.rows.get(self.cursor?)?.get(column)
    }
}

impl ResultSet for Rows {
    fn next(&mut self) -> bool {
        let next = self.cursor.map_or(0, |cursor| cursor + 1);
        if next < self.rows.len() {
            self.cursor = Some(next);
            true
        } else {
            false
        }
    }

    fn get_int(&self, column: usize) -> i64 {
        match self.current(column) {
            Some(Value::Int(value)) => *value,
            _ => 0,
        }
    }

    fn get_string(&self, column: usize) -> String {
        match self.current(column) {
            Some(Value::Text(value)) => value.clone(),
            Some(Value::Int(value)) => value.to_string(),
            None => String::new(),
        }
    }

    fn get_double(&self, column: usize) -> f64 {
        self.get_int(column) as f64
    }
}

pub struct DemoConnection {
    store: Arc<DemoStore>,
    connected: bool,
}

impl DemoConnection {
    pub fn new(store: Arc<DemoStore>) -> DemoConnection {
        DemoConnection {
            store,
            connected: false,
        }
    }
}

impl DbConnection for DemoConnection {
    fn connect(&mut self, _conn_str: &str) -> bool {
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
        self.connected
    }

    fn execute(&mut self, sql: &str) -> DbResult<()> {
        if !self.connected {
            return Err(DbError::NotConnected);
        }

        let mut inner = self.store.inner.lock();

        if let Some(needle) = inner.fail_execute_containing.take() {
            if sql.contains(&needle) {
                return Err(DbError::Exec(format!("injected failure on '{}'", needle)));
            }
            inner.fail_execute_containing = Some(needle);
        }

        if sql.starts_with("BEGIN") {
            inner.tx_snapshot = Some(inner.tables.clone());
            return Ok(());
        }
        if sql.starts_with("COMMIT") {
            inner.tx_snapshot = None;
            return Ok(());
        }
        if sql.starts_with("ROLLBACK") {
            if let Some(snapshot) = inner.tx_snapshot.take() {
                inner.tables = snapshot;
            }
            return Ok(());
        }

        if sql.starts_with("INSERT INTO user_game_data") {
            // VALUES (user, amount) ... points = points + amount
            let args = numbers(sql);
            let (user_id, amount) = (args[0], args[1]);
            match inner.tables.points.iter_mut().find(|(id, _)| *id == user_id) {
                Some((_, points)) => *points += amount,
                None => inner.tables.points.push((user_id, amount)),
            }
            return Ok(());
        }

        if sql.starts_with("UPDATE user_game_data") {
            // points = points - cost WHERE user_id = user
            let args = numbers(sql);
            let (cost, user_id) = (args[0], args[1]);
            if let Some((_, points)) = inner.tables.points.iter_mut().find(|(id, _)| *id == user_id) {
                *points -= cost;
            }
            return Ok(());
        }

        if sql.starts_with("INSERT INTO user_skills") {
            // VALUES (user, skill, 1) ... level = level + 1
            let args = numbers(sql);
            let (user_id, skill_id) = (args[0], args[1] as i32);
            match inner
                .tables
                .skills
                .iter_mut()
                .find(|(id, skill, _)| *id == user_id && *skill == skill_id)
            {
                Some((_, _, level)) => *level += 1,
                None => inner.tables.skills.push((user_id, skill_id, 1)),
            }
            return Ok(());
        }

        Err(DbError::Exec(format!("unsupported statement: {}", sql)))
    }

    fn query(&mut self, sql: &str) -> DbResult<Box<dyn ResultSet>> {
        if !self.connected {
            return Err(DbError::NotConnected);
        }

        let inner = self.store.inner.lock();

        if sql.contains("FROM users") {
            let Some(username) = quoted(sql) else {
                return Err(DbError::Exec("missing username literal".to_string()));
            };
            let rows = inner
                .tables
                .users
                .iter()
                .filter(|(name, _, _)| *name == username)
                .map(|(_, password, user_id)| vec![Value::Int(*user_id), Value::Text(password.clone())])
                .collect();
            return Ok(Rows::new(rows));
        }

        if sql.contains("FROM user_game_data") {
            let user_id = *numbers(sql).first().unwrap_or(&0);
            let rows = inner
                .tables
                .points
                .iter()
                .filter(|(id, _)| *id == user_id)
                .map(|(_, points)| vec![Value::Int(*points)])
                .collect();
            return Ok(Rows::new(rows));
        }

        if sql.contains("FROM user_skills") {
            let user_id = *numbers(sql).first().unwrap_or(&0);
            let rows = inner
                .tables
                .skills
                .iter()
                .filter(|(id, _, _)| *id == user_id)
                .map(|(_, skill, level)| vec![Value::Int(*skill as i64), Value::Int(*level as i64)])
                .collect();
            return Ok(Rows::new(rows));
        }

        Err(DbError::Exec(format!("unsupported query: {}", sql)))
    }
}
