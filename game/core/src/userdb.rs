use flint::logging::{self, Logger};
use flint::UserId;
use harrow::db::pool::DbPool;
use harrow::db::Transaction;
use std::sync::Arc;

/// Thin SQL-backed user persistence over the connection pool.
///
/// Every call acquires a pooled connection and fails gracefully when the
/// pool is empty: reads return defaults, writes are dropped with a log.
/// Callers decide whether that turns into a `success = false` response.
pub struct UserDb {
    pool: Arc<DbPool>,
    log: Logger,
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

impl UserDb {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(pool: Arc<DbPool>, log: L) -> UserDb {
        UserDb {
            pool,
            log: logging::child(log),
        }
    }

    /// Checks `username`/`password` against the users table. `None` on bad
    /// credentials, unknown user, or pool exhaustion.
    pub fn verify_credentials(&self, username: &str, password: &str) -> Option<UserId> {
        let Some(mut conn) = self.pool.acquire() else {
            logging::error!(self.log, "db pool exhausted during login");
            return None;
        };

        let sql = format!(
            "SELECT user_id, password FROM users WHERE username = '{}';",
            escape(username)
        );
        let mut rows = match conn.query(&sql) {
            Ok(rows) => rows,
            Err(err) => {
                logging::error!(self.log, "credential query failed"; "error" => ?err);
                return None;
            }
        };

        if rows.next() && rows.get_string(1) == password {
            Some(rows.get_int(0))
        } else {
            None
        }
    }

    pub fn get_user_points(&self, user_id: UserId) -> i64 {
        let Some(mut conn) = self.pool.acquire() else {
            return 0;
        };

        let sql = format!("SELECT points FROM user_game_data WHERE user_id = {};", user_id);
        match conn.query(&sql) {
            Ok(mut rows) => {
                if rows.next() {
                    rows.get_int(0)
                } else {
                    0
                }
            }
            Err(err) => {
                logging::error!(self.log, "points query failed"; "user_id" => user_id, "error" => ?err);
                0
            }
        }
    }

    /// Upserts a point grant.
    pub fn add_user_points(&self, user_id: UserId, amount: i64) {
        let Some(mut conn) = self.pool.acquire() else {
            logging::warn!(self.log, "db pool exhausted, point grant dropped"; "user_id" => user_id);
            return;
        };

        let sql = format!(
            "INSERT INTO user_game_data (user_id, points) VALUES ({}, {}) \
             ON CONFLICT(user_id) DO UPDATE SET points = points + {};",
            user_id, amount, amount
        );
        if let Err(err) = conn.execute(&sql) {
            logging::error!(self.log, "point grant failed"; "user_id" => user_id, "error" => ?err);
        }
    }

    /// `(skill_id, level)` pairs for the user.
    pub fn get_user_skills(&self, user_id: UserId) -> Vec<(i32, i32)> {
        let Some(mut conn) = self.pool.acquire() else {
            return Vec::new();
        };

        let sql = format!("SELECT skill_id, level FROM user_skills WHERE user_id = {};", user_id);
        let mut rows = match conn.query(&sql) {
            Ok(rows) => rows,
            Err(err) => {
                logging::error!(self.log, "skill query failed"; "user_id" => user_id, "error" => ?err);
                return Vec::new();
            }
        };

        let mut skills = Vec::new();
        while rows.next() {
            skills.push((rows.get_int(0) as i32, rows.get_int(1) as i32));
        }
        skills
    }

    /// Spends `cost` points to unlock or level a skill, transactionally:
    /// verify balance, deduct, upsert. Any failure rolls back.
    pub fn unlock_skill(&self, user_id: UserId, skill_id: i32, cost: i64) -> bool {
        if self.get_user_points(user_id) < cost {
            return false;
        }

        let Some(mut conn) = self.pool.acquire() else {
            logging::warn!(self.log, "db pool exhausted, unlock dropped"; "user_id" => user_id);
            return false;
        };

        let mut tx = match Transaction::begin(&mut *conn) {
            Ok(tx) => tx,
            Err(err) => {
                logging::error!(self.log, "transaction begin failed"; "error" => ?err);
                return false;
            }
        };

        let deduct = format!(
            "UPDATE user_game_data SET points = points - {} WHERE user_id={};",
            cost, user_id
        );
        if tx.execute(&deduct).is_err() {
            return false;
        }

        let upsert = format!(
            "INSERT INTO user_skills (user_id, skill_id, level) VALUES ({}, {}, 1) \
             ON CONFLICT(user_id, skill_id) DO UPDATE SET level = level + 1;",
            user_id, skill_id
        );
        if tx.execute(&upsert).is_err() {
            return false;
        }

        tx.commit().is_ok()
    }
}
