#![allow(clippy::len_without_is_empty)]
#![allow(clippy::new_without_default)]

//! Shared leaf crate: id types, the logging facade and wall-clock helpers.

/// Identifies a connected socket for its whole lifetime. Never reused.
pub type SessionId = u64;

/// Persistent account identifier (primary key of `user_game_data`).
pub type UserId = i64;

/// In-simulation object identifier, allocated per room.
pub type ObjectId = i32;

/// Room identifier.
pub type RoomId = i32;

pub mod logging;
pub mod time;
