use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const DEFAULT_PORT: u16 = 29008;

#[derive(Debug, Serialize, Deserialize)]
pub struct Server {
    pub address: String,
    pub io_threads: usize,
    pub max_sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Database {
    pub conn_str: String,
    pub pool_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Mq {
    /// Fast (fire-and-forget) broker endpoint.
    pub fast_url: String,
    /// Reliable (stream) broker endpoint.
    pub reliable_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Game {
    pub fps: u64,
    pub map_width: f32,
    pub map_height: f32,
    pub max_players: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Limits {
    /// Inbound packets per second refilled into each session's bucket.
    pub recv_rate: f64,
    pub recv_burst: f64,
    /// Dispatcher queue depth that triggers overload back-off.
    pub dispatch_soft_cap: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Log {
    pub level: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GameConfig {
    pub server: Server,
    pub database: Database,
    pub mq: Mq,
    pub game: Game,
    pub limits: Limits,
    pub log: Log,
}

impl Default for GameConfig {
    fn default() -> GameConfig {
        GameConfig {
            server: Server {
                address: format!("0.0.0.0:{}", DEFAULT_PORT),
                io_threads: 2,
                max_sessions: 1024,
            },
            database: Database {
                conn_str: "demo://memory".to_string(),
                pool_size: 4,
            },
            mq: Mq {
                fast_url: "inproc://fast".to_string(),
                reliable_url: "inproc://reliable".to_string(),
            },
            game: Game {
                fps: 20,
                map_width: 8000.0,
                map_height: 8000.0,
                max_players: 4,
            },
            limits: Limits {
                recv_rate: 100.0,
                recv_burst: 200.0,
                dispatch_soft_cap: 10_000,
            },
            log: Log {
                level: "info".to_string(),
            },
        }
    }
}

#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl GameConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<GameConfig, ConfigError> {
        serdeconv::from_toml_file(path.as_ref()).map_err(|err| ConfigError(err.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        serdeconv::to_toml_string(self).map_err(|err| ConfigError(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roundtrips_through_toml() {
        let config = GameConfig::default();
        let toml = config.to_toml().unwrap();

        let parsed: GameConfig = serdeconv::from_toml_str(&toml).unwrap();
        assert_eq!(parsed.server.address, config.server.address);
        assert_eq!(parsed.game.fps, 20);
        assert_eq!(parsed.limits.dispatch_soft_cap, 10_000);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = GameConfig::load("/nonexistent/server.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_config_rejected() {
        let result: Result<GameConfig, _> = serdeconv::from_toml_str("[server]\naddress = \"x\"\n");
        assert!(result.is_err());
    }
}
