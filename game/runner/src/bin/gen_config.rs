//! Prints the default server configuration as TOML, for bootstrapping a
//! deployment: `gen_config > server.toml`.

use gamecore::config::GameConfig;

fn main() {
    match GameConfig::default().to_toml() {
        Ok(toml) => print!("{}", toml),
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    }
}
