//! Command-line parsing, modeled on `store-validator`'s `clap::Command`
//! shape: a `--config` flag with a sane default so a bare invocation
//! just works against `./config.toml`.

use std::path::PathBuf;

use clap::Parser;

fn default_config_path() -> PathBuf {
    PathBuf::from("config.toml")
}

#[derive(Debug, Parser)]
#[command(name = "edgegraph-server", about = "EdgeGraph RPC/WebSocket server")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value_os_t = default_config_path())]
    pub config: PathBuf,
}
