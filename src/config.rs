//! Process configuration, taken from the environment.

use clap::Parser;

/// OpenAI module for the evntboard event bus.
///
/// Required values are read from the environment and fail argument parsing
/// when absent, before any connection attempt.
#[derive(Debug, Clone, Parser)]
#[command(name = "evntboard-openai", version, about)]
pub struct Config {
    /// WebSocket URL of the evntboard hub.
    #[arg(long, env = "EVNTBOARD_HOST")]
    pub host: String,

    /// Module display name, as registered with the hub.
    #[arg(long, env = "MODULE_NAME")]
    pub name: String,

    /// Module auth token, relayed in the registration handshake.
    #[arg(long, env = "MODULE_TOKEN")]
    pub token: String,

    /// Module code; also prefixes the queue-state event name.
    #[arg(long, env = "MODULE_CODE", default_value = "openai")]
    pub code: String,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}
