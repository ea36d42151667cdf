//! evntboard-openai - OpenAI module for the evntboard event bus.
//!
//! Connects to the hub given by `EVNTBOARD_HOST`, registers with the
//! identity from `MODULE_CODE`/`MODULE_NAME`/`MODULE_TOKEN`, then serves
//! assistant, vision and image-generation RPC methods until the hub closes
//! the connection.

use anyhow::Result;
use clap::Parser;
use log::info;

use evntboard_openai::config::Config;
use evntboard_openai::methods;
use evntboard_openai::rpc::RpcSession;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let log_level = if config.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    info!(
        "starting evntboard-openai module '{}' ({})",
        config.name, config.code
    );

    let (session, reader) = RpcSession::connect(&config.host).await?;
    methods::bootstrap(&session, &config).await?;

    // Serve until the hub goes away; pending requests are failed in bulk by
    // the reader before it exits.
    reader.await?;
    info!("connection closed, exiting");

    Ok(())
}
