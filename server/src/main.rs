//! The `edgegraph-server` binary (spec component "server"): loads and
//! validates config, wires every crate into a running process, and
//! serves the RPC surface over HTTP and WebSocket. `main` itself stays
//! thin and uses `anyhow` at its edges, the way `neard`'s binary does.

mod blob_fs;
mod cli;
mod config;
mod http;
mod wiring;
mod ws;

use anyhow::Context;
use clap::Parser;
use edgegraph_rpc::SafeParseLimits;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    edgegraph_o11y::init_tracing();
    let cli = cli::Cli::parse();

    let config = config::Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    tracing::info!(namespace = %config.namespace, num_shards = config.num_shards, "starting edgegraph-server");

    let app = wiring::build(&config);
    let limits = SafeParseLimits {
        max_size: config.rpc_limits.max_size,
        max_depth: config.rpc_limits.max_depth,
        max_keys: config.rpc_limits.max_keys,
    };

    let http_addr = config.http_addr.clone();
    let ws_addr = config.ws_addr.clone();
    let http_rpc = app.rpc.clone();
    let ws_rpc = app.rpc.clone();

    let http_task = tokio::spawn(async move { http::serve(&http_addr, http_rpc, limits).await });
    let ws_task = tokio::spawn(async move { ws::serve(&ws_addr, ws_rpc, limits).await });

    tokio::select! {
        res = http_task => res.context("HTTP listener task panicked")?.context("HTTP listener failed")?,
        res = ws_task => res.context("WebSocket listener task panicked")?.context("WebSocket listener failed")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    Ok(())
}
