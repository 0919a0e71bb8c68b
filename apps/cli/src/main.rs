//! wasmcache CLI — local-first chunked binary-module cache.
//!
//! Prefetches manifest-described WebAssembly modules into a durable local
//! cache and exports them as flat byte buffers for a consuming engine.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
