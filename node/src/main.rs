#![forbid(unsafe_code)]

//! `paw-node`: a thin binary wiring genesis loading, a `clap`-based
//! CLI, and the block-execution loop around `paw-execution`. Grounded
//! on the teacher's `kernel/crates/node` + `kernel/crates/cli` split,
//! collapsed into a single small binary since this core has no
//! separate validator/orchestration/workload process boundary.

mod commands;
mod config;
mod consensus_feed;
mod tracing_init;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{init, query, start};

#[derive(Parser, Debug)]
#[clap(name = "paw-node", version, about = "The PAW chain node")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a default node.toml and genesis.toml.
    Init(init::InitArgs),
    /// Run the block-execution loop against a stub consensus feed.
    Start(start::StartArgs),
    /// Look up a raw state key after replaying genesis.
    Query(query::QueryArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init(args) => init::run(args),
        Command::Start(args) => start::run(args).await,
        Command::Query(args) => query::run(args),
    }
}
