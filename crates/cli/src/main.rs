// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! schedcache - thin demonstration client over the deferred job scheduler
//! and result cache.
//!
//! Carries none of the orchestration logic itself (spec §1: the CLI's
//! argument-parsing surface is an external collaborator to the core).
//! Ships three bundled example agents (`primes`, `timed`, `errors`) so the
//! binary is useful without a companion worker-registration crate, plus
//! an optional `--paths` glob for discovering additional agent metadata
//! files bound to those same bundled workers.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod app;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// A single command accepts an agent id positionally or via
/// `SCHEDCACHE_AGENT_ID`, with flags to force runner/cache choice,
/// control verbosity, and discover extra agent definition files.
#[derive(Parser)]
#[command(name = "schedcache", version, about = "Deferred job scheduler and result cache")]
struct Cli {
    /// Increase log verbosity (-v, -vv).
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Additional glob patterns to scan for agent definition files,
    /// beyond the bundled example agents.
    #[arg(long = "path", global = true)]
    paths: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Return the cached value for an agent, running it if necessary.
    Get(GetArgs),
    /// Force a fresh run of an agent, bypassing any cached value.
    Run(RunArgs),
    /// Remove the cached value for an agent.
    Invalidate(GetArgs),
    /// List every registered agent and its cache status.
    List,
}

#[derive(clap::Args)]
struct GetArgs {
    /// Agent id. Falls back to `SCHEDCACHE_AGENT_ID` if omitted.
    id: Option<String>,

    /// Agent settings as a JSON object.
    #[arg(long, default_value = "{}")]
    settings: String,

    /// Force a specific runner instead of the agent's default selection.
    #[arg(long)]
    runner: Option<String>,

    /// Force a specific cache backend instead of the default selection.
    #[arg(long)]
    cache: Option<String>,
}

#[derive(clap::Args)]
struct RunArgs {
    #[command(flatten)]
    get: GetArgs,

    /// Print the session record (id, status, cache key) instead of
    /// waiting for the eventual value.
    #[arg(long)]
    session: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let orchestrator = app::build_orchestrator(cli.paths).await?;
    orchestrator.init().await?;

    let result = match cli.command {
        Commands::Get(args) => app::run_get(&orchestrator, args_to_request(args)?).await,
        Commands::Run(args) => {
            app::run_run(&orchestrator, args_to_request(args.get)?, args.session).await
        }
        Commands::Invalidate(args) => app::run_invalidate(&orchestrator, args_to_request(args)?).await,
        Commands::List => app::run_list(&orchestrator).await,
    };

    orchestrator.destroy().await?;

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn args_to_request(args: GetArgs) -> Result<app::Request> {
    let id = args
        .id
        .or_else(|| std::env::var("SCHEDCACHE_AGENT_ID").ok())
        .ok_or_else(|| anyhow::anyhow!("no agent id given (positional argument or SCHEDCACHE_AGENT_ID)"))?;
    let settings: serde_json::Value = serde_json::from_str(&args.settings)?;
    Ok(app::Request {
        id,
        settings,
        runner: args.runner,
        cache: args.cache,
    })
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
