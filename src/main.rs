//! # snapvault
//!
//! **snapvault** snapshots a working directory into a git history and
//! publishes it to a remote with bearer credentials.
//!
//! - `snapvault run` executes one full lifecycle pass:
//!   clone-or-resume, stage, commit, dated branch, publish
//! - `snapvault branches` lists the local head references of an existing
//!   working copy
//!
//! Configuration comes from a TOML file (see [`Settings`]); the secret
//! token may instead be supplied via `SNAPVAULT_TOKEN`.
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use anyhow::Result;
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use snapvault::{Git2Engine, RepositoryHandle, Settings, list_branches, run_pass};

/// Command-line interface definition.
///
/// Parsed using `clap` derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "snapvault",
    version,
    about = "snapshot a directory into git history and publish it",
    arg_required_else_help = true
)]
struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run one full lifecycle pass (clone/resume, stage, commit, branch, publish)
    Run {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "snapvault.toml")]
        config: PathBuf,
        /// Commit message (default: "<name> backup: <UTC timestamp>")
        #[arg(short, long)]
        message: Option<String>,
        /// Branch name (default: today's date, YYYY-MM-DD)
        #[arg(short, long)]
        branch: Option<String>,
    },
    /// List local head references of the existing working copy
    Branches {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "snapvault.toml")]
        config: PathBuf,
    },
}

fn build_handle(settings: &Settings) -> Result<RepositoryHandle<Git2Engine>> {
    Ok(RepositoryHandle::new(
        settings.name.clone(),
        settings.local_path.clone(),
        settings.remote_url.clone(),
        settings.credentials()?,
    ))
}

/// CLI entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();

    stderrlog::new()
        .module(module_path!())
        .module("snapvault")
        .verbosity(usize::from(cli.verbose) + 2)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    match cli.cmd {
        Cmd::Run {
            config,
            message,
            branch,
        } => {
            let settings = Settings::load(&config)?;
            let engine = Git2Engine::new(settings.network_timeout());
            let mut handle = build_handle(&settings)?;

            let message = message
                .or_else(|| settings.commit_message.clone())
                .unwrap_or_else(|| {
                    format!(
                        "{} backup: {}",
                        settings.name,
                        Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
                    )
                });
            let branch = branch.or_else(|| settings.branch.clone());

            let outcome = run_pass(&engine, &mut handle, &message, branch.as_deref())?;
            println!(
                "published revision {} as refs/heads/{}",
                outcome.revision, outcome.branch
            );
        }
        Cmd::Branches { config } => {
            let settings = Settings::load(&config)?;
            let engine = Git2Engine::new(settings.network_timeout());
            let mut handle = build_handle(&settings)?;

            for name in list_branches(&engine, &mut handle)? {
                println!("{name}");
            }
        }
    }

    Ok(())
}
