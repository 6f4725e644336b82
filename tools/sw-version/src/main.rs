//! Build-time version tag tool for the Hour Stacker service worker.
//!
//! Provides commands for:
//! - Printing the version tag a build would embed
//! - Printing the worker registration URL and cache store names
//! - Running a build command with the tag exported
//!
//! ## Usage
//!
//! ```bash
//! # Tag from the build environment (or a timestamp)
//! sw-version tag
//!
//! # Prefer the checked-out commit
//! sw-version tag --git
//!
//! # Registration URL and cache names for a tag
//! sw-version names --tag abc123 --config shell.json
//!
//! # Run the production build with NEXT_PUBLIC_SW_VERSION set
//! sw-version exec --git -- next build
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use stacker_common::logging::{init_logging, LogConfig, LogFormat};
use stacker_core::{ShellConfig, VersionTag};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info};

mod tag;

#[derive(Parser)]
#[command(name = "sw-version")]
#[command(about = "Version tag tool for the Hour Stacker service worker")]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON log output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TagArgs {
    /// Use this tag instead of resolving one
    #[arg(long)]
    tag: Option<String>,

    /// Prefer `git rev-parse --short HEAD`
    #[arg(long)]
    git: bool,

    /// Shell configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved version tag
    Tag {
        #[command(flatten)]
        args: TagArgs,
    },

    /// Print the registration URL and cache store names
    Names {
        #[command(flatten)]
        args: TagArgs,

        /// Print as a JSON object
        #[arg(long)]
        as_json: bool,
    },

    /// Run a command with the tag exported
    Exec {
        #[command(flatten)]
        args: TagArgs,

        /// Command and its arguments
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log = if cli.verbose {
        LogConfig::debug()
    } else {
        LogConfig::default().with_filter("warn")
    };
    if cli.json {
        log = log.with_format(LogFormat::Json);
    }
    init_logging(log);

    match cli.command {
        Commands::Tag { args } => {
            let (_, tag) = resolve(&args)?;
            println!("{}", tag);
        }

        Commands::Names { args, as_json } => {
            let (shell, tag) = resolve(&args)?;
            let derived = tag::Derived::new(&shell, &tag);
            if as_json {
                println!("{}", serde_json::to_string_pretty(&derived)?);
            } else {
                println!("tag:        {}", derived.tag);
                println!("script:     {}", derived.script_url);
                println!("precache:   {}", derived.precache);
                println!("runtime:    {}", derived.runtime);
            }
        }

        Commands::Exec { args, command } => {
            let (shell, tag) = resolve(&args)?;
            let code = run_with_tag(&shell, &tag, &command)?;
            std::process::exit(code);
        }
    }

    Ok(())
}

fn resolve(args: &TagArgs) -> Result<(ShellConfig, VersionTag)> {
    let shell = match args.config {
        Some(ref path) => ShellConfig::load(path)
            .with_context(|| format!("loading shell config {}", path.display()))?,
        None => ShellConfig::default(),
    };
    let git = if args.git { tag::git_short_sha() } else { None };
    if args.git && git.is_none() {
        debug!("git unavailable, falling back to build environment");
    }
    let tag = tag::resolve(args.tag.as_deref(), git, |var| std::env::var(var).ok());
    Ok((shell, tag))
}

fn run_with_tag(shell: &ShellConfig, tag: &VersionTag, command: &[String]) -> Result<i32> {
    let Some((program, rest)) = command.split_first() else {
        bail!("no command given");
    };
    info!(program, %tag, var = %shell.version_env, "Running with version tag");

    let status = Command::new(program)
        .args(rest)
        .env(&shell.version_env, tag.as_str())
        .status()
        .with_context(|| format!("starting {}", program))?;

    Ok(status.code().unwrap_or(1))
}
