//! Command-line interface definitions for the `syncdet` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `syncdet` binary.
#[derive(Debug, Parser)]
#[command(
    name = "syncdet",
    about = "Coordinate distributed file-sync test actors through a shared barrier",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Serve the barrier contract over HTTP until interrupted.
    #[command(name = "serve", about = "Run the reference barrier service")]
    Serve(ServeCommand),
    /// Print the tree digest of a directory.
    #[command(name = "digest", about = "Print the tree digest of a directory")]
    Digest(DigestCommand),
    /// Print the lucky actor for a seed.
    #[command(name = "lucky", about = "Print the lucky actor index for a seed")]
    Lucky(LuckyCommand),
    /// Print a fresh run identifier.
    #[command(name = "run-id", about = "Print a fresh run identifier")]
    RunId,
}

/// Arguments for the `syncdet serve` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ServeCommand {
    /// Address to bind.
    #[arg(long, env = "SYNCDET_SERVICE_HOST", default_value = "127.0.0.1")]
    pub(crate) host: String,
    /// TCP port to bind.
    #[arg(long, env = "SYNCDET_SERVICE_PORT", default_value_t = 8734)]
    pub(crate) port: u16,
}

/// Arguments for the `syncdet digest` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DigestCommand {
    /// Directory to scan.
    #[arg(value_name = "PATH")]
    pub(crate) path: String,
    /// File name whose content is ignored; repeat for several names.
    #[arg(long = "ignore", value_name = "NAME")]
    pub(crate) ignore: Vec<String>,
}

/// Arguments for the `syncdet lucky` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct LuckyCommand {
    /// Seed shared by every actor, usually the run identifier.
    #[arg(long, env = "SYNCDET_RUN_ID")]
    pub(crate) seed: String,
    /// Number of actors in the run.
    #[arg(long)]
    pub(crate) actors: usize,
}
