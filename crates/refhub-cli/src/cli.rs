use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "refhub",
    about = "refhub — branch and ref synchronization hub",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the hub server
    Serve(ServeArgs),
    /// Check that a server is alive
    Ping(PingArgs),
    /// List repos known to a private server
    Repos(ReposArgs),
    /// List a repo's refs with their watchers
    Refs(RefsArgs),
    /// Show one ref's state
    Ref(RefArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the configured bind address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Serve in private mode (single trusted client, enables repo/list)
    #[arg(long)]
    pub private: bool,
}

#[derive(Args)]
pub struct PingArgs {
    #[arg(short, long, default_value = "127.0.0.1:4288")]
    pub endpoint: String,
}

#[derive(Args)]
pub struct ReposArgs {
    #[arg(short, long, default_value = "127.0.0.1:4288")]
    pub endpoint: String,
}

#[derive(Args)]
pub struct RefsArgs {
    #[arg(short, long, default_value = "127.0.0.1:4288")]
    pub endpoint: String,
    pub repo: String,
}

#[derive(Args)]
pub struct RefArgs {
    #[arg(short, long, default_value = "127.0.0.1:4288")]
    pub endpoint: String,
    pub repo: String,
    /// Ref name; resolved fuzzily ("x" finds "branch/x")
    pub name: String,
}
