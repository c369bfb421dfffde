use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use flagtally_ledger::LedgerBackend;

#[derive(Parser)]
#[command(
    name = "flagtally",
    about = "flagtally: one flag per user per item, counted",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML ledger config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured storage backend
    #[arg(long, global = true)]
    pub backend: Option<BackendArg>,

    /// Override the configured ledger file
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendArg {
    Memory,
    Wal,
    Sqlite,
}

impl From<BackendArg> for LedgerBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => LedgerBackend::Memory,
            BackendArg::Wal => LedgerBackend::Wal,
            BackendArg::Sqlite => LedgerBackend::Sqlite,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Flag an item on behalf of a user
    Flag(FlagArgs),
    /// Show the flag count of an item
    Count(ItemArgs),
    /// Show an item's flag count and whether a user flagged it
    Status(StatusArgs),
    /// List the flags on an item
    List(ItemArgs),
}

#[derive(Args)]
pub struct FlagArgs {
    #[arg(long)]
    pub item: u64,
    #[arg(long)]
    pub user: u64,
}

#[derive(Args)]
pub struct ItemArgs {
    #[arg(long)]
    pub item: u64,
}

#[derive(Args)]
pub struct StatusArgs {
    #[arg(long)]
    pub item: u64,
    /// Viewer; omit for an anonymous view
    #[arg(long)]
    pub user: Option<u64>,
}
