use std::path::PathBuf;

use clap::{ArgEnum, Args, Parser, Subcommand};

use types::config::StorageKind;

mod node;

#[derive(ArgEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<Level> for tracing::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => tracing::Level::TRACE,
            Level::Debug => tracing::Level::DEBUG,
            Level::Info => tracing::Level::INFO,
            Level::Warn => tracing::Level::WARN,
            Level::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// Directory for the chain database, config.json and debug.log
    #[clap(long, parse(from_os_str))]
    datadir: Option<PathBuf>,
    /// Config file, defaults to <datadir>/config.json
    #[clap(long, parse(from_os_str))]
    config_file: Option<PathBuf>,
    /// memory | sled | rocksdb
    #[clap(long)]
    storage: Option<StorageKind>,
    #[clap(long)]
    block_step: Option<u32>,
    #[clap(long)]
    max_block_transactions: Option<usize>,
    /// Hex encoded operator secret key
    #[clap(long)]
    operator_key: Option<String>,
    #[clap(long, arg_enum, default_value = "info")]
    log_level: Level,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the child chain operator
    Run(RunArgs),
    /// Generate an operator key
    Keygen,
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Plasma child chain operator", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

fn main() -> anyhow::Result<()> {
    let cli: Cli = Cli::parse();
    match &cli.command {
        Command::Run(args) => node::run(args),
        Command::Keygen => node::keygen(),
    }
}
