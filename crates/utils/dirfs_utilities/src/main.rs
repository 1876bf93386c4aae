use std::{
    fs::File,
    io::{self, BufReader},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::Context as _;
use clap::Parser;
use dirfs::storage::MemStore;
use dirfs_params::FS_SECTORS;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use self::shell::Shell;

mod shell;

#[derive(Parser, Debug)]
#[command(
    name = "dirsh",
    about = "Run directory commands against an in-memory filesystem"
)]
struct Cli {
    /// Size of the in-memory device in sectors
    #[arg(long, default_value_t = FS_SECTORS)]
    sectors: usize,

    /// Log filter, used instead of `RUST_LOG`
    #[arg(long)]
    log: Option<String>,

    /// Script to run; commands are read from stdin if omitted
    script: Option<PathBuf>,
}

fn init_logging(filter: Option<&str>) {
    let env_filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    let store = MemStore::format(cli.sectors)
        .with_context(|| format!("failed to format a device of {} sectors", cli.sectors))?;
    tracing::info!(
        sectors = store.num_sectors(),
        free = store.free_sectors(),
        "device formatted"
    );
    let mut shell = Shell::new(&store, io::stdout().lock());

    let failed = match &cli.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            shell.run(BufReader::new(file))?
        }
        None => shell.run(io::stdin().lock())?,
    };

    tracing::info!(failed, open_inodes = store.open_inodes(), "done");
    if failed > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
