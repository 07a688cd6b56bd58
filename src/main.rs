use clap::Parser as _;
use cm6206_tools::{ExitStatus, commands, exit_status};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

const LOG_FILTER_VAR: &str = "CM6206_TOOLS_LOG";

/// Read and control the registers of USB sound cards with the CM6206 chip.
#[derive(clap::Parser)]
#[clap(version, about)]
enum Commands {
    Read(commands::read::Args),
    Write(commands::write::Args),
    Init(commands::init::Args),
    Dma(commands::dma::Args),
    Dump(commands::dump::Args),
    Fields(commands::fields::Args),
    Devices(commands::devices::Args),
}

fn end<E: std::error::Error + ExitStatus>(r: Result<(), E>) {
    std::process::exit(match r {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            let mut cause = e.source();
            while let Some(e) = cause {
                eprintln!("  because: {e}");
                cause = e.source();
            }
            e.exit_status()
        }
    });
}

fn main() {
    let filter_description = std::env::var(LOG_FILTER_VAR).unwrap_or_else(|_| "warn".into());
    let filter = filter_description
        .parse::<tracing_subscriber::filter::targets::Targets>()
        .unwrap_or_else(|e| {
            eprintln!("warning: ignoring {LOG_FILTER_VAR}: {e}");
            tracing_subscriber::filter::targets::Targets::new()
                .with_default(tracing::Level::WARN)
        });
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    let command = match Commands::try_parse() {
        Ok(command) => command,
        Err(e) if e.use_stderr() => {
            eprint!("{e}");
            std::process::exit(exit_status::USAGE);
        }
        Err(e) => e.exit(),
    };
    match command {
        Commands::Read(args) => end(commands::read::run(args)),
        Commands::Write(args) => end(commands::write::run(args)),
        Commands::Init(args) => end(commands::init::run(args)),
        Commands::Dma(args) => end(commands::dma::run(args)),
        Commands::Dump(args) => end(commands::dump::run(args)),
        Commands::Fields(args) => end(commands::fields::run(args)),
        Commands::Devices(args) => end(commands::devices::run(args)),
    }
}
