use avrfuse::{
    cli::{config::Config, decode_value, list_devices, read_fuses, ConnectArgs, DecodeArgs, DeviceArgs},
    logging::initialize_logger,
};
use clap::{Parser, Subcommand};
use log::{debug, LevelFilter};
use miette::Result;

#[derive(Debug, Parser)]
#[command(about, max_term_width = 100, propagate_version = true, version)]
struct Cli {
    #[command(subcommand)]
    subcommand: Commands,

    /// Verbosity of the log output
    #[arg(long, global = true, default_value = "info", env = "AVRFUSE_LOG_LEVEL")]
    log_level: LevelFilter,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Identify the connected target and print its fuses and lock bits
    Read(ConnectArgs),
    /// Decode a fuse or lock bit value without a target attached
    Decode(DecodeArgs),
    /// List the devices with known fuse definitions
    ListDevices(DeviceArgs),
}

fn main() -> Result<()> {
    miette::set_panic_hook();

    // Attempt to parse any provided command-line arguments, or print the help
    // message and terminate if the invocation is not correct.
    let cli = Cli::parse();
    initialize_logger(cli.log_level);
    debug!("{:#?}", cli.subcommand);

    // Load any user configuration, if present.
    let config = Config::load()?;

    match cli.subcommand {
        Commands::Read(args) => read_fuses(args, &config),
        Commands::Decode(args) => decode_value(args, &config),
        Commands::ListDevices(args) => list_devices(args, &config),
    }
}
