//! Types and functions for the command-line interface
//!
//! The contents of this module are intended for use with the [avrfuse]
//! command-line application, and are likely not of much use otherwise.
//!
//! Important note: The cli module DOES NOT provide SemVer guarantees,
//! feel free to opt-out by disabling the default `cli` feature.
//!
//! [avrfuse]: https://crates.io/crates/avrfuse

use std::{num::ParseIntError, path::PathBuf, time::Duration};

use clap::Args;
use comfy_table::{
    modifiers, presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table,
};
use log::{error, info};
use miette::{Result, WrapErr};

use self::{config::Config, serial::get_serial_port_info};
use crate::{
    connection::ArduinoIsp,
    device::{Device, DeviceDatabase},
    error::Error,
    fuse::{decode, FieldKind, FuseGroup},
    interface::Interface,
    reader::{FuseReader, Register},
};

pub mod config;

mod serial;

/// Default baud rate of the ArduinoISP sketch
const DEFAULT_BAUD: u32 = 19_200;
/// Widest the rendered tables are allowed to grow
const MAX_TABLE_WIDTH: u16 = 95;

/// Establish a connection with a target device
#[derive(Debug, Args)]
#[non_exhaustive]
pub struct ConnectArgs {
    /// Serial port connected to the programmer
    #[arg(short = 'p', long, env = "AVRFUSE_PORT")]
    pub port: Option<String>,
    /// Baud rate of the programmer [default: 19200]
    #[arg(short = 'b', long, env = "AVRFUSE_BAUD")]
    pub baud: Option<u32>,
    /// Skip identification and use the definition of this device
    #[arg(short = 'd', long)]
    pub device: Option<String>,
    /// Time to wait for the programmer board to boot after opening the port,
    /// in milliseconds [default: 2000]
    #[arg(long)]
    pub settle_ms: Option<u64>,
    #[clap(flatten)]
    pub device_args: DeviceArgs,
}

/// Additional device definitions
#[derive(Debug, Args)]
#[non_exhaustive]
pub struct DeviceArgs {
    /// TOML file with additional device definitions, may be repeated
    #[arg(long = "devices-file", value_name = "FILE")]
    pub devices_file: Vec<PathBuf>,
}

/// Decode a register value without any hardware attached
#[derive(Debug, Args)]
#[non_exhaustive]
pub struct DecodeArgs {
    /// Device whose field definitions are used
    #[arg(short = 'd', long)]
    pub device: String,
    /// Register the value was read from
    #[arg(short = 'g', long, value_enum)]
    pub group: FuseGroup,
    /// Register value; hexadecimal (0x), binary (0b) or decimal
    #[arg(value_parser = parse_u8)]
    pub value: u8,
    #[clap(flatten)]
    pub device_args: DeviceArgs,
}

/// Parse a byte given in hexadecimal, binary or decimal notation
pub fn parse_u8(input: &str) -> Result<u8, ParseIntError> {
    let input = input.trim().replace('_', "");

    if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        u8::from_str_radix(hex, 16)
    } else if let Some(bin) = input
        .strip_prefix("0b")
        .or_else(|| input.strip_prefix("0B"))
    {
        u8::from_str_radix(bin, 2)
    } else {
        input.parse()
    }
}

/// Built-in devices, followed by those from the configuration file and the
/// command line, later definitions replacing earlier ones
pub fn load_devices(args: &DeviceArgs, config: &Config) -> Result<DeviceDatabase> {
    let mut database = DeviceDatabase::builtin();

    for path in config.devices.files.iter().chain(&args.devices_file) {
        let devices = DeviceDatabase::load_file(path)
            .wrap_err_with(|| format!("Failed to load device definitions from {}", path.display()))?;
        database.merge(devices);
    }

    Ok(database)
}

/// Open the programmer's serial port and sync with it
pub fn connect(args: &ConnectArgs, config: &Config) -> Result<ArduinoIsp<Interface>> {
    let port_info = get_serial_port_info(args, config)?;
    let baud = args
        .baud
        .or(config.connection.baudrate)
        .unwrap_or(DEFAULT_BAUD);
    let settle = Duration::from_millis(
        args.settle_ms
            .or(config.connection.settle_ms)
            .unwrap_or(2000),
    );

    info!("Serial port: '{}'", port_info.port_name);
    info!("Connecting...");

    let programmer = ArduinoIsp::open(&port_info.port_name, baud, settle)
        .wrap_err_with(|| format!("Failed to open serial port {}", port_info.port_name))?;

    Ok(programmer)
}

/// Identify the target, then read and print all of its registers
pub fn read_fuses(args: ConnectArgs, config: &Config) -> Result<()> {
    let database = load_devices(&args.device_args, config)?;
    let mut programmer = connect(&args, config)?;

    let mut reader = FuseReader::connect(&mut programmer, &database, args.device.as_deref())?;
    info!(
        "Device: {} (signature {})",
        reader.device().name,
        reader.signature()
    );

    reader.read_each(print_register)?;
    reader.close()?;

    Ok(())
}

/// Decode a single register value given on the command line
pub fn decode_value(args: DecodeArgs, config: &Config) -> Result<()> {
    let database = load_devices(&args.device_args, config)?;
    let device = database.device(&args.device)?;

    print_register(
        device,
        Register {
            group: args.group,
            raw: args.value,
        },
    )
}

/// Print the name and signature of every known device
pub fn list_devices(args: DeviceArgs, config: &Config) -> Result<()> {
    let database = load_devices(&args, config)?;

    let mut table = styled_table();
    table.set_header(vec![
        header_cell("Device", Color::Green),
        header_cell("Signature", Color::Cyan),
    ]);

    for device in database.iter() {
        table.add_row(vec![
            Cell::new(&device.name).fg(Color::Green),
            Cell::new(device.signature.to_string()).fg(Color::Cyan),
        ]);
    }
    println!("{table}");

    Ok(())
}

/// Decode and print one register as a table of its fields
pub fn print_register(device: &Device, register: Register) -> Result<()> {
    let table = register_table(device, register)?;

    println!();
    println!(
        "{} settings (Byte value: {:#04x})",
        register.group.title(),
        register.raw
    );
    println!("{table}");

    Ok(())
}

/// Build the rendered table of a register, logging any field whose value is
/// not a known setting
pub fn register_table(device: &Device, register: Register) -> Result<Table, Error> {
    let fields = device.table(register.group);
    let decoded = decode(register.raw, fields).map_err(|source| {
        Error::InvalidTable {
            device: device.name.clone(),
            group: register.group,
            source,
        }
    })?;

    for warning in decoded.warnings() {
        error!(
            "Invalid value for {} ==> got: {:#04x}",
            warning.field, warning.code
        );
    }

    let mut table = styled_table();
    table.set_header(vec![
        header_cell(register.group.name_header(), Color::Green),
        header_cell("Status", Color::Cyan),
        header_cell("Value", Color::Magenta),
        header_cell("Mask", Color::Yellow),
    ]);

    for field in decoded.fields() {
        // Flags hold a single programmed/unprogrammed bit
        let value = match fields.get(field.name).map(|spec| &spec.kind) {
            Some(FieldKind::Flag) => field.value.to_string(),
            _ => format!("{:#04x}", field.value),
        };

        table.add_row(vec![
            Cell::new(format!("{}\n({})", field.name, field.description)).fg(Color::Green),
            Cell::new(field.status).fg(Color::Cyan),
            Cell::new(value).fg(Color::Magenta),
            Cell::new(format!("{:#04x}", field.mask)).fg(Color::Yellow),
        ]);
    }

    Ok(table)
}

fn styled_table() -> Table {
    let width = crossterm::terminal::size()
        .map(|(columns, _)| columns.min(MAX_TABLE_WIDTH))
        .unwrap_or(MAX_TABLE_WIDTH);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(width);

    table
}

fn header_cell(title: &str, color: Color) -> Cell {
    Cell::new(title).fg(color).add_attribute(Attribute::Bold)
}
