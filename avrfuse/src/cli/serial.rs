use crossterm::style::Stylize;
use dialoguer::{theme::ColorfulTheme, Confirm, Select};
use log::info;
use miette::{IntoDiagnostic, Result};
use serialport::{available_ports, SerialPortInfo, SerialPortType, UsbPortInfo};

use super::{
    config::{Config, UsbDevice},
    ConnectArgs,
};
use crate::error::Error;

/// Resolve the serial port the programmer is connected to
///
/// A port given on the command line takes precedence over the one in the
/// configuration file. Without either, the detected USB serial ports are
/// offered for selection.
pub fn get_serial_port_info(args: &ConnectArgs, config: &Config) -> Result<SerialPortInfo, Error> {
    let ports = detect_usb_serial_ports().unwrap_or_default();

    match args.port.as_ref().or(config.connection.serial.as_ref()) {
        Some(serial) => {
            // canonicalize() does not work with Windows device names like `COM4`
            #[cfg(not(target_os = "windows"))]
            let serial = std::fs::canonicalize(serial)
                .map_err(|_| Error::SerialNotFound(serial.to_owned()))?
                .to_string_lossy()
                .to_string();
            find_serial_port(&ports, &serial)
        }
        None => select_serial_port(ports, config),
    }
}

/// Find the port whose name matches `name`, ignoring case
fn find_serial_port(ports: &[SerialPortInfo], name: &str) -> Result<SerialPortInfo, Error> {
    ports
        .iter()
        .find(|port| port.port_name.eq_ignore_ascii_case(name))
        .cloned()
        .ok_or_else(|| Error::SerialNotFound(name.to_owned()))
}

fn detect_usb_serial_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = available_ports().into_diagnostic()?;
    let ports = ports
        .into_iter()
        .filter(|port_info| {
            matches!(
                &port_info.port_type,
                SerialPortType::UsbPort(..) | SerialPortType::Unknown
            )
        })
        .collect::<Vec<_>>();

    Ok(ports)
}

/// Boards and USB UART adapters commonly used to run ArduinoISP
const KNOWN_DEVICES: &[UsbDevice] = &[
    UsbDevice {
        vid: 0x2341,
        pid: 0x0043,
    }, // Arduino Uno R3
    UsbDevice {
        vid: 0x2341,
        pid: 0x0042,
    }, // Arduino Mega 2560 R3
    UsbDevice {
        vid: 0x2341,
        pid: 0x8036,
    }, // Arduino Leonardo
    UsbDevice {
        vid: 0x1a86,
        pid: 0x7523,
    }, // QinHeng Electronics CH340 serial converter
    UsbDevice {
        vid: 0x0403,
        pid: 0x6001,
    }, // FTDI FT232R
];

/// Whether the port belongs to a configured or well known programmer board
fn is_known_programmer(config: &Config, info: &UsbPortInfo) -> bool {
    config
        .usb_device
        .iter()
        .chain(KNOWN_DEVICES)
        .any(|device| device.matches(info))
}

/// Port name, highlighted for known programmers, and the product if any
fn port_label(config: &Config, port: &SerialPortInfo) -> String {
    let SerialPortType::UsbPort(info) = &port.port_type else {
        return port.port_name.clone();
    };

    let name = if is_known_programmer(config, info) {
        port.port_name.as_str().bold().to_string()
    } else {
        port.port_name.clone()
    };

    match &info.product {
        Some(product) => format!("{name} - {product}"),
        None => name,
    }
}

/// Pick a port: a single known programmer is used as is, a single unknown
/// port needs confirmation, and several ports are offered in a list
fn select_serial_port(ports: Vec<SerialPortInfo>, config: &Config) -> Result<SerialPortInfo, Error> {
    match ports.as_slice() {
        [] => Err(Error::NoSerial),
        [port] => {
            let known = match &port.port_type {
                SerialPortType::UsbPort(info) => is_known_programmer(config, info),
                _ => false,
            };

            let confirmed = known
                || Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt(format!("Use serial port {}?", port_label(config, port)))
                    .interact_opt()?
                    .ok_or(Error::Cancelled)?;

            if confirmed {
                Ok(port.clone())
            } else {
                Err(Error::SerialNotFound(port.port_name.clone()))
            }
        }
        ports => {
            info!(
                "Detected {} serial ports, known programmer boards are highlighted",
                ports.len()
            );

            let labels = ports
                .iter()
                .map(|port| port_label(config, port))
                .collect::<Vec<_>>();

            let index = Select::with_theme(&ColorfulTheme::default())
                .items(&labels)
                .default(0)
                .interact_opt()?
                .ok_or(Error::Cancelled)?;

            ports
                .get(index)
                .cloned()
                .ok_or_else(|| Error::SerialNotFound(labels[index].clone()))
        }
    }
}
