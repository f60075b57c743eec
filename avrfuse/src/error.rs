//! Library and application errors

use std::io;

use miette::Diagnostic;
use thiserror::Error;

use crate::{device::Signature, fuse::FuseGroup};

/// All possible errors returned by avrfuse
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Operation was cancelled by the user")]
    #[diagnostic(code(avrfuse::cancelled))]
    Cancelled,

    #[error("Error while communicating with the programmer")]
    #[diagnostic(transparent)]
    Connection(#[source] ConnectionError),

    #[error("Failed to parse device definitions")]
    #[diagnostic(
        code(avrfuse::invalid_device_definition),
        help("Device definitions are TOML files containing one or more `[[device]]` tables")
    )]
    InvalidDeviceDefinition(#[from] toml::de::Error),

    #[error("The {group} table of {device} is invalid")]
    #[diagnostic(code(avrfuse::invalid_field_table))]
    InvalidTable {
        device: String,
        group: FuseGroup,
        #[source]
        #[diagnostic_source]
        source: TableError,
    },

    #[error("Failed to parse configuration file {0}")]
    #[diagnostic(code(avrfuse::invalid_config))]
    InvalidConfig(String, #[source] toml::de::Error),

    #[error("Failed to open file: {0}")]
    #[diagnostic(code(avrfuse::file_open))]
    FileOpenError(String, #[source] io::Error),

    #[error("No serial ports could be detected")]
    #[diagnostic(
        code(avrfuse::no_serial),
        help("Make sure you have connected a programmer to the host system")
    )]
    NoSerial,

    #[error("The serial port '{0}' could not be found")]
    #[diagnostic(
        code(avrfuse::serial_not_found),
        help("Make sure the correct programmer is connected to the host system")
    )]
    SerialNotFound(String),

    #[error("Invalid device signature '{0}'")]
    #[diagnostic(
        code(avrfuse::invalid_signature),
        help("A signature is written as six hexadecimal digits, for example `1e950f`")
    )]
    InvalidSignature(String),

    #[error("Unrecognized device signature: {signature}")]
    #[diagnostic(
        code(avrfuse::unknown_signature),
        help("Known devices are: {known}\n\
              If the target is wired correctly, use `--device` to select its definition, \
              or provide one with `--devices-file`")
    )]
    UnknownSignature { signature: Signature, known: String },

    #[error("The target did not respond, read signature {0}")]
    #[diagnostic(
        code(avrfuse::no_target),
        help("Check the wiring between the programmer and the target, and that the target is powered")
    )]
    NoTarget(Signature),

    #[error("No definition found for device '{name}'")]
    #[diagnostic(
        code(avrfuse::unknown_device),
        help("Known devices are: {known}")
    )]
    UnknownDevice { name: String, known: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Table(#[from] TableError),

    #[cfg(feature = "cli")]
    #[error(transparent)]
    #[diagnostic(code(avrfuse::dialoguer_error))]
    DialoguerError(#[from] dialoguer::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Connection(err.into())
    }
}

#[cfg(feature = "serialport")]
impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Self::Connection(err.into())
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Self::Connection(err)
    }
}

/// Connection-related errors
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    #[error("Failed to connect to the programmer")]
    #[diagnostic(
        code(avrfuse::connection_failed),
        help("Ensure that the programmer is connected and running the ArduinoISP sketch, and that the baud rate matches")
    )]
    ConnectionFailed,

    #[error("Programmer is not in sync, received {0:#04x} instead of the sync byte")]
    #[diagnostic(
        code(avrfuse::not_in_sync),
        help("Try resetting the programmer and check the configured baud rate")
    )]
    NotInSync(u8),

    #[error("Programmer reported a failure ({0:#04x})")]
    #[diagnostic(
        code(avrfuse::programmer_failed),
        help("Check the wiring between the programmer and the target, and that the target is powered")
    )]
    Failed(u8),

    #[error("Timeout while waiting for the programmer")]
    #[diagnostic(code(avrfuse::timeout))]
    Timeout,

    #[error("IO error while using serial port: {0}")]
    #[diagnostic(code(avrfuse::serial_error))]
    Serial(#[source] io::Error),
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Serial(err),
        }
    }
}

#[cfg(feature = "serialport")]
impl From<serialport::Error> for ConnectionError {
    fn from(err: serialport::Error) -> Self {
        use serialport::ErrorKind;

        match err.kind() {
            ErrorKind::Io(kind) => Self::from(io::Error::new(kind, err.description)),
            ErrorKind::NoDevice => Self::ConnectionFailed,
            _ => Self::Serial(io::Error::new(io::ErrorKind::Other, err.description)),
        }
    }
}

/// Defects in a fuse or lock bit field table
///
/// A table with any of these defects was authored incorrectly; none of them
/// can be caused by the data read from a device.
#[derive(Debug, Diagnostic, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TableError {
    #[error("Field '{field}' has an empty mask")]
    #[diagnostic(
        code(avrfuse::table::zero_mask),
        help("Every field must select at least one bit of the register")
    )]
    ZeroMask { field: String },

    #[error("Field names must not be empty")]
    #[diagnostic(code(avrfuse::table::empty_name))]
    EmptyName,

    #[error("Field '{field}' is defined more than once")]
    #[diagnostic(code(avrfuse::table::duplicate_field))]
    DuplicateField { field: String },

    #[error("Field '{field}' declares the value {code:#04x} more than once")]
    #[diagnostic(code(avrfuse::table::duplicate_code))]
    DuplicateCode { field: String, code: u8 },

    #[error("Field '{field}' declares the value {code:#04x}, which does not fit its mask {mask:#04x}")]
    #[diagnostic(code(avrfuse::table::code_out_of_range))]
    CodeOutOfRange { field: String, code: u8, mask: u8 },
}
