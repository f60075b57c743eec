//! Command-line interface configuration
//!
//! `avrfuse` looks for an `avrfuse.toml` file in the current directory, its
//! parent, and finally the user's configuration directory. The [Config] type
//! handles the loading of this configuration file.

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::debug;
use miette::Result;
use serde::{Deserialize, Serialize};
use serialport::UsbPortInfo;

use crate::Error;

const CONFIG_FILE: &str = "avrfuse.toml";

/// A configured, known serial connection
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Name of the serial port used for communication
    pub serial: Option<String>,
    /// Baud rate of the programmer
    pub baudrate: Option<u32>,
    /// Time to let the programmer board boot after opening the port, in
    /// milliseconds
    pub settle_ms: Option<u64>,
}

/// A configured, known USB device
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct UsbDevice {
    /// USB Vendor ID
    #[serde(
        serialize_with = "serialize_u16_to_hex",
        deserialize_with = "deserialize_hex_to_u16"
    )]
    pub vid: u16,
    /// USB Product ID
    #[serde(
        serialize_with = "serialize_u16_to_hex",
        deserialize_with = "deserialize_hex_to_u16"
    )]
    pub pid: u16,
}

fn deserialize_hex_to_u16<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let hex = String::deserialize(deserializer)?.to_lowercase();
    let hex = hex.trim_start_matches("0x");

    let int = u16::from_str_radix(hex, 16).map_err(serde::de::Error::custom)?;

    Ok(int)
}

fn serialize_u16_to_hex<S>(decimal: &u16, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let hex_string = format!("{decimal:04x}");
    serializer.serialize_str(&hex_string)
}

impl UsbDevice {
    /// Check if the given USB port matches this device
    pub fn matches(&self, port: &UsbPortInfo) -> bool {
        self.vid == port.vid && self.pid == port.pid
    }
}

/// Additional device definitions
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct Devices {
    /// Definition files; relative paths are resolved against the directory
    /// containing the configuration file
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

/// Deserialized contents of a configuration file
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Preferred serial port connection information
    #[serde(default)]
    pub connection: Connection,
    /// Preferred USB devices
    #[serde(default)]
    pub usb_device: Vec<UsbDevice>,
    /// Additional device definitions
    #[serde(default)]
    pub devices: Devices,
}

impl Config {
    /// Load the configuration file, if one exists
    pub fn load() -> Result<Self> {
        let file = Self::config_path()?;

        let config = if file.exists() {
            Self::load_file(&file)?
        } else {
            Config::default()
        };
        debug!("Config: {:#?}", &config);

        Ok(config)
    }

    /// Parse the configuration file at `path`
    pub fn load_file(path: &Path) -> Result<Self> {
        let data = read_to_string(path)
            .map_err(|e| Error::FileOpenError(path.display().to_string(), e))?;

        let mut config: Config = toml::from_str(&data)
            .map_err(|e| Error::InvalidConfig(path.display().to_string(), e))?;

        if let Some(dir) = path.parent() {
            config.devices.files = config
                .devices
                .files
                .into_iter()
                .map(|file| dir.join(file))
                .collect();
        }

        Ok(config)
    }

    fn config_path() -> Result<PathBuf, Error> {
        let local_config = std::env::current_dir()?.join(CONFIG_FILE);
        if local_config.exists() {
            return Ok(local_config);
        }
        if let Some(parent_folder) = std::env::current_dir()?.parent() {
            let workspace_config = parent_folder.join(CONFIG_FILE);
            if workspace_config.exists() {
                return Ok(workspace_config);
            }
        }

        match ProjectDirs::from("", "", "avrfuse") {
            Some(project_dirs) => Ok(project_dirs.config_dir().join(CONFIG_FILE)),
            None => Ok(local_config),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{env, fs, process};

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    struct TestData {
        #[serde(
            serialize_with = "serialize_u16_to_hex",
            deserialize_with = "deserialize_hex_to_u16"
        )]
        value: u16,
    }

    #[test]
    fn test_deserialize_hex_to_u16() {
        let result: Result<TestData, _> = toml::from_str(r#"value = "2341""#);
        assert_eq!(result.unwrap().value, 0x2341);

        let result: Result<TestData, _> = toml::from_str(r#"value = "0x1A86""#);
        assert_eq!(result.unwrap().value, 0x1a86);

        let result: Result<TestData, _> = toml::from_str(r#"value = "43""#);
        assert_eq!(result.unwrap().value, 0x43);

        let result: Result<TestData, _> = toml::from_str(r#"value = "gg""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_u16_to_hex() {
        let serialized = toml::to_string(&TestData { value: 0x43 }).unwrap();
        assert_eq!(serialized.trim(), r#"value = "0043""#);
    }

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            serial = "/dev/ttyACM0"
            baudrate = 19200

            [[usb_device]]
            vid = "2341"
            pid = "0043"

            [devices]
            files = ["parts.toml"]

            [unrelated]
            key = "ignored"
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.serial.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.connection.baudrate, Some(19200));
        assert_eq!(config.connection.settle_ms, None);
        assert_eq!(
            config.usb_device,
            vec![UsbDevice {
                vid: 0x2341,
                pid: 0x0043
            }]
        );
        assert_eq!(config.devices.files, vec![PathBuf::from("parts.toml")]);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_file_resolves_device_files() {
        let dir = env::temp_dir().join(format!("avrfuse-config-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, "[devices]\nfiles = [\"parts.toml\"]\n").unwrap();

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.devices.files, vec![dir.join("parts.toml")]);

        fs::write(&path, "[connection\n").unwrap();
        assert!(Config::load_file(&path).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
