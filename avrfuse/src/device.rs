//! Supported target devices
//!
//! Each [Device] carries the field tables of its four fuse and lock bit
//! registers. A set of common devices is compiled into the binary, and users
//! can add their own (or replace built-in ones) by loading additional TOML
//! definition files into a [DeviceDatabase].

use std::{
    fmt::{Display, Formatter},
    fs::read_to_string,
    path::Path,
    str::FromStr,
};

use log::debug;
use serde::{Deserialize, Deserializer};

use crate::{
    error::Error,
    fuse::{FieldTable, FuseGroup},
};

// Include device definitions in binary
const ATMEGA328P: &str = include_str!("../resources/devices/atmega328p.toml");
const ATMEGA32U4: &str = include_str!("../resources/devices/atmega32u4.toml");
const ATMEGA2560: &str = include_str!("../resources/devices/atmega2560.toml");
const ATTINY13A: &str = include_str!("../resources/devices/attiny13a.toml");
const ATTINY85: &str = include_str!("../resources/devices/attiny85.toml");

const BUILTIN_DEVICES: &[&str] = &[ATMEGA328P, ATMEGA32U4, ATMEGA2560, ATTINY13A, ATTINY85];

/// Three byte device signature, as stored in the target's signature row
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Signature(pub [u8; 3]);

impl Signature {
    /// Serial programming instruction which reads byte `index` of the
    /// signature
    pub fn read_instruction(index: u8) -> [u8; 4] {
        [0x30, 0x00, index & 0x03, 0x00]
    }

    /// Signatures read as all zeroes or all ones when the target does not
    /// respond at all
    pub fn is_blank(&self) -> bool {
        self.0 == [0x00; 3] || self.0 == [0xff; 3]
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex: String = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed)
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();

        if hex.len() != 6 || !hex.is_ascii() {
            return Err(Error::InvalidSignature(s.to_owned()));
        }

        let mut bytes = [0u8; 3];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..][..2], 16)
                .map_err(|_| Error::InvalidSignature(s.to_owned()))?;
        }

        Ok(Signature(bytes))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A microcontroller and the layout of its fuse and lock bit registers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    pub name: String,
    pub signature: Signature,
    #[serde(default)]
    pub fuse_low: FieldTable,
    #[serde(default)]
    pub fuse_high: FieldTable,
    #[serde(default)]
    pub fuse_extended: FieldTable,
    #[serde(default)]
    pub lock_bits: FieldTable,
}

impl Device {
    /// Field table of the given register; empty if the device lacks it
    pub fn table(&self, group: FuseGroup) -> &FieldTable {
        match group {
            FuseGroup::Low => &self.fuse_low,
            FuseGroup::High => &self.fuse_high,
            FuseGroup::Extended => &self.fuse_extended,
            FuseGroup::Lock => &self.lock_bits,
        }
    }

    /// Validate all four field tables
    pub fn validate(&self) -> Result<(), Error> {
        use strum::IntoEnumIterator;

        for group in FuseGroup::iter() {
            self.table(group)
                .validate()
                .map_err(|source| Error::InvalidTable {
                    device: self.name.clone(),
                    group,
                    source,
                })?;
        }

        Ok(())
    }
}

#[derive(Deserialize)]
struct DeviceFile {
    #[serde(default, rename = "device")]
    devices: Vec<Device>,
}

/// Lookup table of known devices
#[derive(Debug, Clone, Default)]
pub struct DeviceDatabase {
    devices: Vec<Device>,
}

impl DeviceDatabase {
    /// Devices compiled into the binary
    pub fn builtin() -> Self {
        let mut database = Self::default();

        for source in BUILTIN_DEVICES {
            let file: DeviceFile = toml::from_str(source).unwrap();
            database.devices.extend(file.devices);
        }

        database
    }

    /// Parse and validate device definitions from TOML
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        let file: DeviceFile = toml::from_str(s)?;

        for device in &file.devices {
            device.validate()?;
        }

        Ok(Self {
            devices: file.devices,
        })
    }

    /// Parse and validate device definitions from a TOML file
    pub fn load_file(path: &Path) -> Result<Self, Error> {
        let data = read_to_string(path)
            .map_err(|e| Error::FileOpenError(path.display().to_string(), e))?;

        let database = Self::from_toml_str(&data)?;
        debug!(
            "Loaded {} device definition(s) from {}",
            database.devices.len(),
            path.display()
        );

        Ok(database)
    }

    /// Add the devices of `other`, replacing any with the same signature
    pub fn merge(&mut self, other: DeviceDatabase) {
        for device in other.devices {
            match self
                .devices
                .iter_mut()
                .find(|known| known.signature == device.signature)
            {
                Some(known) => {
                    debug!("Replacing definition of {} with {}", known.name, device.name);
                    *known = device;
                }
                None => self.devices.push(device),
            }
        }
    }

    pub fn find_by_signature(&self, signature: Signature) -> Option<&Device> {
        self.devices
            .iter()
            .find(|device| device.signature == signature)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Device> {
        self.devices
            .iter()
            .find(|device| device.name.eq_ignore_ascii_case(name))
    }

    /// Like [Self::find_by_name], but fails with a helpful error
    pub fn device(&self, name: &str) -> Result<&Device, Error> {
        self.find_by_name(name).ok_or_else(|| Error::UnknownDevice {
            name: name.to_owned(),
            known: self.names(),
        })
    }

    /// Comma separated list of all device names
    pub fn names(&self) -> String {
        self.devices
            .iter()
            .map(|device| device.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
