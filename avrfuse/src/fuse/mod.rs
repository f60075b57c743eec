//! Fuse and lock bit field tables
//!
//! Every fuse byte and the lock byte of an AVR microcontroller is split into
//! named fields. A [FieldTable] describes that split for one register of one
//! device, and [decode] turns a raw register byte into the human-readable
//! state of each field.
//!
//! Two kinds of field exist:
//!
//! - [FieldKind::Flag] fields follow the AVR fuse convention where an erased
//!   bit reads as `1`: the field is "Unprogrammed" when every bit of its mask
//!   is set and "Programmed" otherwise.
//! - [FieldKind::Enumerated] fields map the bits selected by the mask, shifted
//!   down to bit 0, onto a list of known settings.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer};

pub use self::{
    decode::{decode, trailing_zeros, Decoded, DecodedField, Warning, PROGRAMMED, UNPROGRAMMED},
    group::FuseGroup,
};
use crate::error::TableError;

mod decode;
mod group;

/// One known setting of an enumerated field
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnumValue {
    /// Field value, already shifted down to bit 0
    #[serde(rename = "value", deserialize_with = "deserialize_hex_to_u8")]
    pub code: u8,
    /// Description of the setting
    pub caption: String,
}

impl EnumValue {
    pub fn new(code: u8, caption: impl Into<String>) -> Self {
        Self {
            code,
            caption: caption.into(),
        }
    }
}

/// How the bits selected by a field's mask are interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Programmed (`0`) or unprogrammed (`1`)
    Flag,
    /// One of a list of known settings, searched in declaration order
    Enumerated(Vec<EnumValue>),
}

/// A single named field of a fuse or lock bit register
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "FieldDef")]
pub struct FieldSpec {
    pub name: String,
    pub caption: String,
    pub mask: u8,
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Create a single-bit (or all-bits-set) flag field
    pub fn flag(name: impl Into<String>, caption: impl Into<String>, mask: u8) -> Self {
        Self {
            name: name.into(),
            caption: caption.into(),
            mask,
            kind: FieldKind::Flag,
        }
    }

    /// Create an enumerated field from `(code, caption)` pairs
    ///
    /// Without any pairs the field is a flag, as it is when loaded from a
    /// definition file with no `values`.
    pub fn enumerated<I, S>(
        name: impl Into<String>,
        caption: impl Into<String>,
        mask: u8,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = (u8, S)>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(code, caption)| EnumValue::new(code, caption))
            .collect::<Vec<_>>();

        Self {
            name: name.into(),
            caption: caption.into(),
            mask,
            kind: FieldKind::from(values),
        }
    }

    /// Number of bits the field's value must be shifted right by
    pub fn shift(&self) -> u32 {
        trailing_zeros(self.mask)
    }
}

/// On-disk representation of a [FieldSpec]; an empty `values` list means the
/// field is a flag.
#[derive(Deserialize)]
struct FieldDef {
    name: String,
    caption: String,
    #[serde(deserialize_with = "deserialize_hex_to_u8")]
    mask: u8,
    #[serde(default)]
    values: Vec<EnumValue>,
}

impl From<Vec<EnumValue>> for FieldKind {
    fn from(values: Vec<EnumValue>) -> Self {
        if values.is_empty() {
            FieldKind::Flag
        } else {
            FieldKind::Enumerated(values)
        }
    }
}

impl From<FieldDef> for FieldSpec {
    fn from(def: FieldDef) -> Self {
        Self {
            name: def.name,
            caption: def.caption,
            mask: def.mask,
            kind: def.values.into(),
        }
    }
}

/// Ordered collection of the fields making up one register
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FieldTable {
    fields: Vec<FieldSpec>,
}

impl FieldTable {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// An empty table means the device does not implement the register
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Check the table for authoring defects
    ///
    /// [decode] only rejects empty masks; this additionally rejects empty and
    /// duplicate field names, duplicate enumerated codes, and codes which can
    /// never be produced by the field's mask.
    pub fn validate(&self) -> Result<(), TableError> {
        let mut names = HashSet::new();

        for field in &self.fields {
            if field.name.is_empty() {
                return Err(TableError::EmptyName);
            }
            if field.mask == 0 {
                return Err(TableError::ZeroMask {
                    field: field.name.clone(),
                });
            }
            if !names.insert(field.name.as_str()) {
                return Err(TableError::DuplicateField {
                    field: field.name.clone(),
                });
            }

            if let FieldKind::Enumerated(values) = &field.kind {
                let max = field.mask >> field.shift();
                let mut codes = HashSet::new();

                for value in values {
                    if value.code & !max != 0 {
                        return Err(TableError::CodeOutOfRange {
                            field: field.name.clone(),
                            code: value.code,
                            mask: field.mask,
                        });
                    }
                    if !codes.insert(value.code) {
                        return Err(TableError::DuplicateCode {
                            field: field.name.clone(),
                            code: value.code,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

impl FromIterator<FieldSpec> for FieldTable {
    fn from_iter<T: IntoIterator<Item = FieldSpec>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a FieldTable {
    type Item = &'a FieldSpec;
    type IntoIter = std::slice::Iter<'a, FieldSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Accepts either an integer or a hexadecimal string with an optional `0x`
/// prefix.
pub(crate) fn deserialize_hex_to_u8<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u8),
        Hex(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(int) => Ok(int),
        HexOrInt::Hex(hex) => {
            let hex = hex.to_lowercase();
            let hex = hex.trim_start_matches("0x");

            u8::from_str_radix(hex, 16).map_err(serde::de::Error::custom)
        }
    }
}
