use std::fmt::{Display, Formatter};

use super::{FieldKind, FieldTable};
use crate::error::TableError;

/// Status caption of a flag field whose bits are cleared
pub const PROGRAMMED: &str = "Programmed";
/// Status caption of a flag field whose bits are all set
pub const UNPROGRAMMED: &str = "Unprogrammed";

/// The decoded state of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedField<'a> {
    pub name: &'a str,
    /// Caption of the field itself
    pub description: &'a str,
    /// Caption of the field's current setting
    pub status: &'a str,
    /// Field value, shifted down to bit 0 for enumerated fields
    pub value: u8,
    pub mask: u8,
}

/// An enumerated field whose bits matched none of its known settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Warning<'a> {
    pub field: &'a str,
    pub code: u8,
}

impl Display for Warning<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid value for {}: got {:#04x}", self.field, self.code)
    }
}

/// Result of decoding one register byte
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded<'a> {
    fields: Vec<DecodedField<'a>>,
    warnings: Vec<Warning<'a>>,
}

impl<'a> Decoded<'a> {
    /// Decoded fields, in table order
    ///
    /// Fields which produced a [Warning] are absent.
    pub fn fields(&self) -> &[DecodedField<'a>] {
        &self.fields
    }

    pub fn warnings(&self) -> &[Warning<'a>] {
        &self.warnings
    }

    pub fn get(&self, name: &str) -> Option<&DecodedField<'a>> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Number of zero bits below the lowest set bit of `mask`
///
/// `mask` must not be zero.
pub fn trailing_zeros(mask: u8) -> u32 {
    debug_assert_ne!(mask, 0, "trailing zero count of an empty mask");
    mask.trailing_zeros()
}

/// Decode a raw register byte against a field table
///
/// A table containing an empty mask is rejected before any field is looked
/// at. Enumerated fields whose value is not listed in the table are left out
/// of the result and reported through [Decoded::warnings] instead; the
/// remaining fields are still decoded.
pub fn decode(raw: u8, table: &FieldTable) -> Result<Decoded<'_>, TableError> {
    if let Some(field) = table.iter().find(|field| field.mask == 0) {
        return Err(TableError::ZeroMask {
            field: field.name.clone(),
        });
    }

    let mut decoded = Decoded::default();

    for field in table {
        let result = raw & field.mask;

        match &field.kind {
            FieldKind::Enumerated(values) => {
                let code = result >> trailing_zeros(field.mask);

                match values.iter().find(|value| value.code == code) {
                    Some(value) => decoded.fields.push(DecodedField {
                        name: &field.name,
                        description: &field.caption,
                        status: &value.caption,
                        value: value.code,
                        mask: field.mask,
                    }),
                    None => decoded.warnings.push(Warning {
                        field: &field.name,
                        code,
                    }),
                }
            }
            FieldKind::Flag => {
                let (value, status) = if result == field.mask {
                    (1, UNPROGRAMMED)
                } else {
                    (0, PROGRAMMED)
                };

                decoded.fields.push(DecodedField {
                    name: &field.name,
                    description: &field.caption,
                    status,
                    value,
                    mask: field.mask,
                });
            }
        }
    }

    Ok(decoded)
}
