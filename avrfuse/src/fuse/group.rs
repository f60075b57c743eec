use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, VariantNames};

/// The registers holding fuse and lock bit fields
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[derive(
    Debug,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    Display,
    EnumIter,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FuseGroup {
    /// Low fuse byte
    Low,
    /// High fuse byte
    High,
    /// Extended fuse byte
    Extended,
    /// Lock byte
    Lock,
}

impl FuseGroup {
    /// Serial programming instruction which reads the register
    ///
    /// The register value is clocked out by the target while the fourth byte
    /// is being sent.
    pub fn read_instruction(&self) -> [u8; 4] {
        match self {
            FuseGroup::Low => [0x50, 0x00, 0x00, 0x00],
            FuseGroup::High => [0x58, 0x08, 0x00, 0x00],
            FuseGroup::Extended => [0x50, 0x08, 0x00, 0x00],
            FuseGroup::Lock => [0x58, 0x00, 0x00, 0x00],
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            FuseGroup::Low => "Low fuse",
            FuseGroup::High => "High fuse",
            FuseGroup::Extended => "Extended fuse",
            FuseGroup::Lock => "Lock bits",
        }
    }

    /// Header of the field name column when rendering the register
    pub fn name_header(&self) -> &'static str {
        match self {
            FuseGroup::Lock => "Lock bit name",
            _ => "Fuse name",
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_read_order() {
        let groups: Vec<_> = FuseGroup::iter().collect();
        assert_eq!(
            groups,
            [
                FuseGroup::Low,
                FuseGroup::High,
                FuseGroup::Extended,
                FuseGroup::Lock
            ]
        );
    }

    #[test]
    fn test_read_instructions() {
        assert_eq!(FuseGroup::Low.read_instruction(), [0x50, 0x00, 0x00, 0x00]);
        assert_eq!(FuseGroup::High.read_instruction(), [0x58, 0x08, 0x00, 0x00]);
        assert_eq!(FuseGroup::Extended.read_instruction(), [0x50, 0x08, 0x00, 0x00]);
        assert_eq!(FuseGroup::Lock.read_instruction(), [0x58, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("extended".parse::<FuseGroup>().unwrap(), FuseGroup::Extended);
        assert_eq!(FuseGroup::Lock.to_string(), "lock");
        assert_eq!(FuseGroup::Lock.name_header(), "Lock bit name");
        assert_eq!(FuseGroup::High.name_header(), "Fuse name");
    }
}
