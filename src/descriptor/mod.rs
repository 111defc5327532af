// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Register map of a datalogger protocol variant.
//!
//! A descriptor is loaded from a vendor JSON file once per connection and is
//! immutable afterwards.

mod de;

use std::{collections::HashMap, fs, path::Path, str::FromStr};

use serde::Deserialize;

use crate::{error::DescriptorError, frame::Address};

/// Key of the display title used as the canonical register name.
pub const TITLE_KEY: &str = "base";

/// Word order of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteSort {
    #[default]
    BigEndian,
    LittleEndian,
}

/// Symbolic values of an enumerated register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enumeration {
    /// Variants listed with the register.
    Inline(HashMap<i64, String>),

    /// Name of a table in [`Descriptor::other_codes`].
    External(String),
}

/// A shared enumeration table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumTable(HashMap<i64, String>);

impl EnumTable {
    #[must_use]
    pub fn get(&self, value: i64) -> Option<&str> {
        self.0.get(&value).map(String::as_str)
    }
}

fn default_scale() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Register {
    pub address: Address,
    #[serde(default)]
    pub byte_sort: ByteSort,
    /// Number of words, one if absent.
    #[serde(default)]
    pub length: Option<u16>,
    #[serde(default)]
    pub title: HashMap<String, String>,
    #[serde(default)]
    pub enumeration_strings: Option<Enumeration>,
    #[serde(default)]
    pub value_type: i32,
    #[serde(default)]
    pub units: String,
    #[serde(default = "default_scale")]
    pub scale: f32,
}

impl Register {
    /// The canonical display name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.title.get(TITLE_KEY).map(String::as_str)
    }

    /// Number of 16 bit words occupied by this register.
    #[must_use]
    pub fn word_count(&self) -> u16 {
        self.length.unwrap_or(1)
    }
}

/// A window of registers read with the same function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Segment {
    /// Registers must be read one by one.
    #[serde(default)]
    pub can_edit: bool,
    pub length: u16,
    #[serde(deserialize_with = "de::u8_flexible")]
    pub fun_number: u8,
    pub start_address: Address,
}

impl Segment {
    /// Whether `addr` lies within `[start_address, start_address + length)`.
    #[must_use]
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start_address
            && u32::from(addr) < u32::from(self.start_address) + u32::from(self.length)
    }

    /// First address after the segment.
    #[must_use]
    pub fn end_address(&self) -> u32 {
        u32::from(self.start_address) + u32::from(self.length)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigurationGroup {
    #[serde(default)]
    pub title: HashMap<String, String>,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl ConfigurationGroup {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.title.get(TITLE_KEY).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AddressOffset {
    pub offset_type: i64,
    pub offset_address: i64,
    pub offset_base: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    #[serde(default, deserialize_with = "de::u8_list_flexible")]
    pub dev_addrs: Vec<u8>,
    #[serde(rename = "SystemInfoVC", default)]
    pub system_info_vc: Vec<ConfigurationGroup>,
    #[serde(rename = "SystemSettingVC", default)]
    pub system_setting_vc: Vec<ConfigurationGroup>,
    #[serde(default, deserialize_with = "de::u8_flexible")]
    pub write_one_fun_code: u8,
    #[serde(default, deserialize_with = "de::u8_flexible")]
    pub write_more_fun_code: u8,
    #[serde(default)]
    pub address_offset: AddressOffset,
}

impl Configuration {
    /// All groups, information before settings.
    fn groups(&self) -> impl Iterator<Item = &ConfigurationGroup> {
        self.system_info_vc
            .iter()
            .chain(self.system_setting_vc.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Descriptor {
    #[serde(default)]
    pub root: Vec<Register>,
    #[serde(default)]
    pub configuration: Configuration,
    #[serde(default)]
    pub other_codes: HashMap<String, EnumTable>,
}

impl Descriptor {
    /// Reads and validates a descriptor file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DescriptorError> {
        let path = path.as_ref();
        log::debug!("Loading descriptor from {}", path.display());
        let data = fs::read(path)?;
        Self::from_slice(&data)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, DescriptorError> {
        let descriptor: Self = serde_json::from_slice(data)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<(), DescriptorError> {
        let offset_type = self.configuration.address_offset.offset_type;
        if offset_type != 0 {
            return Err(DescriptorError::UnsupportedAddressing(offset_type));
        }
        Ok(())
    }

    /// The first register at exactly `addr`.
    #[must_use]
    pub fn find_register_by_addr(&self, addr: Address) -> Option<&Register> {
        self.root.iter().find(|reg| reg.address == addr)
    }

    /// Looks up a register by its display name together with the first
    /// segment covering it.
    ///
    /// Returns `None` if no register has that name, and `Some((None, reg))`
    /// if the register exists but no segment covers its address.
    #[must_use]
    pub fn find_register(&self, name: &str) -> Option<(Option<&Segment>, &Register)> {
        let reg = self.root.iter().find(|reg| reg.name() == Some(name))?;
        let segment = self
            .segments()
            .find(|segment| segment.contains(reg.address));
        Some((segment, reg))
    }

    /// The segments of the first group with the given display name.
    #[must_use]
    pub fn find_group(&self, name: &str) -> &[Segment] {
        self.configuration
            .groups()
            .find(|group| group.name() == Some(name))
            .map(|group| group.segments.as_slice())
            .unwrap_or_default()
    }

    /// All segments, information groups before setting groups.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.configuration
            .groups()
            .flat_map(|group| group.segments.iter())
    }

    /// Address of the device behind the datalogger.
    pub fn dev_addr(&self) -> Result<u8, DescriptorError> {
        self.configuration
            .dev_addrs
            .first()
            .copied()
            .ok_or(DescriptorError::NoDeviceAddress)
    }

    #[must_use]
    pub fn enum_table(&self, name: &str) -> Option<&EnumTable> {
        self.other_codes.get(name)
    }
}

impl FromStr for Descriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(s.as_bytes())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const DESCRIPTOR: &str = r#"{
        "Root": [
            {"Address": 100, "ByteSort": 0, "Title": {"base": "Status"},
             "EnumerationStrings": {"Base": {"0": "Standby", "1": "Running"}},
             "ValueType": 1, "Units": "", "Scale": 1},
            {"Address": 101, "ByteSort": 0, "Title": {"base": "Voltage"},
             "ValueType": 1, "Units": "V", "Scale": 0.1},
            {"Address": 102, "ByteSort": 1, "Length": 2, "Title": {"base": "Energy"},
             "ValueType": 1, "Units": "kWh", "Scale": 1},
            {"Address": 110, "ByteSort": 0, "Title": {"base": "Fault"},
             "EnumerationStrings": "FaultCodes", "ValueType": 1, "Scale": 1},
            {"Address": 200, "ByteSort": 0, "Title": {"base": "Charge limit"},
             "ValueType": 1, "Units": "%", "Scale": 1},
            {"Address": 202, "ByteSort": 0, "Title": {"base": "Orphan"},
             "ValueType": 1, "Scale": 1},
            {"Address": 300, "ByteSort": 0, "Title": {"base": "Unplaced"},
             "ValueType": 1, "Scale": 1}
        ],
        "Configuration": {
            "DevAddrs": ["1"],
            "SystemInfoVC": [
                {"Title": {"base": "Running info"},
                 "Segments": [{"CanEdit": false, "Length": 4, "FunNumber": "3",
                               "StartAddress": 100}]},
                {"Title": {"base": "Faults"},
                 "Segments": [{"CanEdit": false, "Length": 1, "FunNumber": "4",
                               "StartAddress": 110}]}
            ],
            "SystemSettingVC": [
                {"Title": {"base": "Settings"},
                 "Segments": [
                    {"CanEdit": true, "Length": 3, "FunNumber": "3", "StartAddress": 200},
                    {"CanEdit": true, "Length": 4, "FunNumber": "3", "StartAddress": 100}
                 ]}
            ],
            "WriteOneFunCode": 6,
            "WriteMoreFunCode": "16",
            "AddressOffset": {"OffsetType": 0, "OffsetAddress": 0, "OffsetBase": 0}
        },
        "OtherCodes": {
            "FaultCodes": {"Base": {"0": "No fault", "3": "Grid overvoltage"}},
            "Unused": "n/a"
        }
    }"#;

    pub(crate) fn descriptor() -> Descriptor {
        DESCRIPTOR.parse().unwrap()
    }

    #[test]
    fn parse_descriptor() {
        let descr = descriptor();
        assert_eq!(descr.root.len(), 7);
        assert_eq!(descr.dev_addr().unwrap(), 1);
        assert_eq!(descr.configuration.write_one_fun_code, 6);
        assert_eq!(descr.configuration.write_more_fun_code, 16);
        assert_eq!(descr.root[2].byte_sort, ByteSort::LittleEndian);
        assert_eq!(descr.root[2].word_count(), 2);
        assert_eq!(descr.root[1].word_count(), 1);
        assert_eq!(
            descr.enum_table("FaultCodes").and_then(|table| table.get(3)),
            Some("Grid overvoltage")
        );
        assert_eq!(descr.enum_table("Unused"), Some(&EnumTable::default()));
    }

    #[test]
    fn reject_unsupported_addressing() {
        let json = DESCRIPTOR.replace(r#""OffsetType": 0"#, r#""OffsetType": 1"#);
        let err = json.parse::<Descriptor>().unwrap_err();
        assert!(matches!(err, DescriptorError::UnsupportedAddressing(1)));
    }

    #[test]
    fn reject_malformed_json() {
        let err = Descriptor::from_slice(b"{\"Root\": [").unwrap_err();
        assert!(matches!(err, DescriptorError::Json(_)));
    }

    #[test]
    fn load_missing_file() {
        let err = Descriptor::load("/nonexistent/0925.json").unwrap_err();
        assert!(matches!(err, DescriptorError::Io(_)));
    }

    #[test]
    fn find_register_by_addr() {
        let descr = descriptor();
        assert_eq!(descr.find_register_by_addr(101).unwrap().name(), Some("Voltage"));
        assert!(descr.find_register_by_addr(103).is_none());
    }

    #[test]
    fn find_register_prefers_information_groups() {
        let descr = descriptor();
        let (segment, reg) = descr.find_register("Voltage").unwrap();
        assert_eq!(reg.address, 101);
        let segment = segment.unwrap();
        assert_eq!(segment.start_address, 100);
        assert!(!segment.can_edit);
        assert_eq!(segment.fun_number, 3);
    }

    #[test]
    fn find_register_in_settings() {
        let descr = descriptor();
        let (segment, _) = descr.find_register("Orphan").unwrap();
        assert_eq!(segment.unwrap().start_address, 200);
    }

    #[test]
    fn find_register_without_segment() {
        let descr = descriptor();
        let (segment, reg) = descr.find_register("Unplaced").unwrap();
        assert!(segment.is_none());
        assert_eq!(reg.address, 300);
        assert!(descr.find_register("Nonexistent").is_none());
    }

    #[test]
    fn segment_containment_is_half_open() {
        let segment = Segment {
            can_edit: false,
            length: 4,
            fun_number: 3,
            start_address: 100,
        };
        assert!(!segment.contains(99));
        assert!(segment.contains(100));
        assert!(segment.contains(103));
        assert!(!segment.contains(104));

        let segment = Segment {
            start_address: u16::MAX,
            length: 2,
            ..segment
        };
        assert!(segment.contains(u16::MAX));
    }

    #[test]
    fn find_group() {
        let descr = descriptor();
        assert_eq!(descr.find_group("Settings").len(), 2);
        assert_eq!(descr.find_group("Faults")[0].fun_number, 4);
        assert!(descr.find_group("Nonexistent").is_empty());
        assert_eq!(descr.segments().count(), 4);
    }
}
