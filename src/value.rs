// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Register value codec.

use std::{fmt, io};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt as _};

use crate::{
    descriptor::{ByteSort, Descriptor, Enumeration, Register},
    error::DescriptorError,
};

const SCALE_EPSILON: f32 = 1e-4;

/// A decoded register value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Enum(String),
    Float(f32),
}

/// A register reading: the interpreted value plus the raw word(s).
#[derive(Debug, Clone, PartialEq)]
pub struct RegValue {
    pub value: Value,
    pub raw: u32,
    pub units: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Int,
    Enum,
    Float,
}

fn kind_of(reg: &Register) -> Kind {
    if reg.enumeration_strings.is_some() {
        Kind::Enum
    } else if (reg.scale - 1.0).abs() < SCALE_EPSILON {
        Kind::Int
    } else {
        Kind::Float
    }
}

fn read_word(rdr: &mut &[u8], byte_sort: ByteSort) -> io::Result<u16> {
    match byte_sort {
        ByteSort::BigEndian => rdr.read_u16::<BigEndian>(),
        ByteSort::LittleEndian => rdr.read_u16::<LittleEndian>(),
    }
}

/// Reads the raw register content.
///
/// Two words are combined low word first, independent of the host.
fn read_raw(mut rdr: &[u8], reg: &Register) -> u32 {
    let raw = match reg.length {
        None | Some(1) => read_word(&mut rdr, reg.byte_sort).map(u32::from),
        Some(2) => read_word(&mut rdr, reg.byte_sort).and_then(|lo| {
            let hi = read_word(&mut rdr, reg.byte_sort)?;
            Ok(u32::from(lo) | u32::from(hi) << 16)
        }),
        Some(length) => {
            log::warn!(
                "Unexpected length {length} of register {}",
                reg.address
            );
            return 0;
        }
    };
    raw.unwrap_or_else(|err| {
        log::warn!("Failed to read register {}: {err}", reg.address);
        0
    })
}

fn resolve_enum(raw: u32, reg: &Register, enumeration: &Enumeration, descr: &Descriptor) -> String {
    let key = i64::from(raw);
    let text = match enumeration {
        Enumeration::Inline(variants) => {
            let text = variants.get(&key).map(String::as_str);
            if text.is_none() {
                log::warn!(
                    "No symbolic value for {raw} of register {}",
                    reg.address
                );
            }
            text
        }
        Enumeration::External(name) => match descr.enum_table(name) {
            Some(table) => {
                let text = table.get(key);
                if text.is_none() {
                    log::warn!(
                        "No value {raw} in enumeration {name:?} of register {}",
                        reg.address
                    );
                }
                text
            }
            None => {
                log::warn!(
                    "Missing enumeration {name:?} of register {}",
                    reg.address
                );
                None
            }
        },
    };
    text.map_or_else(|| raw.to_string(), ToOwned::to_owned)
}

impl RegValue {
    /// Decodes the register content at the start of `data`.
    ///
    /// Never fails: malformed input degrades to a raw value of 0 and
    /// unknown symbolic values to their decimal representation.
    #[must_use]
    pub fn decode(data: &[u8], reg: &Register, descr: &Descriptor) -> Self {
        let raw = read_raw(data, reg);
        let value = match (kind_of(reg), &reg.enumeration_strings) {
            (Kind::Enum, Some(enumeration)) => {
                Value::Enum(resolve_enum(raw, reg, enumeration, descr))
            }
            (Kind::Float, _) => {
                #[allow(clippy::cast_precision_loss)]
                let raw = raw as f32;
                Value::Float(raw * reg.scale)
            }
            _ => Value::Int(i64::from(raw)),
        };
        let units = (!reg.units.is_empty()).then(|| reg.units.clone());
        Self { value, raw, units }
    }

    /// The value without units.
    #[must_use]
    pub fn to_raw_string(&self) -> String {
        self.value.to_string()
    }
}

/// Encodes `value` for a single word write to `reg`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode(value: f32, reg: &Register) -> Result<[u8; 2], DescriptorError> {
    let length = reg.word_count();
    if length != 1 {
        return Err(DescriptorError::UnsupportedLength(length));
    }
    let scaled = match kind_of(reg) {
        Kind::Int | Kind::Enum => value.trunc(),
        Kind::Float => (value / reg.scale).round(),
    };
    // Negative values are sent as two's complement.
    if !(f32::from(i16::MIN)..=f32::from(u16::MAX)).contains(&scaled) {
        return Err(DescriptorError::ValueOutOfRange(value));
    }
    let word = scaled as i32 as u16;
    let mut buf = [0; 2];
    match reg.byte_sort {
        ByteSort::BigEndian => BigEndian::write_u16(&mut buf, word),
        ByteSort::LittleEndian => LittleEndian::write_u16(&mut buf, word),
    }
    Ok(buf)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Enum(text) => f.write_str(text),
            Self::Float(value) => write!(f, "{value:.3}"),
        }
    }
}

impl fmt::Display for RegValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)?;
        match (&self.value, &self.units) {
            (Value::Enum(_), _) | (_, None) => Ok(()),
            (_, Some(units)) => f.write_str(units),
        }
    }
}
