// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lenient deserializers for the vendor's descriptor files.
//!
//! The files are produced by different tools. Small numbers show up either
//! as JSON numbers or as strings, enumeration keys are always strings.

use std::collections::HashMap;

use serde::{de::Error as _, Deserialize, Deserializer};

use super::{ByteSort, EnumTable, Enumeration};

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    String(String),
}

impl IntOrString {
    fn parse<T, E>(self) -> Result<T, E>
    where
        T: TryFrom<i64>,
        E: serde::de::Error,
    {
        let value = match self {
            Self::Int(value) => value,
            Self::String(s) => s.trim().parse::<i64>().map_err(E::custom)?,
        };
        T::try_from(value).map_err(|_| E::custom(format!("value {value} out of range")))
    }
}

/// `3` or `"3"`.
pub(super) fn u8_flexible<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    IntOrString::deserialize(deserializer)?.parse()
}

/// `[1, "2"]`.
pub(super) fn u8_list_flexible<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<IntOrString>::deserialize(deserializer)?
        .into_iter()
        .map(IntOrString::parse)
        .collect()
}

fn parse_variants<E>(base: HashMap<String, Option<String>>) -> Result<HashMap<i64, String>, E>
where
    E: serde::de::Error,
{
    base.into_iter()
        .filter_map(|(key, text)| text.map(|text| (key, text)))
        .map(|(key, text)| {
            key.trim()
                .parse::<i64>()
                .map(|key| (key, text))
                .map_err(|err| E::custom(format!("failed to parse enum key {key:?}: {err}")))
        })
        .collect()
}

#[derive(Deserialize)]
struct BaseVariants {
    #[serde(rename = "Base", default)]
    base: HashMap<String, Option<String>>,
}

impl<'de> Deserialize<'de> for ByteSort {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = IntOrString::deserialize(deserializer)?.parse::<i64, D::Error>()?;
        Ok(if value == 1 {
            Self::LittleEndian
        } else {
            Self::BigEndian
        })
    }
}

impl<'de> Deserialize<'de> for Enumeration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Inline(BaseVariants),
            External(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Inline(BaseVariants { base }) => parse_variants(base).map(Self::Inline),
            Repr::External(name) => Ok(Self::External(name)),
        }
    }
}

impl<'de> Deserialize<'de> for EnumTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Ok(Self::default());
        }
        let BaseVariants { base } = BaseVariants::deserialize(value).map_err(D::Error::custom)?;
        parse_variants(base).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Flexible {
        #[serde(deserialize_with = "u8_flexible")]
        single: u8,
        #[serde(deserialize_with = "u8_list_flexible")]
        list: Vec<u8>,
    }

    #[test]
    fn numbers_or_strings() {
        let parsed: Flexible = serde_json::from_str(r#"{"single": "4", "list": [1, " 2 ", "3"]}"#)
            .unwrap();
        assert_eq!(parsed.single, 4);
        assert_eq!(parsed.list, [1, 2, 3]);

        assert!(serde_json::from_str::<Flexible>(r#"{"single": 256, "list": []}"#).is_err());
        assert!(serde_json::from_str::<Flexible>(r#"{"single": "x", "list": []}"#).is_err());
    }

    #[test]
    fn byte_sort() {
        assert_eq!(
            serde_json::from_str::<ByteSort>("1").unwrap(),
            ByteSort::LittleEndian
        );
        assert_eq!(
            serde_json::from_str::<ByteSort>("0").unwrap(),
            ByteSort::BigEndian
        );
        assert_eq!(
            serde_json::from_str::<ByteSort>("2").unwrap(),
            ByteSort::BigEndian
        );
    }

    #[test]
    fn inline_enumeration_skips_null_entries() {
        let enumeration: Enumeration =
            serde_json::from_str(r#"{"Base": {"0": "Off", "1": null, "2": "On"}}"#).unwrap();
        let Enumeration::Inline(variants) = enumeration else {
            panic!("expected inline variants");
        };
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[&0], "Off");
        assert_eq!(variants[&2], "On");
    }

    #[test]
    fn external_enumeration() {
        let enumeration: Enumeration = serde_json::from_str(r#""FaultCodes""#).unwrap();
        assert_eq!(enumeration, Enumeration::External("FaultCodes".to_owned()));
    }

    #[test]
    fn invalid_enumeration_key() {
        assert!(serde_json::from_str::<Enumeration>(r#"{"Base": {"one": "x"}}"#).is_err());
    }

    #[test]
    fn enum_table_from_non_object_is_empty() {
        let table: EnumTable = serde_json::from_str(r#""unused""#).unwrap();
        assert!(table.0.is_empty());
        let table: EnumTable = serde_json::from_str(r#"{"Base": {"7": "Overload"}}"#).unwrap();
        assert_eq!(table.get(7), Some("Overload"));
    }
}
