// ── MAC address identity ──
//
// Every cache key and intent key goes through `MacAddress`. The canonical
// form is twelve lowercase hex digits with no separators, e.g.
// `001122334455`. Colon, dash, dot (Cisco `0011.2233.4455`), whitespace,
// and bare spellings in any case all map to the same key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MAC address '{0}': expected 12 hex digits")]
pub struct MacParseError(pub String);

/// Strip separators and lowercase. Total and idempotent: any input maps to
/// exactly one output, and the output maps to itself.
pub fn normalize_mac(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ':' | '-' | '.') && !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Validated MAC address in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress(String);

impl MacAddress {
    pub fn parse(raw: &str) -> Result<Self, MacParseError> {
        let normalized = normalize_mac(raw);
        if normalized.len() == 12 && normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(normalized))
        } else {
            Err(MacParseError(raw.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Colon-separated display form (`00:11:22:33:44:55`).
    pub fn colon_form(&self) -> String {
        self.0
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for MacAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
