//! Typed identifier newtypes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Namespace for deriving [`SniffedCodeId`] values from raw code payloads.
const SNIFFED_CODE_NAMESPACE: uuid::Uuid =
    uuid::Uuid::from_u128(0x6b1d_53a0_2f7e_4c1e_9a55_0d1c_7e2f_3b48);

/// Deterministic identifier for a [`SniffedCode`](crate::sniffed_code::SniffedCode).
///
/// Derived from the raw code value (UUID v5), so the same capture always
/// gets the same id no matter when it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SniffedCodeId(uuid::Uuid);

impl SniffedCodeId {
    /// Derive the identifier for a raw code payload.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        Self(uuid::Uuid::new_v5(&SNIFFED_CODE_NAMESPACE, raw.as_bytes()))
    }
}

impl fmt::Display for SniffedCodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SniffedCodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

/// Opaque, stable identifier of a radio peripheral (e.g. its hardware
/// address). This is the only part of a peripheral that gets persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeripheralId(String);

impl PeripheralId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeripheralId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PeripheralId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
