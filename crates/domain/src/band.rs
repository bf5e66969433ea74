//! RF carrier band.
//!
//! The firmware speaks two encodings of the band: a tag (`1`/`2`) in the
//! compact text protocol and a frequency in MHz (`315`/`443`) in structured
//! payloads and stored records. `443` is the value the firmware and stored
//! records have always used for the 433 MHz band, so it is kept on the wire.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Carrier band of an RF code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrequencyBand {
    /// 315 MHz.
    Low,
    /// 433 MHz.
    High,
}

impl FrequencyBand {
    /// Nominal carrier frequency in MHz.
    #[must_use]
    pub fn nominal_mhz(self) -> u32 {
        match self {
            Self::Low => 315,
            Self::High => 433,
        }
    }

    /// Frequency value as written in structured payloads and stored records.
    #[must_use]
    pub fn wire_mhz(self) -> u32 {
        match self {
            Self::Low => 315,
            Self::High => 443,
        }
    }

    /// Tag used in the compact text protocol.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::High => 2,
        }
    }

    /// Map a compact-protocol tag. Anything but `1` is the high band.
    #[must_use]
    pub fn from_tag(tag: u8) -> Self {
        if tag == 1 { Self::Low } else { Self::High }
    }

    /// Map a frequency in MHz. Anything but `315` is the high band.
    #[must_use]
    pub fn from_mhz(mhz: u32) -> Self {
        if mhz == 315 { Self::Low } else { Self::High }
    }
}

impl std::fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} MHz", self.nominal_mhz())
    }
}

impl Serialize for FrequencyBand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.wire_mhz())
    }
}

impl<'de> Deserialize<'de> for FrequencyBand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mhz = u32::deserialize(deserializer)?;
        Ok(Self::from_mhz(mhz))
    }
}
