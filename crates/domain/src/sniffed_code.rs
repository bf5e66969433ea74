//! Sniffed code — a capture forwarded unsolicited by the peripheral.

use serde::{Deserialize, Serialize};

use crate::band::FrequencyBand;
use crate::id::SniffedCodeId;
use crate::rf_command::RfCommand;

/// A code captured by the peripheral's receiver, pending a user decision.
///
/// Never persisted itself; see [`SavedCodeRecord`](crate::saved_code::SavedCodeRecord).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SniffedCode {
    pub id: SniffedCodeId,
    pub raw: String,
    pub band: FrequencyBand,
    pub protocol: u8,
}

impl SniffedCode {
    /// Build a sniffed code; the id is derived from `raw`.
    #[must_use]
    pub fn new(raw: impl Into<String>, band: FrequencyBand, protocol: u8) -> Self {
        let raw = raw.into();
        Self {
            id: SniffedCodeId::from_raw(&raw),
            raw,
            band,
            protocol,
        }
    }

    /// Replay this capture as a transmit command.
    #[must_use]
    pub fn to_command(&self, repeat: u32) -> RfCommand {
        RfCommand::new(self.raw.clone(), self.band, self.protocol, repeat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_derive_id_from_raw() {
        let a = SniffedCode::new("5592405", FrequencyBand::Low, 1);
        let b = SniffedCode::new("5592405", FrequencyBand::High, 3);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn should_replay_as_command() {
        let code = SniffedCode::new("5592405", FrequencyBand::Low, 1);
        let cmd = code.to_command(3);
        assert_eq!(cmd.code(), "5592405");
        assert_eq!(cmd.band(), FrequencyBand::Low);
        assert_eq!(cmd.protocol(), 1);
        assert_eq!(cmd.repeat(), 3);
    }
}
