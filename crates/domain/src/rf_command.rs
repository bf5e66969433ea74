//! RF command — a code to transmit through the peripheral.

use serde::{Deserialize, Serialize};

use crate::band::FrequencyBand;
use crate::error::EncodingError;

/// Lowest protocol number understood by the firmware.
pub const MIN_PROTOCOL: u8 = 1;
/// Highest protocol number understood by the firmware.
pub const MAX_PROTOCOL: u8 = 6;

/// An immutable transmit request.
///
/// Construction does not validate, so that commands typed by a user can be
/// represented before they are rejected; [`RfCommand::validate`] (called by
/// the codec before encoding) enforces the invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfCommand {
    code: String,
    band: FrequencyBand,
    protocol: u8,
    repeat: u32,
}

impl RfCommand {
    #[must_use]
    pub fn new(code: impl Into<String>, band: FrequencyBand, protocol: u8, repeat: u32) -> Self {
        Self {
            code: code.into(),
            band,
            protocol,
            repeat,
        }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn band(&self) -> FrequencyBand {
        self.band
    }

    #[must_use]
    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    #[must_use]
    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    /// Check that the command can be put on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] when the code is empty or contains a
    /// separator, the protocol is outside `1..=6`, or the repeat is zero.
    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.code.is_empty() {
            return Err(EncodingError::EmptyCode);
        }
        if self.code.contains(',') {
            return Err(EncodingError::SeparatorInCode);
        }
        if !(MIN_PROTOCOL..=MAX_PROTOCOL).contains(&self.protocol) {
            return Err(EncodingError::ProtocolOutOfRange(self.protocol));
        }
        if self.repeat == 0 {
            return Err(EncodingError::ZeroRepeat);
        }
        Ok(())
    }
}
