//! BLE adapter error types.

use std::time::Duration;

use rfremote_domain::error::{ConnectError, DiscoveryError, PermissionError, WriteError};

/// Errors specific to the BLE adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// A btleplug operation failed.
    #[error("BLE radio error: {0}")]
    Radio(#[from] btleplug::Error),

    /// A required GATT characteristic is missing on the peripheral.
    #[error("characteristic {uuid} not found")]
    CharacteristicNotFound { uuid: uuid::Uuid },

    /// The peripheral was not seen by the adapter.
    #[error("peripheral {0} not found")]
    UnknownPeripheral(String),

    /// Link setup did not finish in time.
    #[error("link setup timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl BleError {
    /// The access problem this error stands for.
    #[must_use]
    pub fn permission(&self) -> PermissionError {
        match self {
            Self::Radio(btleplug::Error::PermissionDenied) => PermissionError::Denied,
            _ => PermissionError::AdapterUnavailable,
        }
    }
}

impl From<BleError> for ConnectError {
    fn from(err: BleError) -> Self {
        ConnectError::new(err.to_string())
    }
}

impl From<BleError> for WriteError {
    fn from(err: BleError) -> Self {
        WriteError::new(err.to_string())
    }
}

impl From<BleError> for DiscoveryError {
    fn from(err: BleError) -> Self {
        DiscoveryError::new(err.to_string())
    }
}
