//! GATT helpers for the RF remote peripheral.
//!
//! [`open_link`] connects, discovers services and checks that the firmware
//! exposes both characteristics of the configured profile. A peripheral that
//! connects but lacks them is disconnected again before the error returns.

use std::time::Duration;

use btleplug::api::{Characteristic, Peripheral as _};
use btleplug::platform::Peripheral;

use rfremote_domain::gatt::GattProfile;

use crate::error::BleError;

/// Find a GATT characteristic by UUID on a peripheral that has already
/// discovered its services.
///
/// # Errors
///
/// Returns [`BleError::CharacteristicNotFound`] if no characteristic with
/// the given UUID is present.
pub(crate) fn find_characteristic(
    peripheral: &Peripheral,
    uuid: uuid::Uuid,
) -> Result<Characteristic, BleError> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or(BleError::CharacteristicNotFound { uuid })
}

/// Connect to `peripheral` and verify the profile, bounded by `timeout`.
///
/// # Errors
///
/// Returns [`BleError::Timeout`] when setup takes longer than `timeout`,
/// [`BleError::CharacteristicNotFound`] when the profile does not match, or
/// [`BleError::Radio`] for link failures.
pub(crate) async fn open_link(
    peripheral: &Peripheral,
    profile: &GattProfile,
    timeout: Duration,
) -> Result<(), BleError> {
    let result = match tokio::time::timeout(timeout, open_link_inner(peripheral, profile)).await
    {
        Ok(result) => result,
        Err(_) => Err(BleError::Timeout(timeout)),
    };

    if result.is_err() {
        if let Err(err) = peripheral.disconnect().await {
            tracing::debug!(%err, "disconnect after failed link setup");
        }
    }
    result
}

/// Inner setup logic, separated so the caller can always clean up.
async fn open_link_inner(peripheral: &Peripheral, profile: &GattProfile) -> Result<(), BleError> {
    if !peripheral.is_connected().await? {
        peripheral.connect().await?;
    }
    peripheral.discover_services().await?;

    find_characteristic(peripheral, profile.write_characteristic)?;
    find_characteristic(peripheral, profile.notify_characteristic)?;
    Ok(())
}
