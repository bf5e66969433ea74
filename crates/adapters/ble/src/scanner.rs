//! Discovery — turns adapter events into [`PeripheralRef`]s.
//!
//! A scan runs on its own task for at most one window. Every accepted
//! advertiser is recorded in the [`Registry`] so a later connect can find
//! the btleplug peripheral behind a [`PeripheralId`].

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use btleplug::api::{BDAddr, Central, CentralEvent, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Peripheral};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::{Stream, StreamExt as _};

use rfremote_domain::id::PeripheralId;
use rfremote_domain::peripheral::PeripheralRef;

use crate::config::BleConfig;
use crate::error::BleError;

type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

/// Peripherals seen so far, by the identifier reported to the session.
#[derive(Debug, Clone, Default)]
pub(crate) struct Registry(Arc<Mutex<HashMap<PeripheralId, Peripheral>>>);

impl Registry {
    pub(crate) fn insert(&self, id: PeripheralId, peripheral: Peripheral) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, peripheral);
    }

    pub(crate) fn get(&self, id: &PeripheralId) -> Option<Peripheral> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

/// Stable identifier for a peripheral: its hardware address, or the
/// platform id where the address is hidden (macOS reports all zeroes).
pub(crate) fn identity(address: BDAddr, platform_id: impl FnOnce() -> String) -> PeripheralId {
    if address == BDAddr::default() {
        PeripheralId::new(platform_id())
    } else {
        PeripheralId::new(address.to_string())
    }
}

/// Describe `peripheral` if it passes the name filter.
async fn describe(peripheral: &Peripheral, config: &BleConfig) -> Option<PeripheralRef> {
    let props = peripheral.properties().await.ok().flatten()?;
    if !config.accepts(props.local_name.as_deref()) {
        tracing::trace!(name = ?props.local_name, "advertiser filtered out");
        return None;
    }
    let id = identity(props.address, || peripheral.id().to_string());
    Some(PeripheralRef::new(id, props.local_name))
}

/// Subscribe to adapter events and start scanning.
///
/// # Errors
///
/// Returns [`BleError::Radio`] when the scan cannot be started.
pub(crate) async fn start(central: &Adapter) -> Result<CentralEvents, BleError> {
    let events = central.events().await?;
    central.start_scan(ScanFilter::default()).await?;
    Ok(events)
}

/// Forward accepted advertisers until the deadline, the receiver goes away
/// or the event stream ends, then stop scanning.
pub(crate) async fn run(
    central: Adapter,
    mut events: CentralEvents,
    config: BleConfig,
    registry: Registry,
    found: mpsc::Sender<PeripheralRef>,
    deadline: Instant,
) {
    while Instant::now() < deadline {
        let remaining = deadline - Instant::now();
        match tokio::time::timeout(remaining, events.next()).await {
            Ok(Some(CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id))) => {
                let Ok(peripheral) = central.peripheral(&id).await else {
                    continue;
                };
                let Some(described) = describe(&peripheral, &config).await else {
                    continue;
                };
                registry.insert(described.id.clone(), peripheral);
                if found.send(described).await.is_err() {
                    break;
                }
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }

    if let Err(err) = central.stop_scan().await {
        tracing::warn!(%err, "failed to stop BLE scan");
    }
    tracing::debug!("BLE discovery task finished");
}

/// Find a peripheral that was not seen by a scan in this process, e.g. the
/// remembered one at startup. Scans for at most `deadline`.
///
/// # Errors
///
/// Returns [`BleError::UnknownPeripheral`] when it does not show up in time.
pub(crate) async fn locate(
    central: &Adapter,
    id: &PeripheralId,
    config: &BleConfig,
    registry: &Registry,
    deadline: Instant,
) -> Result<Peripheral, BleError> {
    for peripheral in central.peripherals().await? {
        if let Ok(Some(props)) = peripheral.properties().await {
            if identity(props.address, || peripheral.id().to_string()) == *id {
                registry.insert(id.clone(), peripheral.clone());
                return Ok(peripheral);
            }
        }
    }

    tracing::debug!(peripheral = %id, "peripheral not cached, scanning for it");
    let mut events = start(central).await?;
    let mut located = None;
    while Instant::now() < deadline {
        let remaining = deadline - Instant::now();
        match tokio::time::timeout(remaining, events.next()).await {
            Ok(Some(CentralEvent::DeviceDiscovered(pid) | CentralEvent::DeviceUpdated(pid))) => {
                let Ok(peripheral) = central.peripheral(&pid).await else {
                    continue;
                };
                let Ok(Some(props)) = peripheral.properties().await else {
                    continue;
                };
                if identity(props.address, || peripheral.id().to_string()) == *id {
                    located = Some(peripheral);
                    break;
                }
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }
    if let Err(err) = central.stop_scan().await {
        tracing::warn!(%err, "failed to stop BLE scan");
    }

    let peripheral = located.ok_or_else(|| BleError::UnknownPeripheral(id.to_string()))?;
    registry.insert(id.clone(), peripheral.clone());
    Ok(peripheral)
}
