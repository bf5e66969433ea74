//! # rfremote-adapter-ble
//!
//! BLE adapter — implements the [`RadioGateway`] port on top of `btleplug`.
//!
//! ## How it works
//!
//! The RF remote firmware exposes one GATT service with two
//! characteristics: commands are written to one, sniffed codes arrive as
//! notifications on the other. This adapter scans for advertisers, keeps the
//! btleplug peripheral behind every reported [`PeripheralId`], opens and
//! verifies links, and turns adapter events into the session's disconnect
//! signal.
//!
//! The first adapter reported by the platform manager is used; it is looked
//! up lazily so a missing radio shows up as a [`PermissionError`] from
//! [`RadioGateway::check_access`] instead of a startup failure.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `rfremote-app` and `rfremote-domain`.

mod config;
mod error;
mod gatt;
mod scanner;

pub use config::BleConfig;
pub use error::BleError;

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::sync::{OnceCell, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::ReceiverStream;

use rfremote_app::ports::{DisconnectSignal, DiscoveryStream, NotificationStream, RadioGateway};
use rfremote_domain::error::{ConnectError, DiscoveryError, PermissionError, WriteError};
use rfremote_domain::id::PeripheralId;
use rfremote_domain::peripheral::PeripheralRef;

use crate::scanner::Registry;

/// Buffer between the discovery task and the session.
const DISCOVERY_BUFFER: usize = 32;

/// An open, verified link to one peripheral.
#[derive(Debug, Clone)]
pub struct BleLink {
    id: PeripheralId,
    peripheral: Peripheral,
}

/// [`RadioGateway`] backed by the platform BLE stack.
pub struct BtleplugGateway {
    config: BleConfig,
    central: OnceCell<Adapter>,
    registry: Registry,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl BtleplugGateway {
    /// Create a gateway. The radio is not touched until first use.
    #[must_use]
    pub fn new(config: BleConfig) -> Self {
        Self {
            config,
            central: OnceCell::new(),
            registry: Registry::default(),
            scan_task: Mutex::new(None),
        }
    }

    async fn central(&self) -> Result<&Adapter, BleError> {
        self.central
            .get_or_try_init(|| async {
                let manager = Manager::new().await?;
                let adapters = manager.adapters().await?;
                let central = adapters.into_iter().next().ok_or(BleError::NotAvailable)?;
                if let Ok(info) = central.adapter_info().await {
                    tracing::info!(adapter = %info, "BLE adapter selected");
                }
                Ok(central)
            })
            .await
    }

    fn abort_scan(&self) -> bool {
        let task = self
            .scan_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match task {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    async fn peripheral_for(&self, target: &PeripheralRef) -> Result<Peripheral, BleError> {
        if let Some(peripheral) = self.registry.get(&target.id) {
            return Ok(peripheral);
        }
        let central = self.central().await?;
        let deadline = Instant::now() + self.config.connect_timeout();
        scanner::locate(central, &target.id, &self.config, &self.registry, deadline).await
    }

    async fn open(&self, target: &PeripheralRef) -> Result<BleLink, BleError> {
        let peripheral = self.peripheral_for(target).await?;
        gatt::open_link(&peripheral, &self.config.profile(), self.config.connect_timeout()).await?;
        Ok(BleLink {
            id: target.id.clone(),
            peripheral,
        })
    }
}

impl RadioGateway for BtleplugGateway {
    type Handle = BleLink;

    async fn check_access(&self) -> Result<(), PermissionError> {
        match self.central().await {
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::warn!(%err, "BLE adapter unavailable");
                Err(err.permission())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn discover(&self, timeout: Duration) -> Result<DiscoveryStream, DiscoveryError> {
        let central = self.central().await?.clone();
        self.abort_scan();

        let events = scanner::start(&central).await?;
        let (tx, rx) = mpsc::channel(DISCOVERY_BUFFER);
        let task = tokio::spawn(scanner::run(
            central,
            events,
            self.config.clone(),
            self.registry.clone(),
            tx,
            Instant::now() + timeout,
        ));
        *self
            .scan_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);

        tracing::info!(timeout_secs = timeout.as_secs(), "BLE scan started");
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn stop_discovery(&self) {
        if !self.abort_scan() {
            return;
        }
        // The aborted task cannot stop the scan itself.
        if let Some(central) = self.central.get()
            && let Err(err) = central.stop_scan().await
        {
            tracing::warn!(%err, "failed to stop BLE scan");
        }
        tracing::info!("BLE scan stopped");
    }

    #[tracing::instrument(skip(self, peripheral), fields(peripheral = %peripheral.id))]
    async fn connect(&self, peripheral: &PeripheralRef) -> Result<BleLink, ConnectError> {
        let link = self.open(peripheral).await?;
        tracing::info!("BLE link established");
        Ok(link)
    }

    async fn disconnect(&self, handle: &BleLink) {
        match handle.peripheral.disconnect().await {
            Ok(()) => tracing::info!(peripheral = %handle.id, "BLE link closed"),
            Err(err) => tracing::debug!(peripheral = %handle.id, %err, "disconnect on closed link"),
        }
    }

    async fn write(
        &self,
        handle: &BleLink,
        characteristic: uuid::Uuid,
        payload: &[u8],
    ) -> Result<(), WriteError> {
        let characteristic = gatt::find_characteristic(&handle.peripheral, characteristic)?;
        handle
            .peripheral
            .write(&characteristic, payload, WriteType::WithResponse)
            .await
            .map_err(BleError::from)?;
        tracing::trace!(peripheral = %handle.id, len = payload.len(), "BLE write accepted");
        Ok(())
    }

    async fn subscribe(
        &self,
        handle: &BleLink,
        characteristic: uuid::Uuid,
    ) -> Result<NotificationStream, ConnectError> {
        let target = gatt::find_characteristic(&handle.peripheral, characteristic)?;
        let notifications = handle
            .peripheral
            .notifications()
            .await
            .map_err(BleError::from)?;
        handle
            .peripheral
            .subscribe(&target)
            .await
            .map_err(BleError::from)?;
        tracing::debug!(peripheral = %handle.id, %characteristic, "subscribed to notifications");

        let stream = notifications
            .filter(move |n| n.uuid == characteristic)
            .map(|n| n.value);
        Ok(Box::pin(stream))
    }

    async fn watch_disconnect(&self, handle: &BleLink) -> Result<DisconnectSignal, ConnectError> {
        let central = self.central().await?;
        let mut events = central.events().await.map_err(BleError::from)?;
        // Checked after subscribing so a drop during link setup is not missed.
        let connected = handle
            .peripheral
            .is_connected()
            .await
            .map_err(BleError::from)?;
        let watched = handle.peripheral.id();
        let id = handle.id.clone();
        let (tx, rx) = oneshot::channel();

        let dropped = async move {
            while let Some(event) = events.next().await {
                if matches!(event, CentralEvent::DeviceDisconnected(ref pid) if *pid == watched) {
                    return true;
                }
            }
            false
        };
        tokio::spawn(async move {
            if relay_drop(tx, connected, dropped).await {
                tracing::warn!(peripheral = %id, "BLE link dropped");
            }
        });
        Ok(rx)
    }
}

/// Fire `tx` once `dropped` resolves to `true`, or right away when the link
/// is already down. Gives up when the session drops the receiver, which is
/// how a requested disconnect looks from here. Returns whether it fired.
async fn relay_drop(
    mut tx: oneshot::Sender<()>,
    connected: bool,
    dropped: impl Future<Output = bool>,
) -> bool {
    if !connected {
        return tx.send(()).is_ok();
    }
    tokio::select! {
        () = tx.closed() => false,
        gone = dropped => gone && tx.send(()).is_ok(),
    }
}
