//! Radio gateway port — the operations the session needs from a radio stack.
//!
//! Implementations live in adapter crates (e.g. `rfremote-adapter-ble`).
//! Only the [`ConnectionSession`](crate::session::ConnectionSession) actor
//! ever calls these methods; everything else goes through its handle.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_stream::Stream;

use rfremote_domain::error::{
    ConnectError, DiscoveryError, PermissionError, WriteError,
};
use rfremote_domain::peripheral::PeripheralRef;

/// Peripherals as they are found. Ends when the scan window elapses or the
/// scan is stopped.
pub type DiscoveryStream = Pin<Box<dyn Stream<Item = PeripheralRef> + Send>>;

/// Inbound notification payloads in arrival order. Dropping the stream
/// cancels the subscription.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Resolves once if the link drops without the core asking for it. A closed
/// sender (`Err`) means the watcher went away and must be treated as silent.
pub type DisconnectSignal = oneshot::Receiver<()>;

/// Capability set required from the underlying radio stack.
pub trait RadioGateway: Send + Sync + 'static {
    /// Connected-link handle. Cheap to clone.
    type Handle: Clone + fmt::Debug + Send + Sync + 'static;

    /// Check that the process may use the radio.
    fn check_access(&self) -> impl Future<Output = Result<(), PermissionError>> + Send;

    /// Start discovery. The stream ends after `timeout` or [`stop_discovery`](Self::stop_discovery).
    fn discover(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<DiscoveryStream, DiscoveryError>> + Send;

    /// Stop an active discovery. A no-op when none is running.
    fn stop_discovery(&self) -> impl Future<Output = ()> + Send;

    /// Connect and discover services; returns once the link is usable.
    fn connect(
        &self,
        peripheral: &PeripheralRef,
    ) -> impl Future<Output = Result<Self::Handle, ConnectError>> + Send;

    /// Tear the link down. Idempotent: safe on an already-closed handle.
    fn disconnect(&self, handle: &Self::Handle) -> impl Future<Output = ()> + Send;

    /// Write a payload to a characteristic.
    ///
    /// `Ok` means the peripheral stack accepted the write, not that the
    /// firmware acted on it.
    fn write(
        &self,
        handle: &Self::Handle,
        characteristic: uuid::Uuid,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), WriteError>> + Send;

    /// Subscribe to notifications on a characteristic.
    fn subscribe(
        &self,
        handle: &Self::Handle,
        characteristic: uuid::Uuid,
    ) -> impl Future<Output = Result<NotificationStream, ConnectError>> + Send;

    /// Arm the one-shot watcher for disconnects the core did not request.
    fn watch_disconnect(
        &self,
        handle: &Self::Handle,
    ) -> impl Future<Output = Result<DisconnectSignal, ConnectError>> + Send;
}
