//! In-memory test doubles for the ports.
//!
//! Compiled for this crate's tests and, behind the `test-util` feature, for
//! other crates' tests. [`FakeGateway`] records every call it receives so
//! tests can assert on ordering, and lets the test inject notifications and
//! link drops.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use rfremote_domain::error::{
    ConnectError, DiscoveryError, PermissionError, StorageError, WriteError,
};
use rfremote_domain::id::PeripheralId;
use rfremote_domain::peripheral::PeripheralRef;
use rfremote_domain::saved_code::SavedCodeRecord;

use crate::ports::{
    DisconnectSignal, DiscoveryStream, NotificationStream, RadioGateway, SavedCodeRepository,
    SessionStore,
};

/// One call received by a [`FakeGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    CheckAccess,
    Discover,
    StopDiscovery,
    Connect(PeripheralId),
    Disconnect(PeripheralId),
    Write(PeripheralId, Vec<u8>),
    Subscribe(PeripheralId),
    WatchDisconnect(PeripheralId),
}

/// Link handle handed out by [`FakeGateway::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeLink {
    pub peripheral: PeripheralId,
    pub serial: u64,
}

#[derive(Debug, Default)]
struct FakeState {
    devices: Vec<PeripheralRef>,
    finite_scan: bool,
    access: Option<PermissionError>,
    failing: HashSet<PeripheralId>,
    fail_all_connects: bool,
    write_failures: VecDeque<bool>,
    calls: Vec<GatewayCall>,
    serial: u64,
    link: Option<FakeLink>,
    notify_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    drop_tx: Option<oneshot::Sender<()>>,
}

/// Scriptable [`RadioGateway`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose scans report `devices`.
    #[must_use]
    pub fn with_devices(devices: Vec<PeripheralRef>) -> Self {
        let gateway = Self::new();
        gateway.lock().devices = devices;
        gateway
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// End discovery streams right after the last device instead of
    /// leaving them open until the scan window elapses.
    pub fn set_finite_scan(&self, finite: bool) {
        self.lock().finite_scan = finite;
    }

    /// Make [`RadioGateway::check_access`] fail with `error`.
    pub fn deny_access(&self, error: PermissionError) {
        self.lock().access = Some(error);
    }

    pub fn grant_access(&self) {
        self.lock().access = None;
    }

    /// Make connects to `id` fail.
    pub fn fail_connects_to(&self, id: impl Into<PeripheralId>) {
        self.lock().failing.insert(id.into());
    }

    /// Make every connect fail (or succeed again).
    pub fn fail_all_connects(&self, fail: bool) {
        self.lock().fail_all_connects = fail;
    }

    /// Queue write outcomes; `true` rejects that write. Writes past the end
    /// of the queue succeed.
    pub fn script_writes(&self, failures: impl IntoIterator<Item = bool>) {
        self.lock().write_failures.extend(failures);
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    /// Payloads written so far, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Write(_, payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls matching `predicate`.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&GatewayCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// The currently connected link, if any.
    #[must_use]
    pub fn link(&self) -> Option<FakeLink> {
        self.lock().link.clone()
    }

    /// Push a notification into the open subscription. Returns `false` when
    /// nothing is subscribed.
    pub fn notify(&self, payload: &[u8]) -> bool {
        self.lock()
            .notify_tx
            .as_ref()
            .is_some_and(|tx| tx.send(payload.to_vec()).is_ok())
    }

    /// Simulate the peripheral dropping the link. Returns `false` when no
    /// watcher was armed. The notification sender stays in place, so a late
    /// [`notify`](Self::notify) still reaches whatever listens on it.
    pub fn drop_link(&self) -> bool {
        let mut state = self.lock();
        state.link = None;
        state
            .drop_tx
            .take()
            .is_some_and(|tx| tx.send(()).is_ok())
    }
}

impl RadioGateway for FakeGateway {
    type Handle = FakeLink;

    fn check_access(&self) -> impl Future<Output = Result<(), PermissionError>> + Send {
        let mut state = self.lock();
        state.calls.push(GatewayCall::CheckAccess);
        let result = state.access.clone().map_or(Ok(()), Err);
        async move { result }
    }

    fn discover(
        &self,
        _timeout: Duration,
    ) -> impl Future<Output = Result<DiscoveryStream, DiscoveryError>> + Send {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Discover);
        let devices = tokio_stream::iter(state.devices.clone());
        let stream: DiscoveryStream = if state.finite_scan {
            Box::pin(devices)
        } else {
            Box::pin(devices.chain(tokio_stream::pending()))
        };
        async move { Ok(stream) }
    }

    fn stop_discovery(&self) -> impl Future<Output = ()> + Send {
        self.lock().calls.push(GatewayCall::StopDiscovery);
        async {}
    }

    fn connect(
        &self,
        peripheral: &PeripheralRef,
    ) -> impl Future<Output = Result<FakeLink, ConnectError>> + Send {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Connect(peripheral.id.clone()));
        let result = if state.fail_all_connects || state.failing.contains(&peripheral.id) {
            Err(ConnectError::new(format!("{} unreachable", peripheral.id)))
        } else {
            state.serial += 1;
            let link = FakeLink {
                peripheral: peripheral.id.clone(),
                serial: state.serial,
            };
            state.link = Some(link.clone());
            Ok(link)
        };
        async move { result }
    }

    fn disconnect(&self, handle: &FakeLink) -> impl Future<Output = ()> + Send {
        let mut state = self.lock();
        state
            .calls
            .push(GatewayCall::Disconnect(handle.peripheral.clone()));
        if state.link.as_ref() == Some(handle) {
            state.link = None;
            state.notify_tx = None;
            state.drop_tx = None;
        }
        async {}
    }

    fn write(
        &self,
        handle: &FakeLink,
        _characteristic: uuid::Uuid,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), WriteError>> + Send {
        let mut state = self.lock();
        state
            .calls
            .push(GatewayCall::Write(handle.peripheral.clone(), payload.to_vec()));
        let result = if state.link.as_ref() != Some(handle) {
            Err(WriteError::new("link is closed"))
        } else if state.write_failures.pop_front().unwrap_or(false) {
            Err(WriteError::new("write rejected"))
        } else {
            Ok(())
        };
        async move { result }
    }

    fn subscribe(
        &self,
        handle: &FakeLink,
        _characteristic: uuid::Uuid,
    ) -> impl Future<Output = Result<NotificationStream, ConnectError>> + Send {
        let mut state = self.lock();
        state
            .calls
            .push(GatewayCall::Subscribe(handle.peripheral.clone()));
        let (tx, rx) = mpsc::unbounded_channel();
        state.notify_tx = Some(tx);
        let stream: NotificationStream = Box::pin(UnboundedReceiverStream::new(rx));
        async move { Ok(stream) }
    }

    fn watch_disconnect(
        &self,
        handle: &FakeLink,
    ) -> impl Future<Output = Result<DisconnectSignal, ConnectError>> + Send {
        let mut state = self.lock();
        state
            .calls
            .push(GatewayCall::WatchDisconnect(handle.peripheral.clone()));
        let (tx, rx) = oneshot::channel();
        state.drop_tx = Some(tx);
        async move { Ok(rx) }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("storage unavailable")]
struct Unavailable;

/// [`SessionStore`] kept in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    last: Arc<Mutex<Option<PeripheralId>>>,
    failing: Arc<Mutex<bool>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already remembers `id`.
    #[must_use]
    pub fn remembering(id: impl Into<PeripheralId>) -> Self {
        let store = Self::new();
        *store.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(id.into());
        store
    }

    /// The currently stored id.
    #[must_use]
    pub fn current(&self) -> Option<PeripheralId> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make every operation fail.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(PoisonError::into_inner) = failing;
    }

    fn check(&self) -> Result<(), StorageError> {
        if *self.failing.lock().unwrap_or_else(PoisonError::into_inner) {
            Err(StorageError::new(Unavailable))
        } else {
            Ok(())
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn last_peripheral(
        &self,
    ) -> impl Future<Output = Result<Option<PeripheralId>, StorageError>> + Send {
        let result = self.check().map(|()| self.current());
        async move { result }
    }

    fn remember_peripheral(
        &self,
        id: &PeripheralId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        let result = self.check().map(|()| {
            *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(id.clone());
        });
        async move { result }
    }

    fn forget_peripheral(&self) -> impl Future<Output = Result<(), StorageError>> + Send {
        let result = self.check().map(|()| {
            *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
        });
        async move { result }
    }
}

/// [`SavedCodeRepository`] kept in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemorySavedCodes {
    records: Arc<Mutex<Vec<SavedCodeRecord>>>,
}

impl InMemorySavedCodes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what is stored.
    #[must_use]
    pub fn stored(&self) -> Vec<SavedCodeRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SavedCodeRepository for InMemorySavedCodes {
    fn load(&self) -> impl Future<Output = Result<Vec<SavedCodeRecord>, StorageError>> + Send {
        let records = self.stored();
        async move { Ok(records) }
    }

    fn store(
        &self,
        records: &[SavedCodeRecord],
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = records.to_vec();
        async { Ok(()) }
    }
}
