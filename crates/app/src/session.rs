//! Connection session — the single owner of the radio link.
//!
//! [`ConnectionSession::spawn`] starts an actor task that owns the
//! [`RadioGateway`], the [`SessionStore`] and the one [`ConnectionState`].
//! Callers talk to it through a cloneable [`SessionHandle`]; requests are
//! queued on a channel and processed one at a time, each answered on its own
//! oneshot. Between requests the actor also watches the active scan (its
//! stream and its deadline) and the disconnect watcher of the Ready link.
//!
//! Notification payloads never pass through the actor: the
//! [`NotificationSubscription`] of the Ready link pumps them straight into the
//! [`NotificationRouter`].

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_stream::StreamExt;

use rfremote_domain::connection::{ConnectionState, InvalidTransition, SessionEvent};
use rfremote_domain::error::{
    ConnectError, DiscoveryError, EncodingError, PermissionError, WriteError,
};
use rfremote_domain::gatt::GattProfile;
use rfremote_domain::peripheral::PeripheralRef;
use rfremote_domain::rf_command::RfCommand;

use crate::codec;
use crate::ports::{DisconnectSignal, DiscoveryStream, RadioGateway, SessionStore};
use crate::router::NotificationRouter;
use crate::subscription::NotificationSubscription;

/// Session tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Length of one discovery window.
    pub scan_window_secs: u64,
    /// Try one immediate reconnect when a Ready link drops.
    pub auto_reconnect: bool,
    /// Writes per rapid send burst.
    pub rapid_send_count: u32,
    /// Capacity of the request queue.
    pub command_queue: usize,
    /// Reconnect to the remembered peripheral at startup.
    pub restore_on_start: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scan_window_secs: 5,
            auto_reconnect: true,
            rapid_send_count: 10,
            command_queue: 32,
            restore_on_start: true,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn scan_window(&self) -> Duration {
        Duration::from_secs(self.scan_window_secs)
    }
}

/// Errors surfaced by [`SessionHandle`] requests.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The request needs a Ready link. Nothing was written.
    #[error("session is {state}, no ready link")]
    NotReady { state: &'static str },

    #[error("Connect error")]
    Connect(#[from] ConnectError),

    #[error("Write error")]
    Write(#[from] WriteError),

    #[error("Encoding error")]
    Encoding(#[from] EncodingError),

    #[error("Permission error")]
    Permission(#[from] PermissionError),

    #[error("Discovery error")]
    Discovery(#[from] DiscoveryError),

    #[error("Invalid transition")]
    InvalidTransition(#[from] InvalidTransition),

    /// Nothing to reconnect to.
    #[error("no remembered peripheral")]
    NoKnownPeripheral,

    /// The session actor has shut down.
    #[error("session is closed")]
    Closed,
}

/// Outcome of a rapid send burst.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstReport {
    pub attempted: u32,
    pub accepted: u32,
}

impl BurstReport {
    #[must_use]
    pub fn all_accepted(&self) -> bool {
        self.attempted == self.accepted
    }
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Scan(Reply<()>),
    StopScan(Reply<()>),
    Select(PeripheralRef, Reply<()>),
    Disconnect(Reply<()>),
    Reconnect(Reply<()>),
    Restore(Reply<bool>),
    Send(RfCommand, Reply<()>),
    Burst(RfCommand, Reply<BurstReport>),
    RecheckAccess(Reply<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable front of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    candidates: watch::Receiver<Vec<PeripheralRef>>,
    router: Arc<NotificationRouter>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scan(_) => "scan",
            Self::StopScan(_) => "stop_scan",
            Self::Select(..) => "select",
            Self::Disconnect(_) => "disconnect",
            Self::Reconnect(_) => "reconnect",
            Self::Restore(_) => "restore",
            Self::Send(..) => "send",
            Self::Burst(..) => "burst",
            Self::RecheckAccess(_) => "recheck_access",
            Self::Shutdown(_) => "shutdown",
        };
        f.write_str(name)
    }
}

impl SessionHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Peripherals found by the current or last scan, deduplicated by id.
    #[must_use]
    pub fn candidates(&self) -> Vec<PeripheralRef> {
        self.candidates.borrow().clone()
    }

    /// Receiver that observes the candidate list.
    #[must_use]
    pub fn watch_candidates(&self) -> watch::Receiver<Vec<PeripheralRef>> {
        self.candidates.clone()
    }

    /// The router fed by this session's subscriptions.
    #[must_use]
    pub fn router(&self) -> &Arc<NotificationRouter> {
        &self.router
    }

    /// Start a discovery window. Returns once scanning has begun.
    ///
    /// # Errors
    ///
    /// [`SessionError::Permission`] while radio access is missing,
    /// [`SessionError::InvalidTransition`] unless Idle or Failed, or the
    /// gateway's [`SessionError::Discovery`].
    #[tracing::instrument(skip(self))]
    pub async fn scan(&self) -> Result<(), SessionError> {
        self.request(Command::Scan).await
    }

    /// End the active scan early. A no-op when not scanning.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] after shutdown.
    #[tracing::instrument(skip(self))]
    pub async fn stop_scan(&self) -> Result<(), SessionError> {
        self.request(Command::StopScan).await
    }

    /// Connect to `peripheral`, replacing any Ready link.
    ///
    /// Returns once the link is Ready or the attempt failed. Selecting the
    /// peripheral that is already Ready is a no-op.
    ///
    /// # Errors
    ///
    /// [`SessionError::Connect`] when the attempt failed (the session is then
    /// Failed), [`SessionError::Permission`], or
    /// [`SessionError::InvalidTransition`].
    #[tracing::instrument(skip(self, peripheral), fields(peripheral = %peripheral.id))]
    pub async fn select(&self, peripheral: PeripheralRef) -> Result<(), SessionError> {
        self.request(|reply| Command::Select(peripheral, reply)).await
    }

    /// Close the link and forget the remembered peripheral.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidTransition`] while connecting, or
    /// [`SessionError::Closed`].
    #[tracing::instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.request(Command::Disconnect).await
    }

    /// Retry the peripheral of a Failed state or, when Idle, the remembered
    /// one.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoKnownPeripheral`] when Idle with nothing
    /// remembered, [`SessionError::Connect`] when the attempt fails.
    #[tracing::instrument(skip(self))]
    pub async fn reconnect(&self) -> Result<(), SessionError> {
        self.request(Command::Reconnect).await
    }

    /// Connect to the remembered peripheral when Idle.
    ///
    /// Returns `false` when there was nothing to restore.
    ///
    /// # Errors
    ///
    /// [`SessionError::Connect`] when the attempt fails.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&self) -> Result<bool, SessionError> {
        self.request(Command::Restore).await
    }

    /// Encode and write one command on the Ready link.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotReady`] outside Ready (nothing is written),
    /// [`SessionError::Encoding`] or [`SessionError::Write`].
    #[tracing::instrument(skip(self, command), fields(code = %command.code()))]
    pub async fn send_command(&self, command: RfCommand) -> Result<(), SessionError> {
        self.fail_unless_ready()?;
        self.request(|reply| Command::Send(command, reply)).await
    }

    /// Write the same command back to back, best effort.
    ///
    /// Rejected writes are counted, not fatal.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotReady`] outside Ready or
    /// [`SessionError::Encoding`].
    #[tracing::instrument(skip(self, command), fields(code = %command.code()))]
    pub async fn rapid_send(&self, command: RfCommand) -> Result<BurstReport, SessionError> {
        self.fail_unless_ready()?;
        self.request(|reply| Command::Burst(command, reply)).await
    }

    /// Check radio access again after the user fixed it.
    ///
    /// # Errors
    ///
    /// [`SessionError::Permission`] while access is still missing.
    #[tracing::instrument(skip(self))]
    pub async fn recheck_access(&self) -> Result<(), SessionError> {
        self.request(Command::RecheckAccess).await
    }

    /// Tear the session down and wait for it. Safe to call more than once;
    /// afterwards every request fails with [`SessionError::Closed`].
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    fn fail_unless_ready(&self) -> Result<(), SessionError> {
        let state = self.state.borrow();
        if state.is_ready() {
            Ok(())
        } else {
            tracing::warn!(state = state.name(), "command dropped, session not ready");
            Err(SessionError::NotReady {
                state: state.name(),
            })
        }
    }
}

struct ActiveScan {
    stream: DiscoveryStream,
    deadline: Instant,
}

struct ActiveLink<H> {
    handle: H,
    subscription: NotificationSubscription,
    watcher: Option<DisconnectSignal>,
}

/// The session actor.
pub struct ConnectionSession<G: RadioGateway, S> {
    gateway: G,
    store: S,
    router: Arc<NotificationRouter>,
    config: SessionConfig,
    profile: GattProfile,
    access: Result<(), PermissionError>,
    state: watch::Sender<ConnectionState>,
    candidates: watch::Sender<Vec<PeripheralRef>>,
    scan: Option<ActiveScan>,
    link: Option<ActiveLink<G::Handle>>,
}

impl<G, S> ConnectionSession<G, S>
where
    G: RadioGateway,
    S: SessionStore,
{
    /// Spawn the actor on the current tokio runtime.
    pub fn spawn(
        gateway: G,
        store: S,
        router: Arc<NotificationRouter>,
        config: SessionConfig,
        profile: GattProfile,
    ) -> SessionHandle {
        let (commands, inbox) = mpsc::channel(config.command_queue.max(1));
        let (state, state_rx) = watch::channel(ConnectionState::Idle);
        let (candidates, candidates_rx) = watch::channel(Vec::new());

        let session = Self {
            gateway,
            store,
            router: Arc::clone(&router),
            config,
            profile,
            access: Ok(()),
            state,
            candidates,
            scan: None,
            link: None,
        };
        tokio::spawn(session.run(inbox));

        SessionHandle {
            commands,
            state: state_rx,
            candidates: candidates_rx,
            router,
        }
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<Command>) {
        self.access = self.gateway.check_access().await;
        if let Err(err) = &self.access {
            tracing::warn!(%err, "radio access unavailable");
        }
        tracing::info!("session started");

        loop {
            tokio::select! {
                command = inbox.recv() => match command {
                    Some(Command::Shutdown(done)) => {
                        self.teardown().await;
                        let _ = done.send(());
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => {
                        self.teardown().await;
                        break;
                    }
                },
                found = next_discovery(&mut self.scan), if self.scan.is_some() => match found {
                    Some(peripheral) => self.add_candidate(peripheral),
                    None => self.finish_scan().await,
                },
                () = link_lost(&mut self.link), if self.link.is_some() => {
                    self.on_link_lost().await;
                }
            }
        }
        tracing::info!("session stopped");
    }

    async fn handle(&mut self, command: Command) {
        tracing::debug!(?command, state = self.current().name(), "handling request");
        match command {
            Command::Scan(reply) => {
                let _ = reply.send(self.start_scan().await);
            }
            Command::StopScan(reply) => {
                if self.scan.is_some() {
                    self.finish_scan().await;
                }
                let _ = reply.send(Ok(()));
            }
            Command::Select(peripheral, reply) => {
                let _ = reply.send(self.select(peripheral).await);
            }
            Command::Disconnect(reply) => {
                let _ = reply.send(self.disconnect().await);
            }
            Command::Reconnect(reply) => {
                let _ = reply.send(self.reconnect().await);
            }
            Command::Restore(reply) => {
                let _ = reply.send(self.restore().await);
            }
            Command::Send(command, reply) => {
                let _ = reply.send(self.send(&command).await);
            }
            Command::Burst(command, reply) => {
                let _ = reply.send(self.burst(&command).await);
            }
            Command::RecheckAccess(reply) => {
                self.access = self.gateway.check_access().await;
                match &self.access {
                    Ok(()) => tracing::info!("radio access granted"),
                    Err(err) => tracing::warn!(%err, "radio access still unavailable"),
                }
                let _ = reply.send(self.access.clone().map_err(SessionError::from));
            }
            Command::Shutdown(_) => {}
        }
    }

    fn current(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    fn transition(&mut self, event: SessionEvent) -> Result<(), InvalidTransition> {
        let from = self.current();
        let to = from.apply(event)?;
        self.set_state(to);
        Ok(())
    }

    fn set_state(&mut self, to: ConnectionState) {
        let from = self.state.send_replace(to.clone());
        if from != to {
            tracing::info!(from = from.name(), to = %to, "session state changed");
        }
    }

    fn check_access(&self) -> Result<(), SessionError> {
        self.access.clone().map_err(SessionError::from)
    }

    async fn start_scan(&mut self) -> Result<(), SessionError> {
        self.check_access()?;
        let next = self.current().apply(SessionEvent::ScanRequested)?;
        let window = self.config.scan_window();
        let stream = self.gateway.discover(window).await?;
        self.candidates.send_replace(Vec::new());
        self.scan = Some(ActiveScan {
            stream,
            deadline: Instant::now() + window,
        });
        self.set_state(next);
        tracing::info!(window_secs = window.as_secs(), "scan started");
        Ok(())
    }

    fn add_candidate(&mut self, peripheral: PeripheralRef) {
        self.candidates.send_if_modified(|list| {
            if list.iter().any(|known| known.id == peripheral.id) {
                false
            } else {
                tracing::debug!(peripheral = %peripheral, "peripheral discovered");
                list.push(peripheral);
                true
            }
        });
    }

    async fn finish_scan(&mut self) {
        if self.scan.take().is_some() {
            self.gateway.stop_discovery().await;
        }
        if self.transition(SessionEvent::ScanEnded).is_ok() {
            tracing::info!(count = self.candidates.borrow().len(), "scan finished");
        }
    }

    async fn select(&mut self, peripheral: PeripheralRef) -> Result<(), SessionError> {
        self.check_access()?;
        if let ConnectionState::Ready(current) = self.current() {
            if current.id == peripheral.id {
                return Ok(());
            }
            tracing::info!(from = %current.id, to = %peripheral.id, "switching peripheral");
            self.transition(SessionEvent::DisconnectRequested)?;
            self.release_link().await;
        }
        self.transition(SessionEvent::SelectRequested(peripheral.clone()))?;
        if self.scan.take().is_some() {
            self.gateway.stop_discovery().await;
        }
        self.establish(&peripheral).await
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        self.transition(SessionEvent::DisconnectRequested)?;
        if self.scan.take().is_some() {
            self.gateway.stop_discovery().await;
        }
        self.release_link().await;
        if let Err(err) = self.store.forget_peripheral().await {
            tracing::warn!(%err, "failed to forget peripheral");
        }
        tracing::info!("disconnected");
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), SessionError> {
        self.check_access()?;
        match self.current() {
            ConnectionState::Ready(_) => Ok(()),
            ConnectionState::Failed(peripheral, _) => {
                self.transition(SessionEvent::SelectRequested(peripheral.clone()))?;
                self.establish(&peripheral).await
            }
            ConnectionState::Idle => match self.remembered().await {
                Some(peripheral) => {
                    self.transition(SessionEvent::SelectRequested(peripheral.clone()))?;
                    self.establish(&peripheral).await
                }
                None => Err(SessionError::NoKnownPeripheral),
            },
            other => Err(InvalidTransition {
                state: other.name(),
                event: "reconnect request",
            }
            .into()),
        }
    }

    async fn restore(&mut self) -> Result<bool, SessionError> {
        if self.current() != ConnectionState::Idle {
            return Ok(false);
        }
        let Some(peripheral) = self.remembered().await else {
            tracing::debug!("no remembered peripheral to restore");
            return Ok(false);
        };
        self.check_access()?;
        tracing::info!(peripheral = %peripheral.id, "restoring session");
        self.transition(SessionEvent::SelectRequested(peripheral.clone()))?;
        self.establish(&peripheral).await.map(|()| true)
    }

    async fn remembered(&mut self) -> Option<PeripheralRef> {
        match self.store.last_peripheral().await {
            Ok(id) => id.map(PeripheralRef::from_id),
            Err(err) => {
                tracing::warn!(%err, "failed to read remembered peripheral");
                None
            }
        }
    }

    /// Connect to `peripheral` from Connecting or Reconnecting and apply the
    /// outcome.
    async fn establish(&mut self, peripheral: &PeripheralRef) -> Result<(), SessionError> {
        match self.open_link(peripheral).await {
            Ok(link) => {
                self.link = Some(link);
                self.transition(SessionEvent::ConnectSucceeded)?;
                if let Err(err) = self.store.remember_peripheral(&peripheral.id).await {
                    tracing::warn!(%err, peripheral = %peripheral.id, "failed to remember peripheral");
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(peripheral = %peripheral.id, %err, "connect failed");
                self.transition(SessionEvent::ConnectFailed(err.clone()))?;
                Err(err.into())
            }
        }
    }

    async fn open_link(
        &mut self,
        peripheral: &PeripheralRef,
    ) -> Result<ActiveLink<G::Handle>, ConnectError> {
        let handle = self.gateway.connect(peripheral).await?;
        let stream = match self
            .gateway
            .subscribe(&handle, self.profile.notify_characteristic)
            .await
        {
            Ok(stream) => stream,
            Err(err) => {
                self.gateway.disconnect(&handle).await;
                return Err(err);
            }
        };
        let subscription = NotificationSubscription::spawn(stream, Arc::clone(&self.router));
        let watcher = match self.gateway.watch_disconnect(&handle).await {
            Ok(watcher) => watcher,
            Err(err) => {
                drop(subscription);
                self.gateway.disconnect(&handle).await;
                return Err(err);
            }
        };
        tracing::info!(peripheral = %peripheral, "link ready");
        Ok(ActiveLink {
            handle,
            subscription,
            watcher: Some(watcher),
        })
    }

    /// Cancel the subscription, drop the watcher and close the link.
    async fn release_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.subscription.cancel();
            drop(link.watcher.take());
            self.gateway.disconnect(&link.handle).await;
        }
    }

    async fn on_link_lost(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };
        link.subscription.cancel();

        let auto_reconnect = self.config.auto_reconnect;
        let ConnectionState::Ready(lost) = self.current() else {
            return;
        };
        tracing::warn!(peripheral = %lost.id, auto_reconnect, "link lost");

        if !auto_reconnect {
            let _ = self.transition(SessionEvent::UnexpectedDisconnect {
                auto_reconnect: false,
            });
            return;
        }

        let target = match self.store.last_peripheral().await {
            Ok(Some(id)) if id != lost.id => PeripheralRef::from_id(id),
            Ok(_) => lost.clone(),
            Err(err) => {
                tracing::warn!(%err, "failed to read remembered peripheral, reusing link id");
                lost.clone()
            }
        };
        if self
            .transition(SessionEvent::UnexpectedDisconnect {
                auto_reconnect: true,
            })
            .is_err()
        {
            return;
        }
        if target != lost {
            self.set_state(ConnectionState::Reconnecting(target.clone()));
        }
        tracing::info!(peripheral = %target.id, "reconnecting");
        // Single attempt; Failed waits for an explicit reconnect.
        let _ = self.establish(&target).await;
    }

    fn ready_handle(&self) -> Result<G::Handle, SessionError> {
        match (&self.link, self.current()) {
            (Some(link), ConnectionState::Ready(_)) => Ok(link.handle.clone()),
            (_, state) => {
                tracing::warn!(state = state.name(), "command dropped, session not ready");
                Err(SessionError::NotReady {
                    state: state.name(),
                })
            }
        }
    }

    async fn send(&mut self, command: &RfCommand) -> Result<(), SessionError> {
        let handle = self.ready_handle()?;
        let payload = codec::encode_command(command)?;
        self.gateway
            .write(&handle, self.profile.write_characteristic, &payload)
            .await?;
        tracing::info!(code = %command.code(), band = %command.band(), "command sent");
        Ok(())
    }

    async fn burst(&mut self, command: &RfCommand) -> Result<BurstReport, SessionError> {
        let handle = self.ready_handle()?;
        let payload = codec::encode_command(command)?;
        let mut report = BurstReport::default();
        for attempt in 1..=self.config.rapid_send_count {
            report.attempted += 1;
            match self
                .gateway
                .write(&handle, self.profile.write_characteristic, &payload)
                .await
            {
                Ok(()) => report.accepted += 1,
                Err(err) => tracing::warn!(attempt, %err, "burst write rejected"),
            }
        }
        tracing::info!(
            code = %command.code(),
            attempted = report.attempted,
            accepted = report.accepted,
            "burst sent"
        );
        Ok(report)
    }

    async fn teardown(&mut self) {
        if self.scan.take().is_some() {
            self.gateway.stop_discovery().await;
        }
        self.release_link().await;
        self.set_state(ConnectionState::Idle);
    }
}

async fn next_discovery(scan: &mut Option<ActiveScan>) -> Option<PeripheralRef> {
    let Some(scan) = scan else {
        return std::future::pending().await;
    };
    tokio::time::timeout_at(scan.deadline, scan.stream.next())
        .await
        .ok()
        .flatten()
}

/// Resolves when the Ready link drops without being asked to.
async fn link_lost<H>(link: &mut Option<ActiveLink<H>>) {
    if let Some(watcher) = link.as_mut().and_then(|l| l.watcher.as_mut()) {
        if watcher.await.is_ok() {
            return;
        }
        // Watcher went away without firing.
        if let Some(l) = link.as_mut() {
            l.watcher = None;
        }
    }
    std::future::pending::<()>().await;
}
