//! Connection state machine.
//!
//! [`ConnectionState::apply`] is the single place where the legal
//! transitions are written down. The session actor in the `app` crate
//! performs the side effects (scan, connect, subscribe, ...) and feeds the
//! outcome back in as a [`SessionEvent`].

use crate::error::ConnectError;
use crate::peripheral::PeripheralRef;

/// State of the one link the session manages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Scanning,
    Connecting(PeripheralRef),
    Ready(PeripheralRef),
    Reconnecting(PeripheralRef),
    Failed(PeripheralRef, ConnectError),
}

/// Something that happened to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ScanRequested,
    ScanEnded,
    SelectRequested(PeripheralRef),
    ConnectSucceeded,
    ConnectFailed(ConnectError),
    DisconnectRequested,
    UnexpectedDisconnect { auto_reconnect: bool },
}

/// An event that is not legal in the current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot handle {event} while {state}")]
pub struct InvalidTransition {
    pub state: &'static str,
    pub event: &'static str,
}

impl ConnectionState {
    /// Short name of the state, for logs and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Connecting(_) => "connecting",
            Self::Ready(_) => "ready",
            Self::Reconnecting(_) => "reconnecting",
            Self::Failed(..) => "failed",
        }
    }

    /// The peripheral this state refers to, if any.
    #[must_use]
    pub fn peripheral(&self) -> Option<&PeripheralRef> {
        match self {
            Self::Idle | Self::Scanning => None,
            Self::Connecting(p) | Self::Ready(p) | Self::Reconnecting(p) | Self::Failed(p, _) => {
                Some(p)
            }
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Compute the state that follows `event`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when `event` is not legal in this state.
    /// Connecting to a new peripheral while [`Ready`](Self::Ready) is not
    /// legal: the caller must disconnect first.
    pub fn apply(&self, event: SessionEvent) -> Result<Self, InvalidTransition> {
        let next = match (self, event) {
            (Self::Idle | Self::Failed(..), SessionEvent::ScanRequested) => Self::Scanning,
            (Self::Scanning, SessionEvent::ScanEnded) => Self::Idle,
            (
                Self::Idle | Self::Scanning | Self::Failed(..),
                SessionEvent::SelectRequested(peripheral),
            ) => Self::Connecting(peripheral),
            (Self::Connecting(p) | Self::Reconnecting(p), SessionEvent::ConnectSucceeded) => {
                Self::Ready(p.clone())
            }
            (Self::Connecting(p) | Self::Reconnecting(p), SessionEvent::ConnectFailed(err)) => {
                Self::Failed(p.clone(), err)
            }
            (
                Self::Idle | Self::Scanning | Self::Ready(_) | Self::Failed(..),
                SessionEvent::DisconnectRequested,
            ) => Self::Idle,
            (Self::Ready(p), SessionEvent::UnexpectedDisconnect { auto_reconnect }) => {
                if auto_reconnect {
                    Self::Reconnecting(p.clone())
                } else {
                    Self::Idle
                }
            }
            (state, event) => {
                return Err(InvalidTransition {
                    state: state.name(),
                    event: event.name(),
                });
            }
        };
        Ok(next)
    }
}

impl SessionEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ScanRequested => "scan request",
            Self::ScanEnded => "scan end",
            Self::SelectRequested(_) => "select request",
            Self::ConnectSucceeded => "connect success",
            Self::ConnectFailed(_) => "connect failure",
            Self::DisconnectRequested => "disconnect request",
            Self::UnexpectedDisconnect { .. } => "unexpected disconnect",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle | Self::Scanning => f.write_str(self.name()),
            Self::Failed(p, err) => write!(f, "failed ({p}): {}", err.reason),
            Self::Connecting(p) | Self::Ready(p) | Self::Reconnecting(p) => {
                write!(f, "{} ({p})", self.name())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn esp() -> PeripheralRef {
        PeripheralRef::new("AA:BB:CC:DD:EE:01", Some("ESP32".to_string()))
    }

    #[test]
    fn should_start_idle() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }

    #[test]
    fn should_scan_from_idle_and_return_on_scan_end() {
        let scanning = ConnectionState::Idle
            .apply(SessionEvent::ScanRequested)
            .unwrap();
        assert_eq!(scanning, ConnectionState::Scanning);
        let idle = scanning.apply(SessionEvent::ScanEnded).unwrap();
        assert_eq!(idle, ConnectionState::Idle);
    }

    #[test]
    fn should_reject_scan_while_ready() {
        let err = ConnectionState::Ready(esp())
            .apply(SessionEvent::ScanRequested)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot handle scan request while ready");
    }

    #[test]
    fn should_walk_select_connect_ready() {
        let connecting = ConnectionState::Scanning
            .apply(SessionEvent::SelectRequested(esp()))
            .unwrap();
        assert_eq!(connecting, ConnectionState::Connecting(esp()));
        let ready = connecting.apply(SessionEvent::ConnectSucceeded).unwrap();
        assert_eq!(ready, ConnectionState::Ready(esp()));
    }

    #[test]
    fn should_fail_and_stay_connectable() {
        let err = ConnectError::new("timeout");
        let failed = ConnectionState::Connecting(esp())
            .apply(SessionEvent::ConnectFailed(err.clone()))
            .unwrap();
        assert_eq!(failed, ConnectionState::Failed(esp(), err));
        let retry = failed.apply(SessionEvent::SelectRequested(esp())).unwrap();
        assert_eq!(retry, ConnectionState::Connecting(esp()));
    }

    #[test]
    fn should_require_disconnect_before_selecting_while_ready() {
        let ready = ConnectionState::Ready(esp());
        assert!(ready.apply(SessionEvent::SelectRequested(esp())).is_err());
        let idle = ready.apply(SessionEvent::DisconnectRequested).unwrap();
        assert!(idle.apply(SessionEvent::SelectRequested(esp())).is_ok());
    }

    #[test]
    fn should_reconnect_on_unexpected_disconnect_when_enabled() {
        let ready = ConnectionState::Ready(esp());
        let next = ready
            .apply(SessionEvent::UnexpectedDisconnect {
                auto_reconnect: true,
            })
            .unwrap();
        assert_eq!(next, ConnectionState::Reconnecting(esp()));
        let off = ready
            .apply(SessionEvent::UnexpectedDisconnect {
                auto_reconnect: false,
            })
            .unwrap();
        assert_eq!(off, ConnectionState::Idle);
    }

    #[test]
    fn should_fail_when_reconnect_fails() {
        let err = ConnectError::new("gone");
        let failed = ConnectionState::Reconnecting(esp())
            .apply(SessionEvent::ConnectFailed(err.clone()))
            .unwrap();
        assert_eq!(failed, ConnectionState::Failed(esp(), err));
    }

    #[test]
    fn should_ignore_unexpected_disconnect_outside_ready() {
        assert!(
            ConnectionState::Idle
                .apply(SessionEvent::UnexpectedDisconnect {
                    auto_reconnect: true
                })
                .is_err()
        );
    }

    #[test]
    fn should_expose_peripheral_for_linked_states() {
        assert!(ConnectionState::Idle.peripheral().is_none());
        assert_eq!(ConnectionState::Ready(esp()).peripheral(), Some(&esp()));
    }
}
