//! Notification router — turns inbound payloads into pending sniffed codes.
//!
//! Every payload from the Ready link's notification stream lands in
//! [`NotificationRouter::ingest`]. Decodable payloads become [`SniffedCode`]s
//! in the pending list (deduplicated on `raw`); undecodable ones are dropped
//! and reported. Malformed frames are routine on a noisy link, so a decode
//! failure is never an error for the caller.
//!
//! All mutations of the pending list happen under one lock, so a promote or
//! clear racing with a notification never loses or duplicates an entry.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use tokio::sync::broadcast;

use rfremote_domain::error::{DecodeError, ValidationError};
use rfremote_domain::id::SniffedCodeId;
use rfremote_domain::saved_code::SavedCodeRecord;
use rfremote_domain::sniffed_code::SniffedCode;

use crate::codec;

/// Router tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Number of raw payloads kept for the telemetry log.
    pub telemetry_capacity: usize,
    /// Buffer of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            telemetry_capacity: 50,
            event_capacity: 64,
        }
    }
}

/// Something observers of the router may care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// Raw payload text, for every notification received.
    Telemetry(String),
    /// A new code was added to the pending list.
    Sniffed(SniffedCode),
    /// A payload could not be decoded and was dropped.
    Malformed { payload: String, error: DecodeError },
}

/// What [`NotificationRouter::ingest`] did with a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    Added(SniffedCode),
    Duplicate(SniffedCodeId),
    Dropped(DecodeError),
}

/// Errors from [`NotificationRouter::promote`].
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// No pending code has this id.
    #[error("no pending sniffed code {0}")]
    UnknownCode(SniffedCodeId),

    /// The record built from the code is invalid.
    #[error("invalid saved code")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Default)]
struct RouterState {
    pending: Vec<SniffedCode>,
    recent: VecDeque<String>,
}

/// Owner of the pending sniffed code list.
#[derive(Debug)]
pub struct NotificationRouter {
    state: Mutex<RouterState>,
    events: broadcast::Sender<NotificationEvent>,
    telemetry_capacity: usize,
}

impl NotificationRouter {
    #[must_use]
    pub fn new(config: &RouterConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            state: Mutex::new(RouterState::default()),
            events,
            telemetry_capacity: config.telemetry_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: NotificationEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Subscribe to router events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }

    /// Route one inbound payload.
    pub fn ingest(&self, payload: &[u8]) -> Ingested {
        let text = String::from_utf8_lossy(payload).into_owned();
        tracing::trace!(payload = %text, "notification received");

        let decoded = codec::decode_notification(payload);

        let outcome = {
            let mut state = self.lock();
            if self.telemetry_capacity > 0 {
                if state.recent.len() == self.telemetry_capacity {
                    state.recent.pop_back();
                }
                state.recent.push_front(text.clone());
            }
            match decoded {
                Ok(code) => {
                    if state.pending.iter().any(|c| c.raw == code.raw) {
                        Ingested::Duplicate(code.id)
                    } else {
                        state.pending.push(code.clone());
                        Ingested::Added(code)
                    }
                }
                Err(error) => Ingested::Dropped(error),
            }
        };

        self.publish(NotificationEvent::Telemetry(text.clone()));
        match &outcome {
            Ingested::Added(code) => {
                tracing::info!(raw = %code.raw, band = %code.band, protocol = code.protocol, "sniffed code");
                self.publish(NotificationEvent::Sniffed(code.clone()));
            }
            Ingested::Duplicate(id) => {
                tracing::debug!(%id, "duplicate sniffed code ignored");
            }
            Ingested::Dropped(error) => {
                tracing::debug!(payload = %text, %error, "malformed notification dropped");
                self.publish(NotificationEvent::Malformed {
                    payload: text,
                    error: error.clone(),
                });
            }
        }
        outcome
    }

    /// Pending codes in arrival order.
    #[must_use]
    pub fn pending(&self) -> Vec<SniffedCode> {
        self.lock().pending.clone()
    }

    /// Most recent raw payloads, newest first.
    #[must_use]
    pub fn recent_payloads(&self) -> Vec<String> {
        self.lock().recent.iter().cloned().collect()
    }

    /// Remove a pending code and turn it into a record for the saved list.
    ///
    /// The returned record has `sort_order` 0; the saved code list assigns
    /// the real position when it is appended. The code stays pending when
    /// the alias is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownCode`] or [`RouterError::Validation`].
    pub fn promote(&self, id: SniffedCodeId, alias: &str) -> Result<SavedCodeRecord, RouterError> {
        let mut state = self.lock();
        let position = state
            .pending
            .iter()
            .position(|c| c.id == id)
            .ok_or(RouterError::UnknownCode(id))?;
        let record = SavedCodeRecord::from_sniffed(&state.pending[position], alias)?;
        state.pending.remove(position);
        tracing::info!(%id, alias = %record.alias, "sniffed code promoted");
        Ok(record)
    }

    /// Put a code back at the end of the pending list, unless an entry with
    /// the same `raw` arrived meanwhile.
    pub fn restore(&self, code: SniffedCode) {
        let mut state = self.lock();
        if !state.pending.iter().any(|c| c.raw == code.raw) {
            state.pending.push(code);
        }
    }

    /// Drop every pending code, returning how many were removed.
    pub fn clear_all(&self) -> usize {
        let mut state = self.lock();
        let count = state.pending.len();
        state.pending.clear();
        tracing::info!(count, "pending sniffed codes cleared");
        count
    }
}

impl Default for NotificationRouter {
    fn default() -> Self {
        Self::new(&RouterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rfremote_domain::band::FrequencyBand;

    #[test]
    fn should_add_decoded_code_to_pending() {
        let router = NotificationRouter::default();
        let outcome = router.ingest(b"21654,1,2");
        assert!(matches!(outcome, Ingested::Added(ref c) if c.raw == "21654"));
        assert_eq!(router.pending().len(), 1);
    }

    #[test]
    fn should_collapse_duplicate_raw_values() {
        let router = NotificationRouter::default();
        router.ingest(b"21654,1,2");
        let second = router.ingest(br#"{"raw":"21654","Freq":443,"Protocol":2}"#);
        assert!(matches!(second, Ingested::Duplicate(_)));
        let pending = router.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].band, FrequencyBand::Low);
    }

    #[test]
    fn should_keep_arrival_order() {
        let router = NotificationRouter::default();
        router.ingest(b"3,1,1");
        router.ingest(b"1,1,1");
        router.ingest(b"2,1,1");
        let raws: Vec<_> = router.pending().into_iter().map(|c| c.raw).collect();
        assert_eq!(raws, vec!["3", "1", "2"]);
    }

    #[test]
    fn should_drop_malformed_payload_without_touching_pending() {
        let router = NotificationRouter::default();
        let outcome = router.ingest(br#"{"raw":"1","Freq":0,"Protocol":1}"#);
        assert_eq!(outcome, Ingested::Dropped(DecodeError::MissingFrequency));
        assert!(router.pending().is_empty());
    }

    #[tokio::test]
    async fn should_report_malformed_payload_to_subscribers() {
        let router = NotificationRouter::default();
        let mut events = router.subscribe();
        router.ingest(b"garbage");

        let first = events.recv().await.unwrap();
        assert_eq!(first, NotificationEvent::Telemetry("garbage".to_string()));
        let second = events.recv().await.unwrap();
        assert!(matches!(
            second,
            NotificationEvent::Malformed { error: DecodeError::FieldCount(1), .. }
        ));
    }

    #[tokio::test]
    async fn should_publish_sniffed_event_once_per_new_code() {
        let router = NotificationRouter::default();
        let mut events = router.subscribe();
        router.ingest(b"7,2,1");
        router.ingest(b"7,2,1");

        let mut sniffed = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, NotificationEvent::Sniffed(_)) {
                sniffed += 1;
            }
        }
        assert_eq!(sniffed, 1);
    }

    #[test]
    fn should_keep_bounded_telemetry_newest_first() {
        let router = NotificationRouter::new(&RouterConfig {
            telemetry_capacity: 2,
            event_capacity: 4,
        });
        router.ingest(b"1,1,1");
        router.ingest(b"2,1,1");
        router.ingest(b"3,1,1");
        assert_eq!(router.recent_payloads(), vec!["3,1,1", "2,1,1"]);
    }

    #[test]
    fn should_promote_and_remove_from_pending() {
        let router = NotificationRouter::default();
        router.ingest(b"21654,1,2");
        let id = router.pending()[0].id;

        let record = router.promote(id, "Gate").unwrap();
        assert_eq!(record.alias, "Gate");
        assert_eq!(record.code, "21654");
        assert!(router.pending().is_empty());
    }

    #[test]
    fn should_allow_same_code_again_after_promotion() {
        let router = NotificationRouter::default();
        router.ingest(b"21654,1,2");
        let id = router.pending()[0].id;
        router.promote(id, "Gate").unwrap();

        assert!(matches!(router.ingest(b"21654,1,2"), Ingested::Added(_)));
    }

    #[test]
    fn should_keep_code_pending_when_alias_is_blank() {
        let router = NotificationRouter::default();
        router.ingest(b"21654,1,2");
        let id = router.pending()[0].id;

        let result = router.promote(id, "  ");
        assert!(matches!(
            result,
            Err(RouterError::Validation(ValidationError::EmptyAlias))
        ));
        assert_eq!(router.pending().len(), 1);
    }

    #[test]
    fn should_reject_promoting_unknown_code() {
        let router = NotificationRouter::default();
        let id = SniffedCodeId::from_raw("nope");
        assert!(matches!(
            router.promote(id, "x"),
            Err(RouterError::UnknownCode(got)) if got == id
        ));
    }

    #[test]
    fn should_clear_all_pending_codes() {
        let router = NotificationRouter::default();
        router.ingest(b"1,1,1");
        router.ingest(b"2,1,1");
        assert_eq!(router.clear_all(), 2);
        assert!(router.pending().is_empty());
    }

    #[test]
    fn should_not_restore_code_already_pending_again() {
        let router = NotificationRouter::default();
        router.ingest(b"1,1,1");
        let code = router.pending()[0].clone();
        router.restore(code);
        assert_eq!(router.pending().len(), 1);
    }

    #[test]
    fn should_serialize_concurrent_ingest_and_clear() {
        let router = std::sync::Arc::new(NotificationRouter::default());
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let router = std::sync::Arc::clone(&router);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        router.ingest(format!("{t}-{i},1,1").as_bytes());
                        router.ingest(format!("{t}-{i},1,1").as_bytes());
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(router.pending().len(), 200);
    }

    #[test]
    fn should_format_for_debugging() {
        let router = NotificationRouter::default();
        router.ingest(b"1,1,1");
        let text = format!("{router:?}");
        assert!(text.contains("NotificationRouter"));
        assert!(text.contains("telemetry_capacity"));
    }
}
