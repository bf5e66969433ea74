//! # rfremote-app
//!
//! Application layer — command codec, **port definitions** (traits) and the
//! connection session that drives them.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RadioGateway` — discover, connect, write, subscribe, watch for drops
//!   - `SessionStore` — remember the last connected peripheral
//!   - `SavedCodeRepository` — load and store the saved code list
//! - Provide the **driving side**:
//!   - `ConnectionSession` / `SessionHandle` — the one link and its state machine
//!   - `NotificationRouter` — inbound payloads to pending sniffed codes
//!   - `SavedCodeService` — manage user-named codes
//! - Encode and decode the text protocol spoken with the peripheral (`codec`)
//!
//! ## Dependency rule
//! Depends on `rfremote-domain` only (plus `tokio` for tasks and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod codec;
pub mod ports;
pub mod router;
pub mod services;
pub mod session;
pub mod subscription;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
