//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the session layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod radio_gateway;
pub mod saved_codes;
pub mod session_store;

pub use radio_gateway::{DisconnectSignal, DiscoveryStream, NotificationStream, RadioGateway};
pub use saved_codes::SavedCodeRepository;
pub use session_store::SessionStore;
