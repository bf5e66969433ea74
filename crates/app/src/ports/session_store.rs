//! Session store port — remembers the last connected peripheral.

use std::future::Future;

use rfremote_domain::error::StorageError;
use rfremote_domain::id::PeripheralId;

/// Key under which the last connected peripheral id is stored.
pub const LAST_CONNECTED_PERIPHERAL_KEY: &str = "last_connected_peripheral_id";

/// Persists the identifier used for auto-reconnect and startup restore.
pub trait SessionStore: Send + Sync + 'static {
    /// The last peripheral a connection succeeded to, if any.
    fn last_peripheral(
        &self,
    ) -> impl Future<Output = Result<Option<PeripheralId>, StorageError>> + Send;

    /// Remember `id` as the last connected peripheral.
    fn remember_peripheral(
        &self,
        id: &PeripheralId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Forget the last connected peripheral.
    fn forget_peripheral(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}
