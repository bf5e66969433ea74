//! `SQLite` implementation of [`SessionStore`].

use std::future::Future;

use rfremote_app::ports::SessionStore;
use rfremote_app::ports::session_store::LAST_CONNECTED_PERIPHERAL_KEY;
use rfremote_domain::error::StorageError;
use rfremote_domain::id::PeripheralId;

use crate::kv::SqliteKeyValueStore;

/// Remembers the last connected peripheral under
/// `last_connected_peripheral_id`.
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    kv: SqliteKeyValueStore,
}

impl SqliteSessionStore {
    #[must_use]
    pub fn new(kv: SqliteKeyValueStore) -> Self {
        Self { kv }
    }
}

impl SessionStore for SqliteSessionStore {
    fn last_peripheral(
        &self,
    ) -> impl Future<Output = Result<Option<PeripheralId>, StorageError>> + Send {
        let kv = self.kv.clone();
        async move {
            let value = kv.get(LAST_CONNECTED_PERIPHERAL_KEY).await?;
            Ok(value.filter(|v| !v.is_empty()).map(PeripheralId::new))
        }
    }

    fn remember_peripheral(
        &self,
        id: &PeripheralId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        let kv = self.kv.clone();
        let id = id.clone();
        async move {
            kv.set(LAST_CONNECTED_PERIPHERAL_KEY, id.as_str()).await?;
            tracing::debug!(peripheral = %id, "peripheral remembered");
            Ok(())
        }
    }

    fn forget_peripheral(&self) -> impl Future<Output = Result<(), StorageError>> + Send {
        let kv = self.kv.clone();
        async move {
            kv.remove(LAST_CONNECTED_PERIPHERAL_KEY).await?;
            Ok(())
        }
    }
}
