//! Saved code service — use-cases for the user's named codes.
//!
//! The list is read, changed and written back as a whole on every call.
//! Mutations are serialized so two concurrent edits never lose each other.

use tokio::sync::Mutex;

use rfremote_domain::error::{StorageError, ValidationError};
use rfremote_domain::id::SniffedCodeId;
use rfremote_domain::rf_command::RfCommand;
use rfremote_domain::saved_code::{SavedCodeRecord, SavedCodes};

use crate::ports::SavedCodeRepository;
use crate::router::{NotificationRouter, RouterError};

/// Errors from [`SavedCodeService`].
#[derive(Debug, thiserror::Error)]
pub enum SavedCodeError {
    #[error("Validation error")]
    Validation(#[from] ValidationError),

    #[error("Storage error")]
    Storage(#[from] StorageError),

    #[error("Router error")]
    Router(#[from] RouterError),
}

/// Application service for the saved code list.
pub struct SavedCodeService<R> {
    repo: R,
    write: Mutex<()>,
}

impl<R: SavedCodeRepository> SavedCodeService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            write: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<SavedCodes, SavedCodeError> {
        Ok(SavedCodes::new(self.repo.load().await?))
    }

    async fn save(&self, codes: &SavedCodes) -> Result<(), SavedCodeError> {
        self.repo.store(codes.as_slice()).await?;
        Ok(())
    }

    /// All saved codes in display order.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list(&self) -> Result<Vec<SavedCodeRecord>, SavedCodeError> {
        Ok(self.load().await?.into_vec())
    }

    /// Append a record; it gets the next sort position.
    ///
    /// # Errors
    ///
    /// Returns [`SavedCodeError::Validation`] if invariants fail, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self, record), fields(alias = %record.alias))]
    pub async fn add(&self, record: SavedCodeRecord) -> Result<SavedCodeRecord, SavedCodeError> {
        let _guard = self.write.lock().await;
        let mut codes = self.load().await?;
        let added = codes.push(record)?.clone();
        self.save(&codes).await?;
        tracing::info!(sort_order = added.sort_order, "saved code added");
        Ok(added)
    }

    /// Replace the record at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`SavedCodeError::Validation`] for an unknown position or an
    /// invalid record, or a storage error from the repository.
    #[tracing::instrument(skip(self, record))]
    pub async fn update(
        &self,
        position: usize,
        record: SavedCodeRecord,
    ) -> Result<SavedCodeRecord, SavedCodeError> {
        let _guard = self.write.lock().await;
        let mut codes = self.load().await?;
        let updated = codes.replace(position, record)?.clone();
        self.save(&codes).await?;
        Ok(updated)
    }

    /// Delete the record at `position`; later records move up.
    ///
    /// # Errors
    ///
    /// Returns [`SavedCodeError::Validation`] for an unknown position, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, position: usize) -> Result<SavedCodeRecord, SavedCodeError> {
        let _guard = self.write.lock().await;
        let mut codes = self.load().await?;
        let removed = codes.remove(position)?;
        self.save(&codes).await?;
        tracing::info!(alias = %removed.alias, "saved code removed");
        Ok(removed)
    }

    /// Move a record to a new position and renumber the list.
    ///
    /// # Errors
    ///
    /// Returns [`SavedCodeError::Validation`] for an unknown position, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn move_to(&self, from: usize, to: usize) -> Result<(), SavedCodeError> {
        let _guard = self.write.lock().await;
        let mut codes = self.load().await?;
        codes.move_to(from, to)?;
        self.save(&codes).await
    }

    /// Flip the favourite flag, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns [`SavedCodeError::Validation`] for an unknown position, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_favorite(&self, position: usize) -> Result<bool, SavedCodeError> {
        let _guard = self.write.lock().await;
        let mut codes = self.load().await?;
        let favorite = codes.toggle_favorite(position)?;
        self.save(&codes).await?;
        Ok(favorite)
    }

    /// Promote a pending sniffed code and append it to the saved list.
    ///
    /// When the list cannot be stored the code goes back to the pending list.
    ///
    /// # Errors
    ///
    /// Returns [`SavedCodeError::Router`] for an unknown code or blank alias,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self, router))]
    pub async fn promote_and_save(
        &self,
        router: &NotificationRouter,
        id: SniffedCodeId,
        alias: &str,
    ) -> Result<SavedCodeRecord, SavedCodeError> {
        let _guard = self.write.lock().await;
        let mut codes = self.load().await?;
        let sniffed = router
            .pending()
            .into_iter()
            .find(|c| c.id == id)
            .ok_or(RouterError::UnknownCode(id))?;
        let record = router.promote(id, alias)?;
        let added = match codes.push(record) {
            Ok(added) => added.clone(),
            Err(err) => {
                router.restore(sniffed);
                return Err(err.into());
            }
        };
        if let Err(err) = self.save(&codes).await {
            tracing::warn!(%id, "saving promoted code failed, returning it to pending");
            router.restore(sniffed);
            return Err(err);
        }
        Ok(added)
    }

    /// The command to transmit for the record at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`SavedCodeError::Validation`] for an unknown position, or a
    /// storage error from the repository.
    pub async fn command_at(&self, position: usize) -> Result<RfCommand, SavedCodeError> {
        let codes = self.load().await?;
        codes
            .get(position)
            .map(SavedCodeRecord::command)
            .ok_or_else(|| ValidationError::UnknownPosition(position).into())
    }
}
