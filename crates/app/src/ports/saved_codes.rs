//! Saved codes port — persistence for user-named codes.

use std::future::Future;

use rfremote_domain::error::StorageError;
use rfremote_domain::saved_code::SavedCodeRecord;

/// Key under which the saved code list is stored as a JSON array.
pub const SAVED_CODES_KEY: &str = "saved_codes";

/// Loads and stores the whole saved code list.
///
/// The list is small and always rewritten as a unit, matching the single
/// JSON document it is stored as.
pub trait SavedCodeRepository: Send + Sync {
    fn load(&self) -> impl Future<Output = Result<Vec<SavedCodeRecord>, StorageError>> + Send;

    fn store(
        &self,
        records: &[SavedCodeRecord],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}
