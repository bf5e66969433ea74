//! `SQLite` implementation of [`SavedCodeRepository`].

use std::future::Future;

use rfremote_app::ports::SavedCodeRepository;
use rfremote_app::ports::saved_codes::SAVED_CODES_KEY;
use rfremote_domain::error::StorageError;
use rfremote_domain::saved_code::SavedCodeRecord;

use crate::error::StorageError as SqliteStorageError;
use crate::kv::SqliteKeyValueStore;

/// Stores the saved code list as one JSON array under `saved_codes`.
#[derive(Debug, Clone)]
pub struct SqliteSavedCodeRepository {
    kv: SqliteKeyValueStore,
}

impl SqliteSavedCodeRepository {
    #[must_use]
    pub fn new(kv: SqliteKeyValueStore) -> Self {
        Self { kv }
    }
}

impl SavedCodeRepository for SqliteSavedCodeRepository {
    fn load(&self) -> impl Future<Output = Result<Vec<SavedCodeRecord>, StorageError>> + Send {
        let kv = self.kv.clone();
        async move {
            let Some(json) = kv.get(SAVED_CODES_KEY).await? else {
                return Ok(Vec::new());
            };
            let records: Vec<SavedCodeRecord> =
                serde_json::from_str(&json).map_err(SqliteStorageError::from)?;
            Ok(records)
        }
    }

    fn store(
        &self,
        records: &[SavedCodeRecord],
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        let kv = self.kv.clone();
        let json = serde_json::to_string(records);
        let count = records.len();
        async move {
            let json = json.map_err(SqliteStorageError::from)?;
            kv.set(SAVED_CODES_KEY, &json).await?;
            tracing::debug!(count, "saved codes stored");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;

    use rfremote_domain::band::FrequencyBand;
    use rfremote_domain::rf_command::RfCommand;

    async fn setup() -> (SqliteSavedCodeRepository, SqliteKeyValueStore) {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        let kv = SqliteKeyValueStore::new(db.pool().clone());
        (SqliteSavedCodeRepository::new(kv.clone()), kv)
    }

    fn record(alias: &str, sort_order: u32) -> SavedCodeRecord {
        let mut record = SavedCodeRecord::from_command(
            &RfCommand::new("21654", FrequencyBand::High, 2, 3),
            alias,
        )
        .unwrap();
        record.sort_order = sort_order;
        record
    }

    #[tokio::test]
    async fn should_load_empty_list_when_nothing_stored() {
        let (repo, _kv) = setup().await;
        assert!(repo.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_store_and_load_records() {
        let (repo, _kv) = setup().await;
        let records = vec![record("Gate", 0), record("Garage", 1)];

        repo.store(&records).await.unwrap();

        assert_eq!(repo.load().await.unwrap(), records);
    }

    #[tokio::test]
    async fn should_store_with_app_field_names() {
        let (repo, kv) = setup().await;
        repo.store(&[record("Gate", 0)]).await.unwrap();

        let json = kv.get(SAVED_CODES_KEY).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["Code"], "21654");
        assert_eq!(value[0]["Alias"], "Gate");
        assert_eq!(value[0]["Freq"], 443);
        assert_eq!(value[0]["SortId"], 0);
    }

    #[tokio::test]
    async fn should_read_records_written_without_optional_fields() {
        let (repo, kv) = setup().await;
        kv.set(
            SAVED_CODES_KEY,
            r#"[{"Code":"1234","Alias":"Old","Freq":315,"Protocol":1,"SortId":0}]"#,
        )
        .await
        .unwrap();

        let records = repo.load().await.unwrap();
        assert_eq!(records[0].band, FrequencyBand::Low);
        assert_eq!(records[0].repeat, 1);
        assert!(!records[0].favorite);
    }

    #[tokio::test]
    async fn should_report_corrupt_json_as_storage_error() {
        let (repo, kv) = setup().await;
        kv.set(SAVED_CODES_KEY, "not json").await.unwrap();
        assert!(repo.load().await.is_err());
    }
}
