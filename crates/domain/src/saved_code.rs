//! Saved codes — user-named codes kept for replay.
//!
//! Records are stored as one JSON array under the `saved_codes` key, using
//! the field names the mobile app has always written (`Code`, `Alias`,
//! `Freq`, ...), so existing stores stay readable.

use serde::{Deserialize, Serialize};

use crate::band::FrequencyBand;
use crate::error::ValidationError;
use crate::rf_command::RfCommand;
use crate::sniffed_code::SniffedCode;

/// Repeat count given to codes that were captured rather than typed in.
pub const DEFAULT_REPEAT: u32 = 1;

/// A persisted, user-named RF code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCodeRecord {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Alias")]
    pub alias: String,
    #[serde(rename = "Freq")]
    pub band: FrequencyBand,
    #[serde(rename = "Protocol")]
    pub protocol: u8,
    #[serde(rename = "SortId")]
    pub sort_order: u32,
    #[serde(rename = "Repeat", default = "default_repeat")]
    pub repeat: u32,
    #[serde(rename = "Favorite", default)]
    pub favorite: bool,
}

fn default_repeat() -> u32 {
    DEFAULT_REPEAT
}

impl SavedCodeRecord {
    /// Name a transmit command.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the alias is blank or the command is
    /// not encodable.
    pub fn from_command(command: &RfCommand, alias: &str) -> Result<Self, ValidationError> {
        let record = Self {
            code: command.code().to_string(),
            alias: alias.trim().to_string(),
            band: command.band(),
            protocol: command.protocol(),
            sort_order: 0,
            repeat: command.repeat(),
            favorite: false,
        };
        record.validate()?;
        Ok(record)
    }

    /// Name a sniffed capture.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the alias is blank or the capture
    /// cannot be replayed.
    pub fn from_sniffed(code: &SniffedCode, alias: &str) -> Result<Self, ValidationError> {
        Self::from_command(&code.to_command(DEFAULT_REPEAT), alias)
    }

    /// The transmit command this record replays.
    #[must_use]
    pub fn command(&self) -> RfCommand {
        RfCommand::new(self.code.clone(), self.band, self.protocol, self.repeat)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyAlias`] or [`ValidationError::Command`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.alias.trim().is_empty() {
            return Err(ValidationError::EmptyAlias);
        }
        self.command().validate()?;
        Ok(())
    }
}

/// Ordered collection of saved codes.
///
/// Keeps `sort_order` equal to each record's position after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedCodes(Vec<SavedCodeRecord>);

impl SavedCodes {
    /// Wrap stored records, ordering them by their stored `sort_order`.
    #[must_use]
    pub fn new(mut records: Vec<SavedCodeRecord>) -> Self {
        records.sort_by_key(|r| r.sort_order);
        let mut codes = Self(records);
        codes.renumber();
        codes
    }

    #[must_use]
    pub fn as_slice(&self) -> &[SavedCodeRecord] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<SavedCodeRecord> {
        self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&SavedCodeRecord> {
        self.0.get(position)
    }

    /// Append a record at the end of the list.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the record is invalid.
    pub fn push(&mut self, mut record: SavedCodeRecord) -> Result<&SavedCodeRecord, ValidationError> {
        record.validate()?;
        record.sort_order = u32::try_from(self.0.len()).unwrap_or(u32::MAX);
        self.0.push(record);
        Ok(&self.0[self.0.len() - 1])
    }

    /// Replace the record at `position`, keeping its place in the list.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the position is unknown or the record
    /// is invalid.
    pub fn replace(
        &mut self,
        position: usize,
        mut record: SavedCodeRecord,
    ) -> Result<&SavedCodeRecord, ValidationError> {
        record.validate()?;
        let slot = self
            .0
            .get_mut(position)
            .ok_or(ValidationError::UnknownPosition(position))?;
        record.sort_order = slot.sort_order;
        *slot = record;
        Ok(slot)
    }

    /// Remove and return the record at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownPosition`] when out of range.
    pub fn remove(&mut self, position: usize) -> Result<SavedCodeRecord, ValidationError> {
        if position >= self.0.len() {
            return Err(ValidationError::UnknownPosition(position));
        }
        let removed = self.0.remove(position);
        self.renumber();
        Ok(removed)
    }

    /// Move the record at `from` so it ends up at `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownPosition`] when either index is out
    /// of range.
    pub fn move_to(&mut self, from: usize, to: usize) -> Result<(), ValidationError> {
        let len = self.0.len();
        if from >= len {
            return Err(ValidationError::UnknownPosition(from));
        }
        if to >= len {
            return Err(ValidationError::UnknownPosition(to));
        }
        let record = self.0.remove(from);
        self.0.insert(to, record);
        self.renumber();
        Ok(())
    }

    /// Flip the favourite flag, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownPosition`] when out of range.
    pub fn toggle_favorite(&mut self, position: usize) -> Result<bool, ValidationError> {
        let record = self
            .0
            .get_mut(position)
            .ok_or(ValidationError::UnknownPosition(position))?;
        record.favorite = !record.favorite;
        Ok(record.favorite)
    }

    fn renumber(&mut self) {
        for (index, record) in self.0.iter_mut().enumerate() {
            record.sort_order = u32::try_from(index).unwrap_or(u32::MAX);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(alias: &str) -> SavedCodeRecord {
        SavedCodeRecord::from_command(&RfCommand::new("1234", FrequencyBand::High, 1, 1), alias)
            .unwrap()
    }

    #[test]
    fn should_reject_blank_alias() {
        let cmd = RfCommand::new("1234", FrequencyBand::High, 1, 1);
        let result = SavedCodeRecord::from_command(&cmd, "   ");
        assert_eq!(result, Err(ValidationError::EmptyAlias));
    }

    #[test]
    fn should_trim_alias() {
        assert_eq!(record("  Garage  ").alias, "Garage");
    }

    #[test]
    fn should_promote_sniffed_code_with_default_repeat() {
        let code = SniffedCode::new("21654", FrequencyBand::Low, 2);
        let rec = SavedCodeRecord::from_sniffed(&code, "Gate").unwrap();
        assert_eq!(rec.code, "21654");
        assert_eq!(rec.band, FrequencyBand::Low);
        assert_eq!(rec.protocol, 2);
        assert_eq!(rec.repeat, DEFAULT_REPEAT);
        assert!(!rec.favorite);
    }

    #[test]
    fn should_serialize_with_stored_field_names() {
        let json = serde_json::to_value(record("Gate")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Code": "1234",
                "Alias": "Gate",
                "Freq": 443,
                "Protocol": 1,
                "SortId": 0,
                "Repeat": 1,
                "Favorite": false,
            })
        );
    }

    #[test]
    fn should_read_records_without_repeat_or_favorite() {
        let json = r#"{"Code":"99","Alias":"Old","Freq":315,"Protocol":3,"SortId":4}"#;
        let rec: SavedCodeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.band, FrequencyBand::Low);
        assert_eq!(rec.repeat, 1);
        assert!(!rec.favorite);
    }

    #[test]
    fn should_assign_sort_order_on_push() {
        let mut codes = SavedCodes::default();
        codes.push(record("a")).unwrap();
        let second = codes.push(record("b")).unwrap();
        assert_eq!(second.sort_order, 1);
    }

    #[test]
    fn should_order_and_renumber_stored_records() {
        let mut a = record("a");
        a.sort_order = 7;
        let mut b = record("b");
        b.sort_order = 2;
        let codes = SavedCodes::new(vec![a, b]);
        let aliases: Vec<_> = codes.as_slice().iter().map(|r| (r.alias.as_str(), r.sort_order)).collect();
        assert_eq!(aliases, vec![("b", 0), ("a", 1)]);
    }

    #[test]
    fn should_move_and_renumber() {
        let mut codes = SavedCodes::default();
        for alias in ["a", "b", "c"] {
            codes.push(record(alias)).unwrap();
        }
        codes.move_to(2, 0).unwrap();
        let order: Vec<_> = codes.as_slice().iter().map(|r| r.alias.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert!(codes.as_slice().iter().enumerate().all(|(i, r)| r.sort_order as usize == i));
    }

    #[test]
    fn should_renumber_after_remove() {
        let mut codes = SavedCodes::default();
        for alias in ["a", "b", "c"] {
            codes.push(record(alias)).unwrap();
        }
        let removed = codes.remove(0).unwrap();
        assert_eq!(removed.alias, "a");
        assert_eq!(codes.get(0).unwrap().sort_order, 0);
        assert_eq!(codes.get(1).unwrap().alias, "c");
        assert_eq!(codes.get(1).unwrap().sort_order, 1);
    }

    #[test]
    fn should_reject_unknown_position() {
        let mut codes = SavedCodes::default();
        assert_eq!(codes.remove(0), Err(ValidationError::UnknownPosition(0)));
        assert_eq!(codes.toggle_favorite(3), Err(ValidationError::UnknownPosition(3)));
    }

    #[test]
    fn should_toggle_favorite() {
        let mut codes = SavedCodes::default();
        codes.push(record("a")).unwrap();
        assert!(codes.toggle_favorite(0).unwrap());
        assert!(!codes.toggle_favorite(0).unwrap());
    }

    #[test]
    fn should_keep_sort_order_on_replace() {
        let mut codes = SavedCodes::default();
        codes.push(record("a")).unwrap();
        codes.push(record("b")).unwrap();
        let replaced = codes.replace(1, record("renamed")).unwrap();
        assert_eq!(replaced.alias, "renamed");
        assert_eq!(replaced.sort_order, 1);
    }
}
