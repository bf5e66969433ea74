//! Peripheral — a radio device found during a scan.

use serde::{Deserialize, Serialize};

use crate::id::PeripheralId;
use crate::time::{self, Timestamp};

/// A peripheral reported by discovery.
///
/// Ephemeral: a new value is created for every scan result. Only the
/// [`PeripheralId`] is ever persisted. Equality ignores `discovered_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeripheralRef {
    pub id: PeripheralId,
    pub name: Option<String>,
    pub discovered_at: Timestamp,
}

impl PeripheralRef {
    /// A peripheral discovered now.
    #[must_use]
    pub fn new(id: impl Into<PeripheralId>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            discovered_at: time::now(),
        }
    }

    /// A peripheral known only by its persisted identifier.
    #[must_use]
    pub fn from_id(id: PeripheralId) -> Self {
        Self::new(id, None)
    }

    /// Name if advertised, identifier otherwise.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.id.as_str())
    }
}

impl PartialEq for PeripheralRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl Eq for PeripheralRef {}

impl std::fmt::Display for PeripheralRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_label_with_name_when_advertised() {
        let p = PeripheralRef::new("AA:BB", Some("ESP32-RF".to_string()));
        assert_eq!(p.label(), "ESP32-RF");
        assert_eq!(p.to_string(), "ESP32-RF (AA:BB)");
    }

    #[test]
    fn should_compare_without_discovery_time() {
        let mut a = PeripheralRef::new("AA:BB", None);
        let b = PeripheralRef::new("AA:BB", None);
        a.discovered_at = a.discovered_at - chrono::Duration::seconds(30);
        assert_eq!(a, b);
    }

    #[test]
    fn should_label_with_id_when_unnamed() {
        let p = PeripheralRef::from_id(PeripheralId::new("AA:BB"));
        assert_eq!(p.label(), "AA:BB");
        assert_eq!(p.to_string(), "AA:BB");
    }
}
