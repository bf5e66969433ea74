//! BLE adapter configuration.

use std::time::Duration;

use serde::Deserialize;

use rfremote_domain::gatt::{GattProfile, NOTIFY_CHAR_UUID, SERVICE_UUID, WRITE_CHAR_UUID};

/// Configuration for the btleplug gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// GATT service exposed by the peripheral firmware.
    pub service_uuid: uuid::Uuid,
    /// Characteristic commands are written to.
    pub write_characteristic_uuid: uuid::Uuid,
    /// Characteristic sniffed codes are notified on.
    pub notify_characteristic_uuid: uuid::Uuid,
    /// Upper bound for link setup (connect + service discovery), in seconds.
    pub connect_timeout_secs: u64,
    /// Skip advertisers that do not report a local name.
    pub require_name: bool,
    /// Only report peripherals whose name contains this text (case-insensitive).
    pub name_filter: Option<String>,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            service_uuid: SERVICE_UUID,
            write_characteristic_uuid: WRITE_CHAR_UUID,
            notify_characteristic_uuid: NOTIFY_CHAR_UUID,
            connect_timeout_secs: 10,
            require_name: true,
            name_filter: None,
        }
    }
}

impl BleConfig {
    /// The GATT identifiers as a domain profile.
    #[must_use]
    pub fn profile(&self) -> GattProfile {
        GattProfile {
            service: self.service_uuid,
            write_characteristic: self.write_characteristic_uuid,
            notify_characteristic: self.notify_characteristic_uuid,
        }
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Whether an advertiser with this local name should be reported.
    #[must_use]
    pub fn accepts(&self, name: Option<&str>) -> bool {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        match (name, &self.name_filter) {
            (None, _) => !self.require_name && self.name_filter.is_none(),
            (Some(_), None) => true,
            (Some(name), Some(filter)) => name.to_lowercase().contains(&filter.to_lowercase()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_firmware_profile() {
        let config = BleConfig::default();
        assert_eq!(config.profile(), GattProfile::default());
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn should_parse_partial_toml() {
        let config: BleConfig = toml::from_str(
            r#"
            connect_timeout_secs = 3
            name_filter = "esp"
            "#,
        )
        .unwrap();
        assert_eq!(config.connect_timeout_secs, 3);
        assert_eq!(config.name_filter.as_deref(), Some("esp"));
        assert!(config.require_name);
        assert_eq!(config.service_uuid, SERVICE_UUID);
    }

    #[test]
    fn should_parse_custom_uuids() {
        let config: BleConfig = toml::from_str(
            r#"notify_characteristic_uuid = "0000ffe1-0000-1000-8000-00805f9b34fb""#,
        )
        .unwrap();
        assert_eq!(
            config.profile().notify_characteristic,
            uuid::Uuid::from_u128(0x0000_ffe1_0000_1000_8000_0080_5f9b_34fb)
        );
    }

    #[test]
    fn should_skip_unnamed_advertisers_by_default() {
        let config = BleConfig::default();
        assert!(!config.accepts(None));
        assert!(!config.accepts(Some("  ")));
        assert!(config.accepts(Some("ESP32")));
    }

    #[test]
    fn should_accept_unnamed_when_name_not_required() {
        let config = BleConfig {
            require_name: false,
            ..BleConfig::default()
        };
        assert!(config.accepts(None));
    }

    #[test]
    fn should_match_name_filter_case_insensitively() {
        let config = BleConfig {
            name_filter: Some("rf-remote".to_string()),
            ..BleConfig::default()
        };
        assert!(config.accepts(Some("ESP32 RF-Remote")));
        assert!(!config.accepts(Some("Headphones")));
        assert!(!config.accepts(None));
    }
}
