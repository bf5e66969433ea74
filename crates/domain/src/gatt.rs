//! GATT profile agreed with the peripheral firmware.

use serde::{Deserialize, Serialize};

/// Primary service exposed by the RF bridge firmware.
pub const SERVICE_UUID: uuid::Uuid = uuid::Uuid::from_u128(0x1234_5678_1234_1234_1234_1234_5678_90ab);

/// Characteristic commands are written to.
pub const WRITE_CHAR_UUID: uuid::Uuid =
    uuid::Uuid::from_u128(0x1234_5678_1234_1234_1234_1234_5678_90ad);

/// Characteristic sniffed codes are notified on.
pub const NOTIFY_CHAR_UUID: uuid::Uuid =
    uuid::Uuid::from_u128(0x1234_5678_1234_1234_1234_1234_5678_90ac);

/// Service and characteristic identifiers used on the link.
///
/// These are configuration, not behaviour: a firmware build with different
/// UUIDs only needs a different profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GattProfile {
    pub service: uuid::Uuid,
    pub write_characteristic: uuid::Uuid,
    pub notify_characteristic: uuid::Uuid,
}

impl Default for GattProfile {
    fn default() -> Self {
        Self {
            service: SERVICE_UUID,
            write_characteristic: WRITE_CHAR_UUID,
            notify_characteristic: NOTIFY_CHAR_UUID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_firmware_uuids_by_default() {
        let profile = GattProfile::default();
        assert_eq!(
            profile.service.to_string(),
            "12345678-1234-1234-1234-1234567890ab"
        );
        assert_eq!(
            profile.write_characteristic.to_string(),
            "12345678-1234-1234-1234-1234567890ad"
        );
        assert_eq!(
            profile.notify_characteristic.to_string(),
            "12345678-1234-1234-1234-1234567890ac"
        );
    }
}
