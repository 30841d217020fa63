//! Domain types shared by the probes and the decision loop.

use std::fmt;

use thiserror::Error;

/// Notification urgency hint.
///
/// See: <https://specifications.freedesktop.org/notification-spec/latest/urgency-levels.html>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    Critical,
}

impl Urgency {
    /// Byte value sent in the `urgency` hint.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::Critical => 2,
        }
    }
}

/// Error returned when a companion address is malformed.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid Bluetooth address '{0}': expected six colon-separated hex octets")]
pub struct AddressError(pub String);

/// Bluetooth hardware address of the companion device (newtype for type safety).
///
/// Always stored uppercase, e.g. `AA:BB:CC:DD:EE:FF`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Parse and normalize an address.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let normalized = value.trim().to_ascii_uppercase();

        let octets: Vec<&str> = normalized.split(':').collect();
        let valid = octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));

        if !valid {
            return Err(AddressError(value.to_string()));
        }

        Ok(Self(normalized))
    }

    /// Get the address as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// BlueZ object path of this device on the given adapter.
    ///
    /// `AA:BB:CC:DD:EE:FF` on `hci0` becomes `/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF`.
    pub fn object_path(&self, adapter: &str) -> String {
        format!("/org/bluez/{}/dev_{}", adapter, self.0.replace(':', "_"))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
