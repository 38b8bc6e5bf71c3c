//! Storage Transport Configuration
//!
//! The storage daemon reaches its capacity through one of two transports:
//!
//! - **rtrd** - raw block devices addressed directly
//! - **rtlfs** - one directory per backing location on a mounted filesystem
//!
//! This module holds the on-disk schema of both transport files, the
//! directory scan that autodetects filesystem backing locations, and the
//! policy that decides which transport file (if any) a node gets.

pub mod discovery;
pub mod selection;

use serde::{Deserialize, Serialize};

pub use discovery::{
    discover_backing_locations, ensure_minimum_backing_locations, DEFAULT_MIN_BACKING_LOCATIONS,
    RESERVED_ENTRIES,
};
pub use selection::{TransportConfigurator, TransportPlan};

// =============================================================================
// Transport Kind
// =============================================================================

/// Transport selected by the daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportKind {
    /// Raw-device transport (`rtrd`)
    RawDevice,
    /// Filesystem-backed transport (`rtlfs`)
    Filesystem,
    /// Any other driver name; not reconfigured here
    Other(String),
}

impl TransportKind {
    /// Parse a transport driver name.
    pub fn parse(name: &str) -> Self {
        match name {
            "rtrd" => TransportKind::RawDevice,
            "rtlfs" => TransportKind::Filesystem,
            other => TransportKind::Other(other.to_string()),
        }
    }

    /// Driver name as written in `ccowd.json`.
    pub fn as_str(&self) -> &str {
        match self {
            TransportKind::RawDevice => "rtrd",
            TransportKind::Filesystem => "rtlfs",
            TransportKind::Other(name) => name,
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Filesystem Transport Schema
// =============================================================================

/// Flags stored as `0|1` integers in transport files.
mod int_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

/// One filesystem backing location (a directory exposed as a device).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackingLocation {
    pub name: String,
    pub path: String,
    #[serde(with = "int_flag", default)]
    pub check_mountpoint: bool,
    #[serde(rename = "journal_maxchunksize", default, skip_serializing_if = "is_zero_i32")]
    pub journal_max_chunk_size: i32,
    /// Synchronous writes
    #[serde(with = "int_flag", default)]
    pub sync: bool,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub psize: i32,
    /// Verify chunk ids on read
    #[serde(rename = "verify_chid", with = "int_flag", default)]
    pub verify_checksum: bool,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub plevel_override: i32,
    #[serde(rename = "maxsize", default, skip_serializing_if = "is_zero_u64")]
    pub max_size: u64,
}

impl BackingLocation {
    /// A discovered directory: synchronous, no mountpoint check.
    pub fn discovered(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            check_mountpoint: false,
            journal_max_chunk_size: 0,
            sync: true,
            psize: 0,
            verify_checksum: false,
            plevel_override: 0,
            max_size: 0,
        }
    }
}

/// Filesystem transport file (`rt-lfs.json`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtlfsConfig {
    #[serde(default)]
    pub devices: Vec<BackingLocation>,
}

// =============================================================================
// Raw-Device Transport Schema
// =============================================================================

/// Raw-device transport file (`rt-rd.json`).
///
/// Device descriptors belong to the storage engine and pass through
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RtrdConfig {
    #[serde(default)]
    pub devices: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transport_kind_parse() {
        assert_eq!(TransportKind::parse("rtrd"), TransportKind::RawDevice);
        assert_eq!(TransportKind::parse("rtlfs"), TransportKind::Filesystem);
        assert_eq!(
            TransportKind::parse("rtkvs"),
            TransportKind::Other("rtkvs".into())
        );
        assert_eq!(TransportKind::Filesystem.to_string(), "rtlfs");
    }

    #[test]
    fn test_backing_location_schema() {
        let location = BackingLocation::discovered("device-0", "/data/device-0");
        let value = serde_json::to_value(&location).unwrap();

        assert_eq!(
            value,
            json!({
                "name": "device-0",
                "path": "/data/device-0",
                "check_mountpoint": 0,
                "sync": 1,
                "verify_chid": 0,
            })
        );
    }

    #[test]
    fn test_backing_location_optional_fields() {
        let value = json!({
            "name": "d1",
            "path": "/mnt/d1",
            "check_mountpoint": 1,
            "sync": 0,
            "verify_chid": 1,
            "journal_maxchunksize": 1048576,
            "maxsize": 1099511627776u64
        });
        let location: BackingLocation = serde_json::from_value(value.clone()).unwrap();

        assert!(location.check_mountpoint);
        assert!(!location.sync);
        assert!(location.verify_checksum);
        assert_eq!(location.max_size, 1 << 40);
        assert_eq!(serde_json::to_value(&location).unwrap(), value);
    }

    #[test]
    fn test_rtrd_devices_pass_through() {
        let value = json!({
            "devices": [
                { "name": "ata-ST1000", "device": "/dev/sdb", "journal": "/dev/nvme0n1" }
            ]
        });
        let config: RtrdConfig = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(config.devices.len(), 1);
        assert_eq!(serde_json::to_value(&config).unwrap(), value);
    }
}
