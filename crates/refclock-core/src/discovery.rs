//! Device descriptors and the discovery collaborator boundary.
//!
//! Enumeration itself lives outside this crate; the burn session only needs
//! something that resolves a filter to candidate descriptors, both at setup
//! and when re-finding the unit after a reset into the bootloader.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::protocol::constants::{BOOTLOADER_TYPE, DEFAULT_REVISION};

/// An opaque key→value device descriptor.
///
/// Doubles as a filter: a descriptor with a subset of keys selects every
/// device whose descriptor agrees on those keys. The keys this crate
/// consumes are `addr`, `type` and `revision`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceAddr {
    pairs: BTreeMap<String, String>,
}

impl DeviceAddr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.pairs.insert(key.to_string(), value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Network address of the unit.
    pub fn addr(&self) -> Option<&str> {
        self.get("addr")
    }

    pub fn device_type(&self) -> Option<&str> {
        self.get("type")
    }

    /// Hardware revision, falling back to the oldest fielded revision when
    /// the descriptor does not carry one.
    pub fn revision(&self) -> &str {
        self.get("revision").unwrap_or(DEFAULT_REVISION)
    }

    /// Whether the unit currently runs its bootloader.
    pub fn is_bootloader(&self) -> bool {
        self.device_type() == Some(BOOTLOADER_TYPE)
    }

    /// Human-readable unit name derived from `type` and `revision`.
    pub fn display_name(&self) -> String {
        if self.is_bootloader() {
            "Refclock Bootloader".to_string()
        } else {
            format!("Refclock r{}", self.revision())
        }
    }

    /// Whether this descriptor satisfies every pair of `filter`.
    pub fn satisfies(&self, filter: &DeviceAddr) -> bool {
        filter
            .pairs
            .iter()
            .all(|(k, v)| self.get(k) == Some(v.as_str()))
    }
}

impl FromStr for DeviceAddr {
    type Err = String;

    /// Parse `key=value,key=value`. An empty string is the empty filter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut dev = DeviceAddr::new();
        for pair in s.split(',').filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected key=value, got \"{}\"", pair.trim()))?;
            dev.set(key.trim(), value.trim());
        }
        Ok(dev)
    }
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.pairs {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

/// One row of an ambiguous-resolution report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceListing {
    pub name: String,
    pub addr: String,
}

/// Build the candidate listing shown when filters match more than one unit.
///
/// Pure data; the presentation layer decides how to render it.
pub fn ambiguous_listing(devices: &[DeviceAddr]) -> Vec<DeviceListing> {
    devices
        .iter()
        .map(|dev| DeviceListing {
            name: dev.display_name(),
            addr: dev.addr().unwrap_or_default().to_string(),
        })
        .collect()
}

/// Discovery collaborator: resolves a filter to candidate descriptors.
///
/// Failures inside an implementation are its own to report; from this
/// crate's point of view a device that cannot be enumerated is simply not
/// found.
pub trait DeviceFinder {
    fn find(&self, filter: &DeviceAddr) -> Vec<DeviceAddr>;
}

/// Finder over a fixed set of descriptors.
///
/// Stands in where enumeration has already happened elsewhere, and backs the
/// protocol tests.
pub struct StaticFinder {
    devices: Vec<DeviceAddr>,
}

impl StaticFinder {
    pub fn new(devices: Vec<DeviceAddr>) -> Self {
        Self { devices }
    }
}

impl DeviceFinder for StaticFinder {
    fn find(&self, filter: &DeviceAddr) -> Vec<DeviceAddr> {
        self.devices
            .iter()
            .filter(|dev| dev.satisfies(filter))
            .cloned()
            .collect()
    }
}
