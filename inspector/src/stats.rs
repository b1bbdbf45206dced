/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Counter value for statistics a backend cannot obtain.
pub const UNSUPPORTED_COUNTER: i64 = -1;
/// Rate value for statistics a backend cannot obtain.
pub const UNSUPPORTED_RATE: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstanceStats {
    /// Average per-core utilization in percent. Not clamped.
    pub cpu_util: f64,
    /// Memory in use, in MB.
    pub memory_usage: f64,
}

/// A virtual network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub mac: String,
    pub fref: Option<String>,
    pub parameters: Option<BTreeMap<String, String>>,
}

impl Interface {
    pub fn new(name: String, mac: String) -> Self {
        Self {
            name,
            mac,
            fref: None,
            parameters: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub rx_bytes: i64,
    pub rx_packets: i64,
    pub rx_drop: i64,
    pub rx_errors: i64,
    pub tx_bytes: i64,
    pub tx_packets: i64,
    pub tx_drop: i64,
    pub tx_errors: i64,
}

impl InterfaceStats {
    /// Byte counters only; everything else is [`UNSUPPORTED_COUNTER`].
    pub fn from_bytes(rx_bytes: i64, tx_bytes: i64) -> Self {
        Self {
            rx_bytes,
            rx_packets: UNSUPPORTED_COUNTER,
            rx_drop: UNSUPPORTED_COUNTER,
            rx_errors: UNSUPPORTED_COUNTER,
            tx_bytes,
            tx_packets: UNSUPPORTED_COUNTER,
            tx_drop: UNSUPPORTED_COUNTER,
            tx_errors: UNSUPPORTED_COUNTER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRateStats {
    pub rx_rate: f64,
    pub tx_rate: f64,
}

/// A virtual block device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub device: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiskRateStats {
    pub read_bytes_rate: f64,
    pub read_requests_rate: f64,
    pub write_bytes_rate: f64,
    pub write_requests_rate: f64,
}

impl DiskRateStats {
    /// Byte rates only; request rates are [`UNSUPPORTED_RATE`].
    pub fn from_bytes_rates(
        read_bytes_rate: f64,
        write_bytes_rate: f64,
    ) -> Self {
        Self {
            read_bytes_rate,
            read_requests_rate: UNSUPPORTED_RATE,
            write_bytes_rate,
            write_requests_rate: UNSUPPORTED_RATE,
        }
    }
}
