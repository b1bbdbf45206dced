/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

//! XenServer / XCP-ng backend for the hypervisor inspector.
//!
//! A [`XenApiInspector`] owns one XAPI [`Session`] and reads per-VM
//! CPU, memory, network and disk statistics through it. Network byte
//! counters come from the `bandwidth` host plugin, everything else from
//! RRD data sources exposed by `VM.query_data_source`.

mod backend;
mod config;
mod error;
mod hostswap;
mod plugin;
mod records;
mod refs;
mod session;

pub mod rpc;

pub use backend::XenApiInspector;
pub use config::{
    Config, ConnectionDescriptor, HttpsStrategy, Password, DEFAULT_LOCAL_SOCKET,
    DEFAULT_USERNAME, LOCAL_URL,
};
pub use error::{Error, Result};
pub use hostswap::swap_host;
pub use plugin::{
    BandwidthSnapshot, PluginParams, PluginTag, VifBandwidth, BANDWIDTH_PLUGIN,
    FETCH_ALL_BANDWIDTH,
};
pub use records::{VbdRecord, VifRecord};
pub use refs::{Class, Host, Ref, Vbd, Vif, Vm};
pub use session::Session;
