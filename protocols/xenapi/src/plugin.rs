/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tap::TapFallible;

use crate::rpc::{Transport, Value};
use crate::session::Session;
use crate::{Error, Result};

pub const BANDWIDTH_PLUGIN: &str = "bandwidth";
pub const FETCH_ALL_BANDWIDTH: &str = "fetch_all_bandwidth";

/// Byte counters of every VIF on the host: domid -> device -> counters.
pub type BandwidthSnapshot = HashMap<String, HashMap<String, VifBandwidth>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VifBandwidth {
    pub bw_in: i64,
    pub bw_out: i64,
}

/// Argument blob understood by the companion host plugins, passed as
/// their single `params` argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginParams {
    pub tag: PluginTag,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub kwargs: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginTag {
    Call,
}

impl PluginParams {
    pub fn new(
        args: Vec<serde_json::Value>,
        kwargs: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            tag: PluginTag::Call,
            args,
            kwargs,
        }
    }
}

impl<T: Transport> Session<T> {
    /// Call a plugin function taking and returning serialized values.
    pub async fn call_plugin_serialized<R: DeserializeOwned>(
        &self,
        plugin: &str,
        function: &str,
        params: &PluginParams,
    ) -> Result<R> {
        let blob = serde_json::to_string(params)?;
        let args = BTreeMap::from([("params".to_string(), Value::from(blob))]);
        let reply = self.call_plugin(plugin, function, args).await?;
        let name = format!("{plugin}/{function}");
        serde_json::from_str(&reply)
            .tap_ok(|_| debug!("{name}: received {} bytes", reply.len()))
            .map_err(|e| Error::PluginPayload(name, e))
    }

    /// Byte counters of all VIFs on the session host, in one round trip.
    pub async fn fetch_all_bandwidth(&self) -> Result<BandwidthSnapshot> {
        self.call_plugin_serialized(
            BANDWIDTH_PLUGIN,
            FETCH_ALL_BANDWIDTH,
            &PluginParams::new(Vec::new(), serde_json::Map::new()),
        )
        .await
    }
}
