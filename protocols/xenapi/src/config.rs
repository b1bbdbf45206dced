/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rpc::{Target, XmlRpcConnector};
use crate::{Error, Result};

/// Connection url selecting the XAPI socket on the local host.
pub const LOCAL_URL: &str = "unix://local";
pub const DEFAULT_LOCAL_SOCKET: &str = "/var/lib/xcp/xapi";
pub const DEFAULT_USERNAME: &str = "root";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// URL for connection to XenServer/Xen Cloud Platform.
    #[serde(default)]
    pub connection_url: Option<String>,
    #[serde(default = "default_username")]
    pub connection_username: String,
    #[serde(default)]
    pub connection_password: Option<Password>,
    #[serde(default)]
    pub https_strategy: HttpsStrategy,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default = "default_local_socket")]
    pub local_socket: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpsStrategy {
    #[default]
    Strict,
    IgnoreHostname,
    IgnoreCertificate,
}

/// A secret that never shows up in debug output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

/// Validated connection settings; fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub url: String,
    pub username: String,
    pub password: Password,
}

fn default_username() -> String {
    String::from(DEFAULT_USERNAME)
}

fn default_local_socket() -> PathBuf {
    PathBuf::from(DEFAULT_LOCAL_SOCKET)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_url: None,
            connection_username: default_username(),
            connection_password: None,
            https_strategy: HttpsStrategy::default(),
            timeout: None,
            local_socket: default_local_socket(),
        }
    }
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| Error::ReadConfig(path.to_path_buf(), e))?;
        serde_json::from_slice(&data)
            .map_err(|e| Error::ParseConfig(path.to_path_buf(), e))
    }

    pub fn descriptor(&self) -> Result<ConnectionDescriptor> {
        let url = self
            .connection_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(Error::Configuration("connection_url"))?;
        let password = self
            .connection_password
            .clone()
            .ok_or(Error::Configuration("connection_password"))?;
        Ok(ConnectionDescriptor {
            url: url.to_string(),
            username: self.connection_username.clone(),
            password,
        })
    }

    pub fn connector(&self) -> XmlRpcConnector {
        XmlRpcConnector::new(
            self.https_strategy,
            self.timeout.map(Duration::from_secs),
            self.local_socket.clone(),
        )
    }
}

impl ConnectionDescriptor {
    pub fn target(&self) -> Target {
        if self.url == LOCAL_URL {
            Target::Local
        } else {
            Target::Remote(self.url.clone())
        }
    }
}

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}
