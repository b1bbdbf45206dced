/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::path::PathBuf;

use inspector::{ErrorKind, InspectorError};

use crate::rpc;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "must specify connection_url and connection_password to use \
         (missing {0})"
    )]
    Configuration(&'static str),
    #[error("unable to read config file {0}: {1}")]
    ReadConfig(PathBuf, #[source] std::io::Error),
    #[error("unable to parse config file {0}: {1}")]
    ParseConfig(PathBuf, #[source] serde_json::Error),

    #[error("could not connect to XenAPI: {0}")]
    Connection(#[source] rpc::Error),
    #[error("could not connect slave host (master {0}): {1}")]
    SlaveConnection(String, #[source] rpc::Error),
    #[error("invalid connection url {0}: {1}")]
    InvalidUrl(String, #[source] url::ParseError),

    #[error("VM {0} not found in XenServer")]
    InstanceNotFound(String),
    #[error("multiple VM {0} found in XenServer")]
    AmbiguousInstance(String),
    #[error("could not get VM {0} CPU number")]
    InvalidVcpuCount(String),

    #[error("{0} failed: {1}")]
    Call(String, #[source] rpc::Error),
    #[error("unexpected result from {0}: expected {1}")]
    UnexpectedValue(String, &'static str),
    #[error("{0} record is missing field {1}")]
    MissingField(&'static str, &'static str),
    #[error("no bandwidth reported for domain {domid} device {device}")]
    MissingBandwidth { domid: String, device: String },
    #[error("invalid payload for plugin {0}: {1}")]
    PluginPayload(String, #[source] serde_json::Error),
    #[error("Unable to (de)serialize: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    /// Whether this is a failure reported by XAPI itself, as opposed to a
    /// transport or decoding problem.
    pub fn is_api_failure(&self) -> bool {
        matches!(self, Self::Call(_, rpc::Error::Failure(_)))
    }
}

impl InspectorError for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_)
            | Self::ReadConfig(..)
            | Self::ParseConfig(..) => ErrorKind::Configuration,
            Self::Connection(_)
            | Self::SlaveConnection(..)
            | Self::InvalidUrl(..) => ErrorKind::Connection,
            Self::Call(
                _,
                rpc::Error::Failure(_) | rpc::Error::Fault { .. },
            ) => ErrorKind::Remote,
            Self::Call(..) => ErrorKind::Connection,
            Self::InstanceNotFound(_) => ErrorKind::InstanceNotFound,
            Self::AmbiguousInstance(_) => ErrorKind::AmbiguousInstance,
            Self::InvalidVcpuCount(_) => ErrorKind::InvalidMetric,
            Self::UnexpectedValue(..)
            | Self::MissingField(..)
            | Self::MissingBandwidth { .. }
            | Self::PluginPayload(..)
            | Self::SerdeJson(_) => ErrorKind::Remote,
        }
    }
}
