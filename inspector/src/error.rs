/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error category, shared by all inspector backends.
#[derive(
    Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, Debug,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Required connection settings are missing.
    Configuration,
    /// Login, authentication or transport failure.
    Connection,
    /// The instance no longer exists on the hypervisor.
    InstanceNotFound,
    /// The instance name matches more than one vm.
    AmbiguousInstance,
    /// The hypervisor returned a value that makes the metric meaningless.
    InvalidMetric,
    /// Any other failure reported by the hypervisor.
    Remote,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Configuration => "configuration error",
                Self::Connection => "connection error",
                Self::InstanceNotFound => "instance not found",
                Self::AmbiguousInstance => "ambiguous instance",
                Self::InvalidMetric => "invalid metric",
                Self::Remote => "remote error",
            }
        )
    }
}

pub trait InspectorError: std::error::Error {
    fn kind(&self) -> ErrorKind;

    /// Pollers skip vanished instances instead of reporting a failure.
    fn is_instance_not_found(&self) -> bool {
        self.kind() == ErrorKind::InstanceNotFound
    }
}
