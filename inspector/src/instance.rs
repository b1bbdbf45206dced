/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::fmt;

use serde::{Deserialize, Serialize};

/// An instance as known by the metering pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instance {
    pub uuid: String,
    pub display_name: String,
    /// Name of the instance on the hypervisor, if it differs from the
    /// display name.
    #[serde(default)]
    pub instance_name: Option<String>,
}

impl Instance {
    pub fn new(uuid: String, display_name: String) -> Self {
        Self {
            uuid,
            display_name,
            instance_name: None,
        }
    }

    pub fn with_instance_name(mut self, name: String) -> Self {
        self.instance_name = Some(name);
        self
    }

    /// The name label the hypervisor knows this instance by.
    pub fn instance_name(&self) -> &str {
        self.instance_name.as_deref().unwrap_or(&self.display_name)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.instance_name(), self.uuid)
    }
}
