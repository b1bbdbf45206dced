/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use crate::rpc::Value;
use crate::{Error, Result};

/// The fields of a `VIF.get_record` result used by the inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VifRecord {
    pub uuid: String,
    pub mac: String,
    pub device: String,
}

/// The fields of a `VBD.get_record` result used by the inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VbdRecord {
    pub device: String,
}

impl VifRecord {
    pub(crate) fn from_value(value: &Value) -> Result<Self> {
        Ok(Self {
            uuid: field(value, "VIF", "uuid")?,
            mac: field(value, "VIF", "MAC")?,
            device: field(value, "VIF", "device")?,
        })
    }
}

impl VbdRecord {
    pub(crate) fn from_value(value: &Value) -> Result<Self> {
        Ok(Self {
            device: field(value, "VBD", "device")?,
        })
    }
}

fn field(
    record: &Value,
    class: &'static str,
    name: &'static str,
) -> Result<String> {
    record
        .get(name)
        .and_then(Value::to_key)
        .ok_or(Error::MissingField(class, name))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn record(fields: &[(&str, &str)]) -> Value {
        Value::Struct(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v)))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn vif_record() {
        let vif = VifRecord::from_value(&record(&[
            ("uuid", "7d3c"),
            ("MAC", "aa:bb:cc:dd:ee:ff"),
            ("device", "0"),
            ("network", "OpaqueRef:9"),
        ]))
        .unwrap();
        assert_eq!(
            vif,
            VifRecord {
                uuid: "7d3c".to_string(),
                mac: "aa:bb:cc:dd:ee:ff".to_string(),
                device: "0".to_string(),
            }
        );
    }

    #[test]
    fn missing_fields() {
        assert!(matches!(
            VifRecord::from_value(&record(&[("uuid", "7d3c")])),
            Err(Error::MissingField("VIF", "MAC"))
        ));
        assert!(matches!(
            VbdRecord::from_value(&Value::Nil),
            Err(Error::MissingField("VBD", "device"))
        ));
        assert_eq!(
            VbdRecord::from_value(&record(&[("device", "xvda")]))
                .unwrap()
                .device,
            "xvda"
        );
    }
}
