/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::rpc::Value;
use crate::{Error, Result};

/// XAPI object class of a reference.
pub trait Class {
    const NAME: &'static str;
}

macro_rules! class {
    ($ty:ident, $name:literal) => {
        #[derive(Debug)]
        pub enum $ty {}

        impl Class for $ty {
            const NAME: &'static str = $name;
        }
    };
}

class!(Host, "host");
class!(Vm, "VM");
class!(Vif, "VIF");
class!(Vbd, "VBD");

/// An opaque XAPI object reference (`OpaqueRef:...`), tagged with the
/// class it refers to. Only values returned by XAPI become references.
pub struct Ref<C> {
    opaque: String,
    class: PhantomData<fn() -> C>,
}

impl<C: Class> Ref<C> {
    pub(crate) fn from_value(value: &Value, method: &str) -> Result<Self> {
        value
            .as_str()
            .map(|opaque| Self {
                opaque: opaque.to_string(),
                class: PhantomData,
            })
            .ok_or_else(|| {
                Error::UnexpectedValue(method.to_string(), "object reference")
            })
    }

    pub(crate) fn list_from_value(
        value: &Value,
        method: &str,
    ) -> Result<Vec<Self>> {
        match value {
            /* XAPI returns nil for some empty sets. */
            Value::Nil => Ok(Vec::new()),
            Value::Array(values) => values
                .iter()
                .map(|v| Self::from_value(v, method))
                .collect(),
            _ => Err(Error::UnexpectedValue(
                method.to_string(),
                "list of object references",
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.opaque
    }
}

impl<C> From<&Ref<C>> for Value {
    fn from(value: &Ref<C>) -> Self {
        Value::String(value.opaque.clone())
    }
}

impl<C> Clone for Ref<C> {
    fn clone(&self) -> Self {
        Self {
            opaque: self.opaque.clone(),
            class: PhantomData,
        }
    }
}

impl<C> PartialEq for Ref<C> {
    fn eq(&self, other: &Self) -> bool {
        self.opaque == other.opaque
    }
}

impl<C> Eq for Ref<C> {}

impl<C> Hash for Ref<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.opaque.hash(state)
    }
}

impl<C: Class> fmt::Debug for Ref<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref<{}>({})", C::NAME, self.opaque)
    }
}

impl<C: Class> fmt::Display for Ref<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", C::NAME, self.opaque)
    }
}
