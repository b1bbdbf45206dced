/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

//! XAPI transport: XML-RPC over HTTP(S) or the local unix socket.
//!
//! Everything above this module talks to the hypervisor through the
//! [`Transport`] and [`Connector`] traits, so the stringly-typed method
//! dispatch stays confined to the session layer and this adapter.

mod http;
mod value;
mod xml;

use std::fmt;

use async_trait::async_trait;

pub use http::{XmlRpcConnector, XmlRpcTransport};
pub use value::Value;
pub use xml::{decode_response, encode_call};

pub type Result<T> = std::result::Result<T, Error>;

/// Failure code returned by a pool member that is not the master.
pub const HOST_IS_SLAVE: &str = "HOST_IS_SLAVE";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Failure(ApiFailure),
    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i64, message: String },
    #[error("error sending request: {0}")]
    Http(#[source] reqwest::Error),
    #[error("unable to build a http client: {0}")]
    BuildClient(#[source] reqwest::Error),
    #[error("unsupported url scheme in {0}")]
    UnsupportedUrl(String),
    #[error("received http status {0}")]
    Status(u16),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse response: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A failure reported by XAPI: an error code followed by its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    details: Vec<String>,
}

impl ApiFailure {
    pub fn new(details: Vec<String>) -> Self {
        Self { details }
    }

    pub fn code(&self) -> &str {
        self.details.first().map(String::as_str).unwrap_or_default()
    }

    pub fn params(&self) -> &[String] {
        self.details.get(1..).unwrap_or_default()
    }

    /// The pool master's address, if this host refused the login because
    /// it is a slave.
    pub fn master(&self) -> Option<&str> {
        (self.code() == HOST_IS_SLAVE)
            .then(|| self.params().first().map(String::as_str))
            .flatten()
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())?;
        if !self.params().is_empty() {
            write!(f, " ({})", self.params().join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiFailure {}

/// Where to open a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// The XAPI socket on this host.
    Local,
    Remote(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Invoke a XAPI method. Failures reported by XAPI come back as
    /// [`Error::Failure`].
    async fn request(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport + 'static;

    async fn connect(&self, target: &Target) -> Result<Self::Transport>;
}

/// Unpack the `{Status, Value | ErrorDescription}` envelope XAPI wraps
/// around every result.
pub fn unwrap_envelope(response: Value) -> Result<Value> {
    let mut envelope = match response {
        Value::Struct(envelope) => envelope,
        other => {
            return Err(Error::Malformed(format!(
                "expected a struct, got {}",
                other.type_name()
            )))
        }
    };

    let status = envelope
        .get("Status")
        .and_then(Value::as_str)
        .map(str::to_string);
    match status.as_deref() {
        Some("Success") => Ok(envelope.remove("Value").unwrap_or(Value::Nil)),
        Some("Failure") => {
            let details = envelope
                .get("ErrorDescription")
                .and_then(Value::as_array)
                .unwrap_or_default()
                .iter()
                .map(|v| v.to_key().unwrap_or_else(|| format!("{v:?}")))
                .collect();
            Err(Error::Failure(ApiFailure::new(details)))
        }
        status => Err(Error::Malformed(format!("unknown status {status:?}"))),
    }
}
