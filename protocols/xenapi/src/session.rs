/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::collections::BTreeMap;

use log::{debug, info, warn};
use tap::TapFallible;
use tokio::sync::Mutex;

use crate::config::ConnectionDescriptor;
use crate::hostswap::swap_host;
use crate::refs::{Host, Ref};
use crate::rpc::{self, Connector, Target, Transport, Value};
use crate::{Error, Result};

const API_VERSION: &str = "1.0";
const ORIGINATOR: &str = "xenapi_protocol";

/// A logged-in XAPI session, bound to the host it was opened on.
///
/// Calls through one session are serialized.
pub struct Session<T> {
    transport: Mutex<T>,
    handle: String,
    url: String,
    host_ref: Ref<Host>,
    host_uuid: String,
}

impl<T: Transport> Session<T> {
    /// Log in, following a single `HOST_IS_SLAVE` redirect to the pool
    /// master, and look up the host this session runs on.
    pub async fn establish<C>(
        connector: &C,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Self>
    where
        C: Connector<Transport = T>,
    {
        let transport = connector
            .connect(&descriptor.target())
            .await
            .map_err(Error::Connection)?;

        let result = login(&transport, descriptor).await;
        let (transport, url, handle) = match result {
            Ok(handle) => (transport, descriptor.url.clone(), handle),
            Err(rpc::Error::Failure(failure)) => match failure.master() {
                Some(master) => redirect(connector, descriptor, master).await?,
                None => {
                    return Err(Error::Connection(rpc::Error::Failure(failure)))
                }
            },
            Err(e) => return Err(Error::Connection(e)),
        };
        info!("logged in to {url} as {}", descriptor.username);

        let (host_ref, host_uuid) = session_host(&transport, &handle)
            .await
            .map_err(Error::Connection)?;
        debug!("session host is {host_uuid}");

        Ok(Self {
            transport: Mutex::new(transport),
            handle,
            url,
            host_ref,
            host_uuid,
        })
    }

    /// Invoke `method` with the session handle as its first argument.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        let transport = self.transport.lock().await;
        invoke(&*transport, &self.handle, method, args).await
    }

    /// Run `function` of a host plugin on the session host. The host uuid
    /// is added to `args`.
    pub async fn call_plugin(
        &self,
        plugin: &str,
        function: &str,
        mut args: BTreeMap<String, Value>,
    ) -> Result<String> {
        const METHOD: &str = "host.call_plugin";
        args.insert(
            "host_uuid".to_string(),
            Value::from(self.host_uuid.as_str()),
        );
        let result = self
            .call(
                METHOD,
                vec![
                    Value::from(&self.host_ref),
                    Value::from(plugin),
                    Value::from(function),
                    Value::Struct(args),
                ],
            )
            .await?;
        match result {
            Value::String(result) => Ok(result),
            _ => Err(Error::UnexpectedValue(METHOD.to_string(), "string")),
        }
    }

    /// End the session. Failures are only logged.
    pub async fn logout(self) {
        let _ = self
            .call("session.logout", Vec::new())
            .await
            .tap_ok(|_| debug!("logged out of {}", self.url))
            .tap_err(|e| warn!("logout from {} failed: {e}", self.url));
    }

    /// The url the session is connected to, after any redirect.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn host_ref(&self) -> &Ref<Host> {
        &self.host_ref
    }

    pub fn host_uuid(&self) -> &str {
        &self.host_uuid
    }
}

async fn invoke<T: Transport>(
    transport: &T,
    handle: &str,
    method: &str,
    args: Vec<Value>,
) -> Result<Value> {
    debug!("calling {method}");
    let mut params = Vec::with_capacity(args.len() + 1);
    params.push(Value::from(handle));
    params.extend(args);
    transport
        .request(method, params)
        .await
        .map_err(|e| Error::Call(method.to_string(), e))
}

async fn login<T: Transport>(
    transport: &T,
    descriptor: &ConnectionDescriptor,
) -> rpc::Result<String> {
    let handle = transport
        .request(
            "session.login_with_password",
            vec![
                Value::from(descriptor.username.as_str()),
                Value::from(descriptor.password.expose()),
                Value::from(API_VERSION),
                Value::from(ORIGINATOR),
            ],
        )
        .await?;
    handle.as_str().map(str::to_string).ok_or_else(|| {
        rpc::Error::Malformed(format!(
            "expected a session handle, got {}",
            handle.type_name()
        ))
    })
}

/// The host a fresh session runs on, as its reference and uuid.
async fn session_host<T: Transport>(
    transport: &T,
    handle: &str,
) -> rpc::Result<(Ref<Host>, String)> {
    debug!("looking up session host");
    let this_host = transport
        .request(
            "session.get_this_host",
            vec![Value::from(handle), Value::from(handle)],
        )
        .await?;
    let host_ref = Ref::from_value(&this_host, "session.get_this_host")
        .map_err(|e| rpc::Error::Malformed(e.to_string()))?;
    let uuid = transport
        .request(
            "host.get_uuid",
            vec![Value::from(handle), Value::from(&host_ref)],
        )
        .await?;
    let host_uuid = uuid.as_str().map(str::to_string).ok_or_else(|| {
        rpc::Error::Malformed(format!(
            "expected a host uuid, got {}",
            uuid.type_name()
        ))
    })?;
    Ok((host_ref, host_uuid))
}

/// Log in to the pool master instead. Not retried on failure.
async fn redirect<C: Connector>(
    connector: &C,
    descriptor: &ConnectionDescriptor,
    master: &str,
) -> Result<(C::Transport, String, String)> {
    let url = swap_host(&descriptor.url, master)
        .map_err(|e| Error::InvalidUrl(descriptor.url.clone(), e))?;
    info!("{} is a pool slave, retrying on master {url}", descriptor.url);
    let slave_err = |e| Error::SlaveConnection(master.to_string(), e);
    let transport = connector
        .connect(&Target::Remote(url.clone()))
        .await
        .map_err(slave_err)?;
    let handle = login(&transport, descriptor).await.map_err(slave_err)?;
    Ok((transport, url, handle))
}
