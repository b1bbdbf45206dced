/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use xenapi_protocol::rpc::{
    self, ApiFailure, Connector, Target, Transport, Value,
};
use xenapi_protocol::{ConnectionDescriptor, Password};

pub const HOST_REF: &str = "OpaqueRef:host-1";
pub const HOST_UUID: &str = "0d1c6f7e-host";
pub const SESSION: &str = "OpaqueRef:session-1";

/// How a host answers `session.login_with_password`.
#[derive(Clone, Debug)]
pub enum Login {
    Accept,
    Slave(String),
    Reject(String),
}

#[derive(Clone, Debug, Default)]
pub struct FakeVm {
    pub name: String,
    pub vcpus: i64,
    pub domid: i64,
    pub data_sources: HashMap<String, f64>,
    pub vifs: Vec<FakeVif>,
    pub vbds: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct FakeVif {
    pub uuid: String,
    pub mac: String,
    pub device: String,
}

/// A recorded request.
#[derive(Clone, Debug)]
pub struct Call {
    pub target: Target,
    pub method: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct State {
    logins: HashMap<Target, Login>,
    vms: Vec<FakeVm>,
    bandwidth: String,
    /// `(method, argument)` pairs answered with an undecodable response.
    malformed: Vec<(String, Value)>,
    calls: Vec<Call>,
}

/// An in-memory XAPI pool.
#[derive(Clone, Default)]
pub struct FakeXapi {
    state: Arc<Mutex<State>>,
}

pub struct FakeTransport {
    target: Target,
    state: Arc<Mutex<State>>,
}

impl FakeXapi {
    pub fn new() -> Self {
        Self::default().with_bandwidth(serde_json::json!({}))
    }

    pub fn with_login(self, target: Target, login: Login) -> Self {
        self.state.lock().unwrap().logins.insert(target, login);
        self
    }

    pub fn with_vm(self, vm: FakeVm) -> Self {
        self.state.lock().unwrap().vms.push(vm);
        self
    }

    pub fn with_bandwidth(self, snapshot: serde_json::Value) -> Self {
        self.state.lock().unwrap().bandwidth = snapshot.to_string();
        self
    }

    /// Answer `method` with a malformed response whenever `arg` is among
    /// its parameters.
    pub fn with_malformed(self, method: &str, arg: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .malformed
            .push((method.to_string(), Value::from(arg)));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .collect()
    }
}

#[async_trait]
impl Connector for FakeXapi {
    type Transport = FakeTransport;

    async fn connect(&self, target: &Target) -> rpc::Result<FakeTransport> {
        if let Target::Remote(url) = target {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(rpc::Error::UnsupportedUrl(url.clone()));
            }
        }
        Ok(FakeTransport {
            target: target.clone(),
            state: self.state.clone(),
        })
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn request(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> rpc::Result<Value> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            target: self.target.clone(),
            method: method.to_string(),
            params: params.clone(),
        });
        if state
            .malformed
            .iter()
            .any(|(m, arg)| m == method && params.contains(arg))
        {
            return Err(rpc::Error::Malformed(format!("{method}: garbage")));
        }
        state.answer(&self.target, method, &params)
    }
}

impl State {
    fn answer(
        &self,
        target: &Target,
        method: &str,
        params: &[Value],
    ) -> rpc::Result<Value> {
        let arg = |i: usize| {
            params.get(i).and_then(Value::as_str).unwrap_or_default()
        };
        match method {
            "session.login_with_password" => {
                match self.logins.get(target).unwrap_or(&Login::Accept) {
                    Login::Accept => Ok(Value::from(SESSION)),
                    Login::Slave(master) => {
                        failure(&["HOST_IS_SLAVE", master.as_str()])
                    }
                    Login::Reject(code) => failure(&[code.as_str(), arg(0)]),
                }
            }
            _ if arg(0) != SESSION => failure(&["SESSION_INVALID", arg(0)]),
            "session.get_this_host" => Ok(Value::from(HOST_REF)),
            "session.logout" => Ok(Value::Nil),
            "host.get_uuid" if arg(1) == HOST_REF => Ok(Value::from(HOST_UUID)),
            "host.call_plugin" => Ok(Value::from(self.bandwidth.as_str())),
            "VM.get_by_name_label" => Ok(Value::Array(
                self.vms
                    .iter()
                    .enumerate()
                    .filter(|(_, vm)| vm.name == arg(1))
                    .map(|(i, _)| Value::from(format!("OpaqueRef:vm-{i}")))
                    .collect(),
            )),
            "VM.get_VCPUs_max" => {
                let (_, vm) = self.vm(arg(1))?;
                Ok(Value::from(vm.vcpus.to_string()))
            }
            "VM.get_domid" => {
                let (_, vm) = self.vm(arg(1))?;
                Ok(Value::from(vm.domid.to_string()))
            }
            "VM.query_data_source" => {
                let (_, vm) = self.vm(arg(1))?;
                match vm.data_sources.get(arg(2)) {
                    Some(value) => Ok(Value::Double(*value)),
                    None => failure(&["INTERNAL_ERROR", arg(2)]),
                }
            }
            "VM.get_VIFs" => {
                let (i, vm) = self.vm(arg(1))?;
                Ok(Value::Array(
                    (0..vm.vifs.len())
                        .map(|j| format!("OpaqueRef:vif-{i}-{j}").into())
                        .collect(),
                ))
            }
            "VM.get_VBDs" => {
                let (i, vm) = self.vm(arg(1))?;
                Ok(Value::Array(
                    (0..vm.vbds.len())
                        .map(|j| format!("OpaqueRef:vbd-{i}-{j}").into())
                        .collect(),
                ))
            }
            "VIF.get_record" => {
                let vif = self.device(arg(1), "OpaqueRef:vif-", |vm, j| {
                    vm.vifs.get(j).cloned()
                })?;
                Ok(record(&[
                    ("uuid", vif.uuid.as_str()),
                    ("MAC", vif.mac.as_str()),
                    ("device", vif.device.as_str()),
                    ("currently_attached", "true"),
                ]))
            }
            "VBD.get_record" => {
                let device = self.device(arg(1), "OpaqueRef:vbd-", |vm, j| {
                    vm.vbds.get(j).cloned()
                })?;
                Ok(record(&[("device", device.as_str()), ("mode", "RW")]))
            }
            _ => failure(&["MESSAGE_METHOD_UNKNOWN", method]),
        }
    }

    fn vm(&self, opaque: &str) -> rpc::Result<(usize, &FakeVm)> {
        opaque
            .strip_prefix("OpaqueRef:vm-")
            .and_then(|i| i.parse::<usize>().ok())
            .and_then(|i| self.vms.get(i).map(|vm| (i, vm)))
            .map_or_else(|| failure(&["HANDLE_INVALID", "VM", opaque]), Ok)
    }

    fn device<R>(
        &self,
        opaque: &str,
        prefix: &str,
        get: impl Fn(&FakeVm, usize) -> Option<R>,
    ) -> rpc::Result<R> {
        opaque
            .strip_prefix(prefix)
            .and_then(|rest| rest.split_once('-'))
            .and_then(|(i, j)| {
                Some((i.parse::<usize>().ok()?, j.parse::<usize>().ok()?))
            })
            .and_then(|(i, j)| get(self.vms.get(i)?, j))
            .map_or_else(|| failure(&["HANDLE_INVALID", opaque]), Ok)
    }
}

fn failure<T>(details: &[&str]) -> rpc::Result<T> {
    Err(rpc::Error::Failure(ApiFailure::new(
        details.iter().map(|d| d.to_string()).collect(),
    )))
}

fn record(fields: &[(&str, &str)]) -> Value {
    Value::Struct(
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect::<BTreeMap<_, _>>(),
    )
}

pub fn descriptor(url: &str) -> ConnectionDescriptor {
    ConnectionDescriptor {
        url: url.to_string(),
        username: "root".to_string(),
        password: Password::from("secret"),
    }
}

pub fn vif(uuid: &str, mac: &str, device: &str) -> FakeVif {
    FakeVif {
        uuid: uuid.to_string(),
        mac: mac.to_string(),
        device: device.to_string(),
    }
}

pub fn data_sources(sources: &[(&str, f64)]) -> HashMap<String, f64> {
    sources
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}
