/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use futures::Future;
use log::{debug, warn};

use inspector::{
    Disk, DiskRateStats, DiskRateStream, Inspector, Instance, InstanceStats,
    Interface, InterfaceRateStats, InterfaceStats, VnicRateStream,
    VnicStream,
};

use crate::config::{Config, ConnectionDescriptor};
use crate::plugin::VifBandwidth;
use crate::records::{VbdRecord, VifRecord};
use crate::refs::{Class, Ref, Vbd, Vif, Vm};
use crate::rpc::{Connector, Transport, Value, XmlRpcTransport};
use crate::session::Session;
use crate::{Error, Result};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Inspector for VMs running on a XenServer / XCP-ng pool.
///
/// Every call resolves the instance by name label and reads fresh values;
/// nothing is cached besides the session itself.
pub struct XenApiInspector<T> {
    session: Session<T>,
}

impl XenApiInspector<XmlRpcTransport> {
    pub async fn new(config: &Config) -> Result<Self> {
        let descriptor = config.descriptor()?;
        Self::with_connector(&config.connector(), &descriptor).await
    }
}

impl<T: Transport> XenApiInspector<T> {
    pub async fn with_connector<C>(
        connector: &C,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Self>
    where
        C: Connector<Transport = T>,
    {
        Ok(Self {
            session: Session::establish(connector, descriptor).await?,
        })
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn into_session(self) -> Session<T> {
        self.session
    }

    /// The single VM carrying `name` as its name label.
    pub async fn lookup_by_name(&self, name: &str) -> Result<Ref<Vm>> {
        const METHOD: &str = "VM.get_by_name_label";
        let result = self.session.call(METHOD, vec![Value::from(name)]).await?;
        let mut vms = Ref::<Vm>::list_from_value(&result, METHOD)?;
        match vms.len() {
            0 => Err(Error::InstanceNotFound(name.to_string())),
            1 => Ok(vms.swap_remove(0)),
            _ => Err(Error::AmbiguousInstance(name.to_string())),
        }
    }

    async fn cpu_usage(&self, vm: &Ref<Vm>, name: &str) -> Result<f64> {
        const METHOD: &str = "VM.get_VCPUs_max";
        let vcpus = self
            .session
            .call(METHOD, vec![Value::from(vm)])
            .await?
            .as_i64()
            .ok_or_else(|| {
                Error::UnexpectedValue(METHOD.to_string(), "integer")
            })?;
        if vcpus <= 0 {
            return Err(Error::InvalidVcpuCount(name.to_string()));
        }

        let mut total = 0.0;
        for index in 0..vcpus {
            total += self.query_data_source(vm, &format!("cpu{index}")).await?;
        }
        Ok(total / vcpus as f64 * 100.0)
    }

    async fn memory_usage(&self, vm: &Ref<Vm>) -> Result<f64> {
        let total = self.query_data_source(vm, "memory").await?;
        /* Only reported when the guest runs the PV tools. */
        let free = match self
            .query_data_source(vm, "memory_internal_free")
            .await
        {
            Ok(free) => free,
            Err(e) if e.is_api_failure() => {
                warn!("no free memory reported for {vm}, assuming 0: {e}");
                0.0
            }
            Err(e) => return Err(e),
        };
        Ok((total - free * KIB) / MIB)
    }

    async fn query_data_source(&self, vm: &Ref<Vm>, name: &str) -> Result<f64> {
        const METHOD: &str = "VM.query_data_source";
        self.session
            .call(METHOD, vec![Value::from(vm), Value::from(name)])
            .await?
            .as_f64()
            .ok_or_else(|| Error::UnexpectedValue(METHOD.to_string(), "number"))
    }

    async fn domid(&self, vm: &Ref<Vm>) -> Result<String> {
        const METHOD: &str = "VM.get_domid";
        self.session
            .call(METHOD, vec![Value::from(vm)])
            .await?
            .to_key()
            .ok_or_else(|| Error::UnexpectedValue(METHOD.to_string(), "domid"))
    }

    async fn devices<C: Class>(
        &self,
        method: &str,
        vm: &Ref<Vm>,
    ) -> Result<Vec<Ref<C>>> {
        let result = self.session.call(method, vec![Value::from(vm)]).await?;
        Ref::list_from_value(&result, method)
    }

    async fn vif_record(&self, vif: &Ref<Vif>) -> Result<VifRecord> {
        let result = self
            .session
            .call("VIF.get_record", vec![Value::from(vif)])
            .await?;
        VifRecord::from_value(&result)
    }

    async fn vbd_record(&self, vbd: &Ref<Vbd>) -> Result<VbdRecord> {
        let result = self
            .session
            .call("VBD.get_record", vec![Value::from(vbd)])
            .await?;
        VbdRecord::from_value(&result)
    }
}

#[async_trait]
impl<T: Transport + 'static> Inspector for XenApiInspector<T> {
    type Error = Error;
    const NAME: &'static str = "xenapi";

    async fn inspect_instance(
        &self,
        instance: &Instance,
        _duration: Option<Duration>,
    ) -> Result<InstanceStats> {
        let name = instance.instance_name();
        debug!("inspecting {instance}");
        let vm = self.lookup_by_name(name).await?;
        Ok(InstanceStats {
            cpu_util: self.cpu_usage(&vm, name).await?,
            memory_usage: self.memory_usage(&vm).await?,
        })
    }

    async fn inspect_vnics<'a>(
        &'a self,
        instance: &'a Instance,
    ) -> Result<VnicStream<'a, Error>> {
        let vm = self.lookup_by_name(instance.instance_name()).await?;
        let domid = self.domid(&vm).await?;
        let vifs: Vec<Ref<Vif>> = self.devices("VM.get_VIFs", &vm).await?;
        let mut snapshot = self.session.fetch_all_bandwidth().await?;
        let domain: Arc<HashMap<String, VifBandwidth>> =
            Arc::new(snapshot.remove(&domid).unwrap_or_default());
        debug!("{instance}: {} vifs in domain {domid}", vifs.len());

        Ok(until_error(vifs, move |vif| {
            let domain = domain.clone();
            let domid = domid.clone();
            async move {
                let record = self.vif_record(&vif).await?;
                let bandwidth = domain.get(&record.device).ok_or_else(|| {
                    Error::MissingBandwidth {
                        domid,
                        device: record.device.clone(),
                    }
                })?;
                let stats = InterfaceStats::from_bytes(
                    bandwidth.bw_in,
                    bandwidth.bw_out,
                );
                Ok::<_, Error>((interface(record), stats))
            }
        }))
    }

    async fn inspect_vnic_rates<'a>(
        &'a self,
        instance: &'a Instance,
        _duration: Option<Duration>,
    ) -> Result<VnicRateStream<'a, Error>> {
        let vm = self.lookup_by_name(instance.instance_name()).await?;
        let vifs: Vec<Ref<Vif>> = self.devices("VM.get_VIFs", &vm).await?;

        Ok(until_error(vifs, move |vif| {
            let vm = vm.clone();
            async move {
                let record = self.vif_record(&vif).await?;
                let device = &record.device;
                let stats = InterfaceRateStats {
                    rx_rate: self
                        .query_data_source(&vm, &format!("vif_{device}_rx"))
                        .await?,
                    tx_rate: self
                        .query_data_source(&vm, &format!("vif_{device}_tx"))
                        .await?,
                };
                Ok::<_, Error>((interface(record), stats))
            }
        }))
    }

    async fn inspect_disk_rates<'a>(
        &'a self,
        instance: &'a Instance,
        _duration: Option<Duration>,
    ) -> Result<DiskRateStream<'a, Error>> {
        let vm = self.lookup_by_name(instance.instance_name()).await?;
        let vbds: Vec<Ref<Vbd>> = self.devices("VM.get_VBDs", &vm).await?;

        Ok(until_error(vbds, move |vbd| {
            let vm = vm.clone();
            async move {
                let VbdRecord { device } = self.vbd_record(&vbd).await?;
                let read = self
                    .query_data_source(&vm, &format!("vbd_{device}_read"))
                    .await?;
                let write = self
                    .query_data_source(&vm, &format!("vbd_{device}_write"))
                    .await?;
                Ok::<_, Error>((
                    Disk { device },
                    DiskRateStats::from_bytes_rates(read, write),
                ))
            }
        }))
    }
}

fn interface(record: VifRecord) -> Interface {
    Interface::new(record.uuid, record.mac)
}

/// Run `fetch` for each of `items` in turn, ending the stream right after
/// the first error. Nothing after a failed element is fetched.
fn until_error<'a, I, F, Fut, R>(
    items: I,
    fetch: F,
) -> BoxStream<'a, Result<R>>
where
    I: IntoIterator,
    I::Item: Send,
    I::IntoIter: Send + 'a,
    F: FnMut(I::Item) -> Fut + Send + 'a,
    Fut: Future<Output = Result<R>> + Send + 'a,
    R: Send + 'a,
{
    stream::unfold(
        (items.into_iter(), fetch, false),
        |(mut items, mut fetch, failed)| async move {
            if failed {
                return None;
            }
            let item = fetch(items.next()?).await;
            let failed = item.is_err();
            Some((item, (items, fetch, failed)))
        },
    )
    .boxed()
}
