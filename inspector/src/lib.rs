/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

//! Backend-neutral interface for hypervisor inspectors.
//!
//! A metering pipeline polls one or more [`Inspector`] implementations for
//! every instance it knows about. All backends report the same records,
//! using documented sentinels for values they cannot obtain.

mod error;
mod instance;
mod stats;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use error::{ErrorKind, InspectorError};
pub use instance::Instance;
pub use stats::{
    Disk, DiskRateStats, InstanceStats, Interface, InterfaceRateStats,
    InterfaceStats, UNSUPPORTED_COUNTER, UNSUPPORTED_RATE,
};

pub type VnicStream<'a, E> =
    BoxStream<'a, Result<(Interface, InterfaceStats), E>>;
pub type VnicRateStream<'a, E> =
    BoxStream<'a, Result<(Interface, InterfaceRateStats), E>>;
pub type DiskRateStream<'a, E> =
    BoxStream<'a, Result<(Disk, DiskRateStats), E>>;

/* Inspector interface */

#[async_trait]
pub trait Inspector: Send + Sync {
    /// Backend-specific error type.
    type Error: InspectorError + Send + Sync + 'static;

    /// The unique name of the backend.
    const NAME: &'static str;

    /// Cpu and memory usage of a running instance.
    async fn inspect_instance(
        &self,
        instance: &Instance,
        duration: Option<Duration>,
    ) -> Result<InstanceStats, Self::Error>;

    /// Cumulative traffic counters, one entry per virtual nic.
    async fn inspect_vnics<'a>(
        &'a self,
        instance: &'a Instance,
    ) -> Result<VnicStream<'a, Self::Error>, Self::Error>;

    /// Instantaneous traffic rates, one entry per virtual nic.
    async fn inspect_vnic_rates<'a>(
        &'a self,
        instance: &'a Instance,
        duration: Option<Duration>,
    ) -> Result<VnicRateStream<'a, Self::Error>, Self::Error>;

    /// Instantaneous disk throughput, one entry per virtual block device.
    async fn inspect_disk_rates<'a>(
        &'a self,
        instance: &'a Instance,
        duration: Option<Duration>,
    ) -> Result<DiskRateStream<'a, Self::Error>, Self::Error>;
}
