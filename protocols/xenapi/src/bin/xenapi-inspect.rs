/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use futures::TryStreamExt;
use log::{debug, error, warn};
use serde::Serialize;

use inspector::{Inspector, InspectorError, Instance};
use logger::Verbosity;
use xenapi_protocol::rpc::Transport;
use xenapi_protocol::{Config, HttpsStrategy, Password, Result, XenApiInspector};

/// Print statistics of a VM on a XenServer / XCP-ng pool as json lines.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Name label of the VM to inspect.
    instance: String,
    /// Which statistics to print.
    #[arg(value_enum, default_value_t = Metric::All)]
    metric: Metric,
    /// Uuid to report for the instance. Defaults to the name label.
    #[arg(long)]
    uuid: Option<String>,
    /// Json connection config. Command line options take precedence.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// XAPI url, or unix://local for the local socket.
    #[arg(long)]
    url: Option<String>,
    #[arg(short, long)]
    username: Option<String>,
    #[arg(short, long)]
    password: Option<String>,
    /// Accept any certificate presented by the server.
    #[arg(long)]
    insecure: bool,
    /// Request timeout in seconds.
    #[arg(short, long)]
    timeout: Option<u64>,
    /// Increase verbosity; may be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(ValueEnum, Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "kebab-case")]
enum Metric {
    Instance,
    Vnics,
    VnicRates,
    DiskRates,
    All,
}

#[derive(Serialize)]
struct Line<'a, D, S> {
    instance: &'a str,
    metric: Metric,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a D>,
    stats: &'a S,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = logger::init(Verbosity::from_occurrences(args.verbose)) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_instance_not_found() => {
            warn!("{e}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<()> {
    let config = args.config().await?;
    let inspector = XenApiInspector::new(&config).await?;
    debug!("connected to {}", inspector.session().url());

    let instance = Instance::new(
        args.uuid.clone().unwrap_or_else(|| args.instance.clone()),
        args.instance.clone(),
    );
    let result = print_metrics(&inspector, &instance, args.metric).await;
    inspector.into_session().logout().await;
    result
}

async fn print_metrics<T: Transport + 'static>(
    inspector: &XenApiInspector<T>,
    instance: &Instance,
    metric: Metric,
) -> Result<()> {
    let wanted = |m| metric == m || metric == Metric::All;

    if wanted(Metric::Instance) {
        let stats = inspector.inspect_instance(instance, None).await?;
        emit::<(), _>(instance, Metric::Instance, None, &stats)?;
    }
    if wanted(Metric::Vnics) {
        let mut vnics = inspector.inspect_vnics(instance).await?;
        while let Some((interface, stats)) = vnics.try_next().await? {
            emit(instance, Metric::Vnics, Some(&interface), &stats)?;
        }
    }
    if wanted(Metric::VnicRates) {
        let mut rates = inspector.inspect_vnic_rates(instance, None).await?;
        while let Some((interface, stats)) = rates.try_next().await? {
            emit(instance, Metric::VnicRates, Some(&interface), &stats)?;
        }
    }
    if wanted(Metric::DiskRates) {
        let mut rates = inspector.inspect_disk_rates(instance, None).await?;
        while let Some((disk, stats)) = rates.try_next().await? {
            emit(instance, Metric::DiskRates, Some(&disk), &stats)?;
        }
    }
    Ok(())
}

fn emit<D: Serialize, S: Serialize>(
    instance: &Instance,
    metric: Metric,
    device: Option<&D>,
    stats: &S,
) -> Result<()> {
    let line = Line {
        instance: &instance.uuid,
        metric,
        device,
        stats,
    };
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

impl Args {
    async fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path).await?,
            None => Config::default(),
        };
        if let Some(url) = &self.url {
            config.connection_url = Some(url.clone());
        }
        if let Some(username) = &self.username {
            config.connection_username = username.clone();
        }
        if let Some(password) = &self.password {
            config.connection_password =
                Some(Password::from(password.as_str()));
        }
        if self.insecure {
            config.https_strategy = HttpsStrategy::IgnoreCertificate;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = Some(timeout);
        }
        Ok(config)
    }
}
