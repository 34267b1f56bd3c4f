#[macro_use]
extern crate tracing;

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result, bail};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use portrelay::cli::{self, Args, Invocation};
use portrelay::config::{self, PortConfig};
use portrelay::dashboard::Dashboard;
use portrelay::signal::Signals;
use portrelay::{ManagerOptions, ProxyManager};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.default_log_filter()));

    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    match try_main(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn try_main(args: Args) -> Result<()> {
    let invocation = args.invocation()?;

    let manager = ProxyManager::with_options(ManagerOptions {
        probe_timeout: Duration::from_secs(args.probe_timeout),
    });

    let mut signals = Signals::new().context("failed to register signal handlers")?;

    let mut dashboard = args
        .dashboard
        .then(|| tokio::spawn(Dashboard::new(manager.clone()).run()));

    let finished = tokio::select! {
        r = run(&args, invocation, &manager) => {
            r?;
            true
        }

        name = signals.recv() => {
            info!("received {name}, exiting...");
            false
        }

        () = dashboard_closed(&mut dashboard) => false,
    };

    // Keep failed ports on screen until the user quits.
    if finished && dashboard.is_some() {
        info!("every relay has stopped, press q to exit");

        tokio::select! {
            name = signals.recv() => info!("received {name}, exiting..."),
            () = dashboard_closed(&mut dashboard) => {}
        }
    }

    Ok(())
}

/// Resolves when the user quits the dashboard. A dashboard that fails is
/// logged and forgotten so the relays keep running without it.
async fn dashboard_closed(handle: &mut Option<JoinHandle<io::Result<()>>>) {
    if let Some(x) = handle {
        let r = x.await;
        *handle = None;

        match r {
            Ok(Ok(())) => {
                info!("dashboard closed, exiting...");
                return;
            }
            Ok(Err(e)) => error!("dashboard stopped: {e}"),
            Err(e) => error!("dashboard task failed: {e}"),
        }
    }

    std::future::pending().await
}

async fn run(args: &Args, invocation: Invocation, manager: &ProxyManager) -> Result<()> {
    match invocation {
        Invocation::ConfigForward => {
            let ports = load_ports(args).await?;
            let remote_host = remote_host(args).await?;

            manager.run_config_forward_mode(&remote_host, &ports).await?;
        }

        Invocation::ConfigReverse => {
            let ports = load_ports(args).await?;

            manager.run_config_reverse_mode(&ports).await?;
        }

        Invocation::SingleForward {
            remote_addr,
            local_port,
        } => {
            manager
                .run_single_forward_proxy(&remote_addr, &local_port)
                .await?;
        }

        Invocation::SingleReverse {
            local_port,
            external_port,
        } => {
            manager
                .run_single_reverse_proxy(&local_port, &external_port)
                .await?;
        }
    }

    Ok(())
}

async fn load_ports(args: &Args) -> Result<Vec<PortConfig>> {
    let path = match &args.config {
        Some(x) => x.clone(),
        None => {
            let cwd = std::env::current_dir().context("cannot determine working directory")?;
            config::discover(&cwd)?
        }
    };

    let ports = config::read(&path).await?;
    info!("using config file {} ({} ports)", path.display(), ports.len());
    Ok(ports)
}

async fn remote_host(args: &Args) -> Result<String> {
    if let Some(x) = args.remote_host.as_deref().filter(|x| !x.is_empty()) {
        return Ok(x.to_owned());
    }

    match cli::prompt_remote_host().await.context("cannot read remote host")? {
        Some(x) => Ok(x),
        None => {
            bail!("could not determine remote host, set PROXY_REMOTE_HOST or pass --remote-host")
        }
    }
}
