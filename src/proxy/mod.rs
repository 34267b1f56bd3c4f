//! The relay core: one [`Relay`] per configured port, all sharing a single
//! [`StatsTable`] owned by the [`ProxyManager`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::config::PortConfig;

pub mod error;
pub mod probe;
pub mod relay;
pub mod route;
pub mod splice;
pub mod stats;

use self::error::RunError;
use self::relay::Relay;
use self::route::{Mode, Route};
use self::stats::{ProxyStats, StatsTable};

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Upper bound for each relay's preflight dial.
    pub probe_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(10),
        }
    }
}

/// Starts relays and exposes their statistics.
///
/// Cloning is cheap and every clone observes the same table, so one clone
/// can drive a `run_*` call while another is polled by a dashboard.
#[derive(Debug, Clone, Default)]
pub struct ProxyManager {
    stats: Arc<StatsTable>,
    opts: ManagerOptions,
}

impl ProxyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(opts: ManagerOptions) -> Self {
        Self {
            stats: Arc::default(),
            opts,
        }
    }

    /// A copy of every port's statistics at this instant.
    pub fn snapshot(&self) -> HashMap<String, ProxyStats> {
        self.stats.snapshot()
    }

    /// Forwards `localhost:<port>` to `<remote_host>:<port>` for every entry.
    ///
    /// Returns once every relay has terminated, which only happens when all
    /// of them failed their preflight check or bind. Per-port failures are
    /// reported through the stats table, not the return value.
    pub async fn run_config_forward_mode(
        &self,
        remote_host: &str,
        ports: &[PortConfig],
    ) -> Result<(), RunError> {
        let mode = Mode::Forward {
            remote_host: remote_host.to_owned(),
        };
        self.run_config(&mode, ports).await
    }

    /// Exposes `localhost:<port>` on `0.0.0.0:<port>` for every entry.
    pub async fn run_config_reverse_mode(&self, ports: &[PortConfig]) -> Result<(), RunError> {
        self.run_config(&Mode::Reverse, ports).await
    }

    /// Forwards `localhost:<local_port>` to `remote_addr`.
    pub async fn run_single_forward_proxy(
        &self,
        remote_addr: &str,
        local_port: &str,
    ) -> Result<(), RunError> {
        let route = Route::forward(local_port, "Manual forward proxy", remote_addr);
        self.run_single(route).await
    }

    /// Exposes `localhost:<local_port>` on `0.0.0.0:<external_port>`.
    pub async fn run_single_reverse_proxy(
        &self,
        local_port: &str,
        external_port: &str,
    ) -> Result<(), RunError> {
        let route = Route::reverse(local_port, "Manual reverse proxy", external_port);
        self.run_single(route).await
    }

    async fn run_single(&self, route: Route) -> Result<(), RunError> {
        match self.relay(route).run().await {
            Ok(never) => match never {},
            Err(e) => Err(e.into()),
        }
    }

    async fn run_config(&self, mode: &Mode, ports: &[PortConfig]) -> Result<(), RunError> {
        if ports.is_empty() {
            return Err(RunError::NoPorts);
        }

        let mut relays = JoinSet::new();

        for config in ports {
            let relay = self.relay(mode.route(config));
            relays.spawn(relay.run());
        }

        let mut failed = 0usize;
        while let Some(r) = relays.join_next().await {
            match r {
                Ok(Ok(never)) => match never {},
                Ok(Err(e)) => {
                    failed += 1;
                    debug!("relay for {} stopped: {e}", e.addr());
                }
                Err(e) => {
                    failed += 1;
                    error!("relay task aborted: {e}");
                }
            }
        }

        warn!("all {failed} relays have stopped");
        Ok(())
    }

    fn relay(&self, route: Route) -> Relay {
        Relay::new(route, Arc::clone(&self.stats), self.opts.probe_timeout)
    }
}
