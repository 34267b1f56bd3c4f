use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, lookup_host};
use tracing::Instrument;

use super::error::RelayError;
use super::probe::probe;
use super::route::Route;
use super::splice::splice;
use super::stats::{StatsTable, Status};

/// Owns the lifecycle of one configured port: preflight, bind, accept.
pub struct Relay {
    route: Route,
    stats: Arc<StatsTable>,
    probe_timeout: Duration,
}

impl Relay {
    pub fn new(route: Route, stats: Arc<StatsTable>, probe_timeout: Duration) -> Self {
        Self {
            route,
            stats,
            probe_timeout,
        }
    }

    /// Runs the relay. Only returns if the preflight check or the bind
    /// failed; once the listener is up it accepts forever.
    pub async fn run(self) -> Result<Infallible, RelayError> {
        let span = error_span!("relay", port = self.route.port.as_str());
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) -> Result<Infallible, RelayError> {
        let Route {
            port,
            description,
            bind,
            target,
            local_addr,
            remote_addr,
            probe_failure,
        } = &self.route;

        self.stats.register(port, description, local_addr, remote_addr);

        info!(
            "starting {description}: {} -> {}",
            display!(bind),
            display!(target)
        );

        if let Err(source) = probe(target, self.probe_timeout).await {
            self.stats.set_status(port, Status::failed(*probe_failure));
            let e = RelayError::Preflight {
                addr: target.clone(),
                source,
            };
            error!("{description}: {e}");
            return Err(e);
        }

        let listener = match listen(bind).await {
            Ok(x) => x,
            Err(source) => {
                self.stats.set_status(port, Status::failed("Cannot bind"));
                let e = RelayError::Bind {
                    addr: bind.clone(),
                    source,
                };
                error!("{description}: {e}");
                return Err(e);
            }
        };

        self.stats.set_status(port, Status::Active);
        info!(
            "proxy {}: {} -> {} ({description})",
            display!(Status::Active),
            display!(bind),
            display!(target)
        );

        loop {
            let (client, peer) = match listener.accept().await {
                Ok(x) => x,
                Err(e) => {
                    warn!(
                        "failed to accept connection on {}: {}",
                        display!(bind),
                        display!(e)
                    );
                    continue;
                }
            };

            let stats = Arc::clone(&self.stats);
            let target = target.clone();
            let port = port.clone();

            let span = error_span!(
                "splice",
                port = port.as_str(),
                peer = peer.to_string(),
                to = target.as_str()
            );
            tokio::spawn(
                async move {
                    info!("new connection from {}", display!(peer));
                    splice(client, &target, &port, &stats).await;
                }
                .instrument(span),
            );
        }
    }
}

/// Binds `addr` on the first IPv4 address it resolves to. `localhost` often
/// resolves to `::1` first, which IPv4-only clients cannot reach.
async fn listen(addr: &str) -> io::Result<TcpListener> {
    let Some(addr) = pick_bind_addr(lookup_host(addr).await?) else {
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "address resolved to nothing",
        ));
    };

    debug!("binding {}", display!(addr));
    TcpListener::bind(addr).await
}

fn pick_bind_addr(addrs: impl IntoIterator<Item = SocketAddr>) -> Option<SocketAddr> {
    let mut first = None;

    for x in addrs {
        if x.is_ipv4() {
            return Some(x);
        }
        first.get_or_insert(x);
    }

    first
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(xs: &[&str]) -> Vec<SocketAddr> {
        xs.iter().map(|x| x.parse().unwrap()).collect()
    }

    #[test]
    fn ipv4_is_preferred() {
        let picked = pick_bind_addr(addrs(&["[::1]:8080", "127.0.0.1:8080"]));
        assert_eq!(picked, Some("127.0.0.1:8080".parse().unwrap()));
    }

    #[test]
    fn falls_back_to_first_address() {
        let picked = pick_bind_addr(addrs(&["[::1]:8080", "[fe80::1]:8080"]));
        assert_eq!(picked, Some("[::1]:8080".parse().unwrap()));

        assert_eq!(pick_bind_addr(Vec::new()), None);
    }

    #[tokio::test]
    async fn localhost_listener_takes_ipv4_connections() {
        let listener = listen("localhost:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.is_ipv4());

        let (client, accepted) = tokio::join!(
            tokio::net::TcpStream::connect(("127.0.0.1", addr.port())),
            listener.accept()
        );
        client.unwrap();
        accepted.unwrap();
    }
}
