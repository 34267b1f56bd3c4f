use crate::config::PortConfig;

/// Addressing direction shared by every port of a manager run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Listen on `localhost:<port>` and tunnel to `<remote_host>:<port>`.
    Forward { remote_host: String },
    /// Listen on `0.0.0.0:<port>` and tunnel to `localhost:<port>`.
    Reverse,
}

impl Mode {
    pub fn route(&self, config: &PortConfig) -> Route {
        let description = config.display_description();

        match self {
            Self::Forward { remote_host } => Route::forward(
                &config.port,
                &description,
                &join_host_port(remote_host, &config.port),
            ),
            Self::Reverse => Route::reverse(&config.port, &description, &config.port),
        }
    }
}

/// Everything one relay needs to know about its port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Stats table key.
    pub port: String,
    pub description: String,
    /// Address the listener binds.
    pub bind: String,
    /// Address every accepted connection is spliced to.
    pub target: String,
    /// The localhost side, for display.
    pub local_addr: String,
    /// The other side, for display.
    pub remote_addr: String,
    /// Status reason used when the preflight check fails.
    pub probe_failure: &'static str,
}

impl Route {
    pub fn forward(port: &str, description: &str, target: &str) -> Self {
        let bind = join_host_port("localhost", port);

        Self {
            port: port.to_owned(),
            description: description.to_owned(),
            local_addr: bind.clone(),
            remote_addr: target.to_owned(),
            bind,
            target: target.to_owned(),
            probe_failure: "Remote unavailable",
        }
    }

    pub fn reverse(local_port: &str, description: &str, external_port: &str) -> Self {
        let target = join_host_port("localhost", local_port);
        let bind = join_host_port("0.0.0.0", external_port);

        Self {
            port: local_port.to_owned(),
            description: description.to_owned(),
            local_addr: target.clone(),
            remote_addr: bind.clone(),
            bind,
            target,
            probe_failure: "Local service unavailable",
        }
    }
}

fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
