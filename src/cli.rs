use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const EXAMPLES: &str = "\
Examples:
  portrelay                                    # forward every port in .proxy.conf
  portrelay -r                                 # reverse every port in .proxy.conf
  portrelay myserver.tailnet.ts.net:8080 3000  # forward localhost:3000 to myserver:8080
  portrelay -r 8080 8080                       # expose localhost:8080 on 0.0.0.0:8080";

/// Relay TCP ports between this host and another.
#[derive(Debug, Parser)]
#[command(version, about, after_help = EXAMPLES)]
pub struct Args {
    /// Expose local services on external ports instead of tunnelling out.
    #[arg(short, long)]
    pub reverse: bool,

    /// Forward: <remote>:<port>. Reverse: <local-port>.
    pub first: Option<String>,

    /// Forward: <local-port>. Reverse: <external-port>.
    pub second: Option<String>,

    /// Remote host used for every port in config forward mode.
    #[arg(long, env = "PROXY_REMOTE_HOST")]
    pub remote_host: Option<String>,

    /// Port list to use instead of searching for .proxy.conf.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seconds to wait for each target during the startup check.
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub probe_timeout: u64,

    /// Show a live table of every port instead of only logging.
    #[arg(short, long)]
    pub dashboard: bool,
}

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    ConfigForward,
    ConfigReverse,
    SingleForward {
        remote_addr: String,
        local_port: String,
    },
    SingleReverse {
        local_port: String,
        external_port: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("expected both {0} and {1}")]
    MissingArgument(&'static str, &'static str),

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("remote address '{0}' must be <host>:<port>")]
    InvalidRemote(String),
}

impl Args {
    /// Log level used when `RUST_LOG` is unset. The dashboard owns the
    /// screen, so only problems are logged next to it.
    pub fn default_log_filter(&self) -> &'static str {
        if self.dashboard { "warn" } else { "info" }
    }

    pub fn invocation(&self) -> Result<Invocation, UsageError> {
        use UsageError::*;

        match (self.reverse, self.first.as_deref(), self.second.as_deref()) {
            (false, None, _) => Ok(Invocation::ConfigForward),
            (true, None, _) => Ok(Invocation::ConfigReverse),

            (false, Some(_), None) => Err(MissingArgument("<remote>:<port>", "<local-port>")),
            (true, Some(_), None) => Err(MissingArgument("<local-port>", "<external-port>")),

            (false, Some(remote), Some(local)) => {
                match remote.rsplit_once(':') {
                    Some((host, port)) if !host.is_empty() && is_port(port) => {}
                    _ => return Err(InvalidRemote(remote.to_owned())),
                }

                Ok(Invocation::SingleForward {
                    remote_addr: remote.to_owned(),
                    local_port: port(local)?,
                })
            }

            (true, Some(local), Some(external)) => Ok(Invocation::SingleReverse {
                local_port: port(local)?,
                external_port: port(external)?,
            }),
        }
    }
}

fn is_port(s: &str) -> bool {
    s.parse::<u16>().is_ok()
}

fn port(s: &str) -> Result<String, UsageError> {
    if is_port(s) {
        Ok(s.to_owned())
    } else {
        Err(UsageError::InvalidPort(s.to_owned()))
    }
}

/// Asks for the remote host on the terminal. `None` if stdin is not a
/// terminal or the answer was empty.
pub async fn prompt_remote_host() -> std::io::Result<Option<String>> {
    if !std::io::stdin().is_terminal() {
        return Ok(None);
    }

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"Enter remote host (e.g., work-mbp.tailnet.ts.net): ")
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;

    let host = line.trim();
    Ok((!host.is_empty()).then(|| host.to_owned()))
}
