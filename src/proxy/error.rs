use std::io;

use thiserror::Error;

/// Why a relay stopped before it could start accepting.
///
/// Both variants are terminal for their own port only.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("cannot reach {addr}: {source}")]
    Preflight {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

impl RelayError {
    pub fn addr(&self) -> &str {
        match self {
            Self::Preflight { addr, .. } | Self::Bind { addr, .. } => addr,
        }
    }
}

/// Why a `run_*` entry point of the manager returned.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no ports configured")]
    NoPorts,

    #[error(transparent)]
    Relay(#[from] RelayError),
}
