#[macro_use]
extern crate tracing;

#[macro_use]
mod display;

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod proxy;
pub mod signal;

pub use self::config::PortConfig;
pub use self::proxy::{ManagerOptions, ProxyManager};
pub use self::proxy::stats::{ProxyStats, Status};
pub use self::proxy::error::{RelayError, RunError};
