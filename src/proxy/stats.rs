//! Per-port runtime statistics shared by every relay and splice of a manager.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use chrono::{DateTime, Local};

/// Lifecycle state of one relay as shown to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Starting,
    Active,
    /// Terminal. Carries a short human readable cause.
    Failed(String),
}

impl Status {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => f.write_str("Starting"),
            Self::Active => f.write_str("Active"),
            Self::Failed(reason) => write!(f, "Failed - {reason}"),
        }
    }
}

/// A point-in-time copy of one port's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyStats {
    pub port: String,
    pub description: String,
    pub status: Status,
    pub active_connections: u64,
    pub total_connections: u64,
    pub bytes_transferred: u64,
    pub last_activity: Option<DateTime<Local>>,
    pub start_time: DateTime<Local>,
    pub local_addr: String,
    pub remote_addr: String,
}

/// The table of [`ProxyStats`] keyed by port.
///
/// Every mutation takes the table-wide write lock, so counter updates to the
/// same record can never be lost. Readers only ever get owned copies through
/// [`StatsTable::snapshot`]. Operations naming a port that was never
/// registered are ignored.
#[derive(Debug, Default)]
pub struct StatsTable {
    records: RwLock<HashMap<String, ProxyStats>>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `Starting` record for `port`, replacing any previous one.
    pub fn register(&self, port: &str, description: &str, local_addr: &str, remote_addr: &str) {
        let record = ProxyStats {
            port: port.to_owned(),
            description: description.to_owned(),
            status: Status::Starting,
            active_connections: 0,
            total_connections: 0,
            bytes_transferred: 0,
            last_activity: None,
            start_time: Local::now(),
            local_addr: local_addr.to_owned(),
            remote_addr: remote_addr.to_owned(),
        };

        self.write().insert(port.to_owned(), record);
    }

    pub fn set_status(&self, port: &str, status: Status) {
        self.update(port, |x| x.status = status);
    }

    pub fn record_connection_start(&self, port: &str) {
        self.update(port, |x| {
            x.active_connections += 1;
            x.total_connections += 1;
            x.last_activity = Some(Local::now());
        });
    }

    pub fn record_connection_end(&self, port: &str) {
        self.update(port, |x| {
            x.active_connections = x.active_connections.saturating_sub(1);
        });
    }

    pub fn record_bytes(&self, port: &str, n: u64) {
        self.update(port, |x| {
            x.bytes_transferred += n;
            x.last_activity = Some(Local::now());
        });
    }

    /// Owned copies of every record, independent of later mutation.
    pub fn snapshot(&self) -> HashMap<String, ProxyStats> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update<F>(&self, port: &str, f: F)
    where
        F: FnOnce(&mut ProxyStats),
    {
        match self.write().get_mut(port) {
            Some(record) => f(record),
            None => debug!("ignoring stats update for unregistered port {port}"),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ProxyStats>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn register_starts_in_starting_state() {
        let table = StatsTable::new();
        table.register("8080", "web", "localhost:8080", "example.com:8080");

        let snapshot = table.snapshot();
        let x = &snapshot["8080"];
        assert_eq!(x.status, Status::Starting);
        assert_eq!(x.description, "web");
        assert_eq!(x.active_connections, 0);
        assert_eq!(x.total_connections, 0);
        assert_eq!(x.bytes_transferred, 0);
        assert!(x.last_activity.is_none());
    }

    #[test]
    fn failed_status_display_carries_reason() {
        let status = Status::failed("Cannot bind");
        assert_eq!(status.to_string(), "Failed - Cannot bind");
        assert!(status.is_failed());
        assert!(!Status::Active.is_failed());
    }

    #[test]
    fn unregistered_port_is_ignored() {
        let table = StatsTable::new();
        table.record_connection_start("1234");
        table.record_bytes("1234", 10);
        table.set_status("1234", Status::Active);

        assert!(table.snapshot().is_empty());
    }

    #[test]
    fn connection_end_never_goes_negative() {
        let table = StatsTable::new();
        table.register("9090", "port 9090", "localhost:9090", "0.0.0.0:9090");
        table.record_connection_end("9090");

        assert_eq!(table.snapshot()["9090"].active_connections, 0);
    }

    #[test]
    fn snapshot_is_detached_from_table() {
        let table = StatsTable::new();
        table.register("8080", "web", "a", "b");

        let before = table.snapshot();
        table.record_bytes("8080", 42);

        assert_eq!(before["8080"].bytes_transferred, 0);
        assert_eq!(table.snapshot()["8080"].bytes_transferred, 42);
        assert!(table.snapshot()["8080"].last_activity.is_some());
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let table = Arc::new(StatsTable::new());
        table.register("8080", "web", "a", "b");

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        table.record_connection_start("8080");
                        table.record_bytes("8080", 3);
                        table.record_connection_end("8080");
                    }
                })
            })
            .collect();

        for x in workers {
            x.join().unwrap();
        }

        let x = &table.snapshot()["8080"];
        assert_eq!(x.total_connections, 8000);
        assert_eq!(x.active_connections, 0);
        assert_eq!(x.bytes_transferred, 24000);
    }

    #[test]
    fn total_is_high_water_of_active() {
        let table = StatsTable::new();
        table.register("8080", "web", "a", "b");

        for _ in 0..3 {
            table.record_connection_start("8080");
        }
        table.record_connection_end("8080");

        let x = &table.snapshot()["8080"];
        assert_eq!(x.active_connections, 2);
        assert_eq!(x.total_connections, 3);
        assert!(x.total_connections >= x.active_connections);
    }
}
