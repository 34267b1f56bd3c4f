//! A terminal view over [`ProxyManager::snapshot`]. It only ever reads.

use std::fmt::Write as _;
use std::io;
use std::time::Duration;

use chrono::{DateTime, Local};
use owo_colors::OwoColorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tokio::time::{MissedTickBehavior, interval};

use crate::proxy::ProxyManager;
use crate::proxy::stats::{ProxyStats, Status};

mod format;
mod terminal;

pub use self::format::{format_bytes, format_time, sort_rows, truncate};

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(2);

const DESCRIPTION_WIDTH: usize = 24;

#[derive(Debug)]
pub struct Dashboard {
    manager: ProxyManager,
    refresh: Duration,
}

impl Dashboard {
    pub fn new(manager: ProxyManager) -> Self {
        Self {
            manager,
            refresh: REFRESH_INTERVAL,
        }
    }

    /// Redraws the table on the alternate screen. Returns once the user
    /// presses a quit key, or with the error that broke the terminal.
    pub async fn run(self) -> io::Result<()> {
        let mut screen = terminal::Screen::enter()?;
        let mut quit = terminal::quit_keys();

        let mut ticker = interval(self.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let frame = render(self.manager.snapshot().into_values().collect(), Local::now());
                    screen.draw(&frame)?;
                }

                r = &mut quit => {
                    // A dropped sender means the key thread panicked.
                    return r.unwrap_or(Ok(()));
                }
            }
        }
    }
}

#[derive(Debug, Tabled)]
struct Row {
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Total")]
    total: u64,
    #[tabled(rename = "Data", display = "display_bytes")]
    bytes: u64,
    #[tabled(rename = "Last Activity")]
    last_activity: String,
}

impl Row {
    fn new(stats: &ProxyStats, now: DateTime<Local>) -> Self {
        let status = match stats.status {
            Status::Active => stats.status.bright_green().bold().to_string(),
            Status::Starting => stats.status.yellow().bold().to_string(),
            Status::Failed(_) => stats.status.bright_red().bold().to_string(),
        };

        let active = if stats.active_connections > 0 {
            stats.active_connections.yellow().bold().to_string()
        } else {
            stats.active_connections.yellow().to_string()
        };

        Self {
            port: stats.port.bright_blue().bold().to_string(),
            description: truncate(&stats.description, DESCRIPTION_WIDTH),
            status,
            active,
            total: stats.total_connections,
            bytes: stats.bytes_transferred,
            last_activity: format_time(stats.last_activity, now),
        }
    }
}

fn display_bytes(n: &u64) -> String {
    format_bytes(*n)
}

/// Renders one full frame of the dashboard.
pub fn render(mut rows: Vec<ProxyStats>, now: DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}\n", " TCP Proxy Dashboard ".bold().on_purple());

    if rows.is_empty() {
        let _ = writeln!(
            out,
            "{}\n{}",
            "No active proxies found.".dimmed(),
            "Make sure you have a .proxy.conf file and services running.".dimmed()
        );
    } else {
        sort_rows(&mut rows);

        let mut table = Table::new(rows.iter().map(|x| Row::new(x, now)));
        table.with(Style::rounded());
        let _ = writeln!(out, "{table}");
    }

    let _ = writeln!(
        out,
        "\n{}",
        "Press 'q' or Ctrl+C to quit • Updates every 2 seconds"
            .dimmed()
            .italic()
    );
    out
}
