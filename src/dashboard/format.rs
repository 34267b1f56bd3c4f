use std::cmp::Ordering;

use chrono::{DateTime, Local};

use crate::proxy::stats::ProxyStats;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

pub fn format_bytes(n: u64) -> String {
    match n {
        n if n < KIB => format!("{n}B"),
        n if n < MIB => format!("{:.1}KB", n as f64 / KIB as f64),
        n if n < GIB => format!("{:.1}MB", n as f64 / MIB as f64),
        n => format!("{:.1}GB", n as f64 / GIB as f64),
    }
}

/// Relative age of `t` as seen at `now`, falling back to a date after a day.
pub fn format_time(t: Option<DateTime<Local>>, now: DateTime<Local>) -> String {
    let Some(t) = t else {
        return "Never".to_owned();
    };

    let age = now.signed_duration_since(t);
    if age.num_minutes() < 1 {
        format!("{}s ago", age.num_seconds().max(0))
    } else if age.num_hours() < 1 {
        format!("{}m ago", age.num_minutes())
    } else if age.num_days() < 1 {
        format!("{}h ago", age.num_hours())
    } else {
        t.format("%b %-d %H:%M").to_string()
    }
}

/// Busy ports first, then most recently active, then by port number.
pub fn sort_rows(rows: &mut [ProxyStats]) {
    rows.sort_by(|a, b| {
        let busy = |x: &ProxyStats| x.active_connections > 0;

        busy(b)
            .cmp(&busy(a))
            .then_with(|| b.last_activity.cmp(&a.last_activity))
            .then_with(|| by_port(a, b))
    });
}

fn by_port(a: &ProxyStats, b: &ProxyStats) -> Ordering {
    match (a.port.parse::<u16>(), b.port.parse::<u16>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.port.cmp(&b.port),
    }
}

/// Cuts `s` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }

    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
