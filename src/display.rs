use std::fmt::{self, Display, Formatter, Result};

use owo_colors::OwoColorize;

use crate::proxy::stats::Status;

#[doc(hidden)]
pub struct DebugDisplay<T>(T);

impl<T> Display for DebugDisplay<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

#[doc(hidden)]
#[expect(non_camel_case_types)]
pub struct _display<'a, T: ?Sized>(pub &'a T);

impl<'a, T: ?Sized> Display for _display<'a, &T>
where
    _display<'a, T>: Display,
{
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        _display(*self.0).fmt(f)
    }
}

/// Wraps a value so it is rendered with a colour matching its kind in log lines.
macro_rules! display {
    ($x:expr) => {{ $crate::display::_display(&$x) }};
}

impl Display for _display<'_, std::io::Error> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        self.0.bright_red().fmt(f)
    }
}

impl Display for _display<'_, std::time::Duration> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        DebugDisplay(self.0).dimmed().fmt(f)
    }
}

impl Display for _display<'_, std::net::SocketAddr> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        self.0.bright_yellow().fmt(f)
    }
}

// Relay endpoints are kept as `host:port` strings since hosts may be names.
impl Display for _display<'_, str> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        self.0.bright_yellow().fmt(f)
    }
}

impl Display for _display<'_, String> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        _display(self.0.as_str()).fmt(f)
    }
}

impl Display for _display<'_, Status> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.0 {
            Status::Active => self.0.bright_green().fmt(f),
            Status::Starting => self.0.yellow().fmt(f),
            Status::Failed(_) => self.0.bright_red().fmt(f),
        }
    }
}
