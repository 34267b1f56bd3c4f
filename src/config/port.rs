use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;

/// One configured relay endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    /// Decimal port number, kept as written. Also the stats key.
    pub port: String,
    /// Free text, possibly empty.
    pub description: String,
}

impl PortConfig {
    pub fn new(port: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            description: description.into(),
        }
    }

    /// The description, or `port <port>` when none was given.
    pub fn display_description(&self) -> String {
        if self.description.is_empty() {
            format!("port {}", self.port)
        } else {
            self.description.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid port '{port}': {source}")]
pub struct ParsePortError {
    port: String,
    #[source]
    source: ParseIntError,
}

impl FromStr for PortConfig {
    type Err = ParsePortError;

    // Syntax: <port>[:<description>]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (port, description) = s.split_once(':').unwrap_or((s, ""));

        if let Err(source) = port.parse::<u16>() {
            return Err(ParsePortError {
                port: port.to_owned(),
                source,
            });
        }

        Ok(Self::new(port, description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_and_description() {
        let x: PortConfig = "8080:web".parse().unwrap();
        assert_eq!(x, PortConfig::new("8080", "web"));
    }

    #[test]
    fn port_only_has_empty_description() {
        let x: PortConfig = "9090".parse().unwrap();
        assert_eq!(x.description, "");
        assert_eq!(x.display_description(), "port 9090");
    }

    #[test]
    fn description_keeps_later_colons() {
        let x: PortConfig = "5432:db:primary:rw".parse().unwrap();
        assert_eq!(x.description, "db:primary:rw");
    }

    #[test]
    fn empty_description_after_colon() {
        let x: PortConfig = "22:".parse().unwrap();
        assert_eq!(x, PortConfig::new("22", ""));
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        let e = "web:8080".parse::<PortConfig>().unwrap_err();
        assert_eq!(e.to_string(), "invalid port 'web': invalid digit found in string");
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        assert!("65536:big".parse::<PortConfig>().is_err());
        assert!("-1".parse::<PortConfig>().is_err());
    }

    #[test]
    fn whitespace_around_port_is_rejected() {
        let e = "8080 :web".parse::<PortConfig>().unwrap_err();
        assert_eq!(e.to_string(), "invalid port '8080 ': invalid digit found in string");

        assert!(" 8080".parse::<PortConfig>().is_err());
    }
}
