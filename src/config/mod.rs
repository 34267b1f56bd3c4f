//! Port list discovery and parsing.
//!
//! The file is plain text with one `PORT[:DESCRIPTION]` entry per line.
//! Blank lines and lines starting with `#` are ignored.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

mod port;

pub use self::port::{ParsePortError, PortConfig};

/// Name of the file searched for by [`discover`].
pub const FILE_NAME: &str = ".proxy.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no .proxy.conf file found in {} or any parent directory", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no valid port configurations found in {}", .0.display())]
    Empty(PathBuf),
}

/// Finds [`FILE_NAME`] in `start` or the closest ancestor that has one.
pub fn discover(start: &Path) -> Result<PathBuf, ConfigError> {
    start
        .ancestors()
        .map(|dir| dir.join(FILE_NAME))
        .find(|path| path.is_file())
        .ok_or_else(|| ConfigError::NotFound(start.to_owned()))
}

/// Parses every valid entry of `s`, in file order.
///
/// Lines whose port does not parse are skipped with a warning.
pub fn parse(s: &str) -> Vec<PortConfig> {
    s.lines()
        .map(str::trim)
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .filter(|(_, line)| !line.starts_with('#'))
        .filter_map(|(i, line)| match line.parse() {
            Ok(x) => Some(x),
            Err(e) => {
                warn!("line {}: skipping entry: {e}", i + 1);
                None
            }
        })
        .collect()
}

/// Reads and parses `path`. An empty result is an error.
pub async fn read<P>(path: P) -> Result<Vec<PortConfig>, ConfigError>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();

    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;

    let ports = parse(&data);
    if ports.is_empty() {
        return Err(ConfigError::Empty(path.to_owned()));
    }

    Ok(ports)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn parses_entries_in_order() {
        let data = "\
# services
8080:web

9090
  3000:api: v2
";

        let ports = parse(data);
        assert_eq!(
            ports,
            vec![
                PortConfig::new("8080", "web"),
                PortConfig::new("9090", ""),
                PortConfig::new("3000", "api: v2"),
            ]
        );
    }

    #[test]
    fn skips_invalid_ports() {
        let ports = parse("http:web\n70000:too big\n22:ssh\n");
        assert_eq!(ports, vec![PortConfig::new("22", "ssh")]);
    }

    #[test]
    fn discovers_in_ancestor() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join(FILE_NAME), "8080\n").unwrap();

        let found = discover(&nested).unwrap();
        assert_eq!(found, root.path().join(FILE_NAME));
    }

    #[test]
    fn nearest_file_wins() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join(FILE_NAME), "8080\n").unwrap();
        fs::write(nested.join(FILE_NAME), "9090\n").unwrap();

        assert_eq!(discover(&nested).unwrap(), nested.join(FILE_NAME));
    }

    #[test]
    fn directory_with_config_name_is_not_a_match() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a");
        fs::create_dir_all(nested.join(FILE_NAME)).unwrap();
        fs::write(root.path().join(FILE_NAME), "8080\n").unwrap();

        assert_eq!(discover(&nested).unwrap(), root.path().join(FILE_NAME));
    }

    #[tokio::test]
    async fn read_rejects_file_without_entries() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join(FILE_NAME);
        fs::write(&path, "# nothing here\n\nabc\n").unwrap();

        let e = read(&path).await.unwrap_err();
        assert!(matches!(e, ConfigError::Empty(_)));
    }

    #[tokio::test]
    async fn read_missing_file_fails() {
        let root = tempfile::tempdir().unwrap();

        let e = read(root.path().join(FILE_NAME)).await.unwrap_err();
        assert!(matches!(e, ConfigError::Read { .. }));
    }
}
