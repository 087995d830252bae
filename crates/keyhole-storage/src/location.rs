use keyhole_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

/// Identifies a backing store: a database file or a process-local in-memory database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StoreLocation {
    InMemory,
    Path(PathBuf),
}

const IN_MEMORY_MARKERS: [&str; 3] = [":memory:", "memory", "in-memory"];

impl FromStr for StoreLocation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::InvalidStore(
                "store location cannot be empty".to_string(),
            ));
        }
        if IN_MEMORY_MARKERS.contains(&s) {
            return Ok(Self::InMemory);
        }
        Ok(Self::Path(PathBuf::from(s)))
    }
}

impl TryFrom<String> for StoreLocation {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StoreLocation> for String {
    fn from(value: StoreLocation) -> Self {
        value.to_string()
    }
}

impl Display for StoreLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreLocation::InMemory => f.write_str(":memory:"),
            StoreLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_in_memory_markers() {
        for marker in IN_MEMORY_MARKERS {
            assert_eq!(marker.parse::<StoreLocation>().unwrap(), StoreLocation::InMemory);
        }
    }

    #[test]
    fn parses_paths() {
        assert_eq!(
            "/var/lib/keyhole/links.db".parse::<StoreLocation>().unwrap(),
            StoreLocation::Path(PathBuf::from("/var/lib/keyhole/links.db"))
        );
    }

    #[test]
    fn rejects_blank() {
        assert!("  ".parse::<StoreLocation>().is_err());
    }
}
