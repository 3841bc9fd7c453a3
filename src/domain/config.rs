use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Configuration for a catalog deployment.
///
/// Controls where the catalog is stored, where the HTTP API listens, and how
/// hard node creation tries when a freshly allocated code turns out to be
/// taken by a concurrent writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Path of the `SQLite` database file.
    ///
    /// Relative paths are resolved against the working directory.
    pub database: PathBuf,

    /// Socket address the HTTP API binds to.
    pub listen: SocketAddr,

    /// How many codes to try when creating a node with an allocated code.
    ///
    /// Each attempt re-reads the siblings, so a conflicting insert by another
    /// writer is seen on the next attempt.
    allocation_attempts: NonZeroU32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            listen: default_listen(),
            allocation_attempts: default_allocation_attempts(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        Self::parse(&content)
    }

    /// Loads the configuration, falling back to defaults only when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, or if its TOML
    /// content is invalid.
    pub fn load_or_default(path: &Path) -> Result<Self, String> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(format!("Failed to read config file: {e}")),
        }
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Returns the number of allocation attempts per create.
    #[must_use]
    pub const fn allocation_attempts(&self) -> NonZeroU32 {
        self.allocation_attempts
    }

    /// Sets the number of allocation attempts per create.
    pub const fn set_allocation_attempts(&mut self, attempts: NonZeroU32) {
        self.allocation_attempts = attempts;
    }
}

fn default_database() -> PathBuf {
    PathBuf::from("catalog.db")
}

const fn default_listen() -> SocketAddr {
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 8080)
}

const fn default_allocation_attempts() -> NonZeroU32 {
    NonZeroU32::new(3).expect("three is non-zero")
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_database")]
        database: PathBuf,

        #[serde(default = "default_listen")]
        listen: SocketAddr,

        /// Attempts per create before giving up on a conflicting code.
        #[serde(default = "default_allocation_attempts")]
        allocation_attempts: NonZeroU32,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                database,
                listen,
                allocation_attempts,
            } => Self {
                database,
                listen,
                allocation_attempts,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            database: config.database,
            listen: config.listen,
            allocation_attempts: config.allocation_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\n\
              database = \"/var/lib/catalog.db\"\n\
              listen = \"0.0.0.0:9000\"\n\
              allocation_attempts = 5\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.database, PathBuf::from("/var/lib/catalog.db"));
        assert_eq!(config.listen, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.allocation_attempts().get(), 5);
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(error.starts_with("Failed to read config file:"));
        assert_eq!(Config::load_or_default(&missing).unwrap(), Config::default());
    }

    #[test]
    fn load_or_default_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\ndatabase = \"/srv/prod.db\"\nallocation_attempts = 0\n",
        )
        .unwrap();

        let error = Config::load_or_default(file.path()).unwrap_err();
        assert!(error.starts_with("Failed to parse config file:"));
    }

    #[test]
    fn load_or_default_rejects_unreadable_path() {
        // a directory exists but cannot be read as a file
        let tmp = tempfile::tempdir().unwrap();

        let error = Config::load_or_default(tmp.path()).unwrap_err();
        assert!(error.starts_with("Failed to read config file:"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nallocation_attempts = 0\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(error.starts_with("Failed to parse config file:"));
    }

    #[test]
    fn empty_file_returns_default() {
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("costlib.toml");
        let mut config = Config::default();
        config.set_allocation_attempts(NonZeroU32::new(7).unwrap());

        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
