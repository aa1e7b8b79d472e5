//! Project configuration (`runa.json`) and file access
//!
//! The test engine never touches the filesystem directly: all reads go
//! through the [`FileReader`] capability owned by [`State`], so tests can
//! substitute an in-memory tree and the hosting CLI stays in control of I/O.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved network label used to select contract aliases during test runs.
///
/// Contracts that do not expose an alias for this network cannot be bound
/// into a simulated test environment and fail the run up front.
pub const TESTING_NETWORK: &str = "testing";

/// Default project configuration filename.
pub const DEFAULT_CONFIG_PATH: &str = "runa.json";

/// Errors raised while loading project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error loading configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("error parsing configuration file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Abstracted file-reading capability.
///
/// Supplied by the hosting CLI; the engine and the import resolver read
/// every script, contract and helper file through this trait.
pub trait FileReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Filesystem-backed reader used by the CLI binary.
pub struct OsFileReader;

impl FileReader for OsFileReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

/// In-memory reader keyed by exact path, for tests.
#[derive(Default)]
pub struct MemoryFileReader {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryFileReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files
            .insert(normalize(Path::new(&path.into())), contents.into());
    }
}

impl FileReader for MemoryFileReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display())))
    }
}

// Lexical normalization so `tests/./x.runa` and `tests/x.runa` hit the same
// in-memory entry.
fn normalize(path: &Path) -> String {
    use std::path::Component;
    let cleaned: std::path::PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    cleaned.to_string_lossy().into_owned()
}

/// One configured contract: where its source lives and which address it is
/// deployed at per network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEntry {
    /// Path to the contract source, relative to the project root.
    pub source: String,
    /// Network label -> deployed (or simulated) address literal.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl ContractEntry {
    /// Look up the address alias for a network label.
    pub fn alias(&self, network: &str) -> Option<&str> {
        self.aliases.get(network).map(String::as_str)
    }
}

/// Deserialized `runa.json` project configuration.
///
/// Contract names are unique by construction (map keys).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub contracts: BTreeMap<String, ContractEntry>,
}

impl ProjectConfig {
    /// Parse configuration from raw JSON bytes.
    pub fn from_json(path: &Path, bytes: &[u8]) -> Result<Self, ConfigError> {
        serde_json::from_slice(bytes).map_err(|source| ConfigError::Parse {
            path: path.to_string_lossy().into_owned(),
            source,
        })
    }

    /// Look up a contract by its configured name.
    pub fn contract(&self, name: &str) -> Option<&ContractEntry> {
        self.contracts.get(name)
    }
}

/// Loaded project state: the configuration plus the file-reading capability
/// everything downstream borrows.
pub struct State {
    config: ProjectConfig,
    reader: Box<dyn FileReader>,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("config", &self.config)
            .field("reader", &"..")
            .finish()
    }
}

impl State {
    pub fn new(config: ProjectConfig, reader: Box<dyn FileReader>) -> Self {
        Self { config, reader }
    }

    /// Load project configuration from `path` using `reader`.
    pub fn load(path: &Path, reader: Box<dyn FileReader>) -> Result<Self, ConfigError> {
        let bytes = reader.read(path).map_err(|source| ConfigError::Read {
            path: path.to_string_lossy().into_owned(),
            source,
        })?;
        let config = ProjectConfig::from_json(path, &bytes)?;
        Ok(Self { config, reader })
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Read a file through the configured reader.
    pub fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.reader.read(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"{
        "contracts": {
            "Counter": {
                "source": "contracts/counter.runa",
                "aliases": {
                    "testing": "0x0000000000000007",
                    "mainnet": "0x1654653399040a61"
                }
            },
            "Registry": {
                "source": "contracts/registry.runa"
            }
        }
    }"#;

    #[test]
    fn parses_project_config() {
        let config = ProjectConfig::from_json(Path::new("runa.json"), SAMPLE.as_bytes()).unwrap();
        assert_eq!(config.contracts.len(), 2);

        let counter = config.contract("Counter").unwrap();
        assert_eq!(counter.source, "contracts/counter.runa");
        assert_eq!(counter.alias(TESTING_NETWORK), Some("0x0000000000000007"));
        assert_eq!(counter.alias("mainnet"), Some("0x1654653399040a61"));
    }

    #[test]
    fn missing_alias_is_none() {
        let config = ProjectConfig::from_json(Path::new("runa.json"), SAMPLE.as_bytes()).unwrap();
        let registry = config.contract("Registry").unwrap();
        assert_eq!(registry.alias(TESTING_NETWORK), None);
    }

    #[test]
    fn parse_error_names_the_file() {
        let err = ProjectConfig::from_json(Path::new("broken.json"), b"{nope").unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn state_load_reads_through_the_reader() {
        let mut reader = MemoryFileReader::new();
        reader.insert("runa.json", SAMPLE.as_bytes().to_vec());
        let state = State::load(Path::new("runa.json"), Box::new(reader)).unwrap();
        assert!(state.config().contract("Counter").is_some());
    }

    #[test]
    fn state_load_missing_file_errors() {
        let reader = MemoryFileReader::new();
        let err = State::load(&PathBuf::from("runa.json"), Box::new(reader)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
