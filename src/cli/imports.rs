//! Import discovery and resolution for test scripts
//!
//! Test scripts pull in code three ways: contracts configured by name,
//! contracts referenced by source path, and helper scripts living next to the
//! test file. [`scan_imports`] finds the references, [`ImportResolver`] turns
//! each one into source text.
//!
//! Helper-script imports are deliberately optional: a missing helper file
//! resolves to empty content instead of an error. Every other read failure is
//! fatal. [`resolve_file`] is the strict counterpart used for plain file
//! resolution and always propagates read errors.

use std::path::{Path, PathBuf};

use crate::config::State;

use super::test_interfaces::TestError;

/// Import references containing this substring are treated as helper/utility
/// scripts for test files rather than contract imports.
pub const DEFAULT_HELPER_MARKER: &str = "_helper";

/// The executor provides its own testing module; it never resolves through
/// project configuration.
const FRAMEWORK_MODULE: &str = "Test";

/// A symbolic import reference found in a test script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportLocation {
    /// References a configured contract by name (`import Counter`).
    Address { name: String },
    /// References a file-relative import or a contract by path
    /// (`import "../contracts/counter.runa"`).
    Path { reference: String },
}

impl std::fmt::Display for ImportLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportLocation::Address { name } => write!(f, "{name}"),
            ImportLocation::Path { reference } => write!(f, "{reference}"),
        }
    }
}

/// Discover import statements in a test script.
///
/// Recognized forms:
/// - `import Counter` / `import Counter, Registry` -> [`ImportLocation::Address`]
/// - `import "path"` / `import Counter from "path"` -> [`ImportLocation::Path`]
///
/// Duplicates are dropped, order of first appearance is preserved.
pub fn scan_imports(source: &str) -> Vec<ImportLocation> {
    let mut locations = Vec::new();

    for line in source.lines() {
        let Some(rest) = line.trim_start().strip_prefix("import ") else {
            continue;
        };
        let rest = rest.trim();

        if let Some(reference) = quoted(rest) {
            push_unique(&mut locations, ImportLocation::Path { reference });
            continue;
        }

        let (names, from) = match rest.split_once(" from ") {
            Some((names, tail)) => (names, Some(tail.trim())),
            None => (rest, None),
        };

        if let Some(reference) = from.and_then(quoted) {
            // `import X from "path"` resolves through the path, not the name.
            push_unique(&mut locations, ImportLocation::Path { reference });
            continue;
        }

        for name in names.split(',') {
            let name = name.trim();
            if name.is_empty() || name == FRAMEWORK_MODULE {
                continue;
            }
            if name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                push_unique(
                    &mut locations,
                    ImportLocation::Address {
                        name: name.to_string(),
                    },
                );
            }
        }
    }

    locations
}

fn quoted(text: &str) -> Option<String> {
    let rest = text.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn push_unique(locations: &mut Vec<ImportLocation>, location: ImportLocation) {
    if !locations.contains(&location) {
        locations.push(location);
    }
}

/// Resolves import locations for one test file.
///
/// Bound to the path of the importing test file (helper imports are relative
/// to its directory) and the loaded project state.
pub struct ImportResolver<'a> {
    script_path: &'a Path,
    state: &'a State,
    helper_marker: String,
}

impl<'a> ImportResolver<'a> {
    pub fn new(script_path: &'a Path, state: &'a State) -> Self {
        Self {
            script_path,
            state,
            helper_marker: DEFAULT_HELPER_MARKER.to_string(),
        }
    }

    /// Override the helper-script marker substring.
    pub fn with_helper_marker(mut self, marker: impl Into<String>) -> Self {
        self.helper_marker = marker.into();
        self
    }

    /// Resolve a location to source text.
    pub fn resolve(&self, location: &ImportLocation) -> Result<String, TestError> {
        match location {
            ImportLocation::Address { name } => self.resolve_contract_by_name(name, location),

            ImportLocation::Path { reference } => {
                if reference.contains(&self.helper_marker) {
                    let path = absolute_path(self.script_path, reference);
                    // Helper imports are optional: a miss is empty content.
                    return match self.state.read_file(&path) {
                        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                        Err(_) => Ok(String::new()),
                    };
                }

                let matched = self
                    .state
                    .config()
                    .contracts
                    .iter()
                    .find(|(name, entry)| {
                        *name == reference || reference.contains(&entry.source)
                    })
                    .map(|(_, entry)| entry.source.clone());

                match matched {
                    Some(source) => self.read_contract_source(&source),
                    None => Err(TestError::UnknownLocation(location.to_string())),
                }
            }
        }
    }

    fn resolve_contract_by_name(
        &self,
        name: &str,
        location: &ImportLocation,
    ) -> Result<String, TestError> {
        match self.state.config().contract(name) {
            Some(entry) => self.read_contract_source(&entry.source.clone()),
            None => Err(TestError::UnknownLocation(location.to_string())),
        }
    }

    fn read_contract_source(&self, source: &str) -> Result<String, TestError> {
        let bytes = self
            .state
            .read_file(Path::new(source))
            .map_err(|e| TestError::FileRead {
                path: source.to_string(),
                source: e,
            })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Resolve a file import relative to the importing script and read it.
///
/// Unlike helper-script resolution inside [`ImportResolver::resolve`], read
/// errors always propagate here.
pub fn resolve_file(state: &State, script_path: &Path, path: &str) -> Result<String, TestError> {
    let import_path = absolute_path(script_path, path);
    let bytes = state
        .read_file(&import_path)
        .map_err(|e| TestError::FileRead {
            path: import_path.to_string_lossy().into_owned(),
            source: e,
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Join a file path onto the directory of the importing script.
/// Absolute paths pass through unchanged.
pub fn absolute_path(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match base.parent() {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}
