//! Code-coverage accumulation and report serialization
//!
//! One [`CoverageReport`] is shared across every test file of a run: the
//! executor reports per-location statement lines and hit counts, the report
//! merges them and renders a JSON summary document or an LCOV trace file.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of executable code a coverage location belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Contract,
    Script,
    Transaction,
}

impl LocationKind {
    fn prefix(self) -> &'static str {
        match self {
            LocationKind::Contract => "C",
            LocationKind::Script => "S",
            LocationKind::Transaction => "T",
        }
    }
}

/// A single instrumented source unit, as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeLocation {
    pub kind: LocationKind,
    pub id: String,
}

impl CodeLocation {
    pub fn new(kind: LocationKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind.prefix(), self.id)
    }
}

/// Per-location coverage record in the executor wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationCoverage {
    pub location: CodeLocation,
    /// Line numbers of all instrumentable statements.
    #[serde(default)]
    pub statements: Vec<u32>,
    /// Line number -> execution count for lines that ran.
    #[serde(default)]
    pub hits: BTreeMap<u32, u64>,
}

#[derive(Debug, Clone, Default)]
struct LocationRecord {
    statements: BTreeSet<u32>,
    line_hits: BTreeMap<u32, u64>,
}

impl LocationRecord {
    fn covered(&self) -> usize {
        self.statements
            .iter()
            .filter(|line| self.line_hits.get(line).copied().unwrap_or(0) > 0)
            .count()
    }

    fn missed_lines(&self) -> Vec<u32> {
        self.statements
            .iter()
            .filter(|line| self.line_hits.get(line).copied().unwrap_or(0) == 0)
            .copied()
            .collect()
    }
}

type LocationFilter = Box<dyn Fn(&CodeLocation) -> bool + Send + Sync>;

/// Mutable accumulator of execution-location hit counts for one run.
///
/// An optional location filter, fixed at creation time, decides which
/// locations are admitted at all (e.g. contracts only).
#[derive(Default)]
pub struct CoverageReport {
    locations: BTreeMap<CodeLocation, LocationRecord>,
    filter: Option<LocationFilter>,
}

impl fmt::Debug for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageReport")
            .field("locations", &self.locations)
            .field("filter", &self.filter.as_ref().map(|_| ".."))
            .finish()
    }
}

impl CoverageReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a location filter. Locations the predicate rejects are
    /// silently dropped when recorded.
    pub fn with_location_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&CodeLocation) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    fn accepts(&self, location: &CodeLocation) -> bool {
        self.filter.as_ref().map_or(true, |f| f(location))
    }

    /// Merge one executor coverage record into the accumulator.
    pub fn record(&mut self, coverage: &LocationCoverage) {
        if !self.accepts(&coverage.location) {
            return;
        }
        let record = self.locations.entry(coverage.location.clone()).or_default();
        record.statements.extend(coverage.statements.iter().copied());
        for (line, count) in &coverage.hits {
            record.statements.insert(*line);
            *record.line_hits.entry(*line).or_insert(0) += count;
        }
    }

    /// Locations currently present in the report.
    pub fn locations(&self) -> impl Iterator<Item = &CodeLocation> {
        self.locations.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    fn totals(&self) -> (usize, usize) {
        let mut covered = 0;
        let mut total = 0;
        for record in self.locations.values() {
            covered += record.covered();
            total += record.statements.len();
        }
        (covered, total)
    }

    /// Formatted percentage of covered statements across all locations.
    /// An empty report counts as fully covered.
    pub fn percentage(&self) -> String {
        let (covered, total) = self.totals();
        format_percentage(covered, total)
    }

    /// Structured summary for JSON embedding and the `.json` artifact.
    pub fn summary(&self) -> CoverageSummary {
        let locations = self
            .locations
            .iter()
            .map(|(location, record)| {
                let summary = LocationSummary {
                    line_hits: record.line_hits.clone(),
                    missed_lines: record.missed_lines(),
                    percentage: format_percentage(record.covered(), record.statements.len()),
                };
                (location.to_string(), summary)
            })
            .collect();

        CoverageSummary {
            percentage: self.percentage(),
            locations,
        }
    }

    /// Indented JSON artifact contents.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.summary())
    }

    /// LCOV tracefile contents (one record per location).
    pub fn marshal_lcov(&self) -> String {
        let mut out = String::new();
        for (location, record) in &self.locations {
            out.push_str("TN:\n");
            out.push_str(&format!("SF:{}\n", location));
            for line in &record.statements {
                let count = record.line_hits.get(line).copied().unwrap_or(0);
                out.push_str(&format!("DA:{},{}\n", line, count));
            }
            out.push_str(&format!("LF:{}\n", record.statements.len()));
            out.push_str(&format!("LH:{}\n", record.covered()));
            out.push_str("end_of_record\n");
        }
        out
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coverage: {} of statements", self.percentage())
    }
}

fn format_percentage(covered: usize, total: usize) -> String {
    if total == 0 {
        return "100.0%".to_string();
    }
    format!("{:.1}%", covered as f64 * 100.0 / total as f64)
}

/// Serializable form of a [`CoverageReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub percentage: String,
    pub locations: BTreeMap<String, LocationSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSummary {
    pub line_hits: BTreeMap<u32, u64>,
    pub missed_lines: Vec<u32>,
    pub percentage: String,
}
