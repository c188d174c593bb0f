// JSON output for enriched and anonymized populations

use crate::analysis::{EnrichmentResult, GraphWarning, PopulationMetrics};
use crate::error::Result;
use crate::geo::ResolutionStats;
use crate::privacy::AnonymizedPopulation;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENRICHED: &str = "enriched";
pub const STATS: &str = "stats";
pub const ANONYMIZED: &str = "anonymized";

/// Suffixes written after an output stem, `<stem>.<kind>.json`
pub const OUTPUT_KINDS: [&str; 3] = [ENRICHED, STATS, ANONYMIZED];

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    pub pretty: bool,
}

/// Files written by one run
#[derive(Debug, Default)]
pub struct OutputReport {
    pub files: Vec<PathBuf>,
    pub bytes_written: usize,
}

impl OutputReport {
    pub fn summary(&self) -> String {
        format!(
            "Wrote {} file(s), {} bytes",
            self.files.len(),
            self.bytes_written
        )
    }

    fn record(&mut self, path: PathBuf, bytes: usize) {
        self.bytes_written += bytes;
        self.files.push(path);
    }
}

/// Everything about a run except the population itself
#[derive(Debug, Serialize)]
pub struct StatsDocument<'a> {
    pub warnings: &'a [GraphWarning],
    pub resolution: &'a ResolutionStats,
    pub metrics: &'a PopulationMetrics,
}

impl<'a> From<&'a EnrichmentResult> for StatsDocument<'a> {
    fn from(result: &'a EnrichmentResult) -> Self {
        Self {
            warnings: &result.warnings,
            resolution: &result.resolution,
            metrics: &result.metrics,
        }
    }
}

/// Writes `<stem>.enriched.json`, `<stem>.stats.json`, and optionally
/// `<stem>.anonymized.json` into the output directory. A stem may contain
/// directories, which are created as needed.
pub struct JsonWriter {
    config: OutputConfig,
}

impl JsonWriter {
    pub fn new(config: OutputConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir)?;
        Ok(Self { config })
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Write the enriched population and its statistics
    pub fn write_enriched(&self, stem: &Path, result: &EnrichmentResult) -> Result<OutputReport> {
        let mut report = OutputReport::default();
        self.write(stem, ENRICHED, &result.population, &mut report)?;
        self.write(stem, STATS, &StatsDocument::from(result), &mut report)?;
        Ok(report)
    }

    /// Write an anonymized export
    pub fn write_anonymized(
        &self,
        stem: &Path,
        export: &AnonymizedPopulation,
        report: &mut OutputReport,
    ) -> Result<()> {
        self.write(stem, ANONYMIZED, export, report)
    }

    /// Where an output of the given kind lands
    pub fn target(&self, stem: &Path, kind: &str) -> PathBuf {
        let mut name = stem.as_os_str().to_os_string();
        name.push(format!(".{}.json", kind));
        self.config.output_dir.join(name)
    }

    fn write<T: Serialize>(
        &self,
        stem: &Path,
        kind: &str,
        value: &T,
        report: &mut OutputReport,
    ) -> Result<()> {
        let path = self.target(stem, kind);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = to_json(value, self.config.pretty)?;
        std::fs::write(&path, &json)?;
        debug!(path = %path.display(), bytes = json.len(), "Wrote output file");
        report.record(path, json.len());
        Ok(())
    }
}

/// Serialize to JSON, pretty-printed or compact
pub fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

/// Output stem for an input file found under `root`.
///
/// The path relative to `root` is kept, so `a/tree.json` and `b/tree.json`
/// map to `a/tree` and `b/tree`. When `root` is the file itself only the
/// file stem is used.
pub fn output_stem(root: &Path, file: &Path) -> PathBuf {
    match file.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.with_extension(""),
        _ => PathBuf::from(
            file.file_stem()
                .filter(|s| !s.is_empty())
                .unwrap_or(OsStr::new("population")),
        ),
    }
}

/// True for files this crate wrote itself (`*.enriched.json` and friends)
pub fn is_output_file(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(OsStr::to_str) else {
        return false;
    };
    OUTPUT_KINDS
        .iter()
        .any(|kind| stem.strip_suffix(*kind).map_or(false, |rest| rest.ends_with('.')))
}
