// Enrichment pipeline over a parsed population

pub mod generations;
pub mod graph;
pub mod metrics;

pub use generations::*;
pub use graph::*;
pub use metrics::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::geo::{CountryMatch, CountryResolver, LookupContext, ResolutionStats};
use crate::model::{Event, EventKind, Individual, IndividualMetadata, Population};
use crate::output::is_output_file;
use chrono::Datelike;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Result of enriching one population
#[derive(Debug, Clone)]
pub struct EnrichmentResult {
    /// Relations, generations, metadata, and countries filled in
    pub population: Population,
    /// Relations skipped while building the graph
    pub warnings: Vec<GraphWarning>,
    /// Place lookups made for this population only
    pub resolution: ResolutionStats,
    pub metrics: PopulationMetrics,
}

/// Result of enriching every population file under a path
#[derive(Debug, Default)]
pub struct BatchResult {
    pub files: Vec<(PathBuf, EnrichmentResult)>,
    /// Files that could not be read or parsed (path -> error message)
    pub errors: BTreeMap<PathBuf, String>,
}

impl BatchResult {
    /// Place resolution statistics summed over every enriched file
    pub fn resolution(&self) -> ResolutionStats {
        let mut total = ResolutionStats::new();
        for (_, result) in &self.files {
            total.merge(&result.resolution);
        }
        total
    }
}

/// Runs graph building, generation assignment, metadata, and place
/// resolution in order
pub struct Enricher {
    config: Config,
    resolver: CountryResolver,
    verbose: bool,
}

impl Enricher {
    /// Create an enricher; fails if the country table cannot be loaded
    pub fn new(config: Config) -> Result<Self> {
        let resolver = match &config.geo.reference_data {
            Some(path) => CountryResolver::from_path(path)?,
            None => CountryResolver::builtin()?,
        };

        Ok(Self {
            config,
            resolver,
            verbose: false,
        })
    }

    /// Create enricher with verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn resolver(&self) -> &CountryResolver {
        &self.resolver
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Year that "is alive" is judged against
    pub fn reference_year(&self) -> i32 {
        self.config
            .enrich
            .reference_year
            .unwrap_or_else(|| chrono::Local::now().year())
    }

    /// Enrich a population. The input is not modified.
    pub fn enrich(&self, population: &Population) -> EnrichmentResult {
        let graph = RelationshipGraphBuilder::new().build(population);
        let warnings = graph.warnings().to_vec();
        let graph_stats = graph.stats();
        let mut enriched = GenerationAssigner::new().assign(graph.population());

        let reference_year = self.reference_year();
        for individual in enriched.individuals.values_mut() {
            individual.metadata = self.metadata(individual, reference_year);
        }

        let mut resolution = ResolutionStats::new();
        if self.config.geo.resolve_places {
            self.resolve_places(&mut enriched, &mut resolution);
        }

        let metrics = MetricsAggregator::new().aggregate(&enriched, &graph_stats, &resolution);

        debug!(
            individuals = enriched.individuals.len(),
            families = enriched.families.len(),
            warnings = warnings.len(),
            lookups = resolution.total_lookups,
            "Enriched population"
        );

        EnrichmentResult {
            population: enriched,
            warnings,
            resolution,
            metrics,
        }
    }

    /// Derived per-individual metadata
    pub fn metadata(&self, individual: &Individual, reference_year: i32) -> IndividualMetadata {
        let birth_year = individual.birth.as_ref().and_then(Event::year);
        let death_year = individual.death.as_ref().and_then(Event::year);
        let birth_month = individual.birth.as_ref().and_then(Event::month);

        let lifespan_years = match (birth_year, death_year) {
            (Some(born), Some(died)) if died >= born => Some(died - born),
            _ => None,
        };
        let max_lifespan = f64::from(self.config.enrich.max_lifespan_years);
        let normalized_lifespan =
            lifespan_years.map(|years| (f64::from(years) / max_lifespan).clamp(0.0, 1.0));

        let threshold = i64::from(self.config.enrich.living_threshold_years);
        let is_alive = individual.death.is_none()
            && birth_year.map_or(true, |born| {
                i64::from(reference_year) - i64::from(born) <= threshold
            });

        IndividualMetadata {
            birth_year,
            death_year,
            birth_month,
            lifespan_years,
            normalized_lifespan,
            is_alive,
        }
    }

    fn resolve_places(&self, population: &mut Population, stats: &mut ResolutionStats) {
        for individual in population.individuals.values_mut() {
            let id = individual.id.clone();
            individual.birth_country =
                self.resolve_event(individual.event(EventKind::Birth), &id, EventKind::Birth, stats);
            individual.death_country =
                self.resolve_event(individual.event(EventKind::Death), &id, EventKind::Death, stats);
        }
        for family in population.families.iter_mut() {
            let id = family.id.clone();
            family.marriage_country =
                self.resolve_event(family.marriage.as_ref(), &id, EventKind::Marriage, stats);
        }
    }

    /// Resolve one event's place; events without a place make no lookup
    fn resolve_event(
        &self,
        event: Option<&Event>,
        owner: &str,
        kind: EventKind,
        stats: &mut ResolutionStats,
    ) -> Option<CountryMatch> {
        let event = event?;
        let place = event.place.as_deref()?;
        let year = event.year();
        let context = LookupContext::new().individual(owner).event(kind).year(year);
        Some(self.resolver.resolve_tracked(place, year, &context, stats))
    }

    /// Read and enrich one population file
    pub fn enrich_file(&self, path: &Path) -> Result<EnrichmentResult> {
        let population = read_population(path)?;
        Ok(self.enrich(&population))
    }

    /// Enrich a single file, or every `.json` file under a directory
    pub fn enrich_path(&self, root: &Path) -> Result<BatchResult> {
        if !root.exists() {
            return Err(Error::PathNotFound(root.to_path_buf()));
        }

        let files = self.discover_files(root)?;
        if files.is_empty() {
            return Err(Error::invalid_input(format!(
                "No population files found in {}",
                root.display()
            )));
        }

        let progress = if self.verbose {
            let pb = ProgressBar::new(files.len() as u64);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            Some(pb)
        } else {
            None
        };

        // every file gets its own statistics inside `enrich`
        let outcomes: Vec<(PathBuf, Result<EnrichmentResult>)> = files
            .par_iter()
            .map(|path| {
                let outcome = self.enrich_file(path);
                if let Some(pb) = &progress {
                    let msg = path.file_name().unwrap_or_default().to_string_lossy().to_string();
                    pb.set_message(msg);
                    pb.inc(1);
                }
                (path.clone(), outcome)
            })
            .collect();

        if let Some(pb) = progress {
            pb.finish_with_message("Enrichment complete");
        }

        let mut batch = BatchResult::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(result) => batch.files.push((path, result)),
                Err(e) => {
                    batch.errors.insert(path, e.to_string());
                }
            }
        }

        info!(
            files = batch.files.len(),
            failed = batch.errors.len(),
            "Processed population files"
        );

        Ok(batch)
    }

    /// A file path is returned as-is; directories are walked for `.json`
    /// files, leaving out anything this crate wrote itself
    fn discover_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if root.is_file() {
            return Ok(vec![root.to_path_buf()]);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            if path.extension().map_or(false, |ext| ext == "json") {
                if is_output_file(path) {
                    debug!(path = %path.display(), "Skipping kindred output file");
                    continue;
                }
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Read a population from a JSON file
pub fn read_population(path: &Path) -> Result<Population> {
    if !path.exists() {
        return Err(Error::PathNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    let population: Population = serde_json::from_str(&contents)?;
    Ok(population)
}
