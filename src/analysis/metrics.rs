// Population metrics
//
// Rolls up the enriched population into four groups:
// - Structural: sizes, edges, connected components, generation span
// - Temporal: birth years, lifespans, births per century
// - Geographic: resolved countries and resolver outcomes
// - Demographic: sex distribution, living/deceased

use crate::analysis::graph::GraphStats;
use crate::geo::{CountryMatch, MatchMethod, ResolutionStats, TierCounts};
use crate::model::{Population, Sex};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Shape of the family graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralMetrics {
    pub individual_count: usize,
    pub family_count: usize,
    pub parent_child_edges: usize,
    pub spouse_edges: usize,
    pub sibling_edges: usize,
    /// Connected components over all relation kinds
    pub component_count: usize,
    pub largest_component: usize,
    /// Individuals with no relations at all
    pub isolated_individuals: usize,
    pub min_generation: Option<i32>,
    pub max_generation: Option<i32>,
    /// Number of distinct generation levels
    pub generation_span: usize,
    pub unassigned_generations: usize,
    pub avg_children_per_family: f64,
    pub childless_families: usize,
}

/// Dates and lifespans
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalMetrics {
    pub earliest_birth_year: Option<i32>,
    pub latest_birth_year: Option<i32>,
    /// Mean over individuals with a known lifespan
    pub avg_lifespan: Option<f64>,
    pub max_lifespan: Option<i32>,
    /// Birth counts keyed by first year of the century (1800, 1900, ...)
    pub births_by_century: BTreeMap<i32, usize>,
}

/// Where events happened and how well places resolved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeographicMetrics {
    pub birth_countries: BTreeMap<String, usize>,
    pub death_countries: BTreeMap<String, usize>,
    pub marriage_countries: BTreeMap<String, usize>,
    pub total_lookups: usize,
    pub resolution_rate: f64,
    pub tiers: TierCounts,
    pub by_method: BTreeMap<MatchMethod, usize>,
    pub unresolved_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographicMetrics {
    pub male: usize,
    pub female: usize,
    pub unknown_sex: usize,
    pub living: usize,
    pub deceased: usize,
}

/// All metrics for one population
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationMetrics {
    pub structural: StructuralMetrics,
    pub temporal: TemporalMetrics,
    pub geographic: GeographicMetrics,
    pub demographic: DemographicMetrics,
}

/// Metrics aggregator
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsAggregator;

impl MetricsAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Calculate every metric group for an enriched population
    pub fn aggregate(
        &self,
        population: &Population,
        graph: &GraphStats,
        resolution: &ResolutionStats,
    ) -> PopulationMetrics {
        PopulationMetrics {
            structural: self.structural(population, graph),
            temporal: self.temporal(population),
            geographic: self.geographic(population, resolution),
            demographic: self.demographic(population),
        }
    }

    /// Edge counts come from the graph; generations and components from the
    /// enriched population
    pub fn structural(&self, population: &Population, graph: &GraphStats) -> StructuralMetrics {
        let mut metrics = StructuralMetrics {
            individual_count: graph.individuals,
            family_count: graph.families,
            parent_child_edges: graph.parent_child_edges,
            spouse_edges: graph.spouse_edges,
            sibling_edges: graph.sibling_edges,
            ..Default::default()
        };

        for individual in population.individuals.values() {
            if individual.is_isolated() {
                metrics.isolated_individuals += 1;
            }
            match individual.generation {
                Some(generation) => {
                    metrics.min_generation =
                        Some(metrics.min_generation.map_or(generation, |g| g.min(generation)));
                    metrics.max_generation =
                        Some(metrics.max_generation.map_or(generation, |g| g.max(generation)));
                }
                None => metrics.unassigned_generations += 1,
            }
        }
        if let (Some(min), Some(max)) = (metrics.min_generation, metrics.max_generation) {
            metrics.generation_span = (max - min) as usize + 1;
        }

        let (components, largest) = connected_components(population);
        metrics.component_count = components;
        metrics.largest_component = largest;

        let total_children: usize = population.families.iter().map(|f| f.children.len()).sum();
        metrics.childless_families = population
            .families
            .iter()
            .filter(|f| f.children.is_empty())
            .count();
        metrics.avg_children_per_family = if population.families.is_empty() {
            0.0
        } else {
            total_children as f64 / population.families.len() as f64
        };

        metrics
    }

    pub fn temporal(&self, population: &Population) -> TemporalMetrics {
        let mut metrics = TemporalMetrics::default();
        let mut lifespans: Vec<i32> = Vec::new();

        for individual in population.individuals.values() {
            let meta = &individual.metadata;
            if let Some(year) = meta.birth_year {
                metrics.earliest_birth_year =
                    Some(metrics.earliest_birth_year.map_or(year, |y| y.min(year)));
                metrics.latest_birth_year =
                    Some(metrics.latest_birth_year.map_or(year, |y| y.max(year)));
                *metrics.births_by_century.entry(century_start(year)).or_insert(0) += 1;
            }
            if let Some(lifespan) = meta.lifespan_years {
                lifespans.push(lifespan);
            }
        }

        if !lifespans.is_empty() {
            let total: i64 = lifespans.iter().map(|&l| i64::from(l)).sum();
            metrics.avg_lifespan = Some(total as f64 / lifespans.len() as f64);
            metrics.max_lifespan = lifespans.iter().copied().max();
        }

        metrics
    }

    pub fn geographic(&self, population: &Population, resolution: &ResolutionStats) -> GeographicMetrics {
        let mut metrics = GeographicMetrics {
            total_lookups: resolution.total_lookups,
            resolution_rate: resolution.resolution_rate(),
            tiers: resolution.tiers.clone(),
            by_method: resolution.by_method.clone(),
            unresolved_count: resolution.unresolved.len(),
            ..Default::default()
        };

        for individual in population.individuals.values() {
            if let Some(code) = country_code(&individual.birth_country) {
                *metrics.birth_countries.entry(code.to_string()).or_insert(0) += 1;
            }
            if let Some(code) = country_code(&individual.death_country) {
                *metrics.death_countries.entry(code.to_string()).or_insert(0) += 1;
            }
        }
        for family in &population.families {
            if let Some(code) = country_code(&family.marriage_country) {
                *metrics.marriage_countries.entry(code.to_string()).or_insert(0) += 1;
            }
        }

        metrics
    }

    pub fn demographic(&self, population: &Population) -> DemographicMetrics {
        let mut metrics = DemographicMetrics::default();

        for individual in population.individuals.values() {
            match individual.sex {
                Some(Sex::Male) => metrics.male += 1,
                Some(Sex::Female) => metrics.female += 1,
                Some(Sex::Unknown) | None => metrics.unknown_sex += 1,
            }
            if individual.metadata.is_alive {
                metrics.living += 1;
            } else {
                metrics.deceased += 1;
            }
        }

        metrics
    }
}

fn country_code(resolved: &Option<CountryMatch>) -> Option<&str> {
    resolved.as_ref().and_then(|m| m.iso2.as_deref())
}

/// First year of the century a year falls in
fn century_start(year: i32) -> i32 {
    year.div_euclid(100) * 100
}

/// Component count and size of the largest component
fn connected_components(population: &Population) -> (usize, usize) {
    let index: HashMap<&str, usize> = population
        .individuals
        .keys()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut sets: UnionFind<usize> = UnionFind::new(index.len());
    for (id, individual) in &population.individuals {
        let Some(&a) = index.get(id.as_str()) else {
            continue;
        };
        let relatives = individual
            .parents
            .iter()
            .chain(&individual.spouses)
            .chain(&individual.children)
            .chain(&individual.siblings);
        for relative in relatives {
            if let Some(&b) = index.get(relative.as_str()) {
                sets.union(a, b);
            }
        }
    }

    let mut sizes: HashMap<usize, usize> = HashMap::new();
    for label in sets.into_labeling() {
        *sizes.entry(label).or_insert(0) += 1;
    }
    (sizes.len(), sizes.values().copied().max().unwrap_or(0))
}
