// PII stripping for export to untrusted consumers
//
// Names are replaced with synthetic identifiers, dates are cut down to a
// year, places and anything resolved from them are dropped entirely.

use crate::config::AnonymizeConfig;
use crate::error::{Error, Result};
use crate::model::{extract_year, Event, FamilyUnit, Individual, Population, Sex};
use crate::privacy::masking::{mask_flag, mask_lifespan, mask_month, MaskField};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Prefix of names produced by [`NamingStrategy::ById`]
pub const ID_PREFIX: &str = "Individual_";

/// Prefix of names produced by [`NamingStrategy::ByGeneration`]
pub const GENERATION_PREFIX: &str = "Person_";

/// How synthetic names are built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NamingStrategy {
    /// `Individual_<id>`
    #[default]
    #[serde(rename = "id")]
    ById,
    /// `Person_<generation>_<index>`, index counted within the generation
    #[serde(rename = "generation")]
    ByGeneration,
}

impl fmt::Display for NamingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingStrategy::ById => f.write_str("id"),
            NamingStrategy::ByGeneration => f.write_str("generation"),
        }
    }
}

impl FromStr for NamingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "id" => Ok(NamingStrategy::ById),
            "generation" | "gen" => Ok(NamingStrategy::ByGeneration),
            other => Err(Error::invalid_input(format!(
                "unknown naming strategy '{}' (expected 'id' or 'generation')",
                other
            ))),
        }
    }
}

/// An event reduced to its year
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymizedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

/// Computed metadata that survives anonymization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnonymizedMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifespan_years: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_lifespan: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_month: Option<u8>,
    pub is_alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizedIndividual {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth: Option<AnonymizedEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death: Option<AnonymizedEvent>,
    #[serde(default)]
    pub parents: BTreeSet<String>,
    #[serde(default)]
    pub spouses: BTreeSet<String>,
    #[serde(default)]
    pub children: BTreeSet<String>,
    #[serde(default)]
    pub siblings: BTreeSet<String>,
    pub generation: Option<i32>,
    #[serde(default)]
    pub metadata: AnonymizedMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizedFamily {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub husband: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wife: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marriage: Option<AnonymizedEvent>,
}

/// What was removed, and anything skipped along the way
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymizationReport {
    pub names_stripped: usize,
    pub dates_stripped: usize,
    pub locations_stripped: usize,
    pub individuals_processed: usize,
    pub families_processed: usize,
    pub warnings: Vec<String>,
}

/// The export handed to downstream consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnonymizedPopulation {
    pub individuals: BTreeMap<String, AnonymizedIndividual>,
    pub families: Vec<AnonymizedFamily>,
    pub report: AnonymizationReport,
}

/// Produces anonymized copies of enriched populations.
///
/// Masking draws from `R`; seed it for reproducible output.
pub struct Anonymizer<R: Rng = StdRng> {
    strategy: NamingStrategy,
    mask_fields: Vec<MaskField>,
    rng: R,
}

impl Anonymizer<StdRng> {
    /// Anonymizer seeded from OS entropy
    pub fn new(strategy: NamingStrategy) -> Self {
        Self::with_rng(strategy, StdRng::from_entropy())
    }

    /// Anonymizer with a fixed seed
    pub fn seeded(strategy: NamingStrategy, seed: u64) -> Self {
        Self::with_rng(strategy, StdRng::seed_from_u64(seed))
    }

    pub fn from_config(config: &AnonymizeConfig) -> Self {
        let anonymizer = match config.seed {
            Some(seed) => Self::seeded(config.strategy, seed),
            None => Self::new(config.strategy),
        };
        anonymizer.with_mask_fields(config.mask_fields.clone())
    }
}

impl<R: Rng> Anonymizer<R> {
    pub fn with_rng(strategy: NamingStrategy, rng: R) -> Self {
        Self {
            strategy,
            mask_fields: vec![MaskField::NormalizedLifespan, MaskField::BirthMonth],
            rng,
        }
    }

    pub fn with_mask_fields(mut self, fields: Vec<MaskField>) -> Self {
        self.mask_fields = fields;
        self
    }

    pub fn strategy(&self) -> NamingStrategy {
        self.strategy
    }

    /// Anonymize an enriched population. The input is not modified.
    pub fn anonymize(&mut self, population: &Population) -> AnonymizedPopulation {
        let names = synthetic_names(population, self.strategy);
        let mut report = AnonymizationReport::default();

        let mut individuals = BTreeMap::new();
        for (id, individual) in &population.individuals {
            let name = names
                .get(id)
                .cloned()
                .unwrap_or_else(|| format!("{}{}", ID_PREFIX, id));
            let anonymized = self.anonymize_individual(individual, name, &mut report);
            individuals.insert(id.clone(), anonymized);
        }

        let families = population
            .families
            .iter()
            .map(|family| anonymize_family(family, population, &mut report))
            .collect();

        for warning in &report.warnings {
            warn!(%warning, "Anonymization warning");
        }
        debug!(
            individuals = report.individuals_processed,
            families = report.families_processed,
            names = report.names_stripped,
            dates = report.dates_stripped,
            places = report.locations_stripped,
            "Anonymized population"
        );

        AnonymizedPopulation {
            individuals,
            families,
            report,
        }
    }

    fn anonymize_individual(
        &mut self,
        individual: &Individual,
        name: String,
        report: &mut AnonymizationReport,
    ) -> AnonymizedIndividual {
        report.individuals_processed += 1;
        if !individual.name.trim().is_empty() {
            report.names_stripped += 1;
        }

        let birth = individual.birth.as_ref().map(|e| reduce_event(e, report));
        let death = individual.death.as_ref().map(|e| reduce_event(e, report));

        AnonymizedIndividual {
            id: individual.id.clone(),
            name,
            sex: individual.sex,
            birth,
            death,
            parents: individual.parents.clone(),
            spouses: individual.spouses.clone(),
            children: individual.children.clone(),
            siblings: individual.siblings.clone(),
            generation: individual.generation,
            metadata: self.mask_metadata(individual),
        }
    }

    fn mask_metadata(&mut self, individual: &Individual) -> AnonymizedMetadata {
        let meta = &individual.metadata;
        let masked = |field| self.mask_fields.contains(&field);
        let (mask_lifespan_field, mask_month_field, mask_alive_field) = (
            masked(MaskField::NormalizedLifespan),
            masked(MaskField::BirthMonth),
            masked(MaskField::IsAlive),
        );

        let normalized_lifespan = meta.normalized_lifespan.map(|value| {
            if mask_lifespan_field {
                mask_lifespan(value, &mut self.rng)
            } else {
                value
            }
        });
        let birth_month = meta.birth_month.map(|month| {
            if mask_month_field {
                mask_month(month, &mut self.rng)
            } else {
                month
            }
        });
        let is_alive = if mask_alive_field {
            mask_flag(meta.is_alive, &mut self.rng)
        } else {
            meta.is_alive
        };

        AnonymizedMetadata {
            // the exact value would undo the noise on the normalized one
            lifespan_years: meta.lifespan_years.filter(|_| !mask_lifespan_field),
            normalized_lifespan,
            birth_month,
            is_alive,
        }
    }
}

/// Synthetic name per individual id
fn synthetic_names(population: &Population, strategy: NamingStrategy) -> BTreeMap<String, String> {
    match strategy {
        NamingStrategy::ById => population
            .individuals
            .keys()
            .map(|id| (id.clone(), format!("{}{}", ID_PREFIX, id)))
            .collect(),
        NamingStrategy::ByGeneration => {
            // individuals iterate in id order, so indices are stable
            let mut counters: BTreeMap<Option<i32>, usize> = BTreeMap::new();
            population
                .individuals
                .iter()
                .map(|(id, individual)| {
                    let counter = counters.entry(individual.generation).or_insert(0);
                    *counter += 1;
                    let generation = individual
                        .generation
                        .map_or_else(|| "unknown".to_string(), |g| g.to_string());
                    (id.clone(), format!("{}{}_{}", GENERATION_PREFIX, generation, counter))
                })
                .collect()
        }
    }
}

/// Keep only the year; count what was dropped
fn reduce_event(event: &Event, report: &mut AnonymizationReport) -> AnonymizedEvent {
    let year = event.date.as_deref().and_then(extract_year);
    if event.date.as_deref().is_some_and(|d| !d.trim().is_empty()) {
        report.dates_stripped += 1;
    }
    if event.place.as_deref().is_some_and(|p| !p.trim().is_empty()) {
        report.locations_stripped += 1;
    }
    AnonymizedEvent { year }
}

fn anonymize_family(
    family: &FamilyUnit,
    population: &Population,
    report: &mut AnonymizationReport,
) -> AnonymizedFamily {
    report.families_processed += 1;

    let mut keep = |role: &str, id: &str| -> bool {
        if population.contains(id) {
            true
        } else {
            report.warnings.push(format!(
                "family {} references unknown {} {}; reference dropped",
                family.id, role, id
            ));
            false
        }
    };

    let husband = family.husband.clone().filter(|id| keep("husband", id.as_str()));
    let wife = family.wife.clone().filter(|id| keep("wife", id.as_str()));
    let children = family
        .children
        .iter()
        .filter(|id| keep("child", id.as_str()))
        .cloned()
        .collect();
    let marriage = family.marriage.as_ref().map(|e| reduce_event(e, report));

    AnonymizedFamily {
        id: family.id.clone(),
        husband,
        wife,
        children,
        marriage,
    }
}
