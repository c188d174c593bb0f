//! Kindred - Enrich and anonymize genealogical record sets
//!
//! Derives family relations and generation numbers from parsed individuals
//! and family units, resolves free-text places to countries, and produces
//! anonymized exports safe to hand to untrusted consumers.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod model;
pub mod output;
pub mod privacy;

// Re-export main types
pub use analysis::{
    EnrichmentResult, Enricher, FamilyGraph, GenerationAssigner, MetricsAggregator,
    RelationshipGraphBuilder,
};
pub use config::Config;
pub use error::{Error, Result};
pub use geo::{CountryMatch, CountryResolver, MatchMethod, ResolutionStats};
pub use model::{FamilyUnit, Individual, Population};
pub use privacy::{Anonymizer, AnonymizedPopulation, NamingStrategy};
