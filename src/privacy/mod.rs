//! Anonymization of enriched populations

pub mod anonymizer;
pub mod masking;
pub mod validate;

pub use anonymizer::{
    AnonymizationReport, AnonymizedEvent, AnonymizedFamily, AnonymizedIndividual,
    AnonymizedMetadata, AnonymizedPopulation, Anonymizer, NamingStrategy,
};
pub use masking::MaskField;
pub use validate::{validate, validate_export, ValidationIssue, ValidationReport};
