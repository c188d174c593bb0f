//! Place-to-country resolution

pub mod countries;
pub mod fuzzy;
pub mod resolver;
pub mod stats;

pub use countries::{CountryRecord, CountryTable, HistoricalName};
pub use resolver::{CountryMatch, CountryResolver, MatchMethod};
pub use stats::{ConfidenceTier, LookupContext, ResolutionStats, TierCounts, UnresolvedLocation};
