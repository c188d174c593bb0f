// Country reference data
//
// The table is a JSON object keyed by ISO2 code. Lookup indices are built once
// at load time, lower-cased, so the resolver only ever does map lookups and
// linear scans over prepared vectors.

use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, warn};

const BUILTIN_COUNTRIES: &str = include_str!("../../data/countries.json");

/// One country as described in the reference data file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryRecord {
    /// Canonical English name
    pub name: String,
    pub iso3: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Wildcard patterns such as `"*, USA"`
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Sub-national regions, states, and cities
    #[serde(default)]
    pub regions: Vec<String>,
    /// Historical name -> [start year, end year]
    #[serde(default)]
    pub historical_names: BTreeMap<String, (i32, i32)>,
}

/// A historical country name with its validity range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalName {
    pub name: String,
    pub iso2: String,
    pub start_year: i32,
    pub end_year: i32,
}

impl HistoricalName {
    /// Whether the name was in use in the given year (inclusive)
    pub fn valid_in(&self, year: i32) -> bool {
        self.start_year <= year && year <= self.end_year
    }
}

/// Prepared lookup tables over the country reference data
#[derive(Debug, Clone)]
pub struct CountryTable {
    records: BTreeMap<String, CountryRecord>,
    /// iso2 and iso3 codes
    codes: HashMap<String, String>,
    /// canonical names and aliases
    aliases: HashMap<String, String>,
    patterns: Vec<(Pattern, String)>,
    regions: HashMap<String, BTreeSet<String>>,
    historical: Vec<HistoricalName>,
    /// Every canonical name and alias, ordered by iso2 then declaration
    names: Vec<(String, String)>,
}

impl CountryTable {
    /// Load the table from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::PathNotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// The table compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_COUNTRIES)
    }

    /// Parse the table from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let records: BTreeMap<String, CountryRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    /// Validate records and build the lookup indices
    pub fn from_records(records: BTreeMap<String, CountryRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::reference_data("country table is empty"));
        }

        let mut codes = HashMap::new();
        let mut aliases: HashMap<String, String> = HashMap::new();
        let mut patterns = Vec::new();
        let mut regions: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut historical = Vec::new();
        let mut names = Vec::new();

        for (iso2, record) in &records {
            validate_record(iso2, record)?;

            codes.insert(iso2.to_lowercase(), iso2.clone());
            codes.insert(record.iso3.to_lowercase(), iso2.clone());

            for name in std::iter::once(&record.name).chain(&record.aliases) {
                let key = normalize(name);
                if key.is_empty() {
                    continue;
                }
                match aliases.get(&key) {
                    Some(owner) if owner != iso2 => {
                        warn!(alias = %key, first = %owner, second = %iso2, "Alias claimed by two countries; keeping the first");
                    }
                    Some(_) => {}
                    None => {
                        aliases.insert(key.clone(), iso2.clone());
                        names.push((key, iso2.clone()));
                    }
                }
            }

            for raw in &record.patterns {
                patterns.push((Pattern::new(&normalize(raw))?, iso2.clone()));
            }

            for region in &record.regions {
                regions
                    .entry(normalize(region))
                    .or_default()
                    .insert(iso2.clone());
            }

            for (name, &(start_year, end_year)) in &record.historical_names {
                historical.push(HistoricalName {
                    name: normalize(name),
                    iso2: iso2.clone(),
                    start_year,
                    end_year,
                });
            }
        }

        debug!(
            countries = records.len(),
            aliases = aliases.len(),
            regions = regions.len(),
            "Loaded country reference data"
        );

        Ok(Self {
            records,
            codes,
            aliases,
            patterns,
            regions,
            historical,
            names,
        })
    }

    /// Number of countries
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// ISO2 code for an ISO2/ISO3 code, case-insensitive
    pub fn by_code(&self, text: &str) -> Option<&str> {
        self.codes.get(text).map(String::as_str)
    }

    /// ISO2 code for a canonical name or alias
    pub fn by_alias(&self, text: &str) -> Option<&str> {
        self.aliases.get(text).map(String::as_str)
    }

    /// First country whose wildcard pattern matches the whole text
    pub fn by_pattern(&self, text: &str) -> Option<(&str, &str)> {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.patterns
            .iter()
            .find(|(pattern, _)| pattern.matches_with(text, options))
            .map(|(pattern, iso2)| (pattern.as_str(), iso2.as_str()))
    }

    /// Country owning a region, only when exactly one country claims it
    pub fn by_region(&self, text: &str) -> Option<&str> {
        let owners = self.regions.get(text)?;
        if owners.len() == 1 {
            owners.iter().next().map(String::as_str)
        } else {
            None
        }
    }

    pub fn historical_names(&self) -> &[HistoricalName] {
        &self.historical
    }

    /// All (name, iso2) pairs for canonical names and aliases
    pub fn names(&self) -> &[(String, String)] {
        &self.names
    }
}

fn validate_record(iso2: &str, record: &CountryRecord) -> Result<()> {
    if iso2.len() != 2 || !iso2.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(Error::reference_data(format!(
            "country key '{}' is not an upper-case ISO2 code",
            iso2
        )));
    }
    if record.iso3.len() != 3 || !record.iso3.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::reference_data(format!(
            "iso3 '{}' for {} must be 3 letters",
            record.iso3, iso2
        )));
    }
    if record.name.trim().is_empty() {
        return Err(Error::reference_data(format!("{} has no canonical name", iso2)));
    }
    for (name, &(start, end)) in &record.historical_names {
        if start > end {
            return Err(Error::reference_data(format!(
                "historical name '{}' for {} ends ({}) before it starts ({})",
                name, iso2, end, start
            )));
        }
    }
    Ok(())
}

/// Lower-case and collapse whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
