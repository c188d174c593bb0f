// Record types for genealogical populations
//
// These are the plain records handed over by a GEDCOM parser. Each pipeline
// stage returns an enriched copy; relatives are referenced by id only.

pub mod date;

pub use date::{extract_month, extract_year};

use crate::geo::CountryMatch;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Recorded sex of an individual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M", alias = "male")]
    Male,
    #[serde(rename = "F", alias = "female")]
    Female,
    #[serde(rename = "U", alias = "unknown")]
    Unknown,
}

/// A life event (birth, death, marriage) as written in the source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Free-text date, e.g. "ABT 12 MAR 1850"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Free-text place, e.g. "Cork, Ireland"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
}

impl Event {
    pub fn new(date: Option<&str>, place: Option<&str>) -> Self {
        Self {
            date: date.map(str::to_string),
            place: place.map(str::to_string),
        }
    }

    /// Leading four-digit year of the date, if any
    pub fn year(&self) -> Option<i32> {
        self.date.as_deref().and_then(extract_year)
    }

    /// Month of the date, if it can be read
    pub fn month(&self) -> Option<u8> {
        self.date.as_deref().and_then(extract_month)
    }
}

/// Which event a place or date belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Birth,
    Death,
    Marriage,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::Birth => "birth",
            EventKind::Death => "death",
            EventKind::Marriage => "marriage",
        };
        f.write_str(name)
    }
}

/// Non-identifying values computed from an individual's events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndividualMetadata {
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    /// 1-12
    pub birth_month: Option<u8>,
    pub lifespan_years: Option<i32>,
    /// Lifespan scaled into [0, 1]
    pub normalized_lifespan: Option<f64>,
    pub is_alive: bool,
}

/// A person in the population
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Externally assigned identifier (e.g. "@I12@")
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth: Option<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death: Option<Event>,
    #[serde(default)]
    pub parents: BTreeSet<String>,
    #[serde(default)]
    pub spouses: BTreeSet<String>,
    #[serde(default)]
    pub children: BTreeSet<String>,
    #[serde(default)]
    pub siblings: BTreeSet<String>,
    /// Relative generation; `None` means unknown, never baseline
    #[serde(default)]
    pub generation: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_country: Option<CountryMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_country: Option<CountryMatch>,
    #[serde(default)]
    pub metadata: IndividualMetadata,
}

impl Individual {
    /// Create an individual with only an id and a name
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_birth(mut self, date: Option<&str>, place: Option<&str>) -> Self {
        self.birth = Some(Event::new(date, place));
        self
    }

    pub fn with_death(mut self, date: Option<&str>, place: Option<&str>) -> Self {
        self.death = Some(Event::new(date, place));
        self
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    /// Event of the given kind, if recorded on the individual
    pub fn event(&self, kind: EventKind) -> Option<&Event> {
        match kind {
            EventKind::Birth => self.birth.as_ref(),
            EventKind::Death => self.death.as_ref(),
            EventKind::Marriage => None,
        }
    }

    /// Drop every derived relation
    pub fn clear_relations(&mut self) {
        self.parents.clear();
        self.spouses.clear();
        self.children.clear();
        self.siblings.clear();
    }

    /// True when no relation of any kind is recorded
    pub fn is_isolated(&self) -> bool {
        self.parents.is_empty()
            && self.spouses.is_empty()
            && self.children.is_empty()
            && self.siblings.is_empty()
    }
}

/// A family unit: an optional couple and their children
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyUnit {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub husband: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wife: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marriage: Option<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marriage_country: Option<CountryMatch>,
}

impl FamilyUnit {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_husband(mut self, id: &str) -> Self {
        self.husband = Some(id.to_string());
        self
    }

    pub fn with_wife(mut self, id: &str) -> Self {
        self.wife = Some(id.to_string());
        self
    }

    pub fn with_children(mut self, ids: &[&str]) -> Self {
        self.children = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_marriage(mut self, date: Option<&str>, place: Option<&str>) -> Self {
        self.marriage = Some(Event::new(date, place));
        self
    }
}

/// A full record set: individuals keyed by id plus their family units.
/// Other top-level keys are rejected, so stats documents and anonymized
/// exports do not read back as populations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Population {
    #[serde(default, deserialize_with = "deserialize_individuals")]
    pub individuals: BTreeMap<String, Individual>,
    #[serde(default)]
    pub families: Vec<FamilyUnit>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a population from parser output
    pub fn from_records(
        individuals: impl IntoIterator<Item = Individual>,
        families: impl IntoIterator<Item = FamilyUnit>,
    ) -> Self {
        Self {
            individuals: individuals
                .into_iter()
                .map(|ind| (ind.id.clone(), ind))
                .collect(),
            families: families.into_iter().collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Individual> {
        self.individuals.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.individuals.contains_key(id)
    }

    /// Number of individuals
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty() && self.families.is_empty()
    }
}

/// Individuals may arrive either keyed by id or as a plain list
fn deserialize_individuals<'de, D>(deserializer: D) -> Result<BTreeMap<String, Individual>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Records {
        Keyed(BTreeMap<String, Individual>),
        Listed(Vec<Individual>),
    }

    let map = match Records::deserialize(deserializer)? {
        Records::Keyed(map) => map
            .into_iter()
            .map(|(key, mut ind)| {
                if ind.id.is_empty() {
                    ind.id = key.clone();
                }
                (key, ind)
            })
            .collect(),
        Records::Listed(list) => list.into_iter().map(|ind| (ind.id.clone(), ind)).collect(),
    };
    Ok(map)
}
