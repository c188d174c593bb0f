// Cascading place-to-country resolution
//
// Tiers are tried in a fixed order and the first hit wins:
// - exact ISO2/ISO3 code
// - alias or canonical name
// - comma-suffix / wildcard pattern
// - unambiguous region
// - historical name valid in the given year
// - whole-word containment of a name or alias
// - Levenshtein distance to a name or alias

use crate::error::Result;
use crate::geo::countries::{normalize, CountryTable, HistoricalName};
use crate::geo::fuzzy::{contains_word, levenshtein};
use crate::geo::stats::{ConfidenceTier, LookupContext, ResolutionStats};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::trace;

pub const EXACT_CONFIDENCE: f64 = 1.0;
pub const ALIAS_CONFIDENCE: f64 = 0.95;
pub const PATTERN_CONFIDENCE: f64 = 0.90;
pub const REGION_CONFIDENCE: f64 = 0.85;
pub const HISTORICAL_CONFIDENCE: f64 = 0.75;
pub const PARTIAL_CONFIDENCE: f64 = 0.85;

/// Largest edit distance the fuzzy tier will consider
pub const MAX_FUZZY_DISTANCE: usize = 3;

/// Prefixes that read like historical entities; such places skip the
/// containment tier so "East Germany" is not taken for "Germany"
const AMBIGUOUS_PREFIXES: [&str; 6] = ["east ", "west ", "north ", "south ", "soviet ", "former "];

/// How a match was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Exact,
    Alias,
    Pattern,
    Region,
    Historical,
    Fuzzy,
}

/// Outcome of resolving one place string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryMatch {
    pub iso2: Option<String>,
    pub confidence: f64,
    pub method: MatchMethod,
    /// The piece of text (or pattern) that produced the match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_year: Option<i32>,
}

impl CountryMatch {
    /// The "no match" result
    pub fn none() -> Self {
        Self {
            iso2: None,
            confidence: 0.0,
            method: MatchMethod::Fuzzy,
            matched: None,
            historical_year: None,
        }
    }

    fn found(iso2: &str, confidence: f64, method: MatchMethod, matched: &str) -> Self {
        Self {
            iso2: Some(iso2.to_string()),
            confidence,
            method,
            matched: Some(matched.to_string()),
            historical_year: None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.iso2.is_some()
    }

    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_confidence(self.confidence)
    }
}

/// Resolves free-text places to ISO2 country codes
///
/// The resolver is immutable after construction and can be shared across
/// threads; statistics live in a caller-owned [`ResolutionStats`].
#[derive(Debug, Clone)]
pub struct CountryResolver {
    table: CountryTable,
}

impl CountryResolver {
    pub fn new(table: CountryTable) -> Self {
        Self { table }
    }

    /// Resolver over the built-in reference data
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(CountryTable::builtin()?))
    }

    /// Resolver over a reference data file; missing or malformed data is fatal
    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(CountryTable::load(path)?))
    }

    pub fn table(&self) -> &CountryTable {
        &self.table
    }

    /// Resolve a place and account for it in `stats`
    pub fn resolve_tracked(
        &self,
        place: &str,
        year: Option<i32>,
        context: &LookupContext,
        stats: &mut ResolutionStats,
    ) -> CountryMatch {
        let result = self.resolve(place, year);
        stats.record(place, &result, context);
        result
    }

    /// Resolve a place to a country, trying each tier in priority order
    pub fn resolve(&self, place: &str, year: Option<i32>) -> CountryMatch {
        let text = normalize(place);
        if text.is_empty() {
            return CountryMatch::none();
        }

        let result = self
            .match_exact(&text)
            .or_else(|| self.match_alias(&text))
            .or_else(|| self.match_pattern(&text))
            .or_else(|| self.match_region(&text))
            .or_else(|| year.and_then(|y| self.match_historical(&text, y)))
            .or_else(|| self.match_partial(&text))
            .or_else(|| self.match_fuzzy(&text))
            .unwrap_or_else(CountryMatch::none);

        trace!(place, iso2 = ?result.iso2, method = ?result.method, "Resolved place");
        result
    }

    fn match_exact(&self, text: &str) -> Option<CountryMatch> {
        self.table
            .by_code(text)
            .map(|iso2| CountryMatch::found(iso2, EXACT_CONFIDENCE, MatchMethod::Exact, text))
    }

    fn match_alias(&self, text: &str) -> Option<CountryMatch> {
        self.table
            .by_alias(text)
            .map(|iso2| CountryMatch::found(iso2, ALIAS_CONFIDENCE, MatchMethod::Alias, text))
    }

    fn match_pattern(&self, text: &str) -> Option<CountryMatch> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        if parts.len() >= 2 {
            if let Some(last) = parts.last().filter(|p| !p.is_empty()) {
                if let Some(iso2) = self.table.by_code(last).or_else(|| self.table.by_alias(last)) {
                    return Some(CountryMatch::found(
                        iso2,
                        PATTERN_CONFIDENCE,
                        MatchMethod::Pattern,
                        last,
                    ));
                }
            }
        }

        self.table.by_pattern(text).map(|(pattern, iso2)| {
            CountryMatch::found(iso2, PATTERN_CONFIDENCE, MatchMethod::Pattern, pattern)
        })
    }

    fn match_region(&self, text: &str) -> Option<CountryMatch> {
        if let Some(iso2) = self.table.by_region(text) {
            return Some(CountryMatch::found(iso2, REGION_CONFIDENCE, MatchMethod::Region, text));
        }

        // Most general component first: "Cork, Munster" checks "munster" then "cork".
        // Single words come after the comma parts, again last to first.
        let parts: Vec<&str> = text
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        let words = parts.iter().rev().flat_map(|part| part.split(' ').rev());

        parts
            .iter()
            .rev()
            .copied()
            .chain(words)
            .find_map(|token| {
                self.table
                    .by_region(token)
                    .map(|iso2| CountryMatch::found(iso2, REGION_CONFIDENCE, MatchMethod::Region, token))
            })
    }

    fn match_historical(&self, text: &str, year: i32) -> Option<CountryMatch> {
        let best = self
            .table
            .historical_names()
            .iter()
            .filter(|h| h.valid_in(year) && contains_word(text, &h.name))
            .fold(None, |best: Option<&HistoricalName>, h| match best {
                Some(b) if b.name.len() >= h.name.len() => Some(b),
                _ => Some(h),
            })?;

        let mut result =
            CountryMatch::found(&best.iso2, HISTORICAL_CONFIDENCE, MatchMethod::Historical, &best.name);
        result.historical_year = Some(year);
        Some(result)
    }

    /// Whole-word containment of a canonical name or alias; longest wins.
    /// Reported under the region method since it sits at region confidence.
    fn match_partial(&self, text: &str) -> Option<CountryMatch> {
        if AMBIGUOUS_PREFIXES.iter().any(|p| text.starts_with(p)) {
            return None;
        }

        let (name, iso2) = self
            .table
            .names()
            .iter()
            .filter(|(name, _)| contains_word(text, name))
            .fold(None, |best: Option<&(String, String)>, candidate| match best {
                Some(b) if b.0.len() >= candidate.0.len() => Some(b),
                _ => Some(candidate),
            })?;

        Some(CountryMatch::found(iso2, PARTIAL_CONFIDENCE, MatchMethod::Region, name))
    }

    fn match_fuzzy(&self, text: &str) -> Option<CountryMatch> {
        let text_len = text.chars().count();
        let mut best: Option<(usize, &str, &str)> = None;

        for (name, iso2) in self.table.names() {
            // distance can never be below the length difference
            if text_len.abs_diff(name.chars().count()) > MAX_FUZZY_DISTANCE {
                continue;
            }
            let distance = levenshtein(text, name);
            if best.map_or(true, |(d, _, _)| distance < d) {
                best = Some((distance, name, iso2));
            }
        }

        let (distance, name, iso2) = best?;
        if distance > MAX_FUZZY_DISTANCE {
            return None;
        }

        // computed in tenths so 0.6 - 0.1 lands exactly on 0.5
        let tenths = 6usize.saturating_sub(distance).max(3);
        if tenths < 5 {
            return None;
        }
        Some(CountryMatch::found(
            iso2,
            tenths as f64 / 10.0,
            MatchMethod::Fuzzy,
            name,
        ))
    }
}
