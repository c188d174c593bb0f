// Running statistics for place resolution
//
// The resolver itself holds no mutable state. Callers own a
// `ResolutionStats` value and thread it through each lookup; one value per
// processed file keeps files from contaminating each other.

use crate::geo::resolver::{CountryMatch, MatchMethod};
use crate::model::EventKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bucketed trust level of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    /// >= 0.9
    High,
    /// 0.7 up to 0.9
    Medium,
    /// 0.5 up to 0.7
    Low,
    /// < 0.5
    Unmatched,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            ConfidenceTier::High
        } else if confidence >= 0.7 {
            ConfidenceTier::Medium
        } else if confidence >= 0.5 {
            ConfidenceTier::Low
        } else {
            ConfidenceTier::Unmatched
        }
    }
}

/// Who asked for a lookup, for the unresolved-locations log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupContext {
    pub individual_id: Option<String>,
    pub event: Option<EventKind>,
    pub year: Option<i32>,
}

impl LookupContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn individual(mut self, id: &str) -> Self {
        self.individual_id = Some(id.to_string());
        self
    }

    pub fn event(mut self, kind: EventKind) -> Self {
        self.event = Some(kind);
        self
    }

    pub fn year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }
}

/// A place that no tier could resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedLocation {
    pub place: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub individual_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

/// Per-tier counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unmatched: usize,
}

/// Statistics accumulated over a series of lookups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub total_lookups: usize,
    pub tiers: TierCounts,
    /// Successful matches per method
    pub by_method: BTreeMap<MatchMethod, usize>,
    pub unresolved: Vec<UnresolvedLocation>,
}

impl ResolutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one lookup and its outcome
    pub fn record(&mut self, place: &str, result: &CountryMatch, context: &LookupContext) {
        self.total_lookups += 1;

        match result.tier() {
            ConfidenceTier::High => self.tiers.high += 1,
            ConfidenceTier::Medium => self.tiers.medium += 1,
            ConfidenceTier::Low => self.tiers.low += 1,
            ConfidenceTier::Unmatched => {
                self.tiers.unmatched += 1;
                // blank places carry nothing worth diagnosing
                if !place.trim().is_empty() {
                    self.unresolved.push(UnresolvedLocation {
                        place: place.to_string(),
                        individual_id: context.individual_id.clone(),
                        event: context.event,
                        year: context.year,
                    });
                }
                return;
            }
        }

        if result.iso2.is_some() {
            *self.by_method.entry(result.method).or_insert(0) += 1;
        }
    }

    /// Clear every counter and the unresolved log
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold another set of statistics into this one
    pub fn merge(&mut self, other: &ResolutionStats) {
        self.total_lookups += other.total_lookups;
        self.tiers.high += other.tiers.high;
        self.tiers.medium += other.tiers.medium;
        self.tiers.low += other.tiers.low;
        self.tiers.unmatched += other.tiers.unmatched;
        for (method, count) in &other.by_method {
            *self.by_method.entry(*method).or_insert(0) += count;
        }
        self.unresolved.extend(other.unresolved.iter().cloned());
    }

    /// Lookups that landed in a matched tier
    pub fn matched(&self) -> usize {
        self.total_lookups - self.tiers.unmatched
    }

    /// Fraction of lookups that matched (0.0 when nothing was looked up)
    pub fn resolution_rate(&self) -> f64 {
        if self.total_lookups == 0 {
            0.0
        } else {
            self.matched() as f64 / self.total_lookups as f64
        }
    }
}
