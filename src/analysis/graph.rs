// Family graph derived from family units
//
// Family units are the ground truth. Every relation set on every individual
// is rebuilt from them, so a child's parents are exactly the partners of the
// families listing that child.

use crate::model::{FamilyUnit, Individual, Population};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;
use tracing::{debug, warn};

/// Kind of relationship an edge represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    /// Source is a parent of target
    ParentChild,
    Spouse,
    Sibling,
}

/// A derived, read-only view of one relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: RelationshipKind,
    /// Family unit the relation came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

impl Edge {
    pub fn new(source: &str, target: &str, kind: RelationshipKind, family: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            kind,
            family: Some(family.to_string()),
        }
    }
}

/// Role an individual plays in a family unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyRole {
    Husband,
    Wife,
    Child,
}

impl fmt::Display for FamilyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FamilyRole::Husband => f.write_str("husband"),
            FamilyRole::Wife => f.write_str("wife"),
            FamilyRole::Child => f.write_str("child"),
        }
    }
}

/// A record-local problem found while building the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphWarning {
    /// The family references an id with no individual record
    UnknownIndividual {
        family: String,
        individual: String,
        role: FamilyRole,
    },
    /// The family relates an individual to themself
    SelfReference {
        family: String,
        individual: String,
        role: FamilyRole,
    },
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWarning::UnknownIndividual { family, individual, role } => write!(
                f,
                "family {} lists unknown {} {}",
                family, role, individual
            ),
            GraphWarning::SelfReference { family, individual, role } => write!(
                f,
                "family {} relates {} to themself as {}",
                family, individual, role
            ),
        }
    }
}

/// Counts of the derived graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub individuals: usize,
    pub families: usize,
    pub parent_child_edges: usize,
    pub spouse_edges: usize,
    pub sibling_edges: usize,
}

/// Population with relation sets derived, plus the edge view
#[derive(Debug, Clone, Default)]
pub struct FamilyGraph {
    population: Population,
    edges: Vec<Edge>,
    warnings: Vec<GraphWarning>,
}

impl FamilyGraph {
    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn get(&self, id: &str) -> Option<&Individual> {
        self.population.get(id)
    }

    /// All derived edges in family order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn warnings(&self) -> &[GraphWarning] {
        &self.warnings
    }

    /// Every ancestor of an individual, nearest first
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        self.walk(id, |ind| &ind.parents)
    }

    /// Every descendant of an individual, nearest first
    pub fn descendants(&self, id: &str) -> Vec<String> {
        self.walk(id, |ind| &ind.children)
    }

    /// Breadth-first walk with a visited set, so cyclic input terminates
    fn walk<F>(&self, start: &str, next: F) -> Vec<String>
    where
        F: Fn(&Individual) -> &BTreeSet<String>,
    {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut found = Vec::new();

        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            let Some(individual) = self.population.get(current) else {
                continue;
            };
            for relative in next(individual) {
                if visited.insert(relative.as_str()) {
                    found.push(relative.clone());
                    queue.push_back(relative.as_str());
                }
            }
        }

        found
    }

    pub fn stats(&self) -> GraphStats {
        let count = |kind| self.edges.iter().filter(|e| e.kind == kind).count();
        GraphStats {
            individuals: self.population.individuals.len(),
            families: self.population.families.len(),
            parent_child_edges: count(RelationshipKind::ParentChild),
            spouse_edges: count(RelationshipKind::Spouse),
            sibling_edges: count(RelationshipKind::Sibling),
        }
    }
}

/// Derives parent, child, spouse, and sibling sets from family units
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationshipGraphBuilder;

impl RelationshipGraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the family graph. The input population is left untouched.
    pub fn build(&self, population: &Population) -> FamilyGraph {
        let mut individuals: BTreeMap<String, Individual> = population.individuals.clone();
        for individual in individuals.values_mut() {
            individual.clear_relations();
        }

        let mut edges = Vec::new();
        let mut seen_edges: HashSet<(RelationshipKind, String, String)> = HashSet::new();
        let mut warnings = Vec::new();

        for family in &population.families {
            let members = FamilyMembers::collect(family, &individuals, &mut warnings);
            let mut push_edge = |edge: Edge| {
                // spouse and sibling edges are the same relation either way round
                let key = match edge.kind {
                    RelationshipKind::ParentChild => (edge.source.clone(), edge.target.clone()),
                    _ if edge.source > edge.target => (edge.target.clone(), edge.source.clone()),
                    _ => (edge.source.clone(), edge.target.clone()),
                };
                if seen_edges.insert((edge.kind, key.0, key.1)) {
                    edges.push(edge);
                }
            };

            if let (Some(husband), Some(wife)) = (members.husband, members.wife) {
                if husband == wife {
                    warnings.push(GraphWarning::SelfReference {
                        family: family.id.clone(),
                        individual: husband.to_string(),
                        role: FamilyRole::Wife,
                    });
                } else {
                    link(&mut individuals, husband, wife, |ind| &mut ind.spouses);
                    link(&mut individuals, wife, husband, |ind| &mut ind.spouses);
                    push_edge(Edge::new(husband, wife, RelationshipKind::Spouse, &family.id));
                }
            }

            for &child in &members.children {
                for parent in [members.husband, members.wife].into_iter().flatten() {
                    if parent == child {
                        warnings.push(GraphWarning::SelfReference {
                            family: family.id.clone(),
                            individual: child.to_string(),
                            role: FamilyRole::Child,
                        });
                        continue;
                    }
                    link(&mut individuals, child, parent, |ind| &mut ind.parents);
                    link(&mut individuals, parent, child, |ind| &mut ind.children);
                    push_edge(Edge::new(parent, child, RelationshipKind::ParentChild, &family.id));
                }
            }

            for (i, &a) in members.children.iter().enumerate() {
                for &b in &members.children[i + 1..] {
                    link(&mut individuals, a, b, |ind| &mut ind.siblings);
                    link(&mut individuals, b, a, |ind| &mut ind.siblings);
                    let (low, high) = if a < b { (a, b) } else { (b, a) };
                    push_edge(Edge::new(low, high, RelationshipKind::Sibling, &family.id));
                }
            }
        }

        for warning in &warnings {
            warn!(%warning, "Skipping relation");
        }

        let graph = FamilyGraph {
            population: Population {
                individuals,
                families: population.families.clone(),
            },
            edges,
            warnings,
        };

        debug!(
            individuals = graph.population.individuals.len(),
            families = graph.population.families.len(),
            edges = graph.edges.len(),
            "Built relationship graph"
        );

        graph
    }
}

/// The members of a family that exist in the population
struct FamilyMembers<'a> {
    husband: Option<&'a str>,
    wife: Option<&'a str>,
    /// Known children, deduplicated, in listed order
    children: Vec<&'a str>,
}

impl<'a> FamilyMembers<'a> {
    fn collect(
        family: &'a FamilyUnit,
        individuals: &BTreeMap<String, Individual>,
        warnings: &mut Vec<GraphWarning>,
    ) -> Self {
        let mut known = |id: &'a str, role: FamilyRole| -> Option<&'a str> {
            if individuals.contains_key(id) {
                Some(id)
            } else {
                warnings.push(GraphWarning::UnknownIndividual {
                    family: family.id.clone(),
                    individual: id.to_string(),
                    role,
                });
                None
            }
        };

        let husband = family
            .husband
            .as_deref()
            .and_then(|id| known(id, FamilyRole::Husband));
        let wife = family
            .wife
            .as_deref()
            .and_then(|id| known(id, FamilyRole::Wife));

        let mut seen = HashSet::new();
        let mut children = Vec::new();
        for id in &family.children {
            if seen.insert(id.as_str()) {
                if let Some(child) = known(id, FamilyRole::Child) {
                    children.push(child);
                }
            }
        }

        Self {
            husband,
            wife,
            children,
        }
    }
}

/// Add `target` to one of `owner`'s relation sets; never to itself
fn link<F>(individuals: &mut BTreeMap<String, Individual>, owner: &str, target: &str, set: F)
where
    F: Fn(&mut Individual) -> &mut BTreeSet<String>,
{
    if owner == target {
        return;
    }
    if let Some(individual) = individuals.get_mut(owner) {
        set(individual).insert(target.to_string());
    }
}
