// Relative generation numbers over the family graph
//
// Generations are offsets, not cohorts. Each connected component starts
// from 0 on its own; no attempt is made to line components up.

use crate::model::Population;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::debug;

/// Assigns a generation offset to every reachable individual
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationAssigner;

impl GenerationAssigner {
    pub fn new() -> Self {
        Self
    }

    /// Return a copy of the population with `generation` filled in.
    /// Expects relation sets to have been derived already.
    pub fn assign(&self, population: &Population) -> Population {
        let generations = self.generations(population);
        let mut assigned = population.clone();
        for (id, individual) in assigned.individuals.iter_mut() {
            individual.generation = generations.get(id).copied().flatten();
        }
        assigned
    }

    /// Generation per individual id; `None` means unreachable from any root
    pub fn generations(&self, population: &Population) -> BTreeMap<String, Option<i32>> {
        let listed_as_child: HashSet<&str> = population
            .families
            .iter()
            .flat_map(|family| family.children.iter().map(String::as_str))
            .collect();

        let is_root = |id: &str| !listed_as_child.contains(id);

        // Founders: roots who did not marry into a family below them.
        // Starting from them keeps married-in spouses level with their partner.
        let founders: Vec<&str> = population
            .individuals
            .values()
            .filter(|ind| is_root(ind.id.as_str()))
            .filter(|ind| ind.spouses.iter().all(|spouse| is_root(spouse.as_str())))
            .map(|ind| ind.id.as_str())
            .collect();

        let mut generations: BTreeMap<&str, i32> = BTreeMap::new();
        self.traverse(population, &founders, &mut generations);

        // Roots only married to non-roots that were never reached
        let stragglers: Vec<&str> = population
            .individuals
            .keys()
            .map(String::as_str)
            .filter(|id| is_root(*id) && !generations.contains_key(*id))
            .collect();
        if !stragglers.is_empty() {
            debug!(count = stragglers.len(), "Seeding remaining roots");
            self.traverse(population, &stragglers, &mut generations);
        }

        let unassigned = population.individuals.len() - generations.len();
        debug!(
            assigned = generations.len(),
            unassigned,
            roots = founders.len(),
            "Assigned generations"
        );

        population
            .individuals
            .keys()
            .map(|id| (id.clone(), generations.get(id.as_str()).copied()))
            .collect()
    }

    /// Breadth-first from every seed at once. An individual keeps the
    /// generation it was first reached with.
    fn traverse<'a>(
        &self,
        population: &'a Population,
        seeds: &[&'a str],
        generations: &mut BTreeMap<&'a str, i32>,
    ) {
        let mut queue: VecDeque<(&str, i32)> = VecDeque::new();
        for &seed in seeds {
            if !generations.contains_key(seed) {
                generations.insert(seed, 0);
                queue.push_back((seed, 0));
            }
        }

        while let Some((id, generation)) = queue.pop_front() {
            let Some(individual) = population.get(id) else {
                continue;
            };

            for spouse in &individual.spouses {
                if population.contains(spouse) && !generations.contains_key(spouse.as_str()) {
                    generations.insert(spouse.as_str(), generation);
                    queue.push_back((spouse.as_str(), generation));
                }
            }
            for child in &individual.children {
                if population.contains(child) && !generations.contains_key(child.as_str()) {
                    generations.insert(child.as_str(), generation + 1);
                    queue.push_back((child.as_str(), generation + 1));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::graph::RelationshipGraphBuilder;
    use crate::model::{FamilyUnit, Individual};

    fn person(id: &str) -> Individual {
        Individual::new(id, id)
    }

    fn assign(individuals: Vec<Individual>, families: Vec<FamilyUnit>) -> Population {
        let population = Population::from_records(individuals, families);
        let graph = RelationshipGraphBuilder::new().build(&population);
        GenerationAssigner::new().assign(graph.population())
    }

    fn generation(population: &Population, id: &str) -> Option<i32> {
        population.get(id).and_then(|ind| ind.generation)
    }

    fn assert_invariants(population: &Population) {
        for individual in population.individuals.values() {
            let Some(own) = individual.generation else {
                continue;
            };
            for spouse in &individual.spouses {
                assert_eq!(generation(population, spouse), Some(own), "spouse of {}", individual.id);
            }
            for child in &individual.children {
                assert_eq!(generation(population, child), Some(own + 1), "child of {}", individual.id);
            }
        }
    }

    #[test]
    fn test_three_generations() {
        let population = assign(
            vec![person("G"), person("P"), person("C")],
            vec![
                FamilyUnit::new("F1").with_husband("G").with_children(&["P"]),
                FamilyUnit::new("F2").with_wife("P").with_children(&["C"]),
            ],
        );
        assert_eq!(generation(&population, "G"), Some(0));
        assert_eq!(generation(&population, "P"), Some(1));
        assert_eq!(generation(&population, "C"), Some(2));
        assert_invariants(&population);
    }

    #[test]
    fn test_married_in_spouse_matches_partner() {
        // S is not a child anywhere but marries into generation 1
        let population = assign(
            vec![person("F"), person("M"), person("C"), person("S"), person("GC")],
            vec![
                FamilyUnit::new("F1").with_husband("F").with_wife("M").with_children(&["C"]),
                FamilyUnit::new("F2").with_husband("S").with_wife("C").with_children(&["GC"]),
            ],
        );
        assert_eq!(generation(&population, "F"), Some(0));
        assert_eq!(generation(&population, "M"), Some(0));
        assert_eq!(generation(&population, "C"), Some(1));
        assert_eq!(generation(&population, "S"), Some(1));
        assert_eq!(generation(&population, "GC"), Some(2));
        assert_invariants(&population);
    }

    #[test]
    fn test_disconnected_components_each_start_at_zero() {
        let population = assign(
            vec![person("A"), person("A1"), person("B"), person("B1"), person("B2")],
            vec![
                FamilyUnit::new("F1").with_husband("A").with_children(&["A1"]),
                FamilyUnit::new("F2").with_wife("B").with_children(&["B1"]),
                FamilyUnit::new("F3").with_wife("B1").with_children(&["B2"]),
            ],
        );
        assert_eq!(generation(&population, "A"), Some(0));
        assert_eq!(generation(&population, "B"), Some(0));
        assert_eq!(generation(&population, "B2"), Some(2));
    }

    #[test]
    fn test_isolated_individual_is_root() {
        let population = assign(vec![person("LONE")], vec![]);
        assert_eq!(generation(&population, "LONE"), Some(0));
    }

    #[test]
    fn test_no_roots_leaves_everyone_unknown() {
        // every record is listed as somebody's child
        let population = assign(
            vec![person("A"), person("B")],
            vec![
                FamilyUnit::new("F1").with_husband("A").with_children(&["B"]),
                FamilyUnit::new("F2").with_husband("B").with_children(&["A"]),
            ],
        );
        assert_eq!(generation(&population, "A"), None);
        assert_eq!(generation(&population, "B"), None);
    }

    #[test]
    fn test_listed_child_without_parents_is_unknown() {
        // a family lists the child but has no partners
        let population = assign(
            vec![person("ORPHAN")],
            vec![FamilyUnit::new("F1").with_children(&["ORPHAN"])],
        );
        assert_eq!(generation(&population, "ORPHAN"), None);
    }

    #[test]
    fn test_root_married_to_unreached_child() {
        // R marries C, whose parents form a closed loop and are never seeded
        let population = assign(
            vec![person("X"), person("Y"), person("C"), person("R")],
            vec![
                FamilyUnit::new("F1").with_husband("X").with_children(&["Y"]),
                FamilyUnit::new("F2").with_husband("Y").with_children(&["X", "C"]),
                FamilyUnit::new("F3").with_husband("R").with_wife("C"),
            ],
        );
        assert_eq!(generation(&population, "R"), Some(0));
        assert_eq!(generation(&population, "C"), Some(0));
        assert_eq!(generation(&population, "X"), None);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let population = Population::from_records(vec![person("A")], vec![]);
        let assigned = GenerationAssigner::new().assign(&population);
        assert_eq!(population.get("A").unwrap().generation, None);
        assert_eq!(assigned.get("A").unwrap().generation, Some(0));
    }

    #[test]
    fn test_empty_population() {
        let generations = GenerationAssigner::new().generations(&Population::new());
        assert!(generations.is_empty());
    }

    #[test]
    fn test_wide_family_tree() {
        let mut individuals = vec![person("ROOT")];
        let mut families = Vec::new();
        let mut parent = "ROOT".to_string();
        for depth in 1..=50 {
            let child = format!("D{}", depth);
            individuals.push(person(&child));
            families.push(
                FamilyUnit::new(&format!("F{}", depth))
                    .with_husband(&parent)
                    .with_children(&[child.as_str()]),
            );
            parent = child;
        }
        let population = assign(individuals, families);
        assert_eq!(generation(&population, "D50"), Some(50));
        assert_invariants(&population);
    }
}
