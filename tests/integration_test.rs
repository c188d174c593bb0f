// Integration tests for Kindred

use assert_cmd::Command;
use kindred::analysis::{read_population, GraphWarning};
use kindred::geo::MatchMethod;
use kindred::privacy::{validate, validate_export};
use kindred::{Anonymizer, Config, CountryResolver, Enricher, NamingStrategy, Population};
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixtures_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

// Helper to create an enricher with a fixed reference year
fn create_enricher() -> Enricher {
    let mut config = Config::default();
    config.enrich.reference_year = Some(2024);
    Enricher::new(config).expect("Failed to create enricher")
}

fn load(name: &str) -> Population {
    read_population(&fixtures_path(name)).expect("Failed to read fixture")
}

fn kindred_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kindred").expect("binary not built");
    cmd.current_dir(dir.path());
    cmd
}

fn generation(population: &Population, id: &str) -> Option<i32> {
    population.get(id).and_then(|ind| ind.generation)
}

// ============================================================================
// Enrichment Tests
// ============================================================================

#[test]
fn test_enrich_family_relations() {
    let result = create_enricher().enrich(&load("family.json"));
    let people = &result.population;

    let john = people.get("@I3@").unwrap();
    assert!(john.parents.contains("@I1@"));
    assert!(john.parents.contains("@I2@"));
    assert!(john.siblings.contains("@I5@"));
    assert!(john.spouses.contains("@I4@"));
    assert!(john.children.contains("@I6@"));

    let anna = people.get("@I4@").unwrap();
    assert!(anna.parents.contains("@I7@"));
    assert!(anna.spouses.contains("@I3@"));

    assert!(result.warnings.is_empty());
}

#[test]
fn test_enrich_generations() {
    let result = create_enricher().enrich(&load("family.json"));
    let people = &result.population;

    assert_eq!(generation(people, "@I1@"), Some(0));
    assert_eq!(generation(people, "@I2@"), Some(0));
    assert_eq!(generation(people, "@I7@"), Some(0));
    assert_eq!(generation(people, "@I3@"), Some(1));
    assert_eq!(generation(people, "@I4@"), Some(1));
    assert_eq!(generation(people, "@I5@"), Some(1));
    assert_eq!(generation(people, "@I6@"), Some(2));

    // parent + 1 for every known parent, spouses level
    for individual in people.individuals.values() {
        let Some(own) = individual.generation else {
            continue;
        };
        for parent in &individual.parents {
            if let Some(parent_generation) = generation(people, parent) {
                assert_eq!(own, parent_generation + 1, "{} vs parent {}", individual.id, parent);
            }
        }
        for spouse in &individual.spouses {
            assert_eq!(generation(people, spouse), Some(own));
        }
    }
}

#[test]
fn test_enrich_no_self_relations() {
    for fixture in ["family.json", "broken_family.json"] {
        let result = create_enricher().enrich(&load(fixture));
        for individual in result.population.individuals.values() {
            let id = &individual.id;
            assert!(!individual.parents.contains(id));
            assert!(!individual.children.contains(id));
            assert!(!individual.spouses.contains(id));
            assert!(!individual.siblings.contains(id));
        }
    }
}

#[test]
fn test_enrich_places() {
    let result = create_enricher().enrich(&load("family.json"));
    let people = &result.population;

    let country = |id: &str| {
        people
            .get(id)
            .and_then(|ind| ind.birth_country.as_ref())
            .and_then(|m| m.iso2.clone())
    };
    assert_eq!(country("@I1@").as_deref(), Some("IE"));
    assert_eq!(country("@I2@").as_deref(), Some("IE"));
    assert_eq!(country("@I3@").as_deref(), Some("US"));
    assert_eq!(country("@I4@").as_deref(), Some("DE"));
    assert_eq!(country("@I7@").as_deref(), Some("DE"));

    let hans = people.get("@I7@").and_then(|ind| ind.birth_country.clone()).unwrap();
    assert_eq!(hans.method, MatchMethod::Historical);
    assert_eq!(hans.historical_year, Some(1825));

    // seven births, five deaths, two marriages
    assert_eq!(result.resolution.total_lookups, 14);
    assert_eq!(result.resolution.unresolved.len(), 1);
    assert_eq!(result.resolution.unresolved[0].place, "Atlantis");
    assert_eq!(result.resolution.unresolved[0].individual_id.as_deref(), Some("@I6@"));
}

#[test]
fn test_enrich_metadata_and_metrics() {
    let result = create_enricher().enrich(&load("family.json"));
    let patrick = result.population.get("@I1@").unwrap();
    assert_eq!(patrick.metadata.birth_month, Some(3));
    assert_eq!(patrick.metadata.lifespan_years, Some(70));
    assert!(!patrick.metadata.is_alive);

    let metrics = &result.metrics;
    assert_eq!(metrics.structural.individual_count, 7);
    assert_eq!(metrics.structural.family_count, 3);
    assert_eq!(metrics.structural.component_count, 1);
    assert_eq!(metrics.structural.generation_span, 3);
    assert_eq!(metrics.demographic.male, 4);
    assert_eq!(metrics.demographic.female, 3);
    assert_eq!(metrics.temporal.earliest_birth_year, Some(1820));
    assert_eq!(metrics.geographic.birth_countries.get("US"), Some(&3));
}

#[test]
fn test_enrich_broken_family() {
    let result = create_enricher().enrich(&load("broken_family.json"));
    let people = &result.population;

    let alice = people.get("A").unwrap();
    assert_eq!(alice.parents.len(), 1);
    assert!(alice.parents.contains("B"));
    assert!(alice.siblings.is_empty());
    assert_eq!(generation(people, "B"), Some(0));
    assert_eq!(generation(people, "A"), Some(1));

    let unknown = result
        .warnings
        .iter()
        .filter(|w| matches!(w, GraphWarning::UnknownIndividual { .. }))
        .count();
    let self_refs = result
        .warnings
        .iter()
        .filter(|w| matches!(w, GraphWarning::SelfReference { .. }))
        .count();
    assert_eq!(unknown, 2);
    assert_eq!(self_refs, 1);
}

#[test]
fn test_enrich_empty_population() {
    let result = create_enricher().enrich(&Population::new());
    assert!(result.population.is_empty());
    assert_eq!(result.resolution.total_lookups, 0);

    let export = Anonymizer::seeded(NamingStrategy::ById, 1).anonymize(&result.population);
    assert!(export.individuals.is_empty());
    assert!(validate(&export).unwrap().is_valid());
}

// ============================================================================
// Anonymization Tests
// ============================================================================

#[test]
fn test_anonymize_enriched_family() {
    let result = create_enricher().enrich(&load("family.json"));
    let export = Anonymizer::seeded(NamingStrategy::ByGeneration, 7).anonymize(&result.population);

    assert_eq!(export.individuals.len(), 7);
    assert_eq!(export.families.len(), 3);
    assert_eq!(export.report.names_stripped, 7);
    assert_eq!(export.report.locations_stripped, 14);
    assert_eq!(export.individuals["@I6@"].name, "Person_2_1");

    let json = serde_json::to_string(&export).unwrap();
    for leaked in ["Murphy", "Schmidt", "Cork", "Boston", "Prussia", "MAR", "\"place\"", "_country"] {
        assert!(!json.contains(leaked), "export leaked {}", leaked);
    }

    let report = validate(&export).unwrap();
    assert!(report.is_valid(), "{:?}", report.issues);
}

#[test]
fn test_anonymize_twice_same_structure() {
    let population = create_enricher().enrich(&load("family.json")).population;
    let first = Anonymizer::new(NamingStrategy::ById).anonymize(&population);
    let second = Anonymizer::new(NamingStrategy::ById).anonymize(&population);

    let first_json = serde_json::to_value(&first).unwrap();
    let second_json = serde_json::to_value(&second).unwrap();
    for (id, individual) in first_json["individuals"].as_object().unwrap() {
        let other = &second_json["individuals"][id];
        let keys = |v: &serde_json::Value| {
            v.as_object().unwrap().keys().cloned().collect::<Vec<_>>()
        };
        assert_eq!(keys(individual), keys(other));
        assert_eq!(individual["name"], other["name"]);
        assert_eq!(individual["birth"], other["birth"]);
        assert_eq!(individual["generation"], other["generation"]);

        if let Some(month) = individual["metadata"]["birth_month"].as_u64() {
            assert!((1..=12).contains(&month));
        }
        if let Some(lifespan) = individual["metadata"]["normalized_lifespan"].as_f64() {
            assert!((0.0..=1.0).contains(&lifespan));
        }
    }
}

#[test]
fn test_validate_leaky_export() {
    let contents = std::fs::read_to_string(fixtures_path("leaky_export.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
    let report = validate_export(&value);

    assert!(!report.is_valid());
    assert_eq!(report.individuals_checked, 2);
    // real name, birth place, birth_country, death date key
    assert_eq!(report.issues.len(), 4);
}

// ============================================================================
// Reference Data Tests
// ============================================================================

#[test]
fn test_custom_reference_data() {
    let resolver = CountryResolver::from_path(&fixtures_path("countries.json")).unwrap();
    assert_eq!(resolver.table().len(), 3);

    let cork = resolver.resolve("Cork", None);
    assert_eq!(cork.iso2.as_deref(), Some("IE"));
    assert_eq!(cork.method, MatchMethod::Region);

    // Limburg belongs to two countries
    let limburg = resolver.resolve("Limburg", None);
    assert!(limburg.method != MatchMethod::Region || limburg.iso2.is_none());

    let batavia = resolver.resolve("Batavian Republic", Some(1800));
    assert_eq!(batavia.iso2.as_deref(), Some("NL"));
    assert_eq!(batavia.method, MatchMethod::Historical);
}

#[test]
fn test_bad_reference_data_is_fatal() {
    let mut config = Config::default();
    config.geo.reference_data = Some(fixtures_path("bad_countries.json"));
    assert!(Enricher::new(config).is_err());
}

// ============================================================================
// CLI Tests
// ============================================================================

#[test]
fn test_cli_resolve() {
    let dir = TempDir::new().unwrap();
    kindred_cmd(&dir)
        .args(["resolve", "New York, USA"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"iso2\": \"US\""))
        .stdout(predicate::str::contains("\"method\": \"pattern\""));
}

#[test]
fn test_cli_resolve_historical() {
    let dir = TempDir::new().unwrap();
    kindred_cmd(&dir)
        .args(["resolve", "Prussia", "--year", "1850"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"historical\""))
        .stdout(predicate::str::contains("\"historical_year\": 1850"));
}

#[test]
fn test_cli_enrich_directory_with_anonymize() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");

    kindred_cmd(&dir)
        .arg("enrich")
        .arg(fixtures_path("batch"))
        .arg("--output")
        .arg(&out)
        .args(["--anonymize", "--seed", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("murphy.json: 7 individuals"))
        .stdout(predicate::str::contains("byrne.json: 2 individuals"));

    for name in [
        "murphy.enriched.json",
        "murphy.stats.json",
        "murphy.anonymized.json",
        "byrne.enriched.json",
        "byrne.anonymized.json",
    ] {
        assert!(out.join(name).exists(), "missing {}", name);
    }

    let anonymized = std::fs::read_to_string(out.join("murphy.anonymized.json")).unwrap();
    assert!(!anonymized.contains("Murphy"));

    kindred_cmd(&dir)
        .arg("validate")
        .arg(out.join("murphy.anonymized.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn test_cli_enrich_keeps_same_named_files_apart() {
    let dir = TempDir::new().unwrap();
    let trees = dir.path().join("trees");
    for (sub, fixture) in [("a", "batch/murphy.json"), ("b", "batch/byrne.json")] {
        std::fs::create_dir_all(trees.join(sub)).unwrap();
        std::fs::copy(fixtures_path(fixture), trees.join(sub).join("tree.json")).unwrap();
    }
    let out = dir.path().join("out");

    kindred_cmd(&dir)
        .arg("enrich")
        .arg(&trees)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 4 file(s)"));

    let a = read_population(&out.join("a").join("tree.enriched.json")).unwrap();
    let b = read_population(&out.join("b").join("tree.enriched.json")).unwrap();
    assert_eq!(a.len(), 7);
    assert_eq!(b.len(), 2);
}

#[test]
fn test_cli_enrich_ignores_previous_outputs() {
    let dir = TempDir::new().unwrap();
    let trees = dir.path().join("trees");
    std::fs::create_dir_all(&trees).unwrap();
    std::fs::copy(fixtures_path("family.json"), trees.join("family.json")).unwrap();

    // outputs land inside the input directory, then the run is repeated
    for _ in 0..2 {
        kindred_cmd(&dir)
            .arg("enrich")
            .arg(&trees)
            .arg("--output")
            .arg(&trees)
            .arg("--anonymize")
            .assert()
            .success()
            .stdout(predicate::str::contains("Wrote 3 file(s)"))
            .stdout(predicate::str::contains("Failed to read").not());
    }

    assert!(trees.join("family.anonymized.json").exists());
    assert!(!trees.join("family.anonymized.enriched.json").exists());
    assert!(!trees.join("family.stats.stats.json").exists());
}

#[test]
fn test_cli_validate_rejects_leaky_export() {
    let dir = TempDir::new().unwrap();
    kindred_cmd(&dir)
        .arg("validate")
        .arg(fixtures_path("leaky_export.json"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("name is not anonymized"))
        .stderr(predicate::str::contains("failed validation"));
}

#[test]
fn test_cli_stats() {
    let dir = TempDir::new().unwrap();
    kindred_cmd(&dir)
        .arg("stats")
        .arg(fixtures_path("family.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"individual_count\": 7"));
}

#[test]
fn test_cli_missing_path() {
    let dir = TempDir::new().unwrap();
    kindred_cmd(&dir)
        .args(["enrich", "/nonexistent/tree.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Path not found"));
}

#[test]
fn test_cli_bad_reference_data() {
    let dir = TempDir::new().unwrap();
    kindred_cmd(&dir)
        .args(["resolve", "Cork", "--reference-data"])
        .arg(fixtures_path("bad_countries.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Reference data error"));
}
