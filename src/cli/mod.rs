//! CLI module for Kindred

mod args;

pub use args::{Args, Command};

use crate::analysis::{BatchResult, Enricher, PopulationMetrics};
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::error::{Error, Result};
use crate::geo::CountryResolver;
use crate::output::{output_stem, to_json, JsonWriter, OutputConfig, OutputReport};
use crate::privacy::{validate, validate_export, Anonymizer};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Run the CLI application
pub fn run() -> ExitCode {
    let args = Args::parse_args();

    match execute(args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(args: Args) -> Result<()> {
    match args.command {
        Command::Enrich {
            path,
            output,
            config,
            reference_data,
            anonymize,
            strategy,
            seed,
            compact,
            no_resolve,
            verbose,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            cfg.merge_cli(output, reference_data, strategy, seed, compact, no_resolve);
            init_logging(verbose, &cfg);

            if !path.exists() {
                return Err(Error::PathNotFound(path));
            }

            let enricher = Enricher::new(cfg.clone())?.with_verbose(verbose);
            println!("Enriching {}...", path.display());
            let batch = enricher.enrich_path(&path)?;
            print_errors(&batch);

            let writer = JsonWriter::new(OutputConfig {
                output_dir: cfg.output.directory.clone(),
                pretty: cfg.output.pretty,
            })?;

            let mut totals = OutputReport::default();
            for (file, result) in &batch.files {
                let stem = output_stem(&path, file);
                let mut report = writer.write_enriched(&stem, result)?;

                if anonymize {
                    let export = Anonymizer::from_config(&cfg.anonymize).anonymize(&result.population);
                    let validation = validate(&export)?;
                    if !validation.is_valid() {
                        for issue in &validation.issues {
                            warn!(%issue, file = %file.display(), "Anonymized export failed validation");
                        }
                        return Err(Error::other(format!(
                            "anonymized export for {} failed validation",
                            file.display()
                        )));
                    }
                    writer.write_anonymized(&stem, &export, &mut report)?;
                }

                let structural = &result.metrics.structural;
                println!(
                    "{}: {} individuals, {} families, {:.1}% places resolved, {} warning(s)",
                    file.display(),
                    structural.individual_count,
                    structural.family_count,
                    result.resolution.resolution_rate() * 100.0,
                    result.warnings.len()
                );

                totals.bytes_written += report.bytes_written;
                totals.files.extend(report.files);
            }

            if batch.files.is_empty() {
                return Err(Error::other("No population files could be processed"));
            }

            if batch.files.len() > 1 {
                let resolution = batch.resolution();
                println!(
                    "Total: {:.1}% of {} place lookup(s) resolved",
                    resolution.resolution_rate() * 100.0,
                    resolution.total_lookups
                );
            }
            println!("{}", totals.summary());
            println!("Output written to: {}", writer.output_dir().display());
            Ok(())
        }

        Command::Resolve {
            place,
            year,
            config,
            reference_data,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            cfg.merge_cli(None, reference_data, None, None, false, false);
            init_logging(false, &cfg);

            let resolver = match &cfg.geo.reference_data {
                Some(path) => CountryResolver::from_path(path)?,
                None => CountryResolver::builtin()?,
            };
            let result = resolver.resolve(&place, year);
            println!("{}", to_json(&result, true)?);
            Ok(())
        }

        Command::Validate { path } => {
            init_logging(false, &Config::default());

            let export = read_json(&path)?;
            let report = validate_export(&export);

            if report.is_valid() {
                println!(
                    "{}: OK ({} individuals, {} families checked)",
                    path.display(),
                    report.individuals_checked,
                    report.families_checked
                );
                return Ok(());
            }

            println!("{}: {} issue(s)", path.display(), report.issues.len());
            for issue in &report.issues {
                println!("  {}", issue);
            }
            Err(Error::other(format!(
                "{} failed validation with {} issue(s)",
                path.display(),
                report.issues.len()
            )))
        }

        Command::Stats {
            path,
            config,
            reference_data,
            verbose,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            cfg.merge_cli(None, reference_data, None, None, false, false);
            init_logging(verbose, &cfg);

            let enricher = Enricher::new(cfg.clone())?.with_verbose(verbose);
            let batch = enricher.enrich_path(&path)?;
            print_errors(&batch);

            let metrics: BTreeMap<String, &PopulationMetrics> = batch
                .files
                .iter()
                .map(|(file, result)| (file.display().to_string(), &result.metrics))
                .collect();
            println!("{}", to_json(&metrics, cfg.output.pretty)?);

            if batch.files.is_empty() {
                return Err(Error::other("No population files could be processed"));
            }
            Ok(())
        }

        Command::Version => {
            println!("kindred {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// An explicit config path must exist; the default one is optional
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::PathNotFound(path.to_path_buf()));
            }
            Config::load(path)
        }
        None => Config::load_or_default(Path::new(DEFAULT_CONFIG_FILE)),
    }
}

/// Install the global subscriber, logging to stderr.
///
/// RUST_LOG wins, then `--verbose`, then the config filter.
fn init_logging(verbose: bool, config: &Config) {
    let fallback = if verbose {
        "kindred=debug".to_string()
    } else {
        config
            .logging
            .filter
            .clone()
            .unwrap_or_else(|| "kindred=info".to_string())
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // a second init (e.g. from tests) is harmless
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    if !path.exists() {
        return Err(Error::PathNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn print_errors(batch: &BatchResult) {
    if batch.errors.is_empty() {
        return;
    }

    println!("\nFailed to read {} file(s):", batch.errors.len());
    for (path, err) in batch.errors.iter().take(5) {
        println!("  {}: {}", path.display(), err);
    }
    if batch.errors.len() > 5 {
        println!("  ... and {} more", batch.errors.len() - 5);
    }
    info!(failed = batch.errors.len(), "Some population files were skipped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::read_population;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_explicit_missing() {
        let result = load_config(Some(Path::new("/nonexistent/kindred.toml")));
        assert!(matches!(result, Err(Error::PathNotFound(_))));
    }

    #[test]
    fn test_load_config_explicit() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[output]\npretty = false").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert!(!config.output.pretty);
    }

    #[test]
    fn test_read_json_missing() {
        let result = read_json(Path::new("/nonexistent/export.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_read_population_via_cli_helpers() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"individuals": [{{"id": "A", "name": "Ann"}}], "families": []}}"#).unwrap();
        let population = read_population(file.path()).unwrap();
        assert_eq!(population.len(), 1);
    }
}
