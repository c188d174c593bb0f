use crate::error::{Error, Result};
use crate::privacy::{MaskField, NamingStrategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "kindred.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub geo: GeoConfig,
    pub enrich: EnrichConfig,
    pub anonymize: AnonymizeConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Place resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Country reference table; the built-in table when unset
    pub reference_data: Option<PathBuf>,
    pub resolve_places: bool,
}

/// Enrichment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Year used for "is alive" checks; the current year when unset
    pub reference_year: Option<i32>,
    /// Anyone born longer ago than this without a death is presumed dead
    pub living_threshold_years: u32,
    /// Lifespan that maps to 1.0 in `normalized_lifespan`
    pub max_lifespan_years: u32,
}

/// Anonymization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnonymizeConfig {
    pub strategy: NamingStrategy,
    /// Fixed masking seed; fresh entropy when unset
    pub seed: Option<u64>,
    pub mask_fields: Vec<MaskField>,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub pretty: bool,
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing-subscriber filter directive, e.g. "kindred=debug"
    pub filter: Option<String>,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            reference_data: None,
            resolve_places: true,
        }
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            reference_year: None,
            living_threshold_years: 110,
            max_lifespan_years: 120,
        }
    }
}

impl Default for AnonymizeConfig {
    fn default() -> Self {
        Self {
            strategy: NamingStrategy::default(),
            seed: None,
            mask_fields: vec![MaskField::NormalizedLifespan, MaskField::BirthMonth],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            directory: PathBuf::from("./kindred-out"),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Merge CLI arguments into config (CLI takes precedence)
    pub fn merge_cli(
        &mut self,
        output: Option<PathBuf>,
        reference_data: Option<PathBuf>,
        strategy: Option<NamingStrategy>,
        seed: Option<u64>,
        compact: bool,
        no_resolve: bool,
    ) {
        if let Some(out) = output {
            self.output.directory = out;
        }

        if let Some(data) = reference_data {
            self.geo.reference_data = Some(data);
        }

        if let Some(strategy) = strategy {
            self.anonymize.strategy = strategy;
        }

        if seed.is_some() {
            self.anonymize.seed = seed;
        }

        if compact {
            self.output.pretty = false;
        }

        if no_resolve {
            self.geo.resolve_places = false;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.enrich.living_threshold_years == 0 {
            return Err(Error::config_validation(
                "living_threshold_years must be at least 1",
            ));
        }

        if self.enrich.max_lifespan_years == 0 {
            return Err(Error::config_validation("max_lifespan_years must be at least 1"));
        }

        if let Some(year) = self.enrich.reference_year {
            if !(1..=9999).contains(&year) {
                return Err(Error::config_validation(format!(
                    "reference_year {} is outside 1..=9999",
                    year
                )));
            }
        }

        Ok(())
    }
}
