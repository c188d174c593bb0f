//! CLI argument parsing

use crate::privacy::NamingStrategy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Enrich and anonymize genealogical populations
#[derive(Parser, Debug)]
#[command(name = "kindred")]
#[command(about = "Enrich and anonymize genealogical populations")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enrich a population file, or every .json file under a directory
    Enrich {
        /// Population file or directory
        path: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Country reference data (JSON)
        #[arg(long)]
        reference_data: Option<PathBuf>,

        /// Also write an anonymized export
        #[arg(long)]
        anonymize: bool,

        /// Anonymous naming strategy (id, generation)
        #[arg(long)]
        strategy: Option<NamingStrategy>,

        /// Seed for masking noise
        #[arg(long)]
        seed: Option<u64>,

        /// Write compact JSON
        #[arg(long)]
        compact: bool,

        /// Skip place resolution
        #[arg(long)]
        no_resolve: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Resolve a single place to a country
    Resolve {
        /// Free-text place
        place: String,

        /// Year of the event, enables historical names
        #[arg(short, long)]
        year: Option<i32>,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Country reference data (JSON)
        #[arg(long)]
        reference_data: Option<PathBuf>,
    },

    /// Check an anonymized export for leftover personal data
    Validate {
        /// Anonymized export file
        path: PathBuf,
    },

    /// Print population metrics without writing files
    Stats {
        /// Population file or directory
        path: PathBuf,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Country reference data (JSON)
        #[arg(long)]
        reference_data: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show version information
    Version,
}
