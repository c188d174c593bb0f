// Statistical masking of quasi-identifying metadata

use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Relative noise applied to the normalized lifespan
pub const LIFESPAN_NOISE: f64 = 0.05;

/// Absolute noise applied to the birth month
pub const MONTH_NOISE: i32 = 1;

/// Metadata fields that can be marked for masking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskField {
    NormalizedLifespan,
    BirthMonth,
    IsAlive,
}

impl fmt::Display for MaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskField::NormalizedLifespan => f.write_str("normalized_lifespan"),
            MaskField::BirthMonth => f.write_str("birth_month"),
            MaskField::IsAlive => f.write_str("is_alive"),
        }
    }
}

impl FromStr for MaskField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normalized_lifespan" => Ok(MaskField::NormalizedLifespan),
            "birth_month" => Ok(MaskField::BirthMonth),
            "is_alive" => Ok(MaskField::IsAlive),
            other => Err(Error::invalid_input(format!("unknown mask field: {}", other))),
        }
    }
}

/// Perturb a [0,1] value by up to ±5% of itself, staying in [0,1]
pub fn mask_lifespan<R: Rng + ?Sized>(value: f64, rng: &mut R) -> f64 {
    let factor = rng.gen_range(-LIFESPAN_NOISE..=LIFESPAN_NOISE);
    (value * (1.0 + factor)).clamp(0.0, 1.0)
}

/// Shift a month by at most one, staying in 1..=12
pub fn mask_month<R: Rng + ?Sized>(month: u8, rng: &mut R) -> u8 {
    let shift = rng.gen_range(-MONTH_NOISE..=MONTH_NOISE);
    (i32::from(month) + shift).clamp(1, 12) as u8
}

/// Booleans are passed through unchanged even when marked
pub fn mask_flag<R: Rng + ?Sized>(value: bool, _rng: &mut R) -> bool {
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_lifespan_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for value in [0.0, 0.01, 0.5, 0.99, 1.0] {
            for _ in 0..200 {
                let masked = mask_lifespan(value, &mut rng);
                assert!((0.0..=1.0).contains(&masked));
                assert!((masked - value).abs() <= value * LIFESPAN_NOISE + 1e-12);
            }
        }
    }

    #[test]
    fn test_lifespan_varies() {
        let mut rng = StdRng::seed_from_u64(1);
        let values: Vec<f64> = (0..20).map(|_| mask_lifespan(0.5, &mut rng)).collect();
        assert!(values.iter().any(|v| (v - values[0]).abs() > 1e-9));
    }

    #[test]
    fn test_month_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        for month in 1..=12u8 {
            for _ in 0..100 {
                let masked = mask_month(month, &mut rng);
                assert!((1..=12).contains(&masked));
                assert!((i32::from(masked) - i32::from(month)).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_month_edges_clamp() {
        let mut rng = StdRng::seed_from_u64(3);
        let january: Vec<u8> = (0..100).map(|_| mask_month(1, &mut rng)).collect();
        assert!(january.iter().all(|&m| m == 1 || m == 2));
        let december: Vec<u8> = (0..100).map(|_| mask_month(12, &mut rng)).collect();
        assert!(december.iter().all(|&m| m == 11 || m == 12));
    }

    #[test]
    fn test_flag_passes_through() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!(mask_flag(true, &mut rng));
        assert!(!mask_flag(false, &mut rng));
    }

    #[test]
    fn test_seeded_masking_is_reproducible() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        assert_eq!(mask_lifespan(0.4, &mut a), mask_lifespan(0.4, &mut b));
        assert_eq!(mask_month(6, &mut a), mask_month(6, &mut b));
    }

    #[test]
    fn test_mask_field_parsing() {
        assert_eq!("birth_month".parse::<MaskField>().unwrap(), MaskField::BirthMonth);
        assert!("surname".parse::<MaskField>().is_err());
        assert_eq!(MaskField::IsAlive.to_string(), "is_alive");
    }
}
