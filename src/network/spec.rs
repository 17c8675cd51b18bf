//! Size, density and strength of a randomly-connected recurrent network.

use serde::Serialize;

use crate::error::ConfigError;

/// Immutable description of a random recurrent network.
///
/// The per-synapse standard deviation `scale_recurr` is chosen so the
/// aggregate recurrent drive onto a unit does not depend on network size or
/// connection density.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSpec {
    n_units: usize,
    p_connect: f64,
    syn_strength: f64,
    p_plastic: f64,
    n_plastic: usize,
    scale_recurr: f64,
}

impl NetworkSpec {
    pub fn new(
        n_units: usize,
        p_connect: f64,
        syn_strength: f64,
        p_plastic: f64,
    ) -> Result<Self, ConfigError> {
        if n_units == 0 {
            return Err(ConfigError::NonPositive {
                name: "n_units",
                value: 0.0,
            });
        }
        if !(p_connect > 0.0 && p_connect <= 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "p_connect",
                value: p_connect,
                range: "(0, 1]",
            });
        }
        if !(syn_strength.is_finite() && syn_strength > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "syn_strength",
                value: syn_strength,
            });
        }
        if !(0.0..=1.0).contains(&p_plastic) {
            return Err(ConfigError::OutOfRange {
                name: "p_plastic",
                value: p_plastic,
                range: "[0, 1]",
            });
        }

        let n = n_units as f64;
        let scale_recurr = syn_strength / (p_connect * n).sqrt();
        if !(scale_recurr.is_finite() && scale_recurr > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "scale_recurr",
                value: scale_recurr,
            });
        }

        Ok(Self {
            n_units,
            p_connect,
            syn_strength,
            p_plastic,
            n_plastic: (n * p_plastic).round_ties_even() as usize,
            scale_recurr,
        })
    }

    pub fn n_units(&self) -> usize {
        self.n_units
    }

    pub fn p_connect(&self) -> f64 {
        self.p_connect
    }

    pub fn syn_strength(&self) -> f64 {
        self.syn_strength
    }

    pub fn p_plastic(&self) -> f64 {
        self.p_plastic
    }

    /// Number of units whose incoming weights are trainable.
    pub fn n_plastic(&self) -> usize {
        self.n_plastic
    }

    /// Standard deviation of a single recurrent synapse.
    pub fn scale_recurr(&self) -> f64 {
        self.scale_recurr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n_plastic_rounds() {
        let spec = NetworkSpec::new(100, 0.1, 1.0, 0.2).unwrap();
        assert_eq!(spec.n_plastic(), 20);

        let spec = NetworkSpec::new(50, 0.2, 1.5, 0.3).unwrap();
        assert_eq!(spec.n_plastic(), 15);
    }

    #[test]
    fn test_n_plastic_ties_round_to_even() {
        // 10 * 0.25 = 2.5 and 30 * 0.25 = 7.5
        assert_eq!(NetworkSpec::new(10, 0.5, 1.0, 0.25).unwrap().n_plastic(), 2);
        assert_eq!(NetworkSpec::new(30, 0.5, 1.0, 0.25).unwrap().n_plastic(), 8);
    }

    #[test]
    fn test_scale_recurr() {
        let spec = NetworkSpec::new(100, 0.1, 1.0, 0.2).unwrap();
        assert!((spec.scale_recurr() - 1.0 / 10.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(NetworkSpec::new(0, 0.1, 1.0, 0.2).is_err());
        assert!(NetworkSpec::new(10, 0.0, 1.0, 0.2).is_err());
        assert!(NetworkSpec::new(10, 1.5, 1.0, 0.2).is_err());
        assert!(NetworkSpec::new(10, f64::NAN, 1.0, 0.2).is_err());
        assert!(NetworkSpec::new(10, 0.5, 0.0, 0.2).is_err());
        assert!(NetworkSpec::new(10, 0.5, f64::INFINITY, 0.2).is_err());
        assert!(NetworkSpec::new(10, 0.5, 1.0, -0.1).is_err());
        assert!(NetworkSpec::new(10, 0.5, 1.0, 1.1).is_err());
    }

    #[test]
    fn test_full_density_and_all_plastic_allowed() {
        let spec = NetworkSpec::new(10, 1.0, 1.0, 1.0).unwrap();
        assert_eq!(spec.n_plastic(), 10);
    }
}
