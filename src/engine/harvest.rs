//! Harvesting the innate trajectory.

use tracing::{debug, info};

use crate::engine::integrator::{Integrator, Trajectory, TrialId};
use crate::error::{Phase, SimulationError};
use crate::network::Weights;
use crate::rng::RandomStream;
use crate::trial::{StimulusSeries, TrialTiming};

/// Run one trial under the initial weights and return its firing rates.
///
/// Draws one noise realization (scaled by `noise_scale`) and one initial
/// condition from `rng`. Nothing but the stream state changes.
pub fn harvest_innate(
    integrator: &Integrator,
    weights: &Weights,
    stimulus: &StimulusSeries,
    timing: &TrialTiming,
    noise_scale: f64,
    rng: &mut RandomStream,
) -> Result<Trajectory, SimulationError> {
    Integrator::check_stimulus(weights, stimulus.series().view(), timing)?;

    let draw = integrator.draw_trial(rng, weights.n_units(), timing, noise_scale);
    let id = TrialId {
        phase: Phase::Harvest,
        trial: 0,
    };
    let innate = integrator.record(weights, stimulus.series().view(), draw, id)?;

    debug!(
        n_units = innate.nrows(),
        n_steps = innate.ncols(),
        mean_rate = innate.mean().unwrap_or(0.0),
        "Harvested innate trajectory"
    );
    info!(seed = rng.seed(), "Innate trajectory harvested");
    Ok(innate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::activation::Activation;
    use crate::network::{initialize_weights, NetworkSpec};

    fn harvest(seed: u64) -> Trajectory {
        let mut rng = RandomStream::new(seed);
        let spec = NetworkSpec::new(30, 0.2, 1.5, 0.3).unwrap();
        let weights = initialize_weights(&spec, 1, 1, &mut rng);
        let timing = TrialTiming::new(300.0, 1.0, 1.0, 20.0, 100.0).unwrap();
        let stimulus = StimulusSeries::new(&timing, 1, 1.0, 10.0, 20.0).unwrap();
        let integrator = Integrator::new(10.0, &timing, Activation::Tanh).unwrap();
        harvest_innate(&integrator, &weights, &stimulus, &timing, 0.001, &mut rng).unwrap()
    }

    #[test]
    fn test_same_seed_identical() {
        assert_eq!(harvest(1234), harvest(1234));
    }

    #[test]
    fn test_different_seed_differs() {
        assert_ne!(harvest(1234), harvest(4321));
    }

    #[test]
    fn test_shape() {
        assert_eq!(harvest(1).dim(), (30, 300));
    }

    #[test]
    fn test_weights_untouched() {
        let mut rng = RandomStream::new(8);
        let spec = NetworkSpec::new(20, 0.3, 1.5, 0.3).unwrap();
        let weights = initialize_weights(&spec, 1, 1, &mut rng);
        let before = weights.clone();
        let timing = TrialTiming::new(300.0, 1.0, 1.0, 20.0, 100.0).unwrap();
        let stimulus = StimulusSeries::new(&timing, 1, 1.0, 10.0, 20.0).unwrap();
        let integrator = Integrator::new(10.0, &timing, Activation::Tanh).unwrap();
        harvest_innate(&integrator, &weights, &stimulus, &timing, 0.001, &mut rng).unwrap();
        assert_eq!(weights, before);
    }
}
