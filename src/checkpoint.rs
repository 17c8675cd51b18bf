//! JSON snapshots of a run for disk persistence.
//!
//! `RunCheckpoint` captures what a caller needs to resume analysis of a
//! trained network: the weights, the innate trajectory and the summary.
//! Files are written atomically (temp file, then rename).

use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::{Trainer, Trajectory, TrainingSummary};
use crate::network::Weights;

/// Current checkpoint format.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Snapshot of a trainer's learned state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCheckpoint {
    /// Format version for forward compatibility.
    pub version: u32,
    pub seed: u64,
    pub weights: Weights,
    pub innate: Option<Trajectory>,
    /// Present once the run has been tested.
    pub summary: Option<TrainingSummary>,
}

impl RunCheckpoint {
    pub fn from_trainer(trainer: &Trainer) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            seed: trainer.seed(),
            weights: trainer.weights().clone(),
            innate: trainer.innate().cloned(),
            summary: trainer.summary().ok(),
        }
    }
}

/// Serialize `value` to `path` atomically.
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let tmp_path = path.with_extension("json.tmp");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&tmp_path, &json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> io::Result<T> {
    let data = std::fs::read(path)?;
    serde_json::from_slice(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TrainingParams;
    use crate::network::NetworkSpec;
    use crate::rng::RandomStream;
    use crate::trial::{StimulusSeries, TargetSeries, TrialTiming};

    fn trainer() -> Trainer {
        let spec = NetworkSpec::new(20, 0.3, 1.5, 0.25).unwrap();
        let timing = TrialTiming::new(200.0, 1.0, 1.0, 20.0, 60.0).unwrap();
        let stimulus = StimulusSeries::new(&timing, 1, 1.0, 5.0, 10.0).unwrap();
        let target = TargetSeries::new(&timing, 1, 1.0, 40.0, 10.0, 0.0).unwrap();
        let params = TrainingParams {
            n_trials_recurrent: 1,
            n_trials_readout: 1,
            n_trials_test: 1,
            ..TrainingParams::default()
        };
        Trainer::from_spec(&spec, stimulus, target, timing, params, RandomStream::new(3)).unwrap()
    }

    #[test]
    fn test_checkpoint_before_training_has_no_summary() {
        let cp = RunCheckpoint::from_trainer(&trainer());
        assert_eq!(cp.version, CHECKPOINT_VERSION);
        assert_eq!(cp.seed, 3);
        assert!(cp.innate.is_none());
        assert!(cp.summary.is_none());
    }

    #[test]
    fn test_disk_persistence() {
        let mut trainer = trainer();
        trainer.run().unwrap();
        let cp = RunCheckpoint::from_trainer(&trainer);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("run.json");
        save_json(&cp, &path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded: RunCheckpoint = load_json(&path).unwrap();
        assert_eq!(loaded.weights, cp.weights);
        assert_eq!(loaded.innate, cp.innate);
        assert_eq!(
            loaded.summary.map(|s| s.weights_version),
            Some(trainer.weights().version())
        );
    }

    #[test]
    fn test_load_rejects_corrupt_weights() {
        let cp = RunCheckpoint::from_trainer(&trainer());
        let mut json = serde_json::to_value(&cp).unwrap();
        json["weights"]["w_rec"]["col_index"][0] = serde_json::json!(9999);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.json");
        std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

        let err = load_json::<RunCheckpoint>(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("column index 9999"), "{err}");
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"not json").unwrap();
        let err = load_json::<RunCheckpoint>(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
