//! Simulation and training engine.
//!
//! ## Layout
//!
//! - `activation`: unit sigmoid
//! - `integrator`: Euler stepping of one trial
//! - `harvest`: the innate trajectory under initial weights
//! - `plasticity`: recurrent update rules (RLS by default)
//! - `readout`: RLS fit of the linear readout
//! - `trainer`: stage machine tying the above together

pub mod activation;
pub mod harvest;
pub mod integrator;
pub mod plasticity;
pub mod readout;
pub mod trainer;

pub use activation::{sigmoid, Activation};
pub use harvest::harvest_innate;
pub use integrator::{Integrator, Trajectory, TrialDraw, TrialId, TrialState};
pub use plasticity::{PlasticStep, RecurrentRule, RlsRule};
pub use readout::ReadoutRls;
pub use trainer::{
    TestReport, Trainer, TrainingParams, TrainingStage, TrainingSummary, TrialReport,
};
