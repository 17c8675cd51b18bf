//! Squashing functions mapping activation level to firing rate.

use serde::{Deserialize, Serialize};

/// Logistic sigmoid.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Monotonic squashing function applied elementwise to `x_lvl`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// `tanh(x)`, rates in (-1, 1).
    #[default]
    Tanh,
    /// `1 / (1 + e^-x)`, rates in (0, 1).
    Logistic,
    /// Caller-supplied function. Not representable in config files.
    #[serde(skip)]
    Custom(fn(f64) -> f64),
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Tanh => x.tanh(),
            Self::Logistic => sigmoid(x),
            Self::Custom(f) => f(x),
        }
    }

    /// Closed output range, when known.
    pub fn output_range(self) -> Option<(f64, f64)> {
        match self {
            Self::Tanh => Some((-1.0, 1.0)),
            Self::Logistic => Some((0.0, 1.0)),
            Self::Custom(_) => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tanh => "tanh",
            Self::Logistic => "logistic",
            Self::Custom(_) => "custom",
        }
    }
}
