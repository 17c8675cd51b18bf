//! Config validation: unknown-key detection with Levenshtein suggestions
//! and dynamical range checks.
//!
//! Two-pass parse: the raw TOML is first read as a `toml::Value`, its key
//! tree walked and compared against the known field names, and every
//! stranger reported with a "did you mean" suggestion. Serde
//! deserialization runs afterwards. Warnings never reject a config.

use std::collections::HashSet;
use std::fmt;

use super::ExperimentConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of `ExperimentConfig`.
///
/// Kept by hand in step with the section structs in `experiment.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        "network",
        "network.n_units",
        "network.p_connect",
        "network.syn_strength",
        "network.p_plastic",
        "trial",
        "trial.length_ms",
        "trial.spacing",
        "trial.time_step_ms",
        "trial.start_train_ms",
        "trial.end_train_ms",
        "stimulus",
        "stimulus.n_units",
        "stimulus.value",
        "stimulus.start_ms",
        "stimulus.duration_ms",
        "target",
        "target.n_units",
        "target.value",
        "target.center_ms",
        "target.width_ms",
        "target.baseline_val",
        "training",
        "training.seed",
        "training.tau_ms",
        "training.activation",
        "training.noise_harvest",
        "training.noise_train",
        "training.n_trials_recurrent",
        "training.n_trials_readout",
        "training.n_trials_test",
        "rls",
        "rls.alpha",
        "rls.readout_alpha",
        "rls.update_every",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Collect all dotted key paths of a TOML table, depth first.
///
/// `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Suggestions
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest known key within edit distance 3, ties broken alphabetically.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|&(dist, _)| dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

/// Warnings for every key in `raw_toml` that no config field reads.
///
/// Unparseable input yields no warnings; serde reports it afterwards.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Dynamical Range Checks
// ============================================================================

/// Values that construct fine but make for a doubtful experiment.
pub fn validate_ranges(config: &ExperimentConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut warn = |field: &str, message: String| {
        warnings.push(ValidationWarning {
            field: field.to_string(),
            message,
            suggestion: None,
        });
    };

    let time_div = config.training.tau_ms / config.trial.time_step_ms;
    if time_div < 1.0 {
        warn(
            "training.tau_ms",
            format!(
                "tau_ms / time_step_ms = {time_div:.3} is below 1; Euler integration will overshoot"
            ),
        );
    }

    if config.network.syn_strength < 1.0 {
        warn(
            "network.syn_strength",
            format!(
                "syn_strength = {:.2} is below 1; activity decays instead of forming a rich innate trajectory",
                config.network.syn_strength
            ),
        );
    }

    let n_plastic = (config.network.n_units as f64 * config.network.p_plastic).round();
    if n_plastic < 1.0 && config.training.n_trials_recurrent > 0 {
        warn(
            "network.p_plastic",
            "no plastic units; recurrent training trials will not change any weight".to_string(),
        );
    }

    if config.training.n_trials_test == 0 {
        warn(
            "training.n_trials_test",
            "n_trials_test = 0; the run will report no test error".to_string(),
        );
    }

    let max_ms = config.trial.end_train_ms + crate::trial::EXTRA_END_MS;
    let stim_end = config.stimulus.start_ms + config.stimulus.duration_ms;
    if stim_end > config.trial.start_train_ms {
        warn(
            "stimulus.duration_ms",
            format!(
                "stimulus ends at {stim_end:.1} ms, after training starts at {:.1} ms",
                config.trial.start_train_ms
            ),
        );
    }
    if config.target.center_ms < config.trial.start_train_ms
        || config.target.center_ms > config.trial.end_train_ms.min(max_ms)
    {
        warn(
            "target.center_ms",
            format!(
                "target peak at {:.1} ms lies outside the readout window [{:.1}, {:.1}) ms",
                config.target.center_ms, config.trial.start_train_ms, config.trial.end_train_ms
            ),
        );
    }

    warnings
}
