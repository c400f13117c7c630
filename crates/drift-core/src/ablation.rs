//! Mechanism ablation: run one evaluation body per configuration variant and
//! compare every outcome against a named baseline.
//!
//! The harness knows nothing about mechanisms. The body decides what a
//! variant means (an evolution run, a privacy score) and returns one scalar.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::MechanismConfig;
use crate::error::{CoreError, Result};
use crate::privacy::{PrivacyMode, evaluate_epsilon};
use crate::vector::StateVector;

pub const BASELINE: &str = "baseline";
pub const DRIFT_ONLY: &str = "drift_only";
pub const ADAPTIVE_ONLY: &str = "adaptive_only";
pub const DECAY_ONLY: &str = "decay_only";
pub const ALL_ON: &str = "all_on";

pub const NO_PRIVACY: &str = "no_privacy";
pub const QUANTUM_AWARE: &str = "quantum_aware";
pub const CLASSICAL: &str = "classical";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AblationOutcome {
    pub outcome: f64,
    /// `baseline − outcome`; positive when a lower-is-better metric improved.
    pub delta_vs_baseline: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AblationReport {
    pub baseline: String,
    pub outcomes: BTreeMap<String, AblationOutcome>,
}

/// How a combined variant compares with its parts run alone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SynergyAnalysis {
    pub combined: String,
    pub combined_improvement: f64,
    pub individual_improvements: BTreeMap<String, f64>,
    pub sum_of_individuals: f64,
    pub best_individual: String,
    pub best_individual_improvement: f64,
    /// `combined_improvement − sum_of_individuals`.
    pub synergistic_effect: f64,
    /// `combined_improvement − best_individual_improvement`.
    pub combination_vs_best: f64,
}

impl SynergyAnalysis {
    pub fn is_synergistic(&self) -> bool {
        self.synergistic_effect > 0.0
    }

    pub fn beats_best_single(&self) -> bool {
        self.combination_vs_best > 0.0
    }
}

impl AblationReport {
    pub fn get(&self, name: &str) -> Option<&AblationOutcome> {
        self.outcomes.get(name)
    }

    pub fn baseline_outcome(&self) -> f64 {
        self.outcomes.get(&self.baseline).map_or(0.0, |o| o.outcome)
    }

    fn delta(&self, name: &str) -> Result<f64> {
        self.outcomes
            .get(name)
            .map(|o| o.delta_vs_baseline)
            .ok_or_else(|| CoreError::InvalidConfig(format!("unknown ablation variant: {name}")))
    }

    /// Compare `combined` with the variants in `singles`.
    pub fn synergy(&self, singles: &[&str], combined: &str) -> Result<SynergyAnalysis> {
        if singles.is_empty() {
            return Err(CoreError::InvalidConfig(
                "synergy needs at least one single-mechanism variant".to_string(),
            ));
        }
        let combined_improvement = self.delta(combined)?;

        let mut individual_improvements = BTreeMap::new();
        let mut best: Option<(&str, f64)> = None;
        for &name in singles {
            let d = self.delta(name)?;
            individual_improvements.insert(name.to_string(), d);
            if best.is_none_or(|(_, b)| d > b) {
                best = Some((name, d));
            }
        }
        let sum_of_individuals: f64 = individual_improvements.values().sum();
        let (best_name, best_improvement) = best.unwrap_or((singles[0], 0.0));

        Ok(SynergyAnalysis {
            combined: combined.to_string(),
            combined_improvement,
            individual_improvements,
            sum_of_individuals,
            best_individual: best_name.to_string(),
            best_individual_improvement: best_improvement,
            synergistic_effect: combined_improvement - sum_of_individuals,
            combination_vs_best: combined_improvement - best_improvement,
        })
    }
}

/// Evaluate every variant with `body` and report outcome and delta against
/// the variant named `baseline`.
///
/// Variants are evaluated in the given order; the first body error aborts
/// the ablation. Names must be unique and include `baseline`.
pub fn run_ablation<C, F>(
    variants: &[(String, C)],
    baseline: &str,
    mut body: F,
) -> Result<AblationReport>
where
    F: FnMut(&C) -> Result<f64>,
{
    let mut seen = HashSet::new();
    for (name, _) in variants {
        if !seen.insert(name.as_str()) {
            return Err(CoreError::InvalidConfig(format!(
                "duplicate ablation variant: {name}"
            )));
        }
    }
    if !seen.contains(baseline) {
        return Err(CoreError::MissingBaseline(baseline.to_string()));
    }

    let mut raw = Vec::with_capacity(variants.len());
    for (name, config) in variants {
        let outcome = body(config)?;
        tracing::info!(variant = %name, outcome, "ablation variant evaluated");
        raw.push((name.clone(), outcome));
    }

    let base = raw
        .iter()
        .find(|(name, _)| name == baseline)
        .map_or(0.0, |(_, o)| *o);
    let outcomes = raw
        .into_iter()
        .map(|(name, outcome)| {
            (
                name,
                AblationOutcome {
                    outcome,
                    delta_vs_baseline: base - outcome,
                },
            )
        })
        .collect();

    Ok(AblationReport {
        baseline: baseline.to_string(),
        outcomes,
    })
}

/// The standard variant set: everything off, each mechanism alone, and all
/// three together.
pub fn mechanism_variants(drift_limit: f64) -> Vec<(String, MechanismConfig)> {
    let base = MechanismConfig::baseline();
    vec![
        (BASELINE.to_string(), base.clone()),
        (
            DRIFT_ONLY.to_string(),
            base.clone().with_drift_limit(Some(drift_limit)),
        ),
        (
            ADAPTIVE_ONLY.to_string(),
            base.clone().with_adaptive_influence(true),
        ),
        (DECAY_ONLY.to_string(), base.clone().with_time_decay(true)),
        (
            ALL_ON.to_string(),
            MechanismConfig::all_on().with_drift_limit(Some(drift_limit)),
        ),
    ]
}

/// Names of the single-mechanism variants in [`mechanism_variants`].
pub fn single_mechanism_names() -> [&'static str; 3] {
    [DRIFT_ONLY, ADAPTIVE_ONLY, DECAY_ONLY]
}

/// Privacy variants: raw vectors as the baseline, then each anonymization
/// mode. `None` means no noise at all.
pub fn privacy_variants() -> Vec<(String, Option<PrivacyMode>)> {
    vec![
        (NO_PRIVACY.to_string(), None),
        (QUANTUM_AWARE.to_string(), Some(PrivacyMode::QuantumAware)),
        (CLASSICAL.to_string(), Some(PrivacyMode::Classical)),
    ]
}

/// Mean compatibility loss of one privacy variant over `pairs` at `epsilon`.
/// Zero for the no-noise variant, whose vectors are scored as they are.
pub fn privacy_loss(
    vectors: &[StateVector],
    pairs: &[(usize, usize)],
    epsilon: f64,
    mode: Option<PrivacyMode>,
    rng: &mut impl Rng,
) -> Result<f64> {
    match mode {
        Some(mode) => Ok(evaluate_epsilon(vectors, pairs, epsilon, mode, rng)?.mean_loss),
        None => Ok(0.0),
    }
}
