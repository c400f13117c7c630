//! Laplace-mechanism anonymization of state vectors.
//!
//! Noise of scale `SENSITIVITY / ε` is added per dimension, the result is
//! clipped into `[0, 1]` and, in the default quantum-aware mode, renormalized
//! so that the output is again a unit state vector. The classical mode skips
//! the renormalization and exists as the naive baseline.
//!
//! Accuracy is judged against the compatibility scalar: the loss for a pair is
//! how far its compatibility moves once both sides are anonymized.

use rand::Rng;
use rand_distr::Exp1;
use serde::{Deserialize, Serialize};

use crate::constants::SENSITIVITY;
use crate::error::{CoreError, Result};
use crate::vector::StateVector;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyMode {
    /// Noise, clip, renormalize.
    #[default]
    QuantumAware,
    /// Noise and clip only.
    Classical,
}

/// Outcome of scoring one privacy budget over a pair set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrivacyScore {
    pub epsilon: f64,
    pub mean_loss: f64,
    pub std_loss: f64,
    /// `1 − mean_loss`.
    pub preservation: f64,
    /// Mean L2 distance between an original vector and its anonymized form.
    pub mean_perturbation: f64,
}

fn check_epsilon(epsilon: f64) -> Result<()> {
    if epsilon.is_finite() && epsilon > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidEpsilon(epsilon))
    }
}

/// One Laplace(0, `scale`) draw, as the difference of two unit exponentials.
pub fn laplace(scale: f64, rng: &mut impl Rng) -> f64 {
    let a: f64 = rng.sample(Exp1);
    let b: f64 = rng.sample(Exp1);
    scale * (a - b)
}

/// Anonymize `v` under budget `epsilon`, choosing whether to renormalize.
///
/// If every component clips to zero the quantum-aware result falls back to
/// the normalized original, so the output is always a unit vector when `v`
/// is non-zero.
pub fn anonymize_with(
    v: &StateVector,
    epsilon: f64,
    mode: PrivacyMode,
    rng: &mut impl Rng,
) -> Result<StateVector> {
    check_epsilon(epsilon)?;
    let scale = SENSITIVITY / epsilon;

    let mut c = v.to_array();
    for x in &mut c {
        *x += laplace(scale, rng);
    }
    let noisy = StateVector::new(c).clip01();

    match mode {
        PrivacyMode::Classical => Ok(noisy),
        PrivacyMode::QuantumAware => {
            if noisy.norm() == 0.0 {
                Ok(v.normalize())
            } else {
                Ok(noisy.normalize())
            }
        }
    }
}

/// Quantum-aware anonymization.
pub fn anonymize(v: &StateVector, epsilon: f64, rng: &mut impl Rng) -> Result<StateVector> {
    anonymize_with(v, epsilon, PrivacyMode::QuantumAware, rng)
}

/// `|C(a,b) − C(anon(a), anon(b))|`, clamped into `[0, 1]`.
pub fn accuracy_loss(
    a: &StateVector,
    b: &StateVector,
    epsilon: f64,
    rng: &mut impl Rng,
) -> Result<f64> {
    accuracy_loss_with(a, b, epsilon, PrivacyMode::QuantumAware, rng)
}

pub fn accuracy_loss_with(
    a: &StateVector,
    b: &StateVector,
    epsilon: f64,
    mode: PrivacyMode,
    rng: &mut impl Rng,
) -> Result<f64> {
    let anon_a = anonymize_with(a, epsilon, mode, rng)?;
    let anon_b = anonymize_with(b, epsilon, mode, rng)?;
    Ok(pair_loss(a, b, &anon_a, &anon_b))
}

/// L2 distance moved by anonymization.
pub fn perturbation(original: &StateVector, anonymized: &StateVector) -> f64 {
    original.distance(anonymized)
}

/// `count` index pairs over `0..n`, each pair of two distinct indices.
/// Empty when `n < 2`.
pub fn sample_pairs(n: usize, count: usize, rng: &mut impl Rng) -> Vec<(usize, usize)> {
    if n < 2 {
        return Vec::new();
    }
    (0..count)
        .map(|_| {
            let a = rng.random_range(0..n);
            let mut b = rng.random_range(0..n - 1);
            if b >= a {
                b += 1;
            }
            (a, b)
        })
        .collect()
}

/// Score `epsilon` over the given pairs: mean/std accuracy loss and mean
/// perturbation of every anonymized vector.
pub fn evaluate_epsilon(
    vectors: &[StateVector],
    pairs: &[(usize, usize)],
    epsilon: f64,
    mode: PrivacyMode,
    rng: &mut impl Rng,
) -> Result<PrivacyScore> {
    check_epsilon(epsilon)?;
    check_pairs(vectors.len(), pairs)?;
    let mut losses = Vec::with_capacity(pairs.len());
    let mut perturb_total = 0.0;

    for &(i, j) in pairs {
        let (a, b) = (&vectors[i], &vectors[j]);
        let anon_a = anonymize_with(a, epsilon, mode, rng)?;
        let anon_b = anonymize_with(b, epsilon, mode, rng)?;
        losses.push(pair_loss(a, b, &anon_a, &anon_b));
        perturb_total += perturbation(a, &anon_a) + perturbation(b, &anon_b);
    }

    let (mean_loss, std_loss) = mean_std(&losses);
    let mean_perturbation = if pairs.is_empty() {
        0.0
    } else {
        perturb_total / (2 * pairs.len()) as f64
    };

    Ok(PrivacyScore {
        epsilon,
        mean_loss,
        std_loss,
        preservation: 1.0 - mean_loss,
        mean_perturbation,
    })
}

/// Strongest privacy meeting an accuracy floor: among `candidates`, the
/// smallest epsilon whose preservation is at least `accuracy_floor`.
/// Every candidate is scored; `None` if none qualifies.
pub fn select_epsilon(
    vectors: &[StateVector],
    pairs: &[(usize, usize)],
    candidates: &[f64],
    accuracy_floor: f64,
    mode: PrivacyMode,
    rng: &mut impl Rng,
) -> Result<Option<PrivacyScore>> {
    let mut scores = Vec::with_capacity(candidates.len());
    for &epsilon in candidates {
        let score = evaluate_epsilon(vectors, pairs, epsilon, mode, rng)?;
        tracing::debug!(
            epsilon,
            mean_loss = score.mean_loss,
            preservation = score.preservation,
            "scored privacy budget"
        );
        scores.push(score);
    }
    Ok(strongest_passing(&scores, accuracy_floor))
}

/// Smallest-epsilon score with preservation at least `accuracy_floor`,
/// picked from scores already computed.
pub fn strongest_passing(scores: &[PrivacyScore], accuracy_floor: f64) -> Option<PrivacyScore> {
    scores
        .iter()
        .filter(|s| s.preservation >= accuracy_floor)
        .min_by(|a, b| a.epsilon.total_cmp(&b.epsilon))
        .copied()
}

fn check_pairs(len: usize, pairs: &[(usize, usize)]) -> Result<()> {
    match pairs.iter().find(|&&(i, j)| i >= len || j >= len) {
        Some(&pair) => Err(CoreError::PairOutOfRange { pair, len }),
        None => Ok(()),
    }
}

fn pair_loss(a: &StateVector, b: &StateVector, anon_a: &StateVector, anon_b: &StateVector) -> f64 {
    (a.compatibility(b) - anon_a.compatibility(anon_b))
        .abs()
        .clamp(0.0, 1.0)
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}
