//! Population dispersion and homogenization.
//!
//! Diversity is the mean pairwise Euclidean distance of a vector set. Above
//! `sample_size` entities it is computed on a uniform sample drawn without
//! replacement; the formula is the same on both paths, so values are
//! comparable across population scales.

use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::constants::{DIMENSIONS, EPSILON};
use crate::entity::Population;
use crate::vector::StateVector;

/// Mean pairwise Euclidean distance. 0 for fewer than two vectors.
pub fn mean_pairwise_distance(vectors: &[StateVector]) -> f64 {
    let n = vectors.len();
    if n < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            total += vectors[i].distance(&vectors[j]);
        }
    }
    total / (n * (n - 1) / 2) as f64
}

/// Mean pairwise distance over `vectors[idx]` for the given indices.
pub fn diversity_at(vectors: &[StateVector], indices: &[usize]) -> f64 {
    let picked: Vec<StateVector> = indices.iter().map(|&i| vectors[i]).collect();
    mean_pairwise_distance(&picked)
}

/// Indices to measure: all of `0..len` when `len <= sample_size`, otherwise
/// exactly `sample_size` distinct indices drawn uniformly. The full path
/// consumes no randomness.
pub fn sample_indices(len: usize, sample_size: usize, rng: &mut impl Rng) -> Vec<usize> {
    if len <= sample_size {
        return (0..len).collect();
    }
    let mut picked = index::sample(rng, len, sample_size).into_vec();
    picked.sort_unstable();
    picked
}

/// Diversity of a vector set, sampled above `sample_size`.
pub fn diversity_of(vectors: &[StateVector], sample_size: usize, rng: &mut impl Rng) -> f64 {
    let indices = sample_indices(vectors.len(), sample_size, rng);
    diversity_at(vectors, &indices)
}

/// Diversity of a population's current vectors.
pub fn diversity(population: &Population, sample_size: usize, rng: &mut impl Rng) -> f64 {
    diversity_of(&population.current_vectors(), sample_size, rng)
}

/// `1 − diversity(final) / diversity(initial)`.
///
/// Both terms are measured on the same entities: the sample is drawn over
/// `initial` and matched into `final` by id (ids missing from `final` are
/// skipped). Not clamped; a negative value means dispersion grew. Returns 0
/// when the initial population has no dispersion.
pub fn homogenization_rate(
    initial: &Population,
    final_population: &Population,
    sample_size: usize,
    rng: &mut impl Rng,
) -> f64 {
    let (before, after) = matched_sample(initial, final_population, sample_size, rng);
    ratio_loss(mean_pairwise_distance(&before), mean_pairwise_distance(&after))
}

/// Mean squared distance to the centroid. 0 for an empty set.
pub fn centroid_variance(vectors: &[StateVector]) -> f64 {
    if vectors.is_empty() {
        return 0.0;
    }
    let n = vectors.len() as f64;
    let mut centroid = [0.0; DIMENSIONS];
    for v in vectors {
        for (c, x) in centroid.iter_mut().zip(v.components()) {
            *c += x / n;
        }
    }
    let centroid = StateVector::new(centroid);
    vectors
        .iter()
        .map(|v| {
            let d = v.distance(&centroid);
            d * d
        })
        .sum::<f64>()
        / n
}

/// Homogenization measured with [`centroid_variance`] instead of mean
/// pairwise distance.
pub fn variance_homogenization(
    initial: &Population,
    final_population: &Population,
    sample_size: usize,
    rng: &mut impl Rng,
) -> f64 {
    let (before, after) = matched_sample(initial, final_population, sample_size, rng);
    ratio_loss(centroid_variance(&before), centroid_variance(&after))
}

/// Per-entity movement away from the anchor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftSummary {
    /// Mean L2 distance of `current` from `initial`.
    pub mean: f64,
    pub max: f64,
    /// Fraction of (entity, dimension) deviations sitting at the drift limit.
    /// 0 without a limit.
    pub at_limit_fraction: f64,
}

pub fn drift_summary(population: &Population, drift_limit: Option<f64>) -> DriftSummary {
    if population.is_empty() {
        return DriftSummary::default();
    }
    let mut sum = 0.0;
    let mut max: f64 = 0.0;
    let mut at_limit = 0usize;

    for e in population.iter() {
        let d = e.drift();
        sum += d;
        max = max.max(d);
        if let Some(limit) = drift_limit {
            let deviation = e.current - *e.initial();
            at_limit += deviation
                .components()
                .iter()
                .filter(|x| limit > 0.0 && x.abs() >= limit - EPSILON)
                .count();
        }
    }

    let n = population.len() as f64;
    DriftSummary {
        mean: sum / n,
        max,
        at_limit_fraction: at_limit as f64 / (n * DIMENSIONS as f64),
    }
}

fn matched_sample(
    initial: &Population,
    final_population: &Population,
    sample_size: usize,
    rng: &mut impl Rng,
) -> (Vec<StateVector>, Vec<StateVector>) {
    let indices = sample_indices(initial.len(), sample_size, rng);
    let mut before = Vec::with_capacity(indices.len());
    let mut after = Vec::with_capacity(indices.len());
    for i in indices {
        let e = initial.entity(i);
        if let Some(f) = final_population.get(&e.id) {
            before.push(e.current);
            after.push(f.current);
        }
    }
    (before, after)
}

pub(crate) fn ratio_loss(before: f64, after: f64) -> f64 {
    if before == 0.0 {
        return 0.0;
    }
    1.0 - after / before
}
