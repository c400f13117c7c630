//! End-to-end scenarios across modules: generation → growth → evolution →
//! diversity, privacy scoring, and mechanism ablation.

use std::collections::HashSet;

use drift_core::ablation::{ALL_ON, BASELINE, CLASSICAL, DRIFT_ONLY, NO_PRIVACY, QUANTUM_AWARE};
use drift_core::privacy::{PrivacyMode, perturbation};
use drift_core::{
    DEFAULT_DRIFT_LIMIT, MechanismConfig, StreamRole, diversity, drift_summary, evaluate_epsilon,
    generate_growth_schedule, generate_population, homogenization_rate, mechanism_variants,
    privacy_loss, privacy_variants, run_ablation, run_evolution, sample_pairs,
    single_mechanism_names,
};
use rand::SeedableRng;
use rand::rngs::{SmallRng, StdRng};

/// Evolution stream for run seed 42, independent of the profile stream.
fn rng() -> StdRng {
    StreamRole::Evolution.rng(42)
}

fn privacy_rng() -> StdRng {
    StreamRole::Privacy.rng(42)
}

/// Six months, 100 entities, seed 42: all mechanisms on must land in the
/// target band and beat the unprotected baseline.
#[test]
fn all_mechanisms_bound_homogenization() {
    let population = generate_population(100, 42).unwrap();

    let protected = run_evolution(&population, 6, &MechanismConfig::all_on(), &mut rng()).unwrap();
    let baseline = run_evolution(&population, 6, &MechanismConfig::baseline(), &mut rng()).unwrap();

    let h_protected =
        homogenization_rate(&population, &protected.final_population, 10_000, &mut rng());
    let h_baseline =
        homogenization_rate(&population, &baseline.final_population, 10_000, &mut rng());

    assert!(
        (0.20..=0.45).contains(&h_protected),
        "protected homogenization {h_protected}"
    );
    assert!(h_protected < h_baseline, "{h_protected} vs {h_baseline}");

    let drift = drift_summary(&protected.final_population, Some(DEFAULT_DRIFT_LIMIT));
    assert!(drift.max > 0.0);
    assert_eq!(protected.history.len(), 7);
    assert_eq!(protected.history.last().unwrap().day, 180);
}

#[test]
fn generated_population_is_unique() {
    let population = generate_population(1000, 42).unwrap();
    let ids: HashSet<_> = population.iter().map(|e| e.id.clone()).collect();
    let vectors: HashSet<_> = population.iter().map(|e| e.current.to_bits()).collect();
    assert_eq!(ids.len(), 1000);
    assert_eq!(vectors.len(), 1000);
}

#[test]
fn same_seed_reproduces_population_and_run() {
    let a = generate_population(80, 7).unwrap();
    let b = generate_population(80, 7).unwrap();
    assert_eq!(a, b);

    let run_a = run_evolution(&a, 2, &MechanismConfig::all_on(), &mut rng()).unwrap();
    let run_b = run_evolution(&b, 2, &MechanismConfig::all_on(), &mut rng()).unwrap();
    assert_eq!(run_a, run_b);
}

#[test]
fn growth_schedule_feeds_evolution() {
    let (population, join_days) = generate_growth_schedule(400, 2, 42).unwrap();
    assert_eq!(join_days.iter().filter(|&&d| d == 0).count(), 100);
    assert!(join_days.windows(2).all(|w| w[0] <= w[1]));

    let run = run_evolution(&population, 2, &MechanismConfig::all_on(), &mut rng()).unwrap();
    let first = run.history.first().unwrap();
    let last = run.history.last().unwrap();
    assert_eq!(first.present, 100);
    assert_eq!(last.present, population.len());
    assert!(last.homogenization_rate > 0.0);
    assert_eq!(run.final_population.len(), population.len());
}

#[test]
fn stronger_privacy_costs_more_accuracy() {
    let mut rng = privacy_rng();
    let population = generate_population(100, 42).unwrap();
    let vectors = population.current_vectors();
    let pairs = sample_pairs(vectors.len(), 300, &mut rng);

    let strong =
        evaluate_epsilon(&vectors, &pairs, 0.01, PrivacyMode::QuantumAware, &mut rng).unwrap();
    let moderate =
        evaluate_epsilon(&vectors, &pairs, 1.0, PrivacyMode::QuantumAware, &mut rng).unwrap();
    let weak =
        evaluate_epsilon(&vectors, &pairs, 10.0, PrivacyMode::QuantumAware, &mut rng).unwrap();

    assert!(strong.mean_loss > weak.mean_loss, "{strong:?} vs {weak:?}");
    assert!(strong.mean_perturbation > moderate.mean_perturbation);
    assert!(moderate.mean_perturbation > weak.mean_perturbation);
}

#[test]
fn anonymized_vector_moves_less_with_larger_budget() {
    let mut rng = privacy_rng();
    let population = generate_population(50, 3).unwrap();
    let mut near = 0.0;
    let mut far = 0.0;
    for e in population.iter() {
        let strong = drift_core::anonymize(&e.current, 0.01, &mut rng).unwrap();
        let weak = drift_core::anonymize(&e.current, 100.0, &mut rng).unwrap();
        far += perturbation(&e.current, &strong);
        near += perturbation(&e.current, &weak);
    }
    assert!(far > near);
}

#[test]
fn sampled_diversity_is_stable_at_scale() {
    let population = generate_population(20_000, 1).unwrap();
    let a = diversity(&population, 2_000, &mut SmallRng::seed_from_u64(1));
    let b = diversity(&population, 2_000, &mut SmallRng::seed_from_u64(2));
    assert!((a - b).abs() / a < 0.05, "{a} vs {b}");
}

#[test]
fn ablation_over_evolution() {
    let population = generate_population(60, 42).unwrap();
    let variants = mechanism_variants(DEFAULT_DRIFT_LIMIT);

    let report = run_ablation(&variants, BASELINE, |config| {
        let run = run_evolution(&population, 3, config, &mut rng())?;
        Ok(run.final_homogenization())
    })
    .unwrap();

    assert_eq!(report.outcomes.len(), variants.len());
    assert!(report.get(ALL_ON).unwrap().delta_vs_baseline > 0.0);
    assert!(report.get(DRIFT_ONLY).unwrap().outcome.is_finite());

    let synergy = report.synergy(&single_mechanism_names(), ALL_ON).unwrap();
    assert_eq!(synergy.individual_improvements.len(), 3);
    assert!(synergy.combined_improvement > 0.0);
}

#[test]
fn privacy_ablation_over_shared_pairs() {
    let mut rng = privacy_rng();
    let population = generate_population(100, 42).unwrap();
    let vectors = population.current_vectors();
    let pairs = sample_pairs(vectors.len(), 300, &mut rng);

    let report = run_ablation(&privacy_variants(), NO_PRIVACY, |&mode| {
        privacy_loss(&vectors, &pairs, 0.01, mode, &mut rng)
    })
    .unwrap();

    let quantum = report.get(QUANTUM_AWARE).unwrap();
    let classical = report.get(CLASSICAL).unwrap();
    assert_eq!(report.get(NO_PRIVACY).unwrap().delta_vs_baseline, 0.0);
    assert!(quantum.outcome < classical.outcome, "{quantum:?} vs {classical:?}");
    assert!(quantum.delta_vs_baseline > classical.delta_vs_baseline);
}
