//! Day-by-day evolution of a population under pairwise influence.
//!
//! Each simulated day runs in two phases: entities whose join day has come
//! are admitted (starting from their anchor), then `M` interaction slots pick
//! two distinct present entities and pull one toward the other with strength
//! `compatibility × base_influence_rate × adaptive_multiplier`.
//!
//! The moved vector is clipped into `[0, 1]`, clamped to within
//! `drift_limit` of its anchor per dimension, and finally blended back toward
//! the anchor by the time-decay factor. Vectors are not renormalized during a
//! run.
//!
//! Randomness is split into two sub-streams at the start of a run: pairing
//! (including frequency-reduction draws) and diversity sampling. Switching a
//! mechanism on or off therefore never changes which pairs interact.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{InfluencePolicy, MechanismConfig};
use crate::constants::{DAYS_PER_MONTH, DEFAULT_SAMPLE_SIZE, DIMENSIONS, SNAPSHOT_INTERVAL_DAYS};
use crate::diversity::{diversity_at, ratio_loss, sample_indices};
use crate::entity::Population;
use crate::error::{CoreError, Result};
use crate::vector::StateVector;

/// Population state recorded at a point of a run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Days completed when the snapshot was taken (0 = before the first day).
    pub day: u32,
    /// Entities admitted so far.
    pub present: usize,
    pub diversity: f64,
    /// Homogenization of the present entities against their anchors.
    pub homogenization_rate: f64,
    pub mean_drift: f64,
    pub max_drift: f64,
}

/// Result of one evolution run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRun {
    pub history: Vec<Snapshot>,
    pub final_population: Population,
}

impl EvolutionRun {
    /// Homogenization at the last snapshot, 0 for an empty history.
    pub fn final_homogenization(&self) -> f64 {
        self.history.last().map_or(0.0, |s| s.homogenization_rate)
    }
}

/// Measurement knobs that do not change the dynamics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionOptions {
    /// Present-entity count above which diversity is sampled.
    pub sample_size: usize,
    pub snapshot_interval: u32,
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            snapshot_interval: SNAPSHOT_INTERVAL_DAYS,
        }
    }
}

/// Owns the population for the duration of a run.
pub struct EvolutionEngine {
    population: Population,
    config: MechanismConfig,
    options: EvolutionOptions,
    /// Arena indices in admission order (join day, then arena order).
    admission: Vec<usize>,
    admitted: usize,
    /// Full-path anchor diversity, keyed by the present count it was taken at.
    anchor_diversity: Option<(usize, f64)>,
}

impl EvolutionEngine {
    /// Prepare a run over a copy of `population`. Every entity restarts
    /// from its anchor when admitted.
    pub fn new(population: &Population, config: MechanismConfig) -> Result<Self> {
        config.validate()?;
        if population.len() < 2 {
            return Err(CoreError::InvalidPopulationSize {
                size: population.len(),
                minimum: 2,
            });
        }

        let mut admission: Vec<usize> = (0..population.len()).collect();
        admission.sort_by_key(|&i| population.entity(i).join_day);

        Ok(Self {
            population: population.clone(),
            config,
            options: EvolutionOptions::default(),
            admission,
            admitted: 0,
            anchor_diversity: None,
        })
    }

    pub fn with_options(mut self, options: EvolutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.options.sample_size = sample_size;
        self
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Arena indices of the entities admitted so far.
    pub fn present(&self) -> &[usize] {
        &self.admission[..self.admitted]
    }

    /// Simulate `days` days and return the snapshot history and final state.
    pub fn run(mut self, days: u32, rng: &mut impl Rng) -> Result<EvolutionRun> {
        let mut pairing = SmallRng::from_rng(rng);
        let mut sampling = SmallRng::from_rng(rng);
        let interval = self.options.snapshot_interval.max(1);

        self.admit(0);
        let mut history = vec![self.snapshot(0, &mut sampling)];

        for day in 0..days {
            self.admit(day);
            self.step(day, &mut pairing, &mut sampling);

            let completed = day + 1;
            if completed % interval == 0 || completed == days {
                history.push(self.snapshot(completed, &mut sampling));
            }
        }

        let run = EvolutionRun {
            history,
            final_population: self.population,
        };
        tracing::info!(
            days,
            entities = run.final_population.len(),
            homogenization = run.final_homogenization(),
            "evolution run complete"
        );
        Ok(run)
    }

    /// Admit every entity whose join day is `<= day`.
    fn admit(&mut self, day: u32) {
        while let Some(&idx) = self.admission.get(self.admitted) {
            let entity = self.population.entity_mut(idx);
            if entity.join_day > day {
                break;
            }
            entity.current = *entity.initial();
            self.admitted += 1;
        }
    }

    /// One day of interactions. No-op with fewer than two present entities.
    fn step(&mut self, day: u32, pairing: &mut impl Rng, sampling: &mut impl Rng) {
        if self.admitted < 2 {
            return;
        }

        let h = if self.config.needs_trigger_signal() {
            self.trigger_signal(sampling)
        } else {
            0.0
        };
        let multiplier = self.config.adaptive_multiplier(h);
        let participants = self.participants(day, pairing);

        let m = participants.len();
        for _ in 0..m {
            let a = pairing.random_range(0..m);
            let mut b = pairing.random_range(0..m - 1);
            if b >= a {
                b += 1;
            }
            self.interact(participants[a], participants[b], day, h, multiplier);
        }
    }

    /// Entities taking part today. Under frequency reduction each present
    /// entity joins in with a probability falling with its age; if fewer
    /// than two do, everyone present takes part.
    fn participants(&self, day: u32, pairing: &mut impl Rng) -> Vec<usize> {
        let present = self.present();
        if !self.config.use_frequency_reduction {
            return present.to_vec();
        }
        let picked: Vec<usize> = present
            .iter()
            .copied()
            .filter(|&i| {
                let age = self.population.entity(i).age(day).unwrap_or(0);
                pairing.random::<f64>() < self.config.participation_probability(age)
            })
            .collect();
        if picked.len() < 2 {
            present.to_vec()
        } else {
            picked
        }
    }

    /// Apply one interaction between arena entries `a` and `b`.
    fn interact(&mut self, a: usize, b: usize, day: u32, h: f64, multiplier: f64) {
        let va = self.population.entity(a).current;
        let vb = self.population.entity(b).current;
        let influence = va.compatibility(&vb) * self.config.base_influence_rate * multiplier;

        self.pull(a, vb, influence, day, h);
        if self.config.influence_policy == InfluencePolicy::Mutual {
            self.pull(b, va, influence, day, h);
        }
    }

    fn pull(&mut self, idx: usize, toward: StateVector, influence: f64, day: u32, h: f64) {
        let entity = self.population.entity(idx);
        let anchor = *entity.initial();
        let age = entity.age(day).unwrap_or(0);

        let mut v = entity.current.lerp(toward, influence).clip01();
        if let Some(limit) = self.config.drift_limit {
            v = clamp_drift(v, &anchor, limit);
        }
        let decay = self.config.decay_factor(age, h);
        if decay < 1.0 {
            v = anchor + (v - anchor) * decay;
        }

        self.population.entity_mut(idx).current = v;
    }

    /// Homogenization of the present entities: current against anchor
    /// diversity over one shared index sample.
    fn trigger_signal(&mut self, sampling: &mut impl Rng) -> f64 {
        let (current, initial) = self.present_vectors();
        let indices = sample_indices(current.len(), self.options.sample_size, sampling);
        let before = self.anchor_diversity(&initial, &indices);
        ratio_loss(before, diversity_at(&current, &indices))
    }

    /// Anchors never move, so on the full path the anchor diversity only
    /// changes when the present count does.
    fn anchor_diversity(&mut self, initial: &[StateVector], indices: &[usize]) -> f64 {
        if initial.len() > self.options.sample_size {
            return diversity_at(initial, indices);
        }
        match self.anchor_diversity {
            Some((n, d)) if n == initial.len() => d,
            _ => {
                let d = diversity_at(initial, indices);
                self.anchor_diversity = Some((initial.len(), d));
                d
            }
        }
    }

    fn present_vectors(&self) -> (Vec<StateVector>, Vec<StateVector>) {
        self.present()
            .iter()
            .map(|&i| {
                let e = self.population.entity(i);
                (e.current, *e.initial())
            })
            .unzip()
    }

    fn snapshot(&mut self, day: u32, sampling: &mut impl Rng) -> Snapshot {
        let (current, initial) = self.present_vectors();
        let indices = sample_indices(current.len(), self.options.sample_size, sampling);
        let diversity = diversity_at(&current, &indices);
        let homogenization_rate = ratio_loss(diversity_at(&initial, &indices), diversity);

        let drifts: Vec<f64> = current
            .iter()
            .zip(&initial)
            .map(|(c, i)| c.distance(i))
            .collect();
        let mean_drift = if drifts.is_empty() {
            0.0
        } else {
            drifts.iter().sum::<f64>() / drifts.len() as f64
        };
        let max_drift = drifts.iter().copied().fold(0.0, f64::max);

        let snapshot = Snapshot {
            day,
            present: current.len(),
            diversity,
            homogenization_rate,
            mean_drift,
            max_drift,
        };
        tracing::debug!(
            day,
            present = snapshot.present,
            diversity,
            homogenization = homogenization_rate,
            "snapshot"
        );
        snapshot
    }
}

/// Slide every dimension back to `anchor[i] ± limit` where it overshoots.
pub fn clamp_drift(v: StateVector, anchor: &StateVector, limit: f64) -> StateVector {
    let mut out = [0.0; DIMENSIONS];
    for (i, slot) in out.iter_mut().enumerate() {
        let deviation = v[i] - anchor[i];
        *slot = if deviation.abs() > limit {
            anchor[i] + limit.copysign(deviation)
        } else {
            v[i]
        };
    }
    StateVector::new(out)
}

/// Run `months × 30` days of evolution with default measurement options.
pub fn run_evolution(
    population: &Population,
    months: u32,
    config: &MechanismConfig,
    rng: &mut impl Rng,
) -> Result<EvolutionRun> {
    run_evolution_with(population, months, config, EvolutionOptions::default(), rng)
}

pub fn run_evolution_with(
    population: &Population,
    months: u32,
    config: &MechanismConfig,
    options: EvolutionOptions,
    rng: &mut impl Rng,
) -> Result<EvolutionRun> {
    let days = months.checked_mul(DAYS_PER_MONTH).ok_or_else(|| {
        CoreError::InvalidConfig(format!("{months} months overflows the day count"))
    })?;
    EvolutionEngine::new(population, config.clone())?
        .with_options(options)
        .run(days, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diversity::homogenization_rate;
    use crate::entity::Entity;
    use crate::growth::GrowthModel;
    use crate::profile::generate_population;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn basis(i: usize) -> StateVector {
        let mut c = [0.0; DIMENSIONS];
        c[i] = 1.0;
        StateVector::new(c)
    }

    fn run_days(pop: &Population, config: MechanismConfig, days: u32) -> EvolutionRun {
        EvolutionEngine::new(pop, config)
            .unwrap()
            .run(days, &mut rng())
            .unwrap()
    }

    #[test]
    fn test_zero_drift_limit_freezes_population() {
        let pop = generate_population(40, 42).unwrap();
        let config = MechanismConfig::all_on().with_drift_limit(Some(0.0));
        let run = run_days(&pop, config, 90);
        assert_eq!(run.final_population, pop);
        assert!(run.history.iter().all(|s| s.homogenization_rate == 0.0));
    }

    #[test]
    fn test_baseline_homogenizes() {
        let pop = generate_population(50, 1).unwrap();
        let run = run_days(&pop, MechanismConfig::baseline(), 60);
        let h = homogenization_rate(&pop, &run.final_population, 10_000, &mut rng());
        assert!(h > 0.1, "homogenization {h}");
        assert!((h - run.final_homogenization()).abs() < 1e-12);
    }

    #[test]
    fn test_rate_monotonicity() {
        let pop = generate_population(60, 7).unwrap();
        let rates = [0.005, 0.02, 0.08];
        let hs: Vec<f64> = rates
            .iter()
            .map(|&r| {
                let config = MechanismConfig::baseline().with_base_influence_rate(r);
                run_days(&pop, config, 60).final_homogenization()
            })
            .collect();
        assert!(hs.windows(2).all(|w| w[0] <= w[1]), "{hs:?}");
    }

    #[test]
    fn test_drift_limit_bounds_every_dimension() {
        let pop = generate_population(30, 3).unwrap();
        let limit = 0.05;
        let run = run_days(&pop, MechanismConfig::baseline().with_drift_limit(Some(limit)), 60);
        for e in run.final_population.iter() {
            let dev = e.current - *e.initial();
            assert!(dev.components().iter().all(|d| d.abs() <= limit + 1e-12));
            assert!(e.current.components().iter().all(|x| (0.0..=1.0).contains(x)));
        }
    }

    #[test]
    fn test_clamp_drift_preserves_sign() {
        let anchor = StateVector::uniform();
        let mut c = anchor.to_array();
        c[0] += 0.3;
        c[1] -= 0.3;
        c[2] += 0.05;
        let clamped = clamp_drift(StateVector::new(c), &anchor, 0.1);
        assert!((clamped[0] - (anchor[0] + 0.1)).abs() < 1e-15);
        assert!((clamped[1] - (anchor[1] - 0.1)).abs() < 1e-15);
        assert_eq!(clamped[2], c[2]);
        assert_eq!(clamped[3], anchor[3]);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let pop = generate_population(30, 5).unwrap();
        let a = run_days(&pop, MechanismConfig::all_on(), 45);
        let b = run_days(&pop, MechanismConfig::all_on(), 45);
        assert_eq!(a, b);
    }

    #[test]
    fn test_snapshot_schedule() {
        let pop = generate_population(20, 2).unwrap();
        let days: Vec<u32> = run_days(&pop, MechanismConfig::baseline(), 180)
            .history
            .iter()
            .map(|s| s.day)
            .collect();
        assert_eq!(days, vec![0, 30, 60, 90, 120, 150, 180]);

        let days: Vec<u32> = run_days(&pop, MechanismConfig::baseline(), 45)
            .history
            .iter()
            .map(|s| s.day)
            .collect();
        assert_eq!(days, vec![0, 30, 45]);
    }

    #[test]
    fn test_lone_entity_days_are_skipped() {
        let mut pop = Population::new();
        pop.insert(Entity::new("early".into(), basis(0), 0)).unwrap();
        pop.insert(Entity::new("late".into(), basis(1), 10)).unwrap();

        let run = run_days(&pop, MechanismConfig::baseline(), 10);
        assert_eq!(run.final_population, pop);
        assert!(run.history.iter().all(|s| s.present == 1));
    }

    #[test]
    fn test_orthogonal_pair_never_moves() {
        let mut pop = Population::new();
        pop.insert(Entity::new("x".into(), basis(0), 0)).unwrap();
        pop.insert(Entity::new("y".into(), basis(1), 0)).unwrap();
        // Zero compatibility means zero influence.
        let run = run_days(&pop, MechanismConfig::baseline(), 30);
        assert_eq!(run.final_population, pop);
    }

    #[test]
    fn test_too_small_population() {
        let mut pop = Population::new();
        pop.insert(Entity::new("solo".into(), basis(0), 0)).unwrap();
        assert!(matches!(
            EvolutionEngine::new(&pop, MechanismConfig::baseline()),
            Err(CoreError::InvalidPopulationSize { size: 1, minimum: 2 })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let pop = generate_population(5, 1).unwrap();
        let config = MechanismConfig::baseline().with_base_influence_rate(-1.0);
        assert!(matches!(
            run_evolution(&pop, 1, &config, &mut rng()),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_one_way_moves_only_first() {
        let pop = generate_population(2, 9).unwrap();
        let mut engine = EvolutionEngine::new(&pop, MechanismConfig::baseline()).unwrap();
        engine.admit(0);
        engine.interact(0, 1, 0, 0.0, 1.0);
        assert_ne!(engine.population().entity(0).current, pop.entity(0).current);
        assert_eq!(engine.population().entity(1).current, pop.entity(1).current);
    }

    #[test]
    fn test_mutual_moves_both_from_pre_interaction_state() {
        let pop = generate_population(2, 9).unwrap();
        let config = MechanismConfig::baseline().with_influence_policy(InfluencePolicy::Mutual);
        let mut engine = EvolutionEngine::new(&pop, config).unwrap();
        engine.admit(0);
        engine.interact(0, 1, 0, 0.0, 1.0);

        let (a, b) = (pop.entity(0).current, pop.entity(1).current);
        let influence = a.compatibility(&b) * 0.02;
        let moved_a = engine.population().entity(0).current;
        let moved_b = engine.population().entity(1).current;
        assert!(moved_a.approx_eq(&a.lerp(b, influence).clip01(), 1e-15));
        assert!(moved_b.approx_eq(&b.lerp(a, influence).clip01(), 1e-15));
    }

    fn eager_damping() -> MechanismConfig {
        MechanismConfig {
            use_adaptive_influence: true,
            adaptive_trigger_homogenization: 0.0,
            adaptive_slope: 10.0,
            adaptive_floor: 0.2,
            ..MechanismConfig::baseline()
        }
    }

    #[test]
    fn test_adaptive_damping_slows_homogenization() {
        let pop = generate_population(50, 1).unwrap();
        let baseline = run_days(&pop, MechanismConfig::baseline(), 60).final_homogenization();
        let damped = run_days(&pop, eager_damping(), 60).final_homogenization();
        assert!(damped < baseline, "damped {damped} vs baseline {baseline}");
        assert!(damped > 0.0);
    }

    #[test]
    fn test_interaction_scales_by_multiplier() {
        let pop = generate_population(2, 9).unwrap();
        let config = eager_damping();
        let h = 0.05;
        let multiplier = config.adaptive_multiplier(h);
        assert!((multiplier - 0.5).abs() < 1e-12);

        let mut engine = EvolutionEngine::new(&pop, config).unwrap();
        engine.admit(0);
        engine.interact(0, 1, 0, h, multiplier);

        let (a, b) = (pop.entity(0).current, pop.entity(1).current);
        let influence = a.compatibility(&b) * 0.02 * multiplier;
        let moved = engine.population().entity(0).current;
        assert!(moved.approx_eq(&a.lerp(b, influence).clip01(), 1e-15));
        assert!(!moved.approx_eq(&a.lerp(b, influence / multiplier).clip01(), 1e-12));
    }

    #[test]
    fn test_month_overflow_is_an_error() {
        let pop = generate_population(5, 1).unwrap();
        assert!(matches!(
            run_evolution(&pop, u32::MAX, &MechanismConfig::baseline(), &mut rng()),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_late_joiners_start_at_anchor() {
        let pop = GrowthModel::new(400, 2)
            .with_seed_population(50)
            .generate(11)
            .unwrap();
        let run = run_days(&pop, MechanismConfig::baseline(), 30);

        let presents: Vec<usize> = run.history.iter().map(|s| s.present).collect();
        assert_eq!(presents[0], 50);
        assert!(presents.windows(2).all(|w| w[0] <= w[1]));

        for e in run.final_population.iter().filter(|e| e.join_day >= 30) {
            assert_eq!(e.current, *e.initial());
        }
        let moved = run
            .final_population
            .iter()
            .filter(|e| e.join_day < 30 && e.current != *e.initial())
            .count();
        assert!(moved > 0);
    }

    #[test]
    fn test_frequency_reduction_keeps_pairs_distinct() {
        let pop = GrowthModel::new(120, 1)
            .with_seed_population(20)
            .generate(4)
            .unwrap();
        let config = MechanismConfig::baseline().with_frequency_reduction(true);
        let run = run_days(&pop, config, 30);
        assert!(run.final_homogenization().is_finite());
        assert_eq!(run.final_population.len(), pop.len());
    }

    #[test]
    fn test_sampled_trigger_path() {
        let pop = generate_population(80, 8).unwrap();
        let config = MechanismConfig::all_on();
        let run = EvolutionEngine::new(&pop, config)
            .unwrap()
            .with_sample_size(30)
            .run(30, &mut rng())
            .unwrap();
        let last = run.history.last().unwrap();
        assert_eq!(last.present, 80);
        assert!(last.homogenization_rate > 0.0 && last.homogenization_rate < 1.0);
    }
}
