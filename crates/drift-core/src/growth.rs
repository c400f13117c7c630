//! Exponential growth schedule: staggers entity join days so the population
//! follows `N(t) = N₀ · e^{rt}` with `r = ln(N/N₀) / T`.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::constants::{DAYS_PER_MONTH, DEFAULT_SEED_POPULATION};
use crate::entity::{Entity, Population};
use crate::error::{CoreError, Result};
use crate::profile::{ProfileGenerator, derive_id};

/// Parameters of an exponential growth schedule.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowthModel {
    /// Target final population size `N`.
    pub target: usize,
    /// Entities present at day 0 (`N₀`), capped at `target`.
    pub seed_population: usize,
    /// Schedule length `T` in days.
    pub days: u32,
}

impl GrowthModel {
    /// Schedule over `months × 30` days, saturating at `u32::MAX` days.
    pub fn new(target: usize, months: u32) -> Self {
        Self {
            target,
            seed_population: DEFAULT_SEED_POPULATION,
            days: months.saturating_mul(DAYS_PER_MONTH),
        }
    }

    pub fn with_seed_population(mut self, n0: usize) -> Self {
        self.seed_population = n0;
        self
    }

    fn n0(&self) -> usize {
        self.seed_population.min(self.target).max(1)
    }

    /// Daily growth rate `r`. Zero when there is nothing to grow.
    pub fn rate(&self) -> f64 {
        if self.days == 0 || self.target <= self.n0() {
            return 0.0;
        }
        (self.target as f64 / self.n0() as f64).ln() / self.days as f64
    }

    /// Expected population on day `t`.
    pub fn expected(&self, t: u32) -> f64 {
        self.n0() as f64 * (self.rate() * t as f64).exp()
    }

    /// Join day of every entity in creation order.
    ///
    /// The first `N₀` join at day 0. On each day `t = 1..T-1`,
    /// `floor(expected(t)) − count` entities join (never negative, never past
    /// `target`), and admission stops once `count ≥ target`.
    pub fn join_days(&self) -> Vec<u32> {
        if self.target == 0 {
            return Vec::new();
        }
        let n0 = self.n0();
        let mut days = vec![0u32; n0];

        for t in 1..self.days {
            if days.len() >= self.target {
                break;
            }
            let expected = self.expected(t).floor() as usize;
            let admitted = expected
                .saturating_sub(days.len())
                .min(self.target - days.len());
            days.extend(std::iter::repeat_n(t, admitted));
        }
        days
    }

    /// Build the population. Entity `i` draws its vector from a generator
    /// seeded with `base_seed + i`; ids and vectors are unique across the run.
    pub fn generate(&self, base_seed: u64) -> Result<Population> {
        if self.target < 2 {
            return Err(CoreError::InvalidPopulationSize {
                size: self.target,
                minimum: 2,
            });
        }
        let join_days = self.join_days();
        let mut generator = ProfileGenerator::new();
        let mut population = Population::with_capacity(join_days.len());

        for (i, day) in join_days.into_iter().enumerate() {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(i as u64));
            let v = generator.next(&mut rng)?;
            population.insert(Entity::new(derive_id(&v, i), v, day))?;
        }

        tracing::info!(
            target = self.target,
            admitted = population.len(),
            rate = self.rate(),
            "generated growth schedule"
        );
        Ok(population)
    }
}

/// Grow toward `target_n` entities over `months`, starting from the default
/// seed population. Returns the population and its join days in arena order.
pub fn generate_growth_schedule(
    target_n: usize,
    months: u32,
    seed: u64,
) -> Result<(Population, Vec<u32>)> {
    let population = GrowthModel::new(target_n, months).generate(seed)?;
    let join_days = population.join_days();
    Ok((population, join_days))
}
