//! Deterministic generation of unique unit state vectors and their ids.

use std::collections::HashSet;
use std::fmt::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::constants::{DIMENSIONS, GENERATION_RETRY_FACTOR, ID_HASH_LEN, ID_PREFIX};
use crate::entity::{Entity, Population};
use crate::error::{CoreError, Result};
use crate::vector::StateVector;

/// Draws unit vectors while remembering every value already produced, so the
/// same generator never yields a duplicate across calls.
pub struct ProfileGenerator {
    seen: HashSet<[u64; DIMENSIONS]>,
}

impl Default for ProfileGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileGenerator {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Number of distinct vectors produced so far.
    pub fn produced(&self) -> usize {
        self.seen.len()
    }

    /// Draw `n` vectors not produced before, within `100 × n` candidates.
    pub fn generate(&mut self, n: usize, rng: &mut impl Rng) -> Result<Vec<StateVector>> {
        let budget = n.saturating_mul(GENERATION_RETRY_FACTOR);
        let mut out = Vec::with_capacity(n);
        let mut attempts = 0;

        while out.len() < n && attempts < budget {
            attempts += 1;
            let candidate = StateVector::random_unit(rng);
            if self.seen.insert(candidate.to_bits()) {
                out.push(candidate);
            }
        }

        if out.len() < n {
            return Err(CoreError::GenerationExhausted {
                requested: n,
                produced: out.len(),
                attempts,
            });
        }
        Ok(out)
    }

    /// Draw a single fresh vector.
    pub fn next(&mut self, rng: &mut impl Rng) -> Result<StateVector> {
        let mut v = self.generate(1, rng)?;
        Ok(v.remove(0))
    }
}

/// Draw `n` distinct unit vectors.
pub fn generate_profiles(n: usize, rng: &mut impl Rng) -> Result<Vec<StateVector>> {
    ProfileGenerator::new().generate(n, rng)
}

/// One-way id over the vector bytes and its assigned index.
///
/// SHA-256 of the little-endian component bytes followed by the decimal
/// index, truncated to 32 hex characters and prefixed with the namespace tag.
pub fn derive_id(vector: &StateVector, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(vector.to_le_bytes());
    hasher.update(index.to_string().as_bytes());
    let digest = hasher.finalize();

    let mut id = String::with_capacity(ID_PREFIX.len() + ID_HASH_LEN);
    id.push_str(ID_PREFIX);
    for byte in digest.iter().take(ID_HASH_LEN / 2) {
        let _ = write!(id, "{byte:02x}");
    }
    id
}

/// Random streams derived from one run seed.
///
/// Profiles draw from the run seed itself; every other role hashes the seed
/// with its label so no two roles replay the same sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamRole {
    Profiles,
    Evolution,
    Privacy,
}

impl StreamRole {
    fn label(self) -> &'static str {
        match self {
            StreamRole::Profiles => "profiles",
            StreamRole::Evolution => "evolution",
            StreamRole::Privacy => "privacy",
        }
    }

    /// Seed of this role's stream for run seed `base`.
    pub fn seed(self, base: u64) -> u64 {
        if self == StreamRole::Profiles {
            return base;
        }
        let mut hasher = Sha256::new();
        hasher.update(self.label().as_bytes());
        hasher.update(base.to_le_bytes());
        let digest = hasher.finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(word)
    }

    pub fn rng(self, base: u64) -> StdRng {
        StdRng::seed_from_u64(self.seed(base))
    }
}

/// Population of `n` unique entities, all joining at day 0.
pub fn generate_population(n: usize, seed: u64) -> Result<Population> {
    let mut rng = StdRng::seed_from_u64(seed);
    generate_population_with(n, &mut rng)
}

/// [`generate_population`] over a caller-supplied rng.
pub fn generate_population_with(n: usize, rng: &mut impl Rng) -> Result<Population> {
    let vectors = generate_profiles(n, rng)?;
    let mut population = Population::with_capacity(n);
    for (i, v) in vectors.into_iter().enumerate() {
        population.insert(Entity::new(derive_id(&v, i), v, 0))?;
    }
    Ok(population)
}
