/// Number of components in every state vector.
pub const DIMENSIONS: usize = 12;

/// Simulated days per month.
pub const DAYS_PER_MONTH: u32 = 30;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;

/// Population size above which diversity is computed on a uniform sample.
pub const DEFAULT_SAMPLE_SIZE: usize = 10_000;

/// Candidate draws allowed per requested profile before generation gives up.
pub const GENERATION_RETRY_FACTOR: usize = 100;

/// Entities present at day 0 of an exponential growth schedule.
pub const DEFAULT_SEED_POPULATION: usize = 100;

/// Per-dimension drift limit used by the reference scenarios (18.36%).
pub const DEFAULT_DRIFT_LIMIT: f64 = 0.1836;

/// Per-dimension L1 sensitivity of the Laplace mechanism.
pub const SENSITIVITY: f64 = 1.0;

/// Days between periodic evolution snapshots.
pub const SNAPSHOT_INTERVAL_DAYS: u32 = 30;

/// Namespace tag prepended to every derived entity id.
pub const ID_PREFIX: &str = "agent_synthetic_";

/// Hex characters of the SHA-256 digest kept in an entity id.
pub const ID_HASH_LEN: usize = 32;
