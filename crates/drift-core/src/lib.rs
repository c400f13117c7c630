//! Population drift engine over 12-dimensional unit state vectors.
//!
//! Entities carry a current vector and an immutable anchor. Pairwise
//! influence pulls vectors together day by day; drift resistance, time decay,
//! adaptive damping and frequency reduction push back. Diversity metrics
//! measure how far a population homogenized, and the privacy module
//! anonymizes vectors with Laplace noise while tracking compatibility loss.
//!
//! Zero I/O. Every random draw comes from an rng passed in by the caller.

pub mod ablation;
pub mod config;
pub mod constants;
pub mod diversity;
pub mod entity;
pub mod error;
pub mod evolution;
pub mod growth;
pub mod privacy;
pub mod profile;
pub mod vector;

pub use ablation::{
    AblationOutcome, AblationReport, SynergyAnalysis, mechanism_variants, privacy_loss,
    privacy_variants, run_ablation, single_mechanism_names,
};
pub use config::{InfluencePolicy, MechanismConfig};
pub use constants::{
    DAYS_PER_MONTH, DEFAULT_DRIFT_LIMIT, DEFAULT_SAMPLE_SIZE, DEFAULT_SEED_POPULATION, DIMENSIONS,
    SENSITIVITY,
};
pub use diversity::{
    DriftSummary, centroid_variance, diversity, diversity_of, drift_summary, homogenization_rate,
    variance_homogenization,
};
pub use entity::{Entity, Population};
pub use error::{CoreError, Result};
pub use evolution::{
    EvolutionEngine, EvolutionOptions, EvolutionRun, Snapshot, run_evolution, run_evolution_with,
};
pub use growth::{GrowthModel, generate_growth_schedule};
pub use privacy::{
    PrivacyMode, PrivacyScore, accuracy_loss, anonymize, evaluate_epsilon, sample_pairs,
    select_epsilon, strongest_passing,
};
pub use profile::{
    ProfileGenerator, StreamRole, derive_id, generate_population, generate_profiles,
};
pub use vector::{StateVector, clip01, compatibility, normalize};
