mod run_config;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use drift_core::ablation::{ALL_ON, BASELINE, NO_PRIVACY};
use drift_core::evolution::EvolutionOptions;
use drift_core::privacy::PrivacyMode;
use drift_core::{
    AblationReport, DEFAULT_DRIFT_LIMIT, DEFAULT_SAMPLE_SIZE, DriftSummary, GrowthModel,
    MechanismConfig, Population, PrivacyScore, Snapshot, StreamRole, SynergyAnalysis,
    drift_summary, evaluate_epsilon, generate_population, homogenization_rate, mechanism_variants,
    privacy_loss, privacy_variants, run_ablation, run_evolution_with, sample_pairs,
    single_mechanism_names, strongest_passing, variance_homogenization,
};
use serde::Serialize;

use crate::run_config::RunConfig;

const DEFAULT_SEED: u64 = 42;
const DEFAULT_COUNT: usize = 100;
const DEFAULT_MONTHS: u32 = 6;

#[derive(Parser)]
#[command(name = "drift", about = "State-vector drift, diversity and privacy simulations")]
struct Cli {
    /// TOML run file (seed, count, months, sample_size, growth, [mechanisms])
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    Baseline,
    AllOn,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a population and evolve it
    Evolve {
        #[arg(long)]
        count: Option<usize>,
        #[arg(long)]
        months: Option<u32>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        sample_size: Option<usize>,

        /// Stagger join days on an exponential growth schedule
        #[arg(long)]
        growth: bool,

        /// Mechanism preset (overrides the run file's [mechanisms])
        #[arg(long, value_enum)]
        preset: Option<Preset>,

        /// Per-dimension drift limit override
        #[arg(long)]
        drift_limit: Option<f64>,

        /// Omit the snapshot history from the output
        #[arg(long)]
        no_history: bool,
    },

    /// Score privacy budgets by compatibility loss over sampled pairs
    Privacy {
        #[arg(long)]
        count: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,

        /// Number of entity pairs to score
        #[arg(long, default_value_t = 200)]
        pairs: usize,

        /// Privacy budgets to score (repeatable)
        #[arg(long = "epsilon", default_values_t = [0.01, 0.1, 1.0, 10.0, 100.0])]
        epsilons: Vec<f64>,

        /// Select the smallest budget whose preservation meets this floor
        #[arg(long)]
        floor: Option<f64>,

        /// Skip renormalization (naive noise-only baseline)
        #[arg(long)]
        classical: bool,
    },

    /// Run the standard mechanism ablation over one population
    Ablate {
        #[arg(long)]
        count: Option<usize>,
        #[arg(long)]
        months: Option<u32>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        sample_size: Option<usize>,
        #[arg(long)]
        drift_limit: Option<f64>,

        /// Ablate the privacy modes instead of the evolution mechanisms
        #[arg(long)]
        privacy: bool,

        /// Privacy budget for --privacy
        #[arg(long, default_value_t = 0.01)]
        epsilon: f64,

        /// Number of entity pairs scored by --privacy
        #[arg(long, default_value_t = 200)]
        pairs: usize,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let file = RunConfig::load_optional(cli.config.as_deref())?;

    match &cli.command {
        Commands::Evolve {
            count,
            months,
            seed,
            sample_size,
            growth,
            preset,
            drift_limit,
            no_history,
        } => {
            let params = RunParams::resolve(&file, *count, *months, *seed, *sample_size);
            let config = mechanisms(&file, *preset, *drift_limit);
            cmd_evolve(&params, config, *growth || file.growth.unwrap_or(false), *no_history)
        }
        Commands::Privacy {
            count,
            seed,
            pairs,
            epsilons,
            floor,
            classical,
        } => {
            let params = RunParams::resolve(&file, *count, None, *seed, None);
            let mode = if *classical {
                PrivacyMode::Classical
            } else {
                PrivacyMode::QuantumAware
            };
            cmd_privacy(&params, *pairs, epsilons, *floor, mode)
        }
        Commands::Ablate {
            count,
            months,
            seed,
            sample_size,
            drift_limit,
            privacy,
            epsilon,
            pairs,
        } => {
            let params = RunParams::resolve(&file, *count, *months, *seed, *sample_size);
            if *privacy {
                return cmd_ablate_privacy(&params, *pairs, *epsilon);
            }
            let limit = drift_limit
                .or_else(|| file.mechanisms.as_ref().and_then(|m| m.drift_limit))
                .unwrap_or(DEFAULT_DRIFT_LIMIT);
            cmd_ablate(&params, limit)
        }
    }
}

/// Scalars shared by every subcommand, after flag > file > default.
#[derive(Clone, Copy, Debug, Serialize)]
struct RunParams {
    seed: u64,
    count: usize,
    months: u32,
    sample_size: usize,
}

impl RunParams {
    fn resolve(
        file: &RunConfig,
        count: Option<usize>,
        months: Option<u32>,
        seed: Option<u64>,
        sample_size: Option<usize>,
    ) -> Self {
        Self {
            seed: seed.or(file.seed).unwrap_or(DEFAULT_SEED),
            count: count.or(file.count).unwrap_or(DEFAULT_COUNT),
            months: months.or(file.months).unwrap_or(DEFAULT_MONTHS),
            sample_size: sample_size
                .or(file.sample_size)
                .unwrap_or(DEFAULT_SAMPLE_SIZE),
        }
    }

    fn options(&self) -> EvolutionOptions {
        EvolutionOptions {
            sample_size: self.sample_size,
            ..EvolutionOptions::default()
        }
    }
}

fn mechanisms(
    file: &RunConfig,
    preset: Option<Preset>,
    drift_limit: Option<f64>,
) -> MechanismConfig {
    let config = match (preset, &file.mechanisms) {
        (Some(Preset::Baseline), _) => MechanismConfig::baseline(),
        (Some(Preset::AllOn), _) | (None, None) => MechanismConfig::all_on(),
        (None, Some(m)) => m.clone(),
    };
    match drift_limit {
        Some(limit) => config.with_drift_limit(Some(limit)),
        None => config,
    }
}

fn build_population(params: &RunParams, growth: bool) -> Result<Population> {
    let population = if growth {
        GrowthModel::new(params.count, params.months).generate(params.seed)
    } else {
        generate_population(params.count, params.seed)
    };
    population.with_context(|| format!("failed to generate {} entities", params.count))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

// ---------------------------------------------------------------------------
// evolve
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EvolveOutput {
    params: RunParams,
    growth: bool,
    mechanisms: MechanismConfig,
    entities: usize,
    homogenization_rate: f64,
    variance_homogenization: f64,
    drift: DriftSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    history: Option<Vec<Snapshot>>,
}

fn cmd_evolve(
    params: &RunParams,
    config: MechanismConfig,
    growth: bool,
    no_history: bool,
) -> Result<()> {
    let population = build_population(params, growth)?;
    let mut rng = StreamRole::Evolution.rng(params.seed);
    let run = run_evolution_with(&population, params.months, &config, params.options(), &mut rng)
        .context("evolution failed")?;

    let sample_size = params.sample_size;
    let h = homogenization_rate(&population, &run.final_population, sample_size, &mut rng);
    let vh = variance_homogenization(&population, &run.final_population, sample_size, &mut rng);
    let drift = drift_summary(&run.final_population, config.drift_limit);

    print_json(&EvolveOutput {
        params: *params,
        growth,
        entities: run.final_population.len(),
        mechanisms: config,
        homogenization_rate: h,
        variance_homogenization: vh,
        drift,
        history: (!no_history).then_some(run.history),
    })
}

// ---------------------------------------------------------------------------
// privacy
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PrivacyOutput {
    seed: u64,
    count: usize,
    pairs: usize,
    mode: PrivacyMode,
    scores: Vec<PrivacyScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    floor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<PrivacyScore>,
}

fn cmd_privacy(
    params: &RunParams,
    pair_count: usize,
    epsilons: &[f64],
    floor: Option<f64>,
    mode: PrivacyMode,
) -> Result<()> {
    if epsilons.is_empty() {
        bail!("at least one --epsilon is required");
    }
    let population = build_population(params, false)?;
    let vectors = population.current_vectors();
    let mut rng = StreamRole::Privacy.rng(params.seed);
    let pairs = sample_pairs(vectors.len(), pair_count, &mut rng);

    let scores = epsilons
        .iter()
        .map(|&eps| evaluate_epsilon(&vectors, &pairs, eps, mode, &mut rng))
        .collect::<drift_core::Result<Vec<_>>>()
        .context("failed to score privacy budget")?;

    let selected = floor.and_then(|f| strongest_passing(&scores, f));
    if floor.is_some() && selected.is_none() {
        tracing::warn!("no privacy budget meets the accuracy floor");
    }

    print_json(&PrivacyOutput {
        seed: params.seed,
        count: params.count,
        pairs: pairs.len(),
        mode,
        scores,
        floor,
        selected,
    })
}

// ---------------------------------------------------------------------------
// ablate
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AblateOutput {
    params: RunParams,
    drift_limit: f64,
    report: AblationReport,
    synergy: SynergyAnalysis,
}

fn cmd_ablate(params: &RunParams, drift_limit: f64) -> Result<()> {
    let population = build_population(params, false)?;
    let variants = mechanism_variants(drift_limit);

    // Every variant replays the same interaction pairs.
    let report = run_ablation(&variants, BASELINE, |config| {
        let mut rng = StreamRole::Evolution.rng(params.seed);
        let options = params.options();
        let run = run_evolution_with(&population, params.months, config, options, &mut rng)?;
        Ok(homogenization_rate(
            &population,
            &run.final_population,
            params.sample_size,
            &mut rng,
        ))
    })
    .context("ablation failed")?;
    let synergy = report
        .synergy(&single_mechanism_names(), ALL_ON)
        .context("synergy analysis failed")?;

    print_json(&AblateOutput {
        params: *params,
        drift_limit,
        report,
        synergy,
    })
}

#[derive(Serialize)]
struct AblatePrivacyOutput {
    seed: u64,
    count: usize,
    pairs: usize,
    epsilon: f64,
    report: AblationReport,
}

fn cmd_ablate_privacy(params: &RunParams, pair_count: usize, epsilon: f64) -> Result<()> {
    let population = build_population(params, false)?;
    let vectors = population.current_vectors();
    let mut rng = StreamRole::Privacy.rng(params.seed);
    let pairs = sample_pairs(vectors.len(), pair_count, &mut rng);

    // Every mode scores the same pairs.
    let report = run_ablation(&privacy_variants(), NO_PRIVACY, |&mode| {
        privacy_loss(&vectors, &pairs, epsilon, mode, &mut rng)
    })
    .context("privacy ablation failed")?;

    print_json(&AblatePrivacyOutput {
        seed: params.seed,
        count: params.count,
        pairs: pairs.len(),
        epsilon,
        report,
    })
}
