use anyhow::{Context, Result};
use business_foresight::config::Config;
use business_foresight::domain::{
    BaselineFinancials, ModelKind, ScenarioParameter, ScenarioParameters, TargetMetric,
    TimeSeriesRecord,
};
use business_foresight::forecast::{ForecastService, ModelCache};
use business_foresight::ml::FileModelStore;
use business_foresight::simulation::{
    sweep, DistributionKind, DistributionSpec, MonteCarloEngine, ParameterDistribution,
    ScenarioEngine,
};
use business_foresight::telemetry::init_tracing;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "foresight", version, about = "Business forecasting and what-if simulation")]
struct Cli {
    /// Configuration file, overlaid with FORESIGHT__* environment variables
    #[arg(long, env = "FORESIGHT_CONFIG", default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Forecast revenue or profit for the days following the history
    Forecast {
        #[arg(long)]
        records: PathBuf,
        #[arg(long, default_value = "revenue")]
        target: TargetMetric,
        #[arg(long, default_value = "tree")]
        model: ModelKind,
        #[arg(long, default_value_t = 7)]
        horizon: usize,
    },
    /// Project the history's totals under a set of deltas
    Scenario {
        #[arg(long)]
        records: PathBuf,
        #[command(flatten)]
        params: ScenarioArgs,
    },
    /// Sample scenarios around the given deltas
    MonteCarlo {
        #[arg(long)]
        records: PathBuf,
        #[command(flatten)]
        params: ScenarioArgs,
        /// Defaults to monte_carlo.default_iterations
        #[arg(long)]
        iterations: Option<usize>,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Defaults to monte_carlo.price_volatility
        #[arg(long)]
        price_std: Option<f64>,
        /// Defaults to monte_carlo.cost_volatility
        #[arg(long)]
        cost_std: Option<f64>,
        #[arg(long, default_value_t = 0.0)]
        volume_std: f64,
        #[arg(long, default_value = "normal")]
        distribution: DistributionKind,
    },
    /// Sweep one parameter and report the projection at each step
    Sensitivity {
        #[arg(long)]
        records: PathBuf,
        #[arg(long)]
        parameter: ScenarioParameter,
        #[arg(long, default_value_t = -0.2, allow_negative_numbers = true)]
        from: f64,
        #[arg(long, default_value_t = 0.2, allow_negative_numbers = true)]
        to: f64,
        #[arg(long, default_value_t = 9)]
        steps: usize,
    },
}

#[derive(Debug, Args)]
struct ScenarioArgs {
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    price: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    cost: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    volume: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    efficiency: f64,
    #[arg(long, default_value_t = 0)]
    expansion: u32,
}

impl From<&ScenarioArgs> for ScenarioParameters {
    fn from(args: &ScenarioArgs) -> Self {
        Self {
            price_delta_pct: args.price,
            cost_delta_pct: args.cost,
            volume_delta_pct: args.volume,
            efficiency_delta_pct: args.efficiency,
            expansion_region_count: args.expansion,
        }
    }
}

fn load_records(path: &Path) -> Result<Vec<TimeSeriesRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read records from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid records in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    let scenario = ScenarioEngine::new(cfg.scenario.clone());

    match cli.command {
        Command::Forecast {
            records,
            target,
            model,
            horizon,
        } => {
            let history = load_records(&records)?;
            let mut service = ForecastService::new(&cfg, Arc::new(ModelCache::new()))?;
            if let Some(dir) = &cfg.store.model_dir {
                service = service.with_store(Arc::new(FileModelStore::new(dir)));
            }
            info!(%target, %model, horizon, records = history.len(), "forecasting");
            let result = service.forecast(&history, target, model, horizon)?;
            print_json(&result)
        }
        Command::Scenario { records, params } => {
            let baseline = BaselineFinancials::from_records(&load_records(&records)?);
            let result = scenario.apply(&baseline, &ScenarioParameters::from(&params))?;
            print_json(&result)
        }
        Command::MonteCarlo {
            records,
            params,
            iterations,
            seed,
            price_std,
            cost_std,
            volume_std,
            distribution,
        } => {
            let baseline = BaselineFinancials::from_records(&load_records(&records)?);
            let dist = |std: f64| ParameterDistribution {
                std,
                kind: distribution,
            };
            let spec = DistributionSpec::default()
                .with(
                    ScenarioParameter::Price,
                    dist(price_std.unwrap_or(cfg.monte_carlo.price_volatility)),
                )
                .with(
                    ScenarioParameter::Cost,
                    dist(cost_std.unwrap_or(cfg.monte_carlo.cost_volatility)),
                )
                .with(ScenarioParameter::Volume, dist(volume_std));

            let engine = MonteCarloEngine::from_config(scenario, &cfg.monte_carlo);
            let summary = engine.run(
                &baseline,
                &ScenarioParameters::from(&params),
                &spec,
                iterations.unwrap_or(cfg.monte_carlo.default_iterations),
                seed,
            )?;
            print_json(&summary)
        }
        Command::Sensitivity {
            records,
            parameter,
            from,
            to,
            steps,
        } => {
            let baseline = BaselineFinancials::from_records(&load_records(&records)?);
            let points = sweep(&scenario, &baseline, parameter, from, to, steps)?;
            print_json(&points)
        }
    }
}
