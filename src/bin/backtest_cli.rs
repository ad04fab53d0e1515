//! Thin CLI boundary over `callcast_backtest` (§6). Argument parsing and
//! wiring only — every decision of substance lives in the library.

use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use callcast_backtest::engine::{
    ArtifactStore, BacktestError, Call, EngineConfig, ExitCode,
    Fees, FixedTpSl, Interval, Policy, Run, RunConfig, RunId, RunStrategy, TimeCap, TrailingStop,
};
use callcast_backtest::engine::optimizer::{FeasibilityConstraints, Optimizer, ParamGrid};
use callcast_backtest::engine::store::alert_store::{AlertQuery, AlertStore, SqliteAlertStore};
use callcast_backtest::engine::store::candle_store::InMemoryCandleStore;

#[derive(Parser)]
#[command(name = "backtest", about = "Offline quantitative backtesting engine")]
struct Cli {
    /// Path to the alert store database exposing `canon.alerts_std`.
    #[arg(long, env = "DUCKDB_PATH")]
    duckdb_path: String,

    /// Path to a JSON fixture of `{token_address, chain, interval, candles}[]`
    /// standing in for the production columnar candle warehouse (§6: this
    /// crate ships the Candle Store trait plus an in-memory implementation;
    /// a real connection is deployment-specific and out of scope here).
    #[arg(long, env = "CANDLE_FIXTURE_PATH")]
    candle_fixture: PathBuf,

    /// Optional sqlite path to persist/read run artifacts; in-memory if omitted.
    #[arg(long, env = "RUN_ARTIFACT_DB")]
    artifact_db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// `backtest run --strategy <mode> --interval <i> --from <ts> --to <ts> ...`
    Run(RunArgs),
    /// `backtest policy --policy-json <path> ...`
    Policy(PolicyArgs),
    /// `backtest optimize --caller <name> --max-stop-out-rate ... ...`
    Optimize(OptimizeArgs),
    /// `backtest baseline --from <ts> --to <ts> --horizon-hours <n> ...`
    Baseline(BaselineArgs),
    /// `backtest v1-baseline --initial-capital <usd> ...`
    V1Baseline(V1BaselineArgs),
    /// `backtest callers --run-id <id> --sort <field>`
    Callers(LeaderboardArgs),
    /// `backtest leaderboard [--run-id <id>]`
    Leaderboard(LeaderboardArgs),
    /// `backtest truth-leaderboard --run-id <id>`
    TruthLeaderboard(LeaderboardArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    #[arg(long)]
    strategy: String,
    #[arg(long)]
    interval: String,
    #[arg(long)]
    from: i64,
    #[arg(long)]
    to: i64,
    #[arg(long, default_value_t = 0.0)]
    taker_fee_bps: f64,
    #[arg(long, default_value_t = 0.0)]
    slippage_bps: f64,
    #[arg(long)]
    caller: Option<String>,
}

#[derive(clap::Args)]
struct PolicyArgs {
    #[arg(long)]
    policy_json: PathBuf,
    #[arg(long)]
    interval: String,
    #[arg(long)]
    from: i64,
    #[arg(long)]
    to: i64,
    #[arg(long, default_value_t = 0.0)]
    taker_fee_bps: f64,
    #[arg(long, default_value_t = 0.0)]
    slippage_bps: f64,
}

#[derive(clap::Args)]
struct OptimizeArgs {
    #[arg(long)]
    caller: Option<String>,
    #[arg(long)]
    interval: String,
    #[arg(long)]
    from: i64,
    #[arg(long)]
    to: i64,
    #[arg(long, value_delimiter = ',')]
    tp_mults: Vec<f64>,
    #[arg(long, value_delimiter = ',')]
    sl_mults: Vec<f64>,
    #[arg(long, value_delimiter = ',')]
    max_hold_hours: Vec<f64>,
    #[arg(long, default_value_t = 1.0)]
    max_stop_out_rate: f64,
    #[arg(long, default_value_t = -100_000.0)]
    max_p95_drawdown_bps: f64,
    #[arg(long, default_value_t = i64::MAX)]
    max_time_exposed_ms: i64,
}

#[derive(clap::Args)]
struct BaselineArgs {
    #[arg(long)]
    from: i64,
    #[arg(long)]
    to: i64,
    #[arg(long)]
    horizon_hours: f64,
    #[arg(long, default_value_t = 300)]
    interval_seconds: u32,
    #[arg(long)]
    threads: Option<usize>,
    #[arg(long, default_value_t = 0.80)]
    min_coverage_pct: f64,
}

#[derive(clap::Args)]
struct V1BaselineArgs {
    #[arg(long)]
    from: i64,
    #[arg(long)]
    to: i64,
    #[arg(long, default_value_t = 10_000.0)]
    initial_capital: f64,
    #[arg(long, default_value_t = 0.5)]
    max_allocation_pct: f64,
    #[arg(long, default_value_t = 5)]
    max_concurrent_positions: usize,
}

#[derive(clap::Args)]
struct LeaderboardArgs {
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long, default_value = "median-return-bps")]
    sort: String,
}

#[tokio::main]
async fn main() -> ProcessExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match dispatch(cli).await {
        Ok(output) => {
            println!("{output}");
            ProcessExitCode::from(ExitCode::Success as u8)
        }
        Err(err) => {
            let code = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<BacktestError>())
                .map(|bte| bte.exit_code())
                .unwrap_or(ExitCode::Operational);
            tracing::error!("{err:?}");
            ProcessExitCode::from(code as u8)
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<String> {
    let alert_store = SqliteAlertStore::open(&cli.duckdb_path).context("opening alert store")?;
    let candle_store = load_candle_fixture(&cli.candle_fixture).context("loading candle fixture")?;
    let artifact_store = match &cli.artifact_db {
        Some(path) => ArtifactStore::open(path).context("opening artifact store")?,
        None => ArtifactStore::in_memory().context("opening in-memory artifact store")?,
    };

    match cli.command {
        Command::Run(args) => run_command(&alert_store, &candle_store, &artifact_store, args).await,
        Command::Policy(args) => policy_command(&alert_store, &candle_store, &artifact_store, args).await,
        Command::Optimize(args) => optimize_command(&alert_store, &candle_store, args).await,
        Command::Baseline(args) => baseline_command(&alert_store, &candle_store, &artifact_store, args).await,
        Command::V1Baseline(args) => v1_baseline_command(&alert_store, &candle_store, &artifact_store, args).await,
        Command::Callers(args) | Command::Leaderboard(args) | Command::TruthLeaderboard(args) => {
            leaderboard_command(&artifact_store, args)
        }
    }
}

async fn run_command(
    alert_store: &SqliteAlertStore,
    candle_store: &InMemoryCandleStore,
    artifact_store: &ArtifactStore,
    args: RunArgs,
) -> anyhow::Result<String> {
    let interval = Interval::parse(&args.interval)
        .ok_or_else(|| BacktestError::Configuration(format!("unknown interval {}", args.interval)))?;
    let strategy = parse_strategy(&args.strategy)?;
    let calls = load_calls(alert_store, args.from, args.to, args.caller).await?;
    let fees = Fees { taker_bps: args.taker_fee_bps, slippage_bps: args.slippage_bps };

    let config = RunConfig {
        calls,
        interval,
        entry_delay_ms: 0,
        indicator_warmup_candles: 0,
        horizon_candles: 288,
        strategy,
        fees,
        engine: EngineConfig::from_env(),
    };
    execute_and_persist(config, candle_store, artifact_store).await
}

async fn policy_command(
    alert_store: &SqliteAlertStore,
    candle_store: &InMemoryCandleStore,
    artifact_store: &ArtifactStore,
    args: PolicyArgs,
) -> anyhow::Result<String> {
    let interval = Interval::parse(&args.interval)
        .ok_or_else(|| BacktestError::Configuration(format!("unknown interval {}", args.interval)))?;
    let policy_bytes = std::fs::read(&args.policy_json).context("reading --policy-json")?;
    let policy: Policy = serde_json::from_slice(&policy_bytes).context("parsing --policy-json")?;
    let calls = load_calls(alert_store, args.from, args.to, None).await?;
    let fees = Fees { taker_bps: args.taker_fee_bps, slippage_bps: args.slippage_bps };

    let config = RunConfig {
        calls,
        interval,
        entry_delay_ms: 0,
        indicator_warmup_candles: 0,
        horizon_candles: 288,
        strategy: RunStrategy::Policy(policy),
        fees,
        engine: EngineConfig::from_env(),
    };
    execute_and_persist(config, candle_store, artifact_store).await
}

async fn optimize_command(
    alert_store: &SqliteAlertStore,
    candle_store: &InMemoryCandleStore,
    args: OptimizeArgs,
) -> anyhow::Result<String> {
    use callcast_backtest::engine::planner::{Planner, PlannerInputs};
    use callcast_backtest::engine::coverage::CoverageChecker;
    use callcast_backtest::engine::slice::SliceMaterializer;

    let interval = Interval::parse(&args.interval)
        .ok_or_else(|| BacktestError::Configuration(format!("unknown interval {}", args.interval)))?;
    let calls = load_calls(alert_store, args.from, args.to, args.caller).await?;
    let engine_config = EngineConfig::from_env();

    let plan = Planner::plan(&PlannerInputs {
        calls,
        interval,
        entry_delay_ms: 0,
        indicator_warmup_candles: 0,
        horizon_candles: 288,
    })?;
    let eligibility = CoverageChecker::check(&plan, candle_store, engine_config.min_coverage_pct).await?;
    let slice = SliceMaterializer::materialize(&plan, &eligibility, candle_store).await?;

    let grid = ParamGrid {
        tp_mults: args.tp_mults,
        sl_mults: args.sl_mults,
        max_hold_hours: args.max_hold_hours.into_iter().filter(|h| *h > 0.0).collect(),
    };
    let constraints = FeasibilityConstraints {
        max_stop_out_rate: args.max_stop_out_rate,
        max_p95_drawdown_bps: args.max_p95_drawdown_bps,
        max_time_exposed_ms: args.max_time_exposed_ms,
    };
    let fees = Fees { taker_bps: 0.0, slippage_bps: 0.0 };
    let report = Optimizer::run(&plan.per_call_window, &slice, &grid, &constraints, fees, engine_config.activity_move_pct)?;
    Ok(serde_json::to_string_pretty(&report)?)
}

async fn baseline_command(
    alert_store: &SqliteAlertStore,
    candle_store: &InMemoryCandleStore,
    artifact_store: &ArtifactStore,
    args: BaselineArgs,
) -> anyhow::Result<String> {
    let interval = Interval::parse(if args.interval_seconds == 60 { "1m" } else { "5m" })
        .ok_or_else(|| BacktestError::Configuration("baseline requires a 60s or 300s interval".to_string()))?;
    let calls = load_calls(alert_store, args.from, args.to, None).await?;
    let horizon_candles = (args.horizon_hours * 3_600.0 / interval.seconds_per_bar() as f64).ceil() as u32;

    if let Some(threads) = args.threads {
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }

    let config = RunConfig {
        calls,
        interval,
        entry_delay_ms: 0,
        indicator_warmup_candles: 0,
        horizon_candles,
        strategy: RunStrategy::PathOnly,
        fees: Fees { taker_bps: 0.0, slippage_bps: 0.0 },
        engine: EngineConfig { min_coverage_pct: args.min_coverage_pct, ..EngineConfig::from_env() },
    };
    execute_and_persist(config, candle_store, artifact_store).await
}

async fn v1_baseline_command(
    alert_store: &SqliteAlertStore,
    candle_store: &InMemoryCandleStore,
    artifact_store: &ArtifactStore,
    args: V1BaselineArgs,
) -> anyhow::Result<String> {
    use callcast_backtest::engine::capital::{AdmissionDecision, CapitalAwareConfig, CapitalPool};

    let calls = load_calls(alert_store, args.from, args.to, None).await?;
    let mut pool = CapitalPool::new(CapitalAwareConfig {
        initial_capital: args.initial_capital,
        max_allocation_pct: args.max_allocation_pct,
        max_risk_per_trade_usd: args.initial_capital * args.max_allocation_pct,
        max_concurrent_positions: args.max_concurrent_positions,
        min_executable_size_usd: 10.0,
    });

    let mut admitted: Vec<Call> = Vec::new();
    let mut sorted_calls = calls;
    sorted_calls.sort_by(|a, b| (a.call_timestamp, &a.call_id).cmp(&(b.call_timestamp, &b.call_id)));
    for call in &sorted_calls {
        let size = args.initial_capital * args.max_allocation_pct / args.max_concurrent_positions as f64;
        if pool.admit(&call.call_id, size, call.call_timestamp) == AdmissionDecision::Admitted {
            admitted.push(call.clone());
        }
    }

    let config = RunConfig {
        calls: admitted,
        interval: Interval::FiveMinutes,
        entry_delay_ms: 0,
        indicator_warmup_candles: 0,
        horizon_candles: 288,
        strategy: RunStrategy::Policy(Policy::FixedTpSl(FixedTpSl::new(2.0, 0.5))),
        fees: Fees { taker_bps: 0.0, slippage_bps: 0.0 },
        engine: EngineConfig::from_env(),
    };
    execute_and_persist(config, candle_store, artifact_store).await
}

fn leaderboard_command(artifact_store: &ArtifactStore, args: LeaderboardArgs) -> anyhow::Result<String> {
    let run_id_str = args
        .run_id
        .or_else(|| artifact_store.recent_run_ids(1).ok().and_then(|ids| ids.into_iter().next()))
        .ok_or_else(|| BacktestError::Configuration("no run id given and no runs persisted".to_string()))?;
    let run_id = parse_run_id(&run_id_str)?;
    let artifact = artifact_store
        .get(&run_id)?
        .ok_or_else(|| BacktestError::Configuration(format!("no run artifact for {run_id_str}")))?;

    let mut leaderboard = artifact.leaderboard.unwrap_or_default();
    resort(&mut leaderboard.rows, &args.sort)?;
    Ok(serde_json::to_string_pretty(&leaderboard)?)
}

fn resort(
    rows: &mut [callcast_backtest::engine::CallerLeaderboardRow],
    field: &str,
) -> Result<(), BacktestError> {
    match field {
        "median-return-bps" => rows.sort_by(|a, b| b.median_return_bps.total_cmp(&a.median_return_bps)),
        "hit-rate" => rows.sort_by(|a, b| b.hit_rate.total_cmp(&a.hit_rate)),
        "call-count" => rows.sort_by(|a, b| b.call_count.cmp(&a.call_count)),
        "p95-drawdown-bps" => rows.sort_by(|a, b| b.p95_drawdown_bps.total_cmp(&a.p95_drawdown_bps)),
        "p95-return-bps" => rows.sort_by(|a, b| b.p95_return_bps.total_cmp(&a.p95_return_bps)),
        "stop-out-rate" => rows.sort_by(|a, b| b.stop_out_rate.total_cmp(&a.stop_out_rate)),
        other => return Err(BacktestError::Configuration(format!("unknown --sort field '{other}'"))),
    }
    Ok(())
}

async fn execute_and_persist(
    config: RunConfig,
    candle_store: &InMemoryCandleStore,
    artifact_store: &ArtifactStore,
) -> anyhow::Result<String> {
    let run_id = RunId::generate();
    let started_at_ms = chrono::Utc::now().timestamp_millis();
    // `Run::execute` takes its manifest timestamps as plain arguments rather
    // than reading the wall clock itself (§9: no clock reads on the replay
    // hot path), so the true finish time is stamped here once the future
    // resolves rather than threaded in ahead of time.
    let mut output = Run::execute(config, candle_store, run_id, started_at_ms, started_at_ms).await?;
    output.manifest.finished_at = chrono::Utc::now().timestamp_millis();

    let artifact = callcast_backtest::engine::artifact_store::RunArtifact {
        manifest: output.manifest.clone(),
        path_metrics: output.path_metrics.clone(),
        policy_results: output.policy_results.clone(),
        leaderboard: output.leaderboard.clone(),
    };
    if let Err(e) = artifact_store.persist(&artifact) {
        tracing::warn!("could not persist run artifact: {e}");
    }

    if !output.diagnostics.is_empty() {
        tracing::warn!("{} calls failed during replay (excluded={})", output.diagnostics.len(), output.excluded_count);
    }
    Ok(serde_json::to_string_pretty(&output)?)
}

async fn load_calls(
    alert_store: &SqliteAlertStore,
    from: i64,
    to: i64,
    caller: Option<String>,
) -> Result<Vec<Call>, BacktestError> {
    alert_store.query_calls(&AlertQuery { from, to, caller, limit: None }).await
}

fn parse_strategy(s: &str) -> Result<RunStrategy, BacktestError> {
    if s == "path-only" {
        return Ok(RunStrategy::PathOnly);
    }
    Ok(RunStrategy::Policy(parse_policy(s)?))
}

fn parse_policy(s: &str) -> Result<Policy, BacktestError> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        ["fixed-tp-sl", tp, sl] => Ok(Policy::FixedTpSl(FixedTpSl::new(parse_f64(tp)?, parse_f64(sl)?))),
        ["trailing-stop", arm_at, trail_pct] => {
            Ok(Policy::TrailingStop(TrailingStop::new(parse_f64(arm_at)?, parse_f64(trail_pct)?)))
        }
        ["time-cap", hours] => Ok(Policy::TimeCap(TimeCap::new((parse_f64(hours)? * 3_600_000.0) as i64))),
        _ => Err(BacktestError::Configuration(format!("unrecognized strategy mode '{s}'"))),
    }
}

fn parse_f64(s: &str) -> Result<f64, BacktestError> {
    s.parse().map_err(|_| BacktestError::Configuration(format!("expected a number, got '{s}'")))
}

fn parse_run_id(s: &str) -> Result<RunId, BacktestError> {
    s.parse::<uuid::Uuid>()
        .map(RunId)
        .map_err(|e| BacktestError::Configuration(format!("invalid run id '{s}': {e}")))
}

/// Load candles from the JSON fixture documented on `--candle-fixture`.
fn load_candle_fixture(path: &PathBuf) -> Result<InMemoryCandleStore, BacktestError> {
    #[derive(serde::Deserialize)]
    struct FixtureRow {
        token_address: String,
        chain: String,
        interval: String,
        candles: Vec<callcast_backtest::engine::Candle>,
    }

    let bytes = std::fs::read(path)
        .map_err(|e| BacktestError::Configuration(format!("reading candle fixture {}: {e}", path.display())))?;
    let rows: Vec<FixtureRow> = serde_json::from_slice(&bytes)
        .map_err(|e| BacktestError::Configuration(format!("parsing candle fixture {}: {e}", path.display())))?;

    let mut store = InMemoryCandleStore::new();
    for row in rows {
        let interval = Interval::parse(&row.interval)
            .ok_or_else(|| BacktestError::Configuration(format!("unknown interval '{}' in fixture", row.interval)))?;
        store.insert(row.token_address, row.chain, interval, row.candles);
    }
    Ok(store)
}
