use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use std::path::{Path, PathBuf};
use tickscope_analysis::align::{align_streams, align_with_cex};
use tickscope_analysis::distance::wasserstein_distance;
use tickscope_analysis::liquidity::{adjust_snapshot_file, reconstruct};
use tickscope_analysis::tick_price::{price_from_tick, tick_from_price};
use tickscope_analysis::verify::verify_directory;
use tickscope_chart::{
    assemble_gif, collect_bar_frames, render_bar_chart, render_compare_chart, render_line_chart,
    LiquiditySeries,
};
use tickscope_data::coinbase::CoinbaseClient;
use tickscope_data::events::{fetch_liquidity_events, net_deltas};
use tickscope_data::rpc::RpcPoolScanner;
use tickscope_data::snapshots::{
    append_cex_observation, read_cex_csv, read_liquidity_csv, snapshot_files, write_events_csv,
    write_liquidity_csv,
};
use tickscope_data::subgraph::{SubgraphClient, UNISWAP_V3_SUBGRAPH_ID};
use tickscope_data::types::{LiquidityRow, PoolConfig, PoolSnapshot, TickSource};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct AppContext {
    graph_api_key: Option<String>,
    rpc_url: Option<String>,
    data_dir: PathBuf,
}

#[derive(Parser, Debug)]
#[command(name = "tickscope")]
#[command(about = "Uniswap V3 liquidity snapshots vs. CEX price, as CSVs and charts")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Root directory for snapshots and charts (env: TICKSCOPE_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Fetch(FetchArgs),
    Events(EventsArgs),
    FetchCex(FetchCexArgs),
    Adjust(AdjustArgs),
    Chart(ChartArgs),
    Compare(CompareArgs),
    Verify(VerifyArgs),
    Animate(AnimateArgs),
    Refresh(RefreshArgs),
    Status(StatusArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FetchSource {
    /// Paginated GraphQL from The Graph gateway.
    Subgraph,
    /// Direct `eth_call` tick scan against an RPC node.
    Rpc,
}

/// Arguments for the `fetch` subcommand.
///
/// Snapshots one pool's tick table and writes `liquidity_data_<ts>.csv` with
/// the clamped cumulative column already computed.
#[derive(Args, Debug)]
struct FetchArgs {
    /// Pool contract address.
    #[arg(long)]
    pool: String,

    /// Short pool label; defaults to a prefix of the address.
    #[arg(long)]
    name: Option<String>,

    /// Combined decimal-adjustment exponent D of the pair.
    #[arg(long, default_value_t = 12)]
    decimal_exponent: u32,

    #[arg(long, value_enum, default_value = "subgraph")]
    source: FetchSource,

    /// Subgraph deployment id (subgraph source only).
    #[arg(long, default_value = UNISWAP_V3_SUBGRAPH_ID)]
    subgraph_id: String,

    /// Tick-spacing steps probed each side of the current tick (rpc source).
    #[arg(long, default_value_t = 1000)]
    tick_radius: i32,

    /// Output directory; defaults to <data-dir>/<name>.
    #[arg(long)]
    csv_dir: Option<PathBuf>,
}

/// Arguments for the `events` subcommand.
///
/// Scans Mint/Burn logs over a block range and writes the event CSV plus a
/// net-delta summary table.
#[derive(Args, Debug)]
struct EventsArgs {
    /// Pool contract address.
    #[arg(long)]
    pool: String,

    #[arg(long)]
    from_block: u64,

    #[arg(long)]
    to_block: u64,

    /// Output directory; defaults to <data-dir>/events.
    #[arg(long)]
    csv_dir: Option<PathBuf>,
}

/// Arguments for the `fetch-cex` subcommand.
#[derive(Args, Debug)]
struct FetchCexArgs {
    /// Coinbase product, e.g. ETH-USD.
    #[arg(long, default_value = "ETH-USD")]
    product: String,

    /// CEX CSV path; defaults to <data-dir>/cex/<product>_prices.csv.
    #[arg(long)]
    cex_csv: Option<PathBuf>,

    /// Backfill one candle per existing snapshot timestamp instead of
    /// sampling the current spot price.
    #[arg(long)]
    backfill: bool,

    /// Snapshot directory supplying backfill timestamps.
    #[arg(long, required_if_eq("backfill", "true"))]
    snapshots_dir: Option<PathBuf>,
}

/// Arguments for the `adjust` subcommand.
///
/// Recomputes the clamped cumulative column of every snapshot in a directory.
#[derive(Args, Debug)]
struct AdjustArgs {
    #[arg(long)]
    csv_dir: PathBuf,

    #[arg(long)]
    dest_dir: PathBuf,
}

/// Arguments for the `chart` subcommand.
#[derive(Args, Debug)]
struct ChartArgs {
    #[arg(long)]
    csv_dir: PathBuf,

    #[arg(long)]
    charts_dir: PathBuf,

    /// CEX price CSV for the overlay marker; omit to chart without one.
    #[arg(long)]
    cex_csv: Option<PathBuf>,

    #[arg(long, default_value_t = 12)]
    decimal_exponent: u32,

    /// Pool/CEX match tolerance in seconds.
    #[arg(long, default_value_t = 600)]
    tolerance: u64,

    /// Label shown on chart panels.
    #[arg(long, default_value = "Pool")]
    label: String,
}

/// Arguments for the `compare` subcommand.
#[derive(Args, Debug)]
struct CompareArgs {
    #[arg(long)]
    dir_a: PathBuf,

    #[arg(long)]
    dir_b: PathBuf,

    #[arg(long)]
    charts_dir: PathBuf,

    #[arg(long)]
    cex_csv: Option<PathBuf>,

    #[arg(long, default_value_t = 12)]
    decimal_exponent: u32,

    #[arg(long, default_value_t = 600)]
    tolerance: u64,

    #[arg(long, default_value = "0.05 Pool")]
    label_a: String,

    #[arg(long, default_value = "0.3 Pool")]
    label_b: String,
}

/// Arguments for the `verify` subcommand.
///
/// Scans snapshot directories for stored negative cumulative liquidity.
#[derive(Args, Debug)]
struct VerifyArgs {
    #[arg(long, required = true)]
    csv_dir: Vec<PathBuf>,
}

/// Arguments for the `animate` subcommand.
#[derive(Args, Debug)]
struct AnimateArgs {
    /// Charts directory containing the barCharts/ frames.
    #[arg(long)]
    charts_dir: PathBuf,

    /// Output GIF; defaults to <charts-dir>/liquidity_animation.gif.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = 1000)]
    frame_ms: u32,
}

/// Arguments for the `refresh` subcommand.
///
/// The pipeline trigger: CEX spot sample, then fetch + chart for each pool,
/// every step error-isolated.
#[derive(Args, Debug)]
struct RefreshArgs {
    /// Pool to refresh, `label=address` or bare address. Repeatable.
    #[arg(long, required = true)]
    pool: Vec<String>,

    #[arg(long, default_value = "ETH-USD")]
    product: String,

    #[arg(long, default_value_t = 12)]
    decimal_exponent: u32,

    #[arg(long, default_value_t = 600)]
    tolerance: u64,
}

/// Arguments for the `status` subcommand.
#[derive(Args, Debug)]
struct StatusArgs {}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let data_dir = cli
        .data_dir
        .or_else(|| std::env::var("TICKSCOPE_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("data"));

    let ctx = AppContext {
        graph_api_key: std::env::var("TICKSCOPE_GRAPH_API_KEY").ok(),
        rpc_url: std::env::var("TICKSCOPE_RPC_URL").ok(),
        data_dir,
    };

    match cli.command {
        Commands::Fetch(args) => handle_fetch(&ctx, args).await,
        Commands::Events(args) => handle_events(&ctx, args).await,
        Commands::FetchCex(args) => handle_fetch_cex(&ctx, args).await,
        Commands::Adjust(args) => handle_adjust(&ctx, args).await,
        Commands::Chart(args) => handle_chart(&ctx, args).await,
        Commands::Compare(args) => handle_compare(&ctx, args).await,
        Commands::Verify(args) => handle_verify(&ctx, args).await,
        Commands::Animate(args) => handle_animate(&ctx, args).await,
        Commands::Refresh(args) => handle_refresh(&ctx, args).await,
        Commands::Status(args) => handle_status(&ctx, args).await,
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Per-unit failure collector for batch commands.
///
/// Failures are logged where they happen; this aggregates them so a batch run
/// ends with one summary instead of a scroll of interleaved errors.
struct BatchSummary {
    label: &'static str,
    processed: usize,
    failures: Vec<(String, String)>,
}

impl BatchSummary {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            processed: 0,
            failures: Vec::new(),
        }
    }

    fn note_ok(&mut self) {
        self.processed += 1;
    }

    fn note_failure(&mut self, unit: impl Into<String>, error: &eyre::Report) {
        let unit = unit.into();
        warn!(unit = unit.as_str(), error = %error, "unit failed, continuing");
        self.failures.push((unit, format!("{error:#}")));
    }

    fn print(&self) {
        if self.failures.is_empty() {
            info!(
                command = self.label,
                processed = self.processed,
                "batch completed without failures"
            );
            return;
        }

        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Unit", "Error"]);
        for (unit, error) in &self.failures {
            table.add_row(vec![unit.as_str(), error.as_str()]);
        }
        println!("\n{table}\n");

        warn!(
            command = self.label,
            processed = self.processed,
            failed = self.failures.len(),
            "batch completed with failures"
        );
    }
}

fn short_pool_label(address: &str) -> String {
    let prefix: String = address.chars().take(10).collect();
    format!("pool-{prefix}")
}

/// Splits `label=address` pool specs; a bare address gets a derived label.
fn parse_pool_spec(spec: &str) -> (String, String) {
    match spec.split_once('=') {
        Some((label, address)) => (label.to_string(), address.to_lowercase()),
        None => (short_pool_label(spec), spec.to_lowercase()),
    }
}

fn product_csv_name(product: &str) -> String {
    format!("{}_prices.csv", product.to_lowercase().replace('-', "_"))
}

/// Reconstructs the clamped curve and writes the snapshot CSV.
///
/// Returns the written path and the number of clamp events (non-zero means
/// the fetched tick table was incomplete or misordered).
fn write_snapshot(dir: &Path, snapshot: &PoolSnapshot) -> Result<(PathBuf, usize)> {
    let curve = reconstruct(&snapshot.records);
    let rows: Vec<LiquidityRow> = curve
        .points
        .iter()
        .map(|point| LiquidityRow {
            tick_idx: point.tick_idx,
            liquidity_net: point.liquidity_net.to_string(),
            cumulative_liquidity: point.running.to_string(),
            timestamp: snapshot.timestamp,
            current_tick: snapshot.current_tick,
            pool_id: snapshot.pool_id.clone(),
        })
        .collect();
    let path = write_liquidity_csv(dir, snapshot.timestamp, &rows)?;
    Ok((path, curve.clamp_events))
}

/// Loads one snapshot CSV as a drawable series.
///
/// Stored cumulative values are clamped to zero at this boundary: files
/// written by older unclamped pipelines may still hold negative values, and
/// negative liquidity is never drawn.
fn load_series(path: &Path, label: &str) -> Result<LiquiditySeries> {
    let rows = read_liquidity_csv(path)?;

    let mut points = Vec::with_capacity(rows.len());
    for row in &rows {
        let value: f64 = row
            .cumulative_liquidity
            .trim()
            .parse()
            .map_err(|e| eyre!("bad cumulative_liquidity at tick {}: {e}", row.tick_idx))?;
        points.push((row.tick_idx, value.max(0.0)));
    }
    points.sort_by_key(|(tick, _)| *tick);

    Ok(LiquiditySeries {
        pool_id: rows[0].pool_id.clone(),
        label: label.to_string(),
        timestamp: rows[0].timestamp,
        current_tick: rows[0].current_tick,
        points,
    })
}

/// Loads CEX observations and converts each to its tick-axis equivalent.
///
/// Failures produce an empty overlay rather than aborting: charts without a
/// CEX marker beat no charts at all.
fn load_cex_ticks(path: Option<&Path>, decimal_exponent: u32) -> Vec<(u64, f64)> {
    let Some(path) = path else {
        return Vec::new();
    };

    let observations = match read_cex_csv(path) {
        Ok(observations) => observations,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "CEX CSV unavailable, charts get no overlay");
            return Vec::new();
        }
    };

    observations
        .iter()
        .filter_map(|obs| match tick_from_price(&obs.price, decimal_exponent) {
            Ok(tick) => Some((obs.timestamp, tick.to_f64())),
            Err(e) => {
                warn!(ts = obs.timestamp, price = obs.price.as_str(), error = %e, "skipping bad CEX price");
                None
            }
        })
        .collect()
}

/// Largest stored cumulative liquidity across a batch, for a stable y-axis.
fn batch_max_liquidity(files: &[(u64, PathBuf)]) -> f64 {
    let mut max = 0.0f64;
    for (_, path) in files {
        let Ok(rows) = read_liquidity_csv(path) else {
            continue;
        };
        for row in &rows {
            if let Ok(value) = row.cumulative_liquidity.trim().parse::<f64>() {
                max = max.max(value);
            }
        }
    }
    max
}

async fn handle_fetch(ctx: &AppContext, args: FetchArgs) -> Result<()> {
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| short_pool_label(&args.pool));
    let pool = PoolConfig {
        name: name.clone(),
        pool_id: args.pool.to_lowercase(),
        decimal_exponent: args.decimal_exponent,
    };
    let csv_dir = args
        .csv_dir
        .clone()
        .unwrap_or_else(|| ctx.data_dir.join(&name));

    let snapshot = match args.source {
        FetchSource::Subgraph => {
            let api_key = ctx.graph_api_key.as_deref().ok_or_else(|| {
                eyre!("TICKSCOPE_GRAPH_API_KEY is required for the subgraph source")
            })?;
            let client = SubgraphClient::new(api_key, &args.subgraph_id)?;
            client.fetch_snapshot(&pool).await?
        }
        FetchSource::Rpc => {
            let rpc_url = ctx
                .rpc_url
                .as_deref()
                .ok_or_else(|| eyre!("TICKSCOPE_RPC_URL is required for the rpc source"))?;
            let scanner = RpcPoolScanner::new(rpc_url, args.tick_radius)?;
            scanner.fetch_snapshot(&pool).await?
        }
    };

    let (path, clamp_events) = write_snapshot(&csv_dir, &snapshot)?;
    if clamp_events > 0 {
        warn!(
            clamp_events,
            "fetched tick table needed clamping; snapshot may be incomplete"
        );
    }

    info!(
        pool = name.as_str(),
        ticks = snapshot.records.len(),
        current_tick = snapshot.current_tick,
        path = %path.display(),
        "fetch command completed"
    );
    Ok(())
}

async fn handle_events(ctx: &AppContext, args: EventsArgs) -> Result<()> {
    let rpc_url = ctx
        .rpc_url
        .as_deref()
        .ok_or_else(|| eyre!("TICKSCOPE_RPC_URL is required for the events command"))?;

    let events =
        fetch_liquidity_events(rpc_url, &args.pool.to_lowercase(), args.from_block, args.to_block)
            .await?;

    let csv_dir = args
        .csv_dir
        .clone()
        .unwrap_or_else(|| ctx.data_dir.join("events"));
    let path = write_events_csv(&csv_dir, args.from_block, args.to_block, &events)?;

    let deltas = net_deltas(&events);
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Tick", "Net Liquidity Delta"]);
    for (tick, delta) in deltas.iter().take(20) {
        table.add_row(vec![tick.to_string(), delta.to_string()]);
    }
    println!("\n{table}\n");
    if deltas.len() > 20 {
        println!("… {} more ticks in {}", deltas.len() - 20, path.display());
    }

    info!(
        events = events.len(),
        ticks_touched = deltas.len(),
        path = %path.display(),
        "events command completed"
    );
    Ok(())
}

async fn handle_fetch_cex(ctx: &AppContext, args: FetchCexArgs) -> Result<()> {
    let cex_csv = args
        .cex_csv
        .clone()
        .unwrap_or_else(|| ctx.data_dir.join("cex").join(product_csv_name(&args.product)));
    let client = CoinbaseClient::new()?;

    if !args.backfill {
        let observation = client.fetch_spot(&args.product).await?;
        append_cex_observation(&cex_csv, &observation)?;
        info!(
            product = args.product.as_str(),
            price = observation.price.as_str(),
            path = %cex_csv.display(),
            "fetch-cex command completed"
        );
        return Ok(());
    }

    let snapshots_dir = args
        .snapshots_dir
        .as_deref()
        .ok_or_else(|| eyre!("--snapshots-dir is required with --backfill"))?;
    let timestamps: Vec<u64> = snapshot_files(snapshots_dir)?
        .into_iter()
        .map(|(ts, _)| ts)
        .collect();
    if timestamps.is_empty() {
        return Err(eyre!(
            "no snapshot files in {} to backfill against",
            snapshots_dir.display()
        ));
    }

    let observations = client.backfill(&args.product, &timestamps).await?;

    if let Some(parent) = cex_csv.parent() {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(&cex_csv)
        .wrap_err_with(|| format!("failed to create {}", cex_csv.display()))?;
    for observation in &observations {
        writer
            .serialize(observation)
            .wrap_err("failed to write CEX row")?;
    }
    writer.flush().wrap_err("failed to flush CSV writer")?;

    info!(
        product = args.product.as_str(),
        samples = observations.len(),
        requested = timestamps.len(),
        path = %cex_csv.display(),
        "fetch-cex backfill completed"
    );
    Ok(())
}

async fn handle_adjust(_ctx: &AppContext, args: AdjustArgs) -> Result<()> {
    let files = snapshot_files(&args.csv_dir)?;
    if files.is_empty() {
        return Err(eyre!("no snapshot files in {}", args.csv_dir.display()));
    }

    let mut summary = BatchSummary::new("adjust");
    let mut total_clamps = 0usize;
    for (_, path) in &files {
        match adjust_snapshot_file(path, &args.dest_dir) {
            Ok(clamps) => {
                total_clamps += clamps;
                summary.note_ok();
            }
            Err(e) => summary.note_failure(path.display().to_string(), &e),
        }
    }
    summary.print();

    info!(
        files = files.len(),
        adjusted = summary.processed,
        clamp_events = total_clamps,
        dest = %args.dest_dir.display(),
        "adjust command completed"
    );
    Ok(())
}

async fn handle_chart(_ctx: &AppContext, args: ChartArgs) -> Result<()> {
    let files = snapshot_files(&args.csv_dir)?;
    if files.is_empty() {
        return Err(eyre!("no snapshot files in {}", args.csv_dir.display()));
    }

    let cex_ticks = load_cex_ticks(args.cex_csv.as_deref(), args.decimal_exponent);
    let aligned = align_with_cex(&files, &cex_ticks, args.tolerance);
    let y_max = batch_max_liquidity(&files);
    let bar_dir = args.charts_dir.join("barCharts");
    let line_dir = args.charts_dir.join("lineCharts");

    let mut summary = BatchSummary::new("chart");
    for record in aligned {
        let Some((_, path)) = record.pool_a else {
            continue;
        };
        let overlay = record.cex.map(|(_, tick)| tick);

        let rendered = load_series(&path, &args.label).and_then(|series| {
            render_bar_chart(&series, overlay, y_max, &bar_dir)?;
            render_line_chart(&series, overlay, y_max, &line_dir)?;
            Ok(())
        });
        match rendered {
            Ok(()) => summary.note_ok(),
            Err(e) => summary.note_failure(path.display().to_string(), &e),
        }
    }
    summary.print();

    info!(
        snapshots = files.len(),
        charted = summary.processed,
        cex_samples = cex_ticks.len(),
        charts_dir = %args.charts_dir.display(),
        "chart command completed"
    );
    Ok(())
}

/// Weighted Wasserstein annotation for a pair of loaded series.
fn compare_annotation(
    left: &LiquiditySeries,
    right: &LiquiditySeries,
    decimal_exponent: u32,
) -> Option<String> {
    let left_ticks: Vec<f64> = left.points.iter().map(|(t, _)| *t as f64).collect();
    let left_weights: Vec<f64> = left.points.iter().map(|(_, w)| *w).collect();
    let right_ticks: Vec<f64> = right.points.iter().map(|(t, _)| *t as f64).collect();
    let right_weights: Vec<f64> = right.points.iter().map(|(_, w)| *w).collect();

    let by_tick = wasserstein_distance(&left_ticks, &left_weights, &right_ticks, &right_weights)?;

    let to_prices = |series: &LiquiditySeries| -> Option<Vec<f64>> {
        series
            .points
            .iter()
            .map(|(tick, _)| price_from_tick(*tick as i64, decimal_exponent).ok())
            .collect()
    };
    let by_price = match (to_prices(left), to_prices(right)) {
        (Some(lp), Some(rp)) => {
            wasserstein_distance(&lp, &left_weights, &rp, &right_weights)
        }
        _ => None,
    };

    Some(match by_price {
        Some(p) => format!("Wasserstein (ticks): {by_tick:.2} | Wasserstein (prices): {p:.6}"),
        None => format!("Wasserstein (ticks): {by_tick:.2}"),
    })
}

async fn handle_compare(_ctx: &AppContext, args: CompareArgs) -> Result<()> {
    let files_a = snapshot_files(&args.dir_a)?;
    let files_b = snapshot_files(&args.dir_b)?;
    if files_a.is_empty() && files_b.is_empty() {
        return Err(eyre!(
            "no snapshot files in {} or {}",
            args.dir_a.display(),
            args.dir_b.display()
        ));
    }

    let cex_ticks = load_cex_ticks(args.cex_csv.as_deref(), args.decimal_exponent);
    let aligned = align_streams(&files_a, &files_b, &cex_ticks, args.tolerance);

    let mut summary = BatchSummary::new("compare");
    for record in aligned {
        let anchor = record.timestamp;
        let overlay = record.cex.map(|(_, tick)| tick);

        let left = match &record.pool_a {
            Some((_, path)) => match load_series(path, &args.label_a) {
                Ok(series) => Some(series),
                Err(e) => {
                    summary.note_failure(path.display().to_string(), &e);
                    None
                }
            },
            None => None,
        };
        let right = match &record.pool_b {
            Some((_, path)) => match load_series(path, &args.label_b) {
                Ok(series) => Some(series),
                Err(e) => {
                    summary.note_failure(path.display().to_string(), &e);
                    None
                }
            },
            None => None,
        };

        let annotation = match (&left, &right) {
            (Some(l), Some(r)) => compare_annotation(l, r, args.decimal_exponent),
            (Some(_), None) => Some(format!(
                "{} not available; Wasserstein metric not available",
                args.label_b
            )),
            (None, Some(_)) => Some(format!(
                "{} not available; Wasserstein metric not available",
                args.label_a
            )),
            (None, None) => continue,
        };

        match render_compare_chart(
            left.as_ref(),
            right.as_ref(),
            overlay,
            annotation.as_deref(),
            &args.charts_dir,
        ) {
            Ok(_) => summary.note_ok(),
            Err(e) => summary.note_failure(format!("snapshot at {anchor}"), &e),
        }
    }
    summary.print();

    info!(
        pool_a = files_a.len(),
        pool_b = files_b.len(),
        charted = summary.processed,
        charts_dir = %args.charts_dir.display(),
        "compare command completed"
    );
    Ok(())
}

async fn handle_verify(_ctx: &AppContext, args: VerifyArgs) -> Result<()> {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["File", "Negative Rows", "Min liquidityNet", "Max liquidityNet"]);

    let mut total_findings = 0usize;
    let mut total_checked = 0usize;
    for dir in &args.csv_dir {
        let report = verify_directory(dir)?;
        total_checked += report.files_checked;
        total_findings += report.findings.len();
        for finding in &report.findings {
            table.add_row(vec![
                finding.path.display().to_string(),
                finding.negative_rows.to_string(),
                finding.min_net.to_string(),
                finding.max_net.to_string(),
            ]);
        }
        for (path, reason) in &report.skipped {
            warn!(path = %path.display(), reason = reason.as_str(), "file skipped during verify");
        }
    }

    if total_findings > 0 {
        println!("\n{table}\n");
        return Err(eyre!(
            "negative cumulative liquidity in {total_findings} file(s) (checked {total_checked})"
        ));
    }

    info!(files_checked = total_checked, "verify command completed: all clean");
    Ok(())
}

async fn handle_animate(_ctx: &AppContext, args: AnimateArgs) -> Result<()> {
    let bar_dir = args.charts_dir.join("barCharts");
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.charts_dir.join("liquidity_animation.gif"));

    let frames = collect_bar_frames(&bar_dir)?;
    let path = assemble_gif(&bar_dir, &output, args.frame_ms)?;

    info!(
        frames = frames.len(),
        path = %path.display(),
        "animate command completed"
    );
    Ok(())
}

async fn handle_refresh(ctx: &AppContext, args: RefreshArgs) -> Result<()> {
    let mut summary = BatchSummary::new("refresh");
    let cex_csv = ctx
        .data_dir
        .join("cex")
        .join(product_csv_name(&args.product));

    // Step 1: CEX spot sample. A failure only costs this round's overlay.
    match CoinbaseClient::new() {
        Ok(client) => match client.fetch_spot(&args.product).await {
            Ok(observation) => match append_cex_observation(&cex_csv, &observation) {
                Ok(()) => summary.note_ok(),
                Err(e) => summary.note_failure("cex-append", &e),
            },
            Err(e) => summary.note_failure("cex-spot", &e),
        },
        Err(e) => summary.note_failure("cex-client", &e),
    }

    let cex_ticks = load_cex_ticks(Some(&cex_csv), args.decimal_exponent);

    // Step 2: fetch + chart per pool, each isolated.
    for spec in &args.pool {
        let (label, address) = parse_pool_spec(spec);
        let pool = PoolConfig {
            name: label.clone(),
            pool_id: address,
            decimal_exponent: args.decimal_exponent,
        };
        let csv_dir = ctx.data_dir.join(&label);
        let charts_dir = csv_dir.join("charts");

        let result = refresh_pool(ctx, &pool, &csv_dir, &charts_dir, &cex_ticks, args.tolerance)
            .await;
        match result {
            Ok(()) => summary.note_ok(),
            Err(e) => summary.note_failure(label, &e),
        }
    }

    summary.print();
    info!(pools = args.pool.len(), "refresh command completed");
    Ok(())
}

/// One pool's fetch → transform → plot round.
async fn refresh_pool(
    ctx: &AppContext,
    pool: &PoolConfig,
    csv_dir: &Path,
    charts_dir: &Path,
    cex_ticks: &[(u64, f64)],
    tolerance: u64,
) -> Result<()> {
    let api_key = ctx
        .graph_api_key
        .as_deref()
        .ok_or_else(|| eyre!("TICKSCOPE_GRAPH_API_KEY is required for refresh"))?;
    let client = SubgraphClient::new(api_key, UNISWAP_V3_SUBGRAPH_ID)?;

    let snapshot = client.fetch_snapshot(pool).await?;
    let (path, clamp_events) = write_snapshot(csv_dir, &snapshot)?;
    if clamp_events > 0 {
        warn!(pool = pool.name.as_str(), clamp_events, "snapshot needed clamping");
    }

    let series = load_series(&path, &pool.name)?;
    let aligned = align_with_cex(&[(snapshot.timestamp, ())], cex_ticks, tolerance);
    let overlay = aligned
        .first()
        .and_then(|record| record.cex.as_ref())
        .map(|(_, tick)| *tick);

    let y_max = batch_max_liquidity(&snapshot_files(csv_dir)?);
    render_bar_chart(&series, overlay, y_max, &charts_dir.join("barCharts"))?;
    render_line_chart(&series, overlay, y_max, &charts_dir.join("lineCharts"))?;
    Ok(())
}

async fn handle_status(ctx: &AppContext, _args: StatusArgs) -> Result<()> {
    let entries = std::fs::read_dir(&ctx.data_dir)
        .wrap_err_with(|| format!("failed to list data directory {}", ctx.data_dir.display()))?;

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Pool Dir", "Snapshots", "First", "Last", "Bar Charts"]);

    let mut pool_dirs = 0usize;
    for entry in entries {
        let entry = entry.wrap_err("failed to read directory entry")?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let Ok(files) = snapshot_files(&path) else {
            continue;
        };
        if files.is_empty() {
            continue;
        }
        pool_dirs += 1;

        let first = files.first().map(|(ts, _)| *ts).unwrap_or(0);
        let last = files.last().map(|(ts, _)| *ts).unwrap_or(0);
        let bar_count = collect_bar_frames(&path.join("charts").join("barCharts"))
            .map(|frames| frames.len())
            .unwrap_or(0);

        table.add_row(vec![
            entry.file_name().to_string_lossy().to_string(),
            files.len().to_string(),
            format_timestamp(first),
            format_timestamp(last),
            bar_count.to_string(),
        ]);
    }

    let cex_dir = ctx.data_dir.join("cex");
    let cex_samples: usize = std::fs::read_dir(&cex_dir)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "csv"))
                .filter_map(|e| read_cex_csv(&e.path()).ok())
                .map(|observations| observations.len())
                .sum()
        })
        .unwrap_or(0);

    println!("\n{table}\n");
    println!("CEX samples on disk: {cex_samples}");

    info!(pool_dirs, cex_samples, "status command completed");
    Ok(())
}

fn format_timestamp(ts: u64) -> String {
    if ts == 0 {
        return "N/A".to_string();
    }
    chrono::DateTime::from_timestamp(ts as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_spec_with_label() {
        let (label, address) = parse_pool_spec("usdc-eth-005=0xABCDEF");
        assert_eq!(label, "usdc-eth-005");
        assert_eq!(address, "0xabcdef");
    }

    #[test]
    fn pool_spec_bare_address() {
        let (label, address) = parse_pool_spec("0x8ad599c3A0ff1De082011EFDDc58f1908eb6e6D8");
        assert_eq!(label, "pool-0x8ad599c3");
        assert_eq!(address, "0x8ad599c3a0ff1de082011efddc58f1908eb6e6d8");
    }

    #[test]
    fn product_csv_name_is_filesystem_safe() {
        assert_eq!(product_csv_name("ETH-USD"), "eth_usd_prices.csv");
    }
}
