//! CLI for folio paged time-series collections.
//!
//! Operates on a file-backed store directory. Series ids are strings and
//! values are arbitrary JSON documents.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand, ValueEnum};
use folio::config::DEFAULT_PAGE_SIZE;
use folio::{Collection, CollectionConfig, DataPoint, FileBackend, JsonCodec};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

type Store = Collection<String, JsonCodec<Value>, FileBackend<String>>;

/// folio: paged append-only time-series collections CLI.
#[derive(Parser)]
#[command(name = "folio", version, about)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options selecting the store and collection.
#[derive(Args)]
struct StoreArgs {
    /// Path to the store directory.
    #[arg(long, global = true, default_value = "./folio_store")]
    store: PathBuf,

    /// Collection name.
    #[arg(long, global = true, default_value = "default")]
    collection: String,

    /// Byte budget for newly created pages.
    #[arg(long, global = true, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Collection config as a JSON file; replaces --collection and --page-size.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create an empty series.
    Create {
        /// Series id.
        series: String,
    },

    /// Append a JSON value to a series.
    Append {
        /// Series id.
        series: String,

        /// JSON value, e.g. '42' or '{"temp": 21.5}'.
        value: String,

        /// Timestamp in nanoseconds since the Unix epoch (defaults to now).
        #[arg(long)]
        timestamp: Option<u64>,
    },

    /// Replace the value of the newest entry of a series.
    Update {
        /// Series id.
        series: String,

        /// JSON value.
        value: String,
    },

    /// Print the entries of a series within a time range.
    Range {
        /// Series id.
        series: String,

        /// Only entries from this far back (e.g., "1h", "30m", "7d").
        #[arg(long, conflicts_with_all = ["min", "max"])]
        last: Option<String>,

        /// Lower bound in nanoseconds, inclusive.
        #[arg(long)]
        min: Option<u64>,

        /// Upper bound in nanoseconds, inclusive.
        #[arg(long)]
        max: Option<u64>,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Print the newest entry of a series.
    Latest {
        /// Series id.
        series: String,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Display series and page layout of a collection.
    Inspect {
        /// Only show the pages of this series.
        series: Option<String>,
    },
}

/// Output format for query results.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON array of objects.
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = open(&cli.store).and_then(|store| match cli.command {
        Commands::Create { series } => cmd_create(&store, &series),
        Commands::Append {
            series,
            value,
            timestamp,
        } => cmd_append(&store, &series, &value, timestamp),
        Commands::Update { series, value } => cmd_update(&store, &series, &value),
        Commands::Range {
            series,
            last,
            min,
            max,
            format,
        } => cmd_range(&store, &series, last.as_deref(), min, max, &format),
        Commands::Latest { series, format } => cmd_latest(&store, &series, &format),
        Commands::Inspect { series } => cmd_inspect(&store, &cli.store.store, series.as_deref()),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Opens the collection named on the command line.
fn open(args: &StoreArgs) -> Result<Store, Box<dyn std::error::Error>> {
    tracing::debug!(
        store = %args.store.display(),
        collection = %args.collection,
        "opening collection"
    );
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => CollectionConfig::new(args.collection.as_str(), args.page_size)?,
    };
    let backend = FileBackend::open(&args.store)?;
    Ok(Collection::new(backend, JsonCodec::new(), config)?)
}

/// Reads a collection config from a JSON file.
fn load_config(path: &Path) -> Result<CollectionConfig, Box<dyn std::error::Error>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config '{}': {e}", path.display()))?;
    let config: CollectionConfig = serde_json::from_str(&data)?;
    config.validate()?;
    Ok(config)
}

/// Implements `folio create <series>`.
fn cmd_create(store: &Store, series: &str) -> Result<(), Box<dyn std::error::Error>> {
    store.create_series(&series.to_string(), now_ns()?)?;
    println!("Created series '{series}' in '{}'", store.config().name);
    Ok(())
}

/// Implements `folio append <series> <value>`.
fn cmd_append(
    store: &Store,
    series: &str,
    value: &str,
    timestamp: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let value: Value = serde_json::from_str(value)?;
    let timestamp = match timestamp {
        Some(ts) => ts,
        None => now_ns()?,
    };

    store.append(&series.to_string(), timestamp, &value)?;
    println!("{timestamp}");
    Ok(())
}

/// Implements `folio update <series> <value>`.
fn cmd_update(store: &Store, series: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let value: Value = serde_json::from_str(value)?;
    store.update(&series.to_string(), &value)?;
    Ok(())
}

/// Implements `folio range <series>`.
fn cmd_range(
    store: &Store,
    series: &str,
    last: Option<&str>,
    min: Option<u64>,
    max: Option<u64>,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let (min_ns, max_ns) = match last {
        Some(last) => {
            let now = now_ns()?;
            (now.saturating_sub(parse_duration(last)?), now)
        }
        None => (min.unwrap_or(0), max.unwrap_or(u64::MAX)),
    };

    let data = store.range(&series.to_string(), min_ns, max_ns)?;
    print_points(store, series, &data, format)
}

/// Implements `folio latest <series>`.
fn cmd_latest(
    store: &Store,
    series: &str,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let latest = store
        .latest(&series.to_string())?
        .ok_or_else(|| format!("Series '{series}' has no entries"))?;
    print_points(store, series, &[latest], format)
}

/// Implements `folio inspect [series]`.
fn cmd_inspect(
    store: &Store,
    store_path: &Path,
    series: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = store.config();
    println!("Store: {}", store_path.display());
    println!("Collection: {}", config.name);
    println!("  Page size: {} bytes", config.page_size);
    println!(
        "  Layout: header={} bytes, per slot={} bytes + value",
        config.layout.header_overhead, config.layout.timestamp_overhead
    );
    println!();

    let ids = match series {
        Some(id) => vec![id.to_string()],
        None => store.series()?,
    };
    println!("Series: {}", ids.len());

    for id in &ids {
        let pages = store.pages(id)?;
        let entries: usize = pages.iter().map(|p| p.filled).sum();
        let latest = store.latest(id)?.map(|p| p.timestamp);
        println!();
        println!("  - {id}: {entries} entries in {} pages", pages.len());
        if let Some(ts) = latest {
            println!("    Latest: {ts}");
        }

        // Page detail only when a single series is requested
        if series.is_some() {
            for (i, page) in pages.iter().enumerate() {
                println!(
                    "    Page {i}: {} [{}, {}] {}/{} slots, padding={}",
                    page.page_id,
                    page.start_time,
                    page.end_time,
                    page.filled,
                    page.capacity,
                    page.padding
                );
            }
        }
    }

    Ok(())
}

fn print_points(
    store: &Store,
    series: &str,
    data: &[DataPoint],
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Csv => {
            println!("# series={series}, points={}", data.len());
            println!("timestamp_ns,value");
            for point in data {
                let value = point.decode(store.codec())?;
                println!("{},{value}", point.timestamp);
            }
        }
        OutputFormat::Json => {
            let points = data
                .iter()
                .map(|point| {
                    Ok(serde_json::json!({
                        "timestamp_ns": point.timestamp,
                        "value": point.decode(store.codec())?,
                    }))
                })
                .collect::<Result<Vec<_>, folio::error::CodecError>>()?;
            let output = serde_json::json!({
                "series": series,
                "points": points,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Current time in nanoseconds since the Unix epoch.
fn now_ns() -> Result<u64, Box<dyn std::error::Error>> {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
    Ok(u64::try_from(nanos)?)
}

/// Parses a human-readable duration string into nanoseconds.
///
/// Supports suffixes: s (seconds), m (minutes), h (hours), d (days).
fn parse_duration(s: &str) -> Result<u64, Box<dyn std::error::Error>> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Empty duration string".into());
    }

    let (split, _) = s
        .char_indices()
        .last()
        .ok_or_else(|| format!("Invalid duration: '{s}'"))?;
    let (num_str, suffix) = s.split_at(split);
    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("Invalid duration: '{s}'"))?;

    let unit: u64 = match suffix {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => return Err(format!("Unknown duration suffix '{suffix}' in '{s}'. Use s, m, h, or d.").into()),
    };

    num.checked_mul(unit)
        .and_then(|secs| secs.checked_mul(1_000_000_000))
        .ok_or_else(|| format!("Duration too large: '{s}'").into())
}
