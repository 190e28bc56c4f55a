//! CLI entry point for ParkSense.
//!
//! Provides subcommands for availability reports, alerts, search, nearest
//! carpark queries, policy simulation, CSV/S3 export, and a watch loop that
//! tracks availability over time.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use parksense::alerts::{AlertLevel, AlertThresholds};
use parksense::analyzers::analyzer::generate_report;
use parksense::analyzers::writetos3::{upload_file_to_s3, write_json_to_s3};
use parksense::config::Settings;
use parksense::dataset::{Agency, Dataset, LotType, RawCarpark, Status};
use parksense::fetch::auth::ApiKey;
use parksense::fetch::{BasicClient, HttpClient, fetch_bytes, fetch_carparks};
use parksense::history::DEFAULT_MAX_SNAPSHOTS;
use parksense::output::{
    append_record, json_report, print_json, print_pretty, text_report, write_dataset_csv,
};
use parksense::parser::parse_carparks;
use parksense::search::{
    CarparkFilter, DEFAULT_MIN_AVAILABILITY, DEFAULT_NEAREST_COUNT, POPULAR_LOCATIONS,
    find_in_radius, find_nearest, lookup_location, search,
};
use parksense::session::Session;
use parksense::simulator::model::PolicySimulator;
use parksense::simulator::types::InterventionKind;
use parksense::simulator::{PolicyScenario, compare_scenarios};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "parksense")]
#[command(about = "Carpark availability analytics", long_about = None)]
struct Cli {
    /// Path to a saved JSON payload or URL to fetch (default: live DataMall endpoint)
    #[arg(short, long, global = true, value_name = "FILE_OR_URL")]
    source: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze current availability and print a report
    Report {
        /// Report format: json or text
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Optional: S3 bucket to upload the analysis JSON to
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Restrict the report to carparks in this area (e.g. "Marina")
        #[arg(long)]
        area: Option<String>,
    },
    /// Evaluate alert rules against current availability
    Alerts,
    /// Search carparks by name and attributes
    Search {
        /// Case-insensitive substring of the development name
        query: Option<String>,

        /// Agency codes to include (HDB, LTA, URA)
        #[arg(short, long)]
        agency: Vec<String>,

        /// Statuses to include (Available, Moderate, Limited)
        #[arg(long)]
        status: Vec<String>,

        /// Lot type codes to include (C, H, Y)
        #[arg(long)]
        lot_type: Vec<String>,

        /// Areas to include
        #[arg(long)]
        area: Vec<String>,

        #[arg(long, default_value_t = 0)]
        min_lots: u32,

        #[arg(long)]
        max_lots: Option<u32>,

        /// Maximum number of rows to print
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
    },
    /// Find the nearest carparks with free lots
    Nearest {
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,

        /// Named landmark to search from (see `places`)
        #[arg(short, long, conflicts_with_all = ["lat", "lon"])]
        place: Option<String>,

        /// Number of results (ignored with --radius)
        #[arg(short = 'n', long, default_value_t = DEFAULT_NEAREST_COUNT)]
        count: usize,

        /// Minimum available lots
        #[arg(long, default_value_t = DEFAULT_MIN_AVAILABILITY)]
        min_lots: u32,

        /// Only carparks run by this agency
        #[arg(short, long)]
        agency: Option<String>,

        /// Return every carpark within this many kilometres instead
        #[arg(short, long)]
        radius: Option<f64>,
    },
    /// Run what-if policy simulations
    Simulate {
        #[command(subcommand)]
        policy: SimulateCommand,
    },
    /// Export the current dataset to CSV, optionally uploading it to S3
    Export {
        /// CSV file to write
        #[arg(long, default_value = "carparks.csv")]
        csv: String,

        /// Optional: S3 bucket name to upload the CSV to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Optional: Gzip compress the CSV before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Repeatedly fetch, analyze, alert and track availability
    Watch {
        /// Sample rate: fetch every X seconds
        #[arg(short = 'r', long, default_value_t = 60)]
        sample_rate: u64,

        /// Number of samples to collect (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 1)]
        num_samples: usize,

        /// Snapshots kept in the trend buffer
        #[arg(long, default_value_t = DEFAULT_MAX_SNAPSHOTS)]
        max_snapshots: usize,

        /// Optional: CSV file to append one row per snapshot to
        #[arg(long)]
        history_csv: Option<String>,
    },
    /// List the landmarks accepted by `nearest --place`
    Places,
}

#[derive(Subcommand)]
enum SimulateCommand {
    /// Change parking prices by PERCENT
    Pricing {
        #[arg(allow_hyphen_values = true)]
        percent: f64,

        #[arg(short, long)]
        agency: Option<String>,
    },
    /// Change capacity by PERCENT
    Capacity {
        #[arg(allow_hyphen_values = true)]
        percent: f64,

        #[arg(short, long)]
        agency: Option<String>,
    },
    /// Run a preset URA intervention: pricing, capacity or mixed
    Intervention { kind: String },
    /// Run the preset scenarios and rank them by stress relief
    Compare,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/parksense.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("parksense.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let source = cli.source.as_deref();

    match cli.command {
        Commands::Report {
            format,
            output,
            s3_bucket,
            area,
        } => {
            let dataset = load_dataset(source, &settings).await?;
            let dataset = match area {
                Some(area) => {
                    let records: Vec<_> = dataset.area(&area).cloned().collect();
                    info!(area = %area, carparks = records.len(), "Report restricted to area");
                    Dataset::from_records(records, dataset.fetch_time())
                }
                None => dataset,
            };
            let analysis = generate_report(&dataset);
            let now = Utc::now();

            let rendered = match format.as_str() {
                "json" => json_report(&dataset, &analysis, now)?,
                "text" => text_report(&dataset.summary(), now),
                other => anyhow::bail!("Unknown report format '{other}', expected json or text"),
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, &rendered)
                        .with_context(|| format!("failed to write {path}"))?;
                    info!(path = %path, "Report written");
                }
                None => println!("{rendered}"),
            }

            if let Some(bucket) = s3_bucket {
                let s3 = s3_client().await;
                let key = format!(
                    "reports/date={}/analysis-{}.json",
                    now.format("%Y-%m-%d"),
                    now.format("%H%M%S")
                );
                write_json_to_s3(&s3, &bucket, &key, &analysis).await?;
            }
        }
        Commands::Alerts => {
            let dataset = load_dataset(source, &settings).await?;
            let mut session = Session::default();
            let outcome = session.tick(Arc::new(dataset));

            for alert in &outcome.alerts {
                log_alert(alert.level, &alert.title, &alert.message);
            }
            println!("{}", serde_json::to_string_pretty(&outcome.alerts)?);
            print_json(&outcome.alert_summary)?;
        }
        Commands::Search {
            query,
            agency,
            status,
            lot_type,
            area,
            min_lots,
            max_lots,
            limit,
        } => {
            let dataset = load_dataset(source, &settings).await?;

            let statuses = status
                .iter()
                .map(|s| s.parse::<Status>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()?;
            let mut filter = CarparkFilter::new()
                .agencies(agency.iter().map(|a| Agency::from(a.as_str())))
                .statuses(statuses)
                .lot_types(lot_type.iter().map(|l| LotType::from(l.as_str())))
                .areas(area)
                .min_lots(min_lots);
            if let Some(q) = query {
                filter = filter.query(q);
            }
            if let Some(max) = max_lots {
                filter = filter.max_lots(max);
            }

            let hits = search(&dataset, &filter);
            info!(matches = hits.len(), "Search complete");
            let shown: Vec<_> = hits.into_iter().take(limit).collect();
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        Commands::Nearest {
            lat,
            lon,
            place,
            count,
            min_lots,
            agency,
            radius,
        } => {
            let (lat, lon) = match (place, lat, lon) {
                (Some(name), _, _) => {
                    let landmark = lookup_location(&name).with_context(|| {
                        format!("Unknown place '{name}', run `parksense places` for the list")
                    })?;
                    (landmark.lat, landmark.lon)
                }
                (None, Some(lat), Some(lon)) => (lat, lon),
                _ => anyhow::bail!("Provide either --place or both --lat and --lon"),
            };

            let dataset = load_dataset(source, &settings).await?;
            let agency = agency.map(|a| Agency::from(a.as_str()));

            let hits = match radius {
                Some(radius_km) => find_in_radius(&dataset, lat, lon, radius_km, min_lots)?,
                None => find_nearest(&dataset, lat, lon, count, min_lots, agency.as_ref())?,
            };
            info!(lat, lon, results = hits.len(), "Proximity query complete");
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Commands::Simulate { policy } => {
            let dataset = load_dataset(source, &settings).await?;
            let simulator = PolicySimulator::new();

            match policy {
                SimulateCommand::Pricing { percent, agency } => {
                    let agency = agency.map(|a| Agency::from(a.as_str()));
                    let result = simulator.simulate_pricing(&dataset, percent, agency.as_ref());
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                SimulateCommand::Capacity { percent, agency } => {
                    let agency = agency.map(|a| Agency::from(a.as_str()));
                    let result = simulator.simulate_capacity(&dataset, percent, agency.as_ref());
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                SimulateCommand::Intervention { kind } => {
                    let kind: InterventionKind = kind.parse()?;
                    let result = simulator.simulate_intervention(&dataset, kind);
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                SimulateCommand::Compare => {
                    let results = simulator.run_all(&dataset, &PolicyScenario::presets());
                    let comparison = compare_scenarios(&results)?;
                    info!(recommendation = %comparison.recommendation, "Scenarios compared");
                    println!("{}", serde_json::to_string_pretty(&comparison)?);
                }
            }
        }
        Commands::Export {
            csv,
            s3_bucket,
            gzip,
        } => {
            let dataset = load_dataset(source, &settings).await?;
            write_dataset_csv(&csv, &dataset)?;

            if let Some(bucket) = s3_bucket {
                let s3 = s3_client().await;
                let file_name = Path::new(&csv)
                    .file_name()
                    .and_then(OsStr::to_str)
                    .unwrap_or("carparks.csv");
                let key = format!(
                    "carparks/date={}/{}",
                    dataset.fetch_time().format("%Y-%m-%d"),
                    file_name
                );
                let written = upload_file_to_s3(&s3, &bucket, &key, &csv, gzip).await?;
                info!(bucket = %bucket, key = %written, "Export uploaded");
            }
        }
        Commands::Watch {
            sample_rate,
            num_samples,
            max_snapshots,
            history_csv,
        } => {
            watch(
                source,
                &settings,
                sample_rate,
                num_samples,
                max_snapshots,
                history_csv,
            )
            .await?;
        }
        Commands::Places => {
            for landmark in &POPULAR_LOCATIONS {
                println!("{:<16} {:>8.4} {:>9.4}", landmark.name, landmark.lat, landmark.lon);
            }
        }
    }

    Ok(())
}

/// Fetch, tick and record on a fixed cadence. A failed fetch skips that
/// sample; the next one retries.
#[tracing::instrument(skip(settings, history_csv))]
async fn watch(
    source: Option<&str>,
    settings: &Settings,
    sample_rate: u64,
    num_samples: usize,
    max_snapshots: usize,
    history_csv: Option<String>,
) -> Result<()> {
    let mut session = Session::new(max_snapshots, AlertThresholds::default());
    let mut sample_count = 0;

    if num_samples == 0 {
        info!(sample_rate, "Sampling infinitely. Press Ctrl+C to stop.");
    } else {
        info!(num_samples, sample_rate, "Starting sample collection");
    }

    loop {
        // Check if we've reached the sample limit (0 = infinite)
        if num_samples > 0 && sample_count >= num_samples {
            break;
        }
        sample_count += 1;

        match load_dataset(source, settings).await {
            Ok(dataset) => {
                let outcome = session.tick(Arc::new(dataset));

                for alert in &outcome.alerts {
                    log_alert(alert.level, &alert.title, &alert.message);
                }

                let change = outcome.availability_change;
                info!(
                    sample = sample_count,
                    total_available = outcome.snapshot.total_available,
                    stressed = outcome.snapshot.stressed_count,
                    change = change.change,
                    percent = change.percent,
                    trend = %change.direction,
                    "Sample recorded"
                );
                for trend in session.tracker().agency_trends() {
                    debug!(
                        agency = %trend.agency,
                        start = trend.start,
                        current = trend.current,
                        trend = trend.trend.arrow(),
                        "Agency trend"
                    );
                }

                if let Some(path) = &history_csv {
                    if let Err(e) = append_record(path, &outcome.snapshot.to_row()) {
                        error!(error = %e, path = %path, "Failed to append snapshot row");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, sample = sample_count, "Fetch failed, skipping sample");
            }
        }

        // If not the last sample, wait before next iteration
        if num_samples == 0 || sample_count < num_samples {
            info!(sample_rate, "Waiting before next sample");
            tokio::time::sleep(tokio::time::Duration::from_secs(sample_rate)).await;
        }
    }

    info!(
        snapshots = session.tracker().len(),
        capacity = session.tracker().max_snapshots(),
        "Finished sampling"
    );
    Ok(())
}

/// Loads raw records from a local file, an explicit URL, or the live endpoint.
#[tracing::instrument(skip(settings))]
async fn load_dataset(source: Option<&str>, settings: &Settings) -> Result<Dataset> {
    let raw = match source {
        Some(path) if !path.starts_with("http") => {
            let bytes = std::fs::read(path).with_context(|| format!("failed to read {path}"))?;
            parse_carparks(&bytes)?
        }
        Some(url) => {
            let client = BasicClient::new(settings.timeout)?;
            match settings.api_key.as_deref() {
                Some(key) => fetch_single(&ApiKey::account_key(client, key)?, url).await?,
                None => fetch_single(&client, url).await?,
            }
        }
        None => {
            let key = settings.require_api_key()?;
            let client = ApiKey::account_key(BasicClient::new(settings.timeout)?, key)?;
            fetch_carparks(&client, &settings.carpark_url(), settings.page_size).await?
        }
    };

    let dataset = Dataset::from_raw(raw, Utc::now());
    print_pretty(&dataset.summary());
    Ok(dataset)
}

async fn fetch_single<C: HttpClient>(client: &C, url: &str) -> Result<Vec<RawCarpark>> {
    let bytes = fetch_bytes(client, url).await?;
    parse_carparks(&bytes)
}

async fn s3_client() -> aws_sdk_s3::Client {
    let config = aws_config::load_from_env().await;
    aws_sdk_s3::Client::new(&config)
}

fn log_alert(level: AlertLevel, title: &str, message: &str) {
    match level {
        AlertLevel::Critical => error!(%level, title, message, "Alert"),
        AlertLevel::Warning => warn!(%level, title, message, "Alert"),
        AlertLevel::Info => info!(%level, title, message, "Alert"),
    }
}
