//! Pinmap CLI - Manage vehicle and cargo pins from the command line
//!
//! Geocodes addresses, applies the daily record-name protocol, and prints
//! the stored markers.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use pinmap_core::geocode::{GeocodeClient, GeocodedAddress};
use pinmap_core::models::{CarType, DayOfWeek, FillLevel, MarkerRecord, Submission};
use pinmap_core::reconcile::{CounterMode, ReconcilerConfig, RetentionPolicy};
use pinmap_core::services::MarkerService;
use pinmap_core::MarkerId;
use serde::Serialize;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "pinmap")]
#[command(about = "Manage vehicle and cargo pins on a map")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// What deletion does and which records listings show
    #[arg(long, value_enum, default_value_t = RetentionArg::Soft)]
    retention: RetentionArg,

    /// How the daily record counter is advanced
    #[arg(long, value_enum, default_value_t = CounterModeArg::Baseline)]
    counter_mode: CounterModeArg,
}

#[derive(Subcommand)]
enum Commands {
    /// Add or update a pin at a geocoded address
    #[command(alias = "new")]
    Add {
        /// Driver or vehicle name
        name: String,
        /// Free-text address to geocode
        address: String,
        /// Cargo description
        #[arg(long)]
        cargo: String,
        /// Vehicle type code
        #[arg(long, value_parser = CarType::from_str)]
        car_type: CarType,
        /// Fill level, 1 to 5
        #[arg(long, value_parser = parse_fill_level, default_value = "1")]
        fill_level: FillLevel,
        /// Weekday the vehicle is at this address
        #[arg(long, value_parser = DayOfWeek::from_str)]
        day: DayOfWeek,
    },
    /// List stored pins
    List {
        /// Include inactive records
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a pin
    Delete {
        /// Marker ID
        id: String,
    },
    /// Resolve an address without storing anything
    Geocode {
        /// Free-text address
        address: String,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] pinmap_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid marker ID: {0}")]
    InvalidMarkerId(String),
    #[error("No geocoding results for address: {0}")]
    AddressNotFound(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum RetentionArg {
    Soft,
    Hard,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CounterModeArg {
    Baseline,
    Transactional,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pinmap=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let config = reconciler_config(cli.retention, cli.counter_mode);

    match cli.command {
        Commands::Add {
            name,
            address,
            cargo,
            car_type,
            fill_level,
            day,
        } => {
            run_add(
                &name, &address, &cargo, car_type, fill_level, day, config, &db_path,
            )
            .await?;
        }
        Commands::List { all, json } => run_list(all, json, config, &db_path).await?,
        Commands::Delete { id } => run_delete(&id, config, &db_path).await?,
        Commands::Geocode { address } => run_geocode(&address).await?,
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_add(
    name: &str,
    address: &str,
    cargo: &str,
    car_type: CarType,
    fill_level: FillLevel,
    day: DayOfWeek,
    config: ReconcilerConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let resolved = geocode_address(address).await?;

    let submission = Submission {
        lat: resolved.lat,
        lon: resolved.lon,
        name: name.to_string(),
        cargo: cargo.to_string(),
        car_type,
        fill_level,
        city: resolved.city,
        day_of_week: day,
    };

    let service = MarkerService::open_path(db_path, config).await?;
    let id = service.submit(&submission).await?;

    let record = service.get(&id).await?;
    match record {
        Some(record) => println!("{} {}", record.id, record.record_name),
        None => println!("{id}"),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct MarkerListItem {
    id: String,
    record_name: String,
    name: String,
    city: String,
    car_type: String,
    day: String,
    cargo: String,
    fill_level: u8,
    active: bool,
}

async fn run_list(
    all: bool,
    as_json: bool,
    config: ReconcilerConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let records = list_markers(all, config, db_path).await?;

    if as_json {
        let items = records
            .iter()
            .map(marker_to_list_item)
            .collect::<Vec<MarkerListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_marker_lines(&records) {
            println!("{line}");
        }
    }

    Ok(())
}

async fn run_delete(id: &str, config: ReconcilerConfig, db_path: &Path) -> Result<(), CliError> {
    let id = id
        .trim()
        .parse::<MarkerId>()
        .map_err(|_| CliError::InvalidMarkerId(id.to_string()))?;

    let service = MarkerService::open_path(db_path, config).await?;
    service.delete(&id).await?;
    println!("{id}");
    Ok(())
}

async fn run_geocode(address: &str) -> Result<(), CliError> {
    let resolved = geocode_address(address).await?;
    println!("{} {} {}", resolved.lat, resolved.lon, resolved.city);
    Ok(())
}

async fn geocode_address(address: &str) -> Result<GeocodedAddress, CliError> {
    let client = match geocode_base_url_from_env() {
        Some(base_url) => GeocodeClient::with_base_url(base_url)?,
        None => GeocodeClient::new()?,
    };

    client
        .lookup(address)
        .await?
        .ok_or_else(|| CliError::AddressNotFound(address.to_string()))
}

async fn list_markers(
    all: bool,
    config: ReconcilerConfig,
    db_path: &Path,
) -> Result<Vec<MarkerRecord>, CliError> {
    let service = MarkerService::open_path(db_path, config).await?;
    if all {
        Ok(service.history().await?)
    } else {
        Ok(service.snapshot().await?)
    }
}

fn format_marker_lines(records: &[MarkerRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let status = if record.active { "" } else { "  (inactive)" };
            format!(
                "{:<13}  {:<20}  {:<18}  {:<10}  {}/5{status}",
                record.record_name,
                record.city,
                record.name,
                record.day_of_week.key(),
                record.fill_level.value()
            )
        })
        .collect()
}

fn marker_to_list_item(record: &MarkerRecord) -> MarkerListItem {
    MarkerListItem {
        id: record.id.to_string(),
        record_name: record.record_name.clone(),
        name: record.name.clone(),
        city: record.city.clone(),
        car_type: record.car_type.to_string(),
        day: record.day_of_week.to_string(),
        cargo: record.cargo.clone(),
        fill_level: record.fill_level.value(),
        active: record.active,
    }
}

fn parse_fill_level(raw: &str) -> Result<FillLevel, String> {
    let value = raw
        .trim()
        .parse::<u8>()
        .map_err(|_| format!("fill level must be a number, got '{raw}'"))?;
    FillLevel::new(value).map_err(|error| error.to_string())
}

const fn reconciler_config(retention: RetentionArg, counter_mode: CounterModeArg) -> ReconcilerConfig {
    ReconcilerConfig {
        retention: match retention {
            RetentionArg::Soft => RetentionPolicy::Soft,
            RetentionArg::Hard => RetentionPolicy::Hard,
        },
        counter_mode: match counter_mode {
            CounterModeArg::Baseline => CounterMode::Baseline,
            CounterModeArg::Transactional => CounterMode::Transactional,
        },
    }
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("PINMAP_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pinmap")
        .join("pinmap.db")
}

fn geocode_base_url_from_env() -> Option<String> {
    let url = env::var("PINMAP_GEOCODE_URL").ok()?;
    if url.trim().is_empty() {
        None
    } else {
        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use pinmap_core::models::{CarType, DayOfWeek, FillLevel, Submission};
    use pinmap_core::reconcile::{ReconcilerConfig, RetentionPolicy};
    use pinmap_core::services::MarkerService;
    use pretty_assertions::assert_eq;

    use super::{
        format_marker_lines, list_markers, marker_to_list_item, parse_fill_level, run_delete,
        CliError, CounterModeArg, RetentionArg,
    };

    fn soft_config() -> ReconcilerConfig {
        super::reconciler_config(RetentionArg::Soft, CounterModeArg::Baseline)
    }

    fn submission(lat: f64, name: &str) -> Submission {
        Submission {
            lat,
            lon: 21.0,
            name: name.to_string(),
            cargo: "Pallets".to_string(),
            car_type: CarType::BlaszakZielonka,
            fill_level: FillLevel::new(2).unwrap(),
            city: "Zielonka".to_string(),
            day_of_week: DayOfWeek::Friday,
        }
    }

    #[test]
    fn parse_fill_level_bounds() {
        assert_eq!(parse_fill_level("3").unwrap(), FillLevel::new(3).unwrap());
        assert_eq!(parse_fill_level(" 5 ").unwrap(), FillLevel::new(5).unwrap());
        assert!(parse_fill_level("0").is_err());
        assert!(parse_fill_level("6").is_err());
        assert!(parse_fill_level("two").is_err());
    }

    #[test]
    fn reconciler_config_maps_args() {
        let config = super::reconciler_config(RetentionArg::Hard, CounterModeArg::Transactional);
        assert_eq!(config.retention, pinmap_core::reconcile::RetentionPolicy::Hard);
        assert_eq!(
            config.counter_mode,
            pinmap_core::reconcile::CounterMode::Transactional
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_markers_filters_inactive_unless_all() {
        let db_path = unique_test_db_path();
        {
            let service = MarkerService::open_path(&db_path, soft_config())
                .await
                .unwrap();
            service.submit(&submission(52.0, "Keep")).await.unwrap();
            let id = service.submit(&submission(53.0, "Drop")).await.unwrap();
            service.delete(&id).await.unwrap();
        }

        let active = list_markers(false, soft_config(), &db_path).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Keep");

        let all = list_markers(true, soft_config(), &db_path).await.unwrap();
        assert_eq!(all.len(), 2);

        cleanup_db_files(&db_path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_delete_soft_deletes_by_id() {
        let db_path = unique_test_db_path();
        let id = {
            let service = MarkerService::open_path(&db_path, soft_config())
                .await
                .unwrap();
            service.submit(&submission(52.0, "Depot")).await.unwrap()
        };

        run_delete(&id.to_string(), soft_config(), &db_path)
            .await
            .unwrap();

        let remaining = list_markers(false, soft_config(), &db_path).await.unwrap();
        assert!(remaining.is_empty());
        let history = list_markers(true, soft_config(), &db_path).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].active);

        cleanup_db_files(&db_path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_delete_rejects_malformed_id() {
        let db_path = unique_test_db_path();

        let error = run_delete("not-a-uuid", soft_config(), &db_path)
            .await
            .unwrap_err();
        assert!(matches!(error, CliError::InvalidMarkerId(_)));

        cleanup_db_files(&db_path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hard_retention_delete_removes_history() {
        let db_path = unique_test_db_path();
        let hard = ReconcilerConfig {
            retention: RetentionPolicy::Hard,
            ..ReconcilerConfig::default()
        };
        let id = {
            let service = MarkerService::open_path(&db_path, hard).await.unwrap();
            service.submit(&submission(52.0, "Depot")).await.unwrap()
        };

        run_delete(&id.to_string(), hard, &db_path).await.unwrap();

        let all = list_markers(true, hard, &db_path).await.unwrap();
        assert!(all.is_empty());

        cleanup_db_files(&db_path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn marker_list_item_carries_display_fields() {
        let db_path = unique_test_db_path();
        let service = MarkerService::open_path(&db_path, soft_config())
            .await
            .unwrap();
        service.submit(&submission(52.0, "Depot")).await.unwrap();

        let records = service.snapshot().await.unwrap();
        let item = marker_to_list_item(&records[0]);
        assert_eq!(item.name, "Depot");
        assert_eq!(item.city, "Zielonka");
        assert_eq!(item.day, "friday");
        assert_eq!(item.fill_level, 2);
        assert!(item.active);
        assert!(item.record_name.ends_with("-001"));

        let lines = format_marker_lines(&records);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Zielonka"));
        assert!(lines[0].contains("2/5"));

        cleanup_db_files(&db_path);
    }

    fn unique_test_db_path() -> PathBuf {
        static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("pinmap-cli-test-{timestamp}-{sequence}.db"))
    }

    fn cleanup_db_files(path: &PathBuf) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
    }
}
