//! Dealer Catalog - dealership vehicle inventory
//!
//! Command line front end: serves the JSON API, lists and edits the catalog and
//! imports listings from an external source.

use clap::{Args as ClapArgs, Parser, Subcommand};
use dealer_catalog::import_source::fetch_candidates_or_empty;
use dealer_catalog::models::{BodyType, Condition, FuelType, Transmission};
use dealer_catalog::query::available_count;
use dealer_catalog::seed::seed_vehicles;
use dealer_catalog::{
    query, CatalogStore, FileImportSource, FilterSet, HttpImportSource, ImportPolicy, Range,
    SortKey, SourceFilter, SqliteCatalog, VehicleRecord,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Dealership vehicle catalog - inventory store, shopper queries and listing import
#[derive(Parser, Debug)]
#[command(name = "dealer_catalog")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, global = true, default_value_t = default_db_path())]
    database: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// List available vehicles
    List(ListArgs),
    /// Show one vehicle as JSON
    Show { id: String },
    /// Import listings, skipping VINs already in inventory
    Import(ImportArgs),
    /// Remove vehicles whose VIN repeats an earlier one
    Dedup,
    /// Delete a vehicle
    Delete { id: String },
    /// Print inventory statistics
    Stats,
}

#[derive(ClapArgs, Debug)]
struct ListArgs {
    /// Match against "make model year", case-insensitive
    #[arg(long, default_value = "")]
    search: String,

    /// price-low, price-high, year-new, year-old or mileage-low
    #[arg(long, default_value_t = SortKey::PriceLow)]
    sort: SortKey,

    #[arg(long)]
    make: Option<String>,
    #[arg(long)]
    condition: Option<Condition>,
    #[arg(long)]
    body_type: Option<BodyType>,
    #[arg(long)]
    transmission: Option<Transmission>,
    #[arg(long)]
    fuel_type: Option<FuelType>,

    #[arg(long)]
    min_price: Option<f64>,
    #[arg(long)]
    max_price: Option<f64>,
    #[arg(long)]
    min_year: Option<u16>,
    #[arg(long)]
    max_year: Option<u16>,
    #[arg(long)]
    min_mileage: Option<u32>,
    #[arg(long)]
    max_mileage: Option<u32>,
}

impl ListArgs {
    fn filters(&self) -> FilterSet {
        fn range<T>(min: Option<T>, max: Option<T>) -> Option<Range<T>> {
            (min.is_some() || max.is_some()).then_some(Range { min, max })
        }

        FilterSet {
            make: self.make.clone(),
            condition: self.condition,
            body_type: self.body_type,
            transmission: self.transmission,
            fuel_type: self.fuel_type,
            price: range(self.min_price, self.max_price),
            year: range(self.min_year, self.max_year),
            mileage: range(self.min_mileage, self.max_mileage),
        }
    }
}

#[derive(ClapArgs, Debug)]
struct ImportArgs {
    /// Listing service endpoint
    #[arg(long, env = "DEALER_IMPORT_URL")]
    source_url: Option<String>,

    /// Read listings from a JSON file instead of the listing service
    #[arg(long)]
    from_file: Option<PathBuf>,

    /// Dealer page the listing service should read
    #[arg(long, default_value = "https://www.freedomchevydallas.com/used-vehicles/")]
    listing_url: String,

    #[arg(long, default_value = "Chevrolet")]
    make: String,

    #[arg(long, default_value = "used")]
    condition: String,

    /// Reject candidates that fail validation instead of defaulting bad fields
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Listing service request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

/// Returns the default database path: ~/.local/share/dealer_catalog/catalog.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dealer_catalog")
        .join("catalog.db")
        .to_string_lossy()
        .to_string()
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let db_path = PathBuf::from(&args.database);
    log::debug!("Database path: {}", db_path.display());

    let store = match open_store(&db_path) {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to open catalog: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args.command, store).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn open_store(db_path: &std::path::Path) -> dealer_catalog::Result<CatalogStore<SqliteCatalog>> {
    let backend = SqliteCatalog::open(db_path)?;
    let mut store = CatalogStore::new(backend, seed_vehicles()?);
    store.load()?;
    Ok(store)
}

async fn run(command: Command, mut store: CatalogStore<SqliteCatalog>) -> CliResult {
    match command {
        Command::Serve { port } => {
            dealer_catalog::web::serve(Arc::new(Mutex::new(store)), port).await?;
        }
        Command::List(list) => {
            let results = query(store.records(), &list.filters(), &list.search, list.sort);
            for vehicle in &results {
                print_row(vehicle);
            }
            println!(
                "{} of {} available vehicles",
                results.len(),
                available_count(store.records())
            );
        }
        Command::Show { id } => match store.get(&id) {
            Some(vehicle) => println!("{}", serde_json::to_string_pretty(&vehicle)?),
            None => return Err(dealer_catalog::CatalogError::NotFound(id).into()),
        },
        Command::Import(import) => run_import(import, &mut store).await?,
        Command::Dedup => {
            let removed = store.deduplicate()?;
            println!("Removed {} duplicate vehicles", removed);
        }
        Command::Delete { id } => {
            if store.delete(&id)? {
                println!("Deleted vehicle {}", id);
            } else {
                println!("No vehicle with id {}", id);
            }
        }
        Command::Stats => {
            let stats = store.stats();
            println!("Total vehicles:  {}", stats.total);
            println!("Available:       {}", stats.available);
            println!("New / used:      {} / {}", stats.new, stats.used);
            println!("Inventory value: ${:.0}", stats.total_value);
            println!("Average price:   ${:.0}", stats.average_price);
        }
    }
    Ok(())
}

async fn run_import(import: ImportArgs, store: &mut CatalogStore<SqliteCatalog>) -> CliResult {
    let filter = SourceFilter {
        listing_url: import.listing_url.clone(),
        make: Some(import.make.clone()),
        condition: Some(import.condition.clone()),
    };

    let (candidates, notice) = if let Some(path) = &import.from_file {
        fetch_candidates_or_empty(&FileImportSource::new(path), &filter).await?
    } else if let Some(url) = &import.source_url {
        let source =
            HttpImportSource::with_timeout(url, Duration::from_secs(import.timeout_secs))?;
        fetch_candidates_or_empty(&source, &filter).await?
    } else {
        return Err(
            "No import source: pass --source-url or --from-file, or set DEALER_IMPORT_URL".into(),
        );
    };

    if let Some(notice) = notice {
        println!("{}", notice);
    }

    let policy = if import.strict {
        ImportPolicy::Strict
    } else {
        ImportPolicy::BestEffort
    };
    let outcome = store.import(candidates, policy)?;

    for vehicle in &outcome.to_import {
        print!("imported  ");
        print_row(vehicle);
    }
    for skipped in &outcome.skipped {
        println!(
            "skipped   {} {} (VIN {}): {}",
            skipped.candidate.make, skipped.candidate.model, skipped.candidate.vin, skipped.reason
        );
    }
    println!(
        "Imported {} vehicles, skipped {}",
        outcome.to_import.len(),
        outcome.skipped.len()
    );
    Ok(())
}

fn print_row(vehicle: &VehicleRecord) {
    println!(
        "{:<36}  {} {} {:<16}  {:>9}  {:>7} mi  {}",
        vehicle.id,
        vehicle.year,
        vehicle.make,
        vehicle.model,
        format!("${:.0}", vehicle.price),
        vehicle.mileage,
        vehicle.vin
    );
}
