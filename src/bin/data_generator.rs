use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::info;
use polars::prelude::*;
use std::{fs, path::PathBuf};

use anyhow::Result;
use rand::{prelude::*, seq::index};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use supply_chain_twin::config::{CAPACITY_FILE, DEMAND_FILE, LANES_FILE};
use supply_chain_twin::csv_parser;

/// (dc_id, city, lat, lon)
const DC_SEEDS: [(&str, &str, f64, f64); 13] = [
    ("DFC_LOCUSTGROVE_GA", "Locust Grove", 33.345, -84.104),
    ("DFC_PERRIS_CA", "Perris", 33.782, -117.228),
    ("DFC_TROY_OH", "Troy", 40.039, -84.203),
    ("DFC_DALLAS_TX", "Dallas", 32.776, -96.797),
    ("DFC_EASTPOINT_GA", "East Point", 33.678, -84.439),
    ("FDC_DALLAS_TX", "Dallas", 32.776, -96.797),
    ("FDC_SPARROWSPOINT_MD", "Sparrows Point", 39.218, -76.495),
    ("PRO_DETROIT_MI", "Detroit", 42.331, -83.046),
    ("PRO_LOSANGELES_CA", "Los Angeles", 34.054, -118.243),
    ("PRO_SANANTONIO_TX", "San Antonio", 29.424, -98.494),
    ("FL_WESTPALMBEACH_FL", "West Palm Beach", 26.715, -80.053),
    ("FL_MIAMI_FL", "Miami", 25.762, -80.192),
    ("FL_FORTMYERS_FL", "Fort Myers", 26.640, -81.872),
];

/// (metro, macro region, lat, lon)
const METROS: [(&str, &str, f64, f64); 27] = [
    ("Seattle-Tacoma, WA", "West", 47.606, -122.332),
    ("Portland, OR", "West", 45.515, -122.679),
    ("San Francisco, CA", "West", 37.774, -122.419),
    ("Los Angeles, CA", "West", 34.054, -118.243),
    ("San Diego, CA", "West", 32.716, -117.161),
    ("Phoenix, AZ", "Southwest", 33.448, -112.074),
    ("Las Vegas, NV", "Southwest", 36.170, -115.140),
    ("Denver, CO", "Southwest", 39.739, -104.990),
    ("Minneapolis, MN", "Midwest", 44.978, -93.265),
    ("Chicago, IL", "Midwest", 41.878, -87.629),
    ("Detroit, MI", "Midwest", 42.331, -83.046),
    ("Columbus, OH", "Midwest", 39.961, -82.999),
    ("Cincinnati, OH", "Midwest", 39.103, -84.512),
    ("St. Louis, MO", "Midwest", 38.627, -90.199),
    ("Boston, MA", "Northeast", 42.360, -71.058),
    ("New York, NY", "Northeast", 40.713, -74.006),
    ("Philadelphia, PA", "Northeast", 39.952, -75.165),
    ("Baltimore, MD", "Northeast", 39.290, -76.612),
    ("Charlotte, NC", "Southeast", 35.227, -80.843),
    ("Atlanta, GA", "Southeast", 33.749, -84.388),
    ("Orlando, FL", "Southeast", 28.538, -81.379),
    ("Tampa, FL", "Southeast", 27.950, -82.457),
    ("Miami, FL", "Southeast", 25.762, -80.192),
    ("Dallas, TX", "South", 32.776, -96.797),
    ("Houston, TX", "South", 29.760, -95.369),
    ("San Antonio, TX", "South", 29.424, -98.494),
    ("Nashville, TN", "South", 36.162, -86.781),
];

const EARTH_RADIUS_MILES: f64 = 3958.8;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
struct DataGeneratorConfig {
    seed: u64,
    out_dir: PathBuf,
    stores_per_metro: usize,
    store_demand_mean: f64,
    store_demand_std: f64,
    min_store_demand: f64,
    dc_capacity_mean: f64,
    dc_capacity_std: f64,
    min_dc_capacity: f64,
    rate_per_mile: f64,
    handling_cost: f64,
    /// Duplicate rows, blank cells and sloppy ids like a real export.
    messy: bool,
}

impl Default for DataGeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            out_dir: PathBuf::from("data/raw"),
            stores_per_metro: 4,
            store_demand_mean: 3200.0,
            store_demand_std: 850.0,
            min_store_demand: 700.0,
            dc_capacity_mean: 65_000.0,
            dc_capacity_std: 12_000.0,
            min_dc_capacity: 30_000.0,
            rate_per_mile: 0.30,
            handling_cost: 2.0,
            messy: true,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the json config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to write demand.csv, capacity.csv and lanes.csv to
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    #[arg(short, long)]
    seed: Option<u64>,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

struct GeneratedData {
    demand: DataFrame,
    capacity: DataFrame,
    lanes: DataFrame,
}

type Row = Vec<Option<String>>;

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity.log_level_filter())
        .init();
    let mut config: DataGeneratorConfig = match &args.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => DataGeneratorConfig::default(),
    };
    if let Some(out_dir) = args.out_dir {
        config.out_dir = out_dir;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let GeneratedData {
        mut demand,
        mut capacity,
        mut lanes,
    } = generate_data(&config)?;
    fs::create_dir_all(&config.out_dir)?;
    csv_parser::df_to_csv(&mut demand, &config.out_dir.join(DEMAND_FILE))?;
    csv_parser::df_to_csv(&mut capacity, &config.out_dir.join(CAPACITY_FILE))?;
    csv_parser::df_to_csv(&mut lanes, &config.out_dir.join(LANES_FILE))?;
    info!(
        "Wrote {} demand, {} capacity and {} lane rows to {}",
        demand.height(),
        capacity.height(),
        lanes.height(),
        config.out_dir.display()
    );
    Ok(())
}

fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let a = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lon2 - lon1) / 2.0).sin().powi(2);
    EARTH_RADIUS_MILES * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Truck days at 45 mph and 8 driving hours a day, at least one.
fn service_days(miles: f64) -> f64 {
    (miles / 45.0 / 8.0).max(1.0)
}

fn region_id(metro: &str) -> String {
    metro
        .split(',')
        .next()
        .unwrap_or(metro)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_uppercase()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn frame(columns: &[&str], rows: &[Row]) -> PolarsResult<DataFrame> {
    DataFrame::new(
        columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Series::new(name, rows.iter().map(|row| row[i].clone()).collect::<Vec<_>>())
            })
            .collect(),
    )
}

/// Sloppy casing and padding that the cleaner normalizes away.
fn scuff_id(rng: &mut ChaCha8Rng, row: &mut Row) {
    if rng.gen_bool(0.2) {
        if let Some(id) = row[0].as_mut() {
            *id = format!(" {} ", id.to_lowercase());
        }
    }
}

/// Blank `column` in `count` random rows, then append exact copies of a few
/// rows. Blanking first keeps each copy identical to the row it repeats.
fn make_messy(
    rng: &mut ChaCha8Rng,
    rows: &mut Vec<Row>,
    column: Option<usize>,
    count: usize,
) {
    if let Some(column) = column {
        for idx in index::sample(rng, rows.len(), count.min(rows.len())) {
            rows[idx][column] = None;
        }
    }
    for row in rows.iter_mut() {
        scuff_id(rng, row);
    }
    let copies = (rows.len() / 40).max(1);
    for _ in 0..copies {
        let idx = rng.gen_range(0..rows.len());
        rows.push(rows[idx].clone());
    }
}

fn generate_data(config: &DataGeneratorConfig) -> Result<GeneratedData> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let store_demand = Normal::new(config.store_demand_mean, config.store_demand_std)?;
    let dc_capacity = Normal::new(config.dc_capacity_mean, config.dc_capacity_std)?;
    let cost_noise = Normal::new(0.0, 0.25)?;

    let dcs = DC_SEEDS
        .iter()
        .map(|(dc_id, city, lat, lon)| {
            let lat = lat + rng.gen_range(-0.05..0.05);
            let lon = lon + rng.gen_range(-0.05..0.05);
            let capacity = dc_capacity.sample(&mut rng).round().max(config.min_dc_capacity);
            (*dc_id, *city, lat, lon, capacity)
        })
        .collect::<Vec<_>>();
    let regions = METROS
        .iter()
        .map(|(metro, macro_region, lat, lon)| {
            let demand: f64 = (0..config.stores_per_metro)
                .map(|_| store_demand.sample(&mut rng).round().max(config.min_store_demand))
                .sum();
            (region_id(metro), *metro, *macro_region, *lat, *lon, demand)
        })
        .collect::<Vec<_>>();

    let mut capacity_rows: Vec<Row> = dcs
        .iter()
        .map(|(dc_id, city, lat, lon, capacity)| {
            vec![
                Some(dc_id.to_string()),
                Some(capacity.to_string()),
                Some(city.to_string()),
                Some(format!("{lat:.4}")),
                Some(format!("{lon:.4}")),
            ]
        })
        .collect();
    let mut demand_rows: Vec<Row> = regions
        .iter()
        .map(|(region_id, metro, macro_region, _, _, demand)| {
            vec![
                Some(region_id.clone()),
                Some(demand.to_string()),
                Some(metro.to_string()),
                Some(macro_region.to_string()),
            ]
        })
        .collect();
    let mut lane_rows: Vec<Row> = Vec::with_capacity(dcs.len() * regions.len());
    for (dc_id, _, dc_lat, dc_lon, _) in &dcs {
        for (region_id, _, _, lat, lon, _) in &regions {
            let miles = haversine_miles(*dc_lat, *dc_lon, *lat, *lon);
            let cost = config.rate_per_mile * miles
                + config.handling_cost
                + cost_noise.sample(&mut rng);
            lane_rows.push(vec![
                Some(dc_id.to_string()),
                Some(region_id.clone()),
                Some(round2(cost.max(0.10)).to_string()),
                Some(round2(service_days(miles)).to_string()),
                Some(round2(miles).to_string()),
            ]);
        }
    }

    if config.messy {
        make_messy(&mut rng, &mut capacity_rows, Some(1), 2);
        make_messy(&mut rng, &mut demand_rows, Some(1), 3);
        make_messy(&mut rng, &mut lane_rows, None, 0);
    }

    Ok(GeneratedData {
        demand: frame(&["region_id", "demand", "metro", "macro_region"], &demand_rows)?,
        capacity: frame(&["dc_id", "capacity", "city", "lat", "lon"], &capacity_rows)?,
        lanes: frame(
            &["dc_id", "region_id", "unit_cost", "service_time", "distance_mi"],
            &lane_rows,
        )?,
    })
}
