//! route-places CLI - find places along a GPX track
//!
//! Usage:
//!   route-places <track.gpx> [--category fuel --category bakery] [--fuel-km 8]
//!                [--output-dir <dir>] [--mode waypoints|enhanced] [--no-road-routes]
//!
//! Searches OpenStreetMap (Overpass) for the selected categories along the
//! track, prints what it found with the distances between petrol stations,
//! and writes a GPX file next to the input (or into `--output-dir`).
//! Ctrl-C cancels the run.

use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use route_places::gpx_io::{self, OutputMode};
use route_places::{
    spawn_run, Category, FinderConfig, FinderError, PlaceFinder, RunEvent, RunOutcome, RunReport,
    SearchProfile, Track,
};

#[derive(Parser)]
#[command(name = "route-places")]
#[command(about = "Find fuel, food, lodging and speed cameras along a GPX track", long_about = None)]
struct Cli {
    /// GPX file with the track (or route) to search along
    track: PathBuf,

    /// Category to search for; repeat for several (fuel, supermarket, bakery,
    /// cafe, repair, accommodation, speed_camera)
    #[arg(short, long = "category")]
    categories: Vec<String>,

    /// Maximum distance from the route for petrol stations (km)
    #[arg(long)]
    fuel_km: Option<f64>,

    #[arg(long)]
    supermarket_km: Option<f64>,

    #[arg(long)]
    bakery_km: Option<f64>,

    #[arg(long)]
    cafe_km: Option<f64>,

    #[arg(long)]
    repair_km: Option<f64>,

    #[arg(long)]
    accommodation_km: Option<f64>,

    /// Directory for the output GPX (default: next to the input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output flavour
    #[arg(short, long, value_enum, default_value = "waypoints")]
    mode: Mode,

    /// Skip road routes to off-track places
    #[arg(long)]
    no_road_routes: bool,

    /// Concurrent place searches
    #[arg(long)]
    concurrency: Option<usize>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose debug output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Waypoints only
    Waypoints,
    /// Original track with detours to each place, plus waypoints
    Enhanced,
}

impl From<Mode> for OutputMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Waypoints => OutputMode::Waypoints,
            Mode::Enhanced => OutputMode::Enhanced,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(hint) = e.guidance() {
                eprintln!("{hint}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, FinderError> {
    let config = build_config(&cli)?;
    let categories: Vec<Category> = config.profiles.iter().map(SearchProfile::category).collect();

    // Everything that can fail locally is checked before the first request
    let track = gpx_io::read_track(&cli.track)?;
    let output_dir = output_dir(&cli)?;

    let finder = PlaceFinder::from_config(config)?;
    let mut handle = spawn_run(finder, track.clone());
    let cancel = handle.cancel_flag();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => log_event(&event),
                None => break,
            },
            _ = &mut ctrl_c, if !cancel.is_cancelled() => {
                warn!("Cancelling, waiting for in-flight requests...");
                cancel.cancel();
            }
        }
    }

    let report = match handle.wait().await? {
        RunOutcome::Completed(report) => report,
        RunOutcome::Cancelled => {
            println!("Processing cancelled");
            return Ok(ExitCode::from(130));
        }
    };

    print_report(&report);
    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!("Could not serialize report: {e}"),
        }
    }

    let places = report.included_places();
    if places.is_empty() {
        warn!("No places found, no GPX written");
        return Ok(ExitCode::SUCCESS);
    }

    let output = output_dir.join(gpx_io::output_file_name(&cli.track, &categories));
    write_output(cli.mode.into(), &track, &report, &output)?;
    println!("\nGPX saved to {}", output.display());

    Ok(ExitCode::SUCCESS)
}

fn build_config(cli: &Cli) -> Result<FinderConfig, FinderError> {
    let mut config = match &cli.config {
        Some(path) => FinderConfig::from_file(path)?,
        None => FinderConfig::default(),
    };

    let categories: Vec<Category> = if cli.categories.is_empty() {
        config.profiles.iter().map(SearchProfile::category).collect()
    } else {
        cli.categories
            .iter()
            .map(|c| c.parse::<Category>())
            .collect::<Result<Vec<_>, FinderError>>()?
    };

    let mut profiles = Vec::with_capacity(categories.len());
    for category in categories {
        let configured = config
            .profiles
            .iter()
            .find(|p| p.category() == category)
            .map(SearchProfile::max_distance_km);
        let km = distance_override(cli, category)
            .or(configured)
            .unwrap_or_else(|| category.default_max_distance_km());
        profiles.push(SearchProfile::new(category, km)?);
    }
    config.profiles = profiles;

    if cli.no_road_routes {
        config.road_routes = false;
    }
    if let Some(concurrency) = cli.concurrency {
        config.max_concurrency = concurrency;
    }

    config.validate()?;
    Ok(config)
}

fn distance_override(cli: &Cli, category: Category) -> Option<f64> {
    match category {
        Category::Fuel => cli.fuel_km,
        Category::Supermarket => cli.supermarket_km,
        Category::Bakery => cli.bakery_km,
        Category::Cafe => cli.cafe_km,
        Category::Repair => cli.repair_km,
        Category::Accommodation => cli.accommodation_km,
        Category::SpeedCamera => None,
    }
}

fn output_dir(cli: &Cli) -> Result<PathBuf, FinderError> {
    let dir = match &cli.output_dir {
        Some(dir) => dir.clone(),
        None => match cli.track.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };
    if !dir.is_dir() {
        return Err(FinderError::OutputDirMissing(dir));
    }
    Ok(dir)
}

fn log_event(event: &RunEvent) {
    match event {
        RunEvent::Started { route_km, segments } => {
            info!("Total route distance: {route_km:.2} km, processing in {segments} segments");
        }
        RunEvent::SearchStarted { category, max_distance_km } => {
            info!("Searching for {} within {max_distance_km} km...", category.display_name());
        }
        RunEvent::SegmentSearched { completed, total, found, .. } => {
            if completed % 5 == 0 || completed == total {
                info!("   [{completed}/{total}] found {found}");
            }
        }
        RunEvent::Deduplicated { before, after } => {
            info!("After deduplication: {after} places (removed {} duplicates)", before - after);
        }
        RunEvent::PlacesResolved { category, count } => {
            info!("  {}: {count}", category.display_name());
        }
        RunEvent::RoadRoutesStarted { places } => {
            if *places > 0 {
                info!("Calculating road routes for {places} places...");
            }
        }
        RunEvent::RoadRoutesFinished { routes } => {
            info!("Road route calculations completed ({routes} routes)");
        }
    }
}

fn print_report(report: &RunReport) {
    println!("\n{}", "=".repeat(60));
    println!(
        "Route: {:.2} km, {} segments, {} places",
        report.route_length_km,
        report.segment_count,
        report.place_count()
    );
    println!("{}", "=".repeat(60));

    for (category, places) in &report.places {
        println!("\n{} ({})", category.display_name(), places.len());
        for (i, place) in places.iter().enumerate() {
            let routed = if report.road_routes.contains_key(&place.key()) { " [road route]" } else { "" };
            println!("  {:3}. {} - {:.2} km from route{}", i + 1, place.name, place.distance_km, routed);
        }
    }

    if !report.fuel_gaps.is_empty() {
        println!("\nDistances between petrol stations:");
        for gap in &report.fuel_gaps {
            println!("  {} -> {}: {:.2} km", gap.from, gap.to, gap.distance_km);
        }
        if let Some(longest) = report.longest_fuel_gap() {
            println!(
                "  Longest gap: {:.2} km ({} -> {})",
                longest.distance_km, longest.from, longest.to
            );
        }
    }

    let summary = report.health.summary();
    if !summary.is_empty() {
        println!();
        for line in summary {
            println!("{line}");
        }
    }
}

fn write_output(
    mode: OutputMode,
    track: &Track,
    report: &RunReport,
    path: &Path,
) -> Result<(), FinderError> {
    let places = report.included_places();
    match mode {
        OutputMode::Waypoints => gpx_io::write_waypoints_gpx(&places, path),
        OutputMode::Enhanced => gpx_io::write_enhanced_gpx(
            track,
            &places,
            |key| report.road_routes.get(&key).map(|r| r.points.as_slice()),
            path,
        ),
    }
}
