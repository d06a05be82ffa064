use chrono::{DateTime, FixedOffset};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use shadepath::config::Config;
use shadepath::ratio::{self, ShadeLevel};
use shadepath::scene::Scene;
use shadepath::solar::{self, SolarPosition};
use std::path::{Path, PathBuf};

/// ShadePath — road shade from building shadows.
///
/// Estimates what fraction of a road lies in the shadow of nearby buildings
/// at a single instant. Geometry is planar: building heights and scene
/// coordinates must use the same linear unit.
///
/// Examples:
///   shadepath sun --lat 49.2827 --lon -123.1207 --time 2024-06-21T13:15:00-07:00
///   shadepath ratio --scene downtown.json --lat 49.28 --lon -123.12 --time "2024-06-21 16:00" --tz America/Vancouver
///   shadepath route --scene walk.json --lat 49.28 --lon -123.12 --time 2024-06-21T23:00:00Z
///   shadepath serve --port 8080
#[derive(Parser)]
#[command(name = "shadepath", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.shadepath/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the sun's altitude and azimuth.
    Sun(When),
    /// Shadow ratio of each road in a scene.
    Ratio {
        #[command(flatten)]
        when: When,
        /// Scene JSON file with buildings and roads.
        #[arg(long)]
        scene: PathBuf,
        /// Only report the road at this index.
        #[arg(long)]
        road: Option<usize>,
    },
    /// Length-weighted shade of a scene's roads taken as one route.
    Route {
        #[command(flatten)]
        when: When,
        /// Scene JSON file with buildings and roads.
        #[arg(long)]
        scene: PathBuf,
    },
    /// Start the HTTP service.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Args)]
struct When {
    /// Latitude (-90 to 90).
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude (-180 to 180).
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    /// Instant, RFC 3339 (2024-06-21T13:15:00-07:00) or local
    /// (2024-06-21 13:15) together with --tz.
    #[arg(long)]
    time: String,

    /// IANA timezone for local --time values (e.g. America/Vancouver).
    #[arg(long)]
    tz: Option<String>,
}

#[derive(Serialize)]
struct RoadOutput {
    index: usize,
    name: String,
    length: f64,
    ratio: f64,
    percent: f64,
    level: ShadeLevel,
}

#[derive(Serialize)]
struct RatioOutput {
    time: String,
    solar: SolarPosition,
    roads: Vec<RoadOutput>,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", msg);
    std::process::exit(1);
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(e),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    match cli.command {
        Command::Sun(when) => {
            let (timestamp, sun) = resolve_sun(&when, &config);
            eprintln!("  Sun at {}: altitude {:.2}°, azimuth {:.2}°",
                timestamp.to_rfc3339(), sun.altitude, sun.azimuth);
            print_json(&sun);
        }
        Command::Ratio { when, scene, road } => run_ratio(&when, &scene, road, &config),
        Command::Route { when, scene } => run_route(&when, &scene, &config),
        Command::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Err(e) = shadepath::server::start(config).await {
                fail(format!("server: {}", e));
            }
        }
    }
}

fn resolve_sun(when: &When, config: &Config) -> (DateTime<FixedOffset>, SolarPosition) {
    let tz = when.tz.as_deref().or(config.timezone.as_deref());
    let timestamp = solar::parse_timestamp(&when.time, tz).unwrap_or_else(|e| fail(e));
    let sun = solar::resolve(when.lat, when.lon, &timestamp).unwrap_or_else(|e| fail(e));
    (timestamp, sun)
}

fn run_ratio(when: &When, scene_path: &Path, only: Option<usize>, config: &Config) {
    let scene = Scene::load(scene_path).unwrap_or_else(|e| fail(e));
    let buildings = scene.buildings().unwrap_or_else(|e| fail(e));
    let roads = scene.roads().unwrap_or_else(|e| fail(e));

    let selected: Vec<usize> = match only {
        Some(i) if i < roads.len() => vec![i],
        Some(i) => fail(format!("scene has {} roads, no road #{}", roads.len(), i)),
        None => (0..roads.len()).collect(),
    };

    let (timestamp, sun) = resolve_sun(when, config);
    eprintln!("  {} buildings, {} roads, sun altitude {:.2}°", buildings.len(), selected.len(), sun.altitude);

    let outputs = selected
        .into_iter()
        .map(|i| {
            let road = &roads[i];
            let name = scene.roads[i].label(i);
            let ratio = ratio::shadow_ratio_for_position(road, &buildings, &sun)
                .unwrap_or_else(|e| fail(format!("{}: {}", name, e)));
            let percent = ratio * 100.0;
            RoadOutput {
                index: i,
                name,
                length: ratio::road_length(road),
                ratio,
                percent,
                level: config.shade.classify(percent),
            }
        })
        .collect();

    print_json(&RatioOutput { time: timestamp.to_rfc3339(), solar: sun, roads: outputs });
}

fn run_route(when: &When, scene_path: &Path, config: &Config) {
    let scene = Scene::load(scene_path).unwrap_or_else(|e| fail(e));
    let buildings = scene.buildings().unwrap_or_else(|e| fail(e));
    let roads = scene.roads().unwrap_or_else(|e| fail(e));

    let (_, sun) = resolve_sun(when, config);
    let route = ratio::route_shade_for_position(&roads, &buildings, &sun, &config.shade)
        .unwrap_or_else(|e| fail(e));

    eprintln!("  Route: {:.1} units, {:.1}% shaded ({})", route.total_length, route.percent, route.level);
    print_json(&route);
}
