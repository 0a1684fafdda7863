use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Deserialize;

use SailRouting::engine::geodesy::GreatCircle;
use SailRouting::engine::mask::LandMask;
use SailRouting::engine::models::{Boat, Coordinate, WindData};
use SailRouting::engine::optimizer::{OptimizerSettings, WaypointOptimizer};
use SailRouting::engine::router::{Route, RouteIntegrator, RoutingEnvironment};
use SailRouting::engine::stats::RouteStats;
use SailRouting::engine::weather::{UniformWeather, WeatherField, WindField, WindFrame};
use SailRouting::parsers::polars::PolarData;

#[derive(Parser)]
#[command(author, version, about = "Compute a sailing route through its waypoints", long_about = None)]
struct Args {
    /// Polar table (CSV: header row of wind speeds, one row per wind angle)
    #[arg(long)]
    polar: PathBuf,
    /// JSON scenario holding the boat, the route and the weather
    #[arg(long)]
    scenario: PathBuf,
    /// Fine-position this waypoint before printing the route
    #[arg(long)]
    optimize: Option<usize>,
    /// xz-compressed land mask used for coast detection
    #[arg(long)]
    land_mask: Option<PathBuf>,
    /// Current time (RFC 3339), defaults to the wall clock
    #[arg(long)]
    now: Option<DateTime<Utc>>,
    /// Print every track point
    #[arg(long)]
    track: bool,
}

#[derive(Deserialize)]
struct Scenario {
    boat: Boat,
    route: Route,
    weather: WeatherSource,
    #[serde(default)]
    optimizer: OptimizerSettings,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WeatherSource {
    Uniform(UniformWeather),
    Grid {
        frames: Vec<GridFrame>,
        #[serde(default)]
        current_date: Option<DateTime<Utc>>,
    },
}

#[derive(Deserialize)]
struct GridFrame {
    time: DateTime<Utc>,
    points: Vec<GridPoint>,
}

#[derive(Deserialize)]
struct GridPoint {
    lat: f64,
    lon: f64,
    speed: f64,
    direction: f64,
}

impl WeatherSource {
    fn into_field(self) -> Box<dyn WeatherField> {
        match self {
            WeatherSource::Uniform(weather) => Box::new(weather),
            WeatherSource::Grid { frames, current_date } => {
                let mut field = WindField::new();
                for frame in frames {
                    let mut wind = WindFrame::default();
                    for p in frame.points {
                        wind.insert_point(Coordinate::new(p.lat, p.lon), WindData::new(p.speed, p.direction));
                    }
                    field.insert_frame(frame.time, wind);
                }
                if let Some(date) = current_date {
                    field.set_current_date(date);
                }
                println!("Wind grid: {} frames, bounds {:?}", field.frame_count(), field.get_bounds());
                Box::new(field)
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();
    println!("--- Sail Routing CLI ---");

    println!("Loading Polar...");
    let polar = PolarData::load_from_csv(&args.polar)?;
    println!("Polar loaded: {} TWA, {} TWS points", polar.twa.len(), polar.tws.len());

    let scenario: Scenario = serde_json::from_reader(BufReader::new(File::open(&args.scenario)?))?;
    let Scenario { boat, mut route, weather, optimizer } = scenario;
    let weather = weather.into_field();

    let land_mask = args.land_mask.as_ref().map(LandMask::load).transpose()?;

    let mut env = RoutingEnvironment::new(weather.as_ref(), &GreatCircle, args.now.unwrap_or_else(Utc::now))
        .with_polar(&polar)
        .with_boat(&boat);
    if let Some(mask) = &land_mask {
        env = env.with_coasts(mask);
    }
    let mut integrator = RouteIntegrator::new(env);

    let started = Instant::now();
    integrator.recalculate(&mut route);
    println!("Route '{}' calculated in {:?}", route.name, started.elapsed());

    if let Some(index) = args.optimize {
        let started = Instant::now();
        let outcome = WaypointOptimizer::new(optimizer).optimize(&mut integrator, &mut route, index, None)?;
        println!(
            "Waypoint {} optimized in {:?} ({} iterations): improved {}, now at Lat: {:.4}, Lon: {:.4}",
            index,
            started.elapsed(),
            outcome.iterations,
            outcome.improved,
            route.waypoints[index].position.lat,
            route.waypoints[index].position.lon
        );
    }

    let outcome = route.outcome()?;
    println!("\nArrived: {}", outcome.has_arrival);
    println!("ETA: {}", outcome.eta);
    println!("Remaining: {:.2} NM", outcome.remaining_distance);

    println!("\nWaypoints:");
    for waypoint in &route.waypoints {
        let arrival = waypoint
            .arrival
            .map_or_else(|| "unreachable".to_string(), |t| t.to_string());
        print!("  {:<12} Lat: {:.4}, Lon: {:.4}  {}", waypoint.name, waypoint.position.lat, waypoint.position.lon, arrival);
        match waypoint.approach_heading {
            Some(heading) => println!("  (approach {:.2})", heading),
            None => println!(),
        }
    }

    if args.track {
        println!("\nTrack:");
        for point in route.track.iter() {
            println!(
                "  {:?} {} Lat: {:.4}, Lon: {:.4}, HDG {:.1}, TWA {:.1}, BS {:.2}, TWS {:.1}{}",
                point.kind,
                point.time,
                point.position.lat,
                point.position.lon,
                point.heading,
                point.twa,
                point.boat_speed,
                point.wind.speed,
                if point.engine_used { " (engine)" } else { "" }
            );
        }
    }

    if !route.coast_crossings.is_empty() {
        println!("\nWARNING: track crosses land on segments {:?}", route.coast_crossings);
    }

    let stats = RouteStats::from_track(&route.track);
    println!("\nStats:");
    println!("  Steps: {}", stats.steps);
    println!("  Total time: {}h{:02}", stats.total_time.num_hours(), stats.total_time.num_minutes() % 60);
    println!("  Distance: {:.1} NM", stats.total_distance);
    println!("  TWS min/avg/max: {:.1}/{:.1}/{:.1} kt", stats.min_tws, stats.avg_tws, stats.max_tws);
    println!(
        "  BS min/avg/max: {:.1}/{:.1}/{:.1} kt",
        stats.min_boat_speed, stats.avg_boat_speed, stats.max_boat_speed
    );
    println!(
        "  Upwind/reaching/downwind: {}h/{}h/{}h",
        stats.upwind_time.num_hours(),
        stats.reaching_time.num_hours(),
        stats.downwind_time.num_hours()
    );
    println!("  Tacks and gybes: {}", stats.tacks_and_gybes);
    println!("  Engine: {}h", stats.engine_time.num_hours());

    Ok(())
}
