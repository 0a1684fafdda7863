use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use SailRouting::engine::polar::PolarModel;
use SailRouting::parsers::polars::PolarData;

#[derive(Parser)]
#[command(author, version, about = "Print best VMG angles of a polar table", long_about = None)]
struct Args {
    #[arg(required = true)]
    polar: PathBuf,
    /// Wind speeds to inspect, defaults to the table's own columns
    #[arg(long, value_delimiter = ',')]
    tws: Vec<f64>,
    /// Engine speed used below this boat speed
    #[arg(long)]
    engine: Option<f64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    println!("Opening {}...", args.polar.display());
    let mut polar = PolarData::load_from_csv(&args.polar)?;
    if let Some(min_speed) = args.engine {
        polar = polar.with_engine(min_speed);
    }
    println!("{} TWA rows x {} TWS columns", polar.twa.len(), polar.tws.len());

    let wind_speeds = if args.tws.is_empty() { polar.tws.clone() } else { args.tws };

    println!("{:>6} | {:>8} {:>6} {:>6} | {:>8} {:>6} {:>6}", "TWS", "up TWA", "BS", "VMG", "down TWA", "BS", "VMG");
    for tws in wind_speeds {
        let up = polar.best_vmg_angle(tws, true);
        let down = polar.best_vmg_angle(tws, false);
        let (up_speed, up_engine) = polar.speed(tws, up);
        let (down_speed, down_engine) = polar.speed(tws, down);
        println!(
            "{:>6.1} | {:>8.0} {:>6.2} {:>6.2} | {:>8.0} {:>6.2} {:>6.2}{}",
            tws,
            up,
            up_speed,
            up_speed * up.to_radians().cos(),
            down,
            down_speed,
            -down_speed * down.to_radians().cos(),
            if up_engine || down_engine { "  (engine)" } else { "" }
        );
    }

    Ok(())
}
