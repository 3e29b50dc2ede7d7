use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Builder;
use log::error;

use dslab_xgpon::config::{Config, ConfigParamResolvers, RawConfig};
use dslab_xgpon::dba::{DbaEngine, DBA_ENGINE_NAMES};
use dslab_xgpon::error::XgponError;
use dslab_xgpon::qos::TcontType;
use dslab_xgpon::simulation::XgponSimulation;
use dslab_xgpon::stats::Stats;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to a simulation config in YAML format.
    #[clap(long, default_value = "configs/two-classes.yaml")]
    config: String,
    /// Number of upstream frames to simulate (overrides the config).
    #[clap(long)]
    frames: Option<u64>,
    /// DBA engine (overrides the config): xgiant-prop, xgiant-deficit, giant, ebu or round-robin.
    #[clap(long)]
    dba: Option<String>,
    /// Random seed (overrides the config).
    #[clap(long)]
    seed: Option<u64>,
    /// Print statistics as JSON instead of a table.
    #[clap(long)]
    json: bool,
}

fn load_config(args: &Args) -> Result<Config, XgponError> {
    let mut raw: RawConfig = serde_yaml::from_reader(File::open(Path::new(&args.config))?)?;
    if let Some(frames) = args.frames {
        raw.frames = frames;
    }
    if let Some(dba) = &args.dba {
        raw.dba = dba.clone();
    }
    if let Some(seed) = args.seed {
        raw.seed = seed;
    }
    Config::from_raw(raw, ConfigParamResolvers::default())
}

fn print_results(stats: &Stats, dba: &str, us_frame_size: u32) {
    println!("describing {}", dba);
    println!(
        "- {} frames, {} BWmaps, {} allocations, {} bursts",
        stats.frames, stats.bwmaps, stats.allocations, stats.bursts
    );
    println!("- utilization = {:.3}", stats.utilization(us_frame_size));
    println!("- throughput = {:.3} Mbit/s", stats.throughput() / 1e6);
    println!("- mean delay = {:.1} us", stats.delay.mean() / 1e3);
    for class in [TcontType::T1, TcontType::T2, TcontType::T3, TcontType::T4] {
        let tconts: Vec<_> = stats.tconts.values().filter(|t| t.tcont_type == class).collect();
        if tconts.is_empty() {
            continue;
        }
        let received: u64 = tconts.iter().map(|t| t.received_bytes).sum();
        let dropped: u64 = tconts.iter().map(|t| t.dropped_bytes).sum();
        let delay: f64 = tconts.iter().map(|t| t.delay.mean()).sum::<f64>() / tconts.len() as f64;
        println!(
            "- {:?}: {} T-CONTs, throughput {:.3} Mbit/s, loss {:.4}, mean delay {:.1} us",
            class,
            tconts.len(),
            stats.class_throughput(class) / 1e6,
            dropped as f64 / (received + dropped).max(1) as f64,
            delay / 1e3
        );
    }
}

fn main() -> ExitCode {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{} (DBA engines: {:?})", e, DBA_ENGINE_NAMES);
            return ExitCode::FAILURE;
        }
    };
    let dba = config.dba.to_string();
    let us_frame_size = config.phy.us_frame_size_in_words();
    let stats = XgponSimulation::new(config).run();

    if args.json {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("cannot serialize stats: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_results(&stats, &dba, us_frame_size);
    }
    ExitCode::SUCCESS
}
