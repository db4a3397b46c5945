//! Sampler entry point — CLI wiring around one init/sample run.

use std::io;
use std::path::PathBuf;
use std::process;

use grid_sampler::config::Config;
use grid_sampler::exec::LocalRunner;
use grid_sampler::fea::{DirForecastErrorsStore, TimeHorizon};
use grid_sampler::network::Network;
use grid_sampler::sampler::{MontecarloSampler, SamplerParameters};

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<PathBuf>,
    network_path: PathBuf,
    fe_store: PathBuf,
    analysis: String,
    time_horizon: TimeHorizon,
    samples: usize,
    out: Option<PathBuf>,
}

fn print_help() {
    eprintln!("grid-sampler — Monte Carlo sampling of a power network working state");
    eprintln!();
    eprintln!("Usage: grid-sampler [OPTIONS] --network <csv> --fe-store <dir> --analysis <id> --samples <n>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Platform configuration TOML (defaults apply if omitted)");
    eprintln!("  --network <path>         Network working-state snapshot CSV (required)");
    eprintln!("  --fe-store <dir>         Root of the forecast-errors data store (required)");
    eprintln!("  --analysis <id>          Forecast-errors analysis id (required)");
    eprintln!("  --time-horizon <name>    day-ahead or intraday (default: day-ahead)");
    eprintln!("  --samples <n>            Number of samples to draw (required)");
    eprintln!("  --out <path>             Write the final sampled state to CSV (default: stdout)");
    eprintln!("  --help                   Show this help message");
}

fn require_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i) {
        Some(v) => v,
        None => {
            eprintln!("error: {flag} requires a value");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut network_path = None;
    let mut fe_store = None;
    let mut analysis = None;
    let mut time_horizon = TimeHorizon::DayAhead;
    let mut samples = None;
    let mut out = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(require_value(&args, i, "--config")));
            }
            "--network" => {
                i += 1;
                network_path = Some(PathBuf::from(require_value(&args, i, "--network")));
            }
            "--fe-store" => {
                i += 1;
                fe_store = Some(PathBuf::from(require_value(&args, i, "--fe-store")));
            }
            "--analysis" => {
                i += 1;
                analysis = Some(require_value(&args, i, "--analysis").to_string());
            }
            "--time-horizon" => {
                i += 1;
                let raw = require_value(&args, i, "--time-horizon");
                time_horizon = match raw.parse() {
                    Ok(th) => th,
                    Err(e) => {
                        eprintln!("error: {e}");
                        process::exit(1);
                    }
                };
            }
            "--samples" => {
                i += 1;
                let raw = require_value(&args, i, "--samples");
                samples = match raw.parse::<usize>() {
                    Ok(n) => Some(n),
                    Err(_) => {
                        eprintln!("error: --samples value \"{raw}\" is not a valid count");
                        process::exit(1);
                    }
                };
            }
            "--out" => {
                i += 1;
                out = Some(PathBuf::from(require_value(&args, i, "--out")));
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    let missing = |flag: &str| -> ! {
        eprintln!("error: {flag} is required");
        print_help();
        process::exit(1);
    };
    CliArgs {
        config_path,
        network_path: network_path.unwrap_or_else(|| missing("--network")),
        fe_store: fe_store.unwrap_or_else(|| missing("--fe-store")),
        analysis: analysis.unwrap_or_else(|| missing("--analysis")),
        time_horizon,
        samples: samples.unwrap_or_else(|| missing("--samples")),
        out,
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = parse_args();

    let config = if let Some(ref path) = cli.config_path {
        match Config::from_toml_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let network_id = cli
        .network_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "network".to_string());
    let mut network =
        match Network::read_csv_from_path(network_id.as_str(), "default", &cli.network_path) {
            Ok(n) => n,
            Err(e) => {
                eprintln!("error: cannot load network \"{}\": {e}", cli.network_path.display());
                process::exit(1);
            }
        };

    let store = DirForecastErrorsStore::new(&cli.fe_store);
    let mut sampler = MontecarloSampler::new(&mut network, &store, LocalRunner, config.sampler);

    let parameters = SamplerParameters {
        time_horizon: cli.time_horizon,
        analysis_id: cli.analysis.clone(),
        n_samples: cli.samples,
    };
    if let Err(e) = sampler.init(&parameters) {
        eprintln!("error: {e}");
        process::exit(1);
    }
    for _ in 0..cli.samples {
        if let Err(e) = sampler.sample() {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
    drop(sampler);

    let result = match cli.out {
        Some(ref path) => network.write_csv_to_path(path),
        None => network.write_csv(io::stdout().lock()),
    };
    if let Err(e) = result {
        eprintln!("error: failed to write sampled state: {e}");
        process::exit(1);
    }
    if let Some(ref path) = cli.out {
        eprintln!("Sampled state written to {}", path.display());
    }
}
