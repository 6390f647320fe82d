use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use hyperfft::group::GroupConfig;
use hyperfft::signal::{OutputFormat, SignalBuffer};
use hyperfft::{
    IterativeEngine, LocalCluster, Method, Options, RecursiveEngine, Result, Transform,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hyperfft")]
#[command(about = "Compute the FFT of a signal file with iterative, recursive or distributed engines", long_about = None)]
struct Cli {
    /// 1 = iterative, 2 = recursive, 3 = distributed, 4 = all
    #[arg(value_name = "METHOD")]
    method: Method,
    /// One sample per line, `re` or `re im`
    #[arg(value_name = "INPUT")]
    input: PathBuf,
    /// Ranks of the distributed engine (power of 2)
    #[arg(long, default_value_t = 4)]
    ranks: usize,
    /// Where the spectrum is written
    #[arg(short, long, default_value = "output.txt")]
    output: PathBuf,
    /// Write only the real part of every sample
    #[arg(long)]
    real_only: bool,
    /// Also run the inverse transform on the spectrum
    #[arg(long)]
    inverse: bool,
    /// Keep every engine on a single thread
    #[arg(long)]
    sequential: bool,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Engine for one of the methods [`Method::expand`] yields
fn build_engine(method: Method, cli: &Cli, options: &Options) -> Result<Box<dyn Transform>> {
    Ok(match method {
        Method::Iterative => Box::new(IterativeEngine::with_options(options.clone())),
        Method::Recursive => Box::new(RecursiveEngine::with_options(options.clone())),
        Method::Distributed => Box::new(LocalCluster::with_options(
            cli.ranks,
            GroupConfig::default(),
            options.clone(),
        )?),
        Method::All => unreachable!("`Method::expand` never yields `All`"),
    })
}

/// `output.txt` becomes `output_iterative.txt` when several engines write, and gets an
/// `_inverse` suffix for the inverse transform
fn output_path(base: &Path, engine: Option<&str>, inverse: bool) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_owned());
    let mut name = stem;
    if let Some(engine) = engine {
        name.push('_');
        name.push_str(&engine.to_ascii_lowercase());
    }
    if inverse {
        name.push_str("_inverse");
    }
    let mut path = base.with_file_name(name);
    if let Some(ext) = base.extension() {
        path.set_extension(ext);
    }
    path
}

fn run(cli: &Cli) -> Result<()> {
    let signal = SignalBuffer::read(&cli.input)?;
    let options = if cli.sequential {
        Options::sequential()
    } else {
        Options::guess_options(signal.input().len())
    };
    let format = if cli.real_only {
        OutputFormat::RealOnly
    } else {
        OutputFormat::Complex
    };

    let methods = cli.method.expand();
    let several = methods.len() > 1;
    info!(method = ?cli.method, input = %cli.input.display(), samples = signal.input().len(), "starting");

    for method in methods {
        let mut engine = build_engine(method, cli, &options)?;
        let mut buffer = signal.clone();
        let tag = several.then(|| engine.name());

        engine.load(buffer.input().to_vec());
        engine.compute()?;
        println!("{}", engine.report_stats("FFT"));
        buffer.set_output(engine.take_output());
        buffer.write(output_path(&cli.output, tag, false), format)?;

        if cli.inverse {
            buffer.feed_back()?;
            engine.load(buffer.input().to_vec());
            engine.reverse_compute()?;
            println!("{}", engine.report_stats("IFFT"));
            buffer.set_output(engine.take_output());
            buffer.write(output_path(&cli.output, tag, true), format)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if !err.use_stderr() {
                err.exit();
            }
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(1)
        }
    }
}
