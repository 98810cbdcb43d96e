use clap::{Parser, Subcommand};
use preset_compress::config::{self, CompressorConfig};
use preset_compress::error::CompressError;
use preset_compress::imaging::{CustomBounds, Quality, RustBackend};
use preset_compress::orchestrator::{Orchestrator, OrchestratorEvent, OrchestratorState};
use preset_compress::output;
use preset_compress::preset::{self, Preset};
use preset_compress::types::CompressedResult;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

/// Target selection shared by `compress` and `tune`.
#[derive(clap::Args, Clone)]
struct TargetArgs {
    /// Preset name (platformA, platformB, fixedBanner, custom)
    #[arg(long, short, default_value = "platformA")]
    preset: String,

    /// Starting JPEG quality (1-100); defaults to the configured quality
    #[arg(long, short)]
    quality: Option<u32>,

    /// Custom width in pixels (custom preset only)
    #[arg(long, requires = "height")]
    width: Option<String>,

    /// Custom height in pixels (custom preset only)
    #[arg(long, requires = "width")]
    height: Option<String>,

    /// Where to write the JPEG (default: <input stem>-<preset>.jpg next to the input)
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "preset-compress")]
#[command(version)]
#[command(about = "Resize and compress photos for publishing presets")]
#[command(long_about = "\
Resize and compress photos for publishing presets

Each preset fixes the output bounds, a resize policy and a byte budget:

  platformA    fit within 2000x2000, at most 1 MB
  platformB    fit within 1600x1600, at most 500 KB
  fixedBanner  exactly 1584x396, at most 3 MB
  custom       fit within --width x --height, no budget

Quality starts at the configured default and steps down until the output
fits the budget or the quality floor is reached.

Run 'preset-compress gen-config' to generate a documented config file.")]
struct Cli {
    /// Config file (missing file = built-in defaults)
    #[arg(long, default_value = "preset-compress.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress one image for a preset and write the result
    Compress {
        /// Input JPEG or PNG
        input: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive session: read edits from stdin and print each published result
    ///
    /// Commands: `preset NAME`, `quality N`, `size W H`, `quit`.
    /// Preset switches apply immediately; quality and size edits are debounced.
    Tune {
        /// Input JPEG or PNG
        input: PathBuf,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// List the available presets
    Presets {
        /// Print the presets as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Compress {
            input,
            target,
            json,
        } => {
            let config = config::load_config(&cli.config)?;
            compress_command(&config, &input, &target, json)?;
        }
        Command::Tune { input, target } => {
            let config = config::load_config(&cli.config)?;
            tune_command(&config, &input, &target)?;
        }
        Command::Presets { json } => {
            let presets = preset::all();
            if json {
                println!("{}", serde_json::to_string_pretty(&presets)?);
            } else {
                output::print_presets(&presets);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn compress_command(
    config: &CompressorConfig,
    input: &Path,
    target: &TargetArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let preset = preset::lookup(&target.preset)?;
    let bounds = parse_bounds(target)?;
    let quality = target.quality.map_or(config.default_quality(), Quality::new);
    let bytes = std::fs::read(input)?;

    let (tx, rx) = mpsc::channel();
    let orchestrator = Orchestrator::new(Arc::new(RustBackend::new()), config, tx)?;
    orchestrator.upload(bytes, preset, quality, bounds)?;

    let result = match next_event(&rx)? {
        OrchestratorEvent::Published { result, .. } => result,
        OrchestratorEvent::Failed { error, .. } => return Err(error.into()),
    };

    let path = target
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input, &preset));
    std::fs::write(&path, &result.encoded_bytes)?;

    if json {
        let summary = serde_json::json!({
            "preset": preset.name,
            "output": path,
            "result": &*result,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        output::print_result(&preset, &result);
        println!("    Written: {}", path.display());
    }
    Ok(())
}

fn tune_command(
    config: &CompressorConfig,
    input: &Path,
    target: &TargetArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut preset = preset::lookup(&target.preset)?;
    let mut bounds = parse_bounds(target)?;
    let mut quality = target.quality.map_or(config.default_quality(), Quality::new);
    let bytes = std::fs::read(input)?;

    let (tx, rx) = mpsc::channel();
    let orchestrator = Orchestrator::new(Arc::new(RustBackend::new()), config, tx)?;
    orchestrator.upload(bytes, preset, quality, bounds)?;

    // The first result must land before edits can refer to the source.
    let first = next_event(&rx)?;
    output::print_event(&first);
    if let OrchestratorEvent::Failed { error, .. } = first {
        return Err(error.into());
    }

    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_event(&event);
        }
    });

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let words: Vec<&str> = line.split_whitespace().collect();
        let outcome = match words.as_slice() {
            [] => continue,
            ["quit"] | ["exit"] => break,
            ["preset", name] => preset::lookup(name).and_then(|p| {
                preset = p;
                let request = orchestrator.request(preset, quality, bounds)?;
                orchestrator.submit(request).map(|_| ())
            }),
            ["quality", value] => match value.parse::<u32>() {
                Ok(q) => {
                    quality = Quality::new(q);
                    orchestrator
                        .request(preset, quality, bounds)
                        .and_then(|request| orchestrator.submit_debounced(request))
                }
                Err(_) => {
                    eprintln!("quality must be a whole number, got {value:?}");
                    continue;
                }
            },
            ["size", width, height] => CustomBounds::parse(width, height).and_then(|b| {
                bounds = Some(b);
                let request = orchestrator.request(preset, quality, bounds)?;
                orchestrator.submit_debounced(request)
            }),
            _ => {
                eprintln!("commands: preset NAME | quality N | size W H | quit");
                continue;
            }
        };
        if let Err(error) = outcome {
            eprintln!("{}", output::format_error(&error));
        }
    }

    wait_until_settled(&orchestrator, config.orchestrator.debounce());
    let latest = orchestrator.current();
    drop(orchestrator);
    let _ = printer.join();

    if let (Some(path), Some(result)) = (&target.output, latest) {
        write_result(path, &result)?;
        println!("Written: {}", path.display());
    }
    Ok(())
}

fn parse_bounds(target: &TargetArgs) -> Result<Option<CustomBounds>, CompressError> {
    match (&target.width, &target.height) {
        (Some(w), Some(h)) => CustomBounds::parse(w, h).map(Some),
        _ => Ok(None),
    }
}

fn next_event(rx: &Receiver<OrchestratorEvent>) -> Result<OrchestratorEvent, CompressError> {
    rx.recv()
        .map_err(|_| CompressError::EncodeFailure("worker pool stopped".into()))
}

/// Give a pending debounced edit time to fire, then wait out in-flight work.
fn wait_until_settled(orchestrator: &Orchestrator, debounce: Duration) {
    std::thread::sleep(debounce + Duration::from_millis(50));
    while orchestrator.state() == OrchestratorState::Compressing {
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn write_result(path: &Path, result: &CompressedResult) -> std::io::Result<()> {
    std::fs::write(path, &result.encoded_bytes)
}

/// `photo.png` + fixedBanner → `photo-fixedBanner.jpg` in the same directory.
fn default_output_path(input: &Path, preset: &Preset) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}-{}.jpg", stem, preset.name))
}
