use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use qoibench::model::CodecModel;
use qoibench::testbench::{ReadyPattern, TestbenchOptions, DEFAULT_BUDGET_FACTOR, DEFAULT_RESET_CYCLES};
use qoibench::{FailureKind, HarnessError, Verification};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Replays an image through a streaming codec core and checks the reconstructed pixels.",
    long_about = None
)]
struct Args {
    #[arg(name = "IMAGE")]
    image: PathBuf,

    /// Config file (defaults to config.toml in the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Codec model to drive: qoi or identity.
    #[arg(long)]
    model: Option<CodecModel>,

    /// Extension of the captured byte stream, written next to IMAGE.
    #[arg(long)]
    extension: Option<String>,

    /// Waveform trace output.
    #[arg(long, conflicts_with = "no_trace")]
    trace: Option<PathBuf>,

    #[arg(long)]
    no_trace: bool,

    /// Cycle budget as a multiple of the pixel count.
    #[arg(long)]
    budget_factor: Option<u64>,

    /// Cycles out of every --ready-period with out_ready asserted.
    #[arg(long)]
    ready_on: Option<u32>,

    #[arg(long)]
    ready_period: Option<u32>,

    /// Recent log records to print after a failure.
    #[arg(long)]
    history: Option<usize>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// Configuration file contents; every key is optional.
#[derive(Deserialize, Default, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
struct Config {
    model: Option<String>,
    extension: Option<String>,
    trace: Option<PathBuf>,
    budget_factor: Option<u64>,
    reset_cycles: Option<u64>,
    ready_on: Option<u32>,
    ready_period: Option<u32>,
    history: Option<usize>,
}

// Function to get the configuration directory.
fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "qoibench", "qoibench")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

// A missing file yields the defaults; a malformed one is an error.
fn load_config(explicit: Option<&Path>) -> Result<Config, HarnessError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_dir() {
            Some(dir) => dir.join("config.toml"),
            None => return Ok(Config::default()),
        },
    };
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
            return Ok(Config::default());
        }
        Err(e) => return Err(HarnessError::Config(format!("{}: {e}", path.display()))),
    };
    toml::from_str(&text).map_err(|e| HarnessError::Config(format!("{}: {e}", path.display())))
}

fn build_verification(args: &Args, config: &Config) -> Result<Verification, HarnessError> {
    let model = match (&args.model, &config.model) {
        (Some(model), _) => *model,
        (None, Some(name)) => name.parse().map_err(HarnessError::Config)?,
        (None, None) => CodecModel::default(),
    };
    let extension = args
        .extension
        .clone()
        .or_else(|| config.extension.clone())
        .unwrap_or_else(|| qoibench::DEFAULT_EXTENSION.to_string());
    let trace = if args.no_trace {
        None
    } else {
        Some(
            args.trace
                .clone()
                .or_else(|| config.trace.clone())
                .unwrap_or_else(|| PathBuf::from(qoibench::DEFAULT_TRACE_FILE)),
        )
    };

    let out_ready = match (
        args.ready_on.or(config.ready_on),
        args.ready_period.or(config.ready_period),
    ) {
        (Some(on), Some(period)) => ReadyPattern::Duty { on, period },
        (None, None) => ReadyPattern::Always,
        _ => {
            return Err(HarnessError::Config(
                "ready_on and ready_period must be given together".into(),
            ));
        }
    };
    let options = TestbenchOptions {
        budget_factor: args
            .budget_factor
            .or(config.budget_factor)
            .unwrap_or(DEFAULT_BUDGET_FACTOR),
        reset_cycles: config.reset_cycles.unwrap_or(DEFAULT_RESET_CYCLES),
        out_ready,
    };
    options.validate()?;

    Ok(Verification {
        output: qoibench::output_path_for(&args.image, &extension),
        image: args.image.clone(),
        trace,
        model,
        options,
    })
}

// Usage errors share the pre-flight code; --help and --version succeed.
fn usage_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        FailureKind::Preflight.exit_code()
    } else {
        FailureKind::SUCCESS_CODE
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(usage_exit_code(&err));
        }
    };
    let config = load_config(args.config.as_deref());

    let console = match args.verbose {
        0 if cfg!(feature = "debug_logs") => log::LevelFilter::Debug,
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let history = args
        .history
        .or_else(|| config.as_ref().ok().and_then(|c| c.history))
        .unwrap_or(0);
    if let Err(e) = qoibench::log_buffer::init_logger(console, history) {
        eprintln!("WARN: logging disabled: {e}");
    }

    let result = config
        .and_then(|config| build_verification(&args, &config))
        .and_then(|verification| {
            log::debug!(
                "model {} -> {}",
                verification.model,
                verification.output.display()
            );
            verification.run()
        });

    match result {
        Ok(summary) => {
            println!(
                "{} cycles, {} pixels checked, {} bytes in {} bursts",
                summary.cycles, summary.pixels_checked, summary.bytes_captured, summary.bursts
            );
            println!("SUCCESS!");
            ExitCode::from(FailureKind::SUCCESS_CODE)
        }
        Err(err) => {
            let label = match err.kind() {
                FailureKind::Preflight => "ERR",
                _ => "FAIL!",
            };
            eprintln!("{label}: {err}");
            let recent = qoibench::log_buffer::drain_logs();
            if !recent.is_empty() {
                eprintln!("--- recent activity ---");
                for entry in recent {
                    eprintln!("{entry}");
                }
            }
            ExitCode::from(err.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["qoibench", "pics/frame.png"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_without_config() {
        let v = build_verification(&args(&[]), &Config::default()).unwrap();
        assert_eq!(v.output, PathBuf::from("pics/frame.qoi"));
        assert_eq!(v.trace, Some(PathBuf::from("trace.vcd")));
        assert_eq!(v.model, CodecModel::Qoi);
        assert_eq!(v.options.out_ready, ReadyPattern::Always);
    }

    #[test]
    fn arguments_override_config() {
        let config: Config = toml::from_str(
            r#"
            model = "identity"
            extension = "bin"
            budget_factor = 20
            ready_on = 1
            ready_period = 2
            "#,
        )
        .unwrap();
        let v = build_verification(&args(&["--extension", "qoi", "--no-trace"]), &config).unwrap();
        assert_eq!(v.model, CodecModel::Identity);
        assert_eq!(v.output, PathBuf::from("pics/frame.qoi"));
        assert_eq!(v.trace, None);
        assert_eq!(v.options.budget_factor, 20);
        assert_eq!(v.options.out_ready, ReadyPattern::Duty { on: 1, period: 2 });
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "budget = 3\n").unwrap();
        assert!(matches!(load_config(Some(&path)), Err(HarnessError::Config(_))));
        fs::write(&path, "budget_factor = 3\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().budget_factor, Some(3));
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn usage_errors_exit_with_preflight_code() {
        let err = Args::try_parse_from(["qoibench", "--bogus-flag", "x.png"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), 1);
        let err = Args::try_parse_from(["qoibench"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), FailureKind::Preflight.exit_code());
        let err = Args::try_parse_from(["qoibench", "--help"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), 0);
        let err = Args::try_parse_from(["qoibench", "--version"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), 0);
    }

    #[test]
    fn ready_pair_merges_across_args_and_config() {
        let config = Config {
            ready_period: Some(3),
            ..Config::default()
        };
        let v = build_verification(&args(&["--ready-on", "1"]), &config).unwrap();
        assert_eq!(v.options.out_ready, ReadyPattern::Duty { on: 1, period: 3 });
    }

    #[test]
    fn half_ready_pattern_is_rejected() {
        let config = Config {
            ready_on: Some(1),
            ..Config::default()
        };
        assert!(build_verification(&args(&[]), &config).is_err());
    }
}
