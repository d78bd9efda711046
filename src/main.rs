use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use gpu_probe::{config, BackendKind, DeviceSelector, Engine, Field, Flag, Selection};
use log::{debug, info};
use std::path::PathBuf;
use std::process::ExitCode;

/// gpu-probe - Query NVIDIA GPU telemetry as JSON
#[derive(Parser, Debug, Clone)]
#[command(name = "gpu-probe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend to query (native, shell, synthetic)
    #[arg(long = "backend", value_name = "BACKEND", group = "method")]
    backend: Option<BackendKind>,

    /// Use the NVML library (same as --backend native)
    #[arg(long = "nvml", group = "method")]
    nvml: bool,

    /// Use nvidia-smi (same as --backend shell)
    #[arg(long = "bash", group = "method")]
    bash: bool,

    /// Use simulated GPUs (same as --backend synthetic)
    #[arg(long = "sim", group = "method")]
    sim: bool,

    /// GPU index to query, "all" or a negative number for every GPU
    #[arg(
        short = 'g',
        long = "gpu",
        value_name = "INDEX",
        default_value = "all",
        allow_negative_numbers = true
    )]
    gpu: DeviceSelector,

    /// Configuration file (defaults to the user config directory)
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,

    /// Print the result on a single line
    #[arg(long = "compact")]
    compact: bool,

    /// Fields to query, e.g. name temp mem, or count and all
    #[arg(value_name = "FIELD", allow_hyphen_values = true)]
    fields: Vec<String>,
}

impl Cli {
    /// Backend chosen on the command line, if any
    fn requested_backend(&self) -> Option<BackendKind> {
        if self.nvml {
            Some(BackendKind::Native)
        } else if self.bash {
            Some(BackendKind::Shell)
        } else if self.sim {
            Some(BackendKind::Synthetic)
        } else {
            self.backend
        }
    }
}

/// Build the selection, rejecting any token that is not a field
fn parse_selection(tokens: &[String]) -> std::result::Result<Selection, String> {
    if tokens.is_empty() {
        return Err("No fields requested".to_string());
    }
    tokens
        .iter()
        .map(|token| token.parse::<Flag>())
        .collect::<std::result::Result<Selection, String>>()
}

fn usage() -> String {
    let mut text = Cli::command().render_usage().to_string();
    text.push_str("\n\nFields:\n");
    text.push_str(&format!("  {:<20} {}\n", "count", "Number of GPUs"));
    text.push_str(&format!("  {:<20} {}\n", "all", "Every field"));
    for field in Field::ALL {
        text.push_str(&format!("  {:<20} {}\n", field.token(), field.description()));
    }
    text
}

fn run(cli: Cli) -> Result<ExitCode> {
    let selection = match parse_selection(&cli.fields) {
        Ok(selection) => selection,
        Err(e) => {
            eprintln!("{}\n", e);
            eprint!("{}", usage());
            return Ok(ExitCode::FAILURE);
        }
    };

    let probe_config = match &cli.config {
        Some(path) => config::load_from_path(path)?,
        None => config::load()?,
    };

    let kind = cli.requested_backend().unwrap_or(probe_config.backend);
    info!("Using {} backend", kind);

    let engine = Engine::open(kind, &probe_config)
        .context("Failed to initialize GPU query engine")?;

    debug!("Querying {} for GPU {}", kind, cli.gpu);
    let document = engine.query(cli.gpu, &selection);

    let output = if cli.compact {
        serde_json::to_string(&document)?
    } else {
        document.to_json_pretty()?
    };
    println!("{}", output);

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Level 0 (default): warn, 1: info, 2: debug, 3+: trace
    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Allow RUST_LOG to override CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("gpu-probe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_legacy_backend_flags() {
        assert_eq!(parse(&["--sim", "name"]).requested_backend(), Some(BackendKind::Synthetic));
        assert_eq!(parse(&["--bash", "name"]).requested_backend(), Some(BackendKind::Shell));
        assert_eq!(
            parse(&["--backend", "nvml", "name"]).requested_backend(),
            Some(BackendKind::Native)
        );
        assert_eq!(parse(&["name"]).requested_backend(), None);

        let conflicting = ["gpu-probe", "--sim", "--bash", "name"];
        assert!(Cli::try_parse_from(conflicting).is_err());
    }

    #[test]
    fn test_gpu_selector() {
        assert_eq!(parse(&["name"]).gpu, DeviceSelector::All);
        assert_eq!(parse(&["--gpu", "2", "name"]).gpu, DeviceSelector::Index(2));
        assert_eq!(parse(&["--gpu", "-1", "name"]).gpu, DeviceSelector::All);
    }

    #[test]
    fn test_hyphenated_field_tokens() {
        let cli = parse(&["--sim", "--gpu", "0", "--temp", "--mem", "count"]);
        assert_eq!(cli.fields, vec!["--temp", "--mem", "count"]);

        let selection = parse_selection(&cli.fields).unwrap();
        assert!(selection.wants_count());
        assert!(selection.includes(Field::Temperature));
        assert!(selection.includes(Field::Memory));
    }

    #[test]
    fn test_strict_selection() {
        assert!(parse_selection(&[]).is_err());

        let tokens = vec!["temp".to_string(), "bogus".to_string()];
        assert_eq!(parse_selection(&tokens).unwrap_err(), "Unknown field: bogus");
    }

    #[test]
    fn test_usage_lists_every_field() {
        let text = usage();
        for field in Field::ALL {
            assert!(text.contains(field.token()));
        }
    }
}
