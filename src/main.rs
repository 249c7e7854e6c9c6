// Fretmap command-line entry point

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use fretmap::config::{self, Config};
use fretmap::export::{self, ExportFormat};
use fretmap::fretboard::format_duration;
use fretmap::pipeline::{Converter, TraceWriter};
use fretmap::transport;
use tracing_subscriber::EnvFilter;

/// MIDI to six-string fretboard event mapper
#[derive(Parser)]
#[command(name = "fretmap")]
#[command(about = "Map MIDI note streams onto a six-string fretboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a MIDI file into fret events
    Convert {
        /// Input MIDI file
        input: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Literal)]
        format: OutputFormat,

        /// Highest playable fret (overrides the config file)
        #[arg(long)]
        max_frets: Option<u8>,

        /// Output file; text formats go to stdout when omitted, binary ones to <stem>.frets.<ext>
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Append a JSONL stage trace to this file
        #[arg(long)]
        trace: Option<PathBuf>,
    },
    /// Write a copy of a MIDI file without percussion and note-less tracks
    Strip {
        /// Input MIDI file
        input: PathBuf,

        /// Output MIDI file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the contents of a packed event stream
    Inspect {
        /// Packed stream file
        input: PathBuf,
    },
    /// Convert a MIDI file and stream it to a device, one acknowledged record at a time
    Send {
        /// Input MIDI file
        input: PathBuf,

        /// Serial device path
        #[arg(short, long)]
        port: PathBuf,

        /// Highest playable fret (overrides the config file)
        #[arg(long)]
        max_frets: Option<u8>,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show the effective configuration
    ShowConfig {
        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Literal,
    Json,
    Raw,
    Packed,
    Midi,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Literal => ExportFormat::Literal,
            OutputFormat::Json => ExportFormat::Json,
            OutputFormat::Raw => ExportFormat::Raw,
            OutputFormat::Packed => ExportFormat::Packed,
            OutputFormat::Midi => ExportFormat::Midi,
        }
    }
}

#[derive(Debug)]
struct CommandError {
    message: String,
}

impl<E: std::fmt::Display> From<E> for CommandError {
    fn from(error: E) -> Self {
        CommandError {
            message: error.to_string(),
        }
    }
}

type CommandResult<T> = Result<T, CommandError>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e.message);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(command: Commands) -> CommandResult<()> {
    match command {
        Commands::Convert {
            input,
            format,
            max_frets,
            output,
            config,
            trace,
        } => {
            let config = load_settings(config, max_frets)?;
            let mut converter = Converter::new(config);
            if let Some(trace_path) = trace {
                converter = converter.with_trace(TraceWriter::new(trace_path));
            }

            let format = ExportFormat::from(format);
            let bytes = fs::read(&input)?;
            let data = converter.convert_to(&bytes, format)?;

            match output {
                Some(path) => write_output(&path, &data)?,
                None if format.is_text() => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(&data)?;
                    writeln!(stdout)?;
                }
                None => write_output(&default_output_path(&input, format), &data)?,
            }
        }
        Commands::Strip { input, output } => {
            let converter = Converter::new(config::load_default_config()?);
            let bytes = fs::read(&input)?;
            let stripped = converter.strip(&bytes)?;
            write_output(&output, &stripped)?;
        }
        Commands::Inspect { input } => {
            let bytes = fs::read(&input)?;
            let stream = export::decode_packed(&bytes)?;

            println!("Duration: {}", format_duration(stream.duration_ms));
            println!("Events: {}", stream.events.len());
            println!("{}", export::to_literal_array(&stream.events));
        }
        Commands::Send {
            input,
            port,
            max_frets,
            config,
        } => {
            let config = load_settings(config, max_frets)?;
            let bytes = fs::read(&input)?;
            let report = Converter::new(config.clone()).convert(&bytes)?;

            let mut link = OpenOptions::new().read(true).write(true).open(&port)?;
            let sent = transport::send_events(
                &mut link,
                &report.events,
                config.raw.timing,
                &config.transport,
            )?;

            println!(
                "Sent {} events to {} ({} unacknowledged)",
                sent.sent,
                port.display(),
                sent.mismatched
            );
        }
        Commands::ShowConfig { config } => {
            let config = load_settings(config, None)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Config file (explicit or default location) with command-line overrides
fn load_settings(path: Option<PathBuf>, max_frets: Option<u8>) -> CommandResult<Config> {
    let mut config = match path {
        Some(path) => config::load_config(path)?,
        None => config::load_default_config()?,
    };
    if let Some(max_frets) = max_frets {
        config.max_frets = max_frets;
        config.validate()?;
    }
    Ok(config)
}

/// `<stem>.frets.<ext>` next to the input
fn default_output_path(input: &Path, format: ExportFormat) -> PathBuf {
    input.with_extension(format!("frets.{}", format.extension()))
}

fn write_output(path: &Path, data: &[u8]) -> CommandResult<()> {
    fs::write(path, data)?;
    eprintln!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}
