//! modlens - MODBUS/TCP traffic decoder
//!
//! Reads MODBUS/TCP frames from a capture file, a single hex string, a byte
//! stream (file or stdin) or a live TCP connection, and writes the decoded
//! transactions plus statistics as one JSON document.
//!
//! Per-frame problems never fail the run; they are logged and listed under
//! `diagnostics`. Only a missing or unreadable input source is fatal.

mod config;
mod output;

use anyhow::Context;
use clap::{ArgAction, ArgGroup, Parser};
use common::{init_logging, spawn_shutdown_listener, CancellationToken};
use errors::{config_error, input_error, ModlensError, ModlensResult};
use modlens_decode::{
    run_batch, run_stream, CaptureOptions, MbapCodec, ParserState, PcapFrameSource, RawFrame,
    StreamFrameSource,
};
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, CliOverrides};

#[derive(Parser, Debug)]
#[command(name = "modlens")]
#[command(version)]
#[command(about = "Decode MODBUS/TCP traffic into transactions and statistics", long_about = None)]
#[command(group(
    ArgGroup::new("input")
        .required(true)
        .args(["pcap", "raw", "stream", "connect"])
))]
struct Cli {
    /// Capture file (libpcap format)
    #[arg(long, value_name = "FILE")]
    pcap: Option<PathBuf>,

    /// Single hex-encoded frame, spaces allowed
    #[arg(long, value_name = "HEX")]
    raw: Option<String>,

    /// Back-to-back MBAP frames from a file, or `-` for stdin
    #[arg(long, value_name = "PATH")]
    stream: Option<String>,

    /// Live TCP byte stream (tap or mirror relay)
    #[arg(long, value_name = "HOST:PORT")]
    connect: Option<String>,

    /// Write the JSON document here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Configuration file (default: config/modlens.yaml when present)
    #[arg(short, long, value_name = "FILE", env = "MODLENS_CONFIG")]
    config: Option<PathBuf>,

    /// MODBUS/TCP port in capture files, repeatable (default: 502)
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    ports: Vec<u16>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Pretty-print the JSON document
    #[arg(long, conflicts_with = "compact")]
    pretty: bool,

    /// Single-line JSON document
    #[arg(long)]
    compact: bool,
}

/// The one input source selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Pcap(PathBuf),
    Raw(String),
    Stdin,
    StreamFile(PathBuf),
    Connect(String),
}

impl Cli {
    fn input(&self) -> ModlensResult<Input> {
        if let Some(path) = &self.pcap {
            return Ok(Input::Pcap(path.clone()));
        }
        if let Some(hex) = &self.raw {
            return Ok(Input::Raw(hex.clone()));
        }
        if let Some(stream) = &self.stream {
            return Ok(match stream.as_str() {
                "-" => Input::Stdin,
                path => Input::StreamFile(PathBuf::from(path)),
            });
        }
        if let Some(addr) = &self.connect {
            return Ok(Input::Connect(addr.clone()));
        }
        Err(input_error!("no input source given"))
    }

    fn overrides(&self) -> CliOverrides {
        let pretty = if self.pretty {
            Some(true)
        } else if self.compact {
            Some(false)
        } else {
            None
        };
        CliOverrides {
            ports: self.ports.clone(),
            pretty,
            verbosity: self.verbose,
        }
    }
}

// ============================================================================
// Input handling
// ============================================================================

/// A frame that is not valid hex is logged and skipped like any other bad frame
fn decode_raw(hex: &str, state: &mut ParserState) {
    match RawFrame::from_hex(hex) {
        Ok(frame) => {
            debug!("Raw frame: {} bytes", frame.len());
            state.parse_frame(&frame);
        },
        Err(e) => error!("Error parsing raw frame: {}", e),
    }
}

async fn decode_capture(
    path: PathBuf,
    options: CaptureOptions,
    mut state: ParserState,
) -> ModlensResult<ParserState> {
    if !path.exists() {
        return Err(ModlensError::FileNotFound(path.display().to_string()));
    }

    tokio::task::spawn_blocking(move || -> ModlensResult<ParserState> {
        let source = PcapFrameSource::open(&path, &options)?;
        run_batch(source, &mut state)?;
        Ok(state)
    })
    .await
    .context("capture reader task failed")?
}

async fn decode_stream<R>(
    reader: R,
    options: &CaptureOptions,
    receive_timestamps: bool,
    state: &mut ParserState,
) -> ModlensResult<()>
where
    R: AsyncRead + Unpin,
{
    let codec = MbapCodec::with_max_frame_len(options.max_frame_len);
    let mut source = StreamFrameSource::with_codec(reader, codec);
    if receive_timestamps {
        source = source.with_receive_timestamps();
    }

    let cancel = CancellationToken::new();
    let listener = spawn_shutdown_listener(cancel.clone());
    let result = run_stream(&mut source, state, cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = listener.await {
        warn!("Shutdown listener ended abnormally: {}", e);
    }

    let summary = result?;
    if summary.cancelled {
        info!("Interrupted; writing results collected so far");
    }
    Ok(())
}

async fn open_stream_file(path: &Path) -> ModlensResult<tokio::fs::File> {
    tokio::fs::File::open(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ModlensError::FileNotFound(path.display().to_string()),
        _ => ModlensError::Io(e),
    })
}

async fn process(input: Input, config: &AppConfig) -> ModlensResult<ParserState> {
    let mut state = ParserState::new();

    match input {
        Input::Raw(hex) => decode_raw(&hex, &mut state),
        Input::Pcap(path) => {
            state = decode_capture(path, config.capture.clone(), state).await?;
        },
        Input::Stdin => {
            decode_stream(tokio::io::stdin(), &config.capture, false, &mut state).await?;
        },
        Input::StreamFile(path) => {
            let file = open_stream_file(&path).await?;
            decode_stream(file, &config.capture, false, &mut state).await?;
        },
        Input::Connect(addr) => {
            let stream = tokio::net::TcpStream::connect(&addr).await?;
            info!("Connected to {}", addr);
            decode_stream(stream, &config.capture, true, &mut state).await?;
        },
    }

    Ok(state)
}

async fn run(cli: Cli, config: AppConfig) -> ModlensResult<()> {
    let input = cli.input()?;
    let state = process(input, &config).await?;

    info!("Parsed {} MODBUS transactions", state.transactions().len());
    if !state.diagnostics().is_empty() {
        info!("{} frame diagnostics recorded", state.diagnostics().len());
    }

    output::write_report(&state, &config.output, cli.output.as_deref())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config.with_overrides(&cli.overrides()),
        Err(e) => {
            eprintln!("modlens: {}", e);
            std::process::exit(e.exit_code());
        },
    };

    let log_guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            let e = config_error!("logging: {}", e);
            eprintln!("modlens: {}", e);
            std::process::exit(e.exit_code());
        },
    };

    if let Err(e) = run(cli, config).await {
        error!("{} [{}]", e, e.error_code());
        // exit() skips destructors; flush file logs first
        drop(log_guard);
        std::process::exit(e.exit_code());
    }
}
