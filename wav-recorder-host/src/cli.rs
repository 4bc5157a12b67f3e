use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use wav_recorder_core::{ChunkingMode, ReadErrorPolicy, RecordingConfiguration};

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(name = "wav-record")]
#[command(version, about = "Record raw PCM into a crash-consistent WAV file")]
pub struct Cli {
    /// Log every state change and frame at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture audio until the budget is reached, the input ends, or Ctrl-C.
    Record(RecordArgs),
    /// Check a recording's header against the bytes on disk.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// JSON recording configuration; flags below override its fields.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory the output path is resolved against.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub sample_rate: Option<u32>,

    #[arg(long)]
    pub channels: Option<u16>,

    #[arg(long)]
    pub bit_depth: Option<u16>,

    /// Stop after this many payload bytes.
    #[arg(long, conflicts_with = "unbounded")]
    pub max_bytes: Option<u64>,

    /// Record without a byte budget.
    #[arg(long)]
    pub unbounded: bool,

    /// Stop after this many seconds of audio.
    #[arg(long)]
    pub max_seconds: Option<f64>,

    #[arg(long, value_enum)]
    pub chunking: Option<ChunkingArg>,

    /// Largest frame read from the input at once.
    #[arg(long)]
    pub frame_bytes: Option<usize>,

    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// End the recording after this many read errors in a row.
    #[arg(long, value_name = "COUNT")]
    pub fail_after_errors: Option<u32>,

    /// Skip the JSON metadata sidecar.
    #[arg(long)]
    pub no_metadata: bool,

    /// Audio input: `stdin`, `tone`, or a file of raw interleaved PCM.
    #[arg(short, long, default_value = "stdin")]
    pub input: String,

    /// Tone frequency for `--input tone`.
    #[arg(long, default_value_t = 440.0)]
    pub tone_hz: f64,

    /// Release tone samples at the sample rate instead of as fast as possible.
    #[arg(long)]
    pub realtime: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    pub file: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkingArg {
    Single,
    PerFrame,
}

impl From<ChunkingArg> for ChunkingMode {
    fn from(arg: ChunkingArg) -> Self {
        match arg {
            ChunkingArg::Single => ChunkingMode::Single,
            ChunkingArg::PerFrame => ChunkingMode::PerFrame,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Where `record` reads audio from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Stdin,
    Tone,
    File(PathBuf),
}

impl RecordArgs {
    pub fn input_kind(&self) -> InputKind {
        match self.input.as_str() {
            "stdin" | "-" => InputKind::Stdin,
            "tone" => InputKind::Tone,
            path => InputKind::File(PathBuf::from(path)),
        }
    }

    /// Configuration file (or defaults) with command-line overrides applied.
    pub fn to_configuration(&self) -> Result<RecordingConfiguration, CliError> {
        let mut config = match self.config {
            Some(ref path) => load_configuration(path)?,
            None => RecordingConfiguration::default(),
        };

        if let Some(ref output) = self.output {
            config.output_path = output.clone();
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(channels) = self.channels {
            config.channels = channels;
        }
        if let Some(bits) = self.bit_depth {
            config.bit_depth = bits;
        }
        if self.unbounded {
            config.max_payload_bytes = None;
        } else if let Some(bytes) = self.max_bytes {
            config.max_payload_bytes = Some(bytes);
        }
        if let Some(secs) = self.max_seconds {
            config.max_duration_secs = Some(secs);
        }
        if let Some(chunking) = self.chunking {
            config.chunking_mode = chunking.into();
        }
        if let Some(frame_bytes) = self.frame_bytes {
            config.frame_bytes = frame_bytes;
        }
        if let Some(ms) = self.read_timeout_ms {
            config.read_timeout_ms = ms;
        }
        if let Some(consecutive) = self.fail_after_errors {
            config.read_error_policy = ReadErrorPolicy::FailAfter { consecutive };
        }
        if self.no_metadata {
            config.write_metadata = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn load_configuration(path: &Path) -> Result<RecordingConfiguration, CliError> {
    let json = fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&json).map_err(|source| CliError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
