use std::fmt::Write as _;
use std::fs::File;
use std::io;
use std::sync::Arc;

use serde::Serialize;

use wav_recorder_core::storage::metadata::read_metadata;
use wav_recorder_core::{
    inspect_file, AudioSource, CaptureDelegate, CaptureError, CaptureLoop, CaptureState, DataLayout, FileReport,
    FrameProgress, FsStorage, RecordingConfiguration, RecordingMetadata, RecordingResult, StopHandle,
};

use crate::cli::{InputKind, InspectArgs, OutputFormat, RecordArgs};
use crate::error::CliError;
use crate::stream_source::StreamSource;
use crate::tone_source::ToneSource;

/// CaptureDelegate that reports session events through `log`.
pub struct ProgressLogger;

impl CaptureDelegate for ProgressLogger {
    fn on_state_changed(&self, state: &CaptureState) {
        match state.error() {
            Some(err) => log::info!("session {} ({})", state.name(), err),
            None => log::info!("session {}", state.name()),
        }
    }

    fn on_frame_appended(&self, progress: &FrameProgress) {
        log::debug!(
            "frame {}: +{} bytes, payload {} bytes, file {} bytes",
            progress.frames_appended,
            progress.frame_bytes,
            progress.payload_bytes,
            progress.total_bytes
        );
    }

    fn on_error(&self, error: &CaptureError) {
        if error.is_fatal() {
            log::error!("{}", error);
        } else {
            log::warn!("{}", error);
        }
    }

    fn on_capture_finished(&self, result: &RecordingResult) {
        log::info!(
            "finished {}: {:.2}s, {} frames, sha256 {}",
            result.file_path.display(),
            result.duration_secs,
            result.frames_appended,
            result.checksum
        );
    }
}

/// Run a recording session for `args`, stopping early when `stop` is requested.
pub fn record(args: &RecordArgs, stop: StopHandle) -> Result<RecordingResult, CliError> {
    let config = args.to_configuration()?;
    let storage = FsStorage::new(&args.root).create_root(true);

    match args.input_kind() {
        InputKind::Stdin => {
            let source = StreamSource::new("stdin", io::stdin(), config.frame_bytes).stop_at_end(stop.clone());
            capture(source, storage, config, stop)
        }
        InputKind::File(path) => {
            let file = File::open(&path).map_err(|source| CliError::InputOpen {
                path: path.clone(),
                source,
            })?;
            let name = path.display().to_string();
            let source = StreamSource::new(name, file, config.frame_bytes).stop_at_end(stop.clone());
            capture(source, storage, config, stop)
        }
        InputKind::Tone => {
            let source = ToneSource::new(config.channels, config.sample_rate, config.bit_depth, args.tone_hz)?
                .paced(args.realtime);
            capture(source, storage, config, stop)
        }
    }
}

fn capture<A: AudioSource>(
    source: A,
    storage: FsStorage,
    config: RecordingConfiguration,
    stop: StopHandle,
) -> Result<RecordingResult, CliError> {
    log::info!(
        "recording {} from {} into {}",
        config.output_path.display(),
        source.describe(),
        storage.root().display()
    );

    let mut session = CaptureLoop::new(source, storage, config).with_stop_handle(stop);
    session.set_delegate(Arc::new(ProgressLogger));
    Ok(session.run()?)
}

/// One-paragraph summary of a finished recording.
pub fn render_result(result: &RecordingResult) -> String {
    format!(
        "{}\n  {} Hz, {} ch, {}-bit, {:?} chunking\n  {} payload bytes ({} on disk) in {} frames, {:.3}s\n  stopped: {:?}\n  sha256: {}",
        result.file_path.display(),
        result.metadata.sample_rate,
        result.metadata.channels,
        result.metadata.bit_depth,
        result.metadata.chunking_mode,
        result.payload_bytes,
        result.total_bytes,
        result.frames_appended,
        result.duration_secs,
        result.stop_reason,
        result.checksum
    )
}

#[derive(Serialize)]
struct InspectOutput<'a> {
    file: String,
    consistent: bool,
    report: &'a FileReport,
    metadata: Option<RecordingMetadata>,
}

/// Inspect a recording and render the report. The flag is whether the file
/// is consistent.
pub fn inspect(args: &InspectArgs) -> Result<(String, bool), CliError> {
    let report = inspect_file(&args.file)?;
    let metadata = read_metadata(&args.file).ok();
    let consistent = report.is_consistent();

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&InspectOutput {
            file: args.file.display().to_string(),
            consistent,
            report: &report,
            metadata,
        })?,
        OutputFormat::Text => render_report(&args.file.display().to_string(), &report, metadata.as_ref()),
    };
    Ok((rendered, consistent))
}

fn render_report(file: &str, report: &FileReport, metadata: Option<&RecordingMetadata>) -> String {
    let header = &report.header;
    let mut out = String::new();
    let _ = writeln!(out, "{}", file);
    let _ = writeln!(
        out,
        "  format:   {} Hz, {} ch, {}-bit PCM",
        header.sample_rate, header.channels, header.bit_depth
    );
    let _ = writeln!(
        out,
        "  header:   RIFF size {}, data size {}",
        header.file_size, header.data_bytes
    );
    let _ = writeln!(out, "  on disk:  {} bytes", report.file_len);
    let layout = match report.layout {
        DataLayout::Single => "single data chunk".to_string(),
        DataLayout::PerFrame { frames } => format!("{} per-frame data chunks", frames),
        DataLayout::Unknown => "unrecognized".to_string(),
    };
    let _ = writeln!(out, "  layout:   {}", layout);
    let _ = writeln!(out, "  duration: {:.3}s", report.duration_secs);
    if let Some(metadata) = metadata {
        let _ = writeln!(out, "  recorded: {} ({})", metadata.created_at, metadata.id);
        let _ = writeln!(out, "  sha256:   {}", metadata.checksum);
    }
    let _ = write!(
        out,
        "  status:   {}",
        if report.is_consistent() { "consistent" } else { "INCONSISTENT" }
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    use clap::Parser;
    use wav_recorder_core::StopReason;

    use crate::cli::{Cli, Command};

    fn parse(argv: &[&str]) -> Command {
        Cli::try_parse_from(argv).unwrap().command
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(name);
        fs::remove_dir_all(&root).ok();
        root
    }

    #[test]
    fn records_a_tone_to_the_byte_budget() {
        let root = scratch_dir("wav_record_cmd_tone_test");
        let root_arg = root.to_string_lossy().into_owned();
        let Command::Record(args) = parse(&[
            "wav-record",
            "record",
            "--root",
            &root_arg,
            "--output",
            "tone.wav",
            "--input",
            "tone",
            "--sample-rate",
            "16000",
            "--max-bytes",
            "8192",
        ]) else {
            panic!("expected record");
        };

        let result = record(&args, StopHandle::new()).unwrap();
        assert_eq!(result.stop_reason, StopReason::ByteBudget);
        assert_eq!(result.payload_bytes, 8192);
        assert!(render_result(&result).contains("sha256"));

        let reader = hound::WavReader::open(root.join("tone.wav")).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.len(), 4096);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn records_raw_pcm_from_a_file() {
        let root = scratch_dir("wav_record_cmd_file_test");
        fs::create_dir_all(&root).unwrap();
        let raw = root.join("input.raw");
        fs::write(&raw, vec![0x11u8; 3000]).unwrap();

        let root_arg = root.to_string_lossy().into_owned();
        let raw_arg = raw.to_string_lossy().into_owned();
        let Command::Record(args) = parse(&[
            "wav-record",
            "record",
            "--root",
            &root_arg,
            "--output",
            "copy.wav",
            "--input",
            &raw_arg,
            "--unbounded",
        ]) else {
            panic!("expected record");
        };

        let result = record(&args, StopHandle::new()).unwrap();
        assert_eq!(result.stop_reason, StopReason::Cancelled);
        assert_eq!(result.payload_bytes, 3000);

        let bytes = fs::read(root.join("copy.wav")).unwrap();
        assert_eq!(bytes.len(), 3044);
        assert!(bytes[44..].iter().all(|&b| b == 0x11));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn missing_input_file_is_reported() {
        let root = scratch_dir("wav_record_cmd_missing_test");
        let root_arg = root.to_string_lossy().into_owned();
        let Command::Record(args) = parse(&[
            "wav-record",
            "record",
            "--root",
            &root_arg,
            "--input",
            "/nonexistent/input.raw",
        ]) else {
            panic!("expected record");
        };

        assert!(matches!(record(&args, StopHandle::new()), Err(CliError::InputOpen { .. })));
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn inspect_reports_a_recording_and_its_sidecar() {
        let root = scratch_dir("wav_record_cmd_inspect_test");
        let root_arg = root.to_string_lossy().into_owned();
        let Command::Record(args) = parse(&[
            "wav-record",
            "record",
            "--root",
            &root_arg,
            "--output",
            "take.wav",
            "--input",
            "tone",
            "--max-bytes",
            "4096",
        ]) else {
            panic!("expected record");
        };
        let result = record(&args, StopHandle::new()).unwrap();

        let file = root.join("take.wav");
        let file_arg = file.to_string_lossy().into_owned();
        let Command::Inspect(text_args) = parse(&["wav-record", "inspect", &file_arg]) else {
            panic!("expected inspect");
        };
        let (text, consistent) = inspect(&text_args).unwrap();
        assert!(consistent);
        assert!(text.contains("single data chunk"));
        assert!(text.contains(&result.checksum));

        let Command::Inspect(json_args) = parse(&["wav-record", "inspect", &file_arg, "--format", "json"]) else {
            panic!("expected inspect");
        };
        let (json, _) = inspect(&json_args).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["consistent"], true);
        assert_eq!(value["report"]["layout"]["kind"], "single");
        assert_eq!(value["metadata"]["payload_bytes"], 4096);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn inspect_flags_a_truncated_file() {
        let root = scratch_dir("wav_record_cmd_truncated_test");
        fs::create_dir_all(&root).unwrap();
        let file = root.join("torn.wav");

        let header = wav_recorder_core::processing::wav_format::build_header(1, 8000, 16)
            .unwrap()
            .resized(44 + 400, 400)
            .unwrap();
        let mut bytes = wav_recorder_core::processing::wav_format::serialize_header(&header).to_vec();
        bytes.extend(vec![0u8; 200]);
        fs::write(&file, bytes).unwrap();

        let (text, consistent) = inspect(&InspectArgs {
            file,
            format: OutputFormat::Text,
        })
        .unwrap();
        assert!(!consistent);
        assert!(text.contains("INCONSISTENT"));

        fs::remove_dir_all(&root).ok();
    }
}
