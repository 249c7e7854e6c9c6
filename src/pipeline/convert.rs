// Conversion - Runs parse, classify, resolve and assign over one input buffer
// Each call owns all of its state, so conversions can run in parallel

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{Config, ConfigError};
use crate::export::{self, ExportError, ExportFormat, StructuredEvent};
use crate::fretboard::{format_duration, AssignStats, FretEvent, FretboardMapper};
use crate::stream::{self, ParseError};
use super::trace::{Stage, TraceEntry, TraceWriter};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The plain conversion result: formatted duration plus `{time, string, fret}` events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    pub duration: String,
    pub events: Vec<StructuredEvent>,
}

/// Conversion result with diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub run_id: Uuid,

    /// SHA-256 of the input buffer, hex encoded
    pub input_sha256: String,

    pub ticks_per_quarter: u16,
    pub melodic_tracks: usize,
    pub dropped_tracks: usize,
    pub tempo_changes: usize,

    pub duration_ms: u32,

    /// `minutes:seconds`
    pub duration: String,

    pub events: Vec<FretEvent>,
    pub stats: AssignStats,
}

impl ConversionReport {
    pub fn to_conversion(&self) -> Conversion {
        Conversion {
            duration: self.duration.clone(),
            events: export::to_structured(&self.events),
        }
    }

    /// Serialize the events with the given format
    pub fn export(&self, format: ExportFormat, config: &Config) -> Result<Vec<u8>, ExportError> {
        export::export(&self.events, self.duration_ms, format, &config.export_options())
    }
}

/// Convert a MIDI buffer with standard tuning and the given fret limit
pub fn convert(bytes: &[u8], max_frets: u8) -> Result<Conversion, ConvertError> {
    let config = Config {
        max_frets,
        ..Config::default()
    };
    Ok(Converter::new(config).convert(bytes)?.to_conversion())
}

/// Configured conversion runner with an optional trace file
#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: Config,
    trace: Option<TraceWriter>,
}

impl Converter {
    pub fn new(config: Config) -> Self {
        Converter {
            config,
            trace: None,
        }
    }

    /// Append stage entries to a JSONL trace file
    pub fn with_trace(mut self, writer: TraceWriter) -> Self {
        self.trace = Some(writer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full pipeline on one buffer
    pub fn convert(&self, bytes: &[u8]) -> Result<ConversionReport, ConvertError> {
        self.config.validate()?;
        let run_id = Uuid::new_v4();
        let input_sha256 = calculate_sha256(bytes);

        let parsed = stream::parse_stream(bytes)?;
        self.record(
            TraceEntry::completed(run_id, Stage::Parse, format!("Parsed {} tracks", parsed.tracks.len()))
                .with_data(serde_json::json!({
                    "tracks": parsed.tracks.len(),
                    "ticks_per_quarter": parsed.ticks_per_quarter,
                    "input_sha256": input_sha256,
                })),
        );

        let classified = stream::classify_with_channel(&parsed, self.config.percussion_channel);
        self.record(
            TraceEntry::completed(
                run_id,
                Stage::Classify,
                format!("Kept {} melodic tracks", classified.melodic_tracks.len()),
            )
            .with_data(serde_json::json!({
                "melodic_tracks": classified.melodic_tracks.len(),
                "dropped_tracks": classified.dropped_tracks,
                "meta_events": classified.meta_track.len(),
            })),
        );

        let timeline = stream::resolve(&classified);
        let tempo_changes = timeline.tempo_map.change_count();
        self.record(
            TraceEntry::completed(
                run_id,
                Stage::Resolve,
                format!("Resolved {} events", timeline.events.len()),
            )
            .with_data(serde_json::json!({
                "events": timeline.events.len(),
                "tempo_changes": tempo_changes,
            })),
        );

        let mapper: FretboardMapper = self.config.mapper();
        let assignment = mapper.assign(&timeline.events);
        self.record(
            TraceEntry::completed(
                run_id,
                Stage::Assign,
                format!("Produced {} fret events", assignment.events.len()),
            )
            .with_data(serde_json::to_value(assignment.stats).unwrap_or_default()),
        );

        let duration_ms = assignment.duration_ms();

        log::info!(
            "Converted input {}: {} fret events, {} notes dropped, duration {}",
            &input_sha256[..12],
            assignment.events.len(),
            assignment.stats.dropped,
            format_duration(duration_ms)
        );

        Ok(ConversionReport {
            run_id,
            input_sha256,
            ticks_per_quarter: classified.ticks_per_quarter,
            melodic_tracks: classified.melodic_tracks.len(),
            dropped_tracks: classified.dropped_tracks,
            tempo_changes,
            duration_ms,
            duration: format_duration(duration_ms),
            events: assignment.events,
            stats: assignment.stats,
        })
    }

    /// Convert and serialize in one step
    pub fn convert_to(&self, bytes: &[u8], format: ExportFormat) -> Result<Vec<u8>, ConvertError> {
        let report = self.convert(bytes)?;
        let output = report.export(format, &self.config)?;
        self.record(
            TraceEntry::completed(report.run_id, Stage::Export, format!("Wrote {:?} output", format))
                .with_data(serde_json::json!({ "bytes": output.len() })),
        );
        Ok(output)
    }

    /// Classify the input and write it back as a melodic-only MIDI file
    pub fn strip(&self, bytes: &[u8]) -> Result<Vec<u8>, ConvertError> {
        let parsed = stream::parse_stream(bytes)?;
        let classified = stream::classify_with_channel(&parsed, self.config.percussion_channel);
        Ok(export::write_classified(&classified)?)
    }

    fn record(&self, entry: TraceEntry) {
        if let Some(writer) = &self.trace {
            if let Err(e) = writer.write(&entry) {
                log::warn!("Failed to write trace to {}: {}", writer.path().display(), e);
            }
        }
    }
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
