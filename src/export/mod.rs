// Export module
// Serializes fret events into text, structured and binary interchange formats

pub mod literal;
pub mod midi;
pub mod packed;
pub mod raw;
pub mod structured;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fretboard::{format_duration, FretEvent, Tuning};

pub use literal::to_literal_array;
pub use midi::{reconstruct_midi, write_classified, ReconstructOptions};
pub use packed::{decode_packed, encode_packed, PackedStream};
pub use raw::{decode_raw, encode_raw, RawOptions, RawRecord, RawTiming};
pub use structured::{to_json, to_structured, StructuredEvent, StructuredSong};

/// Errors raised while encoding or decoding an output format
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Time {time_ms}ms does not fit the 16-bit raw time field")]
    TimeOverflow { time_ms: u32 },

    #[error("Fret {fret} cannot be encoded")]
    FretOutOfRange { fret: i8 },

    #[error("String {string} is outside 1-6")]
    StringOutOfRange { string: u8 },

    #[error("Too many events for a 16-bit count: {count}")]
    TooManyEvents { count: usize },

    #[error("Stream truncated: needed {needed} bytes, found {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Stream has {extra} unexpected trailing bytes")]
    TrailingBytes { extra: usize },

    #[error("Failed to write MIDI: {0}")]
    MidiWrite(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Available output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// C array declaration text
    Literal,

    /// JSON document with duration and `{time, string, fret}` events
    Json,

    /// Headerless 4-byte little-endian records
    Raw,

    /// Duration/count header plus 5-byte big-endian records
    Packed,

    /// Single-track MIDI file rebuilt from the events
    Midi,
}

impl ExportFormat {
    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Literal => "h",
            ExportFormat::Json => "json",
            ExportFormat::Raw => "raw",
            ExportFormat::Packed => "bin",
            ExportFormat::Midi => "mid",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ExportFormat::Literal | ExportFormat::Json)
    }
}

/// Per-format options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub raw: RawOptions,
    pub reconstruct: ReconstructOptions,
    pub tuning: Tuning,
}

/// Serialize a fret event sequence in the requested format
///
/// Text formats come back as UTF-8 bytes.
pub fn export(
    events: &[FretEvent],
    duration_ms: u32,
    format: ExportFormat,
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    let bytes = match format {
        ExportFormat::Literal => to_literal_array(events).into_bytes(),
        ExportFormat::Json => to_json(events, &format_duration(duration_ms))?.into_bytes(),
        ExportFormat::Raw => encode_raw(events, &options.raw)?,
        ExportFormat::Packed => encode_packed(events, duration_ms)?,
        ExportFormat::Midi => reconstruct_midi(events, &options.tuning, &options.reconstruct)?,
    };

    log::debug!("Exported {} events as {:?} ({} bytes)", events.len(), format, bytes.len());

    Ok(bytes)
}
