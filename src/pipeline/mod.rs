// Pipeline module
// Orchestrates a full conversion and records its progress

pub mod convert;
pub mod trace;

pub use convert::{calculate_sha256, convert, Conversion, ConversionReport, ConvertError, Converter};
pub use trace::{read_trace_file, Stage, TraceEntry, TraceError, TraceWriter};
