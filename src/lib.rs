// Fretmap - MIDI to six-string fretboard event mapper
// Module declarations and public surface

pub mod config;
pub mod export;
pub mod fretboard;
pub mod pipeline;
pub mod stream;
pub mod transport;

pub use config::{load_config, Config, ConfigError};
pub use export::{ExportError, ExportFormat};
pub use fretboard::{Assignment, FretEvent, Tuning};
pub use pipeline::{convert, Conversion, ConversionReport, ConvertError, Converter};
pub use stream::ParseError;
pub use transport::{send_events, TransportError};
