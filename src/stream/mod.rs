// Note stream module
// Container decoding, track classification and tempo-aware time resolution

pub mod classify;
pub mod parse;
pub mod tempo;
pub mod types;

pub use classify::{classify, classify_with_channel, ClassifiedStream, TrackRole};
pub use parse::{parse_stream, ParseError};
pub use tempo::{resolve, ResolvedEvent, TempoMap, Timeline};
pub use types::{ChannelMessage, EventKind, MetaKind, NoteEvent, NoteStream, Track, DEFAULT_TEMPO, PERCUSSION_CHANNEL};
