// Fretboard module
// Maps a resolved note timeline onto the strings and frets of a six-string instrument

pub mod assign;
pub mod tuning;

pub use assign::{
    assign, format_duration, AssignStats, Assignment, Edge, FretEvent, FretboardMapper,
    DEFAULT_MAX_FRETS, FRET_OFF,
};
pub use tuning::{StringBoard, StringSlot, Tuning, STRING_COUNT};
