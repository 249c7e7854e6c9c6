// Structured event list - One mapping per event, ready for JSON or any serde format

use serde::{Deserialize, Serialize};

use crate::fretboard::FretEvent;

/// A fret event as `{time, string, fret}`; fret -1 marks a release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredEvent {
    pub time: u32,
    pub string: u8,
    pub fret: i8,
}

impl From<&FretEvent> for StructuredEvent {
    fn from(event: &FretEvent) -> Self {
        StructuredEvent {
            time: event.time_ms,
            string: event.string,
            fret: event.fret,
        }
    }
}

impl From<StructuredEvent> for FretEvent {
    fn from(event: StructuredEvent) -> Self {
        FretEvent::from_triple(event.time, event.string, event.fret)
    }
}

/// A song rendered as a structured document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSong {
    /// `minutes:seconds`
    pub duration: String,
    pub events: Vec<StructuredEvent>,
}

pub fn to_structured(events: &[FretEvent]) -> Vec<StructuredEvent> {
    events.iter().map(StructuredEvent::from).collect()
}

/// Pretty JSON document with duration and events
pub fn to_json(events: &[FretEvent], duration: &str) -> Result<String, serde_json::Error> {
    let song = StructuredSong {
        duration: duration.to_string(),
        events: to_structured(events),
    };
    serde_json::to_string_pretty(&song)
}
