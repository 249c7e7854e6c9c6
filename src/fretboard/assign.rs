// Fretboard Assignment - Places a resolved note timeline onto six strings
// Greedy first-fit: strings tried thickest first, one sounding note per string

use serde::{Deserialize, Serialize};

use crate::stream::{ResolvedEvent, PERCUSSION_CHANNEL};
use super::tuning::{StringBoard, Tuning};

/// Fret value carried by release events
pub const FRET_OFF: i8 = -1;

/// Default highest playable fret
pub const DEFAULT_MAX_FRETS: u8 = 10;

/// Whether a fret event starts or stops a string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    On,
    Off,
}

/// One pluck or release of a single string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FretEvent {
    /// Absolute time in milliseconds
    pub time_ms: u32,

    /// String number, 1 (highest) to 6 (lowest)
    pub string: u8,

    /// Fret for on-events, `-1` for off-events
    pub fret: i8,

    pub edge: Edge,
}

impl FretEvent {
    pub fn on(time_ms: u32, string: u8, fret: u8) -> Self {
        FretEvent {
            time_ms,
            string,
            fret: fret as i8,
            edge: Edge::On,
        }
    }

    pub fn off(time_ms: u32, string: u8) -> Self {
        FretEvent {
            time_ms,
            string,
            fret: FRET_OFF,
            edge: Edge::Off,
        }
    }

    /// Rebuild an event from a `(time, string, fret)` triple; fret `-1` means off
    pub fn from_triple(time_ms: u32, string: u8, fret: i8) -> Self {
        if fret < 0 {
            FretEvent::off(time_ms, string)
        } else {
            FretEvent::on(time_ms, string, fret as u8)
        }
    }

    pub fn is_on(&self) -> bool {
        self.edge == Edge::On
    }
}

/// Counters describing what the assignment did with its input
///
/// Purely diagnostic; the emitted events never depend on them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignStats {
    /// Note-ons placed on a string
    pub placed: usize,

    /// Note-ons with no free string in range
    pub dropped: usize,

    /// Note-offs that freed a string
    pub released: usize,

    /// Note-offs whose note was not sounding on any string
    pub orphan_offs: usize,

    /// Note events skipped for sitting on the percussion channel
    pub ignored_percussion: usize,
}

/// Events produced by one assignment run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Sorted by `time_ms`, insertion order on ties
    pub events: Vec<FretEvent>,
    pub stats: AssignStats,
}

impl Assignment {
    /// Time of the last event, or 0 when nothing was placed
    pub fn duration_ms(&self) -> u32 {
        self.events.last().map(|event| event.time_ms).unwrap_or(0)
    }

    /// Duration as `minutes:seconds`
    pub fn duration(&self) -> String {
        format_duration(self.duration_ms())
    }
}

/// Configuration of the assignment engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FretboardMapper {
    pub tuning: Tuning,
    pub max_frets: u8,
    pub percussion_channel: u8,
}

impl Default for FretboardMapper {
    fn default() -> Self {
        FretboardMapper {
            tuning: Tuning::standard(),
            max_frets: DEFAULT_MAX_FRETS,
            percussion_channel: PERCUSSION_CHANNEL,
        }
    }
}

impl FretboardMapper {
    /// Standard tuning with a custom fret limit
    pub fn with_max_frets(max_frets: u8) -> Self {
        FretboardMapper {
            max_frets,
            ..FretboardMapper::default()
        }
    }

    /// Run the greedy placement over a resolved timeline
    ///
    /// String state lives only for the duration of this call.
    pub fn assign(&self, timeline: &[ResolvedEvent]) -> Assignment {
        let mut board = StringBoard::new();
        let mut stats = AssignStats::default();
        let mut events = Vec::new();

        for resolved in timeline {
            let event = &resolved.event;
            if !event.is_note() {
                continue;
            }
            if event.is_percussion(self.percussion_channel) {
                stats.ignored_percussion += 1;
                continue;
            }
            let Some(note) = event.note else {
                continue;
            };
            let time_ms = resolved.time_ms();

            if event.is_sounding_on() {
                match self.place(&mut board, note) {
                    Some((string, fret)) => {
                        events.push(FretEvent::on(time_ms, string, fret));
                        stats.placed += 1;
                    }
                    None => {
                        log::trace!("Dropped note {} at {}ms: no free string", note, time_ms);
                        stats.dropped += 1;
                    }
                }
            } else if event.is_release() {
                match board.release(note) {
                    Some(string) => {
                        events.push(FretEvent::off(time_ms, string));
                        stats.released += 1;
                    }
                    None => stats.orphan_offs += 1,
                }
            }
        }

        events.sort_by_key(|event| event.time_ms);

        log::debug!(
            "Assigned {} fret events: {} placed, {} dropped, {} orphan note-offs",
            events.len(),
            stats.placed,
            stats.dropped,
            stats.orphan_offs
        );

        Assignment { events, stats }
    }

    /// First string (6 down to 1) that is free and can reach the note
    fn place(&self, board: &mut StringBoard, note: u8) -> Option<(u8, u8)> {
        let (string, fret) = Tuning::placement_order()
            .filter(|&string| board.is_free(string))
            .find_map(|string| {
                self.tuning
                    .fret_for(string, note, self.max_frets)
                    .map(|fret| (string, fret))
            })?;
        board.occupy(string, note);
        Some((string, fret))
    }
}

/// Assign with standard tuning and the given fret limit
pub fn assign(timeline: &[ResolvedEvent], max_frets: u8) -> Assignment {
    FretboardMapper::with_max_frets(max_frets).assign(timeline)
}

/// Format milliseconds as `minutes:seconds`, seconds zero-padded
pub fn format_duration(duration_ms: u32) -> String {
    let total_seconds = duration_ms / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}
