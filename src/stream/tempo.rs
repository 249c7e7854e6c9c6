// Time Resolver - Merges tracks into one timeline and converts ticks to seconds
// A running tempo converts each tick delta at the tempo in effect when it is consumed

use serde::{Deserialize, Serialize};

use super::classify::ClassifiedStream;
use super::types::{EventKind, NoteEvent, DEFAULT_TEMPO};

/// A tempo change at a position on the merged timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: u64,

    /// Microseconds per quarter note
    pub micros_per_quarter: u32,
}

/// Ordered tempo changes, always starting with the default tempo at tick 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoMap {
    changes: Vec<TempoChange>,
}

impl Default for TempoMap {
    fn default() -> Self {
        TempoMap::new()
    }
}

impl TempoMap {
    /// Map holding only the default 120 BPM tempo
    pub fn new() -> Self {
        TempoMap {
            changes: vec![TempoChange {
                tick: 0,
                micros_per_quarter: DEFAULT_TEMPO,
            }],
        }
    }

    /// Record a tempo change; ticks must be non-decreasing
    pub fn push(&mut self, tick: u64, micros_per_quarter: u32) {
        self.changes.push(TempoChange {
            tick,
            micros_per_quarter,
        });
    }

    /// Tempo in effect at `tick` (the last change at or before it)
    pub fn tempo_at(&self, tick: u64) -> u32 {
        self.changes
            .iter()
            .take_while(|change| change.tick <= tick)
            .last()
            .map(|change| change.micros_per_quarter)
            .unwrap_or(DEFAULT_TEMPO)
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// Number of tempo changes recorded after the initial default
    pub fn change_count(&self) -> usize {
        self.changes.len() - 1
    }
}

/// Convert a tick count to seconds at a fixed tempo
pub fn ticks_to_seconds(ticks: u64, ticks_per_quarter: u16, micros_per_quarter: u32) -> f64 {
    ticks as f64 / f64::from(ticks_per_quarter) * (f64::from(micros_per_quarter) / 1_000_000.0)
}

/// Convert seconds to a (fractional) tick count at a fixed tempo
pub fn seconds_to_ticks(seconds: f64, ticks_per_quarter: u16, micros_per_quarter: u32) -> f64 {
    seconds / (f64::from(micros_per_quarter) / 1_000_000.0) * f64::from(ticks_per_quarter)
}

/// Convert beats per minute to microseconds per quarter note
pub fn bpm_to_tempo(bpm: f64) -> u32 {
    (60_000_000.0 / bpm).round() as u32
}

/// An event placed on the merged timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEvent {
    /// Elapsed seconds since the start of the stream
    pub seconds: f64,

    /// Position on the merged timeline
    pub tick: u64,

    pub event: NoteEvent,
}

impl ResolvedEvent {
    /// Elapsed time rounded to whole milliseconds, ties to even
    pub fn time_ms(&self) -> u32 {
        (self.seconds * 1000.0).round_ties_even() as u32
    }
}

/// The merged, time-resolved event sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub events: Vec<ResolvedEvent>,
    pub tempo_map: TempoMap,
}

/// Merge tracks by absolute tick, stable on ties
///
/// Events are collected track by track before a stable sort, so equal ticks
/// keep per-track order and earlier tracks come first.
pub fn merge_tracks<'a, I>(tracks: I) -> Vec<NoteEvent>
where
    I: IntoIterator<Item = &'a super::types::Track>,
{
    let mut merged: Vec<NoteEvent> = tracks
        .into_iter()
        .flat_map(|track| track.events.iter().copied())
        .collect();

    merged.sort_by_key(|event| event.absolute_tick);
    merged
}

/// Merge the meta track and melodic tracks, then resolve absolute seconds
pub fn resolve(classified: &ClassifiedStream) -> Timeline {
    let merged = merge_tracks(classified.tracks());
    resolve_merged(&merged, classified.ticks_per_quarter)
}

/// Walk a merged sequence and accumulate seconds under a running tempo
///
/// A tempo change only affects deltas consumed after it; earlier deltas are
/// never rescaled.
pub fn resolve_merged(merged: &[NoteEvent], ticks_per_quarter: u16) -> Timeline {
    let mut tempo_map = TempoMap::new();
    let mut current_tempo = DEFAULT_TEMPO;
    let mut seconds = 0.0f64;
    let mut last_tick = 0u64;
    let mut events = Vec::with_capacity(merged.len());

    for event in merged {
        let delta = event.absolute_tick.saturating_sub(last_tick);
        last_tick = event.absolute_tick;
        seconds += ticks_to_seconds(delta, ticks_per_quarter, current_tempo);

        if event.kind == EventKind::SetTempo {
            if let Some(tempo) = event.tempo_value {
                current_tempo = tempo;
                tempo_map.push(event.absolute_tick, tempo);
            }
        }

        events.push(ResolvedEvent {
            seconds,
            tick: event.absolute_tick,
            event: *event,
        });
    }

    log::debug!(
        "Resolved {} events over {:.3}s with {} tempo changes",
        events.len(),
        seconds,
        tempo_map.change_count()
    );

    Timeline { events, tempo_map }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::classify::classify;
    use crate::stream::types::{NoteStream, Track};

    #[test]
    fn test_ticks_to_seconds_default_tempo() {
        // One quarter at 120 BPM is half a second
        assert!((ticks_to_seconds(480, 480, DEFAULT_TEMPO) - 0.5).abs() < 1e-12);
        assert!((seconds_to_ticks(0.5, 480, DEFAULT_TEMPO) - 480.0).abs() < 1e-9);
    }

    #[test]
    fn test_bpm_to_tempo() {
        assert_eq!(bpm_to_tempo(120.0), 500_000);
        assert_eq!(bpm_to_tempo(60.0), 1_000_000);
    }

    #[test]
    fn test_tempo_map_lookup() {
        let mut map = TempoMap::new();
        map.push(960, 250_000);
        map.push(1920, 1_000_000);

        assert_eq!(map.tempo_at(0), DEFAULT_TEMPO);
        assert_eq!(map.tempo_at(959), DEFAULT_TEMPO);
        assert_eq!(map.tempo_at(960), 250_000);
        assert_eq!(map.tempo_at(5000), 1_000_000);
        assert_eq!(map.change_count(), 2);
    }

    #[test]
    fn test_merge_is_stable_across_tracks() {
        let first = Track::from_deltas(vec![
            NoteEvent::note_on(0, 0, 60, 90),
            NoteEvent::note_off(100, 0, 60, 0),
        ]);
        let second = Track::from_deltas(vec![
            NoteEvent::note_on(50, 1, 62, 90),
            NoteEvent::note_on(50, 1, 64, 90),
        ]);

        let merged = merge_tracks([&first, &second]);
        let notes: Vec<(u64, Option<u8>)> = merged.iter().map(|e| (e.absolute_tick, e.note)).collect();

        // Tick 100 tie: the earlier track wins
        assert_eq!(notes, vec![(0, Some(60)), (50, Some(62)), (100, Some(60)), (100, Some(64))]);
    }

    #[test]
    fn test_tempo_change_applies_forward_only() {
        let track = Track::from_deltas(vec![
            NoteEvent::note_on(480, 0, 60, 90),
            NoteEvent::set_tempo(0, 1_000_000),
            NoteEvent::note_off(480, 0, 60, 0),
        ]);

        let timeline = resolve_merged(&track.events, 480);
        let times: Vec<u32> = timeline
            .events
            .iter()
            .filter(|e| e.event.is_note())
            .map(|e| e.time_ms())
            .collect();

        // First quarter at 120 BPM, second at 60 BPM
        assert_eq!(times, vec![500, 1500]);
        assert_eq!(timeline.tempo_map.tempo_at(480), 1_000_000);
    }

    #[test]
    fn test_meta_copy_keeps_source_delta() {
        // The tempo event's own delta is 0, so its meta track copy lands at tick 0
        // and governs the first quarter as well
        let track = Track::from_deltas(vec![
            NoteEvent::note_on(480, 0, 60, 90),
            NoteEvent::set_tempo(0, 1_000_000),
            NoteEvent::note_off(480, 0, 60, 0),
        ]);
        let stream = NoteStream {
            ticks_per_quarter: 480,
            tracks: vec![track],
        };

        let timeline = resolve(&classify(&stream));
        let times: Vec<u32> = timeline
            .events
            .iter()
            .filter(|e| e.event.is_note())
            .map(|e| e.time_ms())
            .collect();

        assert_eq!(times, vec![1000, 2000]);
        assert_eq!(timeline.tempo_map.change_count(), 2);
    }

    #[test]
    fn test_time_ms_rounds_to_nearest() {
        let event = NoteEvent::note_on(0, 0, 60, 90);
        let at = |seconds: f64| ResolvedEvent {
            seconds,
            tick: 0,
            event,
        };
        assert_eq!(at(0.0).time_ms(), 0);
        assert_eq!(at(0.0016).time_ms(), 2);
        assert_eq!(at(1.0414).time_ms(), 1041);
        assert_eq!(at(2.5).time_ms(), 2500);
    }
}
