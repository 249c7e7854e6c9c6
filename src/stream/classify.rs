// Track Classifier - Splits a note stream into a global meta track and melodic tracks
// Percussion-only and note-less tracks are discarded

use serde::{Deserialize, Serialize};

use super::types::{NoteEvent, NoteStream, Track, PERCUSSION_CHANNEL};

/// Result of classifying a stream's tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedStream {
    pub ticks_per_quarter: u16,

    /// Tempo, time and key signature events gathered from every track
    pub meta_track: Track,

    /// Tracks whose first note event is off the percussion channel, in input order
    pub melodic_tracks: Vec<Track>,

    /// Number of input tracks that were not kept as melodic
    pub dropped_tracks: usize,
}

impl ClassifiedStream {
    /// All tracks in merge order: meta track first, then melodic tracks
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        std::iter::once(&self.meta_track).chain(self.melodic_tracks.iter())
    }
}

/// Classification of a single track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackRole {
    Melodic,
    Percussion,
    NoNotes,
}

/// Decide a track's role from its first note event
///
/// Only the first note-on/note-off is inspected; later events never change the result.
pub fn track_role(track: &Track, percussion_channel: u8) -> TrackRole {
    match track.events.iter().find(|event| event.is_note()) {
        Some(event) if event.is_percussion(percussion_channel) => TrackRole::Percussion,
        Some(_) => TrackRole::Melodic,
        None => TrackRole::NoNotes,
    }
}

/// True if the track should be mapped onto the fretboard
pub fn is_melodic(track: &Track, percussion_channel: u8) -> bool {
    track_role(track, percussion_channel) == TrackRole::Melodic
}

/// Collect tempo, time signature and key signature events from every track
///
/// Each copied event keeps the delta it had in its source track and the copies
/// are appended track after track, so the meta track's timing only matches
/// global time when a single track carries meta events.
pub fn extract_meta_track(tracks: &[Track]) -> Track {
    let events: Vec<NoteEvent> = tracks
        .iter()
        .flat_map(|track| track.events.iter())
        .filter(|event| event.is_global_meta())
        .copied()
        .collect();

    Track::from_deltas(events)
}

/// Classify with the standard percussion channel
pub fn classify(stream: &NoteStream) -> ClassifiedStream {
    classify_with_channel(stream, PERCUSSION_CHANNEL)
}

/// Split a stream into a synthetic meta track plus its melodic tracks
pub fn classify_with_channel(stream: &NoteStream, percussion_channel: u8) -> ClassifiedStream {
    let meta_track = extract_meta_track(&stream.tracks);

    let melodic_tracks: Vec<Track> = stream
        .tracks
        .iter()
        .filter(|track| is_melodic(track, percussion_channel))
        .cloned()
        .collect();

    let dropped_tracks = stream.tracks.len() - melodic_tracks.len();

    log::debug!(
        "Classified {} tracks: {} melodic, {} dropped, {} meta events",
        stream.tracks.len(),
        melodic_tracks.len(),
        dropped_tracks,
        meta_track.len()
    );

    ClassifiedStream {
        ticks_per_quarter: stream.ticks_per_quarter,
        meta_track,
        melodic_tracks,
        dropped_tracks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::types::{ChannelMessage, EventKind, MetaKind};

    fn stream(tracks: Vec<Track>) -> NoteStream {
        NoteStream {
            ticks_per_quarter: 480,
            tracks,
        }
    }

    #[test]
    fn test_melodic_track_detection() {
        let track = Track::from_deltas(vec![
            NoteEvent::meta(0, MetaKind::Other),
            NoteEvent::note_on(0, 0, 60, 100),
            NoteEvent::note_off(480, 0, 60, 0),
        ]);
        assert_eq!(track_role(&track, 9), TrackRole::Melodic);
    }

    #[test]
    fn test_first_note_event_decides() {
        // Drum hit first: the whole track is treated as percussion
        let track = Track::from_deltas(vec![
            NoteEvent::note_on(0, 9, 36, 100),
            NoteEvent::note_on(0, 0, 60, 100),
        ]);
        assert_eq!(track_role(&track, 9), TrackRole::Percussion);

        // Melodic note first: later drum hits do not matter
        let track = Track::from_deltas(vec![
            NoteEvent::note_off(0, 2, 60, 0),
            NoteEvent::note_on(0, 9, 36, 100),
        ]);
        assert_eq!(track_role(&track, 9), TrackRole::Melodic);
    }

    #[test]
    fn test_track_without_notes_is_dropped() {
        let track = Track::from_deltas(vec![
            NoteEvent::set_tempo(0, 500_000),
            NoteEvent::channel_message(0, 0, ChannelMessage::ProgramChange(0)),
        ]);
        assert_eq!(track_role(&track, 9), TrackRole::NoNotes);
        assert!(!is_melodic(&track, 9));
    }

    #[test]
    fn test_meta_track_collects_from_all_tracks() {
        let conductor = Track::from_deltas(vec![
            NoteEvent::meta(0, MetaKind::Other),
            NoteEvent::set_tempo(0, 600_000),
            NoteEvent::meta(0, MetaKind::TimeSignature(4, 2, 24, 8)),
            NoteEvent::meta(0, MetaKind::EndOfTrack),
        ]);
        let drums = Track::from_deltas(vec![
            NoteEvent::note_on(0, 9, 36, 100),
            NoteEvent::set_tempo(960, 400_000),
        ]);
        let lead = Track::from_deltas(vec![
            NoteEvent::meta(0, MetaKind::KeySignature(1, false)),
            NoteEvent::note_on(0, 0, 64, 100),
        ]);

        let classified = classify(&stream(vec![conductor, drums, lead.clone()]));

        let kinds: Vec<EventKind> = classified.meta_track.events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::SetTempo,
                EventKind::Meta(MetaKind::TimeSignature(4, 2, 24, 8)),
                EventKind::SetTempo,
                EventKind::Meta(MetaKind::KeySignature(1, false)),
            ]
        );

        // Deltas are copied verbatim, absolute ticks follow from the copies
        let ticks: Vec<u64> = classified.meta_track.events.iter().map(|e| e.absolute_tick).collect();
        assert_eq!(ticks, vec![0, 0, 960, 960]);

        assert_eq!(classified.melodic_tracks, vec![lead]);
        assert_eq!(classified.dropped_tracks, 2);
    }

    #[test]
    fn test_tracks_iterate_meta_first() {
        let lead = Track::from_deltas(vec![NoteEvent::note_on(0, 0, 64, 100)]);
        let bass = Track::from_deltas(vec![NoteEvent::note_on(0, 1, 40, 100)]);
        let classified = classify(&stream(vec![lead.clone(), bass.clone()]));

        let tracks: Vec<&Track> = classified.tracks().collect();
        assert_eq!(tracks.len(), 3);
        assert!(tracks[0].is_empty());
        assert_eq!(tracks[1], &lead);
        assert_eq!(tracks[2], &bass);
    }

    #[test]
    fn test_custom_percussion_channel() {
        let track = Track::from_deltas(vec![NoteEvent::note_on(0, 9, 60, 100)]);
        assert!(!is_melodic(&track, 9));
        assert!(is_melodic(&track, 15));
    }
}
