// Note stream types
// Track and event model decoded from a standard MIDI container

use serde::{Deserialize, Serialize};

/// Reserved channel (0-based) carrying drum hits
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Default tempo in microseconds per quarter note (120 BPM)
pub const DEFAULT_TEMPO: u32 = 500_000;

/// Meta event payloads that survive decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaKind {
    /// numerator, denominator (power of two), clocks per click, 32nds per quarter
    TimeSignature(u8, u8, u8, u8),

    /// sharps/flats count, minor flag
    KeySignature(i8, bool),

    EndOfTrack,

    /// Any other meta or sysex event; only its delta matters
    Other,
}

/// Pitchless channel voice messages, kept so they can be written back out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMessage {
    /// key, pressure
    Aftertouch(u8, u8),

    /// controller, value
    Controller(u8, u8),

    ProgramChange(u8),
    ChannelAftertouch(u8),

    /// 14-bit value, 0x2000 is centre
    PitchBend(u16),
}

/// What a single note stream event does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    NoteOn,
    NoteOff,
    SetTempo,
    Meta(MetaKind),

    /// Channel messages that carry no pitch (program change, controllers, bends)
    Channel(ChannelMessage),
}

/// One decoded event
///
/// `delta` is relative to the previous event of the same track, `absolute_tick`
/// is the running sum of deltas within that track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub delta: u32,
    pub absolute_tick: u64,
    pub kind: EventKind,
    pub note: Option<u8>,
    pub velocity: Option<u8>,
    pub channel: Option<u8>,

    /// Microseconds per quarter note, set for `SetTempo` only
    pub tempo_value: Option<u32>,
}

impl NoteEvent {
    /// Note-on event
    pub fn note_on(delta: u32, channel: u8, note: u8, velocity: u8) -> Self {
        NoteEvent {
            delta,
            absolute_tick: 0,
            kind: EventKind::NoteOn,
            note: Some(note),
            velocity: Some(velocity),
            channel: Some(channel),
            tempo_value: None,
        }
    }

    /// Note-off event
    pub fn note_off(delta: u32, channel: u8, note: u8, velocity: u8) -> Self {
        NoteEvent {
            kind: EventKind::NoteOff,
            ..NoteEvent::note_on(delta, channel, note, velocity)
        }
    }

    /// Tempo change event
    pub fn set_tempo(delta: u32, tempo: u32) -> Self {
        NoteEvent {
            delta,
            absolute_tick: 0,
            kind: EventKind::SetTempo,
            note: None,
            velocity: None,
            channel: None,
            tempo_value: Some(tempo),
        }
    }

    /// Meta event without pitch or tempo payload
    pub fn meta(delta: u32, meta: MetaKind) -> Self {
        NoteEvent {
            kind: EventKind::Meta(meta),
            tempo_value: None,
            ..NoteEvent::set_tempo(delta, 0)
        }
    }

    /// Pitchless channel message
    pub fn channel_message(delta: u32, channel: u8, message: ChannelMessage) -> Self {
        NoteEvent {
            kind: EventKind::Channel(message),
            channel: Some(channel),
            tempo_value: None,
            ..NoteEvent::set_tempo(delta, 0)
        }
    }

    /// True for note-on and note-off events (including velocity-0 note-ons)
    pub fn is_note(&self) -> bool {
        matches!(self.kind, EventKind::NoteOn | EventKind::NoteOff)
    }

    /// True if the event starts a sounding note
    pub fn is_sounding_on(&self) -> bool {
        self.kind == EventKind::NoteOn && self.velocity.unwrap_or(0) > 0
    }

    /// True if the event ends a note (note-off or velocity-0 note-on)
    pub fn is_release(&self) -> bool {
        self.kind == EventKind::NoteOff
            || (self.kind == EventKind::NoteOn && self.velocity.unwrap_or(0) == 0)
    }

    /// True if the event sits on the given percussion channel
    pub fn is_percussion(&self, percussion_channel: u8) -> bool {
        self.channel == Some(percussion_channel)
    }

    /// Tempo, time signature and key signature events form the global meta track
    pub fn is_global_meta(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SetTempo
                | EventKind::Meta(MetaKind::TimeSignature(..))
                | EventKind::Meta(MetaKind::KeySignature(..))
        )
    }
}

/// A single track of delta-timed events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// First track name meta event, if any
    pub name: Option<String>,

    pub events: Vec<NoteEvent>,
}

impl Track {
    /// Build a track from delta-timed events, filling in absolute ticks
    pub fn from_deltas(events: Vec<NoteEvent>) -> Self {
        let mut track = Track { name: None, events };
        track.recompute_absolute();
        track
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Recompute every `absolute_tick` from the deltas
    pub fn recompute_absolute(&mut self) {
        let mut tick = 0u64;
        for event in &mut self.events {
            tick += u64::from(event.delta);
            event.absolute_tick = tick;
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// A fully decoded multi-track container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteStream {
    /// Pulses per quarter note
    pub ticks_per_quarter: u16,

    pub tracks: Vec<Track>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_zero_note_on_is_release() {
        let event = NoteEvent::note_on(0, 0, 60, 0);
        assert!(event.is_note());
        assert!(event.is_release());
        assert!(!event.is_sounding_on());
    }

    #[test]
    fn test_note_off_keeps_pitch() {
        let event = NoteEvent::note_off(12, 3, 64, 40);
        assert_eq!(event.kind, EventKind::NoteOff);
        assert_eq!(event.note, Some(64));
        assert_eq!(event.channel, Some(3));
        assert_eq!(event.delta, 12);
    }

    #[test]
    fn test_global_meta_selection() {
        assert!(NoteEvent::set_tempo(0, 400_000).is_global_meta());
        assert!(NoteEvent::meta(0, MetaKind::TimeSignature(3, 2, 24, 8)).is_global_meta());
        assert!(NoteEvent::meta(0, MetaKind::KeySignature(-2, false)).is_global_meta());
        assert!(!NoteEvent::meta(0, MetaKind::EndOfTrack).is_global_meta());
        assert!(!NoteEvent::channel_message(0, 1, ChannelMessage::ProgramChange(0)).is_global_meta());
    }

    #[test]
    fn test_absolute_ticks_accumulate() {
        let track = Track::from_deltas(vec![
            NoteEvent::note_on(10, 0, 60, 90),
            NoteEvent::channel_message(5, 0, ChannelMessage::Controller(7, 100)),
            NoteEvent::note_off(20, 0, 60, 0),
        ]);

        let ticks: Vec<u64> = track.events.iter().map(|e| e.absolute_tick).collect();
        assert_eq!(ticks, vec![10, 15, 35]);
    }
}
