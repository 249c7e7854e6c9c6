// MIDI Export - Writes note streams back to standard MIDI files using midly
// Reconstructs a playable file from fret events, or re-emits a classified stream

use midly::{Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, Track, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};

use crate::fretboard::{FretEvent, Tuning};
use crate::stream::tempo::{bpm_to_tempo, seconds_to_ticks};
use crate::stream::{ChannelMessage, ClassifiedStream, EventKind, MetaKind, NoteEvent};
use super::ExportError;

/// Largest delta a track event can carry (28-bit variable length quantity)
const MAX_DELTA: u64 = 0x0FFF_FFFF;

/// Options for rebuilding a note stream from fret events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructOptions {
    /// Pulses per quarter note (PPQ)
    pub ticks_per_quarter: u16,

    /// Fixed output tempo
    pub bpm: f64,

    /// Length of every reconstructed note
    pub note_duration_ms: u32,

    /// Note-on velocity (1-127)
    pub velocity: u8,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        ReconstructOptions {
            ticks_per_quarter: 480,
            bpm: 120.0,
            note_duration_ms: 300,
            velocity: 64,
        }
    }
}

/// Rebuild a single-track MIDI file from fret events
///
/// Each on-event becomes `open_note(string) + fret`, placed by accumulating the
/// rounded tick delta to the previous event, and is released after the fixed
/// note duration. Off-events only advance time.
pub fn reconstruct_midi(
    events: &[FretEvent],
    tuning: &Tuning,
    options: &ReconstructOptions,
) -> Result<Vec<u8>, ExportError> {
    let ppq = options.ticks_per_quarter.max(1);
    let tempo = bpm_to_tempo(options.bpm);
    let ms_to_ticks = |ms: u32| seconds_to_ticks(f64::from(ms) / 1000.0, ppq, tempo).round() as u64;
    let duration_ticks = ms_to_ticks(options.note_duration_ms);

    // (tick, release-first ordering key, kind)
    let mut timed: Vec<(u64, u8, TrackEventKind<'static>)> = Vec::new();
    let mut current_tick = 0u64;
    let mut previous_ms = 0u32;

    for event in events {
        current_tick = current_tick.saturating_add(ms_to_ticks(event.time_ms.saturating_sub(previous_ms)));
        previous_ms = event.time_ms;

        if !event.is_on() {
            continue;
        }
        if tuning.open_note(event.string).is_none() {
            return Err(ExportError::StringOutOfRange {
                string: event.string,
            });
        }
        let note = tuning
            .note_at(event.string, event.fret as u8)
            .filter(|note| *note < 128)
            .ok_or(ExportError::FretOutOfRange { fret: event.fret })?;

        timed.push((current_tick, 1, note_kind(0, note, options.velocity, true)));
        timed.push((
            current_tick.saturating_add(duration_ticks),
            0,
            note_kind(0, note, options.velocity, false),
        ));
    }

    // Releases sort ahead of strikes on the same tick
    timed.sort_by_key(|(tick, order, _)| (*tick, *order));

    let mut track = Track::new();
    add_tempo(&mut track, tempo);
    push_absolute(&mut track, timed.into_iter().map(|(tick, _, kind)| (tick, kind)));

    write_smf(Format::SingleTrack, ppq, vec![track])
}

/// Write a classified stream back out: meta track first, then melodic tracks
///
/// Channel messages, the track name and the tempo, time signature and key
/// signature events are kept; other meta events are removed and their delta
/// folded into the next kept event.
pub fn write_classified(classified: &ClassifiedStream) -> Result<Vec<u8>, ExportError> {
    let tracks = classified
        .tracks()
        .map(|track| {
            let mut out = Track::new();
            let mut pending_delta = 0u64;

            if let Some(name) = &track.name {
                out.push(TrackEvent {
                    delta: 0.into(),
                    kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
                });
            }

            for event in &track.events {
                pending_delta += u64::from(event.delta);
                if let Some(kind) = to_midly(event) {
                    push_delayed(&mut out, pending_delta, kind);
                    pending_delta = 0;
                }
            }

            add_end_of_track(&mut out, pending_delta);
            out
        })
        .collect();

    write_smf(Format::Parallel, classified.ticks_per_quarter, tracks)
}

/// Map an owned event to midly, `None` for events that are not carried over
fn to_midly(event: &NoteEvent) -> Option<TrackEventKind<'static>> {
    match event.kind {
        EventKind::NoteOn | EventKind::NoteOff => Some(note_kind(
            event.channel?,
            event.note?,
            event.velocity.unwrap_or(0),
            event.kind == EventKind::NoteOn,
        )),
        EventKind::SetTempo => Some(TrackEventKind::Meta(MetaMessage::Tempo(
            event.tempo_value?.into(),
        ))),
        EventKind::Meta(MetaKind::TimeSignature(num, den, clocks, thirty_seconds)) => Some(
            TrackEventKind::Meta(MetaMessage::TimeSignature(num, den, clocks, thirty_seconds)),
        ),
        EventKind::Meta(MetaKind::KeySignature(accidentals, minor)) => Some(TrackEventKind::Meta(
            MetaMessage::KeySignature(accidentals, minor),
        )),
        EventKind::Channel(message) => Some(TrackEventKind::Midi {
            channel: event.channel?.into(),
            message: channel_message(message),
        }),
        EventKind::Meta(_) => None,
    }
}

fn channel_message(message: ChannelMessage) -> MidiMessage {
    match message {
        ChannelMessage::Aftertouch(key, vel) => MidiMessage::Aftertouch {
            key: key.into(),
            vel: vel.into(),
        },
        ChannelMessage::Controller(controller, value) => MidiMessage::Controller {
            controller: controller.into(),
            value: value.into(),
        },
        ChannelMessage::ProgramChange(program) => MidiMessage::ProgramChange {
            program: program.into(),
        },
        ChannelMessage::ChannelAftertouch(vel) => MidiMessage::ChannelAftertouch { vel: vel.into() },
        ChannelMessage::PitchBend(bend) => MidiMessage::PitchBend {
            bend: PitchBend(bend.into()),
        },
    }
}

fn note_kind(channel: u8, note: u8, velocity: u8, on: bool) -> TrackEventKind<'static> {
    let message = if on {
        MidiMessage::NoteOn {
            key: note.into(),
            vel: velocity.into(),
        }
    } else {
        MidiMessage::NoteOff {
            key: note.into(),
            vel: velocity.into(),
        }
    };
    TrackEventKind::Midi {
        channel: channel.into(),
        message,
    }
}

/// Append absolutely-timed events as deltas, then end the track
fn push_absolute<I>(track: &mut Track<'static>, events: I)
where
    I: IntoIterator<Item = (u64, TrackEventKind<'static>)>,
{
    let mut last_tick = 0;
    for (tick, kind) in events {
        push_delayed(track, tick.saturating_sub(last_tick), kind);
        last_tick = tick;
    }
    add_end_of_track(track, 0);
}

/// Push an event `delta` ticks after the previous one
///
/// Gaps wider than a 28-bit delta are bridged with empty marker events.
fn push_delayed<'a>(track: &mut Track<'a>, mut delta: u64, kind: TrackEventKind<'a>) {
    while delta > MAX_DELTA {
        track.push(TrackEvent {
            delta: (MAX_DELTA as u32).into(),
            kind: TrackEventKind::Meta(MetaMessage::Marker(&[])),
        });
        delta -= MAX_DELTA;
    }
    track.push(TrackEvent {
        delta: (delta as u32).into(),
        kind,
    });
}

/// Add tempo meta message at the current position
fn add_tempo(track: &mut Track<'static>, micros_per_quarter: u32) {
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(micros_per_quarter.into())),
    });
}

/// Add end of track message
fn add_end_of_track(track: &mut Track<'_>, delta: u64) {
    push_delayed(track, delta, TrackEventKind::Meta(MetaMessage::EndOfTrack));
}

fn write_smf(format: Format, ppq: u16, tracks: Vec<Track<'_>>) -> Result<Vec<u8>, ExportError> {
    let smf = Smf {
        header: Header {
            format,
            timing: Timing::Metrical(ppq.into()),
        },
        tracks,
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| ExportError::MidiWrite(e.to_string()))?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{classify, parse_stream, Track as NoteTrack};

    fn note_events(bytes: &[u8]) -> Vec<(u64, bool, u8)> {
        let smf = Smf::parse(bytes).unwrap();
        let mut tick = 0u64;
        let mut notes = Vec::new();
        for event in &smf.tracks[0] {
            tick += u64::from(event.delta.as_int());
            if let TrackEventKind::Midi { message, .. } = &event.kind {
                match message {
                    MidiMessage::NoteOn { key, .. } => notes.push((tick, true, key.as_int())),
                    MidiMessage::NoteOff { key, .. } => notes.push((tick, false, key.as_int())),
                    _ => {}
                }
            }
        }
        notes
    }

    #[test]
    fn test_reconstruct_notes_and_timing() {
        let events = vec![
            FretEvent::on(0, 3, 9),
            FretEvent::off(500, 3),
            FretEvent::on(500, 3, 12),
            FretEvent::off(1000, 3),
        ];
        let bytes = reconstruct_midi(&events, &Tuning::standard(), &ReconstructOptions::default()).unwrap();

        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.format, Format::SingleTrack);
        assert_eq!(smf.tracks.len(), 1);
        assert!(matches!(
            &smf.tracks[0][0].kind,
            TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == 500_000
        ));

        // 480 ticks per 500ms; notes last 300ms = 288 ticks
        assert_eq!(
            note_events(&bytes),
            vec![(0, true, 64), (288, false, 64), (480, true, 67), (768, false, 67)]
        );
    }

    #[test]
    fn test_release_precedes_strike_on_same_tick() {
        let options = ReconstructOptions {
            note_duration_ms: 500,
            ..Default::default()
        };
        let events = vec![FretEvent::on(0, 6, 0), FretEvent::on(500, 6, 0)];
        let bytes = reconstruct_midi(&events, &Tuning::standard(), &options).unwrap();

        assert_eq!(
            note_events(&bytes),
            vec![(0, true, 40), (480, false, 40), (480, true, 40), (960, false, 40)]
        );
    }

    #[test]
    fn test_reconstruct_empty() {
        let bytes = reconstruct_midi(&[], &Tuning::standard(), &ReconstructOptions::default()).unwrap();
        assert!(note_events(&bytes).is_empty());
    }

    #[test]
    fn test_reconstruct_long_gap_keeps_timing() {
        let options = ReconstructOptions {
            ticks_per_quarter: 32_767,
            bpm: 300.0,
            ..Default::default()
        };
        let events = vec![FretEvent::on(0, 6, 0), FretEvent::on(3_600_000, 6, 2)];
        let bytes = reconstruct_midi(&events, &Tuning::standard(), &options).unwrap();

        // 3600s at 0.2s per quarter is 18000 quarters, far past a 28-bit delta
        let strikes: Vec<(u64, u8)> = note_events(&bytes)
            .into_iter()
            .filter(|(_, on, _)| *on)
            .map(|(tick, _, key)| (tick, key))
            .collect();
        assert_eq!(strikes, vec![(0, 40), (589_806_000, 42)]);

        let reparsed = parse_stream(&bytes).unwrap();
        let last = reparsed.tracks[0].events.last().unwrap();
        assert_eq!(last.kind, EventKind::Meta(MetaKind::EndOfTrack));
        assert!(last.absolute_tick > 589_806_000);
    }

    #[test]
    fn test_write_classified_round_trip() {
        let lead = NoteTrack::from_deltas(vec![
            NoteEvent::channel_message(0, 0, ChannelMessage::ProgramChange(25)),
            NoteEvent::meta(4, MetaKind::Other),
            NoteEvent::note_on(6, 0, 64, 100),
            NoteEvent::channel_message(10, 0, ChannelMessage::PitchBend(0x2400)),
            NoteEvent::note_off(460, 0, 64, 0),
        ])
        .with_name("Lead");
        let drums = NoteTrack::from_deltas(vec![
            NoteEvent::set_tempo(0, 450_000),
            NoteEvent::note_on(0, 9, 36, 100),
        ]);
        let stream = crate::stream::NoteStream {
            ticks_per_quarter: 480,
            tracks: vec![drums, lead],
        };

        let bytes = write_classified(&classify(&stream)).unwrap();
        let reparsed = parse_stream(&bytes).unwrap();

        assert_eq!(reparsed.ticks_per_quarter, 480);
        assert_eq!(reparsed.tracks.len(), 2);

        // Meta track: tempo, end of track
        assert_eq!(reparsed.tracks[0].events[0].kind, EventKind::SetTempo);
        assert_eq!(reparsed.tracks[0].events[0].tempo_value, Some(450_000));
        assert_eq!(reparsed.tracks[0].name, None);

        let lead = &reparsed.tracks[1];
        assert_eq!(lead.name.as_deref(), Some("Lead"));

        // Track name first, then the program change; the other meta event is
        // dropped and its delta folded into the note-on
        let kinds: Vec<(EventKind, u64)> = lead
            .events
            .iter()
            .map(|event| (event.kind, event.absolute_tick))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (EventKind::Meta(MetaKind::Other), 0),
                (EventKind::Channel(ChannelMessage::ProgramChange(25)), 0),
                (EventKind::NoteOn, 10),
                (EventKind::Channel(ChannelMessage::PitchBend(0x2400)), 20),
                (EventKind::NoteOff, 480),
                (EventKind::Meta(MetaKind::EndOfTrack), 480),
            ]
        );
    }
}
