// Container decoding - Reads standard MIDI files through midly
// Flattens midly's borrowed event tree into owned NoteEvents

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use thiserror::Error;

use super::types::{ChannelMessage, MetaKind, NoteEvent, NoteStream, Track};

/// Errors raised while decoding an input container
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed MIDI container: {0}")]
    Malformed(String),

    #[error("SMPTE timecode division is not supported, expected ticks per quarter note")]
    UnsupportedTiming,

    #[error("Container declares zero ticks per quarter note")]
    ZeroTicksPerQuarter,
}

/// Decode a MIDI container into a `NoteStream`
///
/// The whole buffer is rejected on a corrupt header or track chunk; no partial
/// recovery is attempted.
pub fn parse_stream(bytes: &[u8]) -> Result<NoteStream, ParseError> {
    let smf = Smf::parse(bytes).map_err(|e| ParseError::Malformed(e.to_string()))?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(ppq) => ppq.as_int(),
        Timing::Timecode(..) => return Err(ParseError::UnsupportedTiming),
    };

    if ticks_per_quarter == 0 {
        return Err(ParseError::ZeroTicksPerQuarter);
    }

    let tracks = smf
        .tracks
        .iter()
        .map(|track| {
            let mut decoded = Track::from_deltas(
                track
                    .iter()
                    .map(|event| convert_event(event.delta.as_int(), &event.kind))
                    .collect(),
            );
            decoded.name = track.iter().find_map(|event| match event.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    Some(String::from_utf8_lossy(name).into_owned())
                }
                _ => None,
            });
            decoded
        })
        .collect::<Vec<_>>();

    log::debug!(
        "Parsed container: {} tracks, {} ticks per quarter",
        tracks.len(),
        ticks_per_quarter
    );

    Ok(NoteStream {
        ticks_per_quarter,
        tracks,
    })
}

/// Map one midly event onto the owned event model
fn convert_event(delta: u32, kind: &TrackEventKind) -> NoteEvent {
    match kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            match message {
                MidiMessage::NoteOn { key, vel } => {
                    NoteEvent::note_on(delta, channel, key.as_int(), vel.as_int())
                }
                MidiMessage::NoteOff { key, vel } => {
                    NoteEvent::note_off(delta, channel, key.as_int(), vel.as_int())
                }
                MidiMessage::Aftertouch { key, vel } => NoteEvent::channel_message(
                    delta,
                    channel,
                    ChannelMessage::Aftertouch(key.as_int(), vel.as_int()),
                ),
                MidiMessage::Controller { controller, value } => NoteEvent::channel_message(
                    delta,
                    channel,
                    ChannelMessage::Controller(controller.as_int(), value.as_int()),
                ),
                MidiMessage::ProgramChange { program } => NoteEvent::channel_message(
                    delta,
                    channel,
                    ChannelMessage::ProgramChange(program.as_int()),
                ),
                MidiMessage::ChannelAftertouch { vel } => NoteEvent::channel_message(
                    delta,
                    channel,
                    ChannelMessage::ChannelAftertouch(vel.as_int()),
                ),
                MidiMessage::PitchBend { bend } => NoteEvent::channel_message(
                    delta,
                    channel,
                    ChannelMessage::PitchBend(bend.0.as_int()),
                ),
            }
        }
        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
            NoteEvent::set_tempo(delta, tempo.as_int())
        }
        TrackEventKind::Meta(MetaMessage::TimeSignature(num, den, clocks, thirty_seconds)) => {
            NoteEvent::meta(
                delta,
                MetaKind::TimeSignature(*num, *den, *clocks, *thirty_seconds),
            )
        }
        TrackEventKind::Meta(MetaMessage::KeySignature(accidentals, minor)) => {
            NoteEvent::meta(delta, MetaKind::KeySignature(*accidentals, *minor))
        }
        TrackEventKind::Meta(MetaMessage::EndOfTrack) => NoteEvent::meta(delta, MetaKind::EndOfTrack),
        _ => NoteEvent::meta(delta, MetaKind::Other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::types::EventKind;
    use midly::{Format, Header, Track as MidiTrack, TrackEvent};

    fn write_smf(timing: Timing, tracks: Vec<MidiTrack<'static>>) -> Vec<u8> {
        let smf = Smf {
            header: Header {
                format: Format::Parallel,
                timing,
            },
            tracks,
        };
        let mut bytes = Vec::new();
        smf.write(&mut bytes).unwrap();
        bytes
    }

    fn midi(delta: u32, channel: u8, message: MidiMessage) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi {
                channel: channel.into(),
                message,
            },
        }
    }

    fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Meta(message),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let result = parse_stream(b"definitely not a midi file");
        assert!(matches!(result, Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_parse_rejects_empty_buffer() {
        assert!(matches!(parse_stream(&[]), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_parse_rejects_timecode() {
        let bytes = write_smf(
            Timing::Timecode(midly::Fps::Fps25, 40),
            vec![vec![meta(0, MetaMessage::EndOfTrack)]],
        );
        assert!(matches!(parse_stream(&bytes), Err(ParseError::UnsupportedTiming)));
    }

    #[test]
    fn test_parse_event_kinds() {
        let track = vec![
            meta(0, MetaMessage::TrackName(&b"Lead"[..])),
            meta(0, MetaMessage::Tempo(400_000.into())),
            meta(0, MetaMessage::TimeSignature(3, 2, 24, 8)),
            meta(0, MetaMessage::KeySignature(2, true)),
            midi(0, 1, MidiMessage::ProgramChange { program: 25.into() }),
            midi(96, 1, MidiMessage::NoteOn { key: 60.into(), vel: 100.into() }),
            midi(96, 1, MidiMessage::NoteOff { key: 60.into(), vel: 0.into() }),
            meta(0, MetaMessage::EndOfTrack),
        ];
        let bytes = write_smf(Timing::Metrical(96.into()), vec![track]);

        let stream = parse_stream(&bytes).unwrap();
        assert_eq!(stream.ticks_per_quarter, 96);
        assert_eq!(stream.tracks.len(), 1);

        let events = &stream.tracks[0].events;
        assert_eq!(events.len(), 8);
        assert_eq!(events[0].kind, EventKind::Meta(MetaKind::Other));
        assert_eq!(events[1].kind, EventKind::SetTempo);
        assert_eq!(events[1].tempo_value, Some(400_000));
        assert_eq!(events[2].kind, EventKind::Meta(MetaKind::TimeSignature(3, 2, 24, 8)));
        assert_eq!(events[3].kind, EventKind::Meta(MetaKind::KeySignature(2, true)));
        assert_eq!(stream.tracks[0].name.as_deref(), Some("Lead"));
        assert_eq!(
            events[4].kind,
            EventKind::Channel(ChannelMessage::ProgramChange(25))
        );
        assert_eq!(events[5].kind, EventKind::NoteOn);
        assert_eq!(events[5].note, Some(60));
        assert_eq!(events[5].channel, Some(1));
        assert_eq!(events[5].absolute_tick, 96);
        assert_eq!(events[6].kind, EventKind::NoteOff);
        assert_eq!(events[6].absolute_tick, 192);
        assert_eq!(events[7].kind, EventKind::Meta(MetaKind::EndOfTrack));
    }
}
