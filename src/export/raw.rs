// Raw event stream - 4-byte little-endian records for sequential transport
// <u16 time, u8 string, u8 fret>, no header, no terminator

use serde::{Deserialize, Serialize};

use crate::fretboard::FretEvent;
use super::ExportError;

/// Bytes per raw record
pub const RAW_RECORD_SIZE: usize = 4;

/// Byte used for the off fret (`-1` as two's complement)
pub const RAW_FRET_OFF: u8 = 0xFF;

/// What the 16-bit time field of a record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawTiming {
    /// Milliseconds since the previous event (first event: since start)
    #[default]
    Delta,

    /// Milliseconds since the start of the stream
    Absolute,
}

/// Raw stream options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawOptions {
    pub timing: RawTiming,
}

/// One decoded raw record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub time: u16,
    pub string: u8,
    pub fret: i8,
}

impl RawRecord {
    /// Pack into the 4-byte wire layout
    pub fn to_bytes(&self) -> [u8; RAW_RECORD_SIZE] {
        let time = self.time.to_le_bytes();
        [time[0], time[1], self.string, self.fret as u8]
    }

    pub fn from_bytes(bytes: [u8; RAW_RECORD_SIZE]) -> Self {
        RawRecord {
            time: u16::from_le_bytes([bytes[0], bytes[1]]),
            string: bytes[2],
            fret: bytes[3] as i8,
        }
    }
}

/// Build the records for an event sequence without serializing them
pub fn raw_records(events: &[FretEvent], timing: RawTiming) -> Result<Vec<RawRecord>, ExportError> {
    let mut previous_ms = 0u32;

    events
        .iter()
        .map(|event| {
            let time_ms = match timing {
                RawTiming::Delta => event.time_ms.saturating_sub(previous_ms),
                RawTiming::Absolute => event.time_ms,
            };
            previous_ms = event.time_ms;

            let time = u16::try_from(time_ms).map_err(|_| ExportError::TimeOverflow { time_ms })?;

            Ok(RawRecord {
                time,
                string: event.string,
                fret: event.fret,
            })
        })
        .collect()
}

/// Encode events as a headerless raw stream
pub fn encode_raw(events: &[FretEvent], options: &RawOptions) -> Result<Vec<u8>, ExportError> {
    let records = raw_records(events, options.timing)?;
    let mut bytes = Vec::with_capacity(records.len() * RAW_RECORD_SIZE);

    for record in &records {
        bytes.extend_from_slice(&record.to_bytes());
    }

    Ok(bytes)
}

/// Split a raw stream back into records; the length must be a multiple of 4
pub fn decode_raw(bytes: &[u8]) -> Result<Vec<RawRecord>, ExportError> {
    let chunks = bytes.chunks_exact(RAW_RECORD_SIZE);
    if !chunks.remainder().is_empty() {
        return Err(ExportError::Truncated {
            needed: bytes.len().next_multiple_of(RAW_RECORD_SIZE),
            available: bytes.len(),
        });
    }

    Ok(chunks
        .map(|chunk| RawRecord::from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<FretEvent> {
        vec![
            FretEvent::on(0, 3, 9),
            FretEvent::off(500, 3),
            FretEvent::on(500, 3, 12),
            FretEvent::off(1000, 3),
        ]
    }

    #[test]
    fn test_record_layout_little_endian() {
        let record = RawRecord {
            time: 0x0102,
            string: 4,
            fret: 7,
        };
        assert_eq!(record.to_bytes(), [0x02, 0x01, 4, 7]);
    }

    #[test]
    fn test_delta_timing() {
        let bytes = encode_raw(&sample(), &RawOptions::default()).unwrap();
        assert_eq!(
            bytes,
            vec![
                0, 0, 3, 9, //
                0xF4, 0x01, 3, 0xFF, //
                0, 0, 3, 12, //
                0xF4, 0x01, 3, 0xFF,
            ]
        );
    }

    #[test]
    fn test_absolute_timing() {
        let options = RawOptions {
            timing: RawTiming::Absolute,
        };
        let records = decode_raw(&encode_raw(&sample(), &options).unwrap()).unwrap();
        let times: Vec<u16> = records.iter().map(|r| r.time).collect();
        assert_eq!(times, vec![0, 500, 500, 1000]);
        assert_eq!(records[1].fret, -1);
    }

    #[test]
    fn test_time_overflow() {
        let events = vec![FretEvent::on(70_000, 1, 0)];
        let result = encode_raw(&events, &RawOptions::default());
        assert!(matches!(result, Err(ExportError::TimeOverflow { time_ms: 70_000 })));

        // Long songs still fit as long as each gap does
        let events = vec![FretEvent::on(60_000, 1, 0), FretEvent::off(120_000, 1)];
        assert!(encode_raw(&events, &RawOptions::default()).is_ok());
    }

    #[test]
    fn test_decode_rejects_partial_record() {
        let result = decode_raw(&[0, 0, 1]);
        assert!(matches!(result, Err(ExportError::Truncated { needed: 4, available: 3 })));
    }

    #[test]
    fn test_empty_stream() {
        assert!(encode_raw(&[], &RawOptions::default()).unwrap().is_empty());
        assert!(decode_raw(&[]).unwrap().is_empty());
    }
}
