// Packed event stream - Header-prefixed big-endian storage format
// Header: u32 total duration ms, u16 event count
// Record: u32 time ms, u8 packed (string in bits 7..5, fret in bits 4..0)

use serde::{Deserialize, Serialize};

use crate::fretboard::{FretEvent, STRING_COUNT};
use super::ExportError;

pub const PACKED_HEADER_SIZE: usize = 6;
pub const PACKED_RECORD_SIZE: usize = 5;

/// Highest fret that fits in five bits below the sentinel
pub const PACKED_MAX_FRET: u8 = 30;

/// Fret bits marking an off-event
pub const PACKED_FRET_OFF: u8 = 31;

/// A decoded packed stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedStream {
    pub duration_ms: u32,
    pub events: Vec<FretEvent>,
}

/// Combine string and fret into one byte
pub fn pack_byte(event: &FretEvent) -> Result<u8, ExportError> {
    if event.string == 0 || usize::from(event.string) > STRING_COUNT {
        return Err(ExportError::StringOutOfRange {
            string: event.string,
        });
    }

    let fret_bits = if event.fret < 0 {
        PACKED_FRET_OFF
    } else if event.fret as u8 > PACKED_MAX_FRET {
        return Err(ExportError::FretOutOfRange { fret: event.fret });
    } else {
        event.fret as u8
    };

    Ok((event.string << 5) | fret_bits)
}

/// Split a packed byte into string number and signed fret
pub fn unpack_byte(packed: u8) -> (u8, i8) {
    let string = packed >> 5;
    let fret_bits = packed & 0x1F;
    let fret = if fret_bits == PACKED_FRET_OFF {
        -1
    } else {
        fret_bits as i8
    };
    (string, fret)
}

/// Encode events behind a duration/count header
pub fn encode_packed(events: &[FretEvent], duration_ms: u32) -> Result<Vec<u8>, ExportError> {
    let count = u16::try_from(events.len()).map_err(|_| ExportError::TooManyEvents {
        count: events.len(),
    })?;

    let mut bytes = Vec::with_capacity(PACKED_HEADER_SIZE + events.len() * PACKED_RECORD_SIZE);
    bytes.extend_from_slice(&duration_ms.to_be_bytes());
    bytes.extend_from_slice(&count.to_be_bytes());

    for event in events {
        bytes.extend_from_slice(&event.time_ms.to_be_bytes());
        bytes.push(pack_byte(event)?);
    }

    Ok(bytes)
}

/// Decode a packed stream; the buffer must hold exactly `count` records
pub fn decode_packed(bytes: &[u8]) -> Result<PackedStream, ExportError> {
    if bytes.len() < PACKED_HEADER_SIZE {
        return Err(ExportError::Truncated {
            needed: PACKED_HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let duration_ms = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let count = usize::from(u16::from_be_bytes([bytes[4], bytes[5]]));

    let needed = PACKED_HEADER_SIZE + count * PACKED_RECORD_SIZE;
    if bytes.len() < needed {
        return Err(ExportError::Truncated {
            needed,
            available: bytes.len(),
        });
    }
    if bytes.len() > needed {
        return Err(ExportError::TrailingBytes {
            extra: bytes.len() - needed,
        });
    }

    let events = bytes[PACKED_HEADER_SIZE..]
        .chunks_exact(PACKED_RECORD_SIZE)
        .map(|record| {
            let time_ms = u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
            let (string, fret) = unpack_byte(record[4]);
            if !(1..=STRING_COUNT as u8).contains(&string) {
                return Err(ExportError::StringOutOfRange { string });
            }
            Ok(FretEvent::from_triple(time_ms, string, fret))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PackedStream {
        duration_ms,
        events,
    })
}
