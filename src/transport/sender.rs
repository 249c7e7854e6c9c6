// Event sender - Streams raw records one at a time, waiting for an acknowledgement after each
// Mismatched or missing acknowledgements only cost a short pause; nothing is resent

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::raw::{raw_records, RawTiming};
use crate::export::ExportError;
use crate::fretboard::FretEvent;

/// Errors that stop a transfer
///
/// Acknowledgement problems are never errors; only failing writes are.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] ExportError),

    #[error("Acknowledgement token must not be empty")]
    EmptyAckToken,
}

/// Acknowledgement handshake settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    /// Exact bytes the device answers after each record
    pub ack_token: String,

    /// Pause after an unexpected answer
    pub mismatch_delay_ms: u64,
}

impl Default for TransportOptions {
    fn default() -> Self {
        TransportOptions {
            ack_token: "ACK".to_string(),
            mismatch_delay_ms: 1,
        }
    }
}

/// Outcome of a transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReport {
    /// Records written to the link
    pub sent: usize,

    /// Records whose answer did not match the token (including short reads)
    pub mismatched: usize,
}

/// Send every event as a raw record over a bidirectional link
///
/// One record is in flight at a time. After each write the sender blocks for
/// `ack_token.len()` bytes; a different or short answer is logged and followed
/// by `mismatch_delay_ms` before the next record.
pub fn send_events<L>(
    link: &mut L,
    events: &[FretEvent],
    timing: RawTiming,
    options: &TransportOptions,
) -> Result<SendReport, TransportError>
where
    L: Read + Write,
{
    let token = options.ack_token.as_bytes();
    if token.is_empty() {
        return Err(TransportError::EmptyAckToken);
    }

    let records = raw_records(events, timing)?;
    let delay = Duration::from_millis(options.mismatch_delay_ms);
    let mut answer = vec![0u8; token.len()];
    let mut report = SendReport::default();

    for (index, record) in records.iter().enumerate() {
        link.write_all(&record.to_bytes())?;
        link.flush()?;
        report.sent += 1;

        let received = read_answer(link, &mut answer);
        if received != token.len() || answer != token {
            report.mismatched += 1;
            log::warn!(
                "Event {} not acknowledged (got {:?}), continuing after {}ms",
                index,
                String::from_utf8_lossy(&answer[..received]),
                options.mismatch_delay_ms
            );
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }

    log::info!(
        "Sent {} events, {} without acknowledgement",
        report.sent,
        report.mismatched
    );

    Ok(report)
}

/// Fill `buf` as far as the link allows; returns the number of bytes read
///
/// End of stream, timeouts and read errors all end the answer early.
fn read_answer<R: Read>(link: &mut R, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match link.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("Acknowledgement read ended: {}", e);
                break;
            }
        }
    }
    filled
}
