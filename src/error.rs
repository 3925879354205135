//! Engine error types.
//!
//! Per-order rejections are NOT errors; they surface as REJECTED
//! execution reports in the output stream. These variants cover caller
//! contract violations (sizing, framing, registration) and snapshot
//! decoding. Internal invariant violations panic instead: the engine
//! is a replicated state machine and silent divergence is worse than a
//! crash.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
    /// The caller's output buffer cannot hold the next report. Book
    /// mutations already applied stand; the replica must halt.
    #[error("output buffer full: need {needed} more bytes, {available} available")]
    OutputBufferFull { needed: usize, available: usize },

    /// An inbound frame ends before its declared body.
    #[error("truncated message: need {needed} bytes, {available} available")]
    TruncatedMessage { needed: usize, available: usize },

    /// Instrument id does not fit the engine's direct-indexed book map.
    #[error("instrument {instrument_id} out of range (capacity {max_instruments})")]
    InstrumentOutOfRange {
        instrument_id: i32,
        max_instruments: usize,
    },

    /// Instrument registered twice.
    #[error("instrument {0} already registered")]
    DuplicateInstrument(i32),

    /// Snapshot bytes carry a version this build does not understand.
    #[error("unsupported snapshot version {0}")]
    UnsupportedSnapshotVersion(u16),

    /// Snapshot bytes end mid-record.
    #[error("snapshot truncated at byte {0}")]
    TruncatedSnapshot(usize),

    /// Snapshot references more live orders than a book can hold, or
    /// an order that cannot be replayed.
    #[error("snapshot inconsistent: {0}")]
    CorruptSnapshot(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = EngineError::OutputBufferFull {
            needed: 62,
            available: 10,
        };
        assert_eq!(
            e.to_string(),
            "output buffer full: need 62 more bytes, 10 available"
        );

        let e = EngineError::UnsupportedSnapshotVersion(9);
        assert_eq!(e.to_string(), "unsupported snapshot version 9");
    }
}
