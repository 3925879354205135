//! Snapshot - versioned binary capture and restore of engine state.
//!
//! Layout (all little-endian):
//!
//! ```text
//! [u16 version][u64 message_count][u64 next_exec_id][u32 instrument_count]
//! per instrument:
//!   [i32 instrument_id][u32 live_order_count]
//!   per live order (bids best-to-worst then asks, head-to-tail per level):
//!     [u8 side][u8 order_type][u64 order_id][i64 price][u64 client_id]
//!     [i64 timestamp_ns][u32 quantity][u32 remaining]
//! ```
//!
//! Orders are captured in price-time order, so restoring replays them
//! through the normal `add_order` path and rebuilds byte-identical book
//! state. Snapshot and restore are cold paths; both may allocate.

use tracing::debug;

use crate::command::{OrderType, Side};
use crate::error::EngineError;
use crate::matching::MatchingEngine;
use crate::metrics::MetricsSink;
use crate::slot::NULL_SLOT;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u16 = 1;

/// Per-order record size in bytes
const ORDER_RECORD_BYTES: usize = 1 + 1 + 8 + 8 + 8 + 8 + 4 + 4;

impl<M: MetricsSink> MatchingEngine<M> {
    /// Serialize the engine state into a fresh byte vector.
    pub fn snapshot(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        out.extend_from_slice(&self.message_count.to_le_bytes());
        out.extend_from_slice(&self.next_exec_id.to_le_bytes());

        let instrument_count = self.books.iter().flatten().count() as u32;
        out.extend_from_slice(&instrument_count.to_le_bytes());

        for book in self.books.iter().flatten() {
            out.extend_from_slice(&book.instrument_id().to_le_bytes());
            out.extend_from_slice(&book.live_order_count().to_le_bytes());
            out.reserve(book.live_order_count() as usize * ORDER_RECORD_BYTES);
            for side in [Side::Buy, Side::Sell] {
                book.each_live_order(side, &mut |slot| {
                    out.push(slot.side);
                    out.push(slot.order_type);
                    out.extend_from_slice(&slot.order_id.to_le_bytes());
                    out.extend_from_slice(&slot.price.to_le_bytes());
                    out.extend_from_slice(&slot.client_id.to_le_bytes());
                    out.extend_from_slice(&slot.timestamp_ns.to_le_bytes());
                    out.extend_from_slice(&slot.quantity.to_le_bytes());
                    out.extend_from_slice(&slot.remaining.to_le_bytes());
                });
            }
        }

        debug!(bytes = out.len(), instrument_count, "captured snapshot");
        out
    }

    /// Reset the engine and rebuild it from snapshot bytes. Instruments
    /// in the snapshot that are not yet registered are registered on
    /// the fly.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        let mut r = Reader::new(bytes);

        let version = r.u16()?;
        if version != SNAPSHOT_VERSION {
            return Err(EngineError::UnsupportedSnapshotVersion(version));
        }
        let message_count = r.u64()?;
        let next_exec_id = r.u64()?;
        let instrument_count = r.u32()?;

        self.reset();

        for _ in 0..instrument_count {
            let instrument_id = r.i32()?;
            let live_order_count = r.u32()?;

            if self.book(instrument_id).is_none() {
                self.register_instrument(instrument_id)?;
            }
            if live_order_count > self.orders_per_book {
                return Err(EngineError::CorruptSnapshot(
                    "live order count exceeds pool capacity",
                ));
            }

            for _ in 0..live_order_count {
                let side = Side::from_wire(r.u8()?);
                let order_type = OrderType::from_wire(r.u8()?);
                let order_id = r.u64()?;
                let price = r.i64()?;
                let client_id = r.u64()?;
                let timestamp_ns = r.i64()?;
                let quantity = r.u32()? as i32;
                let remaining = r.u32()? as i32;

                if quantity <= 0 || remaining <= 0 || remaining > quantity {
                    return Err(EngineError::CorruptSnapshot("invalid order quantities"));
                }

                let book = self.books[instrument_id as usize].as_mut().unwrap();
                let slot = book.add_order(
                    order_id,
                    price,
                    client_id,
                    timestamp_ns,
                    quantity,
                    instrument_id,
                    side,
                    order_type,
                );
                if slot == NULL_SLOT {
                    return Err(EngineError::CorruptSnapshot("order could not be replayed"));
                }
                // Replaying the original quantity then the filled part
                // reconstructs both fields exactly
                if remaining < quantity {
                    book.reduce_quantity(slot, quantity - remaining);
                }
            }
        }

        self.message_count = message_count;
        self.next_exec_id = next_exec_id;
        debug!(instrument_count, message_count, "restored snapshot");
        Ok(())
    }
}

/// Cursor over snapshot bytes with truncation checks.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], EngineError> {
        if self.pos + n > self.buf.len() {
            return Err(EngineError::TruncatedSnapshot(self.pos));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, EngineError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, EngineError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, EngineError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32, EngineError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, EngineError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64, EngineError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }
}
