//! Matching engine - consumes log commands, drives books, emits reports.
//!
//! Implements strict price-time priority: the incoming aggressor sweeps
//! the opposite side best level first, oldest order first within a
//! level, then any residual rests (limit) or is rejected (market).
//! Every emitted report is wire-encoded straight into the caller's
//! buffer; nothing on this path allocates or reads a clock.

use tracing::warn;

use crate::codec::{
    encode_header, CancelOrderDecoder, MessageHeaderDecoder, NewOrderSingleDecoder,
    ExecutionReportEncoder, CANCEL_ORDER_SIZE, CANCEL_ORDER_TEMPLATE_ID,
    EXECUTION_REPORT_SIZE, EXECUTION_REPORT_TEMPLATE_ID, HEADER_SIZE,
    NEW_ORDER_SINGLE_SIZE, NEW_ORDER_SINGLE_TEMPLATE_ID, REPORT_BYTES,
};
use crate::command::{CancelOrder, Command, ExecType, NewOrderSingle, OrderType, Side};
use crate::book::OrderBook;
use crate::error::EngineError;
use crate::metrics::{MetricsSink, NoOpMetrics};
use crate::scanner::PriceScanner;
use crate::slot::NULL_SLOT;

/// The matching core: instrument books plus the shared price scanner
/// and the monotonic execution-id counter.
///
/// Deterministic by construction: the only time input is the cluster
/// timestamp on each call, exec ids come from a replayable counter, and
/// the scanner variant cannot influence results.
pub struct MatchingEngine<M: MetricsSink = NoOpMetrics> {
    /// Direct-indexed by instrument id; no hashing on the hot path
    pub(crate) books: Box<[Option<OrderBook>]>,
    scanner: PriceScanner,
    /// Next execution id; bumped once per emitted report
    pub(crate) next_exec_id: u64,
    /// Commands consumed since construction or reset
    pub(crate) message_count: u64,
    pub(crate) orders_per_book: u32,
    metrics: M,
}

impl MatchingEngine<NoOpMetrics> {
    /// Create an engine with no metrics sink.
    pub fn new(max_instruments: usize, orders_per_book: u32, scanner: PriceScanner) -> Self {
        Self::with_metrics(max_instruments, orders_per_book, scanner, NoOpMetrics)
    }
}

impl<M: MetricsSink> MatchingEngine<M> {
    /// Create an engine with an injected metrics sink.
    pub fn with_metrics(
        max_instruments: usize,
        orders_per_book: u32,
        scanner: PriceScanner,
        metrics: M,
    ) -> Self {
        assert!(max_instruments > 0, "need room for at least one instrument");
        let mut books = Vec::with_capacity(max_instruments);
        books.resize_with(max_instruments, || None);
        Self {
            books: books.into_boxed_slice(),
            scanner,
            next_exec_id: 1,
            message_count: 0,
            orders_per_book,
            metrics,
        }
    }

    /// Register an instrument, allocating its book.
    pub fn register_instrument(&mut self, instrument_id: i32) -> Result<(), EngineError> {
        let idx = usize::try_from(instrument_id)
            .ok()
            .filter(|&i| i < self.books.len())
            .ok_or(EngineError::InstrumentOutOfRange {
                instrument_id,
                max_instruments: self.books.len(),
            })?;
        if self.books[idx].is_some() {
            return Err(EngineError::DuplicateInstrument(instrument_id));
        }
        self.books[idx] = Some(OrderBook::with_capacity(instrument_id, self.orders_per_book));
        Ok(())
    }

    #[inline]
    pub fn book(&self, instrument_id: i32) -> Option<&OrderBook> {
        usize::try_from(instrument_id)
            .ok()
            .and_then(|i| self.books.get(i))
            .and_then(|b| b.as_ref())
    }

    #[inline]
    pub fn scanner(&self) -> PriceScanner {
        self.scanner
    }

    #[inline]
    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    #[inline]
    pub fn metrics_mut(&mut self) -> &mut M {
        &mut self.metrics
    }

    #[inline]
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    #[inline]
    pub fn next_exec_id(&self) -> u64 {
        self.next_exec_id
    }

    // ========================================================================
    // Command entry points
    // ========================================================================

    /// Decode one framed command at `buf[offset..]` and apply it.
    /// Unknown template ids are logged and ignored. Returns the number
    /// of report bytes written to `out` starting at `out_offset`.
    pub fn on_command(
        &mut self,
        buf: &[u8],
        offset: usize,
        cluster_timestamp_ns: i64,
        out: &mut [u8],
        out_offset: usize,
    ) -> Result<usize, EngineError> {
        if buf.len() < offset + HEADER_SIZE {
            return Err(EngineError::TruncatedMessage {
                needed: offset + HEADER_SIZE,
                available: buf.len(),
            });
        }
        let header = MessageHeaderDecoder::wrap(buf, offset);
        let template_id = header.template_id();
        let body = offset + HEADER_SIZE;

        match template_id {
            NEW_ORDER_SINGLE_TEMPLATE_ID => {
                if buf.len() < body + NEW_ORDER_SINGLE_SIZE {
                    return Err(EngineError::TruncatedMessage {
                        needed: body + NEW_ORDER_SINGLE_SIZE,
                        available: buf.len(),
                    });
                }
                self.match_order(
                    &NewOrderSingleDecoder::wrap(buf, body),
                    cluster_timestamp_ns,
                    out,
                    out_offset,
                )
            }
            CANCEL_ORDER_TEMPLATE_ID => {
                if buf.len() < body + CANCEL_ORDER_SIZE {
                    return Err(EngineError::TruncatedMessage {
                        needed: body + CANCEL_ORDER_SIZE,
                        available: buf.len(),
                    });
                }
                self.cancel_order(
                    &CancelOrderDecoder::wrap(buf, body),
                    cluster_timestamp_ns,
                    out,
                    out_offset,
                )
            }
            other => {
                warn!(template_id = other, "ignoring unknown template id");
                Ok(0)
            }
        }
    }

    /// Match a decoded NewOrderSingle at the given cluster timestamp,
    /// writing execution reports into `out` at `out_offset`. Returns
    /// bytes written.
    ///
    /// The caller must size `out` for the worst case of one call:
    /// 62 bytes ([`REPORT_BYTES`]) per resting order swept, plus two
    /// more reports for the aggressor (its own report and a possible
    /// secondary reject of an unrestable residual). An undersized
    /// buffer yields [`EngineError::OutputBufferFull`]; book mutations
    /// already applied stand, so a replica hitting this error must halt
    /// rather than retry.
    pub fn match_order(
        &mut self,
        decoder: &NewOrderSingleDecoder<'_>,
        cluster_timestamp_ns: i64,
        out: &mut [u8],
        out_offset: usize,
    ) -> Result<usize, EngineError> {
        let order = decoder.decode();
        self.process_new(&order, cluster_timestamp_ns, out, out_offset)
    }

    /// Cancel a decoded CancelOrder. Returns bytes written.
    pub fn cancel_order(
        &mut self,
        decoder: &CancelOrderDecoder<'_>,
        cluster_timestamp_ns: i64,
        out: &mut [u8],
        out_offset: usize,
    ) -> Result<usize, EngineError> {
        let cancel = decoder.decode();
        self.process_cancel(&cancel, cluster_timestamp_ns, out, out_offset)
    }

    /// Apply an already-decoded command (runtime-loop entry point).
    pub fn apply(
        &mut self,
        command: &Command,
        cluster_timestamp_ns: i64,
        out: &mut [u8],
        out_offset: usize,
    ) -> Result<usize, EngineError> {
        match command {
            Command::New(order) => self.process_new(order, cluster_timestamp_ns, out, out_offset),
            Command::Cancel(cancel) => {
                self.process_cancel(cancel, cluster_timestamp_ns, out, out_offset)
            }
        }
    }

    // ========================================================================
    // Matching
    // ========================================================================

    fn process_new(
        &mut self,
        order: &NewOrderSingle,
        ts: i64,
        out: &mut [u8],
        out_offset: usize,
    ) -> Result<usize, EngineError> {
        self.message_count += 1;
        self.metrics.on_order_processed();

        let mut w = ReportWriter::new(out, out_offset);

        let book_idx = usize::try_from(order.instrument_id)
            .ok()
            .filter(|&i| i < self.books.len() && self.books[i].is_some());
        let Some(book_idx) = book_idx else {
            // Unknown instrument: reject the incoming order
            let exec_id = self.next_exec_id;
            self.next_exec_id += 1;
            w.emit(
                exec_id,
                order.order_id,
                order.client_id,
                order.price,
                ts,
                order.instrument_id,
                0,
                order.quantity,
                order.side,
                ExecType::Rejected,
            )?;
            self.metrics.on_order_rejected();
            return Ok(w.written());
        };
        let book = self.books[book_idx].as_mut().unwrap();

        if order.quantity <= 0 || book.contains_order(order.order_id) {
            let exec_id = self.next_exec_id;
            self.next_exec_id += 1;
            w.emit(
                exec_id,
                order.order_id,
                order.client_id,
                order.price,
                ts,
                order.instrument_id,
                0,
                order.quantity,
                order.side,
                ExecType::Rejected,
            )?;
            self.metrics.on_order_rejected();
            return Ok(w.written());
        }

        let is_buy = order.side == Side::Buy;
        let is_market = order.order_type == OrderType::Market;
        let opposite = order.side.opposite();
        let original_qty = order.quantity;
        let mut remaining = order.quantity;

        // Market orders sweep to the book's edge; limits to their price
        let effective_limit = if is_market {
            if is_buy {
                i64::MAX
            } else {
                i64::MIN
            }
        } else {
            order.price
        };

        let opposite_count = book.level_count(opposite);
        let top_tradeable = opposite_count > 0 && {
            let top = book.levels(opposite).price_at(0);
            is_market || if is_buy { top <= order.price } else { top >= order.price }
        };

        if top_tradeable {
            let matchable = {
                let levels = book.levels(opposite);
                self.scanner.count_matchable_levels(
                    levels.raw_prices(),
                    levels.len(),
                    effective_limit,
                    is_buy,
                )
            };

            // Sweep: the current level is always index 0. Clearing a
            // level collapses it, promoting the next level to index 0;
            // a partially consumed level stays at index 0 because the
            // sweep only stops there when the aggressor is done.
            let mut levels_swept = 0usize;
            'sweep: while levels_swept < matchable && remaining > 0 {
                loop {
                    let resting = book.head_order_slot(opposite, 0);
                    assert!(resting != NULL_SLOT, "non-empty level with null head");

                    let (rest_order_id, rest_client_id, rest_price) = {
                        let slot = book.slot(resting);
                        (slot.order_id, slot.client_id, slot.price)
                    };
                    let rest_remaining = book.slot(resting).remaining;

                    let fill_qty = remaining.min(rest_remaining);
                    let new_rest_remaining = book.reduce_quantity(resting, fill_qty);

                    // Resting party's report precedes the aggressor's
                    let exec_id = self.next_exec_id;
                    self.next_exec_id += 1;
                    w.emit(
                        exec_id,
                        rest_order_id,
                        rest_client_id,
                        rest_price,
                        ts,
                        order.instrument_id,
                        fill_qty,
                        new_rest_remaining,
                        opposite,
                        if new_rest_remaining == 0 {
                            ExecType::Fill
                        } else {
                            ExecType::PartialFill
                        },
                    )?;
                    self.metrics.on_match_found(fill_qty as u32);
                    remaining -= fill_qty;

                    if new_rest_remaining == 0 {
                        let levels_before = book.level_count(opposite);
                        book.remove_order(resting);
                        if book.level_count(opposite) < levels_before {
                            // Level cleared and collapsed; the next one
                            // (if any) is now at index 0
                            levels_swept += 1;
                            break;
                        }
                    }
                    if remaining == 0 {
                        break 'sweep;
                    }
                }
            }
        }

        // Aggressor's own report closes the batch
        let filled = original_qty - remaining;
        if remaining == 0 {
            let exec_id = self.next_exec_id;
            self.next_exec_id += 1;
            w.emit(
                exec_id,
                order.order_id,
                order.client_id,
                order.price,
                ts,
                order.instrument_id,
                original_qty,
                0,
                order.side,
                ExecType::Fill,
            )?;
        } else if filled > 0 {
            let exec_id = self.next_exec_id;
            self.next_exec_id += 1;
            w.emit(
                exec_id,
                order.order_id,
                order.client_id,
                order.price,
                ts,
                order.instrument_id,
                filled,
                remaining,
                order.side,
                ExecType::PartialFill,
            )?;
            if !is_market {
                let book = self.books[book_idx].as_mut().unwrap();
                let slot = book.add_order(
                    order.order_id,
                    order.price,
                    order.client_id,
                    order.timestamp_ns,
                    remaining,
                    order.instrument_id,
                    order.side,
                    OrderType::Limit,
                );
                if slot == NULL_SLOT {
                    // Residual could not rest: secondary reject
                    let exec_id = self.next_exec_id;
                    self.next_exec_id += 1;
                    w.emit(
                        exec_id,
                        order.order_id,
                        order.client_id,
                        order.price,
                        ts,
                        order.instrument_id,
                        0,
                        remaining,
                        order.side,
                        ExecType::Rejected,
                    )?;
                    self.metrics.on_order_rejected();
                }
            }
        } else if !is_market {
            let book = self.books[book_idx].as_mut().unwrap();
            let slot = book.add_order(
                order.order_id,
                order.price,
                order.client_id,
                order.timestamp_ns,
                original_qty,
                order.instrument_id,
                order.side,
                OrderType::Limit,
            );
            let exec_id = self.next_exec_id;
            self.next_exec_id += 1;
            if slot == NULL_SLOT {
                w.emit(
                    exec_id,
                    order.order_id,
                    order.client_id,
                    order.price,
                    ts,
                    order.instrument_id,
                    0,
                    original_qty,
                    order.side,
                    ExecType::Rejected,
                )?;
                self.metrics.on_order_rejected();
            } else {
                w.emit(
                    exec_id,
                    order.order_id,
                    order.client_id,
                    order.price,
                    ts,
                    order.instrument_id,
                    0,
                    original_qty,
                    order.side,
                    ExecType::New,
                )?;
            }
        } else {
            // Market order with no liquidity
            let exec_id = self.next_exec_id;
            self.next_exec_id += 1;
            w.emit(
                exec_id,
                order.order_id,
                order.client_id,
                order.price,
                ts,
                order.instrument_id,
                0,
                original_qty,
                order.side,
                ExecType::Rejected,
            )?;
            self.metrics.on_order_rejected();
        }

        Ok(w.written())
    }

    fn process_cancel(
        &mut self,
        cancel: &CancelOrder,
        ts: i64,
        out: &mut [u8],
        out_offset: usize,
    ) -> Result<usize, EngineError> {
        self.message_count += 1;
        self.metrics.on_order_processed();

        let mut w = ReportWriter::new(out, out_offset);

        let slot_index = usize::try_from(cancel.instrument_id)
            .ok()
            .filter(|&i| i < self.books.len())
            .and_then(|i| self.books[i].as_ref())
            .and_then(|book| book.lookup(cancel.order_id));

        let Some(slot_index) = slot_index else {
            // Unknown instrument or unknown order id
            let exec_id = self.next_exec_id;
            self.next_exec_id += 1;
            w.emit(
                exec_id,
                cancel.order_id,
                cancel.client_id,
                0,
                ts,
                cancel.instrument_id,
                0,
                0,
                Side::Buy,
                ExecType::Rejected,
            )?;
            self.metrics.on_order_rejected();
            return Ok(w.written());
        };

        let book = self.books[cancel.instrument_id as usize].as_mut().unwrap();
        let (price, side, client_id) = {
            let slot = book.slot(slot_index);
            (slot.price, Side::from_wire(slot.side), slot.client_id)
        };
        let remaining = book.remove_order(slot_index);

        let exec_id = self.next_exec_id;
        self.next_exec_id += 1;
        w.emit(
            exec_id,
            cancel.order_id,
            client_id,
            price,
            ts,
            cancel.instrument_id,
            0,
            remaining,
            side,
            ExecType::Canceled,
        )?;
        Ok(w.written())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Restore every book, the exec-id counter and the message count to
    /// their post-construction state. No reallocation.
    pub fn reset(&mut self) {
        for book in self.books.iter_mut().flatten() {
            book.reset();
        }
        self.next_exec_id = 1;
        self.message_count = 0;
    }

    /// Pre-fault every book's slot region.
    pub fn warm_up(&mut self) {
        for book in self.books.iter_mut().flatten() {
            book.warm_up();
        }
    }

    /// Fingerprint of the engine state, for determinism checks and
    /// replica divergence detection.
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.next_exec_id.hash(&mut hasher);
        self.message_count.hash(&mut hasher);
        for book in self.books.iter().flatten() {
            book.instrument_id().hash(&mut hasher);
            book.best_bid().hash(&mut hasher);
            book.best_ask().hash(&mut hasher);
            book.bid_level_count().hash(&mut hasher);
            book.ask_level_count().hash(&mut hasher);
            book.live_order_count().hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Bounds-checked sequential report writer over the caller's buffer.
struct ReportWriter<'a> {
    buf: &'a mut [u8],
    start: usize,
    pos: usize,
}

impl<'a> ReportWriter<'a> {
    #[inline]
    fn new(buf: &'a mut [u8], offset: usize) -> Self {
        Self {
            buf,
            start: offset,
            pos: offset,
        }
    }

    #[inline]
    fn written(&self) -> usize {
        self.pos - self.start
    }

    /// Write one header + ExecutionReport pair at the cursor.
    #[allow(clippy::too_many_arguments)]
    fn emit(
        &mut self,
        exec_id: u64,
        order_id: u64,
        client_id: u64,
        price: i64,
        match_timestamp_ns: i64,
        instrument_id: i32,
        filled_quantity: i32,
        remaining_quantity: i32,
        side: Side,
        exec_type: ExecType,
    ) -> Result<(), EngineError> {
        if self.pos + REPORT_BYTES > self.buf.len() {
            return Err(EngineError::OutputBufferFull {
                needed: REPORT_BYTES,
                available: self.buf.len().saturating_sub(self.pos),
            });
        }

        let body = encode_header(
            self.buf,
            self.pos,
            EXECUTION_REPORT_TEMPLATE_ID,
            EXECUTION_REPORT_SIZE as u16,
        );
        ExecutionReportEncoder::wrap(self.buf, body)
            .order_id(order_id)
            .exec_id(exec_id)
            .price(price)
            .client_id(client_id)
            .match_timestamp_ns(match_timestamp_ns)
            .instrument_id(instrument_id as u32)
            .filled_quantity(filled_quantity as u32)
            .remaining_quantity(remaining_quantity as u32)
            .side(side.to_wire())
            .exec_type(exec_type.to_wire());
        self.pos += REPORT_BYTES;
        Ok(())
    }
}
