//! Order book - one instrument's resting orders.
//!
//! Owns the slot pool, both sides' SoA price-level arrays and the
//! order-id lookup map used for cancels. All operations preserve the
//! structural invariants checked by [`OrderBook::validate`].

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::command::{OrderType, Side};
use crate::levels::SideLevels;
use crate::slot::{OrderSlot, SlotIndex, SlotPool, MAX_ORDERS, NULL_SLOT};

/// Mapping from order id to slot index for O(1) cancel lookup
pub type OrderMap = FxHashMap<u64, SlotIndex>;

/// A single-instrument limit order book.
///
/// Strictly single-threaded: one engine thread owns the book
/// exclusively. After construction no operation allocates.
pub struct OrderBook {
    instrument_id: i32,
    pool: SlotPool,
    bids: SideLevels,
    asks: SideLevels,
    /// Pre-sized to pool capacity so hot-path inserts never rehash
    order_map: OrderMap,
}

impl OrderBook {
    /// Create a book with the default pool capacity ([`MAX_ORDERS`]).
    pub fn new(instrument_id: i32) -> Self {
        Self::with_capacity(instrument_id, MAX_ORDERS as u32)
    }

    /// Create a book with an explicit pool capacity. The capacity is
    /// fixed for the book's lifetime.
    pub fn with_capacity(instrument_id: i32, max_orders: u32) -> Self {
        debug!(instrument_id, max_orders, "constructing order book");
        Self {
            instrument_id,
            pool: SlotPool::new(max_orders),
            bids: SideLevels::new(Side::Buy),
            asks: SideLevels::new(Side::Sell),
            order_map: OrderMap::with_capacity_and_hasher(max_orders as usize, Default::default()),
        }
    }

    #[inline]
    pub fn instrument_id(&self) -> i32 {
        self.instrument_id
    }

    // ========================================================================
    // Order management
    // ========================================================================

    /// Add a resting order. Returns the new slot index, or [`NULL_SLOT`]
    /// when the pool is exhausted or the side already holds the maximum
    /// number of price levels (the add is refused and no state changes).
    ///
    /// Precondition: `quantity > 0` and `order_id` not already live.
    #[allow(clippy::too_many_arguments)]
    pub fn add_order(
        &mut self,
        order_id: u64,
        price: i64,
        client_id: u64,
        timestamp_ns: i64,
        quantity: i32,
        instrument_id: i32,
        side: Side,
        order_type: OrderType,
    ) -> SlotIndex {
        debug_assert!(quantity > 0, "order quantity must be positive");
        debug_assert_eq!(instrument_id, self.instrument_id);
        debug_assert!(!self.order_map.contains_key(&order_id), "duplicate order id");

        let index = match self.pool.alloc() {
            Some(index) => index,
            None => return NULL_SLOT,
        };

        {
            let slot = self.pool.get_mut(index);
            slot.order_id = order_id;
            slot.price = price;
            slot.client_id = client_id;
            slot.timestamp_ns = timestamp_ns;
            slot.quantity = quantity;
            slot.remaining = quantity;
            slot.instrument_id = instrument_id;
            slot.side = side.to_wire();
            slot.order_type = order_type.to_wire();
        }

        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let level = match levels.find_or_insert_level(&mut self.pool, price) {
            Some(level) => level,
            None => {
                // Book full: refuse the add and return the slot
                self.pool.free(index);
                return NULL_SLOT;
            }
        };
        levels.append_order(&mut self.pool, level, index);

        self.order_map.insert(order_id, index);
        index
    }

    /// Remove a live order: unlink it from its level (collapsing the
    /// level if it empties), drop it from the lookup map and return the
    /// slot to the free list. Returns the remaining quantity at the
    /// moment of removal.
    pub fn remove_order(&mut self, index: SlotIndex) -> i32 {
        let (order_id, side, remaining) = {
            let slot = self.pool.get(index);
            (slot.order_id, Side::from_wire(slot.side), slot.remaining)
        };
        debug_assert_eq!(
            self.order_map.get(&order_id),
            Some(&index),
            "removing a slot the lookup map does not own"
        );

        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        levels.remove_order(&mut self.pool, index);

        self.order_map.remove(&order_id);
        self.pool.free(index);
        remaining
    }

    /// Reduce a live order's remaining quantity by `fill_qty` and keep
    /// the level aggregate consistent. Returns the new remaining.
    ///
    /// Does NOT remove the order on reaching zero; the engine removes
    /// it after emitting the fill report.
    ///
    /// Precondition: `0 < fill_qty <= remaining`.
    #[inline]
    pub fn reduce_quantity(&mut self, index: SlotIndex, fill_qty: i32) -> i32 {
        debug_assert!(fill_qty > 0);

        let (side, level, new_remaining) = {
            let slot = self.pool.get_mut(index);
            debug_assert!(fill_qty <= slot.remaining, "fill exceeds remaining quantity");
            slot.remaining -= fill_qty;
            (
                Side::from_wire(slot.side),
                slot.level_index as usize,
                slot.remaining,
            )
        };
        assert!(new_remaining >= 0, "remaining quantity went negative");

        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        levels.reduce_agg_qty(level, fill_qty as i64);
        new_remaining
    }

    /// Look up a live order's slot by order id.
    #[inline]
    pub fn lookup(&self, order_id: u64) -> Option<SlotIndex> {
        self.order_map.get(&order_id).copied()
    }

    /// Check if an order id is live in this book.
    #[inline]
    pub fn contains_order(&self, order_id: u64) -> bool {
        self.order_map.contains_key(&order_id)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Best bid price, or `i64::MIN` when there are no bids.
    #[inline]
    pub fn best_bid(&self) -> i64 {
        self.bids.best_price()
    }

    /// Best ask price, or `i64::MAX` when there are no asks.
    #[inline]
    pub fn best_ask(&self) -> i64 {
        self.asks.best_price()
    }

    #[inline]
    pub fn bid_level_count(&self) -> usize {
        self.bids.len()
    }

    #[inline]
    pub fn ask_level_count(&self) -> usize {
        self.asks.len()
    }

    #[inline]
    pub fn level_count(&self, side: Side) -> usize {
        self.levels(side).len()
    }

    /// Raw bid price array for the scanner (full length; only
    /// `[0..bid_level_count())` is meaningful).
    #[inline]
    pub fn bid_prices(&self) -> &[i64] {
        self.bids.raw_prices()
    }

    /// Raw ask price array for the scanner.
    #[inline]
    pub fn ask_prices(&self) -> &[i64] {
        self.asks.raw_prices()
    }

    #[inline]
    pub fn live_order_count(&self) -> u32 {
        self.pool.live_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Head (oldest, first to match) order slot of a level's queue.
    #[inline]
    pub fn head_order_slot(&self, side: Side, level: usize) -> SlotIndex {
        self.levels(side).head_at(level)
    }

    /// Read access to a slot's fields.
    #[inline]
    pub fn slot(&self, index: SlotIndex) -> &OrderSlot {
        self.pool.get(index)
    }

    #[inline]
    pub fn levels(&self, side: Side) -> &SideLevels {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Visit every live order on one side in price-time order (best
    /// level first, head to tail within a level). Cold path.
    pub fn each_live_order(&self, side: Side, f: &mut dyn FnMut(&OrderSlot)) {
        let levels = self.levels(side);
        for level in 0..levels.len() {
            let mut cursor = levels.head_at(level);
            while cursor != NULL_SLOT {
                let slot = self.pool.get(cursor);
                f(slot);
                cursor = slot.next_slot;
            }
        }
    }

    /// Restore the empty post-construction state without reallocating.
    pub fn reset(&mut self) {
        debug!(instrument_id = self.instrument_id, "resetting order book");
        self.pool.reset();
        self.bids.reset();
        self.asks.reset();
        // clear() keeps the map's capacity
        self.order_map.clear();
    }

    /// Pre-fault the slot region's pages.
    pub fn warm_up(&mut self) {
        self.pool.warm_up();
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Check every structural invariant; panics on the first violation.
    /// Diagnostic only - O(book size), never called on the hot path.
    pub fn validate(&self) {
        self.validate_side(&self.bids);
        self.validate_side(&self.asks);

        let reachable = self.count_reachable();
        assert_eq!(
            reachable,
            self.pool.live_count(),
            "live count does not match reachable slots"
        );
        assert_eq!(
            self.pool.live_count() + self.pool.free_list_len(),
            self.pool.capacity(),
            "slots leaked between free list and queues"
        );
        assert_eq!(
            self.order_map.len() as u32,
            self.pool.live_count(),
            "order map out of sync with live slots"
        );
    }

    fn validate_side(&self, levels: &SideLevels) {
        let descending = levels.side() == Side::Buy;
        for level in 0..levels.len() {
            if level > 0 {
                let prev = levels.price_at(level - 1);
                let cur = levels.price_at(level);
                if descending {
                    assert!(prev > cur, "bid prices not strictly descending");
                } else {
                    assert!(prev < cur, "ask prices not strictly ascending");
                }
            }

            let mut queue_len = 0u32;
            let mut queue_qty = 0i64;
            let mut cursor = levels.head_at(level);
            let mut prev_slot = NULL_SLOT;
            while cursor != NULL_SLOT {
                let slot = self.pool.get(cursor);
                assert_eq!(slot.level_index as usize, level, "stale level index");
                assert_eq!(slot.price, levels.price_at(level), "slot price differs from level");
                assert_eq!(slot.side, levels.side().to_wire(), "slot on the wrong side");
                assert_eq!(slot.prev_slot, prev_slot, "broken back link");
                assert!(slot.remaining > 0, "live slot with non-positive remaining");
                assert_eq!(
                    self.order_map.get(&slot.order_id),
                    Some(&cursor),
                    "queued slot missing from order map"
                );
                queue_len += 1;
                assert!(queue_len <= self.pool.capacity(), "queue cycle detected");
                queue_qty += slot.remaining as i64;
                prev_slot = cursor;
                cursor = slot.next_slot;
            }

            assert!(queue_len > 0, "empty level was not collapsed");
            assert_eq!(queue_len, levels.order_count_at(level), "order count mismatch");
            assert_eq!(queue_qty, levels.agg_qty_at(level), "aggregate quantity mismatch");
        }
    }

    fn count_reachable(&self) -> u32 {
        let mut n = 0u32;
        for levels in [&self.bids, &self.asks] {
            for level in 0..levels.len() {
                let mut cursor = levels.head_at(level);
                while cursor != NULL_SLOT {
                    n += 1;
                    cursor = self.pool.get(cursor).next_slot;
                }
            }
        }
        n
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("instrument_id", &self.instrument_id)
            .field("bid_levels", &self.bids.len())
            .field("ask_levels", &self.asks.len())
            .field("live_orders", &self.pool.live_count())
            .finish()
    }
}
