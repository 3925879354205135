//! Per-side price levels - contiguous SoA arrays with intrusive FIFO queues.
//!
//! One side of a book is four parallel arrays indexed by level:
//! `prices`, `agg_qty`, `order_count`, and the `head`/`tail` of a
//! doubly-linked order queue threaded through the slot pool. Bids are
//! kept strictly descending, asks strictly ascending, so level 0 is
//! always top-of-book and the price array can be scanned contiguously.
//!
//! Creating or collapsing a level shifts the tail of all four arrays by
//! one and rewrites the `level_index` of every order on the shifted
//! levels. The design bets on the level count staying small relative to
//! the contiguous-memory and SIMD-scan advantages.

use crate::command::Side;
use crate::slot::{SlotIndex, SlotPool, NULL_SLOT};

/// Maximum price levels per side
pub const MAX_LEVELS: usize = 1024;

/// One side of an order book.
pub struct SideLevels {
    side: Side,
    prices: Box<[i64]>,
    agg_qty: Box<[i64]>,
    order_count: Box<[u32]>,
    head_slot: Box<[SlotIndex]>,
    tail_slot: Box<[SlotIndex]>,
    count: usize,
}

impl SideLevels {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            prices: vec![0i64; MAX_LEVELS].into_boxed_slice(),
            agg_qty: vec![0i64; MAX_LEVELS].into_boxed_slice(),
            order_count: vec![0u32; MAX_LEVELS].into_boxed_slice(),
            head_slot: vec![NULL_SLOT; MAX_LEVELS].into_boxed_slice(),
            tail_slot: vec![NULL_SLOT; MAX_LEVELS].into_boxed_slice(),
            count: 0,
        }
    }

    /// Number of live levels on this side
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Raw price array (full length; only `[0..len())` is meaningful).
    /// Exposed so the price scanner can operate on it directly.
    #[inline]
    pub fn raw_prices(&self) -> &[i64] {
        &self.prices
    }

    #[inline]
    pub fn price_at(&self, level: usize) -> i64 {
        debug_assert!(level < self.count);
        self.prices[level]
    }

    #[inline]
    pub fn agg_qty_at(&self, level: usize) -> i64 {
        debug_assert!(level < self.count);
        self.agg_qty[level]
    }

    #[inline]
    pub fn order_count_at(&self, level: usize) -> u32 {
        debug_assert!(level < self.count);
        self.order_count[level]
    }

    #[inline]
    pub fn head_at(&self, level: usize) -> SlotIndex {
        debug_assert!(level < self.count);
        self.head_slot[level]
    }

    /// Best price, or the side's sentinel (`i64::MIN` for bids,
    /// `i64::MAX` for asks) when empty.
    #[inline]
    pub fn best_price(&self) -> i64 {
        if self.count == 0 {
            match self.side {
                Side::Buy => i64::MIN,
                Side::Sell => i64::MAX,
            }
        } else {
            self.prices[0]
        }
    }

    /// Locate the level for `price`, creating it in sorted position if
    /// absent. Returns `None` when the side already holds `MAX_LEVELS`
    /// levels and a new one would be needed.
    pub fn find_or_insert_level(&mut self, pool: &mut SlotPool, price: i64) -> Option<usize> {
        let descending = self.side == Side::Buy;

        // Linear scan: stop at the existing level or the first level the
        // new price is strictly more aggressive than.
        let mut insert_at = self.count;
        for i in 0..self.count {
            let p = self.prices[i];
            if p == price {
                return Some(i);
            }
            let more_aggressive = if descending { price > p } else { price < p };
            if more_aggressive {
                insert_at = i;
                break;
            }
        }

        if self.count == MAX_LEVELS {
            return None;
        }

        // Shift [insert_at..count) right by one across all arrays
        let src = insert_at..self.count;
        self.prices.copy_within(src.clone(), insert_at + 1);
        self.agg_qty.copy_within(src.clone(), insert_at + 1);
        self.order_count.copy_within(src.clone(), insert_at + 1);
        self.head_slot.copy_within(src.clone(), insert_at + 1);
        self.tail_slot.copy_within(src, insert_at + 1);
        self.count += 1;

        self.prices[insert_at] = price;
        self.agg_qty[insert_at] = 0;
        self.order_count[insert_at] = 0;
        self.head_slot[insert_at] = NULL_SLOT;
        self.tail_slot[insert_at] = NULL_SLOT;

        // Every order on a shifted level carries a stale index
        for level in (insert_at + 1)..self.count {
            self.relabel_queue(pool, level);
        }

        Some(insert_at)
    }

    /// Append an order at the tail of `level`'s FIFO queue.
    ///
    /// # Complexity
    /// O(1) via the tail pointer.
    pub fn append_order(&mut self, pool: &mut SlotPool, level: usize, index: SlotIndex) {
        debug_assert!(level < self.count);

        let remaining = pool.get(index).remaining as i64;
        debug_assert!(remaining > 0, "appending an order with no remaining quantity");

        let tail = self.tail_slot[level];
        if tail == NULL_SLOT {
            debug_assert_eq!(self.head_slot[level], NULL_SLOT);
            self.head_slot[level] = index;
            self.tail_slot[level] = index;
            let slot = pool.get_mut(index);
            slot.prev_slot = NULL_SLOT;
            slot.next_slot = NULL_SLOT;
        } else {
            pool.get_mut(tail).next_slot = index;
            let slot = pool.get_mut(index);
            slot.prev_slot = tail;
            slot.next_slot = NULL_SLOT;
            self.tail_slot[level] = index;
        }

        pool.get_mut(index).level_index = level as i32;
        self.agg_qty[level] += remaining;
        self.order_count[level] += 1;
    }

    /// Unlink an order from its level's queue; collapse the level when
    /// it empties. Returns `true` when the level was removed.
    ///
    /// The slot is NOT freed; the caller owns that step.
    pub fn remove_order(&mut self, pool: &mut SlotPool, index: SlotIndex) -> bool {
        let (level, prev, next, remaining) = {
            let slot = pool.get(index);
            (
                slot.level_index as usize,
                slot.prev_slot,
                slot.next_slot,
                slot.remaining as i64,
            )
        };
        debug_assert!(level < self.count, "slot carries a stale level index");
        debug_assert_eq!(pool.get(index).side, self.side.to_wire());

        if prev == NULL_SLOT {
            debug_assert_eq!(self.head_slot[level], index);
            self.head_slot[level] = next;
        } else {
            pool.get_mut(prev).next_slot = next;
        }
        if next == NULL_SLOT {
            debug_assert_eq!(self.tail_slot[level], index);
            self.tail_slot[level] = prev;
        } else {
            pool.get_mut(next).prev_slot = prev;
        }

        {
            let slot = pool.get_mut(index);
            slot.prev_slot = NULL_SLOT;
            slot.next_slot = NULL_SLOT;
            slot.level_index = NULL_SLOT;
        }

        self.agg_qty[level] -= remaining;
        self.order_count[level] -= 1;
        assert!(self.agg_qty[level] >= 0, "negative aggregate quantity at level {level}");

        if self.order_count[level] == 0 {
            debug_assert_eq!(self.agg_qty[level], 0);
            self.collapse_level(pool, level);
            true
        } else {
            false
        }
    }

    /// Reduce the aggregate at `level` after a partial fill.
    #[inline]
    pub fn reduce_agg_qty(&mut self, level: usize, qty: i64) {
        debug_assert!(level < self.count);
        self.agg_qty[level] -= qty;
        assert!(self.agg_qty[level] >= 0, "negative aggregate quantity at level {level}");
    }

    /// Shift-collapse an empty level out of the arrays.
    fn collapse_level(&mut self, pool: &mut SlotPool, level: usize) {
        let src = (level + 1)..self.count;
        self.prices.copy_within(src.clone(), level);
        self.agg_qty.copy_within(src.clone(), level);
        self.order_count.copy_within(src.clone(), level);
        self.head_slot.copy_within(src.clone(), level);
        self.tail_slot.copy_within(src, level);
        self.count -= 1;

        for l in level..self.count {
            self.relabel_queue(pool, l);
        }
    }

    /// Rewrite `level_index` across one level's queue after a shift.
    fn relabel_queue(&mut self, pool: &mut SlotPool, level: usize) {
        let mut cursor = self.head_slot[level];
        while cursor != NULL_SLOT {
            let slot = pool.get_mut(cursor);
            slot.level_index = level as i32;
            cursor = slot.next_slot;
        }
    }

    /// Restore the empty post-construction state without reallocating.
    pub fn reset(&mut self) {
        self.count = 0;
        self.prices.fill(0);
        self.agg_qty.fill(0);
        self.order_count.fill(0);
        self.head_slot.fill(NULL_SLOT);
        self.tail_slot.fill(NULL_SLOT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::OrderType;

    fn make_order(pool: &mut SlotPool, order_id: u64, side: Side, price: i64, qty: i32) -> SlotIndex {
        let idx = pool.alloc().unwrap();
        let slot = pool.get_mut(idx);
        slot.order_id = order_id;
        slot.price = price;
        slot.quantity = qty;
        slot.remaining = qty;
        slot.side = side.to_wire();
        slot.order_type = OrderType::Limit.to_wire();
        idx
    }

    fn queue_ids(levels: &SideLevels, pool: &SlotPool, level: usize) -> Vec<u64> {
        let mut ids = Vec::new();
        let mut cursor = levels.head_at(level);
        while cursor != NULL_SLOT {
            ids.push(pool.get(cursor).order_id);
            cursor = pool.get(cursor).next_slot;
        }
        ids
    }

    #[test]
    fn test_empty_side() {
        let bids = SideLevels::new(Side::Buy);
        let asks = SideLevels::new(Side::Sell);
        assert!(bids.is_empty());
        assert_eq!(bids.best_price(), i64::MIN);
        assert_eq!(asks.best_price(), i64::MAX);
    }

    #[test]
    fn test_bid_levels_sorted_descending() {
        let mut pool = SlotPool::new(16);
        let mut bids = SideLevels::new(Side::Buy);

        for (id, price) in [(1u64, 300i64), (2, 500), (3, 400)] {
            let idx = make_order(&mut pool, id, Side::Buy, price, 10);
            let level = bids.find_or_insert_level(&mut pool, price).unwrap();
            bids.append_order(&mut pool, level, idx);
        }

        assert_eq!(bids.len(), 3);
        assert_eq!(bids.price_at(0), 500);
        assert_eq!(bids.price_at(1), 400);
        assert_eq!(bids.price_at(2), 300);
        assert_eq!(bids.best_price(), 500);
    }

    #[test]
    fn test_ask_levels_sorted_ascending() {
        let mut pool = SlotPool::new(16);
        let mut asks = SideLevels::new(Side::Sell);

        for (id, price) in [(1u64, 300i64), (2, 100), (3, 200)] {
            let idx = make_order(&mut pool, id, Side::Sell, price, 10);
            let level = asks.find_or_insert_level(&mut pool, price).unwrap();
            asks.append_order(&mut pool, level, idx);
        }

        assert_eq!(asks.price_at(0), 100);
        assert_eq!(asks.price_at(1), 200);
        assert_eq!(asks.price_at(2), 300);
    }

    #[test]
    fn test_equal_price_reuses_level_fifo() {
        let mut pool = SlotPool::new(16);
        let mut bids = SideLevels::new(Side::Buy);

        for id in 1u64..=3 {
            let idx = make_order(&mut pool, id, Side::Buy, 100, 10);
            let level = bids.find_or_insert_level(&mut pool, 100).unwrap();
            bids.append_order(&mut pool, level, idx);
        }

        assert_eq!(bids.len(), 1);
        assert_eq!(bids.order_count_at(0), 3);
        assert_eq!(bids.agg_qty_at(0), 30);
        assert_eq!(queue_ids(&bids, &pool, 0), vec![1, 2, 3]);
    }

    #[test]
    fn test_shift_insert_relabels_queues() {
        let mut pool = SlotPool::new(16);
        let mut bids = SideLevels::new(Side::Buy);

        let a = make_order(&mut pool, 1, Side::Buy, 200, 10);
        let level = bids.find_or_insert_level(&mut pool, 200).unwrap();
        bids.append_order(&mut pool, level, a);

        let b = make_order(&mut pool, 2, Side::Buy, 100, 10);
        let level = bids.find_or_insert_level(&mut pool, 100).unwrap();
        bids.append_order(&mut pool, level, b);

        // Inserting a better bid shifts both existing levels down
        let c = make_order(&mut pool, 3, Side::Buy, 300, 10);
        let level = bids.find_or_insert_level(&mut pool, 300).unwrap();
        assert_eq!(level, 0);
        bids.append_order(&mut pool, level, c);

        assert_eq!(pool.get(c).level_index, 0);
        assert_eq!(pool.get(a).level_index, 1);
        assert_eq!(pool.get(b).level_index, 2);
    }

    #[test]
    fn test_remove_collapses_and_relabels() {
        let mut pool = SlotPool::new(16);
        let mut asks = SideLevels::new(Side::Sell);

        let a = make_order(&mut pool, 1, Side::Sell, 100, 10);
        let level = asks.find_or_insert_level(&mut pool, 100).unwrap();
        asks.append_order(&mut pool, level, a);

        let b = make_order(&mut pool, 2, Side::Sell, 200, 10);
        let level = asks.find_or_insert_level(&mut pool, 200).unwrap();
        asks.append_order(&mut pool, level, b);

        // Removing the only order at the best level collapses it
        let removed = asks.remove_order(&mut pool, a);
        assert!(removed);
        assert_eq!(asks.len(), 1);
        assert_eq!(asks.price_at(0), 200);
        assert_eq!(pool.get(b).level_index, 0);
    }

    #[test]
    fn test_remove_middle_of_queue() {
        let mut pool = SlotPool::new(16);
        let mut bids = SideLevels::new(Side::Buy);

        let ids: Vec<SlotIndex> = (1u64..=3)
            .map(|id| {
                let idx = make_order(&mut pool, id, Side::Buy, 100, 10);
                let level = bids.find_or_insert_level(&mut pool, 100).unwrap();
                bids.append_order(&mut pool, level, idx);
                idx
            })
            .collect();

        let removed = bids.remove_order(&mut pool, ids[1]);
        assert!(!removed);
        assert_eq!(bids.order_count_at(0), 2);
        assert_eq!(bids.agg_qty_at(0), 20);
        assert_eq!(queue_ids(&bids, &pool, 0), vec![1, 3]);
        // Linkage healed around the removed slot
        assert_eq!(pool.get(ids[0]).next_slot, ids[2]);
        assert_eq!(pool.get(ids[2]).prev_slot, ids[0]);
    }

    #[test]
    fn test_level_capacity_refused() {
        let mut pool = SlotPool::new((MAX_LEVELS + 1) as u32);
        let mut asks = SideLevels::new(Side::Sell);

        for i in 0..MAX_LEVELS {
            let price = (i as i64 + 1) * 10;
            let idx = make_order(&mut pool, i as u64, Side::Sell, price, 1);
            let level = asks.find_or_insert_level(&mut pool, price).unwrap();
            asks.append_order(&mut pool, level, idx);
        }
        assert_eq!(asks.len(), MAX_LEVELS);

        // A new price has nowhere to go
        assert!(asks.find_or_insert_level(&mut pool, 5).is_none());
        // An existing price is still reusable
        assert_eq!(asks.find_or_insert_level(&mut pool, 10), Some(0));
    }

    #[test]
    fn test_reduce_agg_qty() {
        let mut pool = SlotPool::new(4);
        let mut bids = SideLevels::new(Side::Buy);
        let idx = make_order(&mut pool, 1, Side::Buy, 100, 50);
        let level = bids.find_or_insert_level(&mut pool, 100).unwrap();
        bids.append_order(&mut pool, level, idx);

        bids.reduce_agg_qty(0, 20);
        assert_eq!(bids.agg_qty_at(0), 30);
    }

    #[test]
    fn test_reset() {
        let mut pool = SlotPool::new(4);
        let mut bids = SideLevels::new(Side::Buy);
        let idx = make_order(&mut pool, 1, Side::Buy, 100, 50);
        let level = bids.find_or_insert_level(&mut pool, 100).unwrap();
        bids.append_order(&mut pool, level, idx);

        bids.reset();
        assert!(bids.is_empty());
        assert_eq!(bids.best_price(), i64::MIN);
    }
}
