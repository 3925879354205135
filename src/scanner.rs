//! Price scanner - stateless search over sorted fixed-point price arrays.
//!
//! The per-side level prices live in one contiguous array sorted toward
//! the aggressor (bids descending, asks ascending), so every query below
//! reduces to "first index where a strict comparison holds". The scalar
//! variant is the portable baseline; the AVX2 variant broadcasts the
//! probe into a 256-bit register, compares four prices per iteration and
//! finds the first matching lane with a trailing-zero count. Both
//! variants return byte-identical results for identical inputs.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Prices compared per AVX2 iteration (256 bits / 64-bit lanes)
#[cfg(target_arch = "x86_64")]
const LANE_COUNT: usize = 4;

/// Scanner strategy, fixed at construction.
///
/// The enum is matched once per query; each variant then runs its own
/// tight loop over the array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PriceScanner {
    /// Portable scalar loop
    Scalar,
    /// AVX2 4-lane comparison, selected only when the CPU supports it
    #[cfg(target_arch = "x86_64")]
    Vectorized,
}

impl PriceScanner {
    /// Select the best scanner the hardware supports.
    ///
    /// `disable_simd` forces the scalar baseline regardless of CPU
    /// capabilities.
    pub fn detect(disable_simd: bool) -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if !disable_simd && is_x86_feature_detected!("avx2") {
                return PriceScanner::Vectorized;
            }
        }
        let _ = disable_simd;
        PriceScanner::Scalar
    }

    /// `detect` honoring the `CHRONOS_DISABLE_SIMD` environment override.
    pub fn from_env() -> Self {
        let disabled = std::env::var("CHRONOS_DISABLE_SIMD")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self::detect(disabled)
    }

    /// First index `i` in `prices[0..count)` where the new price sorts
    /// strictly before `prices[i]` (descending: `prices[i] < new_price`;
    /// ascending: `prices[i] > new_price`), or `count` if none.
    ///
    /// Equal prices do not satisfy the strict comparison; the caller
    /// reuses the existing level in that case.
    #[inline]
    pub fn find_insertion_point(
        &self,
        prices: &[i64],
        count: usize,
        new_price: i64,
        descending: bool,
    ) -> usize {
        debug_assert!(count <= prices.len());
        if descending {
            self.first_index_lt(prices, count, new_price)
        } else {
            self.first_index_gt(prices, count, new_price)
        }
    }

    /// Length of the longest matchable prefix of the opposite side's
    /// prices. A buying aggressor matches asks with `price <= limit`;
    /// a selling aggressor matches bids with `price >= limit`. Because
    /// the array is sorted toward the aggressor the prefix is maximal.
    #[inline]
    pub fn count_matchable_levels(
        &self,
        prices: &[i64],
        count: usize,
        limit_price: i64,
        is_buy_side: bool,
    ) -> usize {
        debug_assert!(count <= prices.len());
        if is_buy_side {
            // Asks ascending: prefix ends at the first price above the limit
            self.first_index_gt(prices, count, limit_price)
        } else {
            // Bids descending: prefix ends at the first price below the limit
            self.first_index_lt(prices, count, limit_price)
        }
    }

    /// Returns 0 iff the top-of-book satisfies the matchability
    /// predicate, else -1. Does not assume the sorted invariant.
    #[inline]
    pub fn find_first_matchable_level(
        &self,
        prices: &[i64],
        count: usize,
        limit_price: i64,
        is_buy_side: bool,
    ) -> i32 {
        if count == 0 {
            return -1;
        }
        let matchable = if is_buy_side {
            prices[0] <= limit_price
        } else {
            prices[0] >= limit_price
        };
        if matchable { 0 } else { -1 }
    }

    /// First index where `prices[i] < probe`, or `count`.
    #[inline]
    fn first_index_lt(&self, prices: &[i64], count: usize, probe: i64) -> usize {
        match self {
            PriceScanner::Scalar => scalar_first_lt(prices, count, probe),
            #[cfg(target_arch = "x86_64")]
            // Safety: the Vectorized variant is only constructed after
            // a successful avx2 feature detection.
            PriceScanner::Vectorized => unsafe { avx2_first_lt(prices, count, probe) },
        }
    }

    /// First index where `prices[i] > probe`, or `count`.
    #[inline]
    fn first_index_gt(&self, prices: &[i64], count: usize, probe: i64) -> usize {
        match self {
            PriceScanner::Scalar => scalar_first_gt(prices, count, probe),
            #[cfg(target_arch = "x86_64")]
            // Safety: see first_index_lt.
            PriceScanner::Vectorized => unsafe { avx2_first_gt(prices, count, probe) },
        }
    }
}

#[inline]
fn scalar_first_lt(prices: &[i64], count: usize, probe: i64) -> usize {
    for (i, &p) in prices[..count].iter().enumerate() {
        if p < probe {
            return i;
        }
    }
    count
}

#[inline]
fn scalar_first_gt(prices: &[i64], count: usize, probe: i64) -> usize {
    for (i, &p) in prices[..count].iter().enumerate() {
        if p > probe {
            return i;
        }
    }
    count
}

/// # Safety
/// Caller must ensure the CPU supports AVX2 and `count <= prices.len()`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn avx2_first_lt(prices: &[i64], count: usize, probe: i64) -> usize {
    let probe_v = _mm256_set1_epi64x(probe);
    let mut i = 0usize;
    while i + LANE_COUNT <= count {
        let v = _mm256_loadu_si256(prices.as_ptr().add(i) as *const __m256i);
        // lane k true iff probe > prices[i + k]
        let lt = _mm256_cmpgt_epi64(probe_v, v);
        let mask = _mm256_movemask_pd(_mm256_castsi256_pd(lt));
        if mask != 0 {
            return i + mask.trailing_zeros() as usize;
        }
        i += LANE_COUNT;
    }
    // Scalar tail for count mod LANE_COUNT
    while i < count {
        if *prices.get_unchecked(i) < probe {
            return i;
        }
        i += 1;
    }
    count
}

/// # Safety
/// Caller must ensure the CPU supports AVX2 and `count <= prices.len()`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn avx2_first_gt(prices: &[i64], count: usize, probe: i64) -> usize {
    let probe_v = _mm256_set1_epi64x(probe);
    let mut i = 0usize;
    while i + LANE_COUNT <= count {
        let v = _mm256_loadu_si256(prices.as_ptr().add(i) as *const __m256i);
        // lane k true iff prices[i + k] > probe
        let gt = _mm256_cmpgt_epi64(v, probe_v);
        let mask = _mm256_movemask_pd(_mm256_castsi256_pd(gt));
        if mask != 0 {
            return i + mask.trailing_zeros() as usize;
        }
        i += LANE_COUNT;
    }
    while i < count {
        if *prices.get_unchecked(i) > probe {
            return i;
        }
        i += 1;
    }
    count
}
