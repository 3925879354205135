//! Stress - push the engine to its limits.
//!
//! Verifies correctness under extreme conditions: near-capacity
//! operation, deep sweeps, heavy churn at one price, and boundary
//! values for prices and quantities.

use chronos_core::codec::{ExecutionReportDecoder, HEADER_SIZE, REPORT_BYTES};
use chronos_core::{
    CancelOrder, Command, Engine, EngineConfig, ExecType, NewOrderSingle, Side, MAX_LEVELS,
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn make_engine(orders_per_book: u32) -> Engine {
    let mut engine = Engine::new(&EngineConfig {
        max_instruments: 2,
        orders_per_book,
        disable_simd: false,
    });
    engine.register_instrument(1).unwrap();
    engine
}

fn exec_types(out: &[u8], len: usize) -> Vec<ExecType> {
    (0..len / REPORT_BYTES)
        .map(|i| {
            let dec = ExecutionReportDecoder::wrap(out, i * REPORT_BYTES + HEADER_SIZE);
            ExecType::from_wire(dec.exec_type())
        })
        .collect()
}

#[test]
fn test_near_capacity_operation() {
    const CAPACITY: u32 = 10_000;
    let mut engine = make_engine(CAPACITY);
    let mut out = [0u8; 256];

    // Fill to 95% capacity with non-crossing orders
    let target_orders = (CAPACITY as f64 * 0.95) as u64;
    for i in 0..target_orders {
        // Bids 8000-8990, asks 10000-10990: never cross
        let (side, price) = if i % 2 == 0 {
            (Side::Buy, 8_000 + (i as i64 % 100) * 10)
        } else {
            (Side::Sell, 10_000 + (i as i64 % 100) * 10)
        };
        let cmd = Command::New(NewOrderSingle::limit(i, 1, 1, side, price, 100));
        let n = engine.matcher.apply(&cmd, i as i64, &mut out, 0).unwrap();
        assert_eq!(
            exec_types(&out, n),
            vec![ExecType::New],
            "order {i} should rest"
        );
    }

    let book = engine.matcher.book(1).unwrap();
    assert_eq!(book.live_order_count() as u64, target_orders);
    book.validate();
}

#[test]
fn test_pool_exhaustion_rejection() {
    const CAPACITY: u32 = 100;
    let mut engine = make_engine(CAPACITY);
    let mut out = [0u8; 256];

    for i in 0..CAPACITY as u64 {
        let cmd = Command::New(NewOrderSingle::limit(
            i,
            1,
            1,
            Side::Buy,
            9_000 + i as i64 * 10,
            100,
        ));
        engine.matcher.apply(&cmd, i as i64, &mut out, 0).unwrap();
    }

    // Next non-crossing order should be rejected
    let cmd = Command::New(NewOrderSingle::limit(
        CAPACITY as u64,
        1,
        1,
        Side::Buy,
        5_000,
        100,
    ));
    let n = engine.matcher.apply(&cmd, 0, &mut out, 0).unwrap();
    assert_eq!(exec_types(&out, n), vec![ExecType::Rejected]);
    engine.matcher.book(1).unwrap().validate();
}

#[test]
fn test_deep_sweep_across_many_levels() {
    let mut engine = make_engine((MAX_LEVELS + 16) as u32);
    let mut out = [0u8; 256];

    // One ask per level, descending insert cost avoided by ascending prices
    for i in 0..MAX_LEVELS as u64 {
        let cmd = Command::New(NewOrderSingle::limit(
            i,
            1,
            1,
            Side::Sell,
            1_000 + i as i64,
            1,
        ));
        engine.matcher.apply(&cmd, i as i64, &mut out, 0).unwrap();
    }
    assert_eq!(engine.matcher.book(1).unwrap().ask_level_count(), MAX_LEVELS);

    // One market order clears the entire side
    let mut big_out = vec![0u8; (MAX_LEVELS + 2) * REPORT_BYTES];
    let cmd = Command::New(NewOrderSingle::market(
        100_000,
        1,
        1,
        Side::Buy,
        MAX_LEVELS as i32,
    ));
    let n = engine.matcher.apply(&cmd, 0, &mut big_out, 0).unwrap();
    assert_eq!(n, (MAX_LEVELS + 1) * REPORT_BYTES);

    let types = exec_types(&big_out, n);
    assert!(types[..MAX_LEVELS].iter().all(|t| *t == ExecType::Fill));
    assert_eq!(types[MAX_LEVELS], ExecType::Fill);

    let book = engine.matcher.book(1).unwrap();
    assert!(book.is_empty());
    assert_eq!(book.ask_level_count(), 0);
    book.validate();
}

#[test]
fn test_churn_at_single_price() {
    const ROUNDS: u64 = 5_000;
    let mut engine = make_engine(1_000);
    let mut out = [0u8; 1024];

    // Place and immediately cancel at one price, forever reusing the
    // same slot
    for i in 0..ROUNDS {
        let cmd = Command::New(NewOrderSingle::limit(i, 1, 1, Side::Buy, 10_000, 5));
        engine.matcher.apply(&cmd, i as i64, &mut out, 0).unwrap();
        let cmd = Command::Cancel(CancelOrder {
            order_id: i,
            client_id: 1,
            instrument_id: 1,
        });
        engine.matcher.apply(&cmd, i as i64, &mut out, 0).unwrap();
    }

    let book = engine.matcher.book(1).unwrap();
    assert!(book.is_empty());
    assert_eq!(book.bid_level_count(), 0);
    book.validate();
}

#[test]
fn test_boundary_prices_and_quantities() {
    let mut engine = make_engine(64);
    let mut out = [0u8; 1024];

    // Maximum positive price and quantity
    let cmd = Command::New(NewOrderSingle::limit(1, 1, 1, Side::Buy, i64::MAX - 1, i32::MAX));
    let n = engine.matcher.apply(&cmd, 0, &mut out, 0).unwrap();
    assert_eq!(exec_types(&out, n), vec![ExecType::New]);

    // A sell at a negative price crosses everything
    let cmd = Command::New(NewOrderSingle::limit(2, 1, 1, Side::Sell, -1_000, i32::MAX));
    let n = engine.matcher.apply(&cmd, 1, &mut out, 0).unwrap();
    assert_eq!(exec_types(&out, n), vec![ExecType::Fill, ExecType::Fill]);

    let book = engine.matcher.book(1).unwrap();
    assert!(book.is_empty());
    book.validate();
}

#[test]
fn test_random_mixed_workload_stays_consistent() {
    const OPS: usize = 50_000;
    let mut rng = ChaCha8Rng::seed_from_u64(0xAB57AC7);
    let mut engine = make_engine(100_000);
    let mut out = vec![0u8; 1 << 20];
    let mut live: Vec<u64> = Vec::new();

    for i in 0..OPS {
        if live.is_empty() || rng.gen_bool(0.7) {
            let order_id = i as u64 + 1;
            let market = rng.gen_bool(0.05);
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            let cmd = if market {
                Command::New(NewOrderSingle::market(order_id, 1, 1, side, rng.gen_range(1..50)))
            } else {
                Command::New(NewOrderSingle::limit(
                    order_id,
                    1,
                    1,
                    side,
                    rng.gen_range(9_900..10_100) * 100,
                    rng.gen_range(1..50),
                ))
            };
            engine.matcher.apply(&cmd, i as i64, &mut out, 0).unwrap();
            if !market {
                live.push(order_id);
            }
        } else {
            let idx = rng.gen_range(0..live.len());
            let order_id = live.swap_remove(idx);
            let cmd = Command::Cancel(CancelOrder {
                order_id,
                client_id: 1,
                instrument_id: 1,
            });
            engine.matcher.apply(&cmd, i as i64, &mut out, 0).unwrap();
        }

        if i % 2_000 == 0 {
            engine.matcher.book(1).unwrap().validate();
        }
    }

    engine.matcher.book(1).unwrap().validate();
}
