//! Determinism - golden master verification.
//!
//! Replaying the same command sequence on fresh engines must produce
//! byte-identical report streams (execution ids included) and identical
//! state hashes, run after run, with either scanner variant.

use chronos_core::{
    CancelOrder, Command, Engine, EngineConfig, NewOrderSingle, Side,
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Generate a deterministic sequence of commands
fn generate_commands(seed: u64, count: usize) -> Vec<(Command, i64)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut commands = Vec::with_capacity(count);
    let mut active_orders: Vec<u64> = Vec::new();
    let mut next_order_id = 1u64;

    for i in 0..count {
        let ts = 1_000 + i as i64;
        // 70% place, 30% cancel
        if active_orders.is_empty() || rng.gen_bool(0.7) {
            let order_id = next_order_id;
            next_order_id += 1;

            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            let order = NewOrderSingle {
                order_id,
                price: rng.gen_range(9_500..10_500) * 1_000_000, // 95.00 to 105.00
                client_id: rng.gen_range(1..100),
                timestamp_ns: ts,
                instrument_id: 1,
                quantity: rng.gen_range(1..500),
                side,
                order_type: chronos_core::OrderType::Limit,
            };
            commands.push((Command::New(order), ts));
            active_orders.push(order_id);
        } else {
            let idx = rng.gen_range(0..active_orders.len());
            let order_id = active_orders.swap_remove(idx);
            commands.push((
                Command::Cancel(CancelOrder {
                    order_id,
                    client_id: 1,
                    instrument_id: 1,
                }),
                ts,
            ));
        }
    }

    commands
}

/// Run a fresh engine over the commands and collect the raw report
/// stream plus the final state hash.
fn run_engine(commands: &[(Command, i64)], disable_simd: bool) -> (Vec<u8>, u64) {
    let mut engine = Engine::new(&EngineConfig {
        max_instruments: 2,
        orders_per_book: 100_000,
        disable_simd,
    });
    engine.register_instrument(1).unwrap();

    let mut stream = Vec::new();
    let mut out = vec![0u8; 1 << 20];
    for (cmd, ts) in commands {
        let n = engine.matcher.apply(cmd, *ts, &mut out, 0).unwrap();
        stream.extend_from_slice(&out[..n]);
    }

    (stream, engine.state_hash())
}

#[test]
fn test_determinism_small() {
    const SEED: u64 = 0xDEADBEEF;
    const COUNT: usize = 1_000;
    const RUNS: usize = 10;

    let commands = generate_commands(SEED, COUNT);
    let (first_stream, first_hash) = run_engine(&commands, false);

    for run in 1..RUNS {
        let (stream, hash) = run_engine(&commands, false);
        assert_eq!(stream, first_stream, "report stream mismatch on run {run}");
        assert_eq!(hash, first_hash, "state hash mismatch on run {run}");
    }
}

#[test]
fn test_determinism_large() {
    const SEED: u64 = 0xCAFEBABE;
    const COUNT: usize = 100_000;
    const RUNS: usize = 3;

    let commands = generate_commands(SEED, COUNT);
    let (first_stream, first_hash) = run_engine(&commands, false);

    for run in 1..RUNS {
        let (stream, hash) = run_engine(&commands, false);
        assert_eq!(stream, first_stream, "report stream mismatch on run {run}");
        assert_eq!(hash, first_hash, "state hash mismatch on run {run}");
    }
}

/// Scanner variant selection may differ across replicas; results
/// must not.
#[test]
fn test_scalar_and_vectorized_replicas_agree() {
    const SEED: u64 = 0xFEEDF00D;
    const COUNT: usize = 20_000;

    let commands = generate_commands(SEED, COUNT);
    let (scalar_stream, scalar_hash) = run_engine(&commands, true);
    let (simd_stream, simd_hash) = run_engine(&commands, false);

    assert_eq!(scalar_stream, simd_stream);
    assert_eq!(scalar_hash, simd_hash);
}

#[test]
fn test_different_seeds_produce_different_results() {
    let commands1 = generate_commands(1, 1_000);
    let commands2 = generate_commands(2, 1_000);

    let (stream1, _) = run_engine(&commands1, false);
    let (stream2, _) = run_engine(&commands2, false);

    assert_ne!(stream1, stream2, "different seeds should produce different results");
}

/// Replaying a snapshot restores a replica that continues identically.
#[test]
fn test_snapshot_replica_convergence() {
    const SEED: u64 = 0xA5A5A5A5;
    let commands = generate_commands(SEED, 5_000);
    let (prefix, suffix) = commands.split_at(2_500);

    let mut primary = Engine::new(&EngineConfig {
        max_instruments: 2,
        orders_per_book: 100_000,
        disable_simd: false,
    });
    primary.register_instrument(1).unwrap();

    let mut out = vec![0u8; 1 << 20];
    for (cmd, ts) in prefix {
        primary.matcher.apply(cmd, *ts, &mut out, 0).unwrap();
    }

    let snapshot = primary.matcher.snapshot();
    let mut replica = Engine::new(&EngineConfig {
        max_instruments: 2,
        orders_per_book: 100_000,
        disable_simd: false,
    });
    replica.matcher.restore(&snapshot).unwrap();
    assert_eq!(replica.state_hash(), primary.state_hash());

    let mut primary_stream = Vec::new();
    let mut replica_stream = Vec::new();
    for (cmd, ts) in suffix {
        let n = primary.matcher.apply(cmd, *ts, &mut out, 0).unwrap();
        primary_stream.extend_from_slice(&out[..n]);
        let n = replica.matcher.apply(cmd, *ts, &mut out, 0).unwrap();
        replica_stream.extend_from_slice(&out[..n]);
    }

    assert_eq!(primary_stream, replica_stream);
    assert_eq!(primary.state_hash(), replica.state_hash());
}
