//! Engine - construction, thread placement and the optional event loop.
//!
//! Wraps the matching core with everything that belongs at the process
//! edge: configuration, CPU pinning, page warm-up, and (behind the
//! `runtime` feature) a busy-poll loop over an rtrb ring buffer. The
//! loop is the only place wall-clock time is ever read; the matching
//! core itself sees nothing but cluster timestamps.

use tracing::debug;

use crate::error::EngineError;
use crate::matching::MatchingEngine;
use crate::metrics::{MetricsSink, NoOpMetrics};
use crate::scanner::PriceScanner;
use crate::slot::MAX_ORDERS;

/// Engine construction parameters. Fixed at construction; never
/// consulted on the hot path.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Size of the direct-indexed instrument map; valid instrument ids
    /// are `[0, max_instruments)`
    pub max_instruments: usize,
    /// Slot pool capacity per book
    pub orders_per_book: u32,
    /// Force the scalar price scanner regardless of CPU support
    pub disable_simd: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_instruments: 64,
            orders_per_book: MAX_ORDERS as u32,
            disable_simd: false,
        }
    }
}

impl EngineConfig {
    /// Defaults with the `CHRONOS_DISABLE_SIMD` environment override
    /// applied.
    pub fn from_env() -> Self {
        let disable_simd = std::env::var("CHRONOS_DISABLE_SIMD")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            disable_simd,
            ..Self::default()
        }
    }
}

/// The engine: one matching core plus its process-edge plumbing.
pub struct Engine<M: MetricsSink = NoOpMetrics> {
    pub matcher: MatchingEngine<M>,
}

impl Engine<NoOpMetrics> {
    /// Create an engine with the given configuration and no metrics.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_metrics(config, NoOpMetrics)
    }
}

impl<M: MetricsSink> Engine<M> {
    /// Create an engine with an injected metrics sink.
    pub fn with_metrics(config: &EngineConfig, metrics: M) -> Self {
        let scanner = PriceScanner::detect(config.disable_simd);
        debug!(?scanner, max_instruments = config.max_instruments, "constructing engine");
        Self {
            matcher: MatchingEngine::with_metrics(
                config.max_instruments,
                config.orders_per_book,
                scanner,
                metrics,
            ),
        }
    }

    /// Register an instrument, allocating its book.
    pub fn register_instrument(&mut self, instrument_id: i32) -> Result<(), EngineError> {
        self.matcher.register_instrument(instrument_id)
    }

    /// Pin the current thread to the last available CPU core.
    ///
    /// The last core is typically isolated from OS interrupts.
    pub fn pin_to_core(&self) {
        if let Some(core_ids) = core_affinity::get_core_ids() {
            if let Some(last_core) = core_ids.last() {
                core_affinity::set_for_current(*last_core);
            }
        }
    }

    /// Warm up the engine by pre-faulting every book's slot pages.
    pub fn warm_up(&mut self) {
        self.matcher.warm_up();
    }

    /// Restore the post-construction state (books, exec ids, message
    /// count) without reallocating.
    pub fn reset(&mut self) {
        self.matcher.reset();
    }

    /// Compute a state fingerprint for determinism testing.
    #[inline]
    pub fn state_hash(&self) -> u64 {
        self.matcher.state_hash()
    }

    /// Run the engine event loop.
    ///
    /// Pops sequenced commands from the ring, applies each to the
    /// matching core and hands the resulting report batch to `sink`.
    /// Per-command wall-clock latency is fed to the metrics sink; this
    /// never touches the deterministic core.
    ///
    /// # Panics
    /// Panics if a command overflows the scratch output buffer - a
    /// deployment sizing bug a replica must not survive.
    ///
    /// # Note
    /// This function runs forever (until the program terminates).
    #[cfg(feature = "runtime")]
    pub fn run(
        &mut self,
        input: &mut rtrb::Consumer<crate::command::SequencedCommand>,
        mut sink: impl FnMut(&[u8]),
        pin_to_core: bool,
    ) -> ! {
        // Worst case for one sweep plus the aggressor's reports
        const SCRATCH_BYTES: usize = 1 << 22;

        if pin_to_core {
            self.pin_to_core();
        }
        self.warm_up();

        let mut scratch = vec![0u8; SCRATCH_BYTES];

        loop {
            while let Ok(seq) = input.pop() {
                let started = std::time::Instant::now();
                let written = self
                    .matcher
                    .apply(&seq.command, seq.cluster_timestamp_ns, &mut scratch, 0)
                    .expect("scratch output buffer overflow");
                self.matcher
                    .metrics_mut()
                    .on_latency(started.elapsed().as_nanos() as u64);
                if written > 0 {
                    sink(&scratch[..written]);
                }
            }
            std::hint::spin_loop();
        }
    }
}

impl Default for Engine<NoOpMetrics> {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
