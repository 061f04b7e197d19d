//! Lightweight profiling without changing function signatures.
//!
//! Timings accumulate in thread-local counters and are merged into global
//! totals with [`merge_thread_local`]. Enable with environment variable: YGG_PROFILE=1

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Profiled categories, in report order
pub const CATEGORIES: [&str; 5] = ["move_gen", "eval", "flood_fill", "transition", "rollout"];

const N: usize = CATEGORIES.len();

thread_local! {
    static LOCAL_TIME: [Cell<u64>; N] = const { [const { Cell::new(0) }; N] };
    static LOCAL_COUNT: [Cell<u64>; N] = const { [const { Cell::new(0) }; N] };
    static LOCAL_CUTOFFS: Cell<u64> = const { Cell::new(0) };
}

static GLOBAL_TIME: [AtomicU64; N] = [const { AtomicU64::new(0) }; N];
static GLOBAL_COUNT: [AtomicU64; N] = [const { AtomicU64::new(0) }; N];
static GLOBAL_CUTOFFS: AtomicU64 = AtomicU64::new(0);

#[inline]
pub fn is_profiling_enabled() -> bool {
    std::env::var("YGG_PROFILE").is_ok()
}

fn category_index(category: &str) -> Option<usize> {
    CATEGORIES.iter().position(|c| *c == category)
}

pub struct ProfileGuard {
    start: Instant,
    index: usize,
}

impl ProfileGuard {
    /// Returns `None` when profiling is off or the category is unknown
    pub fn new(category: &'static str) -> Option<Self> {
        if !is_profiling_enabled() {
            return None;
        }
        category_index(category).map(|index| ProfileGuard {
            start: Instant::now(),
            index,
        })
    }
}

impl Drop for ProfileGuard {
    fn drop(&mut self) {
        let elapsed_ns = self.start.elapsed().as_nanos() as u64;
        LOCAL_TIME.with(|t| t[self.index].set(t[self.index].get() + elapsed_ns));
        LOCAL_COUNT.with(|c| c[self.index].set(c[self.index].get() + 1));
    }
}

#[inline]
pub fn record_alpha_beta_cutoff() {
    if is_profiling_enabled() {
        LOCAL_CUTOFFS.with(|c| c.set(c.get() + 1));
    }
}

/// Moves this thread's counters into the global totals
pub fn merge_thread_local() {
    if !is_profiling_enabled() {
        return;
    }

    LOCAL_TIME.with(|t| {
        for (local, global) in t.iter().zip(GLOBAL_TIME.iter()) {
            global.fetch_add(local.replace(0), Ordering::Relaxed);
        }
    });
    LOCAL_COUNT.with(|c| {
        for (local, global) in c.iter().zip(GLOBAL_COUNT.iter()) {
            global.fetch_add(local.replace(0), Ordering::Relaxed);
        }
    });
    LOCAL_CUTOFFS.with(|c| {
        GLOBAL_CUTOFFS.fetch_add(c.replace(0), Ordering::Relaxed);
    });
}

/// (total nanoseconds, calls) merged so far for `category`
pub fn totals(category: &str) -> Option<(u64, u64)> {
    category_index(category).map(|i| {
        (
            GLOBAL_TIME[i].load(Ordering::Relaxed),
            GLOBAL_COUNT[i].load(Ordering::Relaxed),
        )
    })
}

pub fn print_report(total_time_ms: u64) {
    if !is_profiling_enabled() {
        return;
    }

    let total_ns = total_time_ms * 1_000_000;

    eprintln!("\n===========================================================");
    eprintln!("                 PERFORMANCE PROFILE");
    eprintln!("===========================================================");
    eprintln!("Total Time: {}ms\n", total_time_ms);

    for (i, name) in CATEGORIES.iter().enumerate() {
        let time = GLOBAL_TIME[i].load(Ordering::Relaxed);
        let count = GLOBAL_COUNT[i].load(Ordering::Relaxed);
        let pct = if total_ns > 0 {
            100.0 * time as f64 / total_ns as f64
        } else {
            0.0
        };
        let avg_us = if count > 0 {
            time as f64 / (count * 1000) as f64
        } else {
            0.0
        };
        eprintln!(
            "{:<12} {:>10.2}ms ({:>5.1}%) - {} calls, {:.2}µs avg",
            name,
            time as f64 / 1_000_000.0,
            pct,
            count,
            avg_us
        );
    }

    eprintln!(
        "\nAlpha-beta cutoffs: {}",
        GLOBAL_CUTOFFS.load(Ordering::Relaxed)
    );
    eprintln!("===========================================================\n");
}

pub fn reset() {
    for i in 0..N {
        GLOBAL_TIME[i].store(0, Ordering::Relaxed);
        GLOBAL_COUNT[i].store(0, Ordering::Relaxed);
    }
    GLOBAL_CUTOFFS.store(0, Ordering::Relaxed);
}

#[macro_export]
macro_rules! profile {
    ($category:expr, $code:block) => {{
        let _guard = $crate::simple_profiler::ProfileGuard::new($category);
        $code
    }};
}
