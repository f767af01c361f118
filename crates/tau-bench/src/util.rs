//! Worker-count resolution and per-task RNG derivation.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{BenchError, BenchResult};

/// Sentinel worker count meaning "use all available processing units".
pub const ALL_WORKERS: i64 = -1;

/// Resolve a requested worker count into an effective one.
///
/// * `-1` resolves to the host's available parallelism.
/// * `0` means fully synchronous execution (no pool is created).
/// * Positive counts are clamped to `max_useful` (there is no point holding
///   more workers than dispatchable tasks).
/// * Any other negative value is rejected with
///   [`BenchError::InvalidWorkerCount`].
pub fn resolve_worker_count(requested: i64, max_useful: usize) -> BenchResult<usize> {
    let expanded = match requested {
        ALL_WORKERS => available_units() as i64,
        n if n < 0 => return Err(BenchError::InvalidWorkerCount(requested)),
        n => n,
    };
    Ok((expanded as usize).min(max_useful))
}

/// Number of processing units available to this process.
pub fn available_units() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Derive an independent RNG for one worker task.
///
/// With a configured base seed, the task's stream id is mixed in through a
/// splitmix-style finalizer so sibling tasks never share a stream; without
/// one, each task seeds from OS entropy. Either way no task inherits RNG
/// state from the dispatching thread.
pub fn task_rng(seed: Option<u64>, stream: u64) -> ChaCha8Rng {
    match seed {
        Some(base) => ChaCha8Rng::seed_from_u64(mix(base, stream)),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Derive a sub-seed for a nested runner so its task streams never collide
/// with the parent's.
pub(crate) fn derive_seed(base: u64, stream: u64) -> u64 {
    mix(base, stream)
}

fn mix(base: u64, stream: u64) -> u64 {
    let mut h = base ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    h = (h ^ (h >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    h ^ (h >> 31)
}
