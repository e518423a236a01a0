//! Difficulty retargeting
//!
//! Both algorithms are linearly weighted moving averages over a window of `N`
//! solve times, taking `N + 1` timestamps and cumulative difficulties ordered
//! from oldest to newest.

use serde::{Deserialize, Serialize};

/// Retarget algorithm selected per protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyAlgorithm {
    Lwma3,
    Lwma2,
}

impl DifficultyAlgorithm {
    pub fn next_difficulty(
        self,
        timestamps: &[u64],
        cumulative_difficulties: &[u64],
        window_size: usize,
        target_block_time: u64,
    ) -> u64 {
        match self {
            DifficultyAlgorithm::Lwma3 => {
                next_difficulty_lwma3(timestamps, cumulative_difficulties, window_size, target_block_time)
            }
            DifficultyAlgorithm::Lwma2 => {
                next_difficulty_lwma2(timestamps, cumulative_difficulties, window_size, target_block_time)
            }
        }
    }
}

/// LWMA-3: 𝒯* × 𝒟* × ℕ × ℕ → ℕ
///
/// 1. Solve times are forced monotone (`t[i] ≤ t[i-1]` counts as one second)
///    and capped at `6T`
/// 2. `L = Σ i·ST[i]`
/// 3. `next = Δcd × T × (N+1) × 99 / (100 × 2 × L)`
/// 4. `next ∈ [0.67·prev, 1.50·prev]` where `prev = cd[N] - cd[N-1]`
/// 5. If the last three solve times sum below `0.9 × 3T`, `next ≥ 1.08·prev`
///
/// Panics if fewer than `N + 1` samples are supplied.
pub fn next_difficulty_lwma3(
    timestamps: &[u64],
    cumulative_difficulties: &[u64],
    window_size: usize,
    target_block_time: u64,
) -> u64 {
    check_window(timestamps, cumulative_difficulties, window_size, target_block_time);

    let n = window_size as i128;
    let t = i128::from(target_block_time);

    let mut weighted_solve_times: i128 = 0;
    let mut last_three: i128 = 0;
    let mut previous = i128::from(timestamps[0]);
    for i in 1..=window_size {
        let current = i128::from(timestamps[i]);
        let this_time = if current > previous { current } else { previous + 1 };
        let solve_time = (6 * t).min(this_time - previous);
        previous = this_time;

        weighted_solve_times += solve_time * i as i128;
        if i as i128 > n - 3 {
            last_three += solve_time;
        }
    }

    finish(
        cumulative_difficulties,
        window_size,
        t,
        weighted_solve_times,
        last_three,
        27 * t / 10,
    )
}

/// LWMA-2: 𝒯* × 𝒟* × ℕ × ℕ → ℕ
///
/// Same shape as LWMA-3, but every solve time is clamped into `[-4T, 6T]`
/// and the anti-oscillation guard triggers below `0.8 × 3T`.
///
/// Panics if fewer than `N + 1` samples are supplied.
pub fn next_difficulty_lwma2(
    timestamps: &[u64],
    cumulative_difficulties: &[u64],
    window_size: usize,
    target_block_time: u64,
) -> u64 {
    check_window(timestamps, cumulative_difficulties, window_size, target_block_time);

    let n = window_size as i128;
    let t = i128::from(target_block_time);

    let mut weighted_solve_times: i128 = 0;
    let mut last_three: i128 = 0;
    for i in 1..=window_size {
        let delta = i128::from(timestamps[i]) - i128::from(timestamps[i - 1]);
        let solve_time = delta.clamp(-4 * t, 6 * t);

        weighted_solve_times += solve_time * i as i128;
        if i as i128 > n - 3 {
            last_three += solve_time;
        }
    }

    finish(
        cumulative_difficulties,
        window_size,
        t,
        weighted_solve_times,
        last_three,
        24 * t / 10,
    )
}

fn check_window(timestamps: &[u64], cumulative_difficulties: &[u64], window_size: usize, target_block_time: u64) {
    assert!(window_size > 0, "difficulty window must not be empty");
    assert!(target_block_time > 0, "target block time must be positive");
    assert!(
        timestamps.len() > window_size && cumulative_difficulties.len() > window_size,
        "difficulty window of {} needs {} samples, got {} timestamps and {} cumulative difficulties",
        window_size,
        window_size + 1,
        timestamps.len(),
        cumulative_difficulties.len()
    );
}

fn finish(
    cumulative_difficulties: &[u64],
    window_size: usize,
    t: i128,
    weighted_solve_times: i128,
    last_three: i128,
    guard_threshold: i128,
) -> u64 {
    let n = window_size as i128;
    let work = i128::from(cumulative_difficulties[window_size]) - i128::from(cumulative_difficulties[0]);
    let previous = i128::from(cumulative_difficulties[window_size])
        - i128::from(cumulative_difficulties[window_size - 1]);

    // Negative clock drift can drive the weighted sum to zero or below.
    let weighted = weighted_solve_times.max(1);

    let mut next = (work * t * (n + 1) * 99) / (100 * 2 * weighted);
    next = next.min(previous * 150 / 100).max(previous * 67 / 100);

    if last_three < guard_threshold {
        next = next.max(previous * 108 / 100);
    }

    next.clamp(0, i128::from(u64::MAX)) as u64
}
